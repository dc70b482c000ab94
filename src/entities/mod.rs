pub mod prelude;

pub mod audit_log;
pub mod posts;
pub mod refresh_tokens;
pub mod users;

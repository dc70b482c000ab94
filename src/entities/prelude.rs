pub use super::audit_log::Entity as AuditLog;
pub use super::posts::Entity as Posts;
pub use super::refresh_tokens::Entity as RefreshTokens;
pub use super::users::Entity as Users;

pub mod session_service;
pub mod session_service_impl;
pub use session_service::{PublicUser, SessionError, SessionService, SessionTokens};
pub use session_service_impl::SeaOrmSessionService;

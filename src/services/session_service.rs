//! Domain service for account registration and cookie sessions.
//!
//! Owns the login/refresh/logout lifecycle: credential checks, token
//! issuance, server-side refresh-token bookkeeping and rotation.

use serde::Serialize;
use thiserror::Error;

/// Errors specific to session operations. The `#[error]` texts double as the
/// client-facing messages.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Email already registered")]
    EmailTaken,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid refresh")]
    InvalidRefreshToken,

    #[error("Unauthenticated")]
    Unauthenticated,

    #[error("User not found")]
    UserNotFound,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for SessionError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for SessionError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Public projection of a user. This is the only user shape that leaves the
/// service; the password hash stays behind the store boundary.
#[derive(Debug, Clone, Serialize)]
pub struct PublicUser {
    pub id: i32,
    pub email: String,
    pub name: String,
}

/// Freshly signed token pair. Travels to the transport layer, which puts the
/// values into cookies; they are never serialized into a response body.
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// Domain service trait for cookie sessions.
#[async_trait::async_trait]
pub trait SessionService: Send + Sync {
    /// Creates an account.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::EmailTaken`] when the email is already
    /// registered.
    async fn register(
        &self,
        email: &str,
        name: &str,
        password: &str,
    ) -> Result<PublicUser, SessionError>;

    /// Verifies credentials and issues a token pair, persisting the refresh
    /// token server-side.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidCredentials`] for an unknown email or a
    /// wrong password; the two are indistinguishable.
    async fn login(&self, email: &str, password: &str) -> Result<SessionTokens, SessionError>;

    /// Exchanges a refresh token for a new pair, revoking the presented one.
    /// The old token is spent even if issuing its replacement fails.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidRefreshToken`] for every failure mode:
    /// bad signature, expiry, unknown token, already-revoked token, vanished
    /// user. Callers must not be able to tell these apart.
    async fn refresh(&self, refresh_token: &str) -> Result<SessionTokens, SessionError>;

    /// Revokes every stored row matching the token. Idempotent; unknown
    /// tokens are not an error.
    async fn logout(&self, refresh_token: &str) -> Result<(), SessionError>;

    /// Resolves the user behind a valid access token.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Unauthenticated`] for a missing/invalid/expired
    /// token and [`SessionError::UserNotFound`] when the token is fine but the
    /// user row is gone.
    async fn current_user(&self, access_token: &str) -> Result<PublicUser, SessionError>;
}

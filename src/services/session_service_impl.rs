//! `SeaORM` implementation of the `SessionService` trait.

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};

use crate::config::SecurityConfig;
use crate::db::Store;
use crate::services::session_service::{
    PublicUser, SessionError, SessionService, SessionTokens,
};
use crate::tokens::TokenCodec;

pub struct SeaOrmSessionService {
    store: Store,
    codec: TokenCodec,
    security: SecurityConfig,
}

impl SeaOrmSessionService {
    #[must_use]
    pub const fn new(store: Store, codec: TokenCodec, security: SecurityConfig) -> Self {
        Self {
            store,
            codec,
            security,
        }
    }

    /// Signs a fresh pair and persists the refresh half with its expiry.
    async fn issue_tokens(
        &self,
        user_id: i32,
        email: &str,
    ) -> Result<SessionTokens, SessionError> {
        let access_token = self
            .codec
            .sign_access(user_id, email)
            .map_err(|e| SessionError::Internal(e.to_string()))?;
        let refresh_token = self
            .codec
            .sign_refresh(user_id)
            .map_err(|e| SessionError::Internal(e.to_string()))?;

        let expires_at = Utc::now() + self.codec.refresh_ttl();
        self.store
            .insert_refresh_token(&refresh_token, user_id, expires_at)
            .await?;

        Ok(SessionTokens {
            access_token,
            refresh_token,
        })
    }
}

#[async_trait]
impl SessionService for SeaOrmSessionService {
    async fn register(
        &self,
        email: &str,
        name: &str,
        password: &str,
    ) -> Result<PublicUser, SessionError> {
        if self.store.get_user_by_email(email).await?.is_some() {
            return Err(SessionError::EmailTaken);
        }

        let user = self
            .store
            .create_user(email, name, password, &self.security)
            .await?;

        debug!("Registered user {} ({})", user.id, user.email);

        Ok(PublicUser {
            id: user.id,
            email: user.email,
            name: user.name,
        })
    }

    async fn login(&self, email: &str, password: &str) -> Result<SessionTokens, SessionError> {
        // Verify credentials against database
        let is_valid = self.store.verify_user_password(email, password).await?;

        if !is_valid {
            return Err(SessionError::InvalidCredentials);
        }

        let user = self
            .store
            .get_user_by_email(email)
            .await?
            .ok_or(SessionError::InvalidCredentials)?;

        let tokens = self.issue_tokens(user.id, &user.email).await?;

        metrics::counter!("auth_logins_total").increment(1);

        Ok(tokens)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<SessionTokens, SessionError> {
        // Cheap crypto check before touching the store.
        let claims = self.codec.verify_refresh(refresh_token).map_err(|err| {
            debug!("Refresh token failed verification: {err}");
            SessionError::InvalidRefreshToken
        })?;

        // Single conditional update: only one concurrent exchange of a given
        // token can flip its `revoked` flag and proceed. The revocation
        // commits here, before the replacement exists, so a failure below
        // still leaves the old token spent.
        let consumed = self.store.consume_refresh_token(refresh_token).await?;
        if !consumed {
            warn!("Rejected refresh for user {}: token unknown, expired or already spent", claims.sub);
            return Err(SessionError::InvalidRefreshToken);
        }

        let user = self
            .store
            .get_user(claims.sub)
            .await?
            .ok_or(SessionError::InvalidRefreshToken)?;

        let tokens = self.issue_tokens(user.id, &user.email).await?;

        metrics::counter!("auth_refresh_rotations_total").increment(1);

        Ok(tokens)
    }

    async fn logout(&self, refresh_token: &str) -> Result<(), SessionError> {
        let revoked = self.store.revoke_refresh_tokens(refresh_token).await?;
        if revoked > 0 {
            debug!("Logout revoked {revoked} refresh token(s)");
        }
        Ok(())
    }

    async fn current_user(&self, access_token: &str) -> Result<PublicUser, SessionError> {
        let claims = self
            .codec
            .verify_access(access_token)
            .map_err(|_| SessionError::Unauthenticated)?;

        let user = self
            .store
            .get_user(claims.sub)
            .await?
            .ok_or(SessionError::UserNotFound)?;

        Ok(PublicUser {
            id: user.id,
            email: user.email,
            name: user.name,
        })
    }
}

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::AuthConfig;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token signing failed: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
    #[error("Invalid token signature")]
    InvalidSignature,
    #[error("Token expired")]
    Expired,
}

/// Claims carried by the short-lived access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: i32,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
}

/// Claims carried by the refresh token. The `jti` makes every issued token
/// unique even when two are minted within the same second.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: i32,
    pub jti: String,
    pub exp: i64,
    pub iat: i64,
}

/// Signs and verifies the two session token kinds. Access and refresh tokens
/// use distinct HMAC secrets, so one kind never verifies as the other.
#[derive(Clone)]
pub struct TokenCodec {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenCodec {
    #[must_use]
    pub fn new(
        access_secret: &str,
        refresh_secret: &str,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(refresh_secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        }
    }

    #[must_use]
    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            &config.access_secret,
            &config.refresh_secret,
            config.access_ttl(),
            config.refresh_ttl(),
        )
    }

    #[must_use]
    pub const fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    #[must_use]
    pub const fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    pub fn sign_access(&self, user_id: i32, email: &str) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = AccessClaims {
            sub: user_id,
            email: email.to_string(),
            exp: (now + self.access_ttl).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.access_encoding).map_err(TokenError::Signing)
    }

    pub fn sign_refresh(&self, user_id: i32) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = RefreshClaims {
            sub: user_id,
            jti: Uuid::new_v4().to_string(),
            exp: (now + self.refresh_ttl).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.refresh_encoding).map_err(TokenError::Signing)
    }

    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        decode::<AccessClaims>(token, &self.access_decoding, &strict_validation())
            .map(|data| data.claims)
            .map_err(map_decode_error)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        decode::<RefreshClaims>(token, &self.refresh_decoding, &strict_validation())
            .map(|data| data.claims)
            .map_err(map_decode_error)
    }
}

/// Expiry is exact: no leeway, so a token is rejected the second it lapses.
fn strict_validation() -> Validation {
    let mut validation = Validation::default();
    validation.leeway = 0;
    validation
}

fn map_decode_error(err: jsonwebtoken::errors::Error) -> TokenError {
    if matches!(
        err.kind(),
        jsonwebtoken::errors::ErrorKind::ExpiredSignature
    ) {
        TokenError::Expired
    } else {
        TokenError::InvalidSignature
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::new(
            "access-secret",
            "refresh-secret",
            Duration::minutes(15),
            Duration::days(7),
        )
    }

    #[test]
    fn test_access_round_trip() {
        let codec = codec();
        let token = codec.sign_access(42, "alice@example.com").unwrap();
        let claims = codec.verify_access(&token).unwrap();

        assert_eq!(claims.sub, 42);
        assert_eq!(claims.email, "alice@example.com");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_refresh_round_trip() {
        let codec = codec();
        let token = codec.sign_refresh(7).unwrap();
        let claims = codec.verify_refresh(&token).unwrap();

        assert_eq!(claims.sub, 7);
        assert!(!claims.jti.is_empty());
    }

    #[test]
    fn test_refresh_tokens_are_distinct() {
        let codec = codec();
        let first = codec.sign_refresh(7).unwrap();
        let second = codec.sign_refresh(7).unwrap();

        assert_ne!(first, second);
    }

    #[test]
    fn test_expired_access_token() {
        let codec = TokenCodec::new(
            "access-secret",
            "refresh-secret",
            Duration::minutes(-5),
            Duration::days(7),
        );
        let token = codec.sign_access(1, "a@b.c").unwrap();

        match codec.verify_access(&token) {
            Err(TokenError::Expired) => {}
            other => panic!("expected Expired, got {other:?}"),
        }
    }

    #[test]
    fn test_tampered_token_is_invalid_signature() {
        let codec = codec();
        let mut token = codec.sign_access(1, "a@b.c").unwrap();
        token.push('x');

        match codec.verify_access(&token) {
            Err(TokenError::InvalidSignature) => {}
            other => panic!("expected InvalidSignature, got {other:?}"),
        }
    }

    #[test]
    fn test_token_kinds_do_not_cross_verify() {
        let codec = codec();
        let refresh = codec.sign_refresh(1).unwrap();

        assert!(matches!(
            codec.verify_access(&refresh),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn test_garbage_is_invalid_signature() {
        let codec = codec();

        assert!(matches!(
            codec.verify_refresh("not-a-jwt"),
            Err(TokenError::InvalidSignature)
        ));
    }
}

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    sea_query::Expr,
};

use crate::entities::refresh_tokens;

pub struct RefreshTokenRepository {
    conn: DatabaseConnection,
}

impl RefreshTokenRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Persist a freshly issued token alongside its expiry.
    pub async fn insert(
        &self,
        token: &str,
        user_id: i32,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        refresh_tokens::ActiveModel {
            token: Set(token.to_string()),
            user_id: Set(user_id),
            expires_at: Set(expires_at),
            revoked: Set(false),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .context("Failed to insert refresh token")?;

        Ok(())
    }

    pub async fn get(&self, token: &str) -> Result<Option<refresh_tokens::Model>> {
        refresh_tokens::Entity::find()
            .filter(refresh_tokens::Column::Token.eq(token))
            .one(&self.conn)
            .await
            .context("Failed to query refresh token")
    }

    /// Claim a token for exchange: flips `revoked` only when the row is still
    /// live and unexpired. The conditional update makes the claim atomic, so
    /// two concurrent exchanges of one token cannot both get `true` back.
    pub async fn consume(&self, token: &str) -> Result<bool> {
        let res = refresh_tokens::Entity::update_many()
            .col_expr(refresh_tokens::Column::Revoked, Expr::value(true))
            .filter(refresh_tokens::Column::Token.eq(token))
            .filter(refresh_tokens::Column::Revoked.eq(false))
            .filter(refresh_tokens::Column::ExpiresAt.gt(Utc::now()))
            .exec(&self.conn)
            .await
            .context("Failed to consume refresh token")?;

        Ok(res.rows_affected == 1)
    }

    /// Revoke every row carrying this token value. Used by logout; returns the
    /// affected count and succeeds when nothing matched.
    pub async fn revoke_all(&self, token: &str) -> Result<u64> {
        let res = refresh_tokens::Entity::update_many()
            .col_expr(refresh_tokens::Column::Revoked, Expr::value(true))
            .filter(refresh_tokens::Column::Token.eq(token))
            .exec(&self.conn)
            .await
            .context("Failed to revoke refresh tokens")?;

        Ok(res.rows_affected)
    }

    /// Delete rows whose expiry is in the past. Housekeeping, not part of the
    /// exchange path.
    pub async fn prune_expired(&self) -> Result<u64> {
        let res = refresh_tokens::Entity::delete_many()
            .filter(refresh_tokens::Column::ExpiresAt.lte(Utc::now()))
            .exec(&self.conn)
            .await
            .context("Failed to prune expired refresh tokens")?;

        Ok(res.rows_affected)
    }
}

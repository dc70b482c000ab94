use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::entities::{audit_log, refresh_tokens};

pub mod migrator;
pub mod repositories;

pub use crate::entities::audit_log::Model as AuditEvent;
pub use repositories::post::{PostAuthor, PostRecord};
pub use repositories::user::User;

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn refresh_token_repo(&self) -> repositories::refresh_token::RefreshTokenRepository {
        repositories::refresh_token::RefreshTokenRepository::new(self.conn.clone())
    }

    fn post_repo(&self) -> repositories::post::PostRepository {
        repositories::post::PostRepository::new(self.conn.clone())
    }

    fn audit_repo(&self) -> repositories::audit::AuditRepository {
        repositories::audit::AuditRepository::new(self.conn.clone())
    }

    // ========== Users ==========

    pub async fn create_user(
        &self,
        email: &str,
        name: &str,
        password: &str,
        config: &crate::config::SecurityConfig,
    ) -> Result<User> {
        self.user_repo().create(email, name, password, config).await
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.user_repo().get_by_email(email).await
    }

    pub async fn get_user(&self, id: i32) -> Result<Option<User>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        self.user_repo().list().await
    }

    pub async fn verify_user_password(&self, email: &str, password: &str) -> Result<bool> {
        self.user_repo().verify_password(email, password).await
    }

    pub async fn update_user_name(&self, id: i32, name: &str) -> Result<Option<User>> {
        self.user_repo().update_name(id, name).await
    }

    pub async fn delete_user(&self, id: i32) -> Result<bool> {
        self.user_repo().delete(id).await
    }

    pub async fn count_users(&self) -> Result<u64> {
        self.user_repo().count().await
    }

    // ========== Refresh tokens ==========

    pub async fn insert_refresh_token(
        &self,
        token: &str,
        user_id: i32,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        self.refresh_token_repo()
            .insert(token, user_id, expires_at)
            .await
    }

    pub async fn get_refresh_token(&self, token: &str) -> Result<Option<refresh_tokens::Model>> {
        self.refresh_token_repo().get(token).await
    }

    pub async fn consume_refresh_token(&self, token: &str) -> Result<bool> {
        self.refresh_token_repo().consume(token).await
    }

    pub async fn revoke_refresh_tokens(&self, token: &str) -> Result<u64> {
        self.refresh_token_repo().revoke_all(token).await
    }

    pub async fn prune_expired_refresh_tokens(&self) -> Result<u64> {
        self.refresh_token_repo().prune_expired().await
    }

    // ========== Posts ==========

    pub async fn list_posts(&self) -> Result<Vec<PostRecord>> {
        self.post_repo().list().await
    }

    pub async fn get_post(&self, id: i32) -> Result<Option<PostRecord>> {
        self.post_repo().get(id).await
    }

    pub async fn create_post(
        &self,
        author_id: i32,
        title: &str,
        content: &str,
        cover_url: Option<String>,
    ) -> Result<PostRecord> {
        self.post_repo()
            .create(author_id, title, content, cover_url)
            .await
    }

    pub async fn update_post(
        &self,
        id: i32,
        title: &str,
        content: &str,
        new_cover_url: Option<String>,
    ) -> Result<Option<PostRecord>> {
        self.post_repo()
            .update(id, title, content, new_cover_url)
            .await
    }

    pub async fn delete_post(&self, id: i32) -> Result<bool> {
        self.post_repo().delete(id).await
    }

    pub async fn count_posts(&self) -> Result<u64> {
        self.post_repo().count().await
    }

    // ========== Audit trail ==========

    pub async fn record_audit(
        &self,
        user_id: i32,
        action: &str,
        meta: Option<serde_json::Value>,
    ) -> Result<()> {
        self.audit_repo().record(user_id, action, meta).await
    }

    pub async fn recent_audit_events(&self, limit: u64) -> Result<Vec<audit_log::Model>> {
        self.audit_repo().recent(limit).await
    }
}

use serde::{Deserialize, Serialize};

use crate::db::{AuditEvent, PostAuthor, PostRecord, User};

/// Wire shape of every error response: a single `error` string.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Acknowledgement body for operations with no payload to return.
#[derive(Debug, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    #[must_use]
    pub const fn ok() -> Self {
        Self { ok: true }
    }
}

/// Public projection of a user row. Timestamps and the password hash stay
/// server-side.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserDto {
    pub id: i32,
    pub email: String,
    pub name: String,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthorDto {
    pub id: i32,
    pub name: String,
}

impl From<PostAuthor> for AuthorDto {
    fn from(author: PostAuthor) -> Self {
        Self {
            id: author.id,
            name: author.name,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PostDto {
    pub id: i32,
    pub title: String,
    pub content: String,
    pub cover_url: Option<String>,
    pub author: Option<AuthorDto>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<PostRecord> for PostDto {
    fn from(post: PostRecord) -> Self {
        Self {
            id: post.id,
            title: post.title,
            content: post.content,
            cover_url: post.cover_url,
            author: post.author.map(AuthorDto::from),
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuditEventDto {
    pub id: i64,
    pub user_id: i32,
    pub action: String,
    /// Parsed back from the stored JSON string; `None` when absent or mangled.
    pub meta: Option<serde_json::Value>,
    pub created_at: String,
}

impl From<AuditEvent> for AuditEventDto {
    fn from(event: AuditEvent) -> Self {
        let meta = event
            .meta
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok());
        Self {
            id: event.id,
            user_id: event.user_id,
            action: event.action,
            meta,
            created_at: event.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemStatus {
    pub version: String,
    pub uptime_seconds: u64,
    pub users: u64,
    pub posts: u64,
}

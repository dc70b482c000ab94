use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryOrder, Set,
};

use crate::entities::{posts, users};

#[derive(Debug, Clone)]
pub struct PostAuthor {
    pub id: i32,
    pub name: String,
}

/// Post row joined with its author's public fields.
#[derive(Debug, Clone)]
pub struct PostRecord {
    pub id: i32,
    pub title: String,
    pub content: String,
    pub cover_url: Option<String>,
    pub author: Option<PostAuthor>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct PostRepository {
    conn: DatabaseConnection,
}

impl PostRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn list(&self) -> Result<Vec<PostRecord>> {
        let rows = posts::Entity::find()
            .order_by_desc(posts::Column::CreatedAt)
            .order_by_desc(posts::Column::Id)
            .find_also_related(users::Entity)
            .all(&self.conn)
            .await
            .context("Failed to list posts")?;

        Ok(rows.into_iter().map(Self::map_row).collect())
    }

    pub async fn get(&self, id: i32) -> Result<Option<PostRecord>> {
        let row = posts::Entity::find_by_id(id)
            .find_also_related(users::Entity)
            .one(&self.conn)
            .await
            .context("Failed to query post")?;

        Ok(row.map(Self::map_row))
    }

    pub async fn create(
        &self,
        author_id: i32,
        title: &str,
        content: &str,
        cover_url: Option<String>,
    ) -> Result<PostRecord> {
        let now = chrono::Utc::now().to_rfc3339();

        let inserted = posts::ActiveModel {
            title: Set(title.to_string()),
            content: Set(content.to_string()),
            cover_url: Set(cover_url),
            author_id: Set(author_id),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .context("Failed to insert post")?;

        // Re-read through the relation so the response carries the author.
        self.get(inserted.id)
            .await?
            .context("Inserted post vanished before read-back")
    }

    /// Replace title and content; the cover only changes when a new one is
    /// supplied. Returns None when the post does not exist.
    pub async fn update(
        &self,
        id: i32,
        title: &str,
        content: &str,
        new_cover_url: Option<String>,
    ) -> Result<Option<PostRecord>> {
        let post = posts::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query post for update")?;

        let Some(post) = post else {
            return Ok(None);
        };

        let now = chrono::Utc::now().to_rfc3339();

        let mut active: posts::ActiveModel = post.into();
        active.title = Set(title.to_string());
        active.content = Set(content.to_string());
        if let Some(cover_url) = new_cover_url {
            active.cover_url = Set(Some(cover_url));
        }
        active.updated_at = Set(now);
        let updated = active.update(&self.conn).await?;

        self.get(updated.id).await
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let res = posts::Entity::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete post")?;

        Ok(res.rows_affected > 0)
    }

    pub async fn count(&self) -> Result<u64> {
        posts::Entity::find()
            .count(&self.conn)
            .await
            .context("Failed to count posts")
    }

    fn map_row((post, author): (posts::Model, Option<users::Model>)) -> PostRecord {
        PostRecord {
            id: post.id,
            title: post.title,
            content: post.content,
            cover_url: post.cover_url,
            author: author.map(|u| PostAuthor {
                id: u.id,
                name: u.name,
            }),
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }
}

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;

use super::{
    AppState,
    auth::AuthUser,
    error::ApiError,
    types::{OkResponse, PostDto},
};

/// Fields collected from the multipart form shared by create and update.
#[derive(Default)]
struct PostForm {
    title: Option<String>,
    content: Option<String>,
    cover: Option<CoverUpload>,
}

struct CoverUpload {
    filename: Option<String>,
    data: Bytes,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn list_posts(State(state): State<Arc<AppState>>) -> Result<Json<Vec<PostDto>>, ApiError> {
    let posts = state.store.list_posts().await?;
    Ok(Json(posts.into_iter().map(PostDto::from).collect()))
}

pub async fn get_post(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<PostDto>, ApiError> {
    let post = state
        .store
        .get_post(id)
        .await?
        .ok_or_else(|| ApiError::post_not_found(id))?;

    Ok(Json(post.into()))
}

pub async fn create_post(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = read_post_form(multipart).await?;
    let (title, content) = require_fields(&form)?;

    let cover_url = save_cover(&state, form.cover.as_ref()).await?;
    let post = state
        .store
        .create_post(user.id, title, content, cover_url)
        .await?;

    record_post_created(&state, &user, post.id).await;

    Ok((StatusCode::CREATED, Json(PostDto::from(post))))
}

/// Replaces title and content; the stored cover survives unless the form
/// carries a replacement file.
pub async fn update_post(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    multipart: Multipart,
) -> Result<Json<PostDto>, ApiError> {
    let form = read_post_form(multipart).await?;
    let (title, content) = require_fields(&form)?;

    let new_cover_url = save_cover(&state, form.cover.as_ref()).await?;
    let post = state
        .store
        .update_post(id, title, content, new_cover_url)
        .await?
        .ok_or_else(|| ApiError::post_not_found(id))?;

    Ok(Json(post.into()))
}

pub async fn delete_post(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<OkResponse>, ApiError> {
    let deleted = state.store.delete_post(id).await?;
    if !deleted {
        return Err(ApiError::post_not_found(id));
    }

    Ok(Json(OkResponse::ok()))
}

// ============================================================================
// Form Helpers
// ============================================================================

async fn read_post_form(mut multipart: Multipart) -> Result<PostForm, ApiError> {
    let mut form = PostForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::validation(format!("Malformed multipart body: {err}")))?
    {
        let name = field.name().map(ToString::to_string);
        match name.as_deref() {
            Some("title") => {
                form.title = Some(read_text(field).await?);
            }
            Some("content") => {
                form.content = Some(read_text(field).await?);
            }
            Some("cover") => {
                let filename = field.file_name().map(ToString::to_string);
                let data = field.bytes().await.map_err(|err| {
                    ApiError::validation(format!("Failed to read cover upload: {err}"))
                })?;
                form.cover = Some(CoverUpload { filename, data });
            }
            _ => {}
        }
    }

    Ok(form)
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|err| ApiError::validation(format!("Malformed multipart body: {err}")))
}

fn require_fields(form: &PostForm) -> Result<(&str, &str), ApiError> {
    match (form.title.as_deref(), form.content.as_deref()) {
        (Some(title), Some(content)) if !title.is_empty() && !content.is_empty() => {
            Ok((title, content))
        }
        _ => Err(ApiError::validation("Missing fields")),
    }
}

async fn save_cover(
    state: &AppState,
    cover: Option<&CoverUpload>,
) -> Result<Option<String>, ApiError> {
    let Some(cover) = cover else {
        return Ok(None);
    };

    let url = state
        .uploads
        .save(cover.filename.as_deref(), &cover.data)
        .await?;

    Ok(Some(url))
}

/// Audit writes never fail the request that triggered them.
async fn record_post_created(state: &AppState, user: &AuthUser, post_id: i32) {
    let meta = serde_json::json!({ "postId": post_id });
    if let Err(err) = state
        .store
        .record_audit(user.id, "POST_CREATED", Some(meta))
        .await
    {
        tracing::warn!("Failed to record POST_CREATED audit event: {err}");
    }
}

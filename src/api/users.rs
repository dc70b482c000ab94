use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use std::sync::Arc;

use super::{
    AppState,
    error::ApiError,
    types::{OkResponse, UserDto},
};

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    pub name: String,
}

pub async fn list_users(State(state): State<Arc<AppState>>) -> Result<Json<Vec<UserDto>>, ApiError> {
    let users = state.store.list_users().await?;
    Ok(Json(users.into_iter().map(UserDto::from).collect()))
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<UserDto>, ApiError> {
    let user = state
        .store
        .get_user(id)
        .await?
        .ok_or_else(|| ApiError::user_not_found(id))?;

    Ok(Json(user.into()))
}

pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<UserDto>, ApiError> {
    if payload.name.is_empty() {
        return Err(ApiError::validation("Name is required"));
    }

    let user = state
        .store
        .update_user_name(id, &payload.name)
        .await?
        .ok_or_else(|| ApiError::user_not_found(id))?;

    Ok(Json(user.into()))
}

/// Removes the user row; refresh tokens and posts go with it via the foreign
/// key cascade.
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<OkResponse>, ApiError> {
    let deleted = state.store.delete_user(id).await?;
    if !deleted {
        return Err(ApiError::user_not_found(id));
    }

    Ok(Json(OkResponse::ok()))
}

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use std::sync::Arc;

use super::{AppState, error::ApiError, types::AuditEventDto};

const DEFAULT_LIMIT: u64 = 50;
const MAX_LIMIT: u64 = 500;

#[derive(Deserialize)]
pub struct AuditQuery {
    pub limit: Option<u64>,
}

/// `GET /audit?limit=N`
///
/// Recent audit events, newest first.
pub async fn recent_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditEventDto>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let events = state.store.recent_audit_events(limit).await?;
    Ok(Json(events.into_iter().map(AuditEventDto::from).collect()))
}

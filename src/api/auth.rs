use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;

use super::{AppState, error::ApiError, types::OkResponse};
use crate::services::{PublicUser, SessionTokens};

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";

// ============================================================================
// Request Types
// ============================================================================

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Identity of the caller, attached as a request extension by [`require_auth`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i32,
    pub email: String,
}

// ============================================================================
// Middleware
// ============================================================================

/// Gate for protected routes: rejects the request unless the access cookie
/// carries a token that still verifies. No store round-trip happens here.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token =
        cookie_value(request.headers(), ACCESS_COOKIE).ok_or_else(ApiError::unauthenticated)?;

    let claims = state.tokens.verify_access(&token).map_err(|err| {
        tracing::debug!("Access token rejected: {err}");
        ApiError::unauthenticated()
    })?;

    tracing::Span::current().record("user_id", claims.sub);

    request.extensions_mut().insert(AuthUser {
        id: claims.sub,
        email: claims.email,
    });

    Ok(next.run(request).await)
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.email.is_empty() || payload.name.is_empty() || payload.password.is_empty() {
        return Err(ApiError::validation("Missing fields"));
    }

    let user = state
        .sessions
        .register(&payload.email, &payload.name, &payload.password)
        .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::validation("Missing fields"));
    }

    let tokens = state
        .sessions
        .login(&payload.email, &payload.password)
        .await?;
    let set_cookies = set_auth_cookies(&state, &tokens)?;

    Ok((set_cookies, Json(OkResponse::ok())))
}

/// Exchange the refresh cookie for a fresh cookie pair. Every failure mode
/// answers with the same 401 so a caller cannot probe which check tripped.
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = cookie_value(&headers, REFRESH_COOKIE)
        .ok_or_else(|| ApiError::Unauthorized("Invalid refresh".to_string()))?;

    let tokens = state.sessions.refresh(&token).await?;
    let set_cookies = set_auth_cookies(&state, &tokens)?;

    Ok((set_cookies, Json(OkResponse::ok())))
}

/// Revokes the presented session and clears both cookies. Answers 200 whether
/// or not a live session was attached.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = cookie_value(&headers, REFRESH_COOKIE) {
        state.sessions.logout(&token).await?;
    }

    let cleared = clear_auth_cookies(&state)?;
    Ok((cleared, Json(OkResponse::ok())))
}

pub async fn me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<PublicUser>, ApiError> {
    let token = cookie_value(&headers, ACCESS_COOKIE).ok_or_else(ApiError::unauthenticated)?;
    let user = state.sessions.current_user(&token).await?;
    Ok(Json(user))
}

// ============================================================================
// Cookie Helpers
// ============================================================================

fn set_auth_cookies(state: &AppState, tokens: &SessionTokens) -> Result<HeaderMap, ApiError> {
    let server = &state.config.server;
    let mut headers = HeaderMap::new();

    headers.append(
        header::SET_COOKIE,
        auth_cookie(
            ACCESS_COOKIE,
            &tokens.access_token,
            &server.cookie_domain,
            state.tokens.access_ttl().num_seconds(),
            server.secure_cookies,
        )?,
    );
    headers.append(
        header::SET_COOKIE,
        auth_cookie(
            REFRESH_COOKIE,
            &tokens.refresh_token,
            &server.cookie_domain,
            state.tokens.refresh_ttl().num_seconds(),
            server.secure_cookies,
        )?,
    );

    Ok(headers)
}

fn clear_auth_cookies(state: &AppState) -> Result<HeaderMap, ApiError> {
    let server = &state.config.server;
    let mut headers = HeaderMap::new();

    for name in [ACCESS_COOKIE, REFRESH_COOKIE] {
        headers.append(
            header::SET_COOKIE,
            auth_cookie(name, "", &server.cookie_domain, 0, server.secure_cookies)?,
        );
    }

    Ok(headers)
}

fn auth_cookie(
    name: &str,
    value: &str,
    domain: &str,
    max_age: i64,
    secure: bool,
) -> Result<HeaderValue, ApiError> {
    let mut cookie = format!(
        "{name}={value}; Path=/; Domain={domain}; HttpOnly; SameSite=Lax; Max-Age={max_age}"
    );
    if secure {
        cookie.push_str("; Secure");
    }

    HeaderValue::from_str(&cookie)
        .map_err(|err| ApiError::internal(format!("Failed to build cookie header: {err}")))
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;

    cookie_header.split(';').map(str::trim).find_map(|pair| {
        let mut parts = pair.splitn(2, '=');
        match (parts.next(), parts.next()) {
            (Some(n), Some(v)) if n == name => Some(v.to_string()),
            _ => None,
        }
    })
}

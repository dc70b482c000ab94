use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post, put},
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db::Store;
use crate::services::{SeaOrmSessionService, SessionService};
use crate::tokens::TokenCodec;
use crate::uploads::UploadStore;

mod audit;
pub mod auth;
mod error;
mod observability;
mod posts;
mod system;
mod types;
mod users;

pub use error::ApiError;
pub use types::*;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,

    pub config: Config,

    pub sessions: Arc<dyn SessionService>,

    pub tokens: TokenCodec,

    pub uploads: UploadStore,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

pub async fn create_app_state(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let store = Store::with_pool_options(
        &config.general.database_path,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await?;

    let pruned = store.prune_expired_refresh_tokens().await?;
    if pruned > 0 {
        tracing::info!("Pruned {pruned} expired refresh tokens");
    }

    let uploads = UploadStore::new(&config.uploads);
    uploads.ensure_dir().await?;

    let tokens = TokenCodec::from_config(&config.auth);
    let sessions: Arc<dyn SessionService> = Arc::new(SeaOrmSessionService::new(
        store.clone(),
        tokens.clone(),
        config.security.clone(),
    ));

    Ok(Arc::new(AppState {
        store,
        config,
        sessions,
        tokens,
        uploads,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    }))
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors_origins = state.config.server.cors_allowed_origins.clone();
    let upload_dir = state.uploads.dir().to_path_buf();

    // Multipart routes need headroom above the cover cap; everything else
    // stays under axum's default limit.
    let cover_body_limit = DefaultBodyLimit::max(state.uploads.max_bytes() + 64 * 1024);
    let auth_layer = middleware::from_fn_with_state(state.clone(), auth::require_auth);

    let api_router = Router::new()
        .merge(create_protected_router(state.clone()))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/posts", get(posts::list_posts))
        .route("/posts/{id}", get(posts::get_post))
        .route(
            "/posts",
            post(posts::create_post)
                .route_layer(auth_layer.clone())
                .layer(cover_body_limit.clone()),
        )
        .route(
            "/posts/{id}",
            put(posts::update_post)
                .delete(posts::delete_post)
                .route_layer(auth_layer)
                .layer(cover_body_limit),
        )
        .route("/health/live", get(system::health_live))
        .route("/health/ready", get(system::health_ready))
        .with_state(state);

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        // Wildcard origins cannot be combined with credentialed CORS, so the
        // cookie-carrying requests only work with an explicit origin list.
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_credentials(true)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE])
    };

    Router::new()
        .merge(api_router)
        .nest_service("/uploads", ServeDir::new(upload_dir))
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::logging_middleware))
        .layer(middleware::from_fn(
            observability::security_headers_middleware,
        ))
}

fn create_protected_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", get(users::list_users))
        .route("/users/{id}", get(users::get_user))
        .route("/users/{id}", put(users::update_user))
        .route("/users/{id}", delete(users::delete_user))
        .route("/audit", get(audit::recent_events))
        .route("/system/status", get(system::get_status))
        .route("/metrics", get(observability::get_metrics))
        .route_layer(middleware::from_fn_with_state(state, auth::require_auth))
}

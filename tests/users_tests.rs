//! End-to-end tests for the users resource.

use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use gazet::config::Config;
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;

fn test_config() -> Config {
    let suffix = uuid::Uuid::new_v4();
    let db_path = std::env::temp_dir().join(format!("gazet-users-test-{suffix}.db"));
    let upload_dir = std::env::temp_dir().join(format!("gazet-users-test-uploads-{suffix}"));

    let mut config = Config::default();
    config.general.database_path = format!("sqlite:{}", db_path.display());
    config.uploads.upload_dir = upload_dir.to_string_lossy().to_string();
    config
}

async fn spawn_app() -> (Arc<gazet::api::AppState>, Router) {
    let state = gazet::api::create_app_state(test_config(), None)
        .await
        .expect("failed to create app state");
    let router = gazet::api::router(state.clone());
    (state, router)
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn set_cookie_value(response: &Response<Body>, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .find_map(|raw| {
            let raw = raw.to_str().ok()?;
            let (pair, _) = raw.split_once(';')?;
            let (n, v) = pair.split_once('=')?;
            (n == name).then(|| v.to_string())
        })
}

/// Registers a user, returning its id. Password is fixed across the suite.
async fn register(app: &Router, email: &str, name: &str) -> i32 {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/register",
            serde_json::json!({ "email": email, "name": name, "password": "hunter2!" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    i32::try_from(body["id"].as_i64().unwrap()).unwrap()
}

/// Logs in, returning (access, refresh) cookie values.
async fn login(app: &Router, email: &str) -> (String, String) {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/login",
            serde_json::json!({ "email": email, "password": "hunter2!" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let access = set_cookie_value(&response, "access_token").unwrap();
    let refresh = set_cookie_value(&response, "refresh_token").unwrap();
    (access, refresh)
}

fn authed(method: &str, uri: &str, access: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::COOKIE, format!("access_token={access}"))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_list_users_is_protected() {
    let (_, app) = spawn_app().await;
    register(&app, "ada@example.com", "Ada").await;

    let denied = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/users")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

    let (access, _) = login(&app, "ada@example.com").await;
    let response = app.clone().oneshot(authed("GET", "/users", &access)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let users = body.as_array().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["email"], "ada@example.com");
    assert_eq!(users[0]["name"], "Ada");
    assert!(users[0].get("password_hash").is_none());
}

#[tokio::test]
async fn test_get_user_by_id() {
    let (_, app) = spawn_app().await;
    let id = register(&app, "ada@example.com", "Ada").await;
    let (access, _) = login(&app, "ada@example.com").await;

    let response = app
        .clone()
        .oneshot(authed("GET", &format!("/users/{id}"), &access))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["id"], id);
    assert_eq!(body["email"], "ada@example.com");

    let missing = app
        .clone()
        .oneshot(authed("GET", "/users/9999", &access))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_user_name() {
    let (_, app) = spawn_app().await;
    let id = register(&app, "ada@example.com", "Ada").await;
    let (access, _) = login(&app, "ada@example.com").await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(format!("/users/{id}"))
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::COOKIE, format!("access_token={access}"))
                .body(Body::from(
                    serde_json::json!({ "name": "Ada Lovelace" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["name"], "Ada Lovelace");

    // Empty names are rejected before touching the store.
    let blank = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(format!("/users/{id}"))
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::COOKIE, format!("access_token={access}"))
                .body(Body::from(serde_json::json!({ "name": "" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(blank.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(blank).await["error"], "Name is required");

    let missing = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/users/9999")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::COOKIE, format!("access_token={access}"))
                .body(Body::from(serde_json::json!({ "name": "Ghost" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_user_cascades_sessions_and_posts() {
    let (state, app) = spawn_app().await;
    let admin = register(&app, "admin@example.com", "Admin").await;
    let victim = register(&app, "victim@example.com", "Victim").await;

    // The victim has an open session and an authored post.
    let (_, victim_refresh) = login(&app, "victim@example.com").await;
    state
        .store
        .create_post(victim, "Victim's post", "Will not survive", None)
        .await
        .unwrap();
    assert_eq!(state.store.count_posts().await.unwrap(), 1);

    let (access, _) = login(&app, "admin@example.com").await;
    let response = app
        .clone()
        .oneshot(authed("DELETE", &format!("/users/{victim}"), &access))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!({ "ok": true }));

    // Posts and refresh tokens go with the user row.
    assert_eq!(state.store.count_posts().await.unwrap(), 0);
    assert!(
        state
            .store
            .get_refresh_token(&victim_refresh)
            .await
            .unwrap()
            .is_none()
    );

    let gone = app
        .clone()
        .oneshot(authed("GET", &format!("/users/{victim}"), &access))
        .await
        .unwrap();
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);

    // Deleting twice reports the absence.
    let again = app
        .clone()
        .oneshot(authed("DELETE", &format!("/users/{victim}"), &access))
        .await
        .unwrap();
    assert_eq!(again.status(), StatusCode::NOT_FOUND);

    // The admin is untouched.
    let still_there = app
        .clone()
        .oneshot(authed("GET", &format!("/users/{admin}"), &access))
        .await
        .unwrap();
    assert_eq!(still_there.status(), StatusCode::OK);
}

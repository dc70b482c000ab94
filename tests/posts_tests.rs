//! End-to-end tests for the posts resource: multipart create/update, cover
//! uploads, public reads and the audit trail.

use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use gazet::config::Config;
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "gazet-test-boundary";

fn test_config() -> Config {
    let suffix = uuid::Uuid::new_v4();
    let db_path = std::env::temp_dir().join(format!("gazet-posts-test-{suffix}.db"));
    let upload_dir = std::env::temp_dir().join(format!("gazet-posts-test-uploads-{suffix}"));

    let mut config = Config::default();
    config.general.database_path = format!("sqlite:{}", db_path.display());
    config.uploads.upload_dir = upload_dir.to_string_lossy().to_string();
    config
}

async fn spawn_app_from(config: Config) -> (Arc<gazet::api::AppState>, Router) {
    let state = gazet::api::create_app_state(config, None)
        .await
        .expect("failed to create app state");
    let router = gazet::api::router(state.clone());
    (state, router)
}

async fn spawn_app() -> (Arc<gazet::api::AppState>, Router) {
    spawn_app_from(test_config()).await
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

/// Registers and logs in a fixed author, returning the access cookie value.
async fn authenticate(app: &Router) -> String {
    let register = Request::builder()
        .method("POST")
        .uri("/auth/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            serde_json::json!({
                "email": "author@example.com",
                "name": "The Author",
                "password": "hunter2!"
            })
            .to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(register).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let login = Request::builder()
        .method("POST")
        .uri("/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            serde_json::json!({ "email": "author@example.com", "password": "hunter2!" })
                .to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(login).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    set_cookie_value(&response, "access_token").expect("missing access cookie")
}

/// Builds a multipart form body the way a browser would.
fn multipart_body(
    title: Option<&str>,
    content: Option<&str>,
    cover: Option<(&str, &[u8])>,
) -> Vec<u8> {
    let mut body = Vec::new();

    for (name, value) in [("title", title), ("content", content)] {
        if let Some(value) = value {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            );
            body.extend_from_slice(value.as_bytes());
            body.extend_from_slice(b"\r\n");
        }
    }

    if let Some((filename, data)) = cover {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"cover\"; filename=\"{filename}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn multipart_request(
    method: &str,
    uri: &str,
    access: Option<&str>,
    title: Option<&str>,
    content: Option<&str>,
    cover: Option<(&str, &[u8])>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri).header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={BOUNDARY}"),
    );
    if let Some(access) = access {
        builder = builder.header(header::COOKIE, format!("access_token={access}"));
    }
    builder
        .body(Body::from(multipart_body(title, content, cover)))
        .unwrap()
}

async fn create_post(app: &Router, access: &str, title: &str, content: &str) -> serde_json::Value {
    let response = app
        .clone()
        .oneshot(multipart_request(
            "POST",
            "/posts",
            Some(access),
            Some(title),
            Some(content),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

#[tokio::test]
async fn test_create_post_requires_auth() {
    let (_, app) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(multipart_request(
            "POST",
            "/posts",
            None,
            Some("Title"),
            Some("Content"),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "Unauthenticated");
}

#[tokio::test]
async fn test_create_and_read_post() {
    let (_, app) = spawn_app().await;
    let access = authenticate(&app).await;

    let created = create_post(&app, &access, "First post", "Hello there").await;
    assert_eq!(created["title"], "First post");
    assert_eq!(created["content"], "Hello there");
    assert!(created["cover_url"].is_null());
    assert_eq!(created["author"]["name"], "The Author");

    // Reads are public; no cookie needed.
    let id = created["id"].as_i64().unwrap();
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/posts/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["title"], "First post");
}

#[tokio::test]
async fn test_posts_listed_newest_first() {
    let (_, app) = spawn_app().await;
    let access = authenticate(&app).await;

    create_post(&app, &access, "Older", "First in").await;
    create_post(&app, &access, "Newer", "Second in").await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/posts")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let posts = body.as_array().unwrap();
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0]["title"], "Newer");
    assert_eq!(posts[1]["title"], "Older");
}

#[tokio::test]
async fn test_create_post_rejects_missing_fields() {
    let (_, app) = spawn_app().await;
    let access = authenticate(&app).await;

    let response = app
        .clone()
        .oneshot(multipart_request(
            "POST",
            "/posts",
            Some(&access),
            Some("Only a title"),
            None,
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Missing fields");
}

#[tokio::test]
async fn test_cover_upload_roundtrip() {
    let (_, app) = spawn_app().await;
    let access = authenticate(&app).await;

    let pixels = b"not-really-a-png-but-close-enough";
    let response = app
        .clone()
        .oneshot(multipart_request(
            "POST",
            "/posts",
            Some(&access),
            Some("Illustrated"),
            Some("With a cover"),
            Some(("cover.png", pixels)),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let created = body_json(response).await;
    let cover_url = created["cover_url"].as_str().unwrap();
    assert!(cover_url.starts_with("/uploads/"), "got {cover_url}");
    assert!(cover_url.ends_with(".png"), "got {cover_url}");

    // The stored file is served back under /uploads without auth.
    let served = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(cover_url)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(served.status(), StatusCode::OK);
    let bytes = served.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], pixels);
}

#[tokio::test]
async fn test_oversized_cover_is_rejected() {
    let mut config = test_config();
    config.uploads.max_upload_size_mb = 1;
    let (_, app) = spawn_app_from(config).await;
    let access = authenticate(&app).await;

    let oversized = vec![0u8; 1024 * 1024 + 1];
    let response = app
        .clone()
        .oneshot(multipart_request(
            "POST",
            "/posts",
            Some(&access),
            Some("Big picture"),
            Some("Too big"),
            Some(("huge.png", &oversized)),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(
        body["error"].as_str().unwrap().contains("upload limit"),
        "got {body}"
    );
}

#[tokio::test]
async fn test_update_post_keeps_cover_unless_replaced() {
    let (_, app) = spawn_app().await;
    let access = authenticate(&app).await;

    let response = app
        .clone()
        .oneshot(multipart_request(
            "POST",
            "/posts",
            Some(&access),
            Some("Original"),
            Some("Body"),
            Some(("first.png", b"first cover")),
        ))
        .await
        .unwrap();
    let created = body_json(response).await;
    let id = created["id"].as_i64().unwrap();
    let original_cover = created["cover_url"].as_str().unwrap().to_string();

    // Text-only update: the old cover survives.
    let response = app
        .clone()
        .oneshot(multipart_request(
            "PUT",
            &format!("/posts/{id}"),
            Some(&access),
            Some("Edited"),
            Some("New body"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body_json(response).await;
    assert_eq!(updated["title"], "Edited");
    assert_eq!(updated["cover_url"], original_cover.as_str());

    // Update with a file: the cover is replaced.
    let response = app
        .clone()
        .oneshot(multipart_request(
            "PUT",
            &format!("/posts/{id}"),
            Some(&access),
            Some("Edited again"),
            Some("Newer body"),
            Some(("second.png", b"second cover")),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let replaced = body_json(response).await;
    assert_ne!(replaced["cover_url"], original_cover.as_str());
}

#[tokio::test]
async fn test_update_missing_post_is_not_found() {
    let (_, app) = spawn_app().await;
    let access = authenticate(&app).await;

    let response = app
        .clone()
        .oneshot(multipart_request(
            "PUT",
            "/posts/9999",
            Some(&access),
            Some("Ghost"),
            Some("No such post"),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_post() {
    let (_, app) = spawn_app().await;
    let access = authenticate(&app).await;
    let created = create_post(&app, &access, "Doomed", "Short lived").await;
    let id = created["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(multipart_request(
            "DELETE",
            &format!("/posts/{id}"),
            Some(&access),
            None,
            None,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!({ "ok": true }));

    let gone = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/posts/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);

    // Deleting again reports the same absence.
    let again = app
        .clone()
        .oneshot(multipart_request(
            "DELETE",
            &format!("/posts/{id}"),
            Some(&access),
            None,
            None,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(again.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_post_creation_leaves_an_audit_trail() {
    let (_, app) = spawn_app().await;
    let access = authenticate(&app).await;
    let created = create_post(&app, &access, "Tracked", "Every move").await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/audit")
                .header(header::COOKIE, format!("access_token={access}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let events = body.as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["action"], "POST_CREATED");
    assert_eq!(events[0]["user_id"], created["author"]["id"]);
    assert_eq!(events[0]["meta"]["postId"], created["id"]);
}

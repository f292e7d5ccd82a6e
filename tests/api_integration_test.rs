mod common;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use common::{FakeToolRunner, MemoryStorage};
use http_body_util::BodyExt;
use rust_video_backend::config::AppConfig;
use rust_video_backend::infrastructure::database;
use rust_video_backend::utils::auth::create_jwt;
use rust_video_backend::{AppState, create_app};
use sea_orm::Database;
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

const BOUNDARY: &str = "tubely-test-boundary";
const SECRET: &str = "integration-secret";

struct TestApp {
    app: Router,
    storage: Arc<MemoryStorage>,
    _staging: TempDir,
    assets: TempDir,
}

async fn setup(max_upload_size: u64) -> TestApp {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    database::run_migrations(&db).await.unwrap();

    let staging = tempfile::tempdir().unwrap();
    let assets = tempfile::tempdir().unwrap();

    let mut config = AppConfig::default();
    config.jwt_secret = SECRET.to_string();
    config.staging_dir = staging.path().to_path_buf();
    config.assets_root = assets.path().to_path_buf();
    config.max_upload_size = max_upload_size;

    let storage = Arc::new(MemoryStorage::default());
    let state = AppState::new(
        db,
        storage.clone(),
        Arc::new(FakeToolRunner::new(1280, 720)),
        config,
    );

    TestApp {
        app: create_app(state),
        storage,
        _staging: staging,
        assets,
    }
}

fn token(user_id: Uuid) -> String {
    create_jwt(user_id, SECRET, chrono::Duration::hours(1)).unwrap()
}

fn multipart(field: &str, file_name: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(uri: &str, user_id: Uuid, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token(user_id)))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn create_video(app: &Router, user_id: Uuid, title: &str) -> Uuid {
    let request = Request::builder()
        .method("POST")
        .uri("/api/videos")
        .header(header::AUTHORIZATION, format!("Bearer {}", token(user_id)))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "title": title }).to_string()))
        .unwrap();
    let (status, body) = send(app, request).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    Uuid::parse_str(body["id"].as_str().unwrap()).unwrap()
}

fn get(uri: &str, user_id: Uuid) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token(user_id)))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn health_reports_dependencies() {
    let t = setup(1024).await;
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(&t.app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], "connected");
    assert_eq!(body["storage"], "connected");
}

#[tokio::test]
async fn requests_without_token_are_rejected() {
    let t = setup(1024).await;
    let request = Request::builder()
        .uri("/api/videos")
        .body(Body::empty())
        .unwrap();
    let response = t.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/api/videos")
        .header(header::AUTHORIZATION, "Bearer not-a-jwt")
        .body(Body::empty())
        .unwrap();
    let response = t.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn token_query_parameter_is_accepted() {
    let t = setup(1024).await;
    let user = Uuid::new_v4();
    let request = Request::builder()
        .uri(format!("/api/videos?token={}", token(user)))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&t.app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn create_requires_title() {
    let t = setup(1024).await;
    let request = Request::builder()
        .method("POST")
        .uri("/api/videos")
        .header(header::AUTHORIZATION, format!("Bearer {}", token(Uuid::new_v4())))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "title": "" }).to_string()))
        .unwrap();
    let (status, _) = send(&t.app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upload_video_end_to_end() {
    let t = setup(1024).await;
    let owner = Uuid::new_v4();
    let video_id = create_video(&t.app, owner, "Boots").await;

    let body = multipart("video", "boots.mp4", "video/mp4", b"fake mp4 bytes");
    let (status, json) = send(
        &t.app,
        upload_request(&format!("/api/video_upload/{video_id}"), owner, body),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");

    let key = format!("landscape/{video_id}.mp4");
    let url = json["video_url"].as_str().unwrap().to_string();
    assert!(url.starts_with(&format!("https://mock-s3.test/tubely/{key}?")), "{url}");
    assert!(t.storage.object("tubely", &key).is_some());

    // Each read signs afresh from the stored reference
    let (status, json) = send(&t.app, get(&format!("/api/videos/{video_id}"), owner)).await;
    assert_eq!(status, StatusCode::OK);
    let reread = json["video_url"].as_str().unwrap();
    assert_ne!(reread, url);
    assert!(reread.contains(&key));

    let (status, json) = send(&t.app, get("/api/videos", owner)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn upload_rejects_unsupported_media_type() {
    let t = setup(1024).await;
    let owner = Uuid::new_v4();
    let video_id = create_video(&t.app, owner, "Boots").await;

    let body = multipart("video", "boots.avi", "video/avi", b"RIFF....AVI ");
    let (status, json) = send(
        &t.app,
        upload_request(&format!("/api/video_upload/{video_id}"), owner, body),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Media type not allowed: video/avi");
    assert!(t.storage.keys().is_empty());
}

#[tokio::test]
async fn upload_by_other_user_is_unauthorized() {
    let t = setup(1024).await;
    let video_id = create_video(&t.app, Uuid::new_v4(), "Boots").await;

    let body = multipart("video", "boots.mp4", "video/mp4", b"fake mp4 bytes");
    let (status, json) = send(
        &t.app,
        upload_request(&format!("/api/video_upload/{video_id}"), Uuid::new_v4(), body),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "You don't own this video");
    assert!(t.storage.keys().is_empty());
}

#[tokio::test]
async fn upload_to_unknown_or_invalid_id() {
    let t = setup(1024).await;
    let user = Uuid::new_v4();

    let body = multipart("video", "boots.mp4", "video/mp4", b"bytes");
    let (status, _) = send(
        &t.app,
        upload_request(&format!("/api/video_upload/{}", Uuid::new_v4()), user, body),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let body = multipart("video", "boots.mp4", "video/mp4", b"bytes");
    let (status, json) = send(&t.app, upload_request("/api/video_upload/not-a-uuid", user, body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Invalid ID");
}

#[tokio::test]
async fn upload_over_size_ceiling() {
    let t = setup(8).await;
    let owner = Uuid::new_v4();
    let video_id = create_video(&t.app, owner, "Boots").await;

    let body = multipart("video", "boots.mp4", "video/mp4", &[0u8; 64]);
    let (status, _) = send(
        &t.app,
        upload_request(&format!("/api/video_upload/{video_id}"), owner, body),
    )
    .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(t.storage.keys().is_empty());
}

#[tokio::test]
async fn missing_video_field() {
    let t = setup(1024).await;
    let owner = Uuid::new_v4();
    let video_id = create_video(&t.app, owner, "Boots").await;

    let body = multipart("file", "boots.mp4", "video/mp4", b"bytes");
    let (status, json) = send(
        &t.app,
        upload_request(&format!("/api/video_upload/{video_id}"), owner, body),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Missing video field");
}

#[tokio::test]
async fn thumbnail_upload_is_served_from_assets() {
    let t = setup(1024).await;
    let owner = Uuid::new_v4();
    let video_id = create_video(&t.app, owner, "Boots").await;

    let body = multipart("thumbnail", "thumb.png", "image/png", b"\x89PNG\r\n\x1a\n");
    let (status, json) = send(
        &t.app,
        upload_request(&format!("/api/thumbnail_upload/{video_id}"), owner, body),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(
        json["thumbnail_url"],
        format!("http://localhost:8091/assets/{video_id}.png")
    );
    assert!(t.assets.path().join(format!("{video_id}.png")).exists());

    let request = Request::builder()
        .uri(format!("/assets/{video_id}.png"))
        .body(Body::empty())
        .unwrap();
    let response = t.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"\x89PNG\r\n\x1a\n");
}

#[tokio::test]
async fn thumbnail_rejects_gif() {
    let t = setup(1024).await;
    let owner = Uuid::new_v4();
    let video_id = create_video(&t.app, owner, "Boots").await;

    let body = multipart("thumbnail", "thumb.gif", "image/gif", b"GIF89a");
    let (status, _) = send(
        &t.app,
        upload_request(&format!("/api/thumbnail_upload/{video_id}"), owner, body),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(std::fs::read_dir(t.assets.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn get_video_of_other_user_is_unauthorized() {
    let t = setup(1024).await;
    let video_id = create_video(&t.app, Uuid::new_v4(), "Boots").await;
    let (status, _) = send(&t.app, get(&format!("/api/videos/{video_id}"), Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

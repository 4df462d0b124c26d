#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use image::{Rgb, RgbImage};
use tower::ServiceExt;

use atelier_api::auth::jwt::JwtConfig;
use atelier_api::config::{PoseConfig, ServerConfig};
use atelier_api::router::build_app_router;
use atelier_api::state::AppState;
use atelier_api::ws::SessionManager;
use atelier_core::error::FrameError;
use atelier_core::frame;
use atelier_core::pose::{FrameShape, Keypoint, Landmark, PoseResult, PoseScheme, LANDMARK_COUNT};
use atelier_core::{GarmentRenderer, MeasurementDeriver, MeasurementPolicy};
use atelier_db::MemoryFittingStore;
use atelier_pipeline::{FrameProcessingPipeline, PipelineConfig, PoseBackend, PoseEstimator};

pub const TEST_SECRET: &str = "test-secret-for-integration-tests";

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as CORS origin and no pose sources; tests
/// inject their own pipeline.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        database_url: None,
        jwt: JwtConfig {
            secret: TEST_SECRET.to_string(),
        },
        pose: PoseConfig {
            primary: None,
            secondary: None,
            min_confidence: 0.5,
            timeout_secs: 5,
        },
        max_frame_width: 640,
        jpeg_quality: 85,
        enhance_by_default: false,
        session_idle_timeout_secs: 30,
        heartbeat_interval_secs: 30,
        measurement_policy_path: None,
    }
}

// ---------------------------------------------------------------------------
// Fake pose backends
// ---------------------------------------------------------------------------

/// Returns a frontal pose at fixed normalized positions.
pub struct StandingPerson;

#[async_trait]
impl PoseBackend for StandingPerson {
    fn name(&self) -> &str {
        "standing"
    }

    async fn detect(&self, frame: Arc<RgbImage>) -> Result<PoseResult, FrameError> {
        let mut points = vec![Keypoint::default(); LANDMARK_COUNT];
        let mut set = |l: Landmark, x: f32, y: f32| points[l.index()] = Keypoint::new(x, y, 0.9);
        set(Landmark::Nose, 0.5, 0.1);
        set(Landmark::LeftShoulder, 0.4, 0.25);
        set(Landmark::RightShoulder, 0.6, 0.25);
        set(Landmark::LeftHip, 0.42, 0.55);
        set(Landmark::RightHip, 0.58, 0.55);
        set(Landmark::LeftAnkle, 0.45, 0.9);
        set(Landmark::RightAnkle, 0.55, 0.9);
        PoseResult::from_normalized(
            PoseScheme::BlazePose33,
            &points,
            FrameShape::new(frame.width(), frame.height()),
        )
    }
}

/// Never finds anyone.
pub struct EmptyRoom;

#[async_trait]
impl PoseBackend for EmptyRoom {
    fn name(&self) -> &str {
        "empty"
    }

    async fn detect(&self, _frame: Arc<RgbImage>) -> Result<PoseResult, FrameError> {
        Err(FrameError::NoPoseDetected)
    }
}

pub fn test_pipeline(backend: Arc<dyn PoseBackend>) -> Arc<FrameProcessingPipeline> {
    Arc::new(FrameProcessingPipeline::new(
        Arc::new(PoseEstimator::new(backend, None)),
        MeasurementDeriver::new(MeasurementPolicy::deterministic()),
        GarmentRenderer::default(),
        PipelineConfig::default(),
    ))
}

// ---------------------------------------------------------------------------
// App construction
// ---------------------------------------------------------------------------

/// Application state backed by the in-memory store and the given pipeline.
/// Sessions are marked ready whenever a pipeline is present.
pub fn test_state(pipeline: Option<Arc<FrameProcessingPipeline>>) -> AppState {
    let sessions = Arc::new(SessionManager::new());
    if pipeline.is_some() {
        sessions.mark_ready();
    }
    AppState {
        store: Arc::new(MemoryFittingStore::new()),
        config: Arc::new(test_config()),
        sessions,
        pipeline,
    }
}

/// Build the full application router with all middleware layers, with a
/// ready pipeline that always finds [`StandingPerson`].
pub fn build_test_app() -> Router {
    build_app_with(test_state(Some(test_pipeline(Arc::new(StandingPerson)))))
}

pub fn build_app_with(state: AppState) -> Router {
    build_app_router(state, &test_config())
}

// ---------------------------------------------------------------------------
// Tokens and payloads
// ---------------------------------------------------------------------------

/// Sign an access token the way the identity service would.
pub fn token(user_id: &str, role: &str) -> String {
    let claims = serde_json::json!({
        "sub": user_id,
        "role": role,
        "exp": chrono::Utc::now().timestamp() + 3600,
        "iat": chrono::Utc::now().timestamp(),
    });
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .expect("token encoding should succeed")
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb([90, 90, 90]));
    frame::encode_jpeg(&image, 85).expect("jpeg encoding should succeed")
}

pub fn frame_data_url(width: u32, height: u32) -> String {
    let image = RgbImage::from_pixel(width, height, Rgb([90, 90, 90]));
    frame::encode_data_url(&image, 85).expect("data url encoding should succeed")
}

pub const BOUNDARY: &str = "atelier-test-boundary";

/// Encode a multipart body with one file part and any number of text parts.
pub fn multipart_body(
    file: Option<(&str, &str, &[u8])>,
    fields: &[(&str, &str)],
) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((filename, content_type, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(
    app: Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, "GET", uri, None, None).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, "GET", uri, Some(token), None).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, "POST", uri, None, Some(body)).await
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response<Body> {
    send(app, "POST", uri, Some(token), Some(body)).await
}

pub async fn post_multipart_auth(
    app: Router,
    uri: &str,
    token: &str,
    body: Vec<u8>,
) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("Authorization", format!("Bearer {token}"))
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

//! HTTP-level integration tests for the `/measurements` endpoints.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::json;

use atelier_core::roles::ROLE_USER;
use common::{
    body_json, build_app_with, build_test_app, get, get_auth, jpeg_bytes, multipart_body,
    post_json_auth, post_multipart_auth, test_pipeline, test_state, token, EmptyRoom,
};

fn manual_entry() -> serde_json::Value {
    json!({
        "measurements": { "bust": 90.0, "waist": 70.0, "hips": 95.0, "height": 165.0 },
        "confidence": 0.9,
    })
}

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

#[tokio::test]
async fn upload_measures_and_stores_image() {
    let app = build_test_app();
    let alice = token("alice", ROLE_USER);
    let jpeg = jpeg_bytes(320, 480);
    let body = multipart_body(Some(("me.jpg", "image/jpeg", jpeg.as_slice())), &[]);

    let response = post_multipart_auth(app.clone(), "/api/v1/measurements/upload", &alice, body).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["measurement"]["user_id"], "alice");
    assert_eq!(json["data"]["measurement"]["image_filename"], "me.jpg");
    assert!(json["data"]["measurements"]["values"]["shoulder_width"].as_f64().unwrap() > 0.0);
    assert!(json["data"]["confidence"].as_f64().unwrap() > 0.0);

    let latest = get_auth(app, "/api/v1/measurements/latest", &alice).await;
    assert_eq!(latest.status(), StatusCode::OK);
    let json = body_json(latest).await;
    assert!(json["data"]["measurements"]["shoulder_width"].is_number());
}

#[tokio::test]
async fn upload_without_person_is_bad_request() {
    let app = build_app_with(test_state(Some(test_pipeline(Arc::new(EmptyRoom)))));
    let jpeg = jpeg_bytes(64, 64);
    let body = multipart_body(Some(("empty.jpg", "image/jpeg", jpeg.as_slice())), &[]);

    let response = post_multipart_auth(
        app,
        "/api/v1/measurements/upload",
        &token("alice", ROLE_USER),
        body,
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upload_of_corrupt_image_is_bad_request() {
    let body = multipart_body(Some(("broken.png", "image/png", &b"not a png"[..])), &[]);

    let response = post_multipart_auth(
        build_test_app(),
        "/api/v1/measurements/upload",
        &token("alice", ROLE_USER),
        body,
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"]
        .as_str()
        .unwrap()
        .contains("Could not process image"));
}

// ---------------------------------------------------------------------------
// Manual entry and history
// ---------------------------------------------------------------------------

#[tokio::test]
async fn measurements_require_auth() {
    let response = get(build_test_app(), "/api/v1/measurements").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_and_list_measurements() {
    let app = build_test_app();
    let alice = token("alice", ROLE_USER);

    for _ in 0..3 {
        let response = post_json_auth(app.clone(), "/api/v1/measurements", &alice, manual_entry()).await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = get_auth(app.clone(), "/api/v1/measurements?limit=2", &alice).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 2);

    let response = get_auth(app, "/api/v1/measurements", &token("bob", ROLE_USER)).await;
    let json = body_json(response).await;
    assert!(json["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn manual_confidence_defaults() {
    let response = post_json_auth(
        build_test_app(),
        "/api/v1/measurements",
        &token("alice", ROLE_USER),
        json!({ "measurements": { "waist": 70.0 } }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert!((json["data"]["confidence_score"].as_f64().unwrap() - 0.8).abs() < 1e-6);
}

#[tokio::test]
async fn invalid_manual_entries_are_rejected() {
    let app = build_test_app();
    let alice = token("alice", ROLE_USER);

    let empty = post_json_auth(app.clone(), "/api/v1/measurements", &alice, json!({ "measurements": {} })).await;
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

    let negative = post_json_auth(
        app.clone(),
        "/api/v1/measurements",
        &alice,
        json!({ "measurements": { "waist": -3.0 } }),
    )
    .await;
    assert_eq!(negative.status(), StatusCode::BAD_REQUEST);

    let confidence = post_json_auth(
        app,
        "/api/v1/measurements",
        &alice,
        json!({ "measurements": { "waist": 70.0 }, "confidence": 1.5 }),
    )
    .await;
    assert_eq!(confidence.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn latest_without_measurements_is_404() {
    let response = get_auth(
        build_test_app(),
        "/api/v1/measurements/latest",
        &token("alice", ROLE_USER),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn realtime_result_is_saved_as_capture() {
    let app = build_test_app();
    let alice = token("alice", ROLE_USER);

    let response = post_json_auth(
        app.clone(),
        "/api/v1/measurements/save-realtime",
        &alice,
        json!({ "measurements": { "bust": 36.2, "waist": 28.0 } }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["image_filename"], "realtime_capture");
    assert_eq!(json["data"]["measurements"]["bust"], 36.2);
    assert!((json["data"]["confidence_score"].as_f64().unwrap() - 0.8).abs() < 1e-6);

    let latest = body_json(get_auth(app.clone(), "/api/v1/measurements/latest", &alice).await).await;
    assert_eq!(latest["data"]["image_filename"], "realtime_capture");

    let empty = post_json_auth(
        app,
        "/api/v1/measurements/save-realtime",
        &alice,
        json!({ "measurements": {} }),
    )
    .await;
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Accuracy
// ---------------------------------------------------------------------------

#[tokio::test]
async fn accuracy_compares_against_manual_values() {
    let app = build_test_app();
    let alice = token("alice", ROLE_USER);

    let created = post_json_auth(app.clone(), "/api/v1/measurements", &alice, manual_entry()).await;
    let id = body_json(created).await["data"]["id"].as_i64().unwrap();

    let response = post_json_auth(
        app.clone(),
        &format!("/api/v1/measurements/{id}/accuracy"),
        &alice,
        json!({ "manual_measurements": { "bust": 100.0, "waist": 70.0 } }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["measurement_id"], id);
    assert_eq!(json["data"]["measurements"]["bust"]["difference"], 10.0);
    assert_eq!(json["data"]["measurements"]["bust"]["accuracy_percentage"], 90.0);
    assert_eq!(json["data"]["measurements"]["waist"]["accuracy_percentage"], 100.0);
    assert!(json["data"]["measurements"]["hips"].is_null());
    assert_eq!(json["data"]["overall_accuracy"], 95.0);

    // The manual values and metrics are kept on the record.
    let latest = get_auth(app, "/api/v1/measurements/latest", &alice).await;
    let json = body_json(latest).await;
    assert_eq!(json["data"]["manual_measurements"]["bust"], 100.0);
    assert_eq!(json["data"]["accuracy_metrics"]["overall_accuracy"], 95.0);
}

#[tokio::test]
async fn accuracy_of_someone_elses_measurement_is_404() {
    let app = build_test_app();

    let created = post_json_auth(
        app.clone(),
        "/api/v1/measurements",
        &token("alice", ROLE_USER),
        manual_entry(),
    )
    .await;
    let id = body_json(created).await["data"]["id"].as_i64().unwrap();

    let response = post_json_auth(
        app,
        &format!("/api/v1/measurements/{id}/accuracy"),
        &token("bob", ROLE_USER),
        json!({ "manual_measurements": { "bust": 100.0 } }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

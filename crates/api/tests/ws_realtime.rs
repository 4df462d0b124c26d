//! End-to-end tests of the measurement-only stream over a real WebSocket.

mod common;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use atelier_api::config::ServerConfig;
use atelier_api::state::AppState;
use atelier_core::roles::ROLE_USER;
use common::{
    build_app_with, frame_data_url, test_config, test_pipeline, test_state, token, EmptyRoom,
    StandingPerson,
};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn serve(state: AppState) -> SocketAddr {
    let app = build_app_with(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn next_json(client: &mut Client) -> Value {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(10), client.next())
            .await
            .expect("timed out waiting for a message")
            .expect("stream ended")
            .expect("receive failed");
        if let Message::Text(text) = message {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn send_json(client: &mut Client, value: Value) {
    client.send(Message::Text(value.to_string())).await.unwrap();
}

async fn connect(addr: SocketAddr, query: &str) -> Client {
    let (client, _) = connect_async(format!("ws://{addr}/api/v1/measurements/realtime{query}"))
        .await
        .unwrap();
    client
}

// ---------------------------------------------------------------------------
// Test: measuring frames
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stream_measures_each_frame() {
    let addr = serve(test_state(Some(test_pipeline(Arc::new(StandingPerson))))).await;
    let mut client = connect(addr, &format!("?token={}", token("alice", ROLE_USER))).await;

    let welcome = next_json(&mut client).await;
    assert_eq!(welcome["type"], "connection_established");
    assert_eq!(welcome["user_id"], "alice");

    send_json(&mut client, json!({ "type": "frame", "image": frame_data_url(320, 240) })).await;
    let update = next_json(&mut client).await;
    assert_eq!(update["type"], "measurement_update");
    assert!(update["measurements"]["values"]["bust"].is_number());
    assert!(update["confidence"].as_f64().unwrap() > 0.0);

    send_json(&mut client, json!({ "type": "frame", "image": "not base64!" })).await;
    assert_eq!(next_json(&mut client).await["type"], "decode_error");

    send_json(&mut client, json!({ "type": "heartbeat" })).await;
    assert_eq!(next_json(&mut client).await["type"], "heartbeat");

    // No image at all also counts as a heartbeat.
    send_json(&mut client, json!({ "type": "frame" })).await;
    assert_eq!(next_json(&mut client).await["type"], "heartbeat");

    client.send(Message::Text("{oops".to_string())).await.unwrap();
    assert_eq!(next_json(&mut client).await["type"], "error");

    client.close(None).await.unwrap();
}

#[tokio::test]
async fn frame_without_person_is_a_measurement_error() {
    let addr = serve(test_state(Some(test_pipeline(Arc::new(EmptyRoom))))).await;
    let mut client = connect(addr, "").await;

    let welcome = next_json(&mut client).await;
    assert!(welcome["user_id"].is_null());

    send_json(&mut client, json!({ "image": frame_data_url(64, 48) })).await;
    let reply = next_json(&mut client).await;
    assert_eq!(reply["type"], "measurement_error");
    assert!(reply["error"].as_str().unwrap().to_lowercase().contains("pose"));
}

#[tokio::test]
async fn silent_client_is_pinged() {
    let state = AppState {
        config: Arc::new(ServerConfig {
            session_idle_timeout_secs: 1,
            ..test_config()
        }),
        ..test_state(Some(test_pipeline(Arc::new(StandingPerson))))
    };
    let addr = serve(state).await;
    let mut client = connect(addr, "").await;

    assert_eq!(next_json(&mut client).await["type"], "connection_established");
    assert_eq!(next_json(&mut client).await["type"], "ping");

    // Still open after the ping.
    send_json(&mut client, json!({ "type": "heartbeat" })).await;
    assert_eq!(next_json(&mut client).await["type"], "heartbeat");
}

// ---------------------------------------------------------------------------
// Test: upgrade refusals
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stream_refused_until_ready() {
    let addr = serve(test_state(None)).await;

    let result = connect_async(format!("ws://{addr}/api/v1/measurements/realtime")).await;

    match result {
        Err(WsError::Http(response)) => assert_eq!(response.status(), 503),
        other => panic!("expected HTTP 503, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn stream_refused_with_invalid_token() {
    let addr = serve(test_state(Some(test_pipeline(Arc::new(StandingPerson))))).await;

    let result =
        connect_async(format!("ws://{addr}/api/v1/measurements/realtime?token=not-a-jwt")).await;

    match result {
        Err(WsError::Http(response)) => assert_eq!(response.status(), 401),
        other => panic!("expected HTTP 401, got {:?}", other.map(|_| ())),
    }
}

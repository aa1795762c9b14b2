//! Two-phase relay tests against a local internal API server

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use gitgate::customaction::CustomAction;
use gitgate_net::verifier::{AccessDecision, CustomPayload, CustomPayloadData};
use gitgate_net::Client;
use serde_json::{json, Value};
use tokio::net::TcpListener;

const WHO: &str = "key-1";

fn decision(info_endpoint: &str, pack_endpoint: &str) -> AccessDecision {
    AccessDecision {
        success: true,
        who: WHO.to_string(),
        payload: Some(CustomPayload {
            action: "geo_proxy_to_primary".to_string(),
            data: CustomPayloadData {
                api_endpoints: vec![info_endpoint.to_string(), pack_endpoint.to_string()],
                username: "custom".to_string(),
                primary_repo: "https://repo/path".to_string(),
                ..Default::default()
            },
        }),
        ..Default::default()
    }
}

fn assert_identity(request: &Value) {
    assert_eq!(request["data"]["gl_id"], WHO);
    assert_eq!(request["data"]["gl_username"], "custom");
}

async fn start_test_server(expected_pack_output: &'static str) -> SocketAddr {
    let info = |Json(request): Json<Value>| async move {
        assert_identity(&request);
        assert_eq!(request["output"], "");
        Json(json!({"result": BASE64.encode("custom")}))
    };

    let pack = move |Json(request): Json<Value>| async move {
        assert_identity(&request);
        let output = BASE64
            .decode(request["output"].as_str().unwrap())
            .unwrap();
        assert_eq!(output, expected_pack_output.as_bytes());
        Json(json!({"result": BASE64.encode("output")}))
    };

    let router = Router::new()
        .route("/geo/proxy/info_refs", post(info))
        .route("/geo/proxy/pack", post(pack));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    addr
}

fn client(addr: SocketAddr) -> Client {
    Client::new(&format!("http://{addr}"), &HashMap::new()).unwrap()
}

#[tokio::test]
async fn relays_a_previously_captured_buffer() {
    let addr = start_test_server("input").await;

    let input = std::io::Cursor::new(b"input".to_vec());
    let mut output = Vec::new();

    let action = CustomAction::new(client(addr), input, &mut output, true);
    action
        .execute(&decision("/geo/proxy/info_refs", "/geo/proxy/pack"))
        .await
        .unwrap();

    // "custom" from the info call, "output" from the pack call.
    assert_eq!(output, b"customoutput");
}

#[tokio::test]
async fn relays_the_live_input_stream() {
    let addr = start_test_server("0032want 343d70886785dc1f98aaf70f3b4ca87c93a5d0dd\n").await;

    let input = std::io::Cursor::new(b"0032want 343d70886785dc1f98aaf70f3b4ca87c93a5d0dd\n".to_vec());
    let mut output = Vec::new();

    let action = CustomAction::new(client(addr), input, &mut output, false);
    action
        .execute(&decision("/geo/proxy/info_refs", "/geo/proxy/pack"))
        .await
        .unwrap();

    assert_eq!(output, b"customoutput");
}

#[tokio::test]
async fn a_failed_info_call_stops_the_exchange() {
    let pack_called = Arc::new(AtomicBool::new(false));

    let info = || async { (StatusCode::BAD_GATEWAY, Json(json!({"message": "primary down"}))) };
    let pack = |State(called): State<Arc<AtomicBool>>| async move {
        called.store(true, Ordering::SeqCst);
        Json(json!({"result": ""}))
    };

    let router = Router::new()
        .route("/geo/proxy/info_refs", post(info))
        .route("/geo/proxy/pack", post(pack))
        .with_state(pack_called.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let input = std::io::Cursor::new(b"input".to_vec());
    let mut output = Vec::new();

    let action = CustomAction::new(client(addr), input, &mut output, false);
    let err = action
        .execute(&decision("/geo/proxy/info_refs", "/geo/proxy/pack"))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("/geo/proxy/info_refs"));
    assert_eq!(err.root_cause().to_string(), "primary down");
    assert!(output.is_empty());
    assert!(!pack_called.load(Ordering::SeqCst));
}

#[tokio::test]
async fn an_empty_endpoint_list_never_reaches_the_network() {
    let mut no_endpoints = decision("/a", "/b");
    no_endpoints
        .payload
        .as_mut()
        .unwrap()
        .data
        .api_endpoints
        .clear();

    // Unroutable client: any request attempt would fail loudly anyway.
    let client = Client::new("http://127.0.0.1:1", &HashMap::new()).unwrap();
    let input = std::io::Cursor::new(Vec::new());
    let mut output = Vec::new();

    let err = CustomAction::new(client, input, &mut output, false)
        .execute(&no_endpoints)
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "custom action expects an info and a pack endpoint, got 0"
    );
}

//! Access verification tests against a local internal API server

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use gitgate_net::sshenv::Env;
use gitgate_net::verifier::Verifier;
use gitgate_net::{Client, Error};
use serde_json::{json, Value};
use tokio::net::TcpListener;

async fn allowed_handler(headers: HeaderMap, Json(request): Json<Value>) -> impl IntoResponse {
    assert_eq!(headers.get("Gitlab-Shared-Secret").unwrap(), "c2VjcmV0");

    assert_eq!(request["protocol"], "ssh");
    assert_eq!(request["changes"], "_any");
    assert_eq!(request["check_ip"], "10.0.0.1");

    match request["key_id"].as_str() {
        Some("1") => Json(json!({
            "status": true,
            "gl_repository": "project-26",
            "gl_id": "user-6",
            "gl_username": "jane.doe",
            "gitaly": {"address": "tcp://localhost:9999", "token": "token"}
        }))
        .into_response(),
        Some("404") => (
            StatusCode::NOT_FOUND,
            Json(json!({"status": false, "message": "Repository not found"})),
        )
            .into_response(),
        _ => Json(json!({"status": false, "message": "Access denied"})).into_response(),
    }
}

async fn start_test_server() -> SocketAddr {
    let router = Router::new().route("/api/v4/internal/allowed", post(allowed_handler));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    addr
}

fn env() -> Env {
    Env {
        remote_addr: "10.0.0.1".to_string(),
        is_ssh_connection: true,
        ..Default::default()
    }
}

async fn setup() -> Verifier {
    let addr = start_test_server().await;
    let headers = HashMap::from([(
        "Gitlab-Shared-Secret".to_string(),
        "c2VjcmV0".to_string(),
    )]);
    Verifier::new(Client::new(&format!("http://{addr}"), &headers).unwrap())
}

#[tokio::test]
async fn allowed_key_gets_a_routing_decision() {
    let verifier = setup().await;

    let decision = verifier
        .verify("key-1", "git-upload-pack", "group/project.git", &env())
        .await
        .unwrap();

    assert!(decision.success);
    assert_eq!(decision.who, "key-1");
    assert_eq!(decision.username, "jane.doe");
    assert_eq!(decision.gitaly.address, "tcp://localhost:9999");
}

#[tokio::test]
async fn denied_key_surfaces_the_server_message() {
    let verifier = setup().await;

    let err = verifier
        .verify("key-2", "git-receive-pack", "group/project.git", &env())
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Access denied");
}

#[tokio::test]
async fn api_errors_carry_the_reported_message() {
    let verifier = setup().await;

    let err = verifier
        .verify("key-404", "git-upload-pack", "group/missing.git", &env())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Api(_)));
    assert_eq!(err.to_string(), "Repository not found");
}

use std::{sync::Arc, time::Duration};

use axum::{
    body::Bytes,
    http::{header, HeaderMap, StatusCode as HttpStatus},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use storage::MemoryStore;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
};

use super::*;

/// Echoes what arrived so tests can inspect the encoding.
async fn echo(headers: HeaderMap, body: Bytes) -> Json<Value> {
    let header_text = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };
    Json(json!({
        "content_type": header_text(header::CONTENT_TYPE),
        "authorization": header_text(header::AUTHORIZATION),
        "body": String::from_utf8_lossy(&body),
    }))
}

async fn spawn_echo_server() -> anyhow::Result<String> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = Router::new()
        .route("/api/echo/", post(echo))
        .route("/api/empty/", post(|| async { HttpStatus::NO_CONTENT }))
        .route(
            "/api/slow/",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({ "late": true }))
            }),
        )
        .route(
            "/api/broken/",
            post(|| async {
                (
                    HttpStatus::BAD_REQUEST,
                    Json(json!({ "error": { "name": ["This field is required."] } })),
                )
            }),
        );
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}/api/"))
}

/// Answers every request with a 200 header straight away and holds the
/// body back for `body_delay`.
async fn spawn_stalling_server(body_delay: Duration) -> anyhow::Result<String> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut request = [0u8; 4096];
                let _ = socket.read(&mut request).await;
                let body = br#"{"late":true}"#;
                let head = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\n\r\n",
                    body.len()
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.flush().await;
                tokio::time::sleep(body_delay).await;
                let _ = socket.write_all(body).await;
            });
        }
    });
    Ok(format!("http://{addr}/api/"))
}

fn dispatcher(base_url: &str) -> Dispatcher {
    let settings = Settings {
        api_base_url: base_url.to_string(),
        ..Settings::default()
    };
    Dispatcher::new(&settings, AuthState::new(Arc::new(MemoryStore::new()))).expect("dispatcher")
}

#[test]
fn error_string_becomes_message() {
    let payload = normalize_error(StatusCode::UNAUTHORIZED, r#"{"error":"Invalid credentials"}"#);
    assert_eq!(payload.message, "Invalid credentials");
    assert_eq!(payload.status_code, Some(401));
    assert_eq!(payload.field_errors, None);
}

#[test]
fn error_object_becomes_field_errors() {
    let payload = normalize_error(
        StatusCode::BAD_REQUEST,
        r#"{"error":{"email":["Enter a valid email address."],"password":"Too short"}}"#,
    );
    assert_eq!(payload.message, "Validation failed");
    assert_eq!(payload.field_error("email"), Some("Enter a valid email address."));
    assert_eq!(payload.field_error("password"), Some("Too short"));
}

#[test]
fn detail_and_message_bodies_are_recognised() {
    let detail = normalize_error(StatusCode::FORBIDDEN, r#"{"detail":"Not allowed"}"#);
    assert_eq!(detail.message, "Not allowed");

    let message = normalize_error(StatusCode::NOT_FOUND, r#"{"message":"No course"}"#);
    assert_eq!(message.message, "No course");
}

#[test]
fn bare_field_map_is_treated_as_validation() {
    let payload = normalize_error(StatusCode::BAD_REQUEST, r#"{"name":["required","too short"]}"#);
    assert_eq!(payload.message, "Validation failed");
    assert_eq!(payload.field_error("name"), Some("required too short"));
}

#[test]
fn unrecognised_bodies_fall_back_to_text_or_status() {
    let html = normalize_error(StatusCode::INTERNAL_SERVER_ERROR, "<html>oops</html>");
    assert_eq!(html.message, "Internal Server Error");
    assert_eq!(html.status_code, Some(500));

    let plain = normalize_error(StatusCode::BAD_GATEWAY, "upstream down");
    assert_eq!(plain.message, "upstream down");
}

#[test]
fn form_builder_skips_nulls_and_detects_files() {
    let operation = Operation::post("x/")
        .form_from(&json!({ "name": "Sprint", "description": null, "is_active": true }))
        .expect("form");
    assert!(!operation.body.has_file());
    let RequestBody::Form(parts) = &operation.body else {
        panic!("expected form body");
    };
    assert_eq!(parts.len(), 2);

    let with_file = operation.with_file(
        "attachment",
        Attachment {
            filename: "plan.txt".into(),
            mime_type: Some("text/plain".into()),
            bytes: b"week one".to_vec(),
        },
    );
    assert!(with_file.body.has_file());
}

#[tokio::test]
async fn form_without_file_is_sent_as_json() {
    let base = spawn_echo_server().await.expect("spawn server");
    let echoed = dispatcher(&base)
        .execute(
            Operation::post("echo/")
                .form_from(&json!({ "name": "Sprint 1", "is_active": true }))
                .expect("form"),
        )
        .await
        .expect("echo");

    assert!(echoed["content_type"]
        .as_str()
        .expect("content type")
        .starts_with("application/json"));
    let sent: Value = serde_json::from_str(echoed["body"].as_str().expect("body")).expect("json");
    assert_eq!(sent, json!({ "name": "Sprint 1", "is_active": true }));
    assert_eq!(echoed["authorization"], "");
}

#[tokio::test]
async fn form_with_file_is_sent_multipart() {
    let base = spawn_echo_server().await.expect("spawn server");
    let operation = Operation::post("echo/")
        .form_from(&json!({ "full_name": "Ada" }))
        .expect("form")
        .with_file(
            "profile_picture",
            Attachment {
                filename: "ada.png".into(),
                mime_type: Some("image/png".into()),
                bytes: vec![0x89, 0x50, 0x4e, 0x47],
            },
        );

    let echoed = dispatcher(&base).execute(operation).await.expect("echo");
    assert!(echoed["content_type"]
        .as_str()
        .expect("content type")
        .starts_with("multipart/form-data"));
    let body = echoed["body"].as_str().expect("body");
    assert!(body.contains("name=\"full_name\""));
    assert!(body.contains("filename=\"ada.png\""));
}

#[tokio::test]
async fn bearer_token_is_attached_when_signed_in() {
    let base = spawn_echo_server().await.expect("spawn server");
    let dispatcher = dispatcher(&base);
    let user = serde_json::from_value(json!({ "email": "a@b.co" })).expect("user");
    dispatcher
        .auth()
        .set_auth(
            user,
            shared::domain::AuthTokens {
                access: "acc-9".into(),
                refresh: "ref-9".into(),
            },
        )
        .await
        .expect("set auth");

    let echoed = dispatcher
        .execute(Operation::post("echo/").json(&json!({})).expect("json"))
        .await
        .expect("echo");
    assert_eq!(echoed["authorization"], "Bearer acc-9");
}

#[tokio::test]
async fn empty_success_body_is_null() {
    let base = spawn_echo_server().await.expect("spawn server");
    let value = dispatcher(&base)
        .execute(Operation::post("empty/"))
        .await
        .expect("empty");
    assert_eq!(value, Value::Null);
}

#[tokio::test]
async fn server_error_carries_status_and_fields() {
    let base = spawn_echo_server().await.expect("spawn server");
    let err = dispatcher(&base)
        .execute(Operation::post("broken/").json(&json!({})).expect("json"))
        .await
        .expect_err("bad request");
    let DispatchError::Failed(payload) = err else {
        panic!("expected a failed request");
    };
    assert_eq!(payload.status_code, Some(400));
    assert_eq!(payload.field_error("name"), Some("This field is required."));
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let err = dispatcher(&format!("http://{addr}/api/"))
        .execute(Operation::get("courses/get/"))
        .await
        .expect_err("connection refused");
    let DispatchError::Failed(payload) = err else {
        panic!("expected a failed request");
    };
    assert_eq!(payload.status_code, None);
    assert_eq!(payload.category(), shared::error::ErrorCategory::Transport);
}

#[tokio::test]
async fn cancellation_wins_over_a_slow_response() {
    let base = spawn_echo_server().await.expect("spawn server");
    let token = CancellationToken::new();
    let scoped = dispatcher(&base).with_cancellation(token.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });
    let outcome = scoped.execute(Operation::get("slow/")).await;
    canceller.await.expect("canceller");
    assert_eq!(outcome, Err(DispatchError::Cancelled));
}

#[tokio::test]
async fn cancellation_covers_a_body_still_in_flight() {
    let base = spawn_stalling_server(Duration::from_secs(3))
        .await
        .expect("spawn server");
    let token = CancellationToken::new();
    let scoped = dispatcher(&base).with_cancellation(token.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        token.cancel();
    });
    let started = std::time::Instant::now();
    let outcome = scoped.execute(Operation::get("courses/get/")).await;
    canceller.await.expect("canceller");

    assert_eq!(outcome, Err(DispatchError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(scoped.is_cancelled());
}

#[tokio::test]
async fn base_url_without_trailing_slash_keeps_its_path() {
    let base = spawn_echo_server().await.expect("spawn server");
    let dispatcher = dispatcher(base.trim_end_matches('/'));

    let echoed = dispatcher
        .execute(Operation::post("echo/").json(&json!({ "n": 1 })).expect("json"))
        .await
        .expect("echo under /api/");
    let sent: Value = serde_json::from_str(echoed["body"].as_str().expect("body")).expect("json");
    assert_eq!(sent, json!({ "n": 1 }));
}

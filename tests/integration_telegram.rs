use cfstats::clients::{ApiError, NotificationSink, TelegramSink};
use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Integration tests for Telegram delivery against a mock Bot API

fn sink(server: &MockServer) -> TelegramSink {
    TelegramSink::with_base_url(&server.uri(), "123:abc", "42", Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_send_text_posts_markdown_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMessage"))
        .and(body_string_contains("chat_id=42"))
        .and(body_string_contains("parse_mode=Markdown"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": {}})))
        .expect(1)
        .mount(&server)
        .await;

    sink(&server).send_text("hello").await.unwrap();
}

#[tokio::test]
async fn test_rejected_markdown_is_resent_as_plain_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMessage"))
        .and(body_string_contains("parse_mode=Markdown"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "ok": false,
            "error_code": 400,
            "description": "Bad Request: can't parse entities: Can't find end of the entity"
        })))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMessage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    sink(&server).send_text("- my_project: 10 requests").await.unwrap();
}

#[tokio::test]
async fn test_ok_false_is_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMessage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": false,
            "description": "chat not found"
        })))
        .mount(&server)
        .await;

    let err = sink(&server).send_text("hello").await.unwrap_err();
    assert!(matches!(err, ApiError::Api { ref message } if message == "chat not found"));
}

#[tokio::test]
async fn test_bad_token_is_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMessage"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .mount(&server)
        .await;

    let err = sink(&server).send_text("hello").await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized { status: 401 }));
}

#[tokio::test]
async fn test_png_chart_goes_out_as_photo() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendPhoto"))
        .and(body_string_contains("name=\"photo\"; filename=\"pages_trend.png\""))
        .and(body_string_contains("Pages request trend"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let chart = temp_dir.path().join("pages_trend.png");
    std::fs::write(&chart, "placeholder image bytes").unwrap();

    sink(&server).send_image(&chart, "📄 Pages request trend").await.unwrap();
}

#[tokio::test]
async fn test_missing_image_file_is_io_error() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();

    let err = sink(&server)
        .send_image(&temp_dir.path().join("gone.png"), "caption")
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Io(_)));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

use cfstats::clients::{ApiError, CloudflareClient, MetricsClient};
use cfstats::models::{Resource, ResourceKind, TimeWindow};
use chrono::{TimeZone, Utc};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Integration tests for the Cloudflare analytics client
/// Each test runs against a local mock of the v4 API

fn client(server: &MockServer) -> CloudflareClient {
    CloudflareClient::with_base_url(&server.uri(), "acct", "cf-token", Duration::from_secs(5))
        .unwrap()
}

fn window() -> TimeWindow {
    TimeWindow::trailing_day(Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap())
}

#[tokio::test]
async fn test_list_pages_projects_with_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts/acct/pages/projects"))
        .and(header("authorization", "Bearer cf-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "errors": [],
            "result": [
                {"name": "blog", "id": "p-1", "subdomain": "blog.pages.dev"},
                {"name": "docs", "id": "p-2"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let resources = client(&server).list_resources(ResourceKind::PageProject).await.unwrap();

    assert_eq!(
        resources,
        vec![Resource::new("blog").with_id("p-1"), Resource::new("docs").with_id("p-2")]
    );
}

#[tokio::test]
async fn test_list_workers_services() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts/acct/workers/services"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "result": [{"name": "api"}]
        })))
        .mount(&server)
        .await;

    let resources = client(&server).list_resources(ResourceKind::WorkerService).await.unwrap();

    assert_eq!(resources, vec![Resource::new("api")]);
}

#[tokio::test]
async fn test_pages_count_uses_project_id_and_rfc3339_window() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts/acct/analytics/pages/projects/p-1/requests"))
        .and(query_param("since", "2024-03-14T12:00:00Z"))
        .and(query_param("until", "2024-03-15T12:00:00Z"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "result": {"all": {"requests": 1234}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let count = client(&server)
        .fetch_count(ResourceKind::PageProject, &Resource::new("blog").with_id("p-1"), &window())
        .await
        .unwrap();

    assert_eq!(count, 1234);
}

#[tokio::test]
async fn test_workers_count_uses_service_name_and_unix_window() {
    let server = MockServer::start().await;
    let w = window();
    Mock::given(method("GET"))
        .and(path("/accounts/acct/workers/analytics/requests"))
        .and(query_param("service", "api"))
        .and(query_param("from", w.start.timestamp().to_string()))
        .and(query_param("to", w.end.timestamp().to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "result": {"sum": {"requests": 98765}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let count = client(&server)
        .fetch_count(ResourceKind::WorkerService, &Resource::new("api"), &w)
        .await
        .unwrap();

    assert_eq!(count, 98765);
}

#[tokio::test]
async fn test_missing_requests_field_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts/acct/workers/analytics/requests"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "result": {}
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .fetch_count(ResourceKind::WorkerService, &Resource::new("api"), &window())
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::MissingField { field: "result.sum.requests" }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_unsuccessful_envelope_becomes_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts/acct/pages/projects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "errors": [{"code": 7003, "message": "Could not route to /accounts/acct"}],
            "result": null
        })))
        .mount(&server)
        .await;

    let err = client(&server).list_resources(ResourceKind::PageProject).await.unwrap_err();

    match err {
        ApiError::Api { message } => {
            assert!(message.contains("Could not route") && message.contains("7003"))
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_forbidden_is_unauthorized_and_not_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts/acct/workers/services"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let err = client(&server).list_resources(ResourceKind::WorkerService).await.unwrap_err();

    assert!(matches!(err, ApiError::Unauthorized { status: 403 }));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_server_error_is_retryable_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts/acct/pages/projects"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let err = client(&server).list_resources(ResourceKind::PageProject).await.unwrap_err();

    assert!(matches!(err, ApiError::Status { status: 502, ref body } if body == "bad gateway"));
    assert!(err.is_retryable());
}

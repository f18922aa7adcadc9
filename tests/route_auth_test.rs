// Request-level checks on the router that never reach the database:
// cron credentials, admin token gating and request validation envelopes.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use consortium_stats_api::build_router;
use consortium_stats_api::middleware::auth::issue_token;
use tower::ServiceExt;

mod test_helpers;
use test_helpers::*;

async fn send(request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let app = build_router(offline_app_state());
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, body)
}

fn get(uri: &str, authorization: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(value) = authorization {
        builder = builder.header("authorization", value);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_is_open() {
    let app = build_router(offline_app_state());
    let response = app.oneshot(get("/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_cron_without_credentials_is_401() {
    let (status, body) = send(get("/api/cron/process-scheduled-events", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");
}

#[tokio::test]
async fn test_cron_with_wrong_secret_is_401() {
    let (status, _) = send(get("/api/cron/process-scheduled-events", Some("Bearer not-the-secret"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_cron_platform_header_is_refused_when_disabled() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/cron/process-scheduled-events")
        .header("x-vercel-cron", "1")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_routes_require_token() {
    for uri in ["/api/scheduled-events", "/api/library-years", "/api/scheduled-events/1"] {
        let (status, body) = send(get(uri, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
        assert!(body["detail"].is_string());
    }
}

#[tokio::test]
async fn test_copy_records_rejects_garbage_token() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/copy-records")
        .header("authorization", "Bearer not.a.jwt")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"table":"av","recordIds":[1],"targetYear":2025}"#))
        .unwrap();
    let (status, _) = send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_signed_with_other_secret_is_401() {
    let token = issue_token("ops@example.org", "admin", "some-other-secret", 60).unwrap();
    let (status, _) = send(get("/api/scheduled-events", Some(&format!("Bearer {}", token)))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_member_token_is_403() {
    let token = issue_token("member@example.org", "member", TEST_JWT_SECRET, 60).unwrap();
    let (status, body) = send(get("/api/scheduled-events", Some(&format!("Bearer {}", token)))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Forbidden");
}

#[tokio::test]
async fn test_admin_copy_with_invalid_body_is_rejected_before_database() {
    let token = issue_token("ops@example.org", "admin", TEST_JWT_SECRET, 60).unwrap();
    let request = Request::builder()
        .method("POST")
        .uri("/api/copy-records")
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(r#"{"table":"av","recordIds":[],"targetYear":2025}"#))
        .unwrap();
    let (status, body) = send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid request");
    assert_eq!(body["detail"], "recordIds must not be empty");
}

fn admin_json(method: &str, uri: &str, body: &str) -> Request<Body> {
    let token = issue_token("ops@example.org", "admin", TEST_JWT_SECRET, 60).unwrap();
    Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_copy_with_unknown_table_is_400_envelope() {
    let request = admin_json(
        "POST",
        "/api/copy-records",
        r#"{"table":"fiscal","recordIds":[1],"targetYear":2025}"#,
    );
    let (status, body) = send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid request");
    assert!(body["detail"].as_str().unwrap().contains("fiscal"));
}

#[tokio::test]
async fn test_copy_without_target_year_is_400_envelope() {
    let (status, body) = send(admin_json("POST", "/api/copy-records", r#"{"table":"av","recordIds":[1]}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("targetYear"));
}

#[tokio::test]
async fn test_event_with_bad_date_is_400_envelope() {
    let request = admin_json(
        "POST",
        "/api/scheduled-events",
        r#"{"eventType":"FORM_OPENING","scheduledDate":"09/01/2025"}"#,
    );
    let (status, body) = send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid request");
    assert!(body["detail"].as_str().unwrap().contains("scheduledDate"));
}

#[tokio::test]
async fn test_non_numeric_event_id_is_400_envelope() {
    for method in ["GET", "DELETE"] {
        let (status, body) = send(admin_json(method, "/api/scheduled-events/abc", "")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", method);
        assert_eq!(body["error"], "Invalid request");
    }
}

#[tokio::test]
async fn test_non_numeric_year_filter_is_400_envelope() {
    let (status, body) = send(admin_json("GET", "/api/library-years?year=last", "")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid request");
}

//! Security inspection, rate limiting and routing through the full stack.

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::json;

use ingress_guard::error::ErrorCode;
use ingress_guard::observability::alerts::AlertKind;
use ingress_guard::pipeline::RequestPhase;

mod common;
use common::{request, TestGuard, ADMIN_TOKEN, PLAYER_TOKEN};

#[tokio::test]
async fn test_automated_agent_blocked_and_audited() {
    let guard = TestGuard::new(common::config());

    let req = Request::builder()
        .method("POST")
        .uri("/api/auth/register")
        .header(header::USER_AGENT, "curl/8.4.0")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"username": "kofi"}"#))
        .unwrap();
    let res = guard.send(req).await;

    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.code(), "SECURITY_VIOLATION");
    assert_eq!(res.body["error"]["message"], "Access denied due to security policy.");
    assert!(res.body["error"]["timestamp"].as_str().is_some());

    let entries = guard.audit.entries();
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.correlation_id.to_string(), res.request_id());
    assert_eq!(entry.status, 403);
    assert_eq!(entry.error_code, Some(ErrorCode::SecurityViolation));
    assert_eq!(entry.identity, "addr:203.0.113.7");
    assert_eq!(
        entry.phases,
        vec![RequestPhase::Received, RequestPhase::Rejected, RequestPhase::Logged]
    );
    assert_eq!(guard.directory.user_count(), 0);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let alerts = guard.alerts.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].kind, AlertKind::Security);
    assert_eq!(alerts[0].correlation_id, entry.correlation_id);
}

#[tokio::test]
async fn test_blocked_request_is_audited_with_secrets_redacted() {
    let guard = TestGuard::new(common::config());

    let req = Request::builder()
        .method("POST")
        .uri("/api/auth/register")
        .header(header::USER_AGENT, "curl/8.4.0")
        .header(header::AUTHORIZATION, "Token leaked-api-key")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({"username": "kofi", "password": "Pitch!Side9", "token": "abc123"}).to_string(),
        ))
        .unwrap();
    let res = guard.send(req).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let entry = guard.audit.entries().pop().unwrap();
    assert_eq!(entry.payload["password"], "[REDACTED]");
    assert_eq!(entry.payload["token"], "[REDACTED]");
    assert_eq!(entry.payload["username"], "kofi");
    assert_eq!(entry.headers["authorization"], "[REDACTED]");
    assert!(!serde_json::to_string(&entry).unwrap().contains("Pitch!Side9"));
}

#[tokio::test]
async fn test_injection_in_body_blocked_before_validation() {
    let guard = TestGuard::new(common::config());
    let res = guard
        .send(request(
            "POST",
            "/api/auth/register",
            Some(json!({"username": "x' OR 1=1", "email": "not-an-email"})),
            None,
        ))
        .await;

    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.code(), "SECURITY_VIOLATION");
    assert_eq!(res.body["error"]["details"], json!(["reason: injection_suspected"]));
}

#[tokio::test]
async fn test_missing_user_agent_blocked() {
    let guard = TestGuard::new(common::config());
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let res = guard.send(req).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_development_mode_admits_curl_but_not_scanners() {
    let mut config = common::config();
    config.security.development_mode = true;
    let guard = TestGuard::new(config);

    let curl = Request::builder()
        .uri("/health")
        .header(header::USER_AGENT, "curl/8.4.0")
        .body(Body::empty())
        .unwrap();
    assert_eq!(guard.send(curl).await.status, StatusCode::OK);

    let scanner = Request::builder()
        .uri("/health")
        .header(header::USER_AGENT, "sqlmap/1.7")
        .body(Body::empty())
        .unwrap();
    assert_eq!(guard.send(scanner).await.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_oversized_body_rejected_as_bad_request() {
    let mut config = common::config();
    config.security.max_body_bytes = 64;
    let guard = TestGuard::new(config);

    let res = guard
        .send(request(
            "POST",
            "/api/auth/register",
            Some(json!({"username": "a".repeat(200)})),
            None,
        ))
        .await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.code(), "SECURITY_VIOLATION");
    let entry = &guard.audit.entries()[0];
    assert_eq!(entry.payload, serde_json::Value::Null);
}

#[tokio::test]
async fn test_eleventh_request_in_a_second_is_throttled() {
    let guard = TestGuard::new(common::config());

    for i in 0..10 {
        let res = guard.send(request("POST", "/api/bookings", Some(json!({})), None)).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED, "request {i}");
    }

    let res = guard.send(request("POST", "/api/bookings", Some(json!({})), None)).await;
    assert_eq!(res.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(res.code(), "RATE_LIMIT_EXCEEDED");
    let retry_after = res.body["error"]["retry_after"].as_u64().unwrap();
    assert_eq!(retry_after, 1);
    assert_eq!(res.headers[header::RETRY_AFTER], retry_after.to_string().as_str());

    let throttled = guard.audit.entries().pop().unwrap();
    assert_eq!(throttled.error_code, Some(ErrorCode::RateLimitExceeded));
    assert_eq!(
        throttled.phases,
        vec![
            RequestPhase::Received,
            RequestPhase::SecurityChecked,
            RequestPhase::Rejected,
            RequestPhase::Logged
        ]
    );
}

#[tokio::test]
async fn test_throttled_request_is_audited_with_secrets_redacted() {
    let guard = TestGuard::new(common::config());
    for _ in 0..10 {
        guard.send(request("POST", "/api/bookings", Some(json!({})), None)).await;
    }

    let res = guard
        .send(request(
            "POST",
            "/api/bookings",
            Some(json!({"pitch_id": "pitch-1", "password": "Pitch!Side9"})),
            None,
        ))
        .await;
    assert_eq!(res.status, StatusCode::TOO_MANY_REQUESTS);

    let entry = guard.audit.entries().pop().unwrap();
    assert_eq!(entry.error_code, Some(ErrorCode::RateLimitExceeded));
    assert_eq!(entry.payload["password"], "[REDACTED]");
    assert_eq!(entry.payload["pitch_id"], "pitch-1");
}

#[tokio::test]
async fn test_identities_are_counted_separately() {
    let guard = TestGuard::new(common::config());

    for _ in 0..10 {
        guard.send(request("POST", "/api/bookings", Some(json!({})), None)).await;
    }
    let anonymous = guard.send(request("POST", "/api/bookings", Some(json!({})), None)).await;
    assert_eq!(anonymous.status, StatusCode::TOO_MANY_REQUESTS);

    let player = guard
        .send(request("POST", "/api/bookings", Some(json!({})), Some(PLAYER_TOKEN)))
        .await;
    assert_eq!(player.status, StatusCode::BAD_REQUEST);
    assert_eq!(player.code(), "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_admin_role_bypasses_rate_limits() {
    let guard = TestGuard::new(common::config());
    for _ in 0..60 {
        let res = guard.send(request("GET", "/api/admin/status", None, Some(ADMIN_TOKEN))).await;
        assert_eq!(res.status, StatusCode::OK);
    }
}

#[tokio::test]
async fn test_health_is_never_throttled() {
    let guard = TestGuard::new(common::config());
    for _ in 0..30 {
        assert_eq!(guard.send(request("GET", "/health", None, None)).await.status, StatusCode::OK);
    }
}

#[tokio::test]
async fn test_unknown_route_is_plain_404_for_everyone() {
    let guard = TestGuard::new(common::config());

    for token in [None, Some(PLAYER_TOKEN), Some(ADMIN_TOKEN)] {
        let res = guard.send(request("GET", "/api/does-not-exist", None, token)).await;
        assert_eq!(res.status, StatusCode::NOT_FOUND);
        assert_eq!(res.body, serde_json::Value::Null);
        assert!(!res.request_id().is_empty());
    }
    assert_eq!(guard.audit.len(), 3);
}

#[tokio::test]
async fn test_wrong_method_is_plain_405() {
    let guard = TestGuard::new(common::config());
    let res = guard.send(request("GET", "/api/bookings", None, None)).await;
    assert_eq!(res.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(res.body, serde_json::Value::Null);
}

#[tokio::test]
async fn test_every_response_carries_request_id_and_nosniff() {
    let guard = TestGuard::new(common::config());
    let ok = guard.send(request("GET", "/health", None, None)).await;
    let denied = guard.send(request("GET", "/api/admin/status", None, None)).await;

    assert_ne!(ok.request_id(), denied.request_id());
    for res in [&ok, &denied] {
        assert_eq!(res.headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    }
}

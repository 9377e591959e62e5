//! Layered validation and the error contract through the reference handlers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use chrono::{Duration as Days, Utc};
use serde_json::{json, Value};

use ingress_guard::domain::directory::NewUser;
use ingress_guard::error::ErrorCode;
use ingress_guard::observability::alerts::AlertKind;
use ingress_guard::validation::{Lookup, LookupError, Reservation};

mod common;
use common::{request, TestGuard, ADMIN_TOKEN, PLAYER_TOKEN};

fn registration() -> Value {
    json!({
        "username": "kofi_mensah",
        "email": "kofi@example.com",
        "password": "Pitch!Side9",
        "password_confirm": "Pitch!Side9",
        "phone": "+233 20 123 4567",
    })
}

fn future_date(days: i64) -> String {
    (Utc::now().date_naive() + Days::days(days)).format("%Y-%m-%d").to_string()
}

fn booking(start: &str, end: &str) -> Value {
    json!({
        "pitch_id": "pitch-1",
        "date": future_date(3),
        "start_time": start,
        "end_time": end,
    })
}

#[tokio::test]
async fn test_registration_succeeds() {
    let guard = TestGuard::new(common::config());
    let res = guard
        .send(request("POST", "/api/auth/register", Some(registration()), None))
        .await;

    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["username"], "kofi_mensah");
    assert_eq!(guard.directory.user_count(), 1);

    let entry = guard.audit.entries().pop().unwrap();
    assert_eq!(entry.status, 201);
    assert_eq!(entry.payload["password"], "[REDACTED]");
    assert_eq!(entry.payload["password_confirm"], "[REDACTED]");
    assert_eq!(entry.payload["email"], "kofi@example.com");
    assert!(entry.payload_digest.is_some());
}

#[tokio::test]
async fn test_untyped_json_body_is_still_redacted() {
    let guard = TestGuard::new(common::config());

    for content_type in [Some("text/plain"), None] {
        let mut body = registration();
        let suffix = if content_type.is_some() { "a" } else { "b" };
        body["username"] = json!(format!("kofi_{suffix}"));
        body["email"] = json!(format!("kofi_{suffix}@example.com"));

        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/auth/register")
            .header(header::USER_AGENT, common::BROWSER);
        if let Some(content_type) = content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        let res = guard.send(builder.body(Body::from(body.to_string())).unwrap()).await;
        assert_eq!(res.status, StatusCode::CREATED, "{content_type:?}");

        let entry = guard.audit.entries().pop().unwrap();
        assert_eq!(entry.payload["password"], "[REDACTED]");
        assert_eq!(entry.payload["password_confirm"], "[REDACTED]");
        assert!(!serde_json::to_string(&entry).unwrap().contains("Pitch!Side9"));
    }
}

#[tokio::test]
async fn test_missing_email_names_the_field() {
    let guard = TestGuard::new(common::config());
    let mut body = registration();
    body.as_object_mut().unwrap().remove("email");

    let res = guard.send(request("POST", "/api/auth/register", Some(body), None)).await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.code(), "VALIDATION_ERROR");
    assert_eq!(res.body["error"]["field"], "email");
    assert_eq!(res.body["error"]["details"], json!(["email: This field is required."]));
    assert_eq!(guard.directory.user_count(), 0);
}

#[tokio::test]
async fn test_all_invalid_fields_reported_together() {
    let guard = TestGuard::new(common::config());
    let res = guard
        .send(request(
            "POST",
            "/api/auth/register",
            Some(json!({
                "username": "k!",
                "email": "nope",
                "password": "weakpass",
                "password_confirm": "weakpass",
            })),
            None,
        ))
        .await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["error"]["field"], Value::Null);
    let details = res.body["error"]["details"].as_array().unwrap();
    assert_eq!(details.len(), 3);
    assert!(details[0].as_str().unwrap().starts_with("username: "));
    assert!(details[1].as_str().unwrap().starts_with("email: "));
    assert!(details[2].as_str().unwrap().starts_with("password: "));
}

#[tokio::test]
async fn test_duplicate_username_rejected_with_field() {
    let guard = TestGuard::new(common::config());
    guard
        .directory
        .register_user(NewUser {
            username: "Kofi_Mensah".to_string(),
            email: "someone@example.com".to_string(),
            phone: None,
        })
        .unwrap();

    let res = guard
        .send(request("POST", "/api/auth/register", Some(registration()), None))
        .await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.code(), "VALIDATION_ERROR");
    assert_eq!(res.body["error"]["field"], "username");
    assert_eq!(guard.directory.user_count(), 1);
}

#[tokio::test]
async fn test_non_object_body_is_a_validation_error() {
    let guard = TestGuard::new(common::config());
    let res = guard
        .send(request("POST", "/api/auth/register", Some(json!(["kofi"])), None))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["error"]["field"], "body");
}

#[tokio::test]
async fn test_booking_requires_authentication() {
    let guard = TestGuard::new(common::config());
    let res = guard
        .send(request("POST", "/api/bookings", Some(booking("18:00", "19:00")), None))
        .await;

    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.code(), "AUTHENTICATION_REQUIRED");
    assert_eq!(res.body["error"]["message"], "You need to log in to access this resource.");
}

#[tokio::test]
async fn test_booking_created_then_overlap_rejected() {
    let guard = TestGuard::new(common::config());

    let first = guard
        .send(request("POST", "/api/bookings", Some(booking("18:00", "19:00")), Some(PLAYER_TOKEN)))
        .await;
    assert_eq!(first.status, StatusCode::CREATED);
    assert_eq!(first.body["user_id"], "2");

    let clash = guard
        .send(request("POST", "/api/bookings", Some(booking("18:30", "19:30")), Some(ADMIN_TOKEN)))
        .await;
    assert_eq!(clash.status, StatusCode::BAD_REQUEST);
    assert_eq!(clash.code(), "VALIDATION_ERROR");
    assert_eq!(clash.body["error"]["field"], "start_time");
    assert_eq!(guard.directory.booking_count(), 1);
}

#[tokio::test]
async fn test_short_booking_rejected_on_end_time() {
    let guard = TestGuard::new(common::config());
    let res = guard
        .send(request("POST", "/api/bookings", Some(booking("18:00", "18:20")), Some(PLAYER_TOKEN)))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["error"]["field"], "end_time");
}

#[tokio::test]
async fn test_past_booking_violates_business_rule() {
    let guard = TestGuard::new(common::config());
    let mut body = booking("18:00", "19:00");
    body["date"] = json!(future_date(-2));

    let res = guard.send(request("POST", "/api/bookings", Some(body), Some(PLAYER_TOKEN))).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.code(), "BUSINESS_RULE_VIOLATION");
    assert_eq!(res.body["error"]["details"], json!(["rule: booking_in_past"]));
}

#[tokio::test]
async fn test_admin_status_requires_admin_role() {
    let guard = TestGuard::new(common::config());

    let player = guard.send(request("GET", "/api/admin/status", None, Some(PLAYER_TOKEN))).await;
    assert_eq!(player.status, StatusCode::FORBIDDEN);
    assert_eq!(player.code(), "PERMISSION_DENIED");

    let admin = guard.send(request("GET", "/api/admin/status", None, Some(ADMIN_TOKEN))).await;
    assert_eq!(admin.status, StatusCode::OK);
    assert_eq!(admin.body["stages"], json!(["security", "rate_limit"]));
    assert_eq!(admin.body["audit_recorded"], 1);
}

struct PanickingLookup;

#[async_trait]
impl Lookup for PanickingLookup {
    async fn value_exists(&self, _: &str, _: &str, _: &str) -> Result<bool, LookupError> {
        panic!("connection pool poisoned");
    }

    async fn reservation_conflicts(&self, _: &Reservation) -> Result<bool, LookupError> {
        panic!("connection pool poisoned");
    }
}

#[tokio::test]
async fn test_handler_panic_becomes_generic_internal_error() {
    let guard = TestGuard::with_lookup(common::config(), Arc::new(PanickingLookup));
    let res = guard
        .send(request("POST", "/api/auth/register", Some(registration()), None))
        .await;

    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.code(), "INTERNAL_ERROR");
    let message = res.body["error"]["message"].as_str().unwrap();
    assert!(message.contains(res.request_id()));
    assert!(!res.body.to_string().contains("poisoned"));

    let entry = guard.audit.entries().pop().unwrap();
    assert_eq!(entry.error_code, Some(ErrorCode::InternalError));
    assert!(entry.fault_detail.unwrap().contains("connection pool poisoned"));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(guard.alerts.alerts()[0].kind, AlertKind::Internal);
}

struct StalledLookup;

#[async_trait]
impl Lookup for StalledLookup {
    async fn value_exists(&self, _: &str, _: &str, _: &str) -> Result<bool, LookupError> {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok(false)
    }

    async fn reservation_conflicts(&self, _: &Reservation) -> Result<bool, LookupError> {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok(false)
    }
}

#[tokio::test]
async fn test_slow_lookup_is_an_internal_error_not_a_validation_result() {
    let mut config = common::config();
    config.timeouts.lookup_ms = 50;
    let guard = TestGuard::with_lookup(config, Arc::new(StalledLookup));

    let res = guard
        .send(request("POST", "/api/auth/register", Some(registration()), None))
        .await;

    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.code(), "INTERNAL_ERROR");
    assert_eq!(guard.directory.user_count(), 0);
}

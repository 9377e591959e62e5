//! Single choke point turning terminal conditions into responses.
//!
//! Every rejection, whichever stage or handler raised it, passes through
//! [`ErrorNormalizer::normalize`] exactly once. The result carries the status,
//! the envelope, an optional alert and any fault detail that must be kept out
//! of the response body.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;

use crate::error::{ApiError, ErrorCode, ErrorEnvelope};
use crate::http::request::RequestContext;
use crate::observability::alerts::{Alert, AlertKind};
use crate::security::inspector::BlockReason;

const VALIDATION_MESSAGE: &str = "The provided data is invalid. Please check your input and try again.";
const SECURITY_MESSAGE: &str = "Access denied due to security policy.";
const THROTTLE_MESSAGE: &str = "Too many requests. Please wait before trying again.";
const AUTHENTICATION_MESSAGE: &str = "You need to log in to access this resource.";
const PERMISSION_MESSAGE: &str = "You do not have permission to perform this action.";

/// Outcome of normalizing one [`ApiError`].
#[derive(Debug, Clone)]
pub struct Normalized {
    pub status: StatusCode,
    pub envelope: ErrorEnvelope,
    pub alert: Option<Alert>,
    /// Withheld from the client; recorded in the audit entry only.
    pub fault_detail: Option<String>,
}

impl IntoResponse for Normalized {
    fn into_response(self) -> Response {
        let retry_after = self.envelope.error.retry_after;
        let mut response = (self.status, Json(self.envelope)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

/// Maps the error taxonomy onto HTTP.
#[derive(Debug, Clone)]
pub struct ErrorNormalizer {
    alerts_enabled: bool,
}

impl ErrorNormalizer {
    pub fn new(alerts_enabled: bool) -> Self {
        Self { alerts_enabled }
    }

    pub fn normalize(&self, error: &ApiError, ctx: &RequestContext) -> Normalized {
        let now = Utc::now();
        let code = error.code();
        let mut fault_detail = None;

        let (status, envelope) = match error {
            ApiError::Security(block) => {
                tracing::warn!(
                    request_id = %ctx.correlation_id(),
                    identity = %ctx.identity(),
                    reason = %block.reason,
                    signature = block.signature.as_deref().unwrap_or("-"),
                    "Request blocked by security inspection"
                );
                let status = match block.reason {
                    BlockReason::PayloadTooLarge => StatusCode::BAD_REQUEST,
                    _ => StatusCode::FORBIDDEN,
                };
                let envelope = ErrorEnvelope::new(code, SECURITY_MESSAGE, now)
                    .with_details(vec![format!("reason: {}", block.reason)]);
                (status, envelope)
            }
            ApiError::Throttled(throttle) => {
                let envelope = ErrorEnvelope::new(code, THROTTLE_MESSAGE, now)
                    .with_details(vec![format!(
                        "{} limit of {} requests exceeded",
                        throttle.window, throttle.limit
                    )])
                    .with_retry_after(throttle.retry_after_secs);
                (StatusCode::TOO_MANY_REQUESTS, envelope)
            }
            ApiError::Validation(report) => {
                let envelope = ErrorEnvelope::new(code, VALIDATION_MESSAGE, now)
                    .with_field(report.sole_field().map(str::to_string))
                    .with_details(report.details());
                (StatusCode::BAD_REQUEST, envelope)
            }
            ApiError::BusinessRule { rule, message } => {
                let envelope = ErrorEnvelope::new(code, message.clone(), now)
                    .with_details(vec![format!("rule: {rule}")]);
                (StatusCode::BAD_REQUEST, envelope)
            }
            ApiError::AuthenticationRequired => (
                StatusCode::UNAUTHORIZED,
                ErrorEnvelope::new(code, AUTHENTICATION_MESSAGE, now),
            ),
            ApiError::PermissionDenied(reason) => (
                StatusCode::FORBIDDEN,
                ErrorEnvelope::new(code, PERMISSION_MESSAGE, now).with_details(vec![reason.clone()]),
            ),
            ApiError::Internal(detail) => {
                tracing::error!(
                    request_id = %ctx.correlation_id(),
                    identity = %ctx.identity(),
                    path = %ctx.path(),
                    error = %detail,
                    "Internal fault"
                );
                fault_detail = Some(detail.clone());
                let envelope = ErrorEnvelope::new(
                    code,
                    format!(
                        "An internal error occurred. Please try again later. Reference: {}",
                        ctx.correlation_id()
                    ),
                    now,
                )
                .with_details(vec![format!("correlation_id: {}", ctx.correlation_id())]);
                (StatusCode::INTERNAL_SERVER_ERROR, envelope)
            }
        };

        let alert = (self.alerts_enabled && code.raises_alert()).then(|| Alert {
            kind: if code == ErrorCode::SecurityViolation {
                AlertKind::Security
            } else {
                AlertKind::Internal
            },
            correlation_id: ctx.correlation_id(),
            identity: ctx.identity().key(),
            method: ctx.method().to_string(),
            path: ctx.path().to_string(),
            summary: error.to_string(),
            timestamp: envelope.error.timestamp.clone(),
        });

        Normalized {
            status,
            envelope,
            alert,
            fault_detail,
        }
    }
}

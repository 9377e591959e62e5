//! Error taxonomy.
//!
//! # Data Flow
//! ```text
//! Security block ─┐
//! Rate throttle ──┤
//! Validation ─────┼──→ ApiError ──→ normalizer.rs ──→ (status, ErrorEnvelope)
//! Handler fault ──┤                      │
//! Panic/timeout ──┘                      └──→ alert (security/internal only)
//! ```
//!
//! The set of codes is closed. Nothing outside this module constructs an
//! envelope, and nothing may add a code.

pub mod envelope;
pub mod normalizer;

use serde::{Deserialize, Serialize};

use crate::security::inspector::SecurityBlock;
use crate::security::counters::StoreError;
use crate::security::rate_limit::Throttle;
use crate::validation::{LookupError, ValidationReport};

pub use envelope::{ErrorBody, ErrorEnvelope};
pub use normalizer::{ErrorNormalizer, Normalized};

/// The closed set of externally visible error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    SecurityViolation,
    BusinessRuleViolation,
    RateLimitExceeded,
    AuthenticationRequired,
    PermissionDenied,
    InternalError,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 7] = [
        ErrorCode::ValidationError,
        ErrorCode::SecurityViolation,
        ErrorCode::BusinessRuleViolation,
        ErrorCode::RateLimitExceeded,
        ErrorCode::AuthenticationRequired,
        ErrorCode::PermissionDenied,
        ErrorCode::InternalError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::SecurityViolation => "SECURITY_VIOLATION",
            ErrorCode::BusinessRuleViolation => "BUSINESS_RULE_VIOLATION",
            ErrorCode::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ErrorCode::AuthenticationRequired => "AUTHENTICATION_REQUIRED",
            ErrorCode::PermissionDenied => "PERMISSION_DENIED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Codes whose occurrence is pushed to the alert collaborator.
    pub fn raises_alert(&self) -> bool {
        matches!(self, ErrorCode::SecurityViolation | ErrorCode::InternalError)
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A terminal condition raised by any pipeline stage or domain handler.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    #[error("security violation: {}", .0.reason)]
    Security(SecurityBlock),

    #[error("rate limit exceeded on the {} window", .0.window)]
    Throttled(Throttle),

    #[error("validation failed for {} field(s)", .0.len())]
    Validation(ValidationReport),

    #[error("business rule '{rule}' violated: {message}")]
    BusinessRule { rule: String, message: String },

    #[error("authentication required")]
    AuthenticationRequired,

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Detail stays in logs and the audit trail, never in the response.
    #[error("internal fault: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal(detail: impl std::fmt::Display) -> Self {
        ApiError::Internal(detail.to_string())
    }

    pub fn business_rule(rule: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::BusinessRule {
            rule: rule.into(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            ApiError::Security(_) => ErrorCode::SecurityViolation,
            ApiError::Throttled(_) => ErrorCode::RateLimitExceeded,
            ApiError::Validation(_) => ErrorCode::ValidationError,
            ApiError::BusinessRule { .. } => ErrorCode::BusinessRuleViolation,
            ApiError::AuthenticationRequired => ErrorCode::AuthenticationRequired,
            ApiError::PermissionDenied(_) => ErrorCode::PermissionDenied,
            ApiError::Internal(_) => ErrorCode::InternalError,
        }
    }
}

impl From<ValidationReport> for ApiError {
    fn from(report: ValidationReport) -> Self {
        ApiError::Validation(report)
    }
}

impl From<LookupError> for ApiError {
    fn from(err: LookupError) -> Self {
        ApiError::internal(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::internal(err)
    }
}

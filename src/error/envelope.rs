//! The wire shape of every non-2xx response.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;

/// `{"error": {...}}` wrapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
    pub field: Option<String>,
    pub details: Vec<String>,
    /// Seconds to wait; present only on throttle responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    /// RFC 3339 timestamp with offset.
    pub timestamp: String,
}

impl ErrorEnvelope {
    pub fn new(code: ErrorCode, message: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            error: ErrorBody {
                code,
                message: message.into(),
                field: None,
                details: Vec::new(),
                retry_after: None,
                timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, false),
            },
        }
    }

    pub fn with_field(mut self, field: Option<String>) -> Self {
        self.error.field = field;
        self
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.error.details = details;
        self
    }

    pub fn with_retry_after(mut self, secs: u64) -> Self {
        self.error.retry_after = Some(secs);
        self
    }

    pub fn code(&self) -> ErrorCode {
        self.error.code
    }
}

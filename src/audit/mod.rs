//! Request audit trail.
//!
//! # Data Flow
//! ```text
//! RequestContext + outcome
//!     → sanitize.rs (redact headers, query, body; digest)
//!     → AuditEntry
//!     → sink.rs (append-only, bounded by a timeout)
//!         └─ on failure: minimal entry through tracing, request unaffected
//! ```
//!
//! Every request produces exactly one entry, including blocked and throttled
//! ones, and requests to unknown routes.

pub mod sanitize;
pub mod sink;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::SecondsFormat;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::config::AuditConfig;
use crate::error::ErrorCode;
use crate::http::request::RequestContext;
use crate::observability::metrics;
use crate::pipeline::{RequestPhase, StageRecord};
use crate::security::inspector::Finding;

pub use sanitize::Sanitizer;
pub use sink::{AuditError, AuditSink, MemoryAuditSink, TracingAuditSink};

/// One write-once record per request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub correlation_id: Uuid,
    pub timestamp: String,
    pub identity: String,
    pub method: String,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: BTreeMap<String, String>,
    pub verdicts: Vec<StageRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub findings: Vec<Finding>,
    pub phases: Vec<RequestPhase>,
    pub status: u16,
    pub error_code: Option<ErrorCode>,
    /// Internal fault detail withheld from the client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault_detail: Option<String>,
    pub elapsed_ms: u64,
    pub body_bytes: usize,
    pub payload: Value,
    pub payload_digest: Option<String>,
}

/// What happened to the request, as seen by the ingress layer.
#[derive(Debug, Clone, Default)]
pub struct Outcome {
    pub status: u16,
    pub verdicts: Vec<StageRecord>,
    pub phases: Vec<RequestPhase>,
    pub error_code: Option<ErrorCode>,
    pub fault_detail: Option<String>,
    pub findings: Vec<Finding>,
}

/// Process-wide audit counters. Survives policy reloads.
#[derive(Debug, Default)]
pub struct AuditStats {
    recorded: AtomicU64,
    degraded: AtomicU64,
}

impl AuditStats {
    pub fn recorded(&self) -> u64 {
        self.recorded.load(Ordering::Relaxed)
    }

    pub fn degraded(&self) -> u64 {
        self.degraded.load(Ordering::Relaxed)
    }
}

/// Builds and writes audit entries.
#[derive(Clone)]
pub struct RequestLogger {
    sanitizer: Sanitizer,
    sink: Arc<dyn AuditSink>,
    timeout: Duration,
    stats: Arc<AuditStats>,
}

impl RequestLogger {
    pub fn new(config: &AuditConfig, sink: Arc<dyn AuditSink>, timeout: Duration, stats: Arc<AuditStats>) -> Self {
        Self {
            sanitizer: Sanitizer::from_config(config),
            sink,
            timeout,
            stats,
        }
    }

    pub fn entry(&self, ctx: &RequestContext, outcome: Outcome) -> AuditEntry {
        let body = ctx.body();
        let payload = if body.oversized {
            Value::Null
        } else {
            self.sanitizer.body(&body.bytes, ctx.content_type())
        };
        let payload_digest = (!payload.is_null()).then(|| sanitize::digest(&payload));

        AuditEntry {
            correlation_id: ctx.correlation_id(),
            timestamp: ctx.arrived_at().to_rfc3339_opts(SecondsFormat::Millis, false),
            identity: ctx.identity().key(),
            method: ctx.method().to_string(),
            path: ctx.path().to_string(),
            query: self.sanitizer.query(&ctx.query_pairs()),
            headers: self.sanitizer.headers(ctx.headers()),
            verdicts: outcome.verdicts,
            findings: outcome.findings,
            phases: outcome.phases,
            status: outcome.status,
            error_code: outcome.error_code,
            fault_detail: outcome.fault_detail,
            elapsed_ms: ctx.started().elapsed().as_millis() as u64,
            body_bytes: body.length,
            payload,
            payload_digest,
        }
    }

    /// Best effort. A failed or slow sink degrades to a minimal log line.
    pub async fn record(&self, entry: AuditEntry) {
        let result = match tokio::time::timeout(self.timeout, self.sink.append(&entry)).await {
            Ok(result) => result,
            Err(_) => Err(AuditError::Timeout(self.timeout)),
        };

        match result {
            Ok(()) => {
                self.stats.recorded.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.stats.degraded.fetch_add(1, Ordering::Relaxed);
                metrics::record_audit_failure();
                tracing::warn!(
                    target: "ingress_guard::audit",
                    request_id = %entry.correlation_id,
                    identity = %entry.identity,
                    method = %entry.method,
                    path = %entry.path,
                    status = entry.status,
                    error = %e,
                    "Audit sink failed, minimal entry logged"
                );
            }
        }
    }
}

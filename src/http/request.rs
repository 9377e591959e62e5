//! Per-request context.
//!
//! # Responsibilities
//! - Generate the correlation id at entry
//! - Buffer the body up to the payload ceiling
//! - Freeze method, path, headers, identity and arrival time
//!
//! The context is wrapped in an `Arc` and never mutated after creation.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use axum::http::{header, request::Parts, HeaderMap, Method, Uri};
use chrono::{DateTime, Utc};
use tokio::time::Instant;
use uuid::Uuid;

use crate::pipeline::identity::Identity;

/// Header carrying the correlation id on every response.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Request body as seen by the pipeline.
#[derive(Debug, Clone, Default)]
pub struct BufferedBody {
    pub bytes: Bytes,
    /// Declared or observed length; may exceed `bytes.len()` when oversized.
    pub length: usize,
    pub oversized: bool,
    /// Set when the stream failed before completing, e.g. the client went
    /// away mid-body. Distinct from `oversized`.
    pub read_error: Option<String>,
}

impl BufferedBody {
    pub fn complete(bytes: Bytes) -> Self {
        Self {
            length: bytes.len(),
            bytes,
            ..Self::default()
        }
    }

    pub fn oversized(length: usize) -> Self {
        Self {
            length,
            oversized: true,
            ..Self::default()
        }
    }

    pub fn unreadable(error: impl Into<String>) -> Self {
        Self {
            read_error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Read at most `limit` bytes. Bodies declaring a larger Content-Length are
    /// not read at all.
    pub async fn read(headers: &HeaderMap, body: Body, limit: usize) -> Self {
        let declared = headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());

        if let Some(len) = declared {
            if len > limit {
                return Self::oversized(len);
            }
        }

        match Limited::new(body, limit).collect().await {
            Ok(collected) => Self::complete(collected.to_bytes()),
            Err(err) if err.is::<LengthLimitError>() => {
                Self::oversized(declared.unwrap_or(limit.saturating_add(1)))
            }
            Err(err) => {
                tracing::debug!(error = %err, "Request body read failed");
                Self::unreadable(err.to_string())
            }
        }
    }
}

/// Immutable record of one inbound call.
#[derive(Debug)]
pub struct RequestContext {
    correlation_id: Uuid,
    identity: Identity,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: BufferedBody,
    arrived_at: DateTime<Utc>,
    started: Instant,
}

impl RequestContext {
    pub fn new(parts: &Parts, identity: Identity, body: BufferedBody) -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            identity,
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
            body,
            arrived_at: Utc::now(),
            started: Instant::now(),
        }
    }

    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    /// Decoded query parameters in order of appearance.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.query()
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &BufferedBody {
        &self.body
    }

    pub fn arrived_at(&self) -> DateTime<Utc> {
        self.arrived_at
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    /// Re-materialize the buffered body for downstream handlers.
    pub fn body_for_handler(&self) -> Body {
        Body::from(self.body.bytes.clone())
    }

    #[cfg(test)]
    pub(crate) fn for_tests(method: &str, uri: &str) -> Self {
        let request = axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .header(header::USER_AGENT, "Mozilla/5.0 (X11; Linux x86_64) Firefox/120.0")
            .body(())
            .unwrap();
        let (parts, ()) = request.into_parts();
        Self::new(
            &parts,
            Identity::address("127.0.0.1"),
            BufferedBody::default(),
        )
    }
}

/// Request extension handing the context to later layers and handlers.
pub type SharedContext = Arc<RequestContext>;

/// Request body that yields one chunk and then fails, like a client
/// resetting the connection mid-upload.
#[cfg(test)]
pub(crate) struct BrokenBody {
    sent: bool,
}

#[cfg(test)]
impl BrokenBody {
    pub(crate) fn new() -> Self {
        Self { sent: false }
    }

    pub(crate) fn into_body(self) -> Body {
        Body::new(self)
    }
}

#[cfg(test)]
impl http_body::Body for BrokenBody {
    type Data = Bytes;
    type Error = std::io::Error;

    fn poll_frame(
        mut self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Result<http_body::Frame<Bytes>, Self::Error>>> {
        if self.sent {
            return std::task::Poll::Ready(Some(Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            ))));
        }
        self.sent = true;
        std::task::Poll::Ready(Some(Ok(http_body::Frame::data(Bytes::from_static(b"{\"user")))))
    }
}

//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::extract::ConnectInfo;
use axum::Extension;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;

use ingress_guard::audit::MemoryAuditSink;
use ingress_guard::config::{GuardConfig, TokenConfig, WindowLimits};
use ingress_guard::domain::directory::InMemoryDirectory;
use ingress_guard::observability::alerts::MemoryNotifier;
use ingress_guard::validation::Lookup;
use ingress_guard::{HttpServer, Shutdown};

pub const BROWSER: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) Firefox/121.0";
pub const ADMIN_TOKEN: &str = "admin-token-0001";
pub const PLAYER_TOKEN: &str = "player-token-0002";
pub const PEER: ([u8; 4], u16) = ([203, 0, 113, 7], 51000);

/// Defaults plus two tokens, with the auth class relaxed so tests can
/// register more than once per second.
pub fn config() -> GuardConfig {
    let mut config = GuardConfig::default();
    config.auth.tokens = vec![
        TokenConfig {
            token: ADMIN_TOKEN.to_string(),
            user_id: "1".to_string(),
            role: "admin".to_string(),
        },
        TokenConfig {
            token: PLAYER_TOKEN.to_string(),
            user_id: "2".to_string(),
            role: "player".to_string(),
        },
    ];
    config
        .rate_limit
        .classes
        .insert("auth".to_string(), WindowLimits::new(100, 1_000, 10_000));
    config
}

pub struct TestGuard {
    pub router: Router,
    pub audit: Arc<MemoryAuditSink>,
    pub alerts: Arc<MemoryNotifier>,
    pub directory: Arc<InMemoryDirectory>,
}

impl TestGuard {
    pub fn new(config: GuardConfig) -> Self {
        Self::build(HttpServer::new(config))
    }

    pub fn with_lookup(config: GuardConfig, lookup: Arc<dyn Lookup>) -> Self {
        Self::build(HttpServer::new(config).with_lookup(lookup))
    }

    fn build(server: HttpServer) -> Self {
        let audit = Arc::new(MemoryAuditSink::default());
        let alerts = Arc::new(MemoryNotifier::default());
        let server = server
            .with_audit_sink(audit.clone())
            .with_notifier(alerts.clone());
        let directory = server.directory().clone();
        let router = server
            .router()
            .unwrap()
            .layer(Extension(ConnectInfo(SocketAddr::from(PEER))));

        Self {
            router,
            audit,
            alerts,
            directory,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        TestResponse { status, headers, body }
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn code(&self) -> &str {
        self.body["error"]["code"].as_str().unwrap_or_default()
    }

    pub fn request_id(&self) -> &str {
        self.headers["x-request-id"].to_str().unwrap()
    }
}

/// Browser-like request with an optional JSON body and API token.
pub fn request(method: &str, uri: &str, body: Option<Value>, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::USER_AGENT, BROWSER);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Token {token}"));
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Start the guard on an ephemeral port. Returns its address and the
/// shutdown handle.
pub async fn start_guard(config: GuardConfig) -> (SocketAddr, Shutdown) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let (_, config_updates) = mpsc::unbounded_channel();
    let server = HttpServer::new(config);
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    (addr, shutdown)
}

//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with domain and admin handlers
//! - Wrap every request in the ingress layer (context, audit, error envelope)
//! - Run the guard pipeline in front of matched routes only
//! - Swap the compiled policy on config reload
//! - Prune expired rate counters in the background
//!
//! # Layering
//! ```text
//! TraceLayer → nosniff header → ingress ─┬─ fallback (404/405, no guard)
//!                                        └─ guard → catch-panic → handler
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::extract::{ConnectInfo, DefaultBodyLimit, Request, State};
use axum::http::{header, HeaderValue};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Router};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::audit::{AuditSink, Outcome};
use crate::config::{ConfigError, GuardConfig};
use crate::domain::directory::InMemoryDirectory;
use crate::error::ApiError;
use crate::http::extract::body_error;
use crate::http::request::{BufferedBody, RequestContext, SharedContext, X_REQUEST_ID};
use crate::http::response::{panic_to_rejection, Rejection};
use crate::observability::alerts::{self, Notifier};
use crate::observability::metrics;
use crate::pipeline::{Collaborators, GuardPolicy, PhaseTrail, RequestPhase, StageTrail};
use crate::security::counters::{CounterJanitor, CounterStore};
use crate::validation::Lookup;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application state injected into middleware and handlers.
#[derive(Clone)]
pub struct AppState {
    pub inner: Arc<ArcSwap<GuardPolicy>>,
    pub collaborators: Collaborators,
    pub directory: Arc<InMemoryDirectory>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: GuardConfig, collaborators: Collaborators, directory: Arc<InMemoryDirectory>) -> Result<Self, ConfigError> {
        let policy = GuardPolicy::build(config, &collaborators)?;
        Ok(Self {
            inner: Arc::new(ArcSwap::from_pointee(policy)),
            collaborators,
            directory,
            started_at: Instant::now(),
        })
    }

    /// Rebuild the policy from `config` and swap it in. The old policy stays
    /// active when the new one fails to build.
    pub fn reload(&self, config: GuardConfig) -> Result<(), ConfigError> {
        let policy = GuardPolicy::build(config, &self.collaborators)?;
        self.inner.store(Arc::new(policy));
        Ok(())
    }
}

/// HTTP server for the ingress guard.
pub struct HttpServer {
    config: GuardConfig,
    collaborators: Collaborators,
    directory: Arc<InMemoryDirectory>,
}

impl HttpServer {
    /// Create a server with in-process collaborators.
    pub fn new(config: GuardConfig) -> Self {
        let directory = Arc::new(InMemoryDirectory::new());
        Self {
            config,
            collaborators: Collaborators::in_process(directory.clone()),
            directory,
        }
    }

    pub fn with_counter_store(mut self, store: Arc<dyn CounterStore>) -> Self {
        self.collaborators.counters = store;
        self
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.collaborators.audit = sink;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.collaborators.notifier = Some(notifier);
        self
    }

    /// Replace the lookup used by business rules. Handlers still write to
    /// the in-process directory.
    pub fn with_lookup(mut self, lookup: Arc<dyn Lookup>) -> Self {
        self.collaborators.lookup = lookup;
        self
    }

    pub fn directory(&self) -> &Arc<InMemoryDirectory> {
        &self.directory
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn state(&self) -> Result<AppState, ConfigError> {
        AppState::new(self.config.clone(), self.collaborators.clone(), self.directory.clone())
    }

    /// The complete router, for serving or for driving with `oneshot` in tests.
    pub fn router(&self) -> Result<Router, ConfigError> {
        Ok(build_router(self.state()?))
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Validated configs arriving on `config_updates` replace the active
    /// policy. The listener address is fixed for the life of the process.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GuardConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let state = self.state()?;
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            stages = ?state.inner.load().pipeline().stage_names(),
            "HTTP server starting"
        );

        let janitor = CounterJanitor::new(
            state.collaborators.counters.clone(),
            Duration::from_secs(self.config.rate_limit.prune_interval_secs),
        );
        tokio::spawn(janitor.run(shutdown.resubscribe()));

        let reload_state = state.clone();
        let bind_address = self.config.listener.bind_address.clone();
        tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                if config.listener.bind_address != bind_address {
                    tracing::warn!(
                        current = %bind_address,
                        requested = %config.listener.bind_address,
                        "Listener address changes require a restart"
                    );
                }
                match reload_state.reload(config) {
                    Ok(()) => tracing::info!("Guard policy reloaded"),
                    Err(e) => tracing::error!(error = %e, "Rejected config update, keeping current policy"),
                }
            }
        });

        let app = build_router(state).into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server received shutdown signal");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(crate::domain::routes())
        .merge(crate::admin::routes())
        .route_layer(CatchPanicLayer::custom(panic_to_rejection))
        .route_layer(middleware::from_fn(guard))
        .with_state(state.clone())
        .layer(DefaultBodyLimit::disable())
        .layer(middleware::from_fn_with_state(state, ingress))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(TraceLayer::new_for_http())
}

/// Outermost guard layer. Owns the request from context creation to the
/// audit entry, and renders every rejection through the normalizer.
async fn ingress(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let policy = state.inner.load_full();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let (mut parts, body) = request.into_parts();
    let identity = policy.resolver().resolve(&parts.headers, peer);
    let buffered = BufferedBody::read(&parts.headers, body, policy.max_body_bytes()).await;
    let ctx: SharedContext = Arc::new(RequestContext::new(&parts, identity, buffered));

    parts.extensions.insert(ctx.clone());
    parts.extensions.insert(policy.clone());
    let request = Request::from_parts(parts, ctx.body_for_handler());

    // A truncated body never reaches the stages or handlers.
    let response = if ctx.body().read_error.is_some() {
        body_error("unreadable", "Request body could not be read.").into_response()
    } else {
        match tokio::time::timeout(policy.request_timeout(), next.run(request)).await {
            Ok(response) => response,
            Err(_) => ApiError::internal(format!("request exceeded {:?}", policy.request_timeout())).into_response(),
        }
    };

    let trail = response.extensions().get::<StageTrail>().cloned().unwrap_or_default();
    let mut phases = PhaseTrail::new();
    for phase in trail.records.iter().filter_map(|r| r.phase) {
        advance(&mut phases, phase, &ctx);
    }

    let rejection = response.extensions().get::<Rejection>().cloned();
    let (mut response, mut outcome) = match rejection {
        Some(Rejection(err)) => {
            phases.reject();
            metrics::record_rejection(err.code());
            let normalized = policy.normalizer().normalize(&err, &ctx);
            if let Some(alert) = normalized.alert.clone() {
                alerts::dispatch(policy.notifier().clone(), alert);
            }
            let outcome = Outcome {
                status: normalized.status.as_u16(),
                error_code: Some(err.code()),
                fault_detail: normalized
                    .fault_detail
                    .clone()
                    .or_else(|| ctx.body().read_error.clone()),
                findings: match &err {
                    ApiError::Security(block) => block.findings.clone(),
                    _ => Vec::new(),
                },
                ..Outcome::default()
            };
            (normalized.into_response(), outcome)
        }
        None => {
            advance(&mut phases, RequestPhase::Handled, &ctx);
            let outcome = Outcome {
                status: response.status().as_u16(),
                ..Outcome::default()
            };
            (response, outcome)
        }
    };

    advance(&mut phases, RequestPhase::Logged, &ctx);
    outcome.verdicts = trail.records;
    outcome.phases = phases.phases().to_vec();
    let logger = policy.logger();
    logger.record(logger.entry(&ctx, outcome)).await;
    advance(&mut phases, RequestPhase::Responded, &ctx);

    if let Ok(value) = HeaderValue::from_str(&ctx.correlation_id().to_string()) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
    metrics::record_request(ctx.method().as_str(), response.status().as_u16(), ctx.started().elapsed());

    response
}

fn advance(phases: &mut PhaseTrail, next: RequestPhase, ctx: &RequestContext) {
    if let Err(e) = phases.advance(next) {
        tracing::debug!(request_id = %ctx.correlation_id(), error = %e, "Phase transition skipped");
    }
}

/// Security and rate stages for matched routes.
async fn guard(
    Extension(policy): Extension<Arc<GuardPolicy>>,
    Extension(ctx): Extension<SharedContext>,
    request: Request,
    next: Next,
) -> Response {
    let (trail, verdict) = policy.pipeline().run(&ctx).await;
    let mut response = match verdict {
        Ok(()) => next.run(request).await,
        Err(err) => err.into_response(),
    };
    response.extensions_mut().insert(trail);
    response
}

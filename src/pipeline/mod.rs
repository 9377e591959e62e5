//! The ingress guard pipeline.
//!
//! # Data Flow
//! ```text
//! RequestContext
//!     → identity.rs (resolved before the context is built)
//!     → SecurityStage (inspector verdict)
//!     → RateStage (three-window counters)
//!     → handler
//! ```
//!
//! Stages are a statically ordered list of [`Stage`] objects composed in
//! [`policy::GuardPolicy::build`]. The first rejection ends the run.

pub mod identity;
pub mod phase;
pub mod policy;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::ApiError;
use crate::http::request::RequestContext;
use crate::observability::metrics;
use crate::security::inspector::{SecurityInspector, SecurityVerdict};
use crate::security::rate_limit::{RateLimiter, RateVerdict};

pub use phase::{PhaseTrail, RequestPhase};
pub use policy::{Collaborators, GuardPolicy};

/// Result of one stage.
#[derive(Debug)]
pub enum StageVerdict {
    /// Continue; the string summarizes the decision for the audit trail.
    Pass(String),
    Reject(ApiError),
}

/// The audit view of one stage decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageRecord {
    pub stage: &'static str,
    pub outcome: String,
    #[serde(skip)]
    pub phase: Option<RequestPhase>,
}

/// Stage decisions for one request, in order. Attached to the response so the
/// ingress layer can audit them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageTrail {
    pub records: Vec<StageRecord>,
}

#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Phase reached when this stage passes.
    fn phase(&self) -> RequestPhase;

    async fn process(&self, ctx: &RequestContext) -> StageVerdict;
}

/// Ordered stage list.
#[derive(Clone)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
}

impl Pipeline {
    pub fn new(stages: Vec<Arc<dyn Stage>>) -> Self {
        Self { stages }
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub async fn run(&self, ctx: &RequestContext) -> (StageTrail, Result<(), ApiError>) {
        let mut trail = StageTrail::default();

        for stage in &self.stages {
            match stage.process(ctx).await {
                StageVerdict::Pass(outcome) => trail.records.push(StageRecord {
                    stage: stage.name(),
                    outcome,
                    phase: Some(stage.phase()),
                }),
                StageVerdict::Reject(err) => {
                    tracing::debug!(
                        request_id = %ctx.correlation_id(),
                        stage = stage.name(),
                        error = %err,
                        "Stage rejected request"
                    );
                    trail.records.push(StageRecord {
                        stage: stage.name(),
                        outcome: format!("reject: {}", err.code()),
                        phase: None,
                    });
                    return (trail, Err(err));
                }
            }
        }

        (trail, Ok(()))
    }
}

pub struct SecurityStage {
    inspector: SecurityInspector,
}

impl SecurityStage {
    pub fn new(inspector: SecurityInspector) -> Self {
        Self { inspector }
    }
}

#[async_trait]
impl Stage for SecurityStage {
    fn name(&self) -> &'static str {
        "security"
    }

    fn phase(&self) -> RequestPhase {
        RequestPhase::SecurityChecked
    }

    async fn process(&self, ctx: &RequestContext) -> StageVerdict {
        match self.inspector.inspect(ctx) {
            SecurityVerdict::Allow => StageVerdict::Pass("allow".to_string()),
            SecurityVerdict::Block(block) => {
                metrics::record_security_block(block.reason);
                StageVerdict::Reject(ApiError::Security(block))
            }
        }
    }
}

pub struct RateStage {
    limiter: RateLimiter,
}

impl RateStage {
    pub fn new(limiter: RateLimiter) -> Self {
        Self { limiter }
    }
}

#[async_trait]
impl Stage for RateStage {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn phase(&self) -> RequestPhase {
        RequestPhase::RateChecked
    }

    async fn process(&self, ctx: &RequestContext) -> StageVerdict {
        let now = tokio::time::Instant::now();
        match self.limiter.check(ctx.identity(), ctx.path(), now).await {
            Ok(RateVerdict::Allow { class }) => StageVerdict::Pass(format!("allow: {class}")),
            Ok(RateVerdict::Exempt) => StageVerdict::Pass("exempt".to_string()),
            Ok(RateVerdict::Throttle(throttle)) => {
                metrics::record_throttle(throttle.window);
                StageVerdict::Reject(ApiError::Throttled(throttle))
            }
            Err(e) => StageVerdict::Reject(e.into()),
        }
    }
}

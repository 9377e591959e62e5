use std::sync::Arc;

use axum::{extract::State, Extension, Json};
use serde::Serialize;

use crate::http::server::AppState;
use crate::pipeline::GuardPolicy;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub stages: Vec<&'static str>,
    pub rate_limiting_enabled: bool,
    pub development_mode: bool,
    pub tracked_counter_keys: usize,
    pub audit_recorded: u64,
    pub audit_degraded: u64,
    pub registered_users: usize,
    pub bookings: usize,
}

pub async fn get_status(
    State(state): State<AppState>,
    Extension(policy): Extension<Arc<GuardPolicy>>,
) -> Json<SystemStatus> {
    let config = policy.config();
    let audit = &state.collaborators.audit_stats;

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.started_at.elapsed().as_secs(),
        stages: policy.pipeline().stage_names(),
        rate_limiting_enabled: config.rate_limit.enabled,
        development_mode: config.security.development_mode,
        tracked_counter_keys: state.collaborators.counters.tracked_keys(),
        audit_recorded: audit.recorded(),
        audit_degraded: audit.degraded(),
        registered_users: state.directory.user_count(),
        bookings: state.directory.booking_count(),
    })
}

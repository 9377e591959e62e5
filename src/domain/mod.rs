//! Reference domain handlers sitting behind the guard.
//!
//! They exist to exercise validation and the error contract end to end:
//! registration (uniqueness, password policy) and pitch bookings
//! (time order, overlap, past dates).

pub mod booking;
pub mod directory;
pub mod registration;

use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::http::server::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/auth/register", post(registration::register))
        .route("/api/bookings", post(booking::create_booking))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

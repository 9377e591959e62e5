//! Operator endpoints under `/api/admin/`.
//!
//! Routes here pass through the guard like any other, then require the
//! `admin` role.

pub mod auth;
pub mod handlers;

use axum::{middleware, routing::get, Router};

use crate::http::server::AppState;
use self::auth::admin_auth_middleware;
use self::handlers::get_status;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/status", get(get_status))
        .route_layer(middleware::from_fn(admin_auth_middleware))
}

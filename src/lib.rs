//! Ingress guard library.
//!
//! A request pipeline placed in front of domain handlers: identity
//! resolution, security inspection, multi-window rate limiting, layered
//! validation, a closed error taxonomy with a uniform envelope, and one
//! sanitized audit entry per request.

pub mod admin;
pub mod audit;
pub mod config;
pub mod domain;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod security;
pub mod validation;

pub use config::schema::GuardConfig;
pub use error::{ApiError, ErrorCode};
pub use http::HttpServer;
pub use lifecycle::Shutdown;

//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (normalized client address)
//!     → access_control.rs (token → principal)
//!     → inspector.rs (payload size, injection signatures, user agent)
//!     → rate_limit.rs (three-window ceilings against counters.rs)
//!     → Pass to the handler
//! ```
//!
//! # Design Decisions
//! - Every check runs before any domain code sees the request
//! - Fail closed: a counter store fault rejects the request as internal
//! - No trust in client input, including `X-Forwarded-For` unless configured

pub mod access_control;
pub mod counters;
pub mod headers;
pub mod inspector;
pub mod rate_limit;

//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs   (ingress layer: identity, buffered body, correlation id)
//!     → request.rs  (immutable RequestContext shared with every layer)
//!     → guard       (security, rate limiting) for matched routes
//!     → extract.rs  (JSON payload, role checks) in handlers
//!     → response.rs (rejections tagged for the normalizer)
//!     → ingress layer renders the envelope, writes the audit entry
//! ```

pub mod extract;
pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestContext, SharedContext, X_REQUEST_ID};
pub use response::Rejection;
pub use server::{AppState, HttpServer, ServerError};

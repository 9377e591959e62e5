//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, audit trail target)
//!     → metrics.rs (counters, histograms)
//!     → alerts.rs (security and internal failures)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//!     → Notification collaborator (log or webhook)
//! ```
//!
//! # Design Decisions
//! - Correlation id flows through every event as `request_id`
//! - Metrics are cheap (atomic increments)
//! - Alert delivery never blocks a response

pub mod alerts;
pub mod logging;
pub mod metrics;

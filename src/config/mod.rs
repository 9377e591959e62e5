//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, all issues at once)
//!     → GuardConfig (validated, immutable)
//!     → compiled into a GuardPolicy shared by the pipeline
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → server rebuilds the GuardPolicy
//!     → atomic swap; rate counters are kept
//! ```

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AlertConfig, AuditConfig, AuthConfig, GuardConfig, ListenerConfig, ObservabilityConfig,
    RateLimitConfig, RouteClassConfig, SecurityConfig, TimeoutConfig, TokenConfig, WindowLimits,
};
pub use watcher::ConfigWatcher;

//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the guard.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the ingress guard.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GuardConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Security inspection settings.
    pub security: SecurityConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Audit trail settings.
    pub audit: AuditConfig,

    /// Alert delivery for security and internal failures.
    pub alerts: AlertConfig,

    /// Static API tokens.
    pub auth: AuthConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration for the pipeline and its collaborators.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Whole-request budget in seconds.
    pub request_secs: u64,

    /// Budget for a single counter store operation in milliseconds.
    pub counter_store_ms: u64,

    /// Budget for a single business-rule lookup in milliseconds.
    pub lookup_ms: u64,

    /// Budget for writing one audit entry in milliseconds.
    pub audit_sink_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            counter_store_ms: 250,
            lookup_ms: 2_000,
            audit_sink_ms: 500,
        }
    }
}

/// Security inspection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_bytes: usize,

    /// Case-insensitive regular expressions marking injection attempts.
    pub injection_signatures: Vec<String>,

    /// User agents treated as automated clients. Disabled by `development_mode`.
    pub automated_agent_patterns: Vec<String>,

    /// Scanner and attack tooling. Blocked even in development mode.
    pub hostile_agent_patterns: Vec<String>,

    /// Block requests that carry no User-Agent header at all.
    pub block_missing_user_agent: bool,

    /// Explicit development override for the automated-agent check.
    pub development_mode: bool,

    /// Honor the first hop of `X-Forwarded-For` when resolving client addresses.
    pub trust_forwarded_for: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 10 * 1024 * 1024, // 10MB
            injection_signatures: [
                r"\b(SELECT|INSERT|UPDATE|DELETE|DROP|CREATE|ALTER|EXEC|UNION)\b\s+\S",
                r#"\b(OR|AND)\s+['"]?\d+['"]?\s*=\s*['"]?\d+"#,
                r"'\s*OR\s*'\s*=\s*'",
                r"--",
                r"\b(CHAR|ASCII|HEX|LOAD_FILE|INTO\s+OUTFILE)\s*\(",
                r"\b(INFORMATION_SCHEMA|SYSCAT|SYSOBJECTS)\b",
                r"\b(XP_CMDSHELL|SP_EXECUTESQL)\b",
                r"<\s*script\b",
                r"javascript\s*:",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            automated_agent_patterns: [
                r"(bot|crawler|spider|scraper)",
                r"(java|perl|ruby|go-http-client)",
                r"(libwww-perl|lwp-trivial)",
                r"(curl|wget|python-requests|httpclient)",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            hostile_agent_patterns: vec![
                r"(sqlmap|nikto|nessus|openvas|nmap|masscan|acunetix)".to_string(),
            ],
            block_missing_user_agent: true,
            development_mode: false,
            trust_forwarded_for: false,
        }
    }
}

/// Ceilings for the three counting windows. Zero disables a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct WindowLimits {
    pub per_second: u64,
    pub per_minute: u64,
    pub per_hour: u64,
}

impl WindowLimits {
    pub const fn new(per_second: u64, per_minute: u64, per_hour: u64) -> Self {
        Self {
            per_second,
            per_minute,
            per_hour,
        }
    }
}

/// Maps a path prefix to a rate class.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteClassConfig {
    /// Path prefix to match (longest prefix wins).
    pub path_prefix: String,

    /// Name of a class declared in `rate_limit.classes`.
    pub class: String,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Named ceilings per route class.
    pub classes: BTreeMap<String, WindowLimits>,

    /// Route prefix to class assignments.
    pub routes: Vec<RouteClassConfig>,

    /// Class used when no route prefix matches.
    pub default_class: String,

    /// Identity keys (`user:<id>`, `addr:<ip>`) or roles (`role:<name>`) exempt from limiting.
    pub bypass: Vec<String>,

    /// Path prefixes that are never counted.
    pub skip_paths: Vec<String>,

    /// How often expired counters are pruned, in seconds. Zero disables pruning.
    pub prune_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let mut classes = BTreeMap::new();
        classes.insert("default".to_string(), WindowLimits::new(10, 100, 1_000));
        classes.insert("auth".to_string(), WindowLimits::new(1, 5, 50));
        classes.insert("admin".to_string(), WindowLimits::new(50, 1_000, 10_000));

        Self {
            enabled: true,
            classes,
            routes: vec![
                RouteClassConfig {
                    path_prefix: "/api/auth/".to_string(),
                    class: "auth".to_string(),
                },
                RouteClassConfig {
                    path_prefix: "/api/admin/".to_string(),
                    class: "admin".to_string(),
                },
            ],
            default_class: "default".to_string(),
            bypass: vec!["role:admin".to_string()],
            skip_paths: vec!["/health".to_string()],
            prune_interval_secs: 300,
        }
    }
}

/// Audit trail configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Header, query and body field names whose values are redacted.
    pub sensitive_fields: Vec<String>,

    /// Replacement written in place of a sensitive value.
    pub redaction_marker: String,

    /// Longest value (in characters) kept verbatim in an entry.
    pub max_value_len: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            sensitive_fields: [
                "password",
                "token",
                "secret",
                "key",
                "authorization",
                "cookie",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            redaction_marker: "[REDACTED]".to_string(),
            max_value_len: 100,
        }
    }
}

/// Alert delivery configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Emit alerts for security and internal failures.
    pub enabled: bool,

    /// Optional webhook receiving alerts as JSON. Alerts go to the log otherwise.
    pub webhook_url: Option<String>,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            webhook_url: None,
        }
    }
}

/// A static API token bound to a principal.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenConfig {
    pub token: String,
    pub user_id: String,
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_role() -> String {
    "player".to_string()
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    pub tokens: Vec<TokenConfig>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format: "pretty" or "json".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: GuardConfig = toml::from_str(
            r#"
            [security]
            development_mode = true
            "#,
        )
        .unwrap();

        assert!(config.security.development_mode);
        assert_eq!(config.security.max_body_bytes, 10 * 1024 * 1024);
        assert_eq!(
            config.rate_limit.classes.get("default"),
            Some(&WindowLimits::new(10, 100, 1_000))
        );
        assert_eq!(config.timeouts.request_secs, 30);
    }

    #[test]
    fn test_rate_classes_from_toml() {
        let config: GuardConfig = toml::from_str(
            r#"
            [rate_limit]
            default_class = "general"
            bypass = ["user:1"]

            [rate_limit.classes.general]
            per_second = 3
            per_minute = 30
            per_hour = 300

            [[rate_limit.routes]]
            path_prefix = "/api/auth/"
            class = "general"

            [[auth.tokens]]
            token = "abc"
            user_id = "7"
            "#,
        )
        .unwrap();

        assert_eq!(config.rate_limit.classes.len(), 1);
        assert_eq!(config.rate_limit.routes[0].class, "general");
        assert_eq!(config.auth.tokens[0].role, "player");
    }
}

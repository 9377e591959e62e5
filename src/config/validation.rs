//! Configuration validation.
//!
//! Serde handles syntax; this module checks meaning. Every problem is
//! reported, not just the first, so an operator can fix a file in one pass.

use std::fmt;

use regex::RegexBuilder;

use crate::config::schema::GuardConfig;

/// One semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    /// Dotted path of the offending setting.
    pub setting: String,
    pub problem: String,
}

impl ConfigIssue {
    fn new(setting: impl Into<String>, problem: impl Into<String>) -> Self {
        Self {
            setting: setting.into(),
            problem: problem.into(),
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.setting, self.problem)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ConfigIssue>> {
    let mut issues = Vec::new();

    if config.security.max_body_bytes == 0 {
        issues.push(ConfigIssue::new("security.max_body_bytes", "must be greater than zero"));
    }

    let pattern_lists = [
        ("security.injection_signatures", &config.security.injection_signatures),
        ("security.automated_agent_patterns", &config.security.automated_agent_patterns),
        ("security.hostile_agent_patterns", &config.security.hostile_agent_patterns),
    ];
    for (setting, patterns) in pattern_lists {
        for (i, pattern) in patterns.iter().enumerate() {
            if let Err(e) = RegexBuilder::new(pattern).case_insensitive(true).build() {
                issues.push(ConfigIssue::new(format!("{setting}[{i}]"), e.to_string()));
            }
        }
    }

    let timeouts = &config.timeouts;
    for (setting, value) in [
        ("timeouts.request_secs", timeouts.request_secs),
        ("timeouts.counter_store_ms", timeouts.counter_store_ms),
        ("timeouts.lookup_ms", timeouts.lookup_ms),
        ("timeouts.audit_sink_ms", timeouts.audit_sink_ms),
    ] {
        if value == 0 {
            issues.push(ConfigIssue::new(setting, "must be greater than zero"));
        }
    }

    let rate = &config.rate_limit;
    if rate.enabled && !rate.classes.contains_key(&rate.default_class) {
        issues.push(ConfigIssue::new(
            "rate_limit.default_class",
            format!("unknown class '{}'", rate.default_class),
        ));
    }
    for (i, route) in rate.routes.iter().enumerate() {
        if !rate.classes.contains_key(&route.class) {
            issues.push(ConfigIssue::new(
                format!("rate_limit.routes[{i}].class"),
                format!("unknown class '{}'", route.class),
            ));
        }
        if !route.path_prefix.starts_with('/') {
            issues.push(ConfigIssue::new(
                format!("rate_limit.routes[{i}].path_prefix"),
                "must start with '/'",
            ));
        }
    }

    if config.audit.redaction_marker.is_empty() {
        issues.push(ConfigIssue::new("audit.redaction_marker", "must not be empty"));
    }

    for (i, token) in config.auth.tokens.iter().enumerate() {
        if token.token.trim().is_empty() {
            issues.push(ConfigIssue::new(format!("auth.tokens[{i}].token"), "must not be empty"));
        }
    }

    if let Some(url) = &config.alerts.webhook_url {
        if url::Url::parse(url).is_err() {
            issues.push(ConfigIssue::new("alerts.webhook_url", "not a valid URL"));
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

//! Multi-window rate limiting.
//!
//! Each request increments the identity's second, minute and hour counters.
//! If any incremented count exceeds its ceiling the request is throttled and
//! the soonest-expiring exceeded window determines `Retry-After`.
//!
//! Ceilings come from route classes; exemptions (skip paths, bypassed
//! identities) are answered by one policy lookup, [`RatePolicy::limits_for`].

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::config::{RateLimitConfig, WindowLimits};
use crate::pipeline::identity::Identity;

pub use crate::security::counters::{CounterKey, CounterStore, StoreError, Window};

impl WindowLimits {
    pub fn ceiling(&self, window: Window) -> u64 {
        match window {
            Window::Second => self.per_second,
            Window::Minute => self.per_minute,
            Window::Hour => self.per_hour,
        }
    }
}

/// A terminal throttle decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Throttle {
    pub window: Window,
    pub limit: u64,
    /// Whole seconds until the window resets, at least 1.
    pub retry_after_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateVerdict {
    Allow { class: String },
    /// Not counted: skip path, bypassed identity, or limiting disabled.
    Exempt,
    Throttle(Throttle),
}

/// Which ceilings apply to a request.
#[derive(Debug, Clone)]
pub struct RatePolicy {
    enabled: bool,
    classes: BTreeMap<String, WindowLimits>,
    // Sorted longest prefix first.
    routes: Vec<(String, String)>,
    default_class: String,
    bypass: HashSet<String>,
    skip_paths: Vec<String>,
}

impl RatePolicy {
    pub fn from_config(config: &RateLimitConfig) -> Self {
        let mut routes: Vec<_> = config
            .routes
            .iter()
            .map(|r| (r.path_prefix.clone(), r.class.clone()))
            .collect();
        routes.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        Self {
            enabled: config.enabled,
            classes: config.classes.clone(),
            routes,
            default_class: config.default_class.clone(),
            bypass: config.bypass.iter().cloned().collect(),
            skip_paths: config.skip_paths.clone(),
        }
    }

    fn is_bypassed(&self, identity: &Identity) -> bool {
        self.bypass.contains(&identity.key())
            || identity
                .role()
                .is_some_and(|role| self.bypass.contains(&format!("role:{role}")))
    }

    /// The class name and ceilings for a request, or `None` when it is exempt.
    pub fn limits_for(&self, identity: &Identity, path: &str) -> Option<(&str, WindowLimits)> {
        if !self.enabled
            || self.skip_paths.iter().any(|p| path.starts_with(p.as_str()))
            || self.is_bypassed(identity)
        {
            return None;
        }

        let class = self
            .routes
            .iter()
            .find(|(prefix, _)| path.starts_with(prefix.as_str()))
            .map(|(_, class)| class.as_str())
            .unwrap_or(self.default_class.as_str());

        self.classes.get(class).map(|limits| (class, *limits))
    }
}

/// Applies a [`RatePolicy`] against a shared [`CounterStore`].
#[derive(Clone)]
pub struct RateLimiter {
    policy: RatePolicy,
    store: Arc<dyn CounterStore>,
    store_timeout: Duration,
}

impl RateLimiter {
    pub fn new(policy: RatePolicy, store: Arc<dyn CounterStore>, store_timeout: Duration) -> Self {
        Self {
            policy,
            store,
            store_timeout,
        }
    }

    pub fn store(&self) -> &Arc<dyn CounterStore> {
        &self.store
    }

    pub async fn check(&self, identity: &Identity, path: &str, now: Instant) -> Result<RateVerdict, StoreError> {
        let Some((class, limits)) = self.policy.limits_for(identity, path) else {
            return Ok(RateVerdict::Exempt);
        };

        let identity_key = identity.key();
        let mut exceeded: Option<(Window, u64, Instant)> = None;

        for window in Window::ALL {
            let ceiling = limits.ceiling(window);
            if ceiling == 0 {
                continue;
            }

            let key = CounterKey::new(identity_key.as_str(), window);
            let snapshot = tokio::time::timeout(self.store_timeout, self.store.increment(&key, now))
                .await
                .map_err(|_| StoreError::Timeout(self.store_timeout))??;

            if snapshot.count > ceiling {
                let sooner = exceeded.map_or(true, |(_, _, at)| snapshot.expires_at < at);
                if sooner {
                    exceeded = Some((window, ceiling, snapshot.expires_at));
                }
            }
        }

        Ok(match exceeded {
            Some((window, limit, expires_at)) => {
                let remaining = expires_at.saturating_duration_since(now);
                tracing::warn!(
                    identity = %identity_key,
                    class = class,
                    window = %window,
                    limit = limit,
                    "Rate limit exceeded"
                );
                RateVerdict::Throttle(Throttle {
                    window,
                    limit,
                    retry_after_secs: ceil_secs(remaining).max(1),
                })
            }
            None => RateVerdict::Allow {
                class: class.to_string(),
            },
        })
    }
}

fn ceil_secs(d: Duration) -> u64 {
    let secs = d.as_secs();
    if d.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

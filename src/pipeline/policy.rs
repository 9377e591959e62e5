//! Compiled guard policy.
//!
//! A [`GuardPolicy`] is everything the pipeline derives from configuration:
//! compiled signature sets, rate classes, redaction rules, timeouts. It is
//! immutable and swapped whole on reload. Collaborators (counter store, audit
//! sink, lookup, notifier) outlive policies, so counters survive reloads.

use std::sync::Arc;
use std::time::Duration;

use crate::audit::{AuditSink, AuditStats, RequestLogger, TracingAuditSink};
use crate::config::validation::validate_config;
use crate::config::{ConfigError, GuardConfig};
use crate::error::ErrorNormalizer;
use crate::observability::alerts::{Notifier, TracingNotifier, WebhookNotifier};
use crate::pipeline::identity::IdentityResolver;
use crate::pipeline::{Pipeline, RateStage, SecurityStage};
use crate::security::access_control::StaticTokenAuthenticator;
use crate::security::counters::{CounterStore, InMemoryCounterStore};
use crate::security::inspector::SecurityInspector;
use crate::security::rate_limit::{RateLimiter, RatePolicy};
use crate::validation::{Lookup, ValidationEngine};

/// Long-lived external collaborators.
#[derive(Clone)]
pub struct Collaborators {
    pub counters: Arc<dyn CounterStore>,
    pub audit: Arc<dyn AuditSink>,
    pub audit_stats: Arc<AuditStats>,
    pub lookup: Arc<dyn Lookup>,
    /// Overrides the notifier derived from `alerts.webhook_url`.
    pub notifier: Option<Arc<dyn Notifier>>,
}

impl Collaborators {
    /// In-process counters, tracing audit sink, notifier from config.
    pub fn in_process(lookup: Arc<dyn Lookup>) -> Self {
        Self {
            counters: Arc::new(InMemoryCounterStore::new()),
            audit: Arc::new(TracingAuditSink),
            audit_stats: Arc::new(AuditStats::default()),
            lookup,
            notifier: None,
        }
    }
}

pub struct GuardPolicy {
    config: Arc<GuardConfig>,
    resolver: IdentityResolver,
    pipeline: Pipeline,
    logger: RequestLogger,
    normalizer: ErrorNormalizer,
    notifier: Arc<dyn Notifier>,
    validation: ValidationEngine,
    max_body_bytes: usize,
    request_timeout: Duration,
}

impl GuardPolicy {
    pub fn build(config: GuardConfig, collaborators: &Collaborators) -> Result<Self, ConfigError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let inspector = SecurityInspector::from_config(&config.security)?;
        let max_body_bytes = inspector.max_body_bytes();
        let limiter = RateLimiter::new(
            RatePolicy::from_config(&config.rate_limit),
            collaborators.counters.clone(),
            Duration::from_millis(config.timeouts.counter_store_ms),
        );
        let pipeline = Pipeline::new(vec![
            Arc::new(SecurityStage::new(inspector)),
            Arc::new(RateStage::new(limiter)),
        ]);

        let authenticator = StaticTokenAuthenticator::from_config(&config.auth.tokens);
        let resolver = IdentityResolver::new(Arc::new(authenticator), config.security.trust_forwarded_for);

        let logger = RequestLogger::new(
            &config.audit,
            collaborators.audit.clone(),
            Duration::from_millis(config.timeouts.audit_sink_ms),
            collaborators.audit_stats.clone(),
        );

        let notifier: Arc<dyn Notifier> = match (&collaborators.notifier, &config.alerts.webhook_url) {
            (Some(notifier), _) => notifier.clone(),
            (None, Some(url)) => {
                Arc::new(WebhookNotifier::new(url.clone()).map_err(|e| ConfigError::Alerts(e.to_string()))?)
            }
            (None, None) => Arc::new(TracingNotifier),
        };

        let validation = ValidationEngine::new(
            collaborators.lookup.clone(),
            Duration::from_millis(config.timeouts.lookup_ms),
        );

        Ok(Self {
            normalizer: ErrorNormalizer::new(config.alerts.enabled),
            request_timeout: Duration::from_secs(config.timeouts.request_secs),
            config: Arc::new(config),
            resolver,
            pipeline,
            logger,
            notifier,
            validation,
            max_body_bytes,
        })
    }

    pub fn config(&self) -> &Arc<GuardConfig> {
        &self.config
    }

    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn logger(&self) -> &RequestLogger {
        &self.logger
    }

    pub fn normalizer(&self) -> &ErrorNormalizer {
        &self.normalizer
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    pub fn validation(&self) -> &ValidationEngine {
        &self.validation
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::directory::InMemoryDirectory;

    fn collaborators() -> Collaborators {
        Collaborators::in_process(Arc::new(InMemoryDirectory::new()))
    }

    #[test]
    fn test_default_config_builds_security_then_rate() {
        let policy = GuardPolicy::build(GuardConfig::default(), &collaborators()).unwrap();
        assert_eq!(policy.pipeline().stage_names(), vec!["security", "rate_limit"]);
        assert_eq!(policy.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = GuardConfig::default();
        config.rate_limit.default_class = "missing".to_string();
        assert!(matches!(
            GuardPolicy::build(config, &collaborators()),
            Err(ConfigError::Validation(_))
        ));
    }
}

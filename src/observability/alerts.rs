//! Alerting for security and internal failures.
//!
//! Alerts leave the request path: [`dispatch`] spawns delivery and a failed
//! delivery is logged, never surfaced to the client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Security,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub correlation_id: Uuid,
    pub identity: String,
    pub method: String,
    pub path: String,
    pub summary: String,
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("alert delivery failed: {0}")]
    Delivery(#[from] reqwest::Error),

    #[error("alert receiver answered {0}")]
    Rejected(reqwest::StatusCode),
}

/// External notification collaborator.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError>;
}

/// Writes alerts to the log at error level.
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError> {
        tracing::error!(
            target: "ingress_guard::alert",
            kind = ?alert.kind,
            request_id = %alert.correlation_id,
            identity = %alert.identity,
            method = %alert.method,
            path = %alert.path,
            summary = %alert.summary,
            "Alert raised"
        );
        Ok(())
    }
}

/// POSTs the alert as JSON to a webhook.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError> {
        let response = self.client.post(&self.url).json(alert).send().await?;
        if !response.status().is_success() {
            return Err(NotifyError::Rejected(response.status()));
        }
        Ok(())
    }
}

/// Deliver `alert` in the background.
pub fn dispatch(notifier: Arc<dyn Notifier>, alert: Alert) {
    tokio::spawn(async move {
        if let Err(e) = notifier.notify(&alert).await {
            tracing::warn!(
                request_id = %alert.correlation_id,
                error = %e,
                "Failed to deliver alert"
            );
        }
    });
}

/// Keeps alerts in memory, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    alerts: Mutex<Vec<Alert>>,
}

impl MemoryNotifier {
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().clone()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError> {
        self.alerts.lock().push(alert.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert() -> Alert {
        Alert {
            kind: AlertKind::Security,
            correlation_id: Uuid::new_v4(),
            identity: "addr:10.0.0.1".to_string(),
            method: "GET".to_string(),
            path: "/api/pitches".to_string(),
            summary: "security violation: automated_agent".to_string(),
            timestamp: "2026-10-19T10:00:00.000+00:00".to_string(),
        }
    }

    #[tokio::test]
    async fn test_dispatch_delivers_in_background() {
        let notifier = Arc::new(MemoryNotifier::default());
        dispatch(notifier.clone(), alert());

        for _ in 0..50 {
            if !notifier.alerts().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(notifier.alerts().len(), 1);
    }

    #[test]
    fn test_alert_serializes_kind_in_snake_case() {
        let json = serde_json::to_value(alert()).unwrap();
        assert_eq!(json["kind"], "security");
        assert_eq!(json["identity"], "addr:10.0.0.1");
    }
}

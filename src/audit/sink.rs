//! Append-only destinations for audit entries.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::audit::AuditEntry;

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("failed to serialize audit entry: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("audit sink timed out after {0:?}")]
    Timeout(Duration),

    #[error("audit sink unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, entry: &AuditEntry) -> Result<(), AuditError>;
}

/// Emits each entry as one JSON event on the `ingress_guard::audit` target.
#[derive(Debug, Default, Clone)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn append(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        let json = serde_json::to_string(entry)?;
        tracing::info!(
            target: "ingress_guard::audit",
            request_id = %entry.correlation_id,
            status = entry.status,
            entry = %json,
            "Audit"
        );
        Ok(())
    }
}

/// Keeps the most recent `capacity` entries in memory. A zero capacity is
/// treated as one.
#[derive(Debug)]
pub struct MemoryAuditSink {
    entries: RwLock<VecDeque<AuditEntry>>,
    capacity: usize,
}

impl MemoryAuditSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity.clamp(1, 1_024))),
            capacity: capacity.max(1),
        }
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn find(&self, correlation_id: Uuid) -> Option<AuditEntry> {
        self.entries
            .read()
            .iter()
            .find(|e| e.correlation_id == correlation_id)
            .cloned()
    }
}

impl Default for MemoryAuditSink {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        let mut entries = self.entries.write();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry.clone());
        Ok(())
    }
}

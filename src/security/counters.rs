//! Rate counter storage.
//!
//! The store is the only cross-request mutable state in the guard. Its single
//! operation, increment-with-expiry, must be atomic per key: two concurrent
//! requests for the same (identity, window) never observe the same count.
//! Window resets are lazy and happen inside that same operation.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::{self, Instant};

/// Counting window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Window {
    Second,
    Minute,
    Hour,
}

impl Window {
    pub const ALL: [Window; 3] = [Window::Second, Window::Minute, Window::Hour];

    pub fn duration(&self) -> Duration {
        match self {
            Window::Second => Duration::from_secs(1),
            Window::Minute => Duration::from_secs(60),
            Window::Hour => Duration::from_secs(3_600),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Window::Second => "second",
            Window::Minute => "minute",
            Window::Hour => "hour",
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterKey {
    pub identity: String,
    pub window: Window,
}

impl CounterKey {
    pub fn new(identity: impl Into<String>, window: Window) -> Self {
        Self {
            identity: identity.into(),
            window,
        }
    }
}

/// State of a counter right after an increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub count: u64,
    pub expires_at: Instant,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("counter store timed out after {0:?}")]
    Timeout(Duration),

    #[error("counter store unavailable: {0}")]
    Unavailable(String),
}

/// Atomic increment-with-expiry keyed by identity and window.
///
/// Implementations may live in-process or front a shared cache; the limiter
/// only relies on this contract.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Reset the counter if its window has passed, then add one and return it.
    async fn increment(&self, key: &CounterKey, now: Instant) -> Result<CounterSnapshot, StoreError>;

    /// Number of live keys, for status reporting.
    fn tracked_keys(&self) -> usize;

    /// Drop counters whose window ended before `now`. Returns how many were removed.
    async fn prune_expired(&self, now: Instant) -> usize;
}

#[derive(Debug, Clone, Copy)]
struct Counter {
    count: u64,
    expires_at: Instant,
}

/// Single-process store. The DashMap entry guard serializes access per key.
#[derive(Debug, Default)]
pub struct InMemoryCounterStore {
    counters: DashMap<CounterKey, Counter>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn increment(&self, key: &CounterKey, now: Instant) -> Result<CounterSnapshot, StoreError> {
        let window = key.window.duration();
        let mut entry = self.counters.entry(key.clone()).or_insert(Counter {
            count: 0,
            expires_at: now + window,
        });

        if now >= entry.expires_at {
            entry.count = 0;
            entry.expires_at = now + window;
        }
        entry.count = entry.count.saturating_add(1);

        Ok(CounterSnapshot {
            count: entry.count,
            expires_at: entry.expires_at,
        })
    }

    fn tracked_keys(&self) -> usize {
        self.counters.len()
    }

    async fn prune_expired(&self, now: Instant) -> usize {
        let before = self.counters.len();
        self.counters.retain(|_, c| c.expires_at > now);
        before.saturating_sub(self.counters.len())
    }
}

/// Periodically drops expired counters so idle identities do not pile up.
pub struct CounterJanitor {
    store: Arc<dyn CounterStore>,
    interval: Duration,
}

impl CounterJanitor {
    pub fn new(store: Arc<dyn CounterStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if self.interval.is_zero() {
            tracing::info!("Counter pruning disabled");
            return;
        }

        let mut ticker = time::interval(self.interval);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.store.prune_expired(Instant::now()).await;
                    if removed > 0 {
                        tracing::debug!(
                            removed,
                            remaining = self.store.tracked_keys(),
                            "Pruned expired rate counters"
                        );
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Counter janitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_increment_and_lazy_reset() {
        let store = InMemoryCounterStore::new();
        let key = CounterKey::new("addr:1.2.3.4", Window::Second);
        let start = Instant::now();

        assert_eq!(store.increment(&key, start).await.unwrap().count, 1);
        assert_eq!(store.increment(&key, start).await.unwrap().count, 2);

        tokio::time::advance(Duration::from_secs(1)).await;
        let snap = store.increment(&key, Instant::now()).await.unwrap();
        assert_eq!(snap.count, 1);
        assert_eq!(snap.expires_at, Instant::now() + Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_windows_are_independent() {
        let store = InMemoryCounterStore::new();
        let now = Instant::now();
        store.increment(&CounterKey::new("u", Window::Second), now).await.unwrap();
        let minute = store.increment(&CounterKey::new("u", Window::Minute), now).await.unwrap();
        assert_eq!(minute.count, 1);
        assert_eq!(store.tracked_keys(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prune_only_removes_expired() {
        let store = InMemoryCounterStore::new();
        let now = Instant::now();
        store.increment(&CounterKey::new("u", Window::Second), now).await.unwrap();
        store.increment(&CounterKey::new("u", Window::Hour), now).await.unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(store.prune_expired(Instant::now()).await, 1);
        assert_eq!(store.tracked_keys(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_are_not_lost() {
        let store = Arc::new(InMemoryCounterStore::new());
        let key = CounterKey::new("addr:9.9.9.9", Window::Hour);
        let now = Instant::now();

        let tasks: Vec<_> = (0..200)
            .map(|_| {
                let store = store.clone();
                let key = key.clone();
                tokio::spawn(async move { store.increment(&key, now).await.unwrap().count })
            })
            .collect();

        let mut counts = Vec::new();
        for task in tasks {
            counts.push(task.await.unwrap());
        }
        counts.sort_unstable();
        assert_eq!(counts, (1..=200).collect::<Vec<u64>>());
    }

    #[tokio::test(start_paused = true)]
    async fn test_janitor_prunes_until_shutdown() {
        let store = Arc::new(InMemoryCounterStore::new());
        store
            .increment(&CounterKey::new("u", Window::Second), Instant::now())
            .await
            .unwrap();

        let (tx, rx) = broadcast::channel(1);
        let janitor = CounterJanitor::new(store.clone(), Duration::from_secs(5));
        let handle = tokio::spawn(janitor.run(rx));

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(store.tracked_keys(), 0);

        tx.send(()).unwrap();
        handle.await.unwrap();
    }
}

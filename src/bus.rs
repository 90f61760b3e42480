//! Message bus seam.
//!
//! The relay only needs one operation from the bus: publish a payload on a
//! topic, optionally retained. The transport itself lives behind [`Bus`], so
//! the scheduler can be driven against [`MemoryBus`] in tests and [`LogBus`]
//! when no broker is configured.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::info;

use crate::{DrsError, Result};

/// Trait for message bus clients
///
/// Implementations must be cheap to call repeatedly. A publish that cannot
/// reach the broker returns [`DrsError::ConnectionLoss`]; the scheduler keeps
/// the message and retries on its next scan.
#[async_trait::async_trait]
pub trait Bus: Send + Sync + 'static {
    /// Publish `payload` on `topic`.
    async fn publish(&self, topic: &str, payload: &str, retain: bool) -> Result<()>;
}

/// A message as seen by the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
}

/// In-memory bus that records every publication.
///
/// Clones share the same record, so a test can keep one handle while the
/// scheduler owns another. Disconnecting makes every publish fail with
/// [`DrsError::ConnectionLoss`] until reconnected.
#[derive(Debug, Clone)]
pub struct MemoryBus {
    published: Arc<Mutex<Vec<Publication>>>,
    connected: Arc<AtomicBool>,
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBus {
    pub fn new() -> Self {
        Self {
            published: Arc::new(Mutex::new(Vec::new())),
            connected: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Snapshot of all publications so far.
    pub fn published(&self) -> Vec<Publication> {
        self.published.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Payloads published on one topic, in order.
    pub fn payloads(&self, topic: &str) -> Vec<String> {
        self.published().into_iter().filter(|p| p.topic == topic).map(|p| p.payload).collect()
    }
}

#[async_trait::async_trait]
impl Bus for MemoryBus {
    async fn publish(&self, topic: &str, payload: &str, retain: bool) -> Result<()> {
        if !self.is_connected() {
            return Err(DrsError::connection_lost(format!(
                "not connected, cannot publish to {}",
                topic
            )));
        }
        let mut published = self
            .published
            .lock()
            .map_err(|_| DrsError::connection_lost("memory bus lock poisoned"))?;
        published.push(Publication {
            topic: topic.to_string(),
            payload: payload.to_string(),
            retain,
        });
        Ok(())
    }
}

/// Bus that writes every publication to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogBus;

#[async_trait::async_trait]
impl Bus for LogBus {
    async fn publish(&self, topic: &str, payload: &str, retain: bool) -> Result<()> {
        info!(topic, retain, "{}", payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_bus_records_in_order() {
        let bus = MemoryBus::new();
        let observer = bus.clone();

        bus.publish("f1/race/leader", "a", true).await.unwrap();
        bus.publish("f1/race/flag_status", "b", true).await.unwrap();
        bus.publish("f1/race/leader", "c", false).await.unwrap();

        assert_eq!(observer.payloads("f1/race/leader"), vec!["a", "c"]);
        assert_eq!(observer.published().len(), 3);
        assert!(!observer.published()[2].retain);
    }

    #[tokio::test]
    async fn disconnected_bus_reports_connection_loss() {
        let bus = MemoryBus::new();
        bus.set_connected(false);

        let error = bus.publish("f1/race/leader", "a", true).await.unwrap_err();
        assert!(error.is_retryable());
        assert!(bus.published().is_empty());

        bus.set_connected(true);
        bus.publish("f1/race/leader", "a", true).await.unwrap();
        assert_eq!(bus.published().len(), 1);
    }

    #[tokio::test]
    async fn log_bus_accepts_everything() {
        LogBus.publish("f1/service/running_status", "ON", true).await.unwrap();
    }
}

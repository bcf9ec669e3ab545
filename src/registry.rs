use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::debug;

/// Cancellation capability for one product's tracker. Lives in the
/// registry; cancelling is idempotent.
#[derive(Debug)]
pub struct TrackingHandle {
    product_id: u32,
    tx: watch::Sender<bool>,
}

impl TrackingHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn product_id(&self) -> u32 {
        self.product_id
    }
}

/// Tracker-side view of its cancellation signal.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested. A dropped handle counts as
    /// cancelled; the registry only drops handles on cancellation paths.
    pub async fn cancelled(&mut self) {
        let _ = self.rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Map of live tracking handles, keyed by product id. The only state
/// shared across trackers; every operation serializes on one async mutex
/// so a tracker's self-cancel is safe against the orchestrator's
/// `cancel_all`.
#[derive(Debug, Clone, Default)]
pub struct TrackingRegistry {
    inner: Arc<Mutex<HashMap<u32, TrackingHandle>>>,
}

impl TrackingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the cancellation pair for a product. A stale handle under
    /// the same id is cancelled and replaced, so at most one live handle
    /// exists per tracked product.
    pub async fn register(&self, product_id: u32) -> CancelSignal {
        let (tx, rx) = watch::channel(false);
        let mut handles = self.inner.lock().await;
        if let Some(stale) = handles.insert(product_id, TrackingHandle { product_id, tx }) {
            stale.cancel();
            debug!(product_id, "replaced stale tracking handle");
        }
        CancelSignal { rx }
    }

    /// Idempotent: cancelling an absent or already-cancelled id is a
    /// no-op.
    pub async fn cancel(&self, product_id: u32) {
        let mut handles = self.inner.lock().await;
        if let Some(handle) = handles.remove(&product_id) {
            handle.cancel();
            debug!(product_id, "tracking cancelled");
        }
    }

    pub async fn cancel_all(&self) {
        let mut handles = self.inner.lock().await;
        for (_, handle) in handles.drain() {
            handle.cancel();
        }
    }

    /// Number of live handles.
    pub async fn active(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_register_and_cancel() {
        let registry = TrackingRegistry::new();
        let signal = registry.register(100).await;
        assert_eq!(registry.active().await, 1);
        assert!(!signal.is_cancelled());

        registry.cancel(100).await;
        assert_eq!(registry.active().await, 0);
        assert!(signal.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let registry = TrackingRegistry::new();
        let signal = registry.register(100).await;

        registry.cancel(100).await;
        registry.cancel(100).await;
        registry.cancel(999).await;
        assert!(signal.is_cancelled());
        assert_eq!(registry.active().await, 0);
    }

    #[tokio::test]
    async fn test_cancel_all() {
        let registry = TrackingRegistry::new();
        let first = registry.register(1).await;
        let second = registry.register(2).await;

        registry.cancel_all().await;
        assert!(first.is_cancelled());
        assert!(second.is_cancelled());
        assert_eq!(registry.active().await, 0);
    }

    #[tokio::test]
    async fn test_reregister_cancels_stale_handle() {
        let registry = TrackingRegistry::new();
        let stale = registry.register(7).await;
        let fresh = registry.register(7).await;

        assert!(stale.is_cancelled());
        assert!(!fresh.is_cancelled());
        assert_eq!(registry.active().await, 1);
    }

    #[tokio::test]
    async fn test_signal_wakes_sleeping_waiter() {
        let registry = TrackingRegistry::new();
        let mut signal = registry.register(42).await;

        let waiter = tokio::spawn(async move {
            signal.cancelled().await;
        });

        // Give the waiter a chance to park before cancelling.
        tokio::time::sleep(Duration::from_millis(10)).await;
        registry.cancel(42).await;

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake after cancel")
            .unwrap();
    }
}

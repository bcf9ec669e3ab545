use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::ProductEntry;
use crate::models::{Product, TrackedStatus, TrackerReport};
use crate::registry::TrackingRegistry;
use crate::tracker::ProductTracker;
use crate::utils::error::AppError;

/// Spins up one tracker task per configured product and aggregates their
/// terminal reports.
pub struct Orchestrator {
    tracker: ProductTracker,
    registry: TrackingRegistry,
}

impl Orchestrator {
    pub fn new(tracker: ProductTracker, registry: TrackingRegistry) -> Self {
        Self { tracker, registry }
    }

    /// Launch a tracker for every product. An empty product list is a
    /// precondition failure for the whole run, not a per-product error.
    pub async fn start(&self, entries: &[ProductEntry]) -> Result<TrackingSession, AppError> {
        if entries.is_empty() {
            return Err(AppError::NoProducts);
        }

        let mut handles = Vec::with_capacity(entries.len());
        for entry in entries {
            let signal = self.registry.register(entry.id).await;
            let tracker = self.tracker.clone();
            let product = Product::new(entry.id, entry.max_price);
            handles.push(tokio::spawn(
                async move { tracker.track(product, signal).await },
            ));
        }

        info!(count = handles.len(), "tracking started");
        Ok(TrackingSession { handles })
    }
}

/// Join handles for a run's trackers. Trackers keep running on their own
/// tasks; the host decides when (or whether) to wait for them.
pub struct TrackingSession {
    handles: Vec<JoinHandle<TrackerReport>>,
}

impl TrackingSession {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Join every tracker, logging each terminal report as it lands.
    pub async fn wait(self) -> Vec<TrackerReport> {
        let mut reports = Vec::with_capacity(self.handles.len());
        for joined in join_all(self.handles).await {
            match joined {
                Ok(report) => {
                    log_report(&report);
                    reports.push(report);
                }
                Err(err) => error!(error = %err, "tracker task failed to join"),
            }
        }
        reports
    }
}

fn log_report(report: &TrackerReport) {
    let name = report.name.as_deref().unwrap_or("<unknown>");
    match report.status {
        TrackedStatus::ProductOrdered => info!(
            product_id = report.product_id,
            name,
            order_number = report.order_number.as_deref().unwrap_or("-"),
            price = ?report.final_price,
            "tracking finished: product ordered"
        ),
        TrackedStatus::ProductNotFound => error!(
            product_id = report.product_id,
            name, "tracking finished: product not found"
        ),
        TrackedStatus::FailOrderProcess => error!(
            product_id = report.product_id,
            name,
            price = ?report.final_price,
            "tracking finished: order attempt failed"
        ),
        TrackedStatus::Active | TrackedStatus::InOrderProcess => info!(
            product_id = report.product_id,
            name, "tracking stopped before completion"
        ),
    }
}

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::fetcher::ProductFetcher;
use crate::models::{OrderStatus, Product, StockInfo, TrackedStatus, TrackerReport};
use crate::money::Locale;
use crate::notify::NotificationSink;
use crate::order::OrderSubmitter;
use crate::registry::{CancelSignal, TrackingRegistry};

/// Timing knobs shared by every tracker in a run.
#[derive(Debug, Clone)]
pub struct TrackerSettings {
    pub poll_interval: Duration,
    pub renotify_after: Duration,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            renotify_after: Duration::from_secs(3600),
        }
    }
}

/// What an ordering attempt did to the tracker.
enum OrderAttempt {
    Terminal(Option<String>),
    Unconfirmed,
}

/// Runs one product's polling loop: fetch, decide, order, notify, until a
/// terminal state or cancellation.
///
/// Cycles are strictly sequential; the order token and session cookie are
/// always taken from the snapshot of the current cycle.
#[derive(Clone)]
pub struct ProductTracker {
    fetcher: Arc<dyn ProductFetcher>,
    submitter: Arc<dyn OrderSubmitter>,
    sink: Arc<dyn NotificationSink>,
    registry: TrackingRegistry,
    locale: Locale,
    settings: TrackerSettings,
}

impl ProductTracker {
    pub fn new(
        fetcher: Arc<dyn ProductFetcher>,
        submitter: Arc<dyn OrderSubmitter>,
        sink: Arc<dyn NotificationSink>,
        registry: TrackingRegistry,
        locale: Locale,
        settings: TrackerSettings,
    ) -> Self {
        Self {
            fetcher,
            submitter,
            sink,
            registry,
            locale,
            settings,
        }
    }

    pub async fn track(&self, mut product: Product, mut cancel: CancelSignal) -> TrackerReport {
        info!(
            product_id = product.id,
            max_price = %self.locale.format_price(product.max_price),
            "tracking product"
        );
        product.status = TrackedStatus::Active;
        let mut order_number: Option<String> = None;
        let mut last_ceiling_notice: Option<Instant> = None;

        while !cancel.is_cancelled() {
            match self.fetcher.fetch(product.id).await {
                Ok(snapshot) => {
                    // A snapshot fetched across the cancellation edge is
                    // not acted on; no ordering attempt has begun yet.
                    if cancel.is_cancelled() {
                        break;
                    }

                    if !snapshot.found {
                        product.status = TrackedStatus::ProductNotFound;
                        error!(product_id = product.id, "product page reports not found");
                        break;
                    }

                    if let Some(name) = snapshot.name {
                        if product.name.as_deref() != Some(name.as_str()) {
                            product.name = Some(name);
                        }
                    }

                    match snapshot.stock {
                        Some(stock) => {
                            product.current_price = Some(stock.price);
                            if stock.price <= product.max_price {
                                match self.attempt_order(&mut product, &stock).await {
                                    OrderAttempt::Terminal(number) => {
                                        order_number = number;
                                        break;
                                    }
                                    OrderAttempt::Unconfirmed => {}
                                }
                            } else {
                                self.ceiling_check(&product, &stock, &mut last_ceiling_notice)
                                    .await;
                            }
                        }
                        None => {
                            debug!(
                                product_id = product.id,
                                name = product.display_name(),
                                "not in stock"
                            );
                        }
                    }
                }
                Err(err) => {
                    warn!(
                        product_id = product.id,
                        error = %err,
                        "fetch failed, retrying next poll"
                    );
                }
            }

            self.idle(&mut cancel).await;
        }

        TrackerReport {
            product_id: product.id,
            name: product.name.clone(),
            status: product.status,
            final_price: product.current_price,
            order_number,
            finished_at: Utc::now(),
        }
    }

    /// Submit an order with the current snapshot's token and cookie and
    /// fold the result into the product state.
    async fn attempt_order(&self, product: &mut Product, stock: &StockInfo) -> OrderAttempt {
        product.status = TrackedStatus::InOrderProcess;
        info!(
            product_id = product.id,
            name = product.display_name(),
            price = %self.locale.format_price(stock.price),
            "price at or below ceiling, submitting order"
        );

        match self
            .submitter
            .submit(product, &stock.order_token, &stock.session_cookie)
            .await
        {
            Err(err) => {
                error!(
                    product_id = product.id,
                    error = %err,
                    "order transport failed, abandoning product"
                );
                product.status = TrackedStatus::FailOrderProcess;
                OrderAttempt::Terminal(None)
            }
            Ok(outcome) => match outcome.status {
                OrderStatus::Failed => {
                    error!(
                        product_id = product.id,
                        name = product.display_name(),
                        "order rejected: response status outside the success range"
                    );
                    product.status = TrackedStatus::FailOrderProcess;
                    OrderAttempt::Terminal(None)
                }
                OrderStatus::Ordered => match outcome.order_number {
                    Some(number) => {
                        product.status = TrackedStatus::ProductOrdered;
                        info!(
                            product_id = product.id,
                            name = product.display_name(),
                            order_number = %number,
                            price = %self.locale.format_price(stock.price),
                            "product ordered"
                        );
                        if let Err(err) = self.sink.notify_ordered(product, &number).await {
                            warn!(
                                product_id = product.id,
                                error = %err,
                                "order notification failed"
                            );
                        }
                        self.registry.cancel(product.id).await;
                        OrderAttempt::Terminal(Some(number))
                    }
                    None => {
                        warn!(
                            product_id = product.id,
                            "order response carried no confirmation number, \
                             treating as unconfirmed and polling on"
                        );
                        product.status = TrackedStatus::Active;
                        OrderAttempt::Unconfirmed
                    }
                },
            },
        }
    }

    /// In stock but above the ceiling: notify on the first observation, or
    /// once the re-notify window has elapsed since the last successful
    /// notice; suppress otherwise. A failed send leaves the window unset
    /// so the next cycle tries again.
    async fn ceiling_check(
        &self,
        product: &Product,
        stock: &StockInfo,
        last_notice: &mut Option<Instant>,
    ) {
        let due = last_notice.is_none_or(|at| at.elapsed() >= self.settings.renotify_after);
        if !due {
            debug!(
                product_id = product.id,
                "still above ceiling, notification suppressed"
            );
            return;
        }

        match self.sink.notify_price_above_ceiling(product).await {
            Ok(()) => {
                info!(
                    product_id = product.id,
                    name = product.display_name(),
                    price = %self.locale.format_price(stock.price),
                    ceiling = %self.locale.format_price(product.max_price),
                    "in stock above the price ceiling, notification sent"
                );
                *last_notice = Some(Instant::now());
            }
            Err(err) => {
                warn!(
                    product_id = product.id,
                    error = %err,
                    "price notification failed, will retry next poll"
                );
            }
        }
    }

    /// Wait out the poll interval; cancellation interrupts the sleep.
    async fn idle(&self, cancel: &mut CancelSignal) {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(self.settings.poll_interval) => {}
        }
    }
}

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Lifecycle of one tracked product.
///
/// `Active` is re-entered after every non-terminal poll; the three terminal
/// states end the tracker for good.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrackedStatus {
    Active,
    InOrderProcess,
    ProductNotFound,
    FailOrderProcess,
    ProductOrdered,
}

impl TrackedStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TrackedStatus::ProductNotFound
                | TrackedStatus::FailOrderProcess
                | TrackedStatus::ProductOrdered
        )
    }
}

/// A tracked product. `max_price` is fixed at creation; the remaining
/// fields are written only by the owning tracker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: u32,
    pub name: Option<String>,
    pub max_price: Decimal,
    pub current_price: Option<Decimal>,
    pub status: TrackedStatus,
}

impl Product {
    pub fn new(id: u32, max_price: Decimal) -> Self {
        Self {
            id,
            name: None,
            max_price,
            current_price: None,
            status: TrackedStatus::Active,
        }
    }

    /// Display name for logs while the real name is not yet known.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unknown>")
    }
}

/// Facts present on a product page only while the product is purchasable.
/// The token and cookie are scoped to the session that produced them and
/// must be consumed in the same poll cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct StockInfo {
    pub price: Decimal,
    pub order_token: String,
    pub session_cookie: String,
}

/// Everything extracted from a single fetch of a product page. Ephemeral:
/// produced by one fetch, consumed immediately by the owning tracker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageSnapshot {
    pub found: bool,
    pub name: Option<String>,
    /// `Some` exactly when the in-stock marker matched.
    pub stock: Option<StockInfo>,
}

impl PageSnapshot {
    pub fn not_found() -> Self {
        Self::default()
    }

    pub fn in_stock(&self) -> bool {
        self.stock.is_some()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Ordered,
    Failed,
}

/// Result of one order submission.
///
/// `Ordered` with no `order_number` means the HTTP call succeeded but the
/// confirmation marker was missing, which the tracker treats as not yet
/// conclusively ordered.
#[derive(Debug, Clone)]
pub struct OrderOutcome {
    pub status: OrderStatus,
    pub raw_body: Option<String>,
    pub order_number: Option<String>,
}

/// Terminal record for one tracker, aggregated by the orchestrator.
#[derive(Debug, Clone, Serialize)]
pub struct TrackerReport {
    pub product_id: u32,
    pub name: Option<String>,
    pub status: TrackedStatus,
    pub final_price: Option<Decimal>,
    pub order_number: Option<String>,
    pub finished_at: DateTime<Utc>,
}

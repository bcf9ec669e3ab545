use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::env;
use url::Url;

use crate::money::Locale;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub shop: ShopConfig,
    pub identity: IdentityConfig,
    pub tracking: TrackingConfig,
    pub locale: Locale,
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub products: Vec<ProductEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopConfig {
    pub base_url: String,
    /// Path of a product page; must contain an `{id}` placeholder.
    pub product_path: String,
    /// Path of the quick-order endpoint.
    pub order_path: String,
    pub user_agent: String,
    pub request_timeout: u64,
    /// Name of the session cookie the shop issues on page fetches.
    pub session_cookie: String,
    pub page: PageRules,
}

/// CSS selectors and marker texts that locate the facts on a product page
/// and the order confirmation in the quick-order response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRules {
    pub not_found_selector: String,
    pub not_found_marker: String,
    pub name_selector: String,
    pub stock_selector: String,
    pub in_stock_marker: String,
    pub price_selector: String,
    /// Attribute carrying the price value; element text when absent.
    pub price_attr: Option<String>,
    pub token_selector: String,
    pub token_attr: String,
    pub confirmation_selector: String,
}

/// Who the quick-order endpoint should register the purchase for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub customer_name: String,
    pub phone_number: String,
}

impl IdentityConfig {
    /// Contact number reduced to bare digits, as the order endpoint
    /// expects. `None` when there are no digits or more than twelve.
    pub fn normalized_phone(&self) -> Option<String> {
        let digits: String = self
            .phone_number
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect();
        (!digits.is_empty() && digits.len() <= 12).then_some(digits)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    pub poll_interval_secs: u64,
    pub renotify_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Send mail when a product is in stock above its ceiling.
    pub notify_above_ceiling: bool,
    pub smtp: SmtpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: String,
    pub from_name: String,
    pub to_address: String,
    pub use_tls: bool,
}

/// One watched product: shop article id plus the price ceiling.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ProductEntry {
    pub id: u32,
    pub max_price: Decimal,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default"))
            // Add environment-specific config
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Add local config (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with prefix "PRICEHAWK_"
            .add_source(Environment::with_prefix("PRICEHAWK").separator("__"))
            .build()?;

        let config: AppConfig = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if Url::parse(&self.shop.base_url).is_err() {
            return Err(ConfigError::Message("Invalid shop base URL format".into()));
        }

        if !self.shop.product_path.contains("{id}") {
            return Err(ConfigError::Message(
                "shop.product_path must contain an {id} placeholder".into(),
            ));
        }

        if self.shop.request_timeout == 0 {
            return Err(ConfigError::Message(
                "shop.request_timeout must be greater than 0".into(),
            ));
        }

        if self.identity.customer_name.trim().is_empty() {
            return Err(ConfigError::Message(
                "identity.customer_name must be set before tracking can start".into(),
            ));
        }

        if self.identity.normalized_phone().is_none() {
            return Err(ConfigError::Message(
                "identity.phone_number must contain between 1 and 12 digits".into(),
            ));
        }

        if self.tracking.poll_interval_secs == 0 {
            return Err(ConfigError::Message(
                "tracking.poll_interval_secs must be greater than 0".into(),
            ));
        }

        if self.tracking.renotify_interval_secs == 0 {
            return Err(ConfigError::Message(
                "tracking.renotify_interval_secs must be greater than 0".into(),
            ));
        }

        if self.notifications.smtp.port == 0 {
            return Err(ConfigError::Message("SMTP port must be greater than 0".into()));
        }

        for product in &self.products {
            if product.max_price <= Decimal::ZERO {
                return Err(ConfigError::Message(format!(
                    "max_price must be positive for product {}",
                    product.id
                )));
            }
        }

        Ok(())
    }
}

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use scraper::{Html, Selector};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;
use url::Url;

use crate::config::{IdentityConfig, ShopConfig};
use crate::models::{OrderOutcome, OrderStatus, Product};
use crate::utils::error::{AppError, SubmitError};

/// Submits one purchase attempt.
///
/// The token and cookie must come from the same page fetch: both are
/// session-scoped on the shop side and a stale token is rejected.
#[async_trait]
pub trait OrderSubmitter: Send + Sync {
    async fn submit(
        &self,
        product: &Product,
        order_token: &str,
        session_cookie: &str,
    ) -> Result<OrderOutcome, SubmitError>;
}

/// Production submitter for the shop's quick-order endpoint.
pub struct QuickOrderClient {
    client: reqwest::Client,
    base_url: Url,
    product_path: String,
    order_path: String,
    session_cookie: String,
    confirmation_selector: String,
    customer_name: String,
    phone_number: String,
    preflight: OnceCell<()>,
}

impl QuickOrderClient {
    pub fn new(shop: &ShopConfig, identity: &IdentityConfig) -> Result<Self, AppError> {
        let base_url = Url::parse(&shop.base_url)
            .map_err(|e| AppError::Validation(format!("invalid shop base URL: {e}")))?;
        let phone_number = identity.normalized_phone().ok_or_else(|| {
            AppError::Validation("phone_number must contain between 1 and 12 digits".into())
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("text/html, */*"));
        headers.insert("x-requested-with", HeaderValue::from_static("XMLHttpRequest"));
        headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store, no-cache, must-revalidate"),
        );

        let client = reqwest::Client::builder()
            .user_agent(&shop.user_agent)
            .default_headers(headers)
            .timeout(Duration::from_secs(shop.request_timeout))
            .build()?;

        Ok(Self {
            client,
            base_url,
            product_path: shop.product_path.clone(),
            order_path: shop.order_path.clone(),
            session_cookie: shop.session_cookie.clone(),
            confirmation_selector: shop.page.confirmation_selector.clone(),
            customer_name: identity.customer_name.clone(),
            phone_number,
            preflight: OnceCell::new(),
        })
    }

    /// One-shot TLS preflight against the shop origin, run before the
    /// first order of a process lifetime. A transport failure here fails
    /// the order attempt; the next attempt retries the preflight.
    async fn ensure_preflight(&self, product_id: u32) -> Result<(), SubmitError> {
        self.preflight
            .get_or_try_init(|| async {
                debug!(url = %self.base_url, "verifying shop TLS endpoint before first order");
                self.client
                    .head(self.base_url.clone())
                    .send()
                    .await
                    .map(|_| ())
            })
            .await
            .map(|_| ())
            .map_err(|source| SubmitError::transport(product_id, source))
    }

    /// Quick-order URL carrying the identity fields and the snapshot's
    /// anti-replay token.
    fn order_url(&self, product: &Product, order_token: &str) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(&self.order_path);
        url.query_pairs_mut()
            .append_pair("good_id", &product.id.to_string())
            .append_pair("type", "1")
            .append_pair("fam", &self.customer_name)
            .append_pair("tel", &self.phone_number)
            .append_pair("token", order_token)
            .append_pair("tokenName", "quick_order")
            .append_pair("close_button", "false");
        url
    }

    fn referer(&self, product_id: u32) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(&self.product_path.replace("{id}", &product_id.to_string()));
        url
    }

    /// Pull the confirmation number out of the order response body.
    fn confirmation_number(&self, body: &str) -> Option<String> {
        let selector = Selector::parse(&self.confirmation_selector).ok()?;
        let document = Html::parse_document(body);
        document
            .select(&selector)
            .next()
            .map(|el| el.text().collect::<Vec<_>>().join(" ").trim().to_string())
            .filter(|number| !number.is_empty())
    }
}

#[async_trait]
impl OrderSubmitter for QuickOrderClient {
    async fn submit(
        &self,
        product: &Product,
        order_token: &str,
        session_cookie: &str,
    ) -> Result<OrderOutcome, SubmitError> {
        self.ensure_preflight(product.id).await?;

        let response = self
            .client
            .get(self.order_url(product, order_token))
            .header(header::REFERER, self.referer(product.id).as_str())
            .header(
                header::COOKIE,
                format!("{}={}", self.session_cookie, session_cookie),
            )
            .send()
            .await
            .map_err(|source| SubmitError::transport(product.id, source))?;

        if !response.status().is_success() {
            return Ok(OrderOutcome {
                status: OrderStatus::Failed,
                raw_body: None,
                order_number: None,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|source| SubmitError::transport(product.id, source))?;
        let order_number = self.confirmation_number(&body);

        Ok(OrderOutcome {
            status: OrderStatus::Ordered,
            order_number,
            raw_body: Some(body),
        })
    }
}

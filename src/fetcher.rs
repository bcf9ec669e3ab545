use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use scraper::{Html, Selector};
use std::time::Duration;
use url::Url;

use crate::config::{PageRules, ShopConfig};
use crate::models::{PageSnapshot, StockInfo};
use crate::money::Locale;
use crate::utils::error::{AppError, FetchError};

/// Fetches one product page and extracts the facts the tracker decides on.
///
/// Implementations report what they saw; they never choose retry policy.
#[async_trait]
pub trait ProductFetcher: Send + Sync {
    async fn fetch(&self, product_id: u32) -> Result<PageSnapshot, FetchError>;
}

/// Production fetcher: plain HTTP GET against the shop with a browser-like
/// identity and caching disabled, extraction driven by configured
/// selectors and marker texts.
pub struct WebFetcher {
    client: reqwest::Client,
    base_url: Url,
    product_path: String,
    session_cookie: String,
    rules: PageRules,
    locale: Locale,
}

impl WebFetcher {
    pub fn new(shop: &ShopConfig, locale: Locale) -> Result<Self, AppError> {
        let base_url = Url::parse(&shop.base_url)
            .map_err(|e| AppError::Validation(format!("invalid shop base URL: {e}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store, no-cache, must-revalidate"),
        );
        headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("text/html, */*"));

        let client = reqwest::Client::builder()
            .user_agent(&shop.user_agent)
            .default_headers(headers)
            .timeout(Duration::from_secs(shop.request_timeout))
            .build()?;

        Ok(Self {
            client,
            base_url,
            product_path: shop.product_path.clone(),
            session_cookie: shop.session_cookie.clone(),
            rules: shop.page.clone(),
            locale,
        })
    }

    /// Product page URL for a shop article id.
    pub fn product_url(&self, product_id: u32) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(&self.product_path.replace("{id}", &product_id.to_string()));
        url
    }

    fn selector(&self, raw: &str, product_id: u32) -> Result<Selector, FetchError> {
        Selector::parse(raw).map_err(|_| FetchError::Malformed {
            product_id,
            what: format!("selector `{raw}`"),
        })
    }

    /// Interpret a fetched page body. Split from `fetch` so the extraction
    /// rules stay testable without a server.
    fn read_page(
        &self,
        product_id: u32,
        body: &str,
        session_cookie: Option<String>,
    ) -> Result<PageSnapshot, FetchError> {
        let document = Html::parse_document(body);
        let malformed = |what: &str| FetchError::Malformed {
            product_id,
            what: what.to_string(),
        };

        let not_found_sel = self.selector(&self.rules.not_found_selector, product_id)?;
        let not_found = document.select(&not_found_sel).any(|el| {
            el.text()
                .collect::<String>()
                .contains(&self.rules.not_found_marker)
        });
        if not_found {
            return Ok(PageSnapshot::not_found());
        }

        let name_sel = self.selector(&self.rules.name_selector, product_id)?;
        let name = first_text(&document, &name_sel).filter(|s| !s.is_empty());

        let stock_sel = self.selector(&self.rules.stock_selector, product_id)?;
        let in_stock = first_text(&document, &stock_sel)
            .is_some_and(|status| status == self.rules.in_stock_marker);

        if !in_stock {
            return Ok(PageSnapshot {
                found: true,
                name,
                stock: None,
            });
        }

        let price_sel = self.selector(&self.rules.price_selector, product_id)?;
        let price_raw = match &self.rules.price_attr {
            Some(attr) => first_attr(&document, &price_sel, attr),
            None => first_text(&document, &price_sel),
        }
        .ok_or_else(|| malformed("the price element"))?;
        let price = self
            .locale
            .parse_price(&price_raw)
            .ok_or_else(|| malformed("a parseable price value"))?;

        let token_sel = self.selector(&self.rules.token_selector, product_id)?;
        let order_token = first_attr(&document, &token_sel, &self.rules.token_attr)
            .ok_or_else(|| malformed("the order token"))?;

        let session_cookie = session_cookie.ok_or_else(|| malformed("the session cookie"))?;

        Ok(PageSnapshot {
            found: true,
            name,
            stock: Some(StockInfo {
                price,
                order_token,
                session_cookie,
            }),
        })
    }
}

#[async_trait]
impl ProductFetcher for WebFetcher {
    async fn fetch(&self, product_id: u32) -> Result<PageSnapshot, FetchError> {
        let response = self
            .client
            .get(self.product_url(product_id))
            .send()
            .await
            .map_err(|source| FetchError::Network { product_id, source })?;

        let session_cookie = response
            .cookies()
            .find(|cookie| cookie.name() == self.session_cookie)
            .map(|cookie| cookie.value().to_string());

        let body = response
            .text()
            .await
            .map_err(|source| FetchError::Network { product_id, source })?;

        self.read_page(product_id, &body, session_cookie)
    }
}

fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document.select(selector).next().map(|el| {
        el.text()
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string()
    })
}

fn first_attr(document: &Html, selector: &Selector, attr: &str) -> Option<String> {
    document
        .select(selector)
        .next()
        .and_then(|el| el.value().attr(attr))
        .map(str::to_string)
}

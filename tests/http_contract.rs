// HTTP-level contract tests for the production fetcher and order client
// against a local mock server.

use rust_decimal::Decimal;
use std::str::FromStr;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pricehawk::config::{IdentityConfig, PageRules, ShopConfig};
use pricehawk::fetcher::{ProductFetcher, WebFetcher};
use pricehawk::models::{OrderStatus, Product};
use pricehawk::money::Locale;
use pricehawk::order::{OrderSubmitter, QuickOrderClient};
use pricehawk::utils::error::FetchError;

fn test_rules() -> PageRules {
    PageRules {
        not_found_selector: ".top".to_string(),
        not_found_marker: "Product not found".to_string(),
        name_selector: "#product_head".to_string(),
        stock_selector: ".stock_state".to_string(),
        in_stock_marker: "in stock".to_string(),
        price_selector: "[itemprop=price]".to_string(),
        price_attr: Some("content".to_string()),
        token_selector: "input[name=token]".to_string(),
        token_attr: "value".to_string(),
        confirmation_selector: ".green".to_string(),
    }
}

fn shop_config(base_url: &str) -> ShopConfig {
    ShopConfig {
        base_url: base_url.to_string(),
        product_path: "/catalog/item{id}.htm".to_string(),
        order_path: "/ajax/quick_order.php".to_string(),
        user_agent: "TestAgent/1.0".to_string(),
        request_timeout: 5,
        session_cookie: "PHPSESSID".to_string(),
        page: test_rules(),
    }
}

fn identity() -> IdentityConfig {
    IdentityConfig {
        customer_name: "Test Customer".to_string(),
        phone_number: "+7 (900) 123-45-67".to_string(),
    }
}

const IN_STOCK_PAGE: &str = r#"
    <html><body>
        <h1 id="product_head">Graphics Card XT 8GB</h1>
        <div class="stock_state">in stock</div>
        <meta itemprop="price" content="899.99">
        <form><input type="hidden" name="token" value="tok-123"></form>
    </body></html>
"#;

#[tokio::test]
async fn fetcher_extracts_a_full_in_stock_snapshot() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/catalog/item1042.htm"))
        .and(header("cache-control", "no-store, no-cache, must-revalidate"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(IN_STOCK_PAGE)
                .insert_header("set-cookie", "PHPSESSID=sess-abc; path=/"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = WebFetcher::new(&shop_config(&server.uri()), Locale::default()).unwrap();
    let snapshot = fetcher.fetch(1042).await.unwrap();

    assert!(snapshot.found);
    assert_eq!(snapshot.name.as_deref(), Some("Graphics Card XT 8GB"));
    let stock = snapshot.stock.unwrap();
    assert_eq!(stock.price, Decimal::from_str("899.99").unwrap());
    assert_eq!(stock.order_token, "tok-123");
    assert_eq!(stock.session_cookie, "sess-abc");
}

#[tokio::test]
async fn fetcher_reports_not_found_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/catalog/item9.htm"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body><div class="top">Product not found</div></body></html>"#,
        ))
        .mount(&server)
        .await;

    let fetcher = WebFetcher::new(&shop_config(&server.uri()), Locale::default()).unwrap();
    let snapshot = fetcher.fetch(9).await.unwrap();
    assert!(!snapshot.found);
}

#[tokio::test]
async fn fetcher_flags_missing_markers_as_malformed() {
    let server = MockServer::start().await;
    // The in-stock marker is present but the token input is missing.
    Mock::given(method("GET"))
        .and(path("/catalog/item9.htm"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body>
                <div class="stock_state">in stock</div>
                <meta itemprop="price" content="899.99">
            </body></html>"#,
        ))
        .mount(&server)
        .await;

    let fetcher = WebFetcher::new(&shop_config(&server.uri()), Locale::default()).unwrap();
    let err = fetcher.fetch(9).await.unwrap_err();
    assert!(matches!(err, FetchError::Malformed { product_id: 9, .. }));
}

#[tokio::test]
async fn fetcher_reports_transport_failures_as_network_errors() {
    // Nothing listens on this port.
    let fetcher = WebFetcher::new(&shop_config("http://127.0.0.1:9"), Locale::default()).unwrap();
    let err = fetcher.fetch(9).await.unwrap_err();
    assert!(matches!(err, FetchError::Network { product_id: 9, .. }));
}

#[tokio::test]
async fn order_client_honors_the_quick_order_contract() {
    let server = MockServer::start().await;

    // One TLS preflight per client, no matter how many orders follow.
    Mock::given(method("HEAD"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/ajax/quick_order.php"))
        .and(query_param("good_id", "1042"))
        .and(query_param("fam", "Test Customer"))
        .and(query_param("tel", "79001234567"))
        .and(query_param("token", "tok-123"))
        .and(query_param("tokenName", "quick_order"))
        .and(header("x-requested-with", "XMLHttpRequest"))
        .and(header("cookie", "PHPSESSID=sess-abc"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body><span class="green">70012345</span></body></html>"#,
        ))
        .expect(2)
        .mount(&server)
        .await;

    let client = QuickOrderClient::new(&shop_config(&server.uri()), &identity()).unwrap();
    let product = Product::new(1042, Decimal::from(1000));

    let outcome = client.submit(&product, "tok-123", "sess-abc").await.unwrap();
    assert_eq!(outcome.status, OrderStatus::Ordered);
    assert_eq!(outcome.order_number.as_deref(), Some("70012345"));

    // A second submit must not repeat the preflight.
    let outcome = client.submit(&product, "tok-123", "sess-abc").await.unwrap();
    assert_eq!(outcome.status, OrderStatus::Ordered);
}

#[tokio::test]
async fn order_client_maps_rejections_to_failed_outcome() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ajax/quick_order.php"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = QuickOrderClient::new(&shop_config(&server.uri()), &identity()).unwrap();
    let product = Product::new(1042, Decimal::from(1000));

    let outcome = client.submit(&product, "tok", "sess").await.unwrap();
    assert_eq!(outcome.status, OrderStatus::Failed);
    assert!(outcome.order_number.is_none());
}

#[tokio::test]
async fn order_client_treats_missing_confirmation_as_unconfirmed() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ajax/quick_order.php"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><body>order accepted, confirmation pending</body></html>"),
        )
        .mount(&server)
        .await;

    let client = QuickOrderClient::new(&shop_config(&server.uri()), &identity()).unwrap();
    let product = Product::new(1042, Decimal::from(1000));

    let outcome = client.submit(&product, "tok", "sess").await.unwrap();
    assert_eq!(outcome.status, OrderStatus::Ordered);
    assert!(outcome.order_number.is_none());
    assert!(outcome.raw_body.is_some());
}

#[tokio::test]
async fn order_client_fails_the_attempt_on_transport_errors() {
    let client =
        QuickOrderClient::new(&shop_config("http://127.0.0.1:9"), &identity()).unwrap();
    let product = Product::new(1042, Decimal::from(1000));

    let err = client.submit(&product, "tok", "sess").await.unwrap_err();
    assert_eq!(err.product_id, 1042);
}

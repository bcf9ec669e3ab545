use async_trait::async_trait;
use lettre::message::{header, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;

use crate::config::{NotificationsConfig, ShopConfig, SmtpConfig};
use crate::models::Product;
use crate::money::Locale;
use crate::utils::error::NotifyError;

/// Where notable tracking transitions go.
///
/// Delivery failure is returned to the caller, which logs it and keeps
/// tracking; it is never terminal.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// The product is in stock but priced above the configured ceiling.
    async fn notify_price_above_ceiling(&self, product: &Product) -> Result<(), NotifyError>;

    /// An order went through with a confirmed order number.
    async fn notify_ordered(&self, product: &Product, order_number: &str)
        -> Result<(), NotifyError>;
}

/// SMTP implementation: multipart HTML + plain-text mail per event.
pub struct EmailNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    smtp: SmtpConfig,
    locale: Locale,
    product_link_template: String,
    notify_above_ceiling: bool,
}

impl EmailNotifier {
    pub fn new(
        notifications: &NotificationsConfig,
        shop: &ShopConfig,
        locale: Locale,
    ) -> Result<Self, NotifyError> {
        let smtp = &notifications.smtp;
        let mut builder = if smtp.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&smtp.host)
        };
        builder = builder.port(smtp.port);
        if let (Some(username), Some(password)) = (&smtp.username, &smtp.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        let product_link_template = format!(
            "{}{}",
            shop.base_url.trim_end_matches('/'),
            shop.product_path
        );

        Ok(Self {
            mailer: builder.build(),
            smtp: smtp.clone(),
            locale,
            product_link_template,
            notify_above_ceiling: notifications.notify_above_ceiling,
        })
    }

    fn product_link(&self, product_id: u32) -> String {
        self.product_link_template
            .replace("{id}", &product_id.to_string())
    }

    fn price_subject(&self, product: &Product) -> String {
        format!("In stock above ceiling: {}", product.display_name())
    }

    fn order_subject(&self, product: &Product) -> String {
        format!("Order placed: {}", product.display_name())
    }

    fn price_text_body(&self, product: &Product) -> String {
        let mut text = String::new();
        text.push_str(&format!(
            "Product [{}] {} is in stock.\n\n",
            product.id,
            product.display_name()
        ));
        if let Some(price) = product.current_price {
            text.push_str(&format!(
                "Current price: {}\n",
                self.locale.format_price(price)
            ));
            text.push_str(&format!(
                "Configured ceiling: {}\n",
                self.locale.format_price(product.max_price)
            ));
            text.push_str(&format!(
                "Gap above ceiling: {}\n",
                self.locale.format_price(price - product.max_price)
            ));
        }
        text.push_str(&format!("\nProduct page: {}\n", self.product_link(product.id)));
        text
    }

    fn price_html_body(&self, product: &Product) -> String {
        let price_rows = match product.current_price {
            Some(price) => format!(
                r#"<div class="row"><strong>Current price:</strong> {}</div>
<div class="row"><strong>Configured ceiling:</strong> {}</div>
<div class="row"><strong>Gap above ceiling:</strong> {}</div>"#,
                self.locale.format_price(price),
                self.locale.format_price(product.max_price),
                self.locale.format_price(price - product.max_price),
            ),
            None => String::new(),
        };
        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <style>
        body {{ font-family: Arial, sans-serif; margin: 20px; }}
        .header {{ background: #fff3cd; padding: 15px; border-radius: 5px; border-left: 4px solid #ff9800; }}
        .product {{ font-size: 18px; font-weight: bold; }}
        .row {{ margin: 8px 0; }}
    </style>
</head>
<body>
    <div class="header">
        <div class="product">[{}] {}</div>
        <div>In stock, but above your price ceiling</div>
    </div>
    {}
    <div class="row"><a href="{}">View product</a></div>
</body>
</html>
"#,
            product.id,
            product.display_name(),
            price_rows,
            self.product_link(product.id),
        )
    }

    fn order_text_body(&self, product: &Product, order_number: &str) -> String {
        let mut text = String::new();
        text.push_str(&format!(
            "Product [{}] {} was ordered successfully.\n\n",
            product.id,
            product.display_name()
        ));
        text.push_str(&format!("Order number: {order_number}\n"));
        if let Some(price) = product.current_price {
            text.push_str(&format!(
                "Order price: {}\n",
                self.locale.format_price(price)
            ));
        }
        text.push_str(&format!(
            "Configured ceiling: {}\n",
            self.locale.format_price(product.max_price)
        ));
        text.push_str(&format!("\nProduct page: {}\n", self.product_link(product.id)));
        text
    }

    fn order_html_body(&self, product: &Product, order_number: &str) -> String {
        let price_row = match product.current_price {
            Some(price) => format!(
                r#"<div class="row"><strong>Order price:</strong> {}</div>"#,
                self.locale.format_price(price)
            ),
            None => String::new(),
        };
        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <style>
        body {{ font-family: Arial, sans-serif; margin: 20px; }}
        .header {{ background: #e8f5e8; padding: 15px; border-radius: 5px; border-left: 4px solid #4CAF50; }}
        .product {{ font-size: 18px; font-weight: bold; }}
        .row {{ margin: 8px 0; }}
    </style>
</head>
<body>
    <div class="header">
        <div class="product">[{}] {}</div>
        <div>Order placed</div>
    </div>
    <div class="row"><strong>Order number:</strong> {}</div>
    {}
    <div class="row"><strong>Configured ceiling:</strong> {}</div>
    <div class="row"><a href="{}">View product</a></div>
</body>
</html>
"#,
            product.id,
            product.display_name(),
            order_number,
            price_row,
            self.locale.format_price(product.max_price),
            self.product_link(product.id),
        )
    }

    async fn send(&self, subject: String, text: String, html: String) -> Result<(), NotifyError> {
        let from: Mailbox =
            format!("{} <{}>", self.smtp.from_name, self.smtp.from_address).parse()?;
        let message = Message::builder()
            .from(from)
            .to(self.smtp.to_address.parse()?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_PLAIN)
                            .body(text),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_HTML)
                            .body(html),
                    ),
            )?;

        self.mailer.send(message).await?;
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for EmailNotifier {
    async fn notify_price_above_ceiling(&self, product: &Product) -> Result<(), NotifyError> {
        if !self.notify_above_ceiling {
            debug!(product_id = product.id, "above-ceiling mail disabled, skipping");
            return Ok(());
        }
        self.send(
            self.price_subject(product),
            self.price_text_body(product),
            self.price_html_body(product),
        )
        .await
    }

    async fn notify_ordered(
        &self,
        product: &Product,
        order_number: &str,
    ) -> Result<(), NotifyError> {
        self.send(
            self.order_subject(product),
            self.order_text_body(product, order_number),
            self.order_html_body(product, order_number),
        )
        .await
    }
}

use thiserror::Error;

/// Failures while fetching or interpreting a product page.
///
/// Both kinds are recoverable: the tracker logs them and retries on the
/// next poll cycle.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("network error fetching product {product_id}: {source}")]
    Network {
        product_id: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("page for product {product_id} loaded but {what} could not be located")]
    Malformed { product_id: u32, what: String },
}

/// Transport-level failure while submitting an order, before any response
/// was obtained. Fatal to the tracker: an order attempt is never retried.
#[derive(Error, Debug)]
#[error("order request for product {product_id} failed before a response: {message}")]
pub struct SubmitError {
    pub product_id: u32,
    pub message: String,
}

impl SubmitError {
    pub fn transport(product_id: u32, source: reqwest::Error) -> Self {
        Self {
            product_id,
            message: source.to_string(),
        }
    }
}

/// Notification delivery failures. Logged by the caller; never terminal.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("SMTP transport error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("message build error: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("nothing to track: the product list is empty")]
    NoProducts,

    #[error("Validation error: {0}")]
    Validation(String),
}

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

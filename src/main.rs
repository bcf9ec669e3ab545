use anyhow::Result;
use clap::Parser;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use pricehawk::config::{AppConfig, ProductEntry};
use pricehawk::fetcher::WebFetcher;
use pricehawk::notify::EmailNotifier;
use pricehawk::orchestrator::Orchestrator;
use pricehawk::order::QuickOrderClient;
use pricehawk::registry::TrackingRegistry;
use pricehawk::tracker::{ProductTracker, TrackerSettings};

#[derive(Parser, Debug)]
#[command(
    name = "pricehawk",
    about = "Tracks shop products and orders them once the price is right"
)]
struct Cli {
    /// Track a single article id instead of the configured product list
    #[arg(long, requires = "max_price")]
    product: Option<u32>,

    /// Price ceiling for the --product override
    #[arg(long, requires = "product")]
    max_price: Option<Decimal>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pricehawk=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    let products: Vec<ProductEntry> = match (cli.product, cli.max_price) {
        (Some(id), Some(max_price)) => vec![ProductEntry { id, max_price }],
        _ => config.products.clone(),
    };

    let registry = TrackingRegistry::new();
    let fetcher = Arc::new(WebFetcher::new(&config.shop, config.locale.clone())?);
    let submitter = Arc::new(QuickOrderClient::new(&config.shop, &config.identity)?);
    let notifier = Arc::new(EmailNotifier::new(
        &config.notifications,
        &config.shop,
        config.locale.clone(),
    )?);

    let settings = TrackerSettings {
        poll_interval: Duration::from_secs(config.tracking.poll_interval_secs),
        renotify_after: Duration::from_secs(config.tracking.renotify_interval_secs),
    };
    let tracker = ProductTracker::new(
        fetcher,
        submitter,
        notifier,
        registry.clone(),
        config.locale.clone(),
        settings,
    );

    let orchestrator = Orchestrator::new(tracker, registry.clone());
    let session = orchestrator.start(&products).await?;

    let wait = session.wait();
    tokio::pin!(wait);
    let reports = tokio::select! {
        reports = &mut wait => reports,
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested, cancelling all trackers");
            registry.cancel_all().await;
            // In-flight cycles finish before the tasks unwind.
            wait.await
        }
    };

    info!(finished = reports.len(), "all trackers finished");
    debug!(summary = %serde_json::to_string(&reports)?, "run summary");
    Ok(())
}

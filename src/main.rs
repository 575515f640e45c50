use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use autoria_scraper::config::Config;
use autoria_scraper::crawler::ScraperService;
use autoria_scraper::storage::PgStorage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_logging();

    let cfg = Config::from_env()?;
    info!(start_url = %cfg.start_url, "Starting crawl");

    // Store connectivity is the only failure allowed to kill the process.
    let storage = PgStorage::connect(&cfg.database_url).await?;

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let service = ScraperService::new(cfg, Arc::new(storage), cancel)?;
    service.run().await?;

    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("autoria_scraper=info,warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Ctrl-C cancels in-flight fetches; rows already persisted stay committed.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling crawl");
            cancel.cancel();
        }
    });
}

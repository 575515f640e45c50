use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use reqwest::Client;
use tokio::sync::Semaphore;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use url::Url;

use crate::config::Config;
use crate::crawler::models::{CarListing, PendingPhone};
use crate::crawler::{fetcher, parser, phone};
use crate::storage::Storage;

/// Outcome of one listing's Discovered → … → Persisted|Dropped pipeline.
#[derive(Debug)]
enum ListingOutcome {
    Persisted { phone_resolved: bool },
    Deduplicated,
    Dropped,
    PersistFailed,
    Cancelled,
}

#[derive(Debug, Default)]
pub struct CrawlStats {
    pub total_pages: u32,
    pub discovered: usize,
    pub persisted: usize,
    pub deduplicated: usize,
    pub dropped: usize,
    pub persist_failed: usize,
    pub phone_resolved: usize,
    pub cancelled: usize,
}

/// Shared per-task context. Cloned into every spawned unit of work.
#[derive(Clone)]
struct CrawlCtx {
    client: Client,
    storage: Arc<dyn Storage>,
    cancel: CancellationToken,
    semaphore: Arc<Semaphore>,
    origin: String,
    delay: Duration,
    index_timeout: Duration,
    detail_timeout: Duration,
    phone_timeout: Duration,
}

pub struct ScraperService {
    cfg: Config,
    client: Client,
    storage: Arc<dyn Storage>,
    cancel: CancellationToken,
}

impl ScraperService {
    pub fn new(
        cfg: Config,
        storage: Arc<dyn Storage>,
        cancel: CancellationToken,
    ) -> anyhow::Result<Self> {
        let client = fetcher::build_client()?;
        Ok(Self { cfg, client, storage, cancel })
    }

    /// Runs the crawl to completion: plan pagination, harvest listing links
    /// from every index page, then drive each listing through detail fetch,
    /// phone resolution and persistence. Individual listing failures are
    /// logged and never abort the run.
    pub async fn run(&self) -> anyhow::Result<CrawlStats> {
        let start = Url::parse(&self.cfg.start_url)?;
        let ctx = CrawlCtx {
            client: self.client.clone(),
            storage: Arc::clone(&self.storage),
            cancel: self.cancel.clone(),
            semaphore: Arc::new(Semaphore::new(self.cfg.max_concurrency)),
            origin: start.origin().ascii_serialization(),
            delay: Duration::from_millis(self.cfg.delay_ms),
            index_timeout: self.cfg.index_timeout,
            detail_timeout: self.cfg.detail_timeout,
            phone_timeout: self.cfg.phone_timeout,
        };

        let total_pages = self.plan_pagination(&start).await;
        info!(total_pages, "Pagination planned");

        let links = harvest_links(&ctx, &start, total_pages).await;
        info!(count = links.len(), "Listing links harvested");

        let mut stats = CrawlStats {
            total_pages,
            discovered: links.len(),
            ..CrawlStats::default()
        };

        let tasks: Vec<_> = links
            .into_iter()
            .map(|url| {
                let ctx = ctx.clone();
                tokio::spawn(async move { process_listing(ctx, url).await })
            })
            .collect();

        for outcome in join_all(tasks).await.into_iter().flatten() {
            match outcome {
                ListingOutcome::Persisted { phone_resolved } => {
                    stats.persisted += 1;
                    if phone_resolved {
                        stats.phone_resolved += 1;
                    }
                }
                ListingOutcome::Deduplicated => stats.deduplicated += 1,
                ListingOutcome::Dropped => stats.dropped += 1,
                ListingOutcome::PersistFailed => stats.persist_failed += 1,
                ListingOutcome::Cancelled => stats.cancelled += 1,
            }
        }

        info!(
            total_pages = stats.total_pages,
            discovered = stats.discovered,
            persisted = stats.persisted,
            deduplicated = stats.deduplicated,
            dropped = stats.dropped,
            persist_failed = stats.persist_failed,
            phone_resolved = stats.phone_resolved,
            cancelled = stats.cancelled,
            "Crawl finished"
        );

        Ok(stats)
    }

    /// Fetches the first index page and reads the page count off it.
    /// Best effort: any failure falls back to the default page count.
    async fn plan_pagination(&self, start: &Url) -> u32 {
        match fetcher::fetch_html(&self.client, start.as_str(), self.cfg.index_timeout).await {
            Ok(html) => parser::extract_total_pages(&html),
            Err(e) => {
                warn!(error = %e, "Failed to fetch first index page, using default page count");
                parser::DEFAULT_TOTAL_PAGES
            }
        }
    }
}

/// Fans out one fetch per index page and merges the harvested listing URLs.
/// A failed page contributes nothing; duplicates across pages collapse.
async fn harvest_links(ctx: &CrawlCtx, start: &Url, total_pages: u32) -> HashSet<String> {
    let tasks: Vec<_> = (1..=total_pages)
        .map(|page| {
            let ctx = ctx.clone();
            let url = format!("{}?page={}", start, page);
            let base = start.clone();
            tokio::spawn(async move { harvest_page(ctx, url, base, page).await })
        })
        .collect();

    let mut links = HashSet::new();
    for page_links in join_all(tasks).await.into_iter().flatten() {
        links.extend(page_links);
    }
    links
}

async fn harvest_page(ctx: CrawlCtx, url: String, base: Url, page: u32) -> HashSet<String> {
    let Some(_permit) = acquire_slot(&ctx).await else {
        return HashSet::new();
    };

    match cancellable_fetch(&ctx, &url, ctx.index_timeout).await {
        Some(Ok(html)) => {
            let links = parser::extract_listing_links(&html, &base);
            info!(page, count = links.len(), "Index page harvested");
            links
        }
        Some(Err(e)) => {
            warn!(page, error = %e, "Failed to fetch index page");
            HashSet::new()
        }
        None => HashSet::new(),
    }
}

/// One listing's full pipeline. Holds a single concurrency slot across its
/// detail fetch, phone resolution and persist so the crawl stays bounded.
async fn process_listing(ctx: CrawlCtx, url: String) -> ListingOutcome {
    let Some(_permit) = acquire_slot(&ctx).await else {
        return ListingOutcome::Cancelled;
    };

    // Discovered → DetailFetched
    let html = match cancellable_fetch(&ctx, &url, ctx.detail_timeout).await {
        Some(Ok(html)) => html,
        Some(Err(e)) => {
            warn!(url = %url, error = %e, "Failed to fetch detail page, listing dropped");
            return ListingOutcome::Dropped;
        }
        None => return ListingOutcome::Cancelled,
    };

    let listing = match parser::scrape_car_details(&html, &url) {
        Ok(listing) => listing,
        Err(e) => {
            error!(url = %url, error = %e, "Extraction failed, listing dropped");
            return ListingOutcome::Dropped;
        }
    };

    // DetailFetched → PhoneResolved | PhoneFailed
    let listing = match phone::extract_token(&html) {
        Some(token) => resolve_phone(&ctx, PendingPhone { listing, token }).await,
        None => {
            warn!(url = %url, "No phone token on detail page");
            listing
        }
    };

    // → Persisted | failure logged, crawl continues
    persist(&ctx, listing).await
}

/// Runs the dependent phone request for a detail-fetched listing. Every
/// failure path degrades to `phone_number = None`.
async fn resolve_phone(ctx: &CrawlCtx, pending: PendingPhone) -> CarListing {
    let PendingPhone { mut listing, token } = pending;
    let url = phone::phone_url(&ctx.origin, &token);

    let fetched = tokio::select! {
        _ = ctx.cancel.cancelled() => None,
        result = fetcher::fetch_phone_json(&ctx.client, &url, ctx.phone_timeout) => Some(result),
    };

    listing.phone_number = match fetched {
        Some(Ok(body)) => match phone::parse_phone_payload(&body) {
            Ok(number) => number,
            Err(e) => {
                warn!(url = %listing.url, error = %e, "Failed to parse phone payload");
                None
            }
        },
        Some(Err(e)) => {
            warn!(url = %listing.url, error = %e, "Phone resolution request failed");
            None
        }
        None => None,
    };

    listing
}

async fn persist(ctx: &CrawlCtx, listing: CarListing) -> ListingOutcome {
    match ctx.storage.save(&listing).await {
        Ok(true) => ListingOutcome::Persisted {
            phone_resolved: listing.phone_number.is_some(),
        },
        Ok(false) => {
            info!(url = %listing.url, "Listing already stored, skipped");
            ListingOutcome::Deduplicated
        }
        Err(e) => {
            error!(url = %listing.url, error = %e, "Failed to persist listing");
            ListingOutcome::PersistFailed
        }
    }
}

/// Waits for a concurrency slot, paced by the polite delay. Returns `None`
/// once the crawl has been cancelled.
async fn acquire_slot(ctx: &CrawlCtx) -> Option<tokio::sync::OwnedSemaphorePermit> {
    let permit = tokio::select! {
        _ = ctx.cancel.cancelled() => return None,
        permit = Arc::clone(&ctx.semaphore).acquire_owned() => permit.ok()?,
    };

    if !ctx.delay.is_zero() {
        sleep(ctx.delay).await;
    }

    Some(permit)
}

/// A fetch that aborts promptly on crawl cancellation. `None` means the
/// crawl was cancelled, not that the fetch failed.
async fn cancellable_fetch(
    ctx: &CrawlCtx,
    url: &str,
    timeout: Duration,
) -> Option<anyhow::Result<String>> {
    tokio::select! {
        _ = ctx.cancel.cancelled() => None,
        result = fetcher::fetch_html(&ctx.client, url, timeout) => Some(result),
    }
}

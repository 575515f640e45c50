//! End-to-end crawl tests against a wiremock server: index discovery,
//! detail extraction, phone resolution and dedup-on-write persistence.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use autoria_scraper::config::Config;
use autoria_scraper::crawler::{CarListing, ScraperService};
use autoria_scraper::storage::{MemoryStorage, Storage};

fn test_config(start_url: String) -> Config {
    Config {
        start_url,
        database_url: String::new(),
        max_concurrency: 4,
        delay_ms: 0,
        index_timeout: Duration::from_secs(5),
        detail_timeout: Duration::from_secs(5),
        phone_timeout: Duration::from_secs(5),
    }
}

/// One index page: primary pagination control shows a single page, plus two
/// listing links.
fn index_html() -> String {
    r#"
    <html><body>
    <div id="pagination"><nav>
        <span><a>1</a></span><span></span><span></span><span></span>
        <span></span><span></span><span></span>
        <span><a>1</a></span>
        <span><a class="js-next">Наступна</a></span>
    </nav></div>
    <div class="head-ticket"><div class="item ticket-title">
        <a class="address" href="/uk/auto_bmw_530_1.html">BMW 530</a>
    </div></div>
    <div class="head-ticket"><div class="item ticket-title">
        <a class="address" href="/uk/auto_audi_a6_2.html">Audi A6</a>
    </div></div>
    </body></html>"#
        .to_string()
}

fn detail_html(title: &str, auto_id: &str, with_token: bool) -> String {
    let token = if with_token {
        r#"<div class="js-user-secure-abc" data-hash="h123" data-expires="e456"></div>"#
    } else {
        ""
    };
    format!(
        r#"
        <html><body data-auto-id="{auto_id}">
        <h1 class="head">{title}</h1>
        <section class="price mb-15 mhide"><div class="price_value"><strong>12 345 $</strong></div></section>
        <div class="base-information"><span class="size18">150</span> тис. км</div>
        {token}
        </body></html>"#
    )
}

async fn mount_index(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/uk/car/used/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(index_html()))
        .mount(server)
        .await;
}

async fn mount_detail(server: &MockServer, url_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(url_path))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn run_crawl(
    server: &MockServer,
    storage: Arc<MemoryStorage>,
    cancel: CancellationToken,
) -> autoria_scraper::crawler::CrawlStats {
    let cfg = test_config(format!("{}/uk/car/used/", server.uri()));
    let service = ScraperService::new(cfg, storage, cancel).expect("service should build");
    service.run().await.expect("crawl should complete")
}

#[tokio::test]
async fn two_listings_one_with_broken_phone_token() {
    let server = MockServer::start().await;
    mount_index(&server).await;
    mount_detail(&server, "/uk/auto_bmw_530_1.html", detail_html("BMW 530", "111", true)).await;
    mount_detail(&server, "/uk/auto_audi_a6_2.html", detail_html("Audi A6", "222", false)).await;

    Mock::given(method("GET"))
        .and(path("/users/phones/111/"))
        .and(query_param("hash", "h123"))
        .and(query_param("expires", "e456"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"phones":[{"phoneFormatted":"(067) 123-45-67"}]}"#,
        ))
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    let stats = run_crawl(&server, Arc::clone(&storage), CancellationToken::new()).await;

    assert_eq!(stats.total_pages, 1);
    assert_eq!(stats.discovered, 2);
    assert_eq!(stats.persisted, 2);
    assert_eq!(stats.phone_resolved, 1);
    assert_eq!(stats.dropped, 0);

    let rows = storage.rows().await;
    assert_eq!(rows.len(), 2);

    let bmw = find_by_path(&rows, "auto_bmw_530_1");
    assert_eq!(bmw.phone_number.as_deref(), Some("+380671234567"));
    assert_eq!(bmw.price_usd, Some(12345));
    assert_eq!(bmw.odometer_km, 150_000);

    let audi = find_by_path(&rows, "auto_audi_a6_2");
    assert_eq!(audi.phone_number, None);
    assert_eq!(audi.title.as_deref(), Some("Audi A6"));
}

#[tokio::test]
async fn listing_without_mandatory_title_is_dropped_not_persisted() {
    let server = MockServer::start().await;
    mount_index(&server).await;
    mount_detail(&server, "/uk/auto_bmw_530_1.html", detail_html("BMW 530", "111", false)).await;
    // No <h1 class="head"> at all: mandatory field missing.
    mount_detail(
        &server,
        "/uk/auto_audi_a6_2.html",
        "<html><body><p>сторінку видалено</p></body></html>".to_string(),
    )
    .await;

    let storage = Arc::new(MemoryStorage::new());
    let stats = run_crawl(&server, Arc::clone(&storage), CancellationToken::new()).await;

    assert_eq!(stats.persisted, 1);
    assert_eq!(stats.dropped, 1);

    let rows = storage.rows().await;
    assert_eq!(rows.len(), 1);
    assert!(rows[0].title.is_some());
}

#[tokio::test]
async fn recrawl_deduplicates_by_url() {
    let server = MockServer::start().await;
    mount_index(&server).await;
    mount_detail(&server, "/uk/auto_bmw_530_1.html", detail_html("BMW 530", "111", false)).await;
    mount_detail(&server, "/uk/auto_audi_a6_2.html", detail_html("Audi A6", "222", false)).await;

    let storage = Arc::new(MemoryStorage::new());

    let first = run_crawl(&server, Arc::clone(&storage), CancellationToken::new()).await;
    assert_eq!(first.persisted, 2);

    let second = run_crawl(&server, Arc::clone(&storage), CancellationToken::new()).await;
    assert_eq!(second.persisted, 0);
    assert_eq!(second.deduplicated, 2);
    assert_eq!(storage.rows().await.len(), 2);
}

#[tokio::test]
async fn cancellation_keeps_committed_rows_and_adds_nothing() {
    let server = MockServer::start().await;
    mount_index(&server).await;

    let storage = Arc::new(MemoryStorage::new());
    let committed = CarListing {
        url: "https://auto.ria.com/uk/auto_volvo_xc60_9.html".to_string(),
        title: Some("Volvo XC60".to_string()),
        price_usd: Some(21000),
        odometer_km: 90_000,
        seller_name: None,
        phone_number: None,
        image_url: None,
        plate_number: None,
        vin: None,
        city: None,
        owners_count: 1,
        engine_info: None,
        found_at: Utc::now(),
    };
    storage.save(&committed).await.expect("seed row should store");

    let cancel = CancellationToken::new();
    cancel.cancel();

    let stats = run_crawl(&server, Arc::clone(&storage), cancel).await;

    assert_eq!(stats.persisted, 0);
    let rows = storage.rows().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].url, committed.url);
}

fn find_by_path<'a>(rows: &'a [CarListing], fragment: &str) -> &'a CarListing {
    rows.iter()
        .find(|row| row.url.contains(fragment))
        .unwrap_or_else(|| panic!("no stored row for {fragment}"))
}

use std::collections::HashSet;

use chrono::Utc;
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use crate::crawler::models::{CarListing, ExtractError};

/// Page count used when pagination discovery fails entirely.
pub const DEFAULT_TOTAL_PAGES: u32 = 10;

const TOTAL_PAGES_SELECTOR: &str = "#pagination > nav > span:nth-child(8) > a";
const NEXT_PAGE_LABEL: &str = "Наступна";

const LISTING_LINK_SELECTOR: &str = "div.head-ticket > div.item.ticket-title > a.address";

const TITLE_SELECTORS: &[&str] = &[
    "h1.head",
    "div.heading h1",
    "h3.auto-content_title",
];

// The seller block is rendered in four distinct shapes across templates.
const SELLER_NAME_SELECTORS: &[&str] = &[
    "#userInfoBlock div.seller_info div.seller_info_name a",
    "#userInfoBlock div.seller_info.mb-15 div h4 a",
    "#userInfoBlock div.seller_info_area div h4 a",
    "#userInfoBlock div.seller_info div.seller_info_name",
];

const CITY_SELECTORS: &[&str] = &[
    "#userInfoBlock > ul:nth-child(2) > li:nth-child(1)",
    "#basicInfoTableMainInfoRight1 > span",
    "#breadcrumbs > div:nth-child(3) > a > span",
];

const PRICE_SELECTORS: &[&str] = &[
    "section.price.mb-15.mhide > div.price_value > strong",
    "section.price > div.price_value > strong",
    "div.price_value > strong",
];

const ODOMETER_SELECTORS: &[&str] = &[
    "div.base-information > span.size18",
    "div.base-information",
];

const IMAGE_SELECTORS: &[&str] = &[
    "#photosBlock img",
    "div.image-gallery-slides img",
];

const VIN_SELECTORS: &[&str] = &["span.label-vin", "span.vin-code"];
const PLATE_SELECTORS: &[&str] = &["span.state-num"];

const OWNERS_LABEL: &str = "Кількість власників";
const ENGINE_LABEL: &str = "Двигун";

/// Determines how many listing-index pages exist. Best effort: the primary
/// pagination control first, then the control preceding the "next" link,
/// then a fixed default. Never fails the crawl.
pub fn extract_total_pages(html: &str) -> u32 {
    let doc = Html::parse_document(html);

    let primary = Selector::parse(TOTAL_PAGES_SELECTOR).unwrap();
    if let Some(total) = doc.select(&primary).next().and_then(|el| parse_page_number(&text_of(&el)))
    {
        return total.max(1);
    }

    if let Some(total) = total_pages_before_next_link(&doc) {
        return total.max(1);
    }

    DEFAULT_TOTAL_PAGES
}

/// Fallback: the page-number control immediately preceding the
/// "Наступна" link. The markup embeds spaces as thousands separators.
fn total_pages_before_next_link(doc: &Html) -> Option<u32> {
    let spans = Selector::parse("#pagination nav span").unwrap();
    let controls: Vec<String> = doc.select(&spans).map(|el| text_of(&el)).collect();

    let next_at = controls.iter().position(|t| t.contains(NEXT_PAGE_LABEL))?;
    let before_next = controls.get(next_at.checked_sub(1)?)?;
    parse_page_number(before_next)
}

fn parse_page_number(text: &str) -> Option<u32> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = Regex::new(r"\d+").unwrap();
    digits.find(&compact)?.as_str().parse().ok()
}

/// Harvests listing URLs from one index page. Relative hrefs are resolved
/// against the index page URL; duplicates collapse into the set.
pub fn extract_listing_links(html: &str, base: &Url) -> HashSet<String> {
    let doc = Html::parse_document(html);
    let selector = Selector::parse(LISTING_LINK_SELECTOR).unwrap();

    let mut links = HashSet::new();
    for el in doc.select(&selector) {
        if let Some(href) = el.value().attr("href") {
            if let Ok(absolute) = base.join(href) {
                links.insert(absolute.to_string());
            }
        }
    }

    links
}

/// Extracts all listing fields from a detail page. Only `url` and `title`
/// are mandatory; every other field degrades to `None` or its default when
/// no selector in its chain matches.
pub fn scrape_car_details(html: &str, url: &str) -> Result<CarListing, ExtractError> {
    if url.is_empty() {
        return Err(ExtractError::MissingField("url"));
    }

    let doc = Html::parse_document(html);

    let title = first_text(&doc, TITLE_SELECTORS).ok_or(ExtractError::MissingField("title"))?;

    let price_usd = first_text(&doc, PRICE_SELECTORS)
        .as_deref()
        .and_then(parse_price_usd);
    let odometer_km = first_text(&doc, ODOMETER_SELECTORS)
        .as_deref()
        .map(parse_odometer_km)
        .unwrap_or(0);
    let owners_count = labeled_value(&doc, OWNERS_LABEL)
        .as_deref()
        .and_then(parse_first_int)
        .unwrap_or(0);

    Ok(CarListing {
        url: url.to_string(),
        title: Some(title),
        price_usd,
        odometer_km,
        seller_name: first_text(&doc, SELLER_NAME_SELECTORS),
        phone_number: None,
        image_url: first_attr(&doc, IMAGE_SELECTORS, "src"),
        plate_number: first_text(&doc, PLATE_SELECTORS),
        vin: first_text(&doc, VIN_SELECTORS),
        city: first_text(&doc, CITY_SELECTORS),
        owners_count,
        engine_info: labeled_value(&doc, ENGINE_LABEL),
        found_at: Utc::now(),
    })
}

/// Price in USD: digits (optionally space-grouped) followed by a dollar
/// sign. Listings priced only in other currencies yield `None`.
pub fn parse_price_usd(text: &str) -> Option<i32> {
    let pattern = Regex::new(r"(\d[\d\s]*)\$").unwrap();
    let grouped = pattern.captures(text)?.get(1)?.as_str();
    let compact: String = grouped.chars().filter(|c| c.is_ascii_digit()).collect();
    compact.parse().ok()
}

/// Mileage is displayed in thousands of km; the first integer token wins.
pub fn parse_odometer_km(text: &str) -> i32 {
    parse_first_int(text).map(|v| v * 1000).unwrap_or(0)
}

fn parse_first_int(text: &str) -> Option<i32> {
    let digits = Regex::new(r"\d+").unwrap();
    digits.find(text)?.as_str().parse().ok()
}

/// First non-empty text match across an ordered selector chain.
fn first_text(doc: &Html, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|raw| {
        let selector = Selector::parse(raw).ok()?;
        doc.select(&selector).find_map(|el| {
            let text = text_of(&el);
            (!text.is_empty()).then(|| text)
        })
    })
}

/// First non-empty attribute match across an ordered selector chain.
fn first_attr(doc: &Html, selectors: &[&str], attr: &str) -> Option<String> {
    selectors.iter().find_map(|raw| {
        let selector = Selector::parse(raw).ok()?;
        doc.select(&selector).find_map(|el| {
            el.value()
                .attr(attr)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        })
    })
}

/// Looks up a `dd` label row (e.g. owners count, engine) and returns the
/// adjacent `span.argument` value.
fn labeled_value(doc: &Html, label: &str) -> Option<String> {
    let rows = Selector::parse("dd").unwrap();
    let argument = Selector::parse("span.argument").unwrap();

    doc.select(&rows)
        .filter(|row| text_of(row).contains(label))
        .find_map(|row| {
            row.select(&argument).find_map(|el| {
                let value = text_of(&el);
                (!value.is_empty()).then(|| value)
            })
        })
}

fn text_of(el: &scraper::ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

pub mod fetcher;
pub mod models;
pub mod parser;
pub mod phone;
pub mod service;

pub use models::{CarListing, ExtractError, PendingPhone, PhoneToken};
pub use service::{CrawlStats, ScraperService};

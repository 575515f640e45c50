use chrono::{DateTime, Utc};

/// One extracted used-car listing. `url` is the natural key; `found_at` is
/// set once at extraction and never refreshed on a later crawl.
#[derive(Debug, Clone)]
pub struct CarListing {
    pub url: String,
    pub title: Option<String>,
    pub price_usd: Option<i32>,
    pub odometer_km: i32,
    pub seller_name: Option<String>,
    pub phone_number: Option<String>,
    pub image_url: Option<String>,
    pub plate_number: Option<String>,
    pub vin: Option<String>,
    pub city: Option<String>,
    pub owners_count: i32,
    pub engine_info: Option<String>,
    pub found_at: DateTime<Utc>,
}

/// Signed access token embedded in a detail page. All three parts are
/// required to build the phone-resolution URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneToken {
    pub hash: String,
    pub expires: String,
    pub auto_id: String,
}

/// Binds a detail-fetched listing to its in-flight phone request.
/// Consumed when the phone stage completes, successfully or not.
#[derive(Debug)]
pub struct PendingPhone {
    pub listing: CarListing,
    pub token: PhoneToken,
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("mandatory field `{0}` could not be resolved")]
    MissingField(&'static str),
}

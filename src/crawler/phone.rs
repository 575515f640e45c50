use scraper::{Html, Selector};
use serde::Deserialize;

use crate::crawler::models::PhoneToken;

const COUNTRY_PREFIX: &str = "+38";

#[derive(Deserialize)]
struct PhonePayload {
    #[serde(default)]
    phones: Vec<PhoneEntry>,
}

#[derive(Deserialize)]
struct PhoneEntry {
    #[serde(rename = "phoneFormatted")]
    phone_formatted: Option<String>,
}

/// Reads the signed access token off a detail page: hash and expiry from the
/// "secure" marker element, the subject id from the body attribute. All three
/// are required; a partial token never produces a request.
pub fn extract_token(html: &str) -> Option<PhoneToken> {
    let doc = Html::parse_document(html);
    let secure = Selector::parse(r#"[class^="js-user-secure"]"#).unwrap();
    let body = Selector::parse("body").unwrap();

    let marker = doc.select(&secure).next()?;
    let hash = non_empty(marker.value().attr("data-hash")?)?;
    let expires = non_empty(marker.value().attr("data-expires")?)?;
    let auto_id = non_empty(doc.select(&body).next()?.value().attr("data-auto-id")?)?;

    Some(PhoneToken { hash, expires, auto_id })
}

pub fn phone_url(origin: &str, token: &PhoneToken) -> String {
    format!(
        "{}/users/phones/{}/?hash={}&expires={}",
        origin.trim_end_matches('/'),
        token.auto_id,
        token.hash,
        token.expires,
    )
}

/// Parses the phone-resolution JSON body. An empty `phones` array is a valid
/// "no phone" answer; malformed JSON is an error the caller downgrades to a
/// warning.
pub fn parse_phone_payload(body: &str) -> anyhow::Result<Option<String>> {
    let payload: PhonePayload = serde_json::from_str(body)?;
    Ok(payload
        .phones
        .first()
        .and_then(|entry| entry.phone_formatted.as_deref())
        .and_then(format_phone))
}

/// Formats a raw phone string into international form: every non-digit
/// stripped, country code prepended. An empty raw value yields `None`,
/// never a bare prefix.
pub fn format_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    (!digits.is_empty()).then(|| format!("{COUNTRY_PREFIX}{digits}"))
}

fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

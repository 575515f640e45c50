use std::time::Duration;

use reqwest::Client;

const USER_AGENT: &str = "AutoRia-Crawler/1.0";

pub fn build_client() -> anyhow::Result<Client> {
    let client = Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(10))
        .build()?;
    Ok(client)
}

pub async fn fetch_html(
    client: &Client,
    url: &str,
    timeout: Duration,
) -> anyhow::Result<String> {
    let res = client
        .get(url)
        .timeout(timeout)
        .send()
        .await?
        .error_for_status()?;
    Ok(res.text().await?)
}

/// Fetches the phone-resolution endpoint. The body is returned raw; parsing
/// and formatting live in [`crate::crawler::phone`].
pub async fn fetch_phone_json(
    client: &Client,
    url: &str,
    timeout: Duration,
) -> anyhow::Result<String> {
    let res = client
        .get(url)
        .timeout(timeout)
        .send()
        .await?
        .error_for_status()?;
    Ok(res.text().await?)
}

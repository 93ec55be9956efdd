use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use tokio::sync::OnceCell;

use super::extract::extract_text;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub fn http_client() -> Result<reqwest::Client, Error> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()?;
    Ok(client)
}

/// Fetch a page and return its visible text.
pub async fn scrape(client: &reqwest::Client, url: &str) -> Result<String, Error> {
    let body = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    extract_text(&body).ok_or(anyhow!("No readable content at {}", url))
}

/// Scrape each URL in order and join the results with a blank
/// line. Failed URLs are left out.
pub async fn load_context(client: &reqwest::Client, urls: &[String]) -> String {
    let mut contents = Vec::new();
    for url in urls {
        match scrape(client, url).await {
            Ok(text) => {
                tracing::debug!("Scraped {} ({} bytes)", url, text.len());
                contents.push(text);
            }
            Err(e) => tracing::warn!("Error scraping {}: {}", url, e),
        }
    }
    contents.join("\n\n")
}

/// Loads the context text for the system turn at most once per
/// process. Every session shares the cached value, even if the pages
/// change afterwards.
pub struct ContextLoader {
    urls: Vec<String>,
    client: reqwest::Client,
    cached: OnceCell<String>,
}

impl ContextLoader {
    pub fn new(urls: Vec<String>) -> Result<Self, Error> {
        Ok(Self {
            urls,
            client: http_client()?,
            cached: OnceCell::new(),
        })
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    /// Returns the context text, scraping on the first call only.
    /// Concurrent first callers wait on the same initialization.
    pub async fn load(&self) -> &str {
        self.cached
            .get_or_init(|| async {
                tracing::info!("Scraping {} context pages", self.urls.len());
                load_context(&self.client, &self.urls).await
            })
            .await
    }
}

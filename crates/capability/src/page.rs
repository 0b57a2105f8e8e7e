use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use tracing::{debug, warn};

use crate::error::{CapabilityError, Result};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Downloads the markup of the page under test.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

pub struct HttpPageFetcher {
    client: Client,
}

impl HttpPageFetcher {
    pub fn new() -> Result<Self> {
        Self::with_timeout(FETCH_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| CapabilityError::Unavailable(format!("HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(url, status = status.as_u16(), "Page fetch returned an error status");
        }

        let html = response.text().await?;
        let cleaned = strip_vector_tags(&html);
        debug!(url, raw = html.len(), cleaned = cleaned.len(), "Fetched page");
        Ok(cleaned)
    }
}

static VECTOR_TAG: OnceLock<Option<Regex>> = OnceLock::new();

/// Remove `<svg ...>` and `<path ...>` opening tags, which only bloat the
/// prompt.
pub fn strip_vector_tags(html: &str) -> String {
    let re = VECTOR_TAG.get_or_init(|| Regex::new(r"(?i)<(?:path|svg)\b[^>]*>").ok());
    match re {
        Some(re) => re.replace_all(html, "").into_owned(),
        None => html.to_string(),
    }
}

use crate::config::DigestConfig;
use async_trait::async_trait;
use std::time::Duration;

/// Source of raw feed payloads for a set of keywords.
///
/// `None` means the feed could not be reached this cycle; callers skip the user.
#[async_trait]
pub trait PaperFeed: Send + Sync {
    async fn fetch(&self, keywords: &[String]) -> Option<String>;
}

/// arXiv query API client (http://export.arxiv.org/api/query)
pub struct ArxivClient {
    http: reqwest::Client,
    base_url: String,
    max_results: u32,
    request_delay: Duration,
}

impl ArxivClient {
    pub fn new(config: &DigestConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.feed_url.clone(),
            max_results: config.max_results,
            request_delay: Duration::from_millis(config.request_delay_ms),
        }
    }

    pub fn query_url(&self, keywords: &[String]) -> String {
        feed_url(&self.base_url, keywords, 0, self.max_results)
    }
}

/// `all:ai+OR+all:nlp+OR+all:robotics`
///
/// Keywords are percent-encoded; the `+OR+` separators stay literal because
/// arXiv reads `+` as a space inside `search_query`.
pub fn build_search_query(keywords: &[String]) -> String {
    keywords
        .iter()
        .map(|k| format!("all:{}", urlencoding::encode(k)))
        .collect::<Vec<_>>()
        .join("+OR+")
}

pub fn feed_url(base_url: &str, keywords: &[String], start: u32, max_results: u32) -> String {
    format!(
        "{}?search_query={}&start={}&max_results={}",
        base_url,
        build_search_query(keywords),
        start,
        max_results
    )
}

#[async_trait]
impl PaperFeed for ArxivClient {
    async fn fetch(&self, keywords: &[String]) -> Option<String> {
        let url = self.query_url(keywords);

        // arXiv pede um intervalo entre requisições consecutivas
        tokio::time::sleep(self.request_delay).await;

        log::info!("📚 Fetching arXiv feed: {}", url);

        let response = match self
            .http
            .get(&url)
            .header("Accept", "application/atom+xml")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                log::error!("❌ Failed to fetch arXiv feed: {}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            log::error!("❌ arXiv API error: {}", response.status());
            return None;
        }

        match response.text().await {
            Ok(body) => Some(body),
            Err(e) => {
                log::error!("❌ Failed to read arXiv response body: {}", e);
                None
            }
        }
    }
}

//! Encyclopedia content source: page summaries, cross-language links, outbound links.

#[cfg(test)]
pub(crate) mod fake;
pub mod types;

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

use crate::config::WikiConfig;
use crate::pool::Transient;
use types::{ApiError, PageInfo, QueryResponse, WikiPage};

/// Errors returned by Wikipedia API operations.
#[derive(Debug, thiserror::Error)]
pub enum WikiError {
    #[error("Wikipedia rate limit exceeded")]
    RateLimited,

    #[error("Wikipedia API error ({code}): {info}")]
    Query { code: String, info: String },

    #[error("Wikipedia HTTP error: status {0}")]
    Status(u16),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("malformed API response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid API URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl Transient for WikiError {
    fn is_transient(&self) -> bool {
        match self {
            WikiError::RateLimited | WikiError::Network(_) => true,
            WikiError::Status(code) => *code >= 500,
            WikiError::Query { .. } | WikiError::Decode(_) | WikiError::InvalidUrl(_) => false,
        }
    }
}

/// Read access to a multilingual encyclopedia, keyed by (language, title).
/// Implemented by `WikipediaClient`; an in-memory fake is used in tests.
pub trait ContentSource {
    /// Intro summary of a page, or `None` if the page does not exist.
    async fn page(&self, lang: &str, title: &str) -> Result<Option<WikiPage>, WikiError>;

    /// Cross-language links of a page: language code -> localized title.
    async fn langlinks(&self, lang: &str, title: &str)
    -> Result<HashMap<String, String>, WikiError>;

    /// Up to `limit` main-namespace titles linked from a page.
    async fn links(&self, lang: &str, title: &str, limit: usize)
    -> Result<Vec<String>, WikiError>;
}

#[derive(Clone)]
enum Endpoint {
    PerLanguage,
    #[cfg(test)]
    Fixed(String),
}

#[derive(Clone)]
pub struct WikipediaClient {
    http: Client,
    user_agent: String,
    timeout: Duration,
    endpoint: Endpoint,
}

impl WikipediaClient {
    pub fn new(http: Client, config: &WikiConfig) -> Self {
        Self {
            http,
            user_agent: config.user_agent.clone(),
            timeout: config.timeout,
            endpoint: Endpoint::PerLanguage,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            user_agent: crate::USER_AGENT.to_string(),
            timeout: Duration::from_secs(5),
            endpoint: Endpoint::Fixed(base_url.trim_end_matches('/').to_string()),
        }
    }

    fn api_url(&self, lang: &str) -> String {
        match &self.endpoint {
            Endpoint::PerLanguage => format!("https://{lang}.wikipedia.org/w/api.php"),
            #[cfg(test)]
            Endpoint::Fixed(base) => format!("{base}/{lang}/w/api.php"),
        }
    }

    /// Runs a single-title `action=query` and returns the first page entry.
    async fn query_page(
        &self,
        lang: &str,
        title: &str,
        params: &[(&str, &str)],
    ) -> Result<Option<PageInfo>, WikiError> {
        let mut url = url::Url::parse(&self.api_url(lang))?;
        url.query_pairs_mut()
            .append_pair("action", "query")
            .append_pair("format", "json")
            .append_pair("formatversion", "2")
            .append_pair("redirects", "1")
            .append_pair("titles", title)
            .extend_pairs(params);

        let response = self
            .http
            .get(url)
            .header("User-Agent", &self.user_agent)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!(lang, title, "Wikipedia rate limited");
            return Err(WikiError::RateLimited);
        }
        if !status.is_success() {
            return Err(WikiError::Status(status.as_u16()));
        }

        let body: QueryResponse = serde_json::from_str(&response.text().await?)?;
        if let Some(err) = body.error {
            return Err(classify_api_error(err));
        }

        Ok(body
            .query
            .and_then(|q| q.pages.into_iter().next())
            .filter(PageInfo::exists))
    }
}

fn classify_api_error(err: ApiError) -> WikiError {
    let code = err.code.unwrap_or_else(|| "unknown".to_string());
    match code.as_str() {
        "ratelimited" | "maxlag" => WikiError::RateLimited,
        _ => WikiError::Query {
            code,
            info: err.info.unwrap_or_default(),
        },
    }
}

impl ContentSource for WikipediaClient {
    async fn page(&self, lang: &str, title: &str) -> Result<Option<WikiPage>, WikiError> {
        let params = [
            ("prop", "extracts|info"),
            ("exintro", "1"),
            ("explaintext", "1"),
            ("inprop", "url"),
        ];
        let page = self.query_page(lang, title, &params).await?;
        debug!(lang, title, found = page.is_some(), "page summary fetched");

        Ok(page.map(|p| WikiPage {
            url: p.fullurl.unwrap_or_else(|| page_url(lang, &p.title)),
            summary: p.extract.unwrap_or_default(),
            title: p.title,
        }))
    }

    async fn langlinks(
        &self,
        lang: &str,
        title: &str,
    ) -> Result<HashMap<String, String>, WikiError> {
        let params = [("prop", "langlinks"), ("lllimit", "max")];
        let page = self.query_page(lang, title, &params).await?;
        Ok(page
            .map(|p| p.langlinks.into_iter().map(|l| (l.lang, l.title)).collect())
            .unwrap_or_default())
    }

    async fn links(
        &self,
        lang: &str,
        title: &str,
        limit: usize,
    ) -> Result<Vec<String>, WikiError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let pllimit = limit.min(500).to_string();
        let params = [
            ("prop", "links"),
            ("plnamespace", "0"),
            ("pllimit", pllimit.as_str()),
        ];
        let page = self.query_page(lang, title, &params).await?;
        Ok(page
            .map(|p| p.links.into_iter().take(limit).map(|l| l.title).collect())
            .unwrap_or_default())
    }
}

fn page_url(lang: &str, title: &str) -> String {
    let slug = title.replace(' ', "_");
    let encoded = percent_encoding::utf8_percent_encode(&slug, percent_encoding::NON_ALPHANUMERIC)
        .to_string()
        .replace("%5F", "_");
    format!("https://{lang}.wikipedia.org/wiki/{encoded}")
}

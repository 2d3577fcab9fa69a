//! arXiv research source implementation.

use async_trait::async_trait;
use feed_rs::parser;
use std::time::Duration;

use crate::config::MaxResults;
use crate::models::{Paper, PaperBuilder, SearchQuery, SourceId};
use crate::sources::{Source, SourceCapabilities, SourceError};
use crate::utils::{HttpClient, USER_AGENT};

/// Base URL for arXiv API
const ARXIV_API_URL: &str = "http://export.arxiv.org/api/query";

/// arXiv research source
///
/// Results come back newest submission first and are then narrowed to the
/// query's date range.
#[derive(Debug, Clone)]
pub struct ArxivSource {
    client: HttpClient,
    base_url: String,
    max_results: MaxResults,
}

impl ArxivSource {
    /// Create a new arXiv source
    pub fn new(max_results: MaxResults, timeout: Duration) -> Result<Self, SourceError> {
        Ok(Self {
            client: HttpClient::with_timeout(USER_AGENT, timeout)?,
            base_url: ARXIV_API_URL.to_string(),
            max_results,
        })
    }

    /// Point the source at a different endpoint (for testing)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn search_url(&self, keywords: &str) -> String {
        format!(
            "{}?search_query={}&start=0&max_results={}&sortBy=submittedDate&sortOrder=descending",
            self.base_url,
            urlencoding::encode(keywords),
            self.max_results.get()
        )
    }

    /// Parse an Atom response, keeping feed order and dropping entries outside
    /// the query's date range.
    pub(crate) fn parse_feed(bytes: &[u8], query: &SearchQuery) -> Result<Vec<Paper>, SourceError> {
        let feed = parser::parse(bytes)
            .map_err(|e| SourceError::Parse(format!("Failed to parse Atom feed: {}", e)))?;

        let papers = feed
            .entries
            .iter()
            .filter_map(Self::parse_entry)
            .filter(|paper| {
                paper
                    .published
                    .as_deref()
                    .map_or(true, |date| query.contains_iso(date))
            })
            .collect();

        Ok(papers)
    }

    /// Parse arXiv Atom feed entry into Paper
    fn parse_entry(entry: &feed_rs::model::Entry) -> Option<Paper> {
        let title = entry
            .title
            .as_ref()
            .map(|t| t.content.split_whitespace().collect::<Vec<_>>().join(" "))
            .unwrap_or_default();

        if title.is_empty() {
            tracing::debug!(id = %entry.id, "Skipping arXiv entry without a title");
            return None;
        }

        let abstract_text = entry
            .summary
            .as_ref()
            .map(|s| s.content.trim().to_string())
            .unwrap_or_default();

        let pdf_url = entry
            .links
            .iter()
            .find(|link| link.media_type.as_deref() == Some("application/pdf"))
            .map(|link| link.href.clone())
            .or_else(|| {
                entry
                    .id
                    .contains("/abs/")
                    .then(|| entry.id.replacen("/abs/", "/pdf/", 1))
            });

        Some(
            PaperBuilder::new(title, entry.id.clone(), SourceId::Arxiv)
                .authors(entry.authors.iter().map(|a| a.name.trim().to_string()))
                .abstract_text(abstract_text)
                .published(entry.published.map(|d| d.format("%Y-%m-%d").to_string()))
                .pdf_url(pdf_url)
                .build(),
        )
    }
}

#[async_trait]
impl Source for ArxivSource {
    fn id(&self) -> SourceId {
        SourceId::Arxiv
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH | SourceCapabilities::PDF_LINKS | SourceCapabilities::DATE_RANGE
    }

    async fn try_search(&self, query: &SearchQuery) -> Result<Vec<Paper>, SourceError> {
        let url = self.search_url(&query.keywords);
        tracing::debug!(%url, "Querying arXiv");

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/atom+xml")
            .send()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to fetch arXiv results: {}", e)))?;

        if !response.status().is_success() {
            return Err(SourceError::Api(format!(
                "arXiv API returned status: {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to read response: {}", e)))?;

        Self::parse_feed(bytes.as_ref(), query)
    }
}

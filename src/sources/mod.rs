//! Search sources with a shared trait-based interface.
//!
//! This module defines the [`Source`] trait implemented by the three built-in
//! sources:
//!
//! - [`ArxivSource`]: arXiv Atom API, newest submissions first
//! - [`OpenReviewSource`]: OpenReview v2 `notes/search` REST endpoint
//! - [`GoogleScholarSource`]: Google Scholar result pages rendered in a real
//!   Chrome instance, with a bounded wait for CAPTCHA and rate-limit pages
//!
//! Sources are looked up by [`SourceId`](crate::models::SourceId) through the
//! [`SourceRegistry`]. Every source reads the shared
//! [`MaxResults`](crate::config::MaxResults) handle on each call.
//!
//! # Failure handling
//!
//! Implementors only write [`Source::try_search`]. Callers use
//! [`Source::search`], which never fails: errors are logged and turn into an
//! empty result list, so one broken backend cannot abort a multi-source query.

mod arxiv;
pub mod browser;
mod google_scholar;
pub mod mock;
mod openreview;
mod registry;
pub mod scholar_page;

pub use arxiv::ArxivSource;
pub use google_scholar::{wait_for_clearance, BlockKind, GoogleScholarSource, SessionState, WaitOutcome};
pub use mock::MockSource;
pub use openreview::{FieldValue, OpenReviewSource};
pub use registry::{SourceCapabilities, SourceRegistry};

use crate::models::{Paper, SearchQuery, SourceId};
use async_trait::async_trait;

/// The Source trait defines the interface for all search sources.
#[async_trait]
pub trait Source: Send + Sync + std::fmt::Debug {
    /// Which of the fixed sources this is
    fn id(&self) -> SourceId;

    /// Human-readable name of this source
    fn name(&self) -> &str {
        self.id().name()
    }

    /// Describe the capabilities of this source
    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
    }

    /// Run the search against the backend
    async fn try_search(&self, query: &SearchQuery) -> Result<Vec<Paper>, SourceError>;

    /// Search without failing: backend errors are logged and produce no results.
    ///
    /// Papers without a usable title are dropped here as well as in each source.
    async fn search(&self, query: &SearchQuery) -> Vec<Paper> {
        match self.try_search(query).await {
            Ok(papers) => papers
                .into_iter()
                .filter(|p| !p.title.trim().is_empty())
                .collect(),
            Err(SourceError::Blocked(kind)) => {
                tracing::warn!(
                    source = self.id().id(),
                    "Gave up on {} after the {} page did not clear",
                    self.name(),
                    kind
                );
                Vec::new()
            }
            Err(e) => {
                tracing::error!(source = self.id().id(), "{} search failed: {}", self.name(), e);
                Vec::new()
            }
        }
    }
}

/// Errors that can occur when interacting with a source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(String),

    /// Parsing error (XML, JSON, HTML)
    #[error("Parse error: {0}")]
    Parse(String),

    /// API error from the source
    #[error("API error: {0}")]
    Api(String),

    /// The page stayed behind an anti-bot wall past the wait ceiling
    #[error("Blocked by {0}")]
    Blocked(BlockKind),

    /// Browser automation failure
    #[error("Browser error: {0}")]
    Browser(String),

    /// IO error (file system)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("Error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        SourceError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(format!("JSON: {}", err))
    }
}

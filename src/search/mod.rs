//! Multi-source search orchestration.
//!
//! [`SearchManager`] runs a [`SearchRequest`] against each selected source
//! in turn, filters every source's results with a [`SmartFilter`] and
//! concatenates them in source order. Nothing is sorted or deduplicated
//! across sources.

mod filter;

pub use filter::{keep, parse_terms, read_terms, SmartFilter};

use std::time::Instant;

use crate::history::SearchHistory;
use crate::models::{Paper, SearchRequest};
use crate::sources::SourceRegistry;

/// Fans queries out to the registered sources
#[derive(Debug, Clone)]
pub struct SearchManager {
    registry: SourceRegistry,
    filter_enabled: bool,
}

impl SearchManager {
    pub fn new(registry: SourceRegistry) -> Self {
        Self {
            registry,
            filter_enabled: true,
        }
    }

    /// Turn keyword filtering on or off; when off, request terms are ignored
    pub fn with_filter_enabled(mut self, enabled: bool) -> Self {
        self.filter_enabled = enabled;
        self
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    fn filter_for(&self, request: &SearchRequest) -> SmartFilter {
        if self.filter_enabled {
            SmartFilter::new(&request.exclude_terms, &request.require_terms)
        } else {
            SmartFilter::disabled()
        }
    }

    /// Search every source named in `request`, in order.
    ///
    /// Unknown source names are skipped. Sources that fail contribute no
    /// results.
    pub async fn search_all(&self, request: &SearchRequest) -> Vec<Paper> {
        let query = request.query();
        let filter = self.filter_for(request);
        let started = Instant::now();
        let mut papers = Vec::new();

        for name in &request.sources {
            let Some(source) = self.registry.resolve(name) else {
                tracing::debug!(source = %name, "Skipping unknown source");
                continue;
            };

            tracing::info!("Searching {}...", source.name());
            let source_started = Instant::now();
            let found = source.search(&query).await;
            let raw = found.len();
            let kept = filter.apply(found);

            tracing::info!(
                source = source.id().id(),
                raw,
                kept = kept.len(),
                elapsed_ms = source_started.elapsed().as_millis() as u64,
                "Found {} papers on {}",
                kept.len(),
                source.name()
            );
            papers.extend(kept);
        }

        tracing::debug!(
            total = papers.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Search finished"
        );
        papers
    }

    /// Run [`search_all`](Self::search_all) and record the query in `history`
    pub async fn search_and_record(
        &self,
        request: &SearchRequest,
        history: &mut SearchHistory,
    ) -> Vec<Paper> {
        let papers = self.search_all(request).await;

        let excludes = if self.filter_enabled {
            request.exclude_terms.join(", ")
        } else {
            String::new()
        };
        history.add_search(&request.keywords, &excludes, &request.sources, papers.len());

        papers
    }
}

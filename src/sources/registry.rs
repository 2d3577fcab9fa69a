//! Registry for the available search sources.

use std::collections::HashMap;
use std::sync::Arc;

use super::{
    browser::ChromeLauncher, ArxivSource, GoogleScholarSource, OpenReviewSource, Source,
    SourceError,
};
use crate::config::{Config, MaxResults};
use crate::models::SourceId;

bitflags::bitflags! {
    /// Capabilities that a source can support
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SourceCapabilities: u32 {
        const SEARCH = 1 << 0;
        /// Results usually carry a direct PDF link
        const PDF_LINKS = 1 << 1;
        /// Dates are exact enough for day-level range filtering
        const DATE_RANGE = 1 << 2;
        /// Needs a local Chrome installation
        const BROWSER = 1 << 3;
    }
}

/// Registry for the search sources, keyed by [`SourceId`]
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: HashMap<SourceId, Arc<dyn Source>>,
}

impl SourceRegistry {
    /// Create a registry with all three built-in sources
    pub fn new(config: &Config, max_results: MaxResults) -> Result<Self, SourceError> {
        let timeout = std::time::Duration::from_secs(config.search.request_timeout_secs);
        let mut registry = Self::empty();

        registry.register(Arc::new(ArxivSource::new(max_results.clone(), timeout)?));
        registry.register(Arc::new(OpenReviewSource::new(max_results.clone(), timeout)?));
        registry.register(Arc::new(GoogleScholarSource::new(
            Arc::new(ChromeLauncher::new(&config.scholar)),
            config.scholar.clone(),
            max_results,
        )));

        Ok(registry)
    }

    /// Create a registry with no sources
    pub fn empty() -> Self {
        Self {
            sources: HashMap::new(),
        }
    }

    /// Register a source, replacing any source with the same id
    pub fn register(&mut self, source: Arc<dyn Source>) {
        self.sources.insert(source.id(), source);
    }

    /// Get a source by id
    pub fn get(&self, id: SourceId) -> Option<&Arc<dyn Source>> {
        self.sources.get(&id)
    }

    /// Look up a source from a user-supplied identifier.
    ///
    /// Unknown identifiers and unregistered sources yield `None`.
    pub fn resolve(&self, id: &str) -> Option<&Arc<dyn Source>> {
        id.parse::<SourceId>().ok().and_then(|id| self.get(id))
    }

    /// Registered source ids in their canonical order
    pub fn ids(&self) -> Vec<SourceId> {
        let mut ids: Vec<_> = self.sources.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Check if a source exists
    pub fn has(&self, id: SourceId) -> bool {
        self.sources.contains_key(&id)
    }

    /// Get the number of registered sources
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

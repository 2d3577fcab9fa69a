//! Mock source for testing purposes.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::models::{Paper, SearchQuery, SourceId};
use crate::sources::{Source, SourceCapabilities, SourceError};

/// A mock source that returns predefined papers or a one-shot error.
#[derive(Debug)]
pub struct MockSource {
    id: SourceId,
    papers: Mutex<Vec<Paper>>,
    error: Mutex<Option<SourceError>>,
    calls: AtomicUsize,
    last_query: Mutex<Option<SearchQuery>>,
}

impl MockSource {
    /// Create a new mock standing in for `id`.
    pub fn new(id: SourceId) -> Self {
        Self {
            id,
            papers: Mutex::new(Vec::new()),
            error: Mutex::new(None),
            calls: AtomicUsize::new(0),
            last_query: Mutex::new(None),
        }
    }

    /// Create a mock that returns `papers`.
    pub fn with_papers(id: SourceId, papers: Vec<Paper>) -> Self {
        let source = Self::new(id);
        source.set_papers(papers);
        source
    }

    /// Set the papers to return.
    pub fn set_papers(&self, papers: Vec<Paper>) {
        *self.papers.lock().unwrap() = papers;
    }

    /// Make the next search fail with `error`.
    pub fn fail_with(&self, error: SourceError) {
        *self.error.lock().unwrap() = Some(error);
    }

    /// Number of searches run so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The most recent query received.
    pub fn last_query(&self) -> Option<SearchQuery> {
        self.last_query.lock().unwrap().clone()
    }
}

#[async_trait]
impl Source for MockSource {
    fn id(&self) -> SourceId {
        self.id
    }

    fn name(&self) -> &str {
        "Mock Source"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
    }

    async fn try_search(&self, query: &SearchQuery) -> Result<Vec<Paper>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_query.lock().unwrap() = Some(query.clone());

        if let Some(error) = self.error.lock().unwrap().take() {
            return Err(error);
        }
        Ok(self.papers.lock().unwrap().clone())
    }
}

/// Helper function to create a mock paper for testing.
pub fn make_paper(title: &str, abstract_text: &str, source: SourceId) -> Paper {
    let mut paper = Paper::new(title, format!("http://example.com/{}", title.len()), source);
    paper.r#abstract = abstract_text.to_string();
    paper
}

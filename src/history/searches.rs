//! Search history with frequency aggregation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::utils::JsonStore;

/// Most records kept; older ones fall off the end
pub const MAX_SEARCH_RECORDS: usize = 100;

/// One distinct query and how often it was run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRecord {
    pub keywords: String,
    #[serde(default)]
    pub exclude_keywords: String,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub results_count: usize,
    pub first_search_time: String,
    pub last_search_time: String,
    #[serde(default = "one")]
    pub search_count: u32,
}

fn one() -> u32 {
    1
}

/// Persisted list of past queries, most recent first
#[derive(Debug)]
pub struct SearchHistory {
    store: JsonStore,
    records: Vec<SearchRecord>,
}

impl SearchHistory {
    /// Open the history at `path`, starting empty if the file is missing or corrupt
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let store = JsonStore::new(path);
        let records = store.load();
        Self { store, records }
    }

    /// History that is never written to disk
    pub fn in_memory() -> Self {
        Self {
            store: JsonStore::in_memory(),
            records: Vec::new(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.store.path()
    }

    /// Record a query.
    ///
    /// A query with the same `(keywords, exclude_keywords)` pair is updated in
    /// place; anything else is inserted at the front.
    pub fn add_search(
        &mut self,
        keywords: &str,
        exclude_keywords: &str,
        sources: &[String],
        results_count: usize,
    ) {
        let now = chrono::Local::now().to_rfc3339();

        if let Some(record) = self
            .records
            .iter_mut()
            .find(|r| r.keywords == keywords && r.exclude_keywords == exclude_keywords)
        {
            record.last_search_time = now;
            record.search_count += 1;
            record.sources = sources.to_vec();
            record.results_count = results_count;
        } else {
            self.records.insert(
                0,
                SearchRecord {
                    keywords: keywords.to_string(),
                    exclude_keywords: exclude_keywords.to_string(),
                    sources: sources.to_vec(),
                    results_count,
                    first_search_time: now.clone(),
                    last_search_time: now,
                    search_count: 1,
                },
            );
            self.records.truncate(MAX_SEARCH_RECORDS);
        }

        self.store.save(&self.records);
    }

    pub fn recent(&self, limit: usize) -> &[SearchRecord] {
        &self.records[..limit.min(self.records.len())]
    }

    pub fn last(&self) -> Option<&SearchRecord> {
        self.records.first()
    }

    pub fn remove(&mut self, index: usize) -> Option<SearchRecord> {
        if index >= self.records.len() {
            return None;
        }
        let removed = self.records.remove(index);
        self.store.save(&self.records);
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.store.save(&self.records);
    }

    /// Number of distinct queries on record
    pub fn total_searches(&self) -> usize {
        self.records.len()
    }

    /// Keyword strings ordered by how often they were searched
    pub fn popular_keywords(&self, limit: usize) -> Vec<String> {
        rank(self.records.iter().map(|r| (&r.keywords, r.search_count)), limit)
    }

    /// Exclude-term strings ordered by how often they were used
    pub fn popular_excludes(&self, limit: usize) -> Vec<String> {
        rank(
            self.records
                .iter()
                .map(|r| (&r.exclude_keywords, r.search_count)),
            limit,
        )
    }
}

fn rank<'a>(entries: impl Iterator<Item = (&'a String, u32)>, limit: usize) -> Vec<String> {
    let mut freq: HashMap<&str, u32> = HashMap::new();
    let mut first_seen: Vec<&str> = Vec::new();

    for (value, count) in entries {
        if value.is_empty() {
            continue;
        }
        let slot = freq.entry(value.as_str()).or_insert_with(|| {
            first_seen.push(value.as_str());
            0
        });
        *slot += count;
    }

    // Stable sort keeps recency order among equal counts.
    first_seen.sort_by(|a, b| freq[b].cmp(&freq[a]));
    first_seen
        .into_iter()
        .take(limit)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources() -> Vec<String> {
        vec!["arxiv".to_string()]
    }

    #[test]
    fn test_repeat_query_updates_in_place() {
        let mut history = SearchHistory::in_memory();
        history.add_search("gnn", "", &sources(), 5);
        history.add_search("transformer", "", &sources(), 3);
        history.add_search("gnn", "", &["openreview".to_string()], 9);

        assert_eq!(history.total_searches(), 2);
        let gnn = history.recent(10).iter().find(|r| r.keywords == "gnn").unwrap();
        assert_eq!(gnn.search_count, 2);
        assert_eq!(gnn.results_count, 9);
        assert_eq!(gnn.sources, vec!["openreview"]);
    }

    #[test]
    fn test_exclude_terms_are_part_of_identity() {
        let mut history = SearchHistory::in_memory();
        history.add_search("gnn", "", &sources(), 5);
        history.add_search("gnn", "hardware", &sources(), 4);

        assert_eq!(history.total_searches(), 2);
        assert_eq!(history.last().unwrap().exclude_keywords, "hardware");
    }

    #[test]
    fn test_capped_at_one_hundred() {
        let mut history = SearchHistory::in_memory();
        for i in 0..(MAX_SEARCH_RECORDS + 5) {
            history.add_search(&format!("q{}", i), "", &sources(), 0);
        }

        assert_eq!(history.total_searches(), MAX_SEARCH_RECORDS);
        assert_eq!(history.last().unwrap().keywords, "q104");
        assert!(history.recent(200).iter().all(|r| r.keywords != "q0"));
    }

    #[test]
    fn test_popular_keywords() {
        let mut history = SearchHistory::in_memory();
        history.add_search("a", "x", &sources(), 0);
        history.add_search("b", "", &sources(), 0);
        history.add_search("b", "", &sources(), 0);
        history.add_search("b", "", &sources(), 0);
        history.add_search("a", "y", &sources(), 0);

        assert_eq!(history.popular_keywords(5), vec!["b", "a"]);
        assert_eq!(history.popular_keywords(1), vec!["b"]);
        assert_eq!(history.popular_excludes(5).len(), 2);
    }

    #[test]
    fn test_persists_and_removes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("searches.json");

        let mut history = SearchHistory::open(&path);
        history.add_search("first", "", &sources(), 1);
        history.add_search("second", "", &sources(), 2);

        let mut reopened = SearchHistory::open(&path);
        assert_eq!(reopened.last().unwrap().keywords, "second");
        assert_eq!(reopened.remove(0).unwrap().keywords, "second");
        assert!(reopened.remove(5).is_none());

        assert_eq!(SearchHistory::open(&path).total_searches(), 1);
    }
}

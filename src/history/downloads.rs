//! Download history keyed by normalized title.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::models::{normalize_title, DownloadRecord};
use crate::utils::JsonStore;

/// Persisted map from normalized title to download record.
///
/// This is the only place that decides whether a paper was already downloaded.
#[derive(Debug)]
pub struct DownloadHistory {
    store: JsonStore,
    records: BTreeMap<String, DownloadRecord>,
}

impl DownloadHistory {
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
            records: BTreeMap::new(),
        }
    }

    /// Backing file, if persistence is still active
    pub fn path(&self) -> Option<&Path> {
        self.store.path()
    }

    pub fn is_downloaded(&self, title: &str) -> bool {
        self.records.contains_key(&normalize_title(title))
    }

    pub fn get(&self, title: &str) -> Option<&DownloadRecord> {
        self.records.get(&normalize_title(title))
    }

    /// Record a finished download and persist immediately
    pub fn add_download(&mut self, title: &str, file_path: &Path, pdf_url: Option<&str>) {
        let now = chrono::Local::now();
        let record = DownloadRecord {
            title: title.to_string(),
            file_path: file_path.to_string_lossy().into_owned(),
            pdf_url: pdf_url.map(str::to_string),
            download_date: now.format("%Y-%m-%d %H:%M:%S").to_string(),
            date_only: now.format("%Y-%m-%d").to_string(),
        };
        self.records.insert(normalize_title(title), record);
        self.store.save(&self.records);
    }

    /// Forget a download so it can be fetched again
    pub fn remove(&mut self, title: &str) -> Option<DownloadRecord> {
        let removed = self.records.remove(&normalize_title(title));
        if removed.is_some() {
            self.store.save(&self.records);
        }
        removed
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.store.save(&self.records);
    }

    pub fn total_downloads(&self) -> usize {
        self.records.len()
    }

    /// All records, newest first
    pub fn records(&self) -> Vec<&DownloadRecord> {
        let mut records: Vec<_> = self.records.values().collect();
        records.sort_by(|a, b| b.download_date.cmp(&a.download_date));
        records
    }
}

//! Persisted download and search history.
//!
//! Each store owns one JSON document and rewrites it on every mutation. A
//! missing or corrupt document starts an empty store; a failed write keeps
//! the store running in memory for the rest of the process.

mod downloads;
mod searches;

pub use downloads::DownloadHistory;
pub use searches::{SearchHistory, SearchRecord, MAX_SEARCH_RECORDS};

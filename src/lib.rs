//! # Paper Scout
//!
//! Search academic papers across several engines, filter them by keyword and
//! download their PDFs without fetching the same paper twice.
//!
//! ## Architecture
//!
//! - [`models`]: Core data structures (Paper, SearchRequest, download outcomes)
//! - [`sources`]: Search engines behind the [`Source`] trait (arXiv, OpenReview,
//!   Google Scholar through a headless browser)
//! - [`search`]: Multi-source orchestration and keyword filtering
//! - [`download`]: Deduplicated PDF downloads
//! - [`history`]: Persisted download and search history
//! - [`translate`]: Optional translation of titles and abstracts
//! - [`config`]: Configuration management
//! - [`ui`]: Terminal output for the command-line interface

pub mod config;
pub mod download;
pub mod history;
pub mod models;
pub mod search;
pub mod sources;
pub mod translate;
pub mod ui;
pub mod utils;

// Re-export commonly used types
pub use download::DownloadManager;
pub use history::{DownloadHistory, SearchHistory};
pub use models::{Paper, SearchRequest, SourceId};
pub use search::SearchManager;
pub use sources::{Source, SourceRegistry};
pub use translate::TranslationClient;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

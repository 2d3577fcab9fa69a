//! Core data models for papers, searches and downloads.

mod download;
mod paper;
mod search;

pub use download::{BatchEntry, BatchReport, DownloadError, DownloadOutcome, DownloadRecord};
pub use paper::{
    normalize_title, Paper, PaperBuilder, SourceId, UnknownSource, ABSTRACT_UNAVAILABLE,
    NO_ABSTRACT,
};
pub use search::{parse_iso_date, SearchQuery, SearchRequest};

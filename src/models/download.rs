//! Download records, outcomes and batch reports.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A persisted record of one successful download
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRecord {
    /// Title as originally given
    pub title: String,

    /// Where the PDF was written
    pub file_path: String,

    /// URL the PDF was fetched from
    pub pdf_url: Option<String>,

    /// Local timestamp, `YYYY-MM-DD HH:MM:SS`
    pub download_date: String,

    /// Local date, `YYYY-MM-DD`
    pub date_only: String,
}

/// Why a single download failed
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("PDF link unavailable")]
    MissingUrl,

    #[error("download timed out")]
    Timeout,

    #[error("download failed: {0}")]
    Network(String),

    #[error("server returned HTTP {0}")]
    Status(u16),

    #[error("link is not a PDF file (content type: {content_type})")]
    NotPdf { content_type: String },

    #[error("file error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for DownloadError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DownloadError::Timeout
        } else if let Some(status) = err.status() {
            DownloadError::Status(status.as_u16())
        } else {
            DownloadError::Network(err.to_string())
        }
    }
}

/// Result of [`DownloadManager::download_one`](crate::download::DownloadManager::download_one)
#[derive(Debug)]
pub enum DownloadOutcome {
    /// The PDF was written to this path and recorded in history
    Success { path: PathBuf },

    /// The title was downloaded before; nothing was fetched
    Duplicate { previous: DownloadRecord },

    /// Nothing was recorded
    Failed(DownloadError),
}

impl DownloadOutcome {
    /// Whether the outcome is a fresh download
    pub fn is_success(&self) -> bool {
        matches!(self, DownloadOutcome::Success { .. })
    }

    /// Human-readable description of the outcome
    pub fn message(&self) -> String {
        match self {
            DownloadOutcome::Success { path } => format!("Saved to {}", path.display()),
            DownloadOutcome::Duplicate { previous } => {
                format!("Already downloaded (date: {})", previous.date_only)
            }
            DownloadOutcome::Failed(err) => err.to_string(),
        }
    }

    /// Path of the PDF on disk, for successes and duplicates
    pub fn file_path(&self) -> Option<PathBuf> {
        match self {
            DownloadOutcome::Success { path } => Some(path.clone()),
            DownloadOutcome::Duplicate { previous } => Some(PathBuf::from(&previous.file_path)),
            DownloadOutcome::Failed(_) => None,
        }
    }
}

/// One line of a [`BatchReport`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchEntry {
    /// Position of the paper in the submitted batch
    pub index: usize,
    pub title: String,
    pub message: String,
    pub file_path: Option<PathBuf>,
}

/// Three-way partition of a batch download
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub success: Vec<BatchEntry>,
    pub skipped: Vec<BatchEntry>,
    pub failed: Vec<BatchEntry>,
    pub total: usize,
}

impl BatchReport {
    /// Route an outcome into its bucket
    pub fn record(&mut self, index: usize, title: &str, outcome: &DownloadOutcome) {
        let entry = BatchEntry {
            index,
            title: title.to_string(),
            message: outcome.message(),
            file_path: outcome.file_path(),
        };
        match outcome {
            DownloadOutcome::Success { .. } => self.success.push(entry),
            DownloadOutcome::Duplicate { .. } => self.skipped.push(entry),
            DownloadOutcome::Failed(_) => self.failed.push(entry),
        }
    }
}

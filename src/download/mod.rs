//! PDF download management.
//!
//! [`DownloadManager`] checks every title against the
//! [`DownloadHistory`] before touching the network, picks a collision-free
//! file name, streams the PDF to disk and records the download. A failed
//! download leaves neither a file nor a history entry behind.

mod naming;

pub use naming::{sanitize_filename, unique_path, MAX_FILENAME_CHARS};

use reqwest::header::CONTENT_TYPE;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::history::DownloadHistory;
use crate::models::{BatchReport, DownloadError, DownloadOutcome, Paper};
use crate::utils::{HttpClient, BROWSER_USER_AGENT};
use naming::PartialFile;

/// Write buffer size for PDF bodies
const WRITE_BUFFER_SIZE: usize = 8192;

/// Byte-level progress callback, called with a percentage in `0..=100`
pub type ProgressFn<'a> = &'a (dyn Fn(f64) + Send + Sync);

/// Batch progress callback, called with `(index, total)` before each paper
pub type BatchProgressFn<'a> = &'a (dyn Fn(usize, usize) + Send + Sync);

/// Downloads PDFs into one directory, deduplicated by title
#[derive(Debug)]
pub struct DownloadManager {
    client: HttpClient,
    download_dir: PathBuf,
    history: DownloadHistory,
}

impl DownloadManager {
    pub fn new(client: HttpClient, download_dir: impl Into<PathBuf>, history: DownloadHistory) -> Self {
        Self {
            client,
            download_dir: download_dir.into(),
            history,
        }
    }

    /// Build a manager from the `downloads` and `history` config sections
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let client = HttpClient::with_timeout(BROWSER_USER_AGENT, config.downloads.timeout())?;
        Ok(Self::new(
            client,
            &config.downloads.directory,
            DownloadHistory::open(&config.history.download_history),
        ))
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Change the target directory, creating it if needed
    pub fn set_download_dir(&mut self, dir: impl Into<PathBuf>) -> std::io::Result<()> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        self.download_dir = dir;
        Ok(())
    }

    pub fn history(&self) -> &DownloadHistory {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut DownloadHistory {
        &mut self.history
    }

    /// Download one PDF.
    ///
    /// A title already in the history is reported as a duplicate without any
    /// network traffic.
    pub async fn download_one(
        &mut self,
        pdf_url: Option<&str>,
        title: &str,
        progress: Option<ProgressFn<'_>>,
    ) -> DownloadOutcome {
        let Some(url) = pdf_url.map(str::trim).filter(|u| !u.is_empty()) else {
            return DownloadOutcome::Failed(DownloadError::MissingUrl);
        };

        if let Some(previous) = self.history.get(title) {
            tracing::debug!(%title, date = %previous.date_only, "Skipping duplicate download");
            return DownloadOutcome::Duplicate {
                previous: previous.clone(),
            };
        }

        match self.fetch(url, title, progress).await {
            Ok(path) => {
                self.history.add_download(title, &path, Some(url));
                tracing::info!(path = %path.display(), "Downloaded {}", title);
                DownloadOutcome::Success { path }
            }
            Err(e) => {
                tracing::warn!(%url, "Failed to download {}: {}", title, e);
                DownloadOutcome::Failed(e)
            }
        }
    }

    async fn fetch(
        &self,
        url: &str,
        title: &str,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<PathBuf, DownloadError> {
        let mut response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.to_lowercase().contains("application/pdf")
            && !url.to_lowercase().contains("pdf")
        {
            return Err(DownloadError::NotPdf { content_type });
        }

        std::fs::create_dir_all(&self.download_dir)?;
        let path = unique_path(&self.download_dir, &sanitize_filename(title));
        let (partial, file) = PartialFile::create(path)?;
        let mut writer = BufWriter::with_capacity(WRITE_BUFFER_SIZE, file);

        let total = response.content_length().filter(|&n| n > 0);
        let mut written: u64 = 0;

        while let Some(chunk) = response.chunk().await? {
            writer.write_all(&chunk)?;
            written += chunk.len() as u64;

            if let (Some(total), Some(progress)) = (total, progress) {
                progress((written as f64 / total as f64 * 100.0).min(100.0));
            }
        }
        writer.flush()?;
        drop(writer);

        Ok(partial.commit())
    }

    /// Download papers one after another and partition the outcomes
    pub async fn download_many(
        &mut self,
        papers: &[Paper],
        progress: Option<BatchProgressFn<'_>>,
    ) -> BatchReport {
        let total = papers.len();
        let mut report = BatchReport {
            total,
            ..BatchReport::default()
        };

        for (index, paper) in papers.iter().enumerate() {
            if let Some(progress) = progress {
                progress(index, total);
            }

            let title = if paper.title.trim().is_empty() {
                format!("paper_{}", index)
            } else {
                paper.title.clone()
            };

            let outcome = self
                .download_one(paper.pdf_url.as_deref(), &title, None)
                .await;
            report.record(index, &title, &outcome);
        }

        tracing::info!(
            success = report.success.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Batch download finished"
        );
        report
    }
}

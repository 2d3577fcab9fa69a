//! File naming for downloaded PDFs.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Longest file stem kept, in characters
pub const MAX_FILENAME_CHARS: usize = 200;

/// Characters that are not allowed in file names on common filesystems
const ILLEGAL: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Turn a paper title into a file stem.
///
/// Illegal and control characters are removed and the result capped at
/// [`MAX_FILENAME_CHARS`]. A title with nothing usable left becomes
/// `"untitled"`.
pub fn sanitize_filename(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| !ILLEGAL.contains(c) && !c.is_control())
        .take(MAX_FILENAME_CHARS)
        .collect();

    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        "untitled".to_string()
    } else {
        cleaned.to_string()
    }
}

/// First free `stem.pdf`, `stem_1.pdf`, `stem_2.pdf`, ... in `dir`
pub fn unique_path(dir: &Path, stem: &str) -> PathBuf {
    let mut path = dir.join(format!("{}.pdf", stem));
    let mut counter = 1;
    while path.exists() {
        path = dir.join(format!("{}_{}.pdf", stem, counter));
        counter += 1;
    }
    path
}

/// A file being written that is deleted again unless committed
#[derive(Debug)]
pub(crate) struct PartialFile {
    path: PathBuf,
    committed: bool,
}

impl PartialFile {
    /// Create `path`, failing if it already exists
    pub(crate) fn create(path: PathBuf) -> io::Result<(Self, File)> {
        let file = OpenOptions::new().write(true).create_new(true).open(&path)?;
        Ok((
            Self {
                path,
                committed: false,
            },
            file,
        ))
    }

    /// Keep the file and return its path
    pub(crate) fn commit(mut self) -> PathBuf {
        self.committed = true;
        std::mem::take(&mut self.path)
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Removed partial download"),
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                "Failed to remove partial download: {}",
                e
            ),
        }
    }
}

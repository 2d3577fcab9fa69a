//! Keyword inclusion/exclusion filtering.

use std::path::Path;

use crate::config::FilterConfig;
use crate::models::Paper;

/// Split free text into filter terms, one per line.
///
/// Lines are trimmed and blank lines dropped.
pub fn parse_terms(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read filter terms from a text file, one per line
pub fn read_terms(path: &Path) -> std::io::Result<Vec<String>> {
    Ok(parse_terms(&std::fs::read_to_string(path)?))
}

fn lowered<I, S>(terms: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    terms
        .into_iter()
        .map(|t| t.as_ref().trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Keep-or-drop decision for one paper.
///
/// Matching is case-insensitive over `title + " " + abstract`. Any exclude
/// term rejects; when require terms are given at least one must appear.
/// Terms are expected in lowercase.
pub fn keep(paper: &Paper, exclude: &[String], require: &[String]) -> bool {
    let text = format!("{} {}", paper.title, paper.r#abstract).to_lowercase();

    if exclude.iter().any(|term| text.contains(term.as_str())) {
        return false;
    }
    require.is_empty() || require.iter().any(|term| text.contains(term.as_str()))
}

/// Keyword filter applied to each source's results
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmartFilter {
    enabled: bool,
    exclude: Vec<String>,
    require: Vec<String>,
}

impl SmartFilter {
    pub fn new<E, R, S, T>(exclude: E, require: R) -> Self
    where
        E: IntoIterator<Item = S>,
        R: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        Self {
            enabled: true,
            exclude: lowered(exclude),
            require: lowered(require),
        }
    }

    /// A filter that keeps everything
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            exclude: Vec::new(),
            require: Vec::new(),
        }
    }

    /// Build the filter from config.
    ///
    /// Each configured entry may hold several terms, one per line.
    pub fn from_config(config: &FilterConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }
        let split = |entries: &[String]| {
            entries
                .iter()
                .flat_map(|entry| parse_terms(entry))
                .collect::<Vec<_>>()
        };
        Self::new(split(&config.exclude), split(&config.require))
    }

    /// Append more terms, leaving the enabled flag as it is
    pub fn with_terms<E, R, S, T>(mut self, exclude: E, require: R) -> Self
    where
        E: IntoIterator<Item = S>,
        R: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        self.exclude.extend(lowered(exclude));
        self.require.extend(lowered(require));
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn exclude_terms(&self) -> &[String] {
        &self.exclude
    }

    pub fn require_terms(&self) -> &[String] {
        &self.require
    }

    pub fn keep(&self, paper: &Paper) -> bool {
        !self.enabled || keep(paper, &self.exclude, &self.require)
    }

    pub fn apply(&self, papers: Vec<Paper>) -> Vec<Paper> {
        papers.into_iter().filter(|p| self.keep(p)).collect()
    }
}

impl Default for SmartFilter {
    fn default() -> Self {
        Self::disabled()
    }
}

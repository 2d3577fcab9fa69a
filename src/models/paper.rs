//! Paper model representing a research paper from any source.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Placeholder abstract used by OpenReview records without any abstract field.
pub const NO_ABSTRACT: &str = "No Abstract";

/// Placeholder abstract used by scraped results whose snippet could not be recovered.
pub const ABSTRACT_UNAVAILABLE: &str = "Abstract unavailable";

/// The source where the paper was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    Arxiv,
    #[serde(rename = "openreview")]
    OpenReview,
    GoogleScholar,
}

impl SourceId {
    /// Every source, in the default search order
    pub const ALL: [SourceId; 3] = [SourceId::Arxiv, SourceId::OpenReview, SourceId::GoogleScholar];

    /// Returns the display name of the source
    pub fn name(&self) -> &'static str {
        match self {
            SourceId::Arxiv => "ArXiv",
            SourceId::OpenReview => "OpenReview",
            SourceId::GoogleScholar => "Google Scholar",
        }
    }

    /// Returns the source identifier used in configuration and on the command line
    pub fn id(&self) -> &'static str {
        match self {
            SourceId::Arxiv => "arxiv",
            SourceId::OpenReview => "openreview",
            SourceId::GoogleScholar => "google_scholar",
        }
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Error returned when a string does not name a known source
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown source: {0}")]
pub struct UnknownSource(pub String);

impl FromStr for SourceId {
    type Err = UnknownSource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "arxiv" => Ok(SourceId::Arxiv),
            "openreview" => Ok(SourceId::OpenReview),
            "google_scholar" | "scholar" => Ok(SourceId::GoogleScholar),
            other => Err(UnknownSource(other.to_string())),
        }
    }
}

/// A research paper from any academic source
///
/// Every engine produces this shape. Two papers are considered the same
/// publication for download purposes when their [`normalize_title`] keys match;
/// no other field takes part in that comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    /// Paper title (never empty once returned by a source)
    pub title: String,

    /// Abstract text, or a placeholder when unavailable
    pub r#abstract: String,

    /// Landing page URL (may be empty for low-confidence scrapes)
    pub url: String,

    /// Direct PDF URL
    pub pdf_url: Option<String>,

    /// Author names in publication order
    pub authors: Vec<String>,

    /// Publication date (`YYYY-MM-DD`) or a free-text venue line
    pub published: Option<String>,

    /// Source where the paper was found
    pub source: SourceId,
}

impl Paper {
    /// Create a new paper with required fields
    pub fn new(title: impl Into<String>, url: impl Into<String>, source: SourceId) -> Self {
        Self {
            title: title.into(),
            r#abstract: String::new(),
            url: url.into(),
            pdf_url: None,
            authors: Vec::new(),
            published: None,
            source,
        }
    }

    /// Check if paper has a downloadable PDF
    pub fn has_pdf(&self) -> bool {
        self.pdf_url.as_deref().is_some_and(|u| !u.trim().is_empty())
    }

    /// Authors joined for display
    pub fn author_line(&self) -> String {
        self.authors.join(", ")
    }
}

/// Normalize a title into its deduplication key: lowercase, trimmed, with
/// whitespace runs collapsed to a single space.
pub fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Builder for constructing Paper objects
#[derive(Debug, Clone)]
pub struct PaperBuilder {
    paper: Paper,
}

impl PaperBuilder {
    /// Create a new builder with required fields
    pub fn new(title: impl Into<String>, url: impl Into<String>, source: SourceId) -> Self {
        Self {
            paper: Paper::new(title, url, source),
        }
    }

    /// Set authors
    pub fn authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paper.authors = authors.into_iter().map(Into::into).collect();
        self
    }

    /// Set abstract
    pub fn abstract_text(mut self, abstract_text: impl Into<String>) -> Self {
        self.paper.r#abstract = abstract_text.into();
        self
    }

    /// Set publication date or venue line
    pub fn published(mut self, published: Option<String>) -> Self {
        self.paper.published = published;
        self
    }

    /// Set PDF URL
    pub fn pdf_url(mut self, url: Option<String>) -> Self {
        self.paper.pdf_url = url;
        self
    }

    /// Build the Paper
    pub fn build(self) -> Paper {
        self.paper
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paper_builder() {
        let paper = PaperBuilder::new("Test Paper", "https://example.com", SourceId::Arxiv)
            .authors(["John Doe", "Jane Smith"])
            .abstract_text("This is a test abstract.")
            .pdf_url(Some("https://example.com/paper.pdf".to_string()))
            .published(Some("2024-01-02".to_string()))
            .build();

        assert_eq!(paper.title, "Test Paper");
        assert_eq!(paper.authors, vec!["John Doe", "Jane Smith"]);
        assert_eq!(paper.author_line(), "John Doe, Jane Smith");
        assert!(paper.has_pdf());
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("  Deep  Learning "), normalize_title("deep learning"));
        assert_eq!(normalize_title("A\tB\nC"), "a b c");

        let once = normalize_title("  Attention Is  ALL you Need ");
        assert_eq!(normalize_title(&once), once);
    }

    #[test]
    fn test_blank_pdf_url_is_not_downloadable() {
        let paper = PaperBuilder::new("T", "", SourceId::GoogleScholar)
            .pdf_url(Some("  ".to_string()))
            .build();
        assert!(!paper.has_pdf());
    }

    #[test]
    fn test_source_id_parsing() {
        assert_eq!("arxiv".parse::<SourceId>().unwrap(), SourceId::Arxiv);
        assert_eq!("OpenReview".parse::<SourceId>().unwrap(), SourceId::OpenReview);
        assert_eq!(
            "google_scholar".parse::<SourceId>().unwrap(),
            SourceId::GoogleScholar
        );
        assert!("pubmed".parse::<SourceId>().is_err());

        for id in SourceId::ALL {
            assert_eq!(id.id().parse::<SourceId>().unwrap(), id);
        }
    }

    #[test]
    fn test_source_id_serde() {
        let json = serde_json::to_string(&SourceId::OpenReview).unwrap();
        assert_eq!(json, "\"openreview\"");
        let back: SourceId = serde_json::from_str("\"google_scholar\"").unwrap();
        assert_eq!(back, SourceId::GoogleScholar);
    }
}

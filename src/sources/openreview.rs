//! OpenReview research source implementation.
//!
//! Uses the v2 `notes/search` endpoint. Note content fields come back either
//! as raw values or wrapped as `{"value": ...}` depending on the venue, so
//! every field goes through [`FieldValue`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::time::Duration;

use crate::config::MaxResults;
use crate::models::{Paper, PaperBuilder, SearchQuery, SourceId, NO_ABSTRACT};
use crate::sources::{Source, SourceCapabilities, SourceError};
use crate::utils::{HttpClient, USER_AGENT};

/// Base URL for the OpenReview search API
const OPENREVIEW_API_URL: &str = "https://api2.openreview.net/notes/search";
/// Forum page for a note
const OPENREVIEW_FORUM_URL: &str = "https://openreview.net/forum";
/// PDF for a note
const OPENREVIEW_PDF_URL: &str = "https://openreview.net/pdf";

/// Largest page the search endpoint accepts
const MAX_PAGE_SIZE: usize = 100;

/// Placeholder title OpenReview uses for comments and reviews
const PLACEHOLDER_TITLE: &str = "No Title";

/// A note content field, either raw or wrapped in `{"value": ...}`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum FieldValue<T> {
    Wrapped { value: T },
    Raw(T),
}

impl<T> FieldValue<T> {
    /// Unwrap either shape
    pub fn into_value(self) -> T {
        match self {
            FieldValue::Wrapped { value } => value,
            FieldValue::Raw(value) => value,
        }
    }
}

/// Read a content field, treating an unexpected shape as absent
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<FieldValue<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| match serde_json::from_value(value) {
        Ok(field) => Some(field),
        Err(e) => {
            tracing::trace!("Ignoring unexpected OpenReview field shape: {}", e);
            None
        }
    }))
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    notes: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Note {
    #[serde(default)]
    id: String,
    #[serde(default)]
    cdate: Option<i64>,
    #[serde(default)]
    content: NoteContent,
}

#[derive(Debug, Default, Deserialize)]
struct NoteContent {
    #[serde(default, deserialize_with = "lenient")]
    title: Option<FieldValue<String>>,
    #[serde(default, rename = "abstract", deserialize_with = "lenient")]
    abstract_text: Option<FieldValue<String>>,
    #[serde(default, deserialize_with = "lenient")]
    summary: Option<FieldValue<String>>,
    #[serde(default, rename = "TL;DR", deserialize_with = "lenient")]
    tldr: Option<FieldValue<String>>,
    #[serde(default, deserialize_with = "lenient")]
    authors: Option<FieldValue<Vec<String>>>,
}

fn text(field: Option<FieldValue<String>>) -> Option<String> {
    field
        .map(FieldValue::into_value)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// OpenReview research source
#[derive(Debug, Clone)]
pub struct OpenReviewSource {
    client: HttpClient,
    base_url: String,
    max_results: MaxResults,
}

impl OpenReviewSource {
    /// Create a new OpenReview source
    pub fn new(max_results: MaxResults, timeout: Duration) -> Result<Self, SourceError> {
        Ok(Self {
            client: HttpClient::with_timeout(USER_AGENT, timeout)?,
            base_url: OPENREVIEW_API_URL.to_string(),
            max_results,
        })
    }

    /// Point the source at a different endpoint (for testing)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Convert the notes of a search response into papers.
    ///
    /// Notes that fail to deserialize are skipped individually.
    pub(crate) fn parse_notes(
        body: &str,
        query: &SearchQuery,
        max: usize,
    ) -> Result<Vec<Paper>, SourceError> {
        let response: SearchResponse = serde_json::from_str(body)?;

        let papers = response
            .notes
            .into_iter()
            .take(max)
            .filter_map(|raw| match serde_json::from_value::<Note>(raw) {
                Ok(note) => Some(note),
                Err(e) => {
                    tracing::debug!("Skipping malformed OpenReview note: {}", e);
                    None
                }
            })
            .filter_map(|note| Self::parse_note(note, query))
            .collect();

        Ok(papers)
    }

    fn parse_note(note: Note, query: &SearchQuery) -> Option<Paper> {
        let published = note
            .cdate
            .filter(|&ms| ms != 0)
            .and_then(chrono::DateTime::from_timestamp_millis)
            .map(|dt| dt.date_naive());

        if let Some(date) = published {
            if !query.contains(date) {
                return None;
            }
        }

        let content = note.content;
        let title = text(content.title).filter(|t| t != PLACEHOLDER_TITLE)?;

        let abstract_text = text(content.abstract_text)
            .or_else(|| text(content.summary))
            .or_else(|| text(content.tldr))
            .unwrap_or_else(|| NO_ABSTRACT.to_string());

        let authors = content
            .authors
            .map(FieldValue::into_value)
            .unwrap_or_default();

        Some(
            PaperBuilder::new(
                title,
                format!("{}?id={}", OPENREVIEW_FORUM_URL, note.id),
                SourceId::OpenReview,
            )
            .authors(authors)
            .abstract_text(abstract_text)
            .published(published.map(|d| d.format("%Y-%m-%d").to_string()))
            .pdf_url(Some(format!("{}?id={}", OPENREVIEW_PDF_URL, note.id)))
            .build(),
        )
    }
}

#[async_trait]
impl Source for OpenReviewSource {
    fn id(&self) -> SourceId {
        SourceId::OpenReview
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH | SourceCapabilities::PDF_LINKS | SourceCapabilities::DATE_RANGE
    }

    async fn try_search(&self, query: &SearchQuery) -> Result<Vec<Paper>, SourceError> {
        let max = self.max_results.get();
        let limit = max.min(MAX_PAGE_SIZE).to_string();

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("term", query.keywords.as_str()),
                ("limit", limit.as_str()),
                ("offset", "0"),
            ])
            .send()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to search OpenReview: {}", e)))?;

        if !response.status().is_success() {
            return Err(SourceError::Api(format!(
                "OpenReview API returned status: {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to read response: {}", e)))?;

        Self::parse_notes(&body, query, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    // 2024-03-01T12:00:00Z and 2022-06-15T12:00:00Z
    const MARCH_2024: i64 = 1_709_294_400_000;
    const JUNE_2022: i64 = 1_655_294_400_000;

    fn body() -> String {
        serde_json::json!({
            "notes": [
                {
                    "id": "abc123",
                    "cdate": MARCH_2024,
                    "content": {
                        "title": {"value": "Wrapped Title"},
                        "abstract": {"value": "A wrapped abstract."},
                        "authors": {"value": ["Ada Lovelace", "Alan Turing"]}
                    }
                },
                {
                    "id": "review1",
                    "cdate": MARCH_2024,
                    "content": {"title": "No Title", "abstract": "A review."}
                },
                {
                    "id": "raw456",
                    "content": {
                        "title": "Raw Title",
                        "TL;DR": "Short version.",
                        "authors": ["Grace Hopper"]
                    }
                },
                {
                    "id": "old789",
                    "cdate": JUNE_2022,
                    "content": {"title": "Old Title"}
                },
                {
                    "id": "broken",
                    "cdate": "yesterday",
                    "content": {"title": "Broken"}
                }
            ]
        })
        .to_string()
    }

    #[test]
    fn test_field_value_shapes() {
        let wrapped: FieldValue<String> = serde_json::from_str(r#"{"value": "x"}"#).unwrap();
        let raw: FieldValue<String> = serde_json::from_str(r#""x""#).unwrap();
        assert_eq!(wrapped.into_value(), "x");
        assert_eq!(raw.into_value(), "x");

        let list: FieldValue<Vec<String>> = serde_json::from_str(r#"{"value": ["a", "b"]}"#).unwrap();
        assert_eq!(list.into_value(), vec!["a", "b"]);
    }

    #[test]
    fn test_parse_notes() {
        let papers = OpenReviewSource::parse_notes(&body(), &SearchQuery::new("x"), 100).unwrap();

        let titles: Vec<_> = papers.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Wrapped Title", "Raw Title", "Old Title"]);

        let first = &papers[0];
        assert_eq!(first.r#abstract, "A wrapped abstract.");
        assert_eq!(first.authors, vec!["Ada Lovelace", "Alan Turing"]);
        assert_eq!(first.published.as_deref(), Some("2024-03-01"));
        assert_eq!(first.url, "https://openreview.net/forum?id=abc123");
        assert_eq!(
            first.pdf_url.as_deref(),
            Some("https://openreview.net/pdf?id=abc123")
        );

        assert_eq!(papers[1].r#abstract, "Short version.");
        assert_eq!(papers[2].r#abstract, NO_ABSTRACT);
    }

    #[test]
    fn test_odd_field_shape_only_blanks_that_field() {
        let body = serde_json::json!({
            "notes": [
                {
                    "id": "nullabs",
                    "content": {
                        "title": {"value": "Null Abstract"},
                        "abstract": {"value": null},
                        "TL;DR": {"value": "Falls back to the TL;DR."},
                        "authors": "Ada Lovelace"
                    }
                },
                {
                    "id": "numtitle",
                    "content": {"title": {"value": 42}, "abstract": "Kept out."}
                }
            ]
        })
        .to_string();

        let papers = OpenReviewSource::parse_notes(&body, &SearchQuery::new("x"), 100).unwrap();

        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].title, "Null Abstract");
        assert_eq!(papers[0].r#abstract, "Falls back to the TL;DR.");
        assert!(papers[0].authors.is_empty());
    }

    #[test]
    fn test_absent_date_is_never_filtered() {
        let query = SearchQuery::new("x")
            .start_date(NaiveDate::from_ymd_opt(2024, 1, 1))
            .end_date(NaiveDate::from_ymd_opt(2024, 12, 31));

        let papers = OpenReviewSource::parse_notes(&body(), &query, 100).unwrap();
        let titles: Vec<_> = papers.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Wrapped Title", "Raw Title"]);
        assert!(papers[1].published.is_none());
    }

    #[test]
    fn test_only_first_max_notes_considered() {
        let papers = OpenReviewSource::parse_notes(&body(), &SearchQuery::new("x"), 2).unwrap();
        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].title, "Wrapped Title");
    }

    #[tokio::test]
    async fn test_search_with_mockito() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/notes/search")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("term".into(), "graph neural".into()),
                mockito::Matcher::UrlEncoded("limit".into(), "100".into()),
                mockito::Matcher::UrlEncoded("offset".into(), "0".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body())
            .create_async()
            .await;

        let source = OpenReviewSource::new(MaxResults::new(250), Duration::from_secs(5))
            .unwrap()
            .with_base_url(format!("{}/notes/search", server.url()));

        let papers = source.search(&SearchQuery::new("graph neural")).await;

        mock.assert_async().await;
        assert_eq!(papers.len(), 3);
        assert!(papers.iter().all(|p| p.title != "No Title"));
    }

    #[tokio::test]
    async fn test_search_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", mockito::Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let source = OpenReviewSource::new(MaxResults::new(10), Duration::from_secs(5))
            .unwrap()
            .with_base_url(server.url());

        let result = source.try_search(&SearchQuery::new("x")).await;
        assert!(matches!(result, Err(SourceError::Api(_))));
    }
}

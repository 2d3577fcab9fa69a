//! Search request models.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Query handed to a single source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Free-text keywords
    pub keywords: String,

    /// Inclusive lower bound on publication date
    pub start_date: Option<NaiveDate>,

    /// Inclusive upper bound on publication date
    pub end_date: Option<NaiveDate>,
}

impl SearchQuery {
    /// Create a new query without date bounds
    pub fn new(keywords: impl Into<String>) -> Self {
        Self {
            keywords: keywords.into(),
            start_date: None,
            end_date: None,
        }
    }

    /// Set the inclusive start date
    pub fn start_date(mut self, date: Option<NaiveDate>) -> Self {
        self.start_date = date;
        self
    }

    /// Set the inclusive end date
    pub fn end_date(mut self, date: Option<NaiveDate>) -> Self {
        self.end_date = date;
        self
    }

    /// Year of the start bound, for sources that only filter by year
    pub fn start_year(&self) -> Option<i32> {
        self.start_date.map(|d| d.year())
    }

    /// Year of the end bound, for sources that only filter by year
    pub fn end_year(&self) -> Option<i32> {
        self.end_date.map(|d| d.year())
    }

    /// Whether a date lies inside `[start_date, end_date]`; absent bounds are open
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date.map_or(true, |start| date >= start)
            && self.end_date.map_or(true, |end| date <= end)
    }

    /// Like [`contains`](Self::contains) for an ISO `YYYY-MM-DD` string.
    ///
    /// Strings that do not start with a date are never filtered out.
    pub fn contains_iso(&self, date: &str) -> bool {
        match parse_iso_date(date) {
            Some(date) => self.contains(date),
            None => true,
        }
    }
}

/// Parse the leading `YYYY-MM-DD` of a date or timestamp string
pub fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    let head = value.trim().get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// Request handled by the search manager across several sources
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Free-text keywords
    pub keywords: String,

    /// Inclusive lower bound on publication date
    pub start_date: Option<NaiveDate>,

    /// Inclusive upper bound on publication date
    pub end_date: Option<NaiveDate>,

    /// Source identifiers, searched in this order
    pub sources: Vec<String>,

    /// Papers mentioning any of these terms are dropped
    pub exclude_terms: Vec<String>,

    /// When non-empty, papers must mention at least one of these terms
    pub require_terms: Vec<String>,
}

impl SearchRequest {
    /// Create a request for the given keywords with no sources selected
    pub fn new(keywords: impl Into<String>) -> Self {
        Self {
            keywords: keywords.into(),
            ..Default::default()
        }
    }

    /// Set the date range
    pub fn dates(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    /// Set the sources to search
    pub fn sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources = sources.into_iter().map(Into::into).collect();
        self
    }

    /// Set the exclude terms
    pub fn exclude<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_terms = terms.into_iter().map(Into::into).collect();
        self
    }

    /// Set the require terms
    pub fn require<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.require_terms = terms.into_iter().map(Into::into).collect();
        self
    }

    /// The per-source query carried by this request
    pub fn query(&self) -> SearchQuery {
        SearchQuery::new(self.keywords.clone())
            .start_date(self.start_date)
            .end_date(self.end_date)
    }
}

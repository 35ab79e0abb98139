pub mod glints;
pub mod jobstreet;
pub mod linkedin;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use url::Url;

use crate::error::QueryError;
use crate::extractor::Extractor;
use crate::models::{JobDraft, RawListing, SearchQuery, WorkArrangement};

pub use glints::Glints;
pub use jobstreet::JobStreet;
pub use linkedin::LinkedIn;

/// Position in a paginated result set. `page` is 1-based and always
/// advances; `offset` counts listings seen for offset-paged boards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub page: usize,
    pub offset: usize,
}

impl Cursor {
    pub fn first() -> Self {
        Cursor { page: 1, offset: 0 }
    }

    pub fn advanced(self, listings_on_page: usize) -> Self {
        Cursor {
            page: self.page + 1,
            offset: self.offset + listings_on_page,
        }
    }
}

/// Enrichment read from a listing's own page. Both fields absent means
/// "nothing learned".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailInfo {
    pub description: Option<String>,
    pub work_arrangement: Option<WorkArrangement>,
}

impl DetailInfo {
    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.work_arrangement.is_none()
    }

    /// Fills gaps in `draft`; never overrides what the listing already said.
    pub fn apply(self, draft: &mut JobDraft) {
        if draft.description.is_none() {
            draft.description = self.description;
        }
        if draft.work_arrangement.is_none() {
            draft.work_arrangement = self.work_arrangement;
        }
    }
}

pub trait JobSource: Send + Sync {
    fn name(&self) -> &'static str;

    fn accept_language(&self) -> &'static str {
        "en-US,en;q=0.9"
    }

    fn page_timeout(&self) -> Duration;

    fn detail_timeout(&self) -> Duration;

    fn page_url(&self, query: &SearchQuery, cursor: Cursor) -> Result<Url, url::ParseError>;

    fn within_ceiling(&self, cursor: Cursor) -> bool;

    fn extractor(&self) -> &Extractor;

    /// Maps one raw listing; `None` drops a record missing its id or title.
    fn normalize(&self, raw: &RawListing, query: &SearchQuery, now: NaiveDateTime)
        -> Option<JobDraft>;

    fn has_details(&self) -> bool {
        true
    }

    fn parse_detail(&self, body: &str) -> DetailInfo;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    JobStreet,
    LinkedIn,
    Glints,
}

impl SourceKind {
    pub fn build(self) -> Arc<dyn JobSource> {
        match self {
            SourceKind::JobStreet => Arc::new(JobStreet::new()),
            SourceKind::LinkedIn => Arc::new(LinkedIn::new()),
            SourceKind::Glints => Arc::new(Glints::new()),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::JobStreet => "jobstreet",
            SourceKind::LinkedIn => "linkedin",
            SourceKind::Glints => "glints",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "jobstreet" => Ok(SourceKind::JobStreet),
            "linkedin" => Ok(SourceKind::LinkedIn),
            "glints" => Ok(SourceKind::Glints),
            _ => Err(QueryError::UnknownSource(s.to_string())),
        }
    }
}

pub(crate) fn slug(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join("-")
}

pub(crate) fn absolute_url(base: &str, href: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    base.join(href.trim()).ok().map(String::from)
}

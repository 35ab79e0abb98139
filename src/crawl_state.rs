use std::collections::HashSet;
use std::fmt;

use chrono::NaiveDateTime;
use log::{debug, info, warn};
use url::Url;

use crate::delay_manager::STALE_PAGE_LIMIT;
use crate::error::FetchError;
use crate::fetcher::PageResponse;
use crate::models::{JobDraft, NormalizedJob, RawListing, SearchQuery};
use crate::progress::{notify, ProgressEvent, ProgressSink};
use crate::sources::{Cursor, JobSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlOptions {
    pub fetch_details: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        CrawlOptions {
            fetch_details: true,
        }
    }
}

#[derive(Debug)]
pub enum StopReason {
    TargetReached,
    Exhausted,
    PageCeiling,
    StalePages,
    HttpStatus(u16),
    Transport(FetchError),
    Cancelled,
}

impl StopReason {
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            StopReason::HttpStatus(_) | StopReason::Transport(_) | StopReason::Cancelled
        )
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::TargetReached => f.write_str("reached the requested number of results"),
            StopReason::Exhausted => f.write_str("no more results"),
            StopReason::PageCeiling => f.write_str("reached the pagination ceiling"),
            StopReason::StalePages => write!(
                f,
                "{} consecutive pages without new jobs",
                STALE_PAGE_LIMIT
            ),
            StopReason::HttpStatus(status) => write!(f, "page request returned HTTP {}", status),
            StopReason::Transport(e) => write!(f, "{}", e),
            StopReason::Cancelled => f.write_str("crawl cancelled"),
        }
    }
}

#[derive(Debug)]
pub struct CrawlOutcome {
    pub jobs: Vec<NormalizedJob>,
    pub stop: StopReason,
}

impl CrawlOutcome {
    pub fn into_jobs(self) -> Vec<NormalizedJob> {
        self.jobs
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.jobs.iter().map(|job| job.id.as_str())
    }
}

pub(crate) enum PageStep {
    RateLimited,
    Listings(Vec<RawListing>),
    Stop(StopReason),
}

pub(crate) fn read_page(
    source: &dyn JobSource,
    url: &Url,
    fetched: Result<PageResponse, FetchError>,
) -> PageStep {
    let response = match fetched {
        Ok(response) => response,
        Err(e) => {
            warn!("Page fetch failed: {}", e);
            return PageStep::Stop(StopReason::Transport(e));
        }
    };
    if response.is_rate_limited() {
        warn!("Rate limited at {}", url);
        return PageStep::RateLimited;
    }
    if !response.is_success() {
        info!("{} returned HTTP {}; treating as end of results", url, response.status);
        return PageStep::Stop(StopReason::HttpStatus(response.status));
    }

    let listings = source.extractor().extract(&response.body);
    if listings.is_empty() {
        info!("No listings on {}", url);
        return PageStep::Stop(StopReason::Exhausted);
    }
    PageStep::Listings(listings)
}

pub(crate) struct CrawlState<'q> {
    query: &'q SearchQuery,
    seen_ids: HashSet<String>,
    cursor: Cursor,
    accumulated: Vec<NormalizedJob>,
    consecutive_stale: usize,
    new_on_page: usize,
    now: NaiveDateTime,
}

impl<'q> CrawlState<'q> {
    pub(crate) fn new(query: &'q SearchQuery, now: NaiveDateTime) -> Self {
        CrawlState {
            query,
            seen_ids: query.known_ids().clone(),
            cursor: Cursor::first(),
            accumulated: Vec::new(),
            consecutive_stale: 0,
            new_on_page: 0,
            now,
        }
    }

    pub(crate) fn started(&self, source: &dyn JobSource, sink: Option<&dyn ProgressSink>) {
        let message = format!(
            "Starting {} search for '{}'",
            source.name(),
            self.query.keywords()
        );
        info!("{}", message);
        notify(sink, ProgressEvent::Started { message });
    }

    pub(crate) fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub(crate) fn found(&self) -> usize {
        self.accumulated.len()
    }

    pub(crate) fn wants_more(&self) -> bool {
        self.accumulated.len() < self.query.results_wanted()
    }

    /// Normalizes one listing and claims its id. `None` for malformed
    /// records and for ids already seen.
    pub(crate) fn admit(&mut self, source: &dyn JobSource, raw: &RawListing) -> Option<JobDraft> {
        let Some(draft) = source.normalize(raw, self.query, self.now) else {
            debug!("Dropping {} listing without id or title", source.name());
            return None;
        };
        if !self.seen_ids.insert(draft.id.clone()) {
            debug!("Skipping already seen {}", draft.id);
            return None;
        }
        self.new_on_page += 1;
        Some(draft)
    }

    pub(crate) fn push(&mut self, draft: JobDraft) {
        self.accumulated.push(draft.finish());
    }

    /// Advances past a page of `listings` entries. True once too many pages
    /// in a row added nothing new.
    pub(crate) fn finish_page(&mut self, listings: usize) -> bool {
        self.cursor = self.cursor.advanced(listings);
        if self.new_on_page == 0 {
            self.consecutive_stale += 1;
            info!(
                "No new jobs on this page ({}/{})",
                self.consecutive_stale, STALE_PAGE_LIMIT
            );
        } else {
            self.consecutive_stale = 0;
        }
        self.new_on_page = 0;
        self.consecutive_stale >= STALE_PAGE_LIMIT
    }

    pub(crate) fn exit_reason(&self) -> StopReason {
        if self.wants_more() {
            StopReason::PageCeiling
        } else {
            StopReason::TargetReached
        }
    }

    pub(crate) fn finish(
        mut self,
        stop: StopReason,
        sink: Option<&dyn ProgressSink>,
    ) -> CrawlOutcome {
        self.accumulated.truncate(self.query.results_wanted());

        let event = if stop.is_error() {
            warn!(
                "Crawl for '{}' stopped early: {} ({} jobs kept)",
                self.query.keywords(),
                stop,
                self.accumulated.len()
            );
            ProgressEvent::Error {
                message: stop.to_string(),
            }
        } else {
            let known = self.query.known_ids();
            let new_jobs = self
                .accumulated
                .iter()
                .filter(|job| !known.contains(&job.id))
                .count();
            info!(
                "Crawl for '{}' finished: {} ({} jobs, {} new)",
                self.query.keywords(),
                stop,
                self.accumulated.len(),
                new_jobs
            );
            ProgressEvent::Completed {
                total_jobs: self.accumulated.len(),
                new_jobs,
            }
        };
        notify(sink, event);

        CrawlOutcome {
            jobs: self.accumulated,
            stop,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::JobStreet;
    use crate::testing::RecordingSink;
    use serde_json::json;

    fn now() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2024-05-20 12:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn listing(id: &str) -> RawListing {
        json!({"id": id, "title": format!("Job {}", id)})
            .as_object()
            .cloned()
            .unwrap()
    }

    #[test]
    fn known_ids_are_never_admitted() {
        let query = SearchQuery::builder("go")
            .known_ids(["jobstreet_1"])
            .build()
            .unwrap();
        let source = JobStreet::new();
        let mut state = CrawlState::new(&query, now());

        assert!(state.admit(&source, &listing("1")).is_none());
        let draft = state.admit(&source, &listing("2")).unwrap();
        assert_eq!(draft.id, "jobstreet_2");
        assert!(state.admit(&source, &listing("2")).is_none());
        let no_id = json!({"title": "no id"}).as_object().cloned().unwrap();
        assert!(state.admit(&source, &no_id).is_none());
    }

    #[test]
    fn stale_pages_reset_on_progress() {
        let query = SearchQuery::builder("go").build().unwrap();
        let source = JobStreet::new();
        let mut state = CrawlState::new(&query, now());

        assert!(!state.finish_page(10));
        assert!(!state.finish_page(10));
        state.admit(&source, &listing("7"));
        assert!(!state.finish_page(10));
        assert!(!state.finish_page(10));
        assert!(!state.finish_page(10));
        assert!(state.finish_page(10));
        assert_eq!(state.cursor(), Cursor { page: 7, offset: 60 });
    }

    #[test]
    fn finish_truncates_and_reports() {
        let query = SearchQuery::builder("go")
            .results_wanted(2)
            .build()
            .unwrap();
        let source = JobStreet::new();
        let mut state = CrawlState::new(&query, now());
        for id in ["1", "2", "3"] {
            let draft = state.admit(&source, &listing(id)).unwrap();
            state.push(draft);
        }
        assert!(!state.wants_more());

        let sink = RecordingSink::default();
        let stop = state.exit_reason();
        let outcome = state.finish(stop, Some(&sink));
        assert_eq!(outcome.jobs.len(), 2);
        assert!(matches!(outcome.stop, StopReason::TargetReached));
        assert_eq!(
            sink.events(),
            vec![ProgressEvent::Completed {
                total_jobs: 2,
                new_jobs: 2
            }]
        );
    }

    #[test]
    fn failures_end_with_error_event() {
        let query = SearchQuery::builder("go").build().unwrap();
        let sink = RecordingSink::default();
        let outcome = CrawlState::new(&query, now())
            .finish(StopReason::HttpStatus(503), Some(&sink));
        assert!(outcome.jobs.is_empty());
        assert_eq!(
            sink.events(),
            vec![ProgressEvent::Error {
                message: "page request returned HTTP 503".into()
            }]
        );
    }
}

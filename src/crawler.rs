use std::sync::Arc;

use chrono::Local;
use log::info;

use crate::crawl_state::{read_page, CrawlOptions, CrawlOutcome, CrawlState, PageStep, StopReason};
use crate::delay_manager::{random_page_delay, Pacer, ThreadPacer, RATE_LIMIT_COOLDOWN};
use crate::detail::fetch_detail;
use crate::error::FetchError;
use crate::fetcher::{HttpFetcher, PageFetcher};
use crate::models::SearchQuery;
use crate::progress::{notify, ProgressEvent, ProgressSink};
use crate::sources::{JobSource, SourceKind};

pub struct Crawler<F = HttpFetcher, P = ThreadPacer> {
    source: Arc<dyn JobSource>,
    fetcher: F,
    pacer: P,
    options: CrawlOptions,
}

impl Crawler {
    /// Live crawler for `kind` with its own cookie session.
    pub fn for_source(kind: SourceKind) -> Result<Self, FetchError> {
        let source = kind.build();
        let fetcher = HttpFetcher::new(source.accept_language())?;
        Ok(Crawler::new(source, fetcher, ThreadPacer))
    }
}

impl<F: PageFetcher, P: Pacer> Crawler<F, P> {
    pub fn new(source: Arc<dyn JobSource>, fetcher: F, pacer: P) -> Self {
        Crawler {
            source,
            fetcher,
            pacer,
            options: CrawlOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CrawlOptions) -> Self {
        self.options = options;
        self
    }

    pub fn source(&self) -> &dyn JobSource {
        self.source.as_ref()
    }

    /// Runs one crawl to a stopping rule. Never fails: problems end the
    /// crawl early and show up in [`CrawlOutcome::stop`].
    pub fn crawl(&self, query: &SearchQuery, progress: Option<&dyn ProgressSink>) -> CrawlOutcome {
        let source = self.source.as_ref();
        let mut state = CrawlState::new(query, Local::now().naive_local());
        state.started(source, progress);

        while state.wants_more() && source.within_ceiling(state.cursor()) {
            let cursor = state.cursor();
            notify(
                progress,
                ProgressEvent::FetchingPage {
                    page: cursor.page,
                    jobs_found_so_far: state.found(),
                },
            );

            let url = match source.page_url(query, cursor) {
                Ok(url) => url,
                Err(e) => return state.finish(StopReason::Transport(e.into()), progress),
            };
            info!("Fetching {} page {}: {}", source.name(), cursor.page, url);

            let fetched = self.fetcher.get(&url, source.page_timeout());
            let listings = match read_page(source, &url, fetched) {
                PageStep::Listings(listings) => listings,
                PageStep::RateLimited => {
                    notify(
                        progress,
                        ProgressEvent::RateLimited {
                            wait_seconds: RATE_LIMIT_COOLDOWN.as_secs(),
                        },
                    );
                    self.pacer.pause(RATE_LIMIT_COOLDOWN);
                    continue;
                }
                PageStep::Stop(stop) => return state.finish(stop, progress),
            };

            let total = listings.len();
            for (i, raw) in listings.iter().enumerate() {
                notify(
                    progress,
                    ProgressEvent::Parsing {
                        current: i + 1,
                        total,
                    },
                );
                let Some(mut draft) = state.admit(source, raw) else {
                    continue;
                };
                if self.options.fetch_details && source.has_details() {
                    let info = fetch_detail(&self.fetcher, source, &draft.job_url);
                    info.apply(&mut draft);
                }
                state.push(draft);
                if !state.wants_more() {
                    break;
                }
            }

            if state.finish_page(total) {
                return state.finish(StopReason::StalePages, progress);
            }
            if state.wants_more() && source.within_ceiling(state.cursor()) {
                self.pacer.pause(random_page_delay());
            }
        }

        let stop = state.exit_reason();
        state.finish(stop, progress)
    }
}

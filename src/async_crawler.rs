use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use log::info;
use tokio_util::sync::CancellationToken;

use crate::crawl_state::{read_page, CrawlOptions, CrawlOutcome, CrawlState, PageStep, StopReason};
use crate::delay_manager::{random_page_delay, RATE_LIMIT_COOLDOWN};
use crate::detail::fetch_detail_async;
use crate::error::FetchError;
use crate::fetcher::{AsyncHttpFetcher, AsyncPageFetcher};
use crate::models::SearchQuery;
use crate::progress::{notify, ProgressEvent, ProgressSink};
use crate::sources::{JobSource, SourceKind};

pub struct AsyncCrawler<F = AsyncHttpFetcher> {
    source: Arc<dyn JobSource>,
    fetcher: F,
    options: CrawlOptions,
}

impl AsyncCrawler {
    pub fn for_source(kind: SourceKind) -> Result<Self, FetchError> {
        let source = kind.build();
        let fetcher = AsyncHttpFetcher::new(source.accept_language())?;
        Ok(AsyncCrawler::new(source, fetcher))
    }
}

/// Sleeps unless cancelled first. False when cancelled.
async fn pause(duration: Duration, cancel: &CancellationToken) -> bool {
    info!("Waiting for {:.1} seconds...", duration.as_secs_f64());
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

/// Emits and lets other tasks run; the sink may be drained by one of them.
async fn emit(sink: Option<&dyn ProgressSink>, event: ProgressEvent) {
    notify(sink, event);
    tokio::task::yield_now().await;
}

impl<F: AsyncPageFetcher> AsyncCrawler<F> {
    pub fn new(source: Arc<dyn JobSource>, fetcher: F) -> Self {
        AsyncCrawler {
            source,
            fetcher,
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

    pub async fn crawl(
        &self,
        query: &SearchQuery,
        progress: Option<&dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> CrawlOutcome {
        let source = self.source.as_ref();
        let mut state = CrawlState::new(query, Local::now().naive_local());
        state.started(source, progress);
        tokio::task::yield_now().await;

        while state.wants_more() && source.within_ceiling(state.cursor()) {
            if cancel.is_cancelled() {
                return state.finish(StopReason::Cancelled, progress);
            }

            let cursor = state.cursor();
            emit(
                progress,
                ProgressEvent::FetchingPage {
                    page: cursor.page,
                    jobs_found_so_far: state.found(),
                },
            )
            .await;

            let url = match source.page_url(query, cursor) {
                Ok(url) => url,
                Err(e) => return state.finish(StopReason::Transport(e.into()), progress),
            };
            info!("Fetching {} page {}: {}", source.name(), cursor.page, url);

            let fetched = tokio::select! {
                _ = cancel.cancelled() => return state.finish(StopReason::Cancelled, progress),
                fetched = self.fetcher.get(&url, source.page_timeout()) => fetched,
            };
            let listings = match read_page(source, &url, fetched) {
                PageStep::Listings(listings) => listings,
                PageStep::RateLimited => {
                    emit(
                        progress,
                        ProgressEvent::RateLimited {
                            wait_seconds: RATE_LIMIT_COOLDOWN.as_secs(),
                        },
                    )
                    .await;
                    if !pause(RATE_LIMIT_COOLDOWN, cancel).await {
                        return state.finish(StopReason::Cancelled, progress);
                    }
                    continue;
                }
                PageStep::Stop(stop) => return state.finish(stop, progress),
            };

            let total = listings.len();
            for (i, raw) in listings.iter().enumerate() {
                emit(
                    progress,
                    ProgressEvent::Parsing {
                        current: i + 1,
                        total,
                    },
                )
                .await;
                if cancel.is_cancelled() {
                    return state.finish(StopReason::Cancelled, progress);
                }
                let Some(mut draft) = state.admit(source, raw) else {
                    continue;
                };
                if self.options.fetch_details && source.has_details() {
                    let info = tokio::select! {
                        _ = cancel.cancelled() => {
                            return state.finish(StopReason::Cancelled, progress);
                        }
                        info = fetch_detail_async(&self.fetcher, source, &draft.job_url) => info,
                    };
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
            if state.wants_more()
                && source.within_ceiling(state.cursor())
                && !pause(random_page_delay(), cancel).await
            {
                return state.finish(StopReason::Cancelled, progress);
            }
        }

        let stop = state.exit_reason();
        state.finish(stop, progress)
    }
}

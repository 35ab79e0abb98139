use log::{debug, info, warn};
use serde::Serialize;

use crate::error::SinkError;

/// One step of a crawl, in the order the step happened.
///
/// Serializes to the flat `{"type": "...", ...}` shape progress consumers
/// (websocket relays and the like) forward as is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Started {
        message: String,
    },
    FetchingPage {
        page: usize,
        #[serde(rename = "jobs_found")]
        jobs_found_so_far: usize,
    },
    #[serde(rename = "rate_limit")]
    RateLimited {
        wait_seconds: u64,
    },
    Parsing {
        current: usize,
        total: usize,
    },
    Completed {
        total_jobs: usize,
        new_jobs: usize,
    },
    Error {
        message: String,
    },
}

impl ProgressEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressEvent::Completed { .. } | ProgressEvent::Error { .. }
        )
    }
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent) -> Result<(), SinkError>;
}

impl ProgressSink for std::sync::mpsc::Sender<ProgressEvent> {
    fn emit(&self, event: ProgressEvent) -> Result<(), SinkError> {
        self.send(event).map_err(|_| SinkError::Closed)
    }
}

impl ProgressSink for tokio::sync::mpsc::UnboundedSender<ProgressEvent> {
    fn emit(&self, event: ProgressEvent) -> Result<(), SinkError> {
        self.send(event).map_err(|_| SinkError::Closed)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn emit(&self, event: ProgressEvent) -> Result<(), SinkError> {
        match &event {
            ProgressEvent::Started { message } => info!("{}", message),
            ProgressEvent::FetchingPage {
                page,
                jobs_found_so_far,
            } => info!("Fetching page {} ({} jobs so far)", page, jobs_found_so_far),
            ProgressEvent::RateLimited { wait_seconds } => {
                warn!("Rate limited, waiting {}s...", wait_seconds)
            }
            ProgressEvent::Parsing { current, total } => debug!("Parsing {}/{}", current, total),
            ProgressEvent::Completed {
                total_jobs,
                new_jobs,
            } => info!("Completed! Found {} jobs ({} new)", total_jobs, new_jobs),
            ProgressEvent::Error { message } => warn!("Crawl ended with error: {}", message),
        }
        Ok(())
    }
}

pub(crate) fn notify(sink: Option<&dyn ProgressSink>, event: ProgressEvent) {
    if let Some(sink) = sink {
        if let Err(e) = sink.emit(event) {
            debug!("Dropping progress event: {}", e);
        }
    }
}

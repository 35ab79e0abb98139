use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use url::Url;

use crate::delay_manager::Pacer;
use crate::error::{FetchError, SinkError};
use crate::fetcher::{AsyncPageFetcher, PageFetcher, PageResponse};
use crate::progress::{ProgressEvent, ProgressSink};

enum Scripted {
    Page(PageResponse),
    Timeout,
}

/// Serves queued responses to search-page requests (URLs with a query
/// string) and per-URL responses to detail requests. Unscripted details are
/// 404s; a drained page queue serves empty pages.
#[derive(Default)]
pub struct ScriptedFetcher {
    pages: Mutex<VecDeque<Scripted>>,
    details: HashMap<String, PageResponse>,
    requested: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, response: PageResponse) -> Self {
        self.pages
            .lock()
            .unwrap()
            .push_back(Scripted::Page(response));
        self
    }

    pub fn with_timeout(self) -> Self {
        self.pages.lock().unwrap().push_back(Scripted::Timeout);
        self
    }

    pub fn with_detail(mut self, url: &str, response: PageResponse) -> Self {
        self.details.insert(url.to_string(), response);
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }

    fn respond(&self, url: &Url) -> Result<PageResponse, FetchError> {
        self.requested.lock().unwrap().push(url.to_string());

        if let Some(detail) = self.details.get(url.as_str()) {
            return Ok(detail.clone());
        }
        if url.query().is_none() {
            return Ok(PageResponse::status(404));
        }
        match self.pages.lock().unwrap().pop_front() {
            Some(Scripted::Page(response)) => Ok(response),
            Some(Scripted::Timeout) => Err(FetchError::Timeout {
                url: url.to_string(),
            }),
            None => Ok(PageResponse::ok("<html><body></body></html>")),
        }
    }
}

impl PageFetcher for ScriptedFetcher {
    fn get(&self, url: &Url, _timeout: Duration) -> Result<PageResponse, FetchError> {
        self.respond(url)
    }
}

#[async_trait]
impl AsyncPageFetcher for ScriptedFetcher {
    async fn get(&self, url: &Url, _timeout: Duration) -> Result<PageResponse, FetchError> {
        self.respond(url)
    }
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressSink for RecordingSink {
    fn emit(&self, event: ProgressEvent) -> Result<(), SinkError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

/// Records requested pauses instead of sleeping.
#[derive(Default)]
pub struct RecordingPacer {
    pauses: Mutex<Vec<Duration>>,
}

impl RecordingPacer {
    pub fn pauses(&self) -> Vec<Duration> {
        self.pauses.lock().unwrap().clone()
    }
}

impl Pacer for RecordingPacer {
    fn pause(&self, duration: Duration) {
        self.pauses.lock().unwrap().push(duration);
    }
}

/// A document with an optional `__NEXT_DATA__` island.
pub fn html_page(island: &str, body: &str) -> String {
    let script = if island.is_empty() {
        String::new()
    } else {
        format!(
            r#"<script id="__NEXT_DATA__" type="application/json">{}</script>"#,
            island
        )
    };
    format!(
        "<!DOCTYPE html><html><head>{}</head><body>{}</body></html>",
        script, body
    )
}

/// JobStreet search page whose island lists `ids` in order.
pub fn jobstreet_page(ids: &[&str]) -> String {
    let jobs: Vec<_> = ids
        .iter()
        .map(|id| {
            json!({
                "id": id,
                "title": format!("Engineer {}", id),
                "companyName": "Acme",
                "jobUrl": format!("/id/job/{}", id),
            })
        })
        .collect();
    html_page(
        &json!({"props": {"pageProps": {"search": {"data": jobs}}}}).to_string(),
        "",
    )
}

pub fn jobstreet_card(id: &str, title: &str, company: &str) -> String {
    format!(
        r#"<article data-automation="normalJob">
            <h3><a data-automation="jobTitle" href="/id/job/{id}">{title}</a></h3>
            <a data-automation="jobCompany" href="/id/companies/x">{company}</a>
            <a data-automation="jobLocation" href="/id/jobs/in-Jakarta-Raya">Jakarta Raya</a>
            <span data-automation="jobSalary">Rp 8.000.000 – Rp 10.000.000 per month</span>
            <span data-automation="jobListingDate"><time datetime="2024-05-18T02:00:00Z">2d ago</time></span>
            <span>Hybrid</span>
        </article>"#
    )
}

/// LinkedIn guest-search fragment with one card per id.
pub fn linkedin_cards(ids: &[&str]) -> String {
    ids.iter()
        .map(|id| {
            format!(
                r#"<li><div class="base-card base-search-card job-search-card">
                    <a class="base-card__full-link" href="https://id.linkedin.com/jobs/view/engineer-at-acme-{id}?position=1&amp;pageNum=0">
                        <span class="sr-only">Engineer {id}</span>
                    </a>
                    <div class="base-search-card__info">
                        <h3 class="base-search-card__title">Engineer {id}</h3>
                        <h4 class="base-search-card__subtitle">
                            <a href="https://id.linkedin.com/company/acme?trk=public_jobs">Acme</a>
                        </h4>
                        <span class="job-search-card__location">Jakarta, Indonesia</span>
                        <time class="job-search-card__listdate" datetime="2024-05-19">1 day ago</time>
                    </div>
                </div></li>"#
            )
        })
        .collect()
}

use std::time::Duration;

use chrono::NaiveDateTime;
use log::debug;
use scraper::{ElementRef, Html};
use serde_json::Value;
use url::Url;

use super::{Cursor, DetailInfo, JobSource};
use crate::error::ParseFailure;
use crate::extractor::{element_text, find_in, first_matching, selector, text_in, Extractor};
use crate::models::{JobDraft, JobType, RawListing, SearchQuery, WorkArrangement};
use crate::normalizer::{
    detect_arrangement, first_text, match_arrangement, normalize_date, prefixed_id, text,
    UNKNOWN_COMPANY, UNKNOWN_COUNTRY,
};

pub const BASE_URL: &str = "https://www.linkedin.com";
const SEARCH_PATH: &str = "/jobs-guest/jobs/api/seeMoreJobPostings/search";
const PREFIX: &str = "linkedin";
const MAX_OFFSET: usize = 1000;

const JOB_TYPE_CODES: &[(JobType, &str)] = &[
    (JobType::FullTime, "F"),
    (JobType::PartTime, "P"),
    (JobType::Internship, "I"),
    (JobType::Contract, "C"),
    (JobType::Temporary, "T"),
];

const CARD_SELECTORS: &[&str] = &["div.base-search-card", "div.job-search-card"];

pub fn job_type_code(job_type: JobType) -> Option<&'static str> {
    JOB_TYPE_CODES
        .iter()
        .find(|(t, _)| *t == job_type)
        .map(|(_, code)| *code)
}

pub struct LinkedIn {
    extractor: Extractor,
}

impl Default for LinkedIn {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkedIn {
    pub fn new() -> Self {
        LinkedIn {
            extractor: Extractor::new().with_strategy("linkedin/search_cards", search_cards),
        }
    }
}

impl JobSource for LinkedIn {
    fn name(&self) -> &'static str {
        PREFIX
    }

    fn page_timeout(&self) -> Duration {
        Duration::from_secs(10)
    }

    fn detail_timeout(&self) -> Duration {
        Duration::from_secs(5)
    }

    fn page_url(&self, query: &SearchQuery, cursor: Cursor) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&format!("{}{}", BASE_URL, SEARCH_PATH))?;
        {
            let mut params = url.query_pairs_mut();
            params
                .append_pair("keywords", query.keywords())
                .append_pair("location", query.location())
                .append_pair("start", &cursor.offset.to_string())
                .append_pair("pageNum", "0");
            if let Some(code) = job_type_code(query.job_type()) {
                params.append_pair("f_JT", code);
            }
            if query.remote_only() {
                params.append_pair("f_WT", "2");
            }
            if let Some(hours) = query.max_age_hours() {
                params.append_pair("f_TPR", &format!("r{}", u64::from(hours) * 3600));
            }
        }
        Ok(url)
    }

    fn within_ceiling(&self, cursor: Cursor) -> bool {
        cursor.offset < MAX_OFFSET
    }

    fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    fn normalize(
        &self,
        raw: &RawListing,
        query: &SearchQuery,
        now: NaiveDateTime,
    ) -> Option<JobDraft> {
        let native = text(raw.get("id"))?;
        let id = prefixed_id(PREFIX, raw.get("id"))?;
        let title = text(raw.get("title"))?;
        let location = text(raw.get("location"));

        Some(JobDraft {
            id,
            title,
            company: text(raw.get("company"))
                .unwrap_or_else(|| UNKNOWN_COMPANY.to_string()),
            company_url: text(raw.get("companyUrl")),
            salary: text(raw.get("salary")),
            date_posted: normalize_date(raw.get("datePosted"), now),
            job_url: format!("{}/jobs/view/{}", BASE_URL, native),
            description: None,
            // "Jakarta (Remote)" style locations are the only card-level hint.
            work_arrangement: detect_arrangement(None, Vec::<&str>::new(), location.as_deref()),
            location: location.unwrap_or_else(|| UNKNOWN_COUNTRY.to_string()),
            source_keyword: Some(query.keywords().to_string()),
        })
    }

    fn parse_detail(&self, body: &str) -> DetailInfo {
        let document = Html::parse_document(body);
        let mut info = json_ld_posting(&document)
            .map(|posting| DetailInfo {
                description: text(posting.get("description")),
                work_arrangement: posting_arrangement(&posting),
            })
            .unwrap_or_default();

        if info.description.is_none() {
            info.description = description_markup(&document);
        }
        if info.work_arrangement.is_none() {
            info.work_arrangement = fit_level_arrangement(&document);
        }
        info
    }
}

fn strip_query(href: &str) -> &str {
    href.split('?').next().unwrap_or(href)
}

fn search_cards(body: &str) -> Result<Vec<RawListing>, ParseFailure> {
    let document = Html::parse_document(body);
    let cards = first_matching(&document, CARD_SELECTORS)?;
    Ok(cards.into_iter().map(parse_card).collect())
}

// Every served card yields a listing so the offset advances by cards served;
// cards without a job link carry no id and are dropped by `normalize`.
fn parse_card(card: ElementRef<'_>) -> RawListing {
    let mut raw = RawListing::new();
    if let Some(href) = find_in(card, &["a.base-card__full-link"])
        .and_then(|link| link.value().attr("href"))
    {
        let href = strip_query(href);
        if let Some(id) = href.rsplit('-').next().filter(|id| !id.is_empty()) {
            raw.insert("id".into(), Value::String(id.to_string()));
        }
        raw.insert("jobUrl".into(), Value::String(href.to_string()));
    }

    if let Some(title) = text_in(card, &["span.sr-only", "h3.base-search-card__title"]) {
        raw.insert("title".into(), Value::String(title));
    }

    if let Some(company) = find_in(card, &["h4.base-search-card__subtitle a"]) {
        raw.insert("company".into(), Value::String(element_text(company)));
        if let Some(company_href) = company.value().attr("href") {
            raw.insert(
                "companyUrl".into(),
                Value::String(strip_query(company_href).to_string()),
            );
        }
    } else if let Some(company) = text_in(card, &["h4.base-search-card__subtitle"]) {
        raw.insert("company".into(), Value::String(company));
    }

    let fields: [(&str, &[&str]); 2] = [
        ("location", &["span.job-search-card__location"]),
        ("salary", &["span.job-search-card__salary-info"]),
    ];
    for (key, patterns) in fields {
        if let Some(value) = text_in(card, patterns) {
            raw.insert(key.into(), Value::String(value));
        }
    }

    if let Some(datetime) = find_in(card, &["time.job-search-card__listdate", "time"])
        .and_then(|time| time.value().attr("datetime"))
    {
        raw.insert("datePosted".into(), Value::String(datetime.to_string()));
    }

    raw
}

/// The first JSON-LD block describing a `JobPosting`.
fn json_ld_posting(document: &Html) -> Option<serde_json::Map<String, Value>> {
    let scripts = selector(r#"script[type="application/ld+json"]"#).ok()?;
    document.select(&scripts).find_map(|script| {
        let raw: String = script.text().collect();
        match serde_json::from_str::<Value>(raw.trim()) {
            Ok(Value::Object(posting))
                if first_text(&posting, &["@type"]).as_deref() == Some("JobPosting") =>
            {
                Some(posting)
            }
            Ok(_) => None,
            Err(e) => {
                debug!("Skipping unreadable JSON-LD block: {}", e);
                None
            }
        }
    })
}

fn posting_arrangement(posting: &serde_json::Map<String, Value>) -> Option<WorkArrangement> {
    let location_type = text(posting.get("jobLocationType"))?;
    if location_type.eq_ignore_ascii_case("TELECOMMUTE") {
        Some(WorkArrangement::Remote)
    } else {
        match_arrangement(&location_type)
    }
}

fn description_markup(document: &Html) -> Option<String> {
    let divs = selector("div").ok()?;
    document
        .select(&divs)
        .find(|div| {
            div.value()
                .attr("class")
                .is_some_and(|class| class.contains("show-more-less-html__markup"))
        })
        .map(|div| div.html())
}

/// Only remote and hybrid are read from the preference buttons.
fn fit_level_arrangement(document: &Html) -> Option<WorkArrangement> {
    let buttons = selector("div.job-details-fit-level-preferences button").ok()?;
    document
        .select(&buttons)
        .map(element_text)
        .find_map(|label| match match_arrangement(&label)? {
            WorkArrangement::Onsite => None,
            other => Some(other),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::linkedin_cards;

    fn now() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2024-05-20 12:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn page_url_uses_offset_and_filters() {
        let query = SearchQuery::builder("rust developer")
            .location("Jakarta, Indonesia")
            .job_type(JobType::Contract)
            .remote_only(true)
            .max_age_hours(24)
            .build()
            .unwrap();
        let url = LinkedIn::new()
            .page_url(&query, Cursor { page: 3, offset: 50 })
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.linkedin.com/jobs-guest/jobs/api/seeMoreJobPostings/search?keywords=rust+developer&location=Jakarta%2C+Indonesia&start=50&pageNum=0&f_JT=C&f_WT=2&f_TPR=r86400"
        );
    }

    #[test]
    fn ceiling_is_offset_based() {
        let source = LinkedIn::new();
        assert!(source.within_ceiling(Cursor { page: 40, offset: 999 }));
        assert!(!source.within_ceiling(Cursor { page: 2, offset: 1000 }));
    }

    #[test]
    fn cards_map_to_drafts() {
        let body = linkedin_cards(&["3901", "3902"]);
        let listings = LinkedIn::new().extractor().extract(&body);
        assert_eq!(listings.len(), 2);

        let query = SearchQuery::builder("rust").build().unwrap();
        let draft = LinkedIn::new()
            .normalize(&listings[1], &query, now())
            .unwrap();
        assert_eq!(draft.id, "linkedin_3902");
        assert_eq!(draft.title, "Engineer 3902");
        assert_eq!(draft.company, "Acme");
        assert_eq!(
            draft.company_url.as_deref(),
            Some("https://id.linkedin.com/company/acme")
        );
        assert_eq!(draft.location, "Jakarta, Indonesia");
        assert_eq!(draft.date_posted.as_deref(), Some("2024-05-19"));
        assert_eq!(draft.job_url, "https://www.linkedin.com/jobs/view/3902");
        assert_eq!(draft.work_arrangement, None);
    }

    #[test]
    fn card_without_link_is_dropped_by_normalize() {
        let body = r#"<ul>
            <li><div class="base-search-card"><h3 class="base-search-card__title">Orphan</h3></div></li>
            <li><div class="base-search-card">
                <a class="base-card__full-link" href="https://id.linkedin.com/jobs/view/dev-at-x-77?refId=1"></a>
                <h3 class="base-search-card__title">Dev</h3>
                <span class="job-search-card__location">Indonesia (Remote)</span>
            </div></li></ul>"#;
        let listings = LinkedIn::new().extractor().extract(body);
        assert_eq!(listings.len(), 2);

        let query = SearchQuery::builder("dev").build().unwrap();
        assert!(LinkedIn::new()
            .normalize(&listings[0], &query, now())
            .is_none());
        let draft = LinkedIn::new()
            .normalize(&listings[1], &query, now())
            .unwrap();
        assert_eq!(draft.id, "linkedin_77");
        assert_eq!(draft.company, "Unknown Company");
        assert_eq!(draft.work_arrangement, Some(WorkArrangement::Remote));
    }

    #[test]
    fn detail_prefers_json_ld() {
        let body = r#"<html><head>
            <script type="application/ld+json">{"@type": "Organization", "name": "Acme"}</script>
            <script type="application/ld+json">{"@type": "JobPosting", "description": "Write Rust", "jobLocationType": "TELECOMMUTE"}</script>
            </head><body>
            <div class="show-more-less-html__markup">ignored</div>
            </body></html>"#;
        let info = LinkedIn::new().parse_detail(body);
        assert_eq!(info.description.as_deref(), Some("Write Rust"));
        assert_eq!(info.work_arrangement, Some(WorkArrangement::Remote));
    }

    #[test]
    fn detail_falls_back_to_markup_and_buttons() {
        let body = r#"<html><body>
            <div class="show-more-less-html__markup relative"><p>Own the API</p></div>
            <div class="job-details-fit-level-preferences">
                <button>Full-time</button><button> Hybrid </button>
            </div></body></html>"#;
        let info = LinkedIn::new().parse_detail(body);
        assert_eq!(
            info.description.as_deref(),
            Some(r#"<div class="show-more-less-html__markup relative"><p>Own the API</p></div>"#)
        );
        assert_eq!(info.work_arrangement, Some(WorkArrangement::Hybrid));
        assert!(LinkedIn::new().parse_detail("<html></html>").is_empty());
    }
}

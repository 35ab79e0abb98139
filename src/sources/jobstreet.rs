use std::sync::LazyLock;
use std::time::Duration;

use chrono::NaiveDateTime;
use log::debug;
use regex::Regex;
use scraper::{ElementRef, Html};
use serde_json::{Map, Value};
use url::Url;

use super::{absolute_url, slug, Cursor, DetailInfo, JobSource};
use crate::error::ParseFailure;
use crate::extractor::{
    card_text, element_text, find_in, first_matching, first_present, listings_from_array,
    next_data, selector, text_in, Extractor,
};
use crate::models::{JobDraft, JobType, RawListing, SearchQuery, WorkArrangement};
use crate::normalizer::{
    at_path, detect_arrangement, first_text, labelled_location, normalize_date, object,
    prefixed_id, salary_from_value, text, UNKNOWN_COMPANY,
};

pub const BASE_URL: &str = "https://id.jobstreet.com";
const PREFIX: &str = "jobstreet";
const MAX_PAGE: usize = 20;
const FALLBACK_LOCATION: &str = "Indonesia";

const WORKTYPE_CODES: &[(JobType, &str)] = &[
    (JobType::FullTime, "242"),
    (JobType::PartTime, "243"),
    (JobType::Contract, "244"),
    (JobType::Temporary, "244"),
    (JobType::Internship, "245"),
];

const DATERANGE_CODES: &[(u32, &str)] = &[(1, "1"), (3, "3"), (7, "7"), (14, "14"), (30, "31")];

const CARD_SELECTORS: &[&str] = &[
    r#"article[data-automation="normalJob"]"#,
    r#"div[data-automation="normalJob"]"#,
    r#"article[data-card-type="JobCard"]"#,
];

static JOB_PATH_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/job/(\d+)").expect("valid job path pattern"));
static TRAILING_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-(\d+)$").expect("valid trailing id pattern"));

pub fn worktype_code(job_type: JobType) -> Option<&'static str> {
    WORKTYPE_CODES
        .iter()
        .find(|(t, _)| *t == job_type)
        .map(|(_, code)| *code)
}

/// Smallest window that still covers `hours`; `None` past the largest.
pub fn daterange_code(hours: u32) -> Option<&'static str> {
    let days = f64::from(hours) / 24.0;
    DATERANGE_CODES
        .iter()
        .find(|(threshold, _)| days <= f64::from(*threshold))
        .map(|(_, code)| *code)
}

pub struct JobStreet {
    extractor: Extractor,
}

impl Default for JobStreet {
    fn default() -> Self {
        Self::new()
    }
}

impl JobStreet {
    pub fn new() -> Self {
        JobStreet {
            extractor: Extractor::new()
                .with_strategy("jobstreet/next_data", next_data_listings)
                .with_strategy("jobstreet/html_cards", html_cards),
        }
    }
}

impl JobSource for JobStreet {
    fn name(&self) -> &'static str {
        PREFIX
    }

    fn accept_language(&self) -> &'static str {
        "en-US,en;q=0.9,id;q=0.8"
    }

    fn page_timeout(&self) -> Duration {
        Duration::from_secs(15)
    }

    fn detail_timeout(&self) -> Duration {
        Duration::from_secs(10)
    }

    fn page_url(&self, query: &SearchQuery, cursor: Cursor) -> Result<Url, url::ParseError> {
        let keyword_slug = slug(&query.keywords().to_lowercase());
        let mut path = format!("{}/id/{}-jobs", BASE_URL, urlencoding::encode(&keyword_slug));
        if !query.location().is_empty() {
            path.push_str(&format!(
                "/in-{}",
                urlencoding::encode(&slug(query.location()))
            ));
        }

        let mut url = Url::parse(&path)?;
        {
            let mut params = url.query_pairs_mut();
            params.append_pair("page", &cursor.page.to_string());
            if let Some(code) = worktype_code(query.job_type()) {
                params.append_pair("worktype", code);
            }
            if query.remote_only() {
                params.append_pair("workarrangement", "remote");
            }
            if let Some(code) = query.max_age_hours().and_then(daterange_code) {
                params.append_pair("daterange", code);
            }
        }
        Ok(url)
    }

    fn within_ceiling(&self, cursor: Cursor) -> bool {
        cursor.page <= MAX_PAGE
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
        let native = ["id", "jobId", "listingId"]
            .iter()
            .find_map(|key| raw.get(*key).filter(|v| text(Some(*v)).is_some()));
        let id = prefixed_id(PREFIX, native)?;
        let native = text(native)?;
        let title = first_text(raw, &["title", "jobTitle"])?;

        let advertiser = object(raw.get("advertiser"));
        let mut company = advertiser.and_then(|a| text(a.get("description")));
        let mut company_url = advertiser
            .and_then(|a| text(a.get("id")))
            .map(|id| format!("{}/en/companies/{}", BASE_URL, id));
        if company.is_none() {
            company = text(raw.get("companyName"));
            let meta_id = object(raw.get("companyMeta")).and_then(|m| text(m.get("id")));
            if let Some(meta_id) = meta_id {
                company_url = Some(format!("{}/en/companies/{}", BASE_URL, meta_id));
            }
        }

        let date_posted = first_text(raw, &["listingDate", "postedAt", "createdAt"])
            .and_then(|d| normalize_date(Some(&Value::String(d)), now))
            .or_else(|| normalize_date(raw.get("listingDateDisplay"), now));

        let job_url = first_text(raw, &["jobUrl", "job_url"])
            .and_then(|href| absolute_url(BASE_URL, &href))
            .unwrap_or_else(|| format!("{}/en/job/{}", BASE_URL, native));

        Some(JobDraft {
            id,
            title,
            company: company.unwrap_or_else(|| UNKNOWN_COMPANY.to_string()),
            company_url,
            location: labelled_location(raw, FALLBACK_LOCATION),
            salary: salary_from_value(raw.get("salary"), raw.get("salaryLabel")),
            date_posted,
            job_url,
            description: None,
            work_arrangement: arrangement_of(raw),
            source_keyword: Some(query.keywords().to_string()),
        })
    }

    fn parse_detail(&self, body: &str) -> DetailInfo {
        let mut info = DetailInfo::default();

        match next_data(body) {
            Ok(data) => {
                if let Some(page_props) = at_path(&data, &["props", "pageProps"]) {
                    let detail = first_present(page_props, &[&["jobDetail"], &["job"]])
                        .unwrap_or(page_props);
                    info.description = first_present(
                        detail,
                        &[&["description"], &["jobAdDetails", "description"], &["content"]],
                    )
                    .and_then(|v| text(Some(v)));
                    info.work_arrangement = detail.as_object().and_then(arrangement_of);
                }
            }
            Err(failure) => debug!("JobStreet detail island unusable: {}", failure),
        }

        if info.description.is_none() {
            info.description = description_block(body);
        }
        info
    }
}

fn arrangement_of(raw: &Map<String, Value>) -> Option<WorkArrangement> {
    let labels: Vec<String> = object(raw.get("workArrangements"))
        .and_then(|wa| wa.get("data"))
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| match item {
                    Value::Object(o) => text(o.get("label")),
                    other => text(Some(other)),
                })
                .collect()
        })
        .unwrap_or_default();
    let work_type = text(raw.get("workType"));
    let card_text = text(raw.get("cardText"));

    detect_arrangement(
        None,
        labels.iter().map(String::as_str).chain(work_type.as_deref()),
        card_text.as_deref(),
    )
}

fn next_data_listings(body: &str) -> Result<Vec<RawListing>, ParseFailure> {
    let data = next_data(body)?;
    let page_props = at_path(&data, &["props", "pageProps"])
        .ok_or(ParseFailure::MissingListings)?;
    let search = first_present(page_props, &[&["search"], &["searchResults"]])
        .unwrap_or(page_props);
    let mut listings = first_present(search, &[&["data"], &["jobs"]])
        .ok_or(ParseFailure::MissingListings)?;
    if let Some(inner) = listings.as_object().and_then(|o| o.get("data")) {
        listings = inner;
    }

    let found = listings_from_array(listings);
    if found.is_empty() {
        return Err(ParseFailure::MissingListings);
    }
    Ok(found)
}

fn html_cards(body: &str) -> Result<Vec<RawListing>, ParseFailure> {
    let document = Html::parse_document(body);
    let cards = first_matching(&document, CARD_SELECTORS)?;
    Ok(cards.into_iter().filter_map(parse_card).collect())
}

fn native_id_from_href(href: &str) -> Option<String> {
    let path = href.split('?').next().unwrap_or(href);
    JOB_PATH_ID
        .captures(path)
        .or_else(|| TRAILING_ID.captures(path))
        .map(|caps| caps[1].to_string())
}

/// One server-rendered card; kept only when both title and id are found.
fn parse_card(card: ElementRef<'_>) -> Option<RawListing> {
    let title_el = find_in(card, &[r#"a[data-automation="jobTitle"]"#, "h3", "h2"])?;
    let title = element_text(title_el);
    if title.is_empty() {
        return None;
    }

    let href = title_el
        .value()
        .attr("href")
        .or_else(|| {
            find_in(title_el, &["a[href]"]).and_then(|link| link.value().attr("href"))
        })?;
    let id = native_id_from_href(href)?;

    let mut raw = RawListing::new();
    raw.insert("id".into(), Value::String(id));
    raw.insert("title".into(), Value::String(title));
    if let Some(url) = absolute_url(BASE_URL, href) {
        raw.insert("jobUrl".into(), Value::String(url));
    }

    let fields: [(&str, &[&str]); 3] = [
        (
            "companyName",
            &[r#"a[data-automation="jobCompany"]"#, r#"span[data-automation="jobCompany"]"#],
        ),
        (
            "location",
            &[r#"a[data-automation="jobLocation"]"#, r#"span[data-automation="jobLocation"]"#],
        ),
        ("salaryLabel", &[r#"span[data-automation="jobSalary"]"#]),
    ];
    for (key, patterns) in fields {
        if let Some(value) = text_in(card, patterns) {
            raw.insert(key.into(), Value::String(value));
        }
    }

    if let Some(date_el) = find_in(card, &["time", r#"span[data-automation="jobListingDate"]"#]) {
        if let Some(datetime) = date_el.value().attr("datetime") {
            raw.insert("listingDate".into(), Value::String(datetime.to_string()));
        }
        raw.insert(
            "listingDateDisplay".into(),
            Value::String(element_text(date_el)),
        );
    }

    raw.insert("cardText".into(), Value::String(card_text(card)));
    Some(raw)
}

fn description_block(body: &str) -> Option<String> {
    let document = Html::parse_document(body);

    if let Some(block) = find_in(
        document.root_element(),
        &[r#"div[data-automation="jobAdDetails"]"#],
    ) {
        return Some(block.html());
    }

    let divs = selector("div").ok()?;
    if let Some(block) = document.select(&divs).find(|div| {
        div.value()
            .attr("class")
            .is_some_and(|class| class.to_lowercase().contains("job-description"))
    }) {
        return Some(block.html());
    }

    find_in(
        document.root_element(),
        &[r#"div[data-automation="jobDescription"]"#],
    )
    .map(|block| block.html())
}

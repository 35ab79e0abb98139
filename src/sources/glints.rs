use std::time::Duration;

use chrono::NaiveDateTime;
use log::debug;
use scraper::{ElementRef, Html};
use serde_json::{json, Value};
use url::Url;

use super::{absolute_url, Cursor, DetailInfo, JobSource};
use crate::error::ParseFailure;
use crate::extractor::{
    element_text, find_in, first_matching, first_present, listings_from_array, next_data, text_in,
    Extractor,
};
use crate::models::{JobDraft, JobType, RawListing, SearchQuery};
use crate::normalizer::{
    amount, arrangement_from_code, format_salary, hierarchical_location, normalize_date, object,
    prefixed_id, text, UNKNOWN_COMPANY,
};

pub const BASE_URL: &str = "https://glints.com";
const EXPLORE_PATH: &str = "/id/opportunities/jobs/explore";
const PREFIX: &str = "glints";
const DEFAULT_COUNTRY: &str = "ID";
const FALLBACK_LOCATION: &str = "Indonesia";
const MAX_PAGE: usize = 10;

const JOBS_IN_PAGE_PATHS: &[&[&str]] = &[
    &["data", "searchJobsV3", "jobsInPage"],
    &["props", "pageProps", "data", "searchJobsV3", "jobsInPage"],
    &["props", "pageProps", "initialData", "searchJobsV3", "jobsInPage"],
    &["props", "pageProps", "searchJobsV3", "jobsInPage"],
    &["props", "pageProps", "initialJobs", "jobsInPage"],
];

const CARD_SELECTORS: &[&str] = &[
    "div[data-gtm-job-id]",
    r#"div[class*="CompactOpportunityCard"]"#,
    r#"div[class*="JobCard"]"#,
];

pub struct Glints {
    extractor: Extractor,
}

impl Default for Glints {
    fn default() -> Self {
        Self::new()
    }
}

impl Glints {
    pub fn new() -> Self {
        Glints {
            extractor: Extractor::new()
                .with_strategy("glints/search_jobs", search_jobs)
                .with_strategy("glints/opportunity_cards", opportunity_cards),
        }
    }
}

impl JobSource for Glints {
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

    /// A two-letter location is read as the country code; anything else is
    /// sent as a location name within the default country.
    fn page_url(&self, query: &SearchQuery, cursor: Cursor) -> Result<Url, url::ParseError> {
        let location = query.location();
        let is_country_code =
            location.len() == 2 && location.chars().all(|c| c.is_ascii_alphabetic());

        let mut url = Url::parse(&format!("{}{}", BASE_URL, EXPLORE_PATH))?;
        {
            let mut params = url.query_pairs_mut();
            params.append_pair("keyword", query.keywords());
            if is_country_code {
                params.append_pair("country", &location.to_uppercase());
            } else {
                params.append_pair("country", DEFAULT_COUNTRY);
                if !location.is_empty() {
                    params.append_pair("locationName", location);
                }
            }
            if query.remote_only() {
                params.append_pair("workArrangementOptions", "REMOTE");
            }
            params.append_pair("page", &cursor.page.to_string());
        }
        let unsupported = query.job_type() != JobType::None || query.max_age_hours().is_some();
        if cursor.page == 1 && unsupported {
            debug!("Glints search ignores job type and posting age filters");
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
        let native = text(raw.get("id"))?;
        let id = prefixed_id(PREFIX, raw.get("id"))?;
        let title = text(raw.get("title"))?;

        let company = object(raw.get("company"));
        let company_name = company
            .and_then(|c| text(c.get("name")))
            .unwrap_or_else(|| UNKNOWN_COMPANY.to_string());
        let company_url = company
            .and_then(|c| text(c.get("id")))
            .map(|company_id| format!("{}/id/companies/{}", BASE_URL, company_id));

        Some(JobDraft {
            id,
            title,
            company: company_name,
            company_url,
            location: hierarchical_location(
                raw.get("location"),
                raw.get("country"),
                FALLBACK_LOCATION,
            ),
            salary: salary(raw),
            date_posted: normalize_date(raw.get("createdAt"), now),
            job_url: format!("{}/id/opportunities/jobs/{}", BASE_URL, native),
            description: synthesized_description(raw),
            work_arrangement: arrangement_from_code(raw.get("workArrangementOption")),
            source_keyword: Some(query.keywords().to_string()),
        })
    }

    fn has_details(&self) -> bool {
        false
    }

    fn parse_detail(&self, _body: &str) -> DetailInfo {
        DetailInfo::default()
    }
}

/// Estimate when it carries a minimum, otherwise the first posted salary band.
fn salary(raw: &RawListing) -> Option<String> {
    if let Some(estimate) = object(raw.get("salaryEstimate")) {
        if let Some(min) = amount(estimate.get("minAmount")).filter(|min| *min > 0) {
            let currency = text(estimate.get("currencyCode"))
                .or_else(|| text(estimate.get("CurrencyCode")));
            return format_salary(
                Some(min),
                amount(estimate.get("maxAmount")),
                currency.as_deref(),
            );
        }
    }

    let band = raw
        .get("salaries")
        .and_then(Value::as_array)
        .and_then(|bands| bands.first())
        .and_then(Value::as_object)?;
    let currency = text(band.get("currencyCode"));
    format_salary(
        amount(band.get("minAmount")),
        amount(band.get("maxAmount")),
        currency.as_deref(),
    )
    .or_else(|| text(band.get("label")))
}

fn synthesized_description(raw: &RawListing) -> Option<String> {
    let mut parts = Vec::new();

    if let Some(job_type) = text(raw.get("type")) {
        parts.push(format!("Type: {}", job_type));
    }
    if let Some(education) = text(raw.get("educationLevel")) {
        parts.push(format!("Education: {}", education));
    }
    match (
        amount(raw.get("minYearsOfExperience")),
        amount(raw.get("maxYearsOfExperience")),
    ) {
        (Some(min), Some(max)) => parts.push(format!("Experience: {}-{} years", min, max)),
        (Some(min), None) => parts.push(format!("Experience: {}+ years", min)),
        _ => {}
    }

    let skills: Vec<String> = raw
        .get("skills")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("skill").and_then(|s| text(s.get("name"))))
                .collect()
        })
        .unwrap_or_default();
    if !skills.is_empty() {
        parts.push(format!("Skills: {}", skills.join(", ")));
    }

    if let Some(industry) = object(raw.get("company"))
        .and_then(|c| c.get("industry"))
        .and_then(|i| text(i.get("name")))
    {
        parts.push(format!("Industry: {}", industry));
    }

    (!parts.is_empty()).then(|| parts.join(" | "))
}

fn search_jobs(body: &str) -> Result<Vec<RawListing>, ParseFailure> {
    let trimmed = body.trim_start();
    let root = if trimmed.starts_with('{') {
        serde_json::from_str::<Value>(trimmed)
            .map_err(|e| ParseFailure::MalformedJson(e.to_string()))?
    } else {
        next_data(body)?
    };

    let jobs = first_present(&root, JOBS_IN_PAGE_PATHS)
        .ok_or(ParseFailure::MissingListings)?;
    let listings = listings_from_array(jobs);
    if listings.is_empty() {
        return Err(ParseFailure::MissingListings);
    }
    Ok(listings)
}

fn opportunity_cards(body: &str) -> Result<Vec<RawListing>, ParseFailure> {
    let document = Html::parse_document(body);
    let cards = first_matching(&document, CARD_SELECTORS)?;
    Ok(cards.into_iter().filter_map(parse_card).collect())
}

/// Cards link to `/opportunities/jobs/{slug}/{id}`; the id is the last segment.
fn parse_card(card: ElementRef<'_>) -> Option<RawListing> {
    let link = find_in(card, &[r#"a[href*="/opportunities/jobs/"]"#]);
    let href = link.and_then(|a| a.value().attr("href"));
    let id = card
        .value()
        .attr("data-gtm-job-id")
        .map(str::to_string)
        .or_else(|| {
            href.map(|h| h.split('?').next().unwrap_or(h))
                .and_then(|path| path.trim_end_matches('/').rsplit('/').next())
                .filter(|segment| !segment.is_empty() && *segment != "jobs")
                .map(str::to_string)
        })?;

    let title = text_in(card, &["h2", "h3"]).or_else(|| link.map(element_text))?;
    if title.is_empty() {
        return None;
    }

    let mut raw = json!({"id": id, "title": title});
    if let Some(href) = href.and_then(|h| absolute_url(BASE_URL, h)) {
        raw["jobUrl"] = Value::String(href);
    }
    if let Some(company) = find_in(card, &[r#"a[href*="/companies/"]"#]) {
        let company_id = company
            .value()
            .attr("href")
            .and_then(|h| h.trim_end_matches('/').rsplit('/').next())
            .map(str::to_string);
        raw["company"] = json!({"name": element_text(company), "id": company_id});
    }
    if let Some(location) = text_in(card, &[r#"[class*="Location"]"#, r#"[class*="location"]"#]) {
        raw["location"] = Value::String(location);
    }
    if let Some(salary) = text_in(card, &[r#"[class*="Salary"]"#, r#"[class*="salary"]"#]) {
        raw["salaries"] = json!([{"label": salary}]);
    }

    raw.as_object().cloned()
}

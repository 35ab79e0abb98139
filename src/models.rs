use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::QueryError;

/// Upper bound on `results_wanted`, matching what one search endpoint serves per query.
pub const MAX_RESULTS_WANTED: usize = 100;
pub const DEFAULT_RESULTS_WANTED: usize = 25;

pub type RawListing = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    FullTime,
    PartTime,
    Internship,
    Contract,
    Temporary,
    #[default]
    None,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::FullTime => "full_time",
            JobType::PartTime => "part_time",
            JobType::Internship => "internship",
            JobType::Contract => "contract",
            JobType::Temporary => "temporary",
            JobType::None => "none",
        }
    }
}

impl FromStr for JobType {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "full_time" | "fulltime" => Ok(JobType::FullTime),
            "part_time" | "parttime" => Ok(JobType::PartTime),
            "internship" | "intern" => Ok(JobType::Internship),
            "contract" => Ok(JobType::Contract),
            "temporary" | "temp" => Ok(JobType::Temporary),
            "" | "none" | "any" => Ok(JobType::None),
            _ => Err(QueryError::UnknownJobType(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkArrangement {
    Remote,
    Hybrid,
    #[default]
    Onsite,
}

impl WorkArrangement {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkArrangement::Remote => "remote",
            WorkArrangement::Hybrid => "hybrid",
            WorkArrangement::Onsite => "onsite",
        }
    }
}

impl fmt::Display for WorkArrangement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    keywords: String,
    location: String,
    job_type: JobType,
    remote_only: bool,
    max_age_hours: Option<u32>,
    results_wanted: usize,
    known_ids: HashSet<String>,
}

impl SearchQuery {
    pub fn builder(keywords: impl Into<String>) -> SearchQueryBuilder {
        SearchQueryBuilder {
            keywords: keywords.into(),
            location: String::new(),
            job_type: JobType::None,
            remote_only: false,
            max_age_hours: None,
            results_wanted: DEFAULT_RESULTS_WANTED,
            known_ids: HashSet::new(),
        }
    }

    pub fn keywords(&self) -> &str {
        &self.keywords
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn job_type(&self) -> JobType {
        self.job_type
    }

    pub fn remote_only(&self) -> bool {
        self.remote_only
    }

    pub fn max_age_hours(&self) -> Option<u32> {
        self.max_age_hours
    }

    pub fn results_wanted(&self) -> usize {
        self.results_wanted
    }

    pub fn known_ids(&self) -> &HashSet<String> {
        &self.known_ids
    }
}

#[derive(Debug, Clone)]
pub struct SearchQueryBuilder {
    keywords: String,
    location: String,
    job_type: JobType,
    remote_only: bool,
    max_age_hours: Option<u32>,
    results_wanted: usize,
    known_ids: HashSet<String>,
}

impl SearchQueryBuilder {
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn job_type(mut self, job_type: JobType) -> Self {
        self.job_type = job_type;
        self
    }

    pub fn remote_only(mut self, remote_only: bool) -> Self {
        self.remote_only = remote_only;
        self
    }

    pub fn max_age_hours(mut self, hours: u32) -> Self {
        self.max_age_hours = Some(hours);
        self
    }

    pub fn results_wanted(mut self, wanted: usize) -> Self {
        self.results_wanted = wanted;
        self
    }

    pub fn known_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(self) -> Result<SearchQuery, QueryError> {
        let keywords = self.keywords.trim().to_string();
        if keywords.is_empty() {
            return Err(QueryError::EmptyKeywords);
        }
        if self.results_wanted == 0 || self.results_wanted > MAX_RESULTS_WANTED {
            return Err(QueryError::ResultsWantedOutOfRange {
                wanted: self.results_wanted,
                max: MAX_RESULTS_WANTED,
            });
        }
        if self.max_age_hours == Some(0) {
            return Err(QueryError::ZeroMaxAge);
        }

        Ok(SearchQuery {
            keywords,
            location: self.location.trim().to_string(),
            job_type: self.job_type,
            remote_only: self.remote_only,
            max_age_hours: self.max_age_hours,
            results_wanted: self.results_wanted,
            known_ids: self.known_ids,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedJob {
    pub id: String,
    pub title: String,
    pub company: String,
    pub company_url: Option<String>,
    pub location: String,
    pub salary: Option<String>,
    pub date_posted: Option<String>,
    pub job_url: String,
    pub description: Option<String>,
    pub work_arrangement: WorkArrangement,
    pub source_keyword: Option<String>,
}

/// A normalized listing that may still be enriched by the detail fetcher.
///
/// `work_arrangement` stays `None` while undetermined so enrichment can fill
/// it without overriding what the listing itself said.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDraft {
    pub id: String,
    pub title: String,
    pub company: String,
    pub company_url: Option<String>,
    pub location: String,
    pub salary: Option<String>,
    pub date_posted: Option<String>,
    pub job_url: String,
    pub description: Option<String>,
    pub work_arrangement: Option<WorkArrangement>,
    pub source_keyword: Option<String>,
}

impl JobDraft {
    pub fn finish(self) -> NormalizedJob {
        NormalizedJob {
            id: self.id,
            title: self.title,
            company: self.company,
            company_url: self.company_url,
            location: self.location,
            salary: self.salary,
            date_posted: self.date_posted,
            job_url: self.job_url,
            description: self.description,
            work_arrangement: self.work_arrangement.unwrap_or_default(),
            source_keyword: self.source_keyword,
        }
    }
}

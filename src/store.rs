use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::models::NormalizedJob;

pub trait JobStore {
    fn existing_ids(&self) -> Result<HashSet<String>, StoreError>;

    /// Inserts or replaces by id. True when the id was new.
    fn upsert(&mut self, job: &NormalizedJob, query_keywords: &str) -> Result<bool, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredJob {
    #[serde(flatten)]
    pub job: NormalizedJob,
    pub query_keywords: String,
    pub first_seen: String,
    pub last_seen: String,
}

impl StoredJob {
    fn new(job: &NormalizedJob, query_keywords: &str) -> Self {
        let now = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        StoredJob {
            job: job.clone(),
            query_keywords: query_keywords.to_string(),
            first_seen: now.clone(),
            last_seen: now,
        }
    }

    fn refresh(&mut self, job: &NormalizedJob, query_keywords: &str) {
        let first_seen = std::mem::take(&mut self.first_seen);
        *self = StoredJob::new(job, query_keywords);
        self.first_seen = first_seen;
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    jobs: HashMap<String, StoredJob>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&StoredJob> {
        self.jobs.get(id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

impl JobStore for MemoryStore {
    fn existing_ids(&self) -> Result<HashSet<String>, StoreError> {
        Ok(self.jobs.keys().cloned().collect())
    }

    fn upsert(&mut self, job: &NormalizedJob, query_keywords: &str) -> Result<bool, StoreError> {
        match self.jobs.get_mut(&job.id) {
            Some(stored) => {
                stored.refresh(job, query_keywords);
                Ok(false)
            }
            None => {
                self.jobs
                    .insert(job.id.clone(), StoredJob::new(job, query_keywords));
                Ok(true)
            }
        }
    }
}

#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    jobs: BTreeMap<String, StoredJob>,
}

impl JsonFileStore {
    /// Opens `path`. A missing or unreadable file starts an empty store.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            info!("No job store at {:?}. Starting fresh.", path);
            return JsonFileStore {
                path,
                jobs: BTreeMap::new(),
            };
        }

        let jobs: BTreeMap<String, StoredJob> = match fs::read_to_string(&path)
            .map_err(StoreError::from)
            .and_then(|content| serde_json::from_str(&content).map_err(StoreError::from))
        {
            Ok(jobs) => jobs,
            Err(e) => {
                error!("Failed to load job store {:?}: {}. Starting fresh.", path, e);
                BTreeMap::new()
            }
        };
        info!("Loaded {} stored jobs from {:?}", jobs.len(), path);
        JsonFileStore { path, jobs }
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    fn save(&self) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(&self.jobs)?;
        let mut file: File = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

impl JobStore for JsonFileStore {
    fn existing_ids(&self) -> Result<HashSet<String>, StoreError> {
        Ok(self.jobs.keys().cloned().collect())
    }

    fn upsert(&mut self, job: &NormalizedJob, query_keywords: &str) -> Result<bool, StoreError> {
        let inserted = match self.jobs.get_mut(&job.id) {
            Some(stored) => {
                stored.refresh(job, query_keywords);
                false
            }
            None => {
                self.jobs
                    .insert(job.id.clone(), StoredJob::new(job, query_keywords));
                true
            }
        };
        self.save()?;
        Ok(inserted)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StoreSummary {
    pub inserted: usize,
    pub updated: usize,
}

pub fn store_all<S: JobStore + ?Sized>(
    store: &mut S,
    jobs: &[NormalizedJob],
    query_keywords: &str,
) -> Result<StoreSummary, StoreError> {
    let mut summary = StoreSummary::default();
    for job in jobs {
        if store.upsert(job, query_keywords)? {
            summary.inserted += 1;
        } else {
            summary.updated += 1;
        }
    }
    info!(
        "Stored {} jobs for '{}': {} new, {} updated",
        jobs.len(),
        query_keywords,
        summary.inserted,
        summary.updated
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WorkArrangement;

    fn job(id: &str, title: &str) -> NormalizedJob {
        NormalizedJob {
            id: id.into(),
            title: title.into(),
            company: "Acme".into(),
            company_url: None,
            location: "Jakarta".into(),
            salary: None,
            date_posted: Some("2024-05-18".into()),
            job_url: format!("https://www.linkedin.com/jobs/view/{}", id),
            description: None,
            work_arrangement: WorkArrangement::Hybrid,
            source_keyword: Some("rust".into()),
        }
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("job_scraper_{}_{}.json", name, std::process::id()))
    }

    #[test]
    fn memory_store_counts_inserts_and_updates() {
        let mut store = MemoryStore::new();
        let jobs = [job("linkedin_1", "A"), job("linkedin_2", "B")];
        let summary = store_all(&mut store, &jobs, "rust").unwrap();
        assert_eq!(summary, StoreSummary { inserted: 2, updated: 0 });

        let summary = store_all(&mut store, &[job("linkedin_2", "B v2")], "rust jobs").unwrap();
        assert_eq!(summary, StoreSummary { inserted: 0, updated: 1 });
        assert_eq!(store.len(), 2);
        let stored = store.get("linkedin_2").unwrap();
        assert_eq!(stored.job.title, "B v2");
        assert_eq!(stored.query_keywords, "rust jobs");
        assert_eq!(
            store.existing_ids().unwrap(),
            HashSet::from(["linkedin_1".to_string(), "linkedin_2".to_string()])
        );
    }

    #[test]
    fn json_store_survives_reopen() {
        let path = temp_path("reopen");
        let _ = fs::remove_file(&path);

        let mut store = JsonFileStore::open(&path);
        assert!(store.is_empty());
        assert!(store.upsert(&job("glints_a", "Backend"), "backend").unwrap());

        let reopened = JsonFileStore::open(&path);
        assert_eq!(reopened.len(), 1);
        assert!(reopened.existing_ids().unwrap().contains("glints_a"));

        let content = fs::read_to_string(&path).unwrap();
        let raw: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(raw["glints_a"]["work_arrangement"], "hybrid");
        assert_eq!(raw["glints_a"]["query_keywords"], "backend");
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn corrupt_store_starts_empty() {
        let path = temp_path("corrupt");
        fs::write(&path, "{ not json").unwrap();
        assert!(JsonFileStore::open(&path).is_empty());
        fs::remove_file(&path).unwrap();
    }
}

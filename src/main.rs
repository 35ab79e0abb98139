use job_scraper_lib::delay_manager::{self, Pacer, ThreadPacer};
use job_scraper_lib::{input_loader, logger};
use job_scraper_lib::{
    store_all, Crawler, JobStore, JsonFileStore, LogSink, NormalizedJob, ResultWriter,
};

use log::{error, info, warn};
use std::error::Error;
use std::io::Write;
use std::path::Path;

const QUERY_FILES: [&str; 2] = ["queries.csv", "queries.xlsx"];
const STORE_FILE: &str = "jobs.json";
const OUTPUT_CSV: &str = "results.csv";

fn main() -> Result<(), Box<dyn Error>> {
    logger::init();
    info!("Starting job scraper...");

    // 1. Load queries
    let Some(input_file) = QUERY_FILES.iter().find(|f| Path::new(f).exists()) else {
        error!(
            "No query file found. Create queries.csv with headers: Source, Keywords, Location, Job Type, Remote, Hours Old, Results"
        );
        return Ok(());
    };
    let records = input_loader::load_records(input_file)?;
    if records.is_empty() {
        error!("No query rows found in {}", input_file);
        return Ok(());
    }

    // 2. Open the job store and the results file
    let mut store = JsonFileStore::open(STORE_FILE);
    let mut results = ResultWriter::append(OUTPUT_CSV)?;
    let pacer = ThreadPacer;

    let total = records.len();
    let mut total_new = 0;

    for (i, record) in records.iter().enumerate() {
        let kind = match record.source_kind() {
            Ok(kind) => kind,
            Err(e) => {
                warn!("Skipping row {}: {}", i + 1, e);
                continue;
            }
        };
        let known_ids = match store.existing_ids() {
            Ok(ids) => ids,
            Err(e) => {
                error!("Could not read stored job ids: {}", e);
                Default::default()
            }
        };
        let query = match record.to_query(known_ids) {
            Ok(query) => query,
            Err(e) => {
                warn!("Skipping row {}: {}", i + 1, e);
                continue;
            }
        };

        info!("Processing {} / {} : '{}' on {}", i + 1, total, query.keywords(), kind);
        if i > 0 {
            pacer.pause(delay_manager::random_page_delay());
        }

        let crawler = match Crawler::for_source(kind) {
            Ok(crawler) => crawler,
            Err(e) => {
                error!("Could not set up {} client: {}", kind, e);
                continue;
            }
        };
        let outcome = crawler.crawl(&query, Some(&LogSink));
        info!("Crawl ended: {}", outcome.stop);

        total_new += record_outcome(
            &mut store,
            &mut results,
            kind.as_str(),
            query.keywords(),
            &outcome.jobs,
        );
    }

    info!("Scraping completed. {} new jobs stored in {}.", total_new, STORE_FILE);
    Ok(())
}

// Store and export one row's jobs; failures are logged and the batch goes on.
fn record_outcome<S: JobStore, W: Write>(
    store: &mut S,
    results: &mut ResultWriter<W>,
    source: &str,
    keywords: &str,
    jobs: &[NormalizedJob],
) -> usize {
    let inserted = match store_all(store, jobs, keywords) {
        Ok(summary) => summary.inserted,
        Err(e) => {
            error!("Failed to store jobs for '{}': {}", keywords, e);
            0
        }
    };
    if let Err(e) = results.write_jobs(source, keywords, jobs) {
        error!("Failed to write results for '{}': {}", keywords, e);
    }
    inserted
}

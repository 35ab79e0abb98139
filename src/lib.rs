pub mod async_crawler;
pub mod crawl_state;
pub mod crawler;
pub mod delay_manager;
pub mod detail;
pub mod error;
pub mod export;
pub mod extractor;
pub mod fetcher;
pub mod input_loader;
pub mod logger;
pub mod models;
pub mod normalizer;
pub mod progress;
pub mod sources;
pub mod store;

#[cfg(test)]
mod testing;

// Exporting types for convenience
pub use async_crawler::AsyncCrawler;
pub use crawl_state::{CrawlOptions, CrawlOutcome, StopReason};
pub use crawler::Crawler;
pub use error::{DetailError, FetchError, InputError, ParseFailure, QueryError, StoreError};
pub use export::ResultWriter;
pub use extractor::Extractor;
pub use input_loader::QueryRecord;
pub use models::{JobType, NormalizedJob, SearchQuery, WorkArrangement};
pub use progress::{LogSink, ProgressEvent, ProgressSink};
pub use sources::{JobSource, SourceKind};
pub use store::{store_all, JobStore, JsonFileStore, MemoryStore};

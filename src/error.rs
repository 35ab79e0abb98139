use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("keywords must not be empty")]
    EmptyKeywords,

    #[error("results wanted must be between 1 and {max}, got {wanted}")]
    ResultsWantedOutOfRange { wanted: usize, max: usize },

    #[error("max result age must be a positive number of hours")]
    ZeroMaxAge,

    #[error("unknown job type: {0}")]
    UnknownJobType(String),

    #[error("unknown source: {0}")]
    UnknownSource(String),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("invalid request URL: {0}")]
    Url(#[from] url::ParseError),
}

impl FetchError {
    pub(crate) fn from_reqwest(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else {
            FetchError::Request {
                url: url.to_string(),
                source,
            }
        }
    }
}

/// Why an extraction tier produced nothing. Caught at the tier boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    #[error("no structured data island in document")]
    MissingIsland,

    #[error("malformed structured data: {0}")]
    MalformedJson(String),

    #[error("no listings under any known key path")]
    MissingListings,

    #[error("no listing cards matched")]
    NoCards,

    #[error("bad selector {0}")]
    Selector(String),
}

#[derive(Debug, Error)]
pub enum DetailError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("detail page returned HTTP {0}")]
    Status(u16),

    #[error("detail page had no description or arrangement")]
    Empty,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("progress receiver is gone")]
    Closed,
}

#[derive(Debug, Error)]
pub enum InputError {
    #[error("input file {0} does not exist")]
    NotFound(String),

    #[error("could not read input: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse CSV input: {0}")]
    Csv(#[from] csv::Error),

    #[error("could not open workbook: {0}")]
    Excel(#[from] calamine::XlsxError),

    #[error("input header is missing a '{0}' column")]
    MissingColumn(&'static str),
}

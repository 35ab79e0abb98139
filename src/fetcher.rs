use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, USER_AGENT};
use url::Url;

use crate::error::FetchError;

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8";

/// Status and body of one GET. Every status is a response; only transport
/// problems are errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResponse {
    pub status: u16,
    pub body: String,
}

impl PageResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        PageResponse {
            status: 200,
            body: body.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        PageResponse {
            status,
            body: String::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }
}

pub trait PageFetcher: Send + Sync {
    fn get(&self, url: &Url, timeout: Duration) -> Result<PageResponse, FetchError>;
}

#[async_trait]
pub trait AsyncPageFetcher: Send + Sync {
    async fn get(&self, url: &Url, timeout: Duration) -> Result<PageResponse, FetchError>;
}

fn default_headers(accept_language: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("max-age=0"));
    headers.insert("upgrade-insecure-requests", HeaderValue::from_static("1"));
    if let Ok(value) = HeaderValue::from_str(accept_language) {
        headers.insert(ACCEPT_LANGUAGE, value);
    }
    headers
}

/// Blocking fetcher; one instance per crawl keeps the session cookies.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(accept_language: &str) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .default_headers(default_headers(accept_language))
            .cookie_store(true)
            .build()
            .map_err(FetchError::Client)?;
        Ok(HttpFetcher { client })
    }
}

impl PageFetcher for HttpFetcher {
    fn get(&self, url: &Url, timeout: Duration) -> Result<PageResponse, FetchError> {
        debug!("GET {}", url);
        let resp = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .map_err(|e| FetchError::from_reqwest(url.as_str(), e))?;

        let status = resp.status().as_u16();
        let body = resp
            .text()
            .map_err(|e| FetchError::from_reqwest(url.as_str(), e))?;
        Ok(PageResponse { status, body })
    }
}

pub struct AsyncHttpFetcher {
    client: reqwest::Client,
}

impl AsyncHttpFetcher {
    pub fn new(accept_language: &str) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .default_headers(default_headers(accept_language))
            .cookie_store(true)
            .build()
            .map_err(FetchError::Client)?;
        Ok(AsyncHttpFetcher { client })
    }
}

#[async_trait]
impl AsyncPageFetcher for AsyncHttpFetcher {
    async fn get(&self, url: &Url, timeout: Duration) -> Result<PageResponse, FetchError> {
        debug!("GET {}", url);
        let resp = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url.as_str(), e))?;

        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url.as_str(), e))?;
        Ok(PageResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_carry_fixed_agent_and_locale() {
        let headers = default_headers("en-US,en;q=0.9,id;q=0.8");
        assert_eq!(headers[USER_AGENT], BROWSER_USER_AGENT);
        assert_eq!(headers[ACCEPT_LANGUAGE], "en-US,en;q=0.9,id;q=0.8");
    }

    #[test]
    fn only_200_counts_as_success() {
        assert!(PageResponse::ok("<html/>").is_success());
        assert!(!PageResponse::status(204).is_success());
        assert!(PageResponse::status(429).is_rate_limited());
    }
}

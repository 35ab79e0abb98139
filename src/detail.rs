use log::debug;
use url::Url;

use crate::error::{DetailError, FetchError};
use crate::fetcher::{AsyncPageFetcher, PageFetcher, PageResponse};
use crate::sources::{DetailInfo, JobSource};

fn detail_url(job_url: &str) -> Result<Url, DetailError> {
    Url::parse(job_url)
        .map_err(|e| DetailError::Fetch(FetchError::Url(e)))
}

fn read_detail(
    source: &dyn JobSource,
    response: PageResponse,
) -> Result<DetailInfo, DetailError> {
    if !response.is_success() {
        return Err(DetailError::Status(response.status));
    }
    let info = source.parse_detail(&response.body);
    if info.is_empty() {
        return Err(DetailError::Empty);
    }
    Ok(info)
}

pub fn try_fetch_detail<F: PageFetcher + ?Sized>(
    fetcher: &F,
    source: &dyn JobSource,
    job_url: &str,
) -> Result<DetailInfo, DetailError> {
    let url = detail_url(job_url)?;
    let response = fetcher.get(&url, source.detail_timeout())?;
    read_detail(source, response)
}

/// Detail info, or nothing learned when the page is unusable.
pub fn fetch_detail<F: PageFetcher + ?Sized>(
    fetcher: &F,
    source: &dyn JobSource,
    job_url: &str,
) -> DetailInfo {
    try_fetch_detail(fetcher, source, job_url).unwrap_or_else(|e| {
        debug!("No detail for {}: {}", job_url, e);
        DetailInfo::default()
    })
}

pub async fn try_fetch_detail_async<F: AsyncPageFetcher + ?Sized>(
    fetcher: &F,
    source: &dyn JobSource,
    job_url: &str,
) -> Result<DetailInfo, DetailError> {
    let url = detail_url(job_url)?;
    let response = fetcher.get(&url, source.detail_timeout()).await?;
    read_detail(source, response)
}

pub async fn fetch_detail_async<F: AsyncPageFetcher + ?Sized>(
    fetcher: &F,
    source: &dyn JobSource,
    job_url: &str,
) -> DetailInfo {
    match try_fetch_detail_async(fetcher, source, job_url).await {
        Ok(info) => info,
        Err(e) => {
            debug!("No detail for {}: {}", job_url, e);
            DetailInfo::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::PageResponse;
    use crate::models::WorkArrangement;
    use crate::sources::{JobStreet, LinkedIn};
    use crate::testing::ScriptedFetcher;

    const VIEW: &str = "https://www.linkedin.com/jobs/view/3902";

    #[test]
    fn detail_page_is_parsed() {
        let fetcher = ScriptedFetcher::new().with_detail(
            VIEW,
            PageResponse::ok(
                r#"<div class="show-more-less-html__markup">Ship it</div>
                <div class="job-details-fit-level-preferences"><button>Remote</button></div>"#,
            ),
        );
        let info = try_fetch_detail(&fetcher, &LinkedIn::new(), VIEW).unwrap();
        assert_eq!(info.work_arrangement, Some(WorkArrangement::Remote));
        assert!(info.description.unwrap().contains("Ship it"));
        assert_eq!(fetcher.requested(), vec![VIEW.to_string()]);
    }

    #[test]
    fn failures_degrade_to_nothing_learned() {
        let fetcher = ScriptedFetcher::new()
            .with_detail(VIEW, PageResponse::status(500))
            .with_detail(
                "https://id.jobstreet.com/en/job/1",
                PageResponse::ok("<html><body>nothing here</body></html>"),
            );
        assert!(matches!(
            try_fetch_detail(&fetcher, &LinkedIn::new(), VIEW),
            Err(DetailError::Status(500))
        ));
        assert!(matches!(
            try_fetch_detail(&fetcher, &JobStreet::new(), "https://id.jobstreet.com/en/job/1"),
            Err(DetailError::Empty)
        ));
        assert!(matches!(
            try_fetch_detail(&fetcher, &LinkedIn::new(), "not a url"),
            Err(DetailError::Fetch(FetchError::Url(_)))
        ));
        assert!(fetch_detail(&fetcher, &LinkedIn::new(), VIEW).is_empty());
    }

    #[tokio::test]
    async fn async_detail_matches_blocking() {
        let fetcher = ScriptedFetcher::new().with_detail(
            VIEW,
            PageResponse::ok(r#"<div class="show-more-less-html__markup">Async</div>"#),
        );
        let info = fetch_detail_async(&fetcher, &LinkedIn::new(), VIEW).await;
        assert_eq!(info, fetch_detail(&fetcher, &LinkedIn::new(), VIEW));
        let missing = "https://www.linkedin.com/jobs/view/9";
        assert!(fetch_detail_async(&fetcher, &LinkedIn::new(), missing)
            .await
            .is_empty());
    }
}

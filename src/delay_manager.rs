use std::thread;
use std::time::Duration;

use log::info;
use rand::Rng;

/// Cooldown after an HTTP 429 before the same page is retried.
pub const RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(60);

/// Politeness delay bounds between result pages, in milliseconds.
pub const PAGE_DELAY_MIN_MS: u64 = 2_000;
pub const PAGE_DELAY_MAX_MS: u64 = 5_000;

/// Consecutive pages without a new job before a crawl gives up.
pub const STALE_PAGE_LIMIT: usize = 3;

pub fn random_page_delay() -> Duration {
    let mut rng = rand::thread_rng();
    Duration::from_millis(rng.gen_range(PAGE_DELAY_MIN_MS..=PAGE_DELAY_MAX_MS))
}

pub trait Pacer: Send + Sync {
    fn pause(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadPacer;

impl Pacer for ThreadPacer {
    fn pause(&self, duration: Duration) {
        info!("Waiting for {:.1} seconds...", duration.as_secs_f64());
        thread::sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_delay_stays_in_bounds() {
        for _ in 0..200 {
            let delay = random_page_delay();
            assert!(delay >= Duration::from_millis(PAGE_DELAY_MIN_MS));
            assert!(delay <= Duration::from_millis(PAGE_DELAY_MAX_MS));
        }
    }
}

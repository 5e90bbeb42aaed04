use crate::error::FetchError;
use async_trait::async_trait;

/// Monotonic transport counters, readable at any time.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FetchStats {
    pub requests: u64,
    pub successes: u64,
    /// Current adaptive delay in seconds.
    pub current_delay: f64,
}

/// The seam between the pipelines and whatever fetches pages.
///
/// The production implementation drives one real browser and serialises all
/// requests behind an adaptive rate limiter; tests substitute canned HTML.
/// Implementations own their retry policy: a returned error is final from
/// the caller's point of view.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> std::result::Result<String, FetchError>;

    fn stats(&self) -> FetchStats;
}

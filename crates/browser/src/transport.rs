//! The one real browser this process owns.
//!
//! Headless mode is fingerprinted by the site's anti-bot layer, so the
//! browser launches with a head against whatever display the host provides
//! (a virtual display is fine) and keeps its single tab positioned
//! off-screen. Exactly one browser lives for the process lifetime; fetches
//! are serial by design, so there is nothing to pool.

use crate::pacing::{AdaptiveDelay, PacingConfig};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use clutch_core::error::FetchError;
use clutch_core::transport::{FetchStats, Fetcher};
use futures::StreamExt;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Titles the anti-bot layer serves instead of real content.
const CHALLENGE_TITLES: &[&str] = &[
    "Just a moment...",
    "Attention Required! | Cloudflare",
    "Access denied",
    "DDoS-Guard",
];

const NOT_FOUND_TITLES: &[&str] = &["Page not found", "404"];

const RETRY_BASE: Duration = Duration::from_secs(10);
const RETRY_CAP: Duration = Duration::from_secs(120);
const RETRY_JITTER_MAX: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub pacing: PacingConfig,
    /// Wall-clock render wait after navigation, seconds.
    pub page_load_wait: f64,
    /// Extra wait before the single in-place re-extraction, seconds.
    pub challenge_wait: f64,
    pub max_retries: u32,
    /// Rendered documents shorter than this are challenge interstitials.
    pub min_content_chars: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            pacing: PacingConfig::default(),
            page_load_wait: 4.0,
            challenge_wait: 6.0,
            max_retries: 5,
            min_content_chars: 10_000,
        }
    }
}

struct Inner {
    browser: Browser,
    handler_task: JoinHandle<()>,
    page: Page,
    pacing: AdaptiveDelay,
    profile_dir: Option<TempDir>,
    closed: bool,
}

pub struct BrowserTransport {
    inner: Mutex<Inner>,
    config: TransportConfig,
    requests: AtomicU64,
    successes: AtomicU64,
    /// f64 bits of the current adaptive delay, for lock-free stats reads.
    delay_bits: AtomicU64,
}

impl BrowserTransport {
    /// Launches the browser, opens the single off-screen tab and confirms
    /// readiness. Fails with `TransportUnavailable` when the host cannot
    /// provide a display the browser accepts.
    pub async fn start(config: TransportConfig) -> Result<Self, FetchError> {
        let unavailable = |e: String| FetchError::TransportUnavailable(e);

        let profile_dir = TempDir::new().map_err(|e| unavailable(e.to_string()))?;
        let browser_config = BrowserConfig::builder()
            .with_head()
            .window_size(1920, 1080)
            .user_data_dir(profile_dir.path())
            .arg("--window-position=-2400,-2400")
            .arg("--disable-background-networking")
            .build()
            .map_err(unavailable)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        // the handler stream drives the CDP connection; it must be polled
        // for the browser's whole lifetime
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        info!("browser transport ready");

        let initial_delay = config.pacing.min_delay;
        Ok(Self {
            inner: Mutex::new(Inner {
                browser,
                handler_task,
                page,
                pacing: AdaptiveDelay::new(config.pacing.clone()),
                profile_dir: Some(profile_dir),
                closed: false,
            }),
            config,
            requests: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            delay_bits: AtomicU64::new(initial_delay.to_bits()),
        })
    }

    /// Idempotent teardown of the browser and its temporary profile.
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return;
        }
        inner.closed = true;
        if let Err(err) = inner.browser.close().await {
            warn!(%err, "browser close reported an error");
        }
        inner.handler_task.abort();
        // dropping the TempDir removes the on-disk profile
        inner.profile_dir.take();
        info!("browser transport closed");
    }

    async fn navigate(&self, page: &Page, url: &str) -> Result<String, FetchError> {
        let failed = |e: chromiumoxide::error::CdpError| FetchError::TransportFailed {
            url: url.to_owned(),
            reason: e.to_string(),
        };

        page.goto(url).await.map_err(failed)?;
        // bounded: a page that never settles still proceeds to extraction
        let _ = tokio::time::timeout(
            Duration::from_secs_f64(self.config.page_load_wait),
            page.wait_for_navigation(),
        )
        .await;
        tokio::time::sleep(Duration::from_secs_f64(self.config.page_load_wait)).await;

        let title: String = page
            .evaluate("document.title")
            .await
            .map_err(failed)?
            .into_value()
            .unwrap_or_default();
        if NOT_FOUND_TITLES.iter().any(|t| title.contains(t)) {
            return Err(FetchError::PageMissing {
                url: url.to_owned(),
            });
        }
        if CHALLENGE_TITLES.iter().any(|t| title.contains(t)) {
            return Err(FetchError::ChallengeServed {
                url: url.to_owned(),
            });
        }

        match self.extract(page, url).await {
            Err(FetchError::ContentTooShort { len, .. }) => {
                // one in-place retry; a still-short document is a challenge
                // that kept its normal title
                debug!(url, len, "short content; waiting for a re-extraction");
                tokio::time::sleep(Duration::from_secs_f64(self.config.challenge_wait)).await;
                match self.extract(page, url).await {
                    Err(FetchError::ContentTooShort { .. }) => Err(FetchError::ChallengeServed {
                        url: url.to_owned(),
                    }),
                    other => other,
                }
            }
            other => other,
        }
    }

    async fn extract(&self, page: &Page, url: &str) -> Result<String, FetchError> {
        let html = page
            .content()
            .await
            .map_err(|e| FetchError::TransportFailed {
                url: url.to_owned(),
                reason: e.to_string(),
            })?;
        if html.len() < self.config.min_content_chars {
            return Err(FetchError::ContentTooShort {
                url: url.to_owned(),
                len: html.len(),
            });
        }
        Ok(html)
    }

    fn store_delay(&self, delay: f64) {
        self.delay_bits.store(delay.to_bits(), Ordering::Relaxed);
    }
}

/// Exponential retry wait: 10s, 20s, 40s… capped at 120s, plus up to 5s of
/// random jitter.
fn retry_backoff(attempt: u32) -> Duration {
    let exp = RETRY_BASE.saturating_mul(1 << (attempt - 1).min(5));
    let jitter = rand::thread_rng().gen_range(Duration::ZERO..RETRY_JITTER_MAX);
    exp.min(RETRY_CAP) + jitter
}

#[async_trait]
impl Fetcher for BrowserTransport {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return Err(FetchError::TransportUnavailable(
                "transport already closed".to_owned(),
            ));
        }

        let mut attempt = 0u32;
        loop {
            let wait = inner.pacing.next_wait();
            if !wait.is_zero() {
                debug!(url, wait_secs = wait.as_secs_f64(), "pacing before fetch");
                tokio::time::sleep(wait).await;
            }
            inner.pacing.mark_request();
            self.requests.fetch_add(1, Ordering::Relaxed);

            match self.navigate(&inner.page, url).await {
                Ok(html) => {
                    inner.pacing.on_success();
                    self.store_delay(inner.pacing.current_delay());
                    self.successes.fetch_add(1, Ordering::Relaxed);
                    return Ok(html);
                }
                Err(err @ FetchError::PageMissing { .. }) => return Err(err),
                Err(err) => {
                    inner.pacing.on_backoff();
                    self.store_delay(inner.pacing.current_delay());
                    if attempt >= self.config.max_retries {
                        return Err(err);
                    }
                    attempt += 1;
                    let backoff = retry_backoff(attempt);
                    warn!(url, %err, attempt, backoff_secs = backoff.as_secs_f64(), "fetch failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    fn stats(&self) -> FetchStats {
        FetchStats {
            requests: self.requests.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            current_delay: f64::from_bits(self.delay_bits.load(Ordering::Relaxed)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_backoff_is_exponential_and_capped() {
        for attempt in 1..=8 {
            let wait = retry_backoff(attempt);
            assert!(wait >= RETRY_BASE, "attempt {attempt} below base");
            assert!(
                wait <= RETRY_CAP + RETRY_JITTER_MAX,
                "attempt {attempt} above cap"
            );
        }
        assert!(retry_backoff(1) < Duration::from_secs(15));
        assert!(retry_backoff(4) >= Duration::from_secs(80));
    }
}

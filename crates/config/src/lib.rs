mod error;

pub use error::Error;

use serde::{Deserialize, Serialize};
use std::fs::read;

pub type Result<T> = std::result::Result<T, Error>;

/// Configuration for a harvest run; defines the TOML schema for config files.
///
/// Every field has a default, so an empty file (or no file at all) yields a
/// working configuration. Timing values are in seconds.
#[derive(Clone, Deserialize, Debug, Serialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Lower bound of the pre-request delay jitter band.
    pub min_delay: f64,
    /// Upper bound the adaptive delay may decay back down to after backoff.
    pub max_delay: f64,
    /// Multiplier applied to the current delay after a challenge or rate-limit.
    pub backoff_factor: f64,
    /// Multiplier applied to the current delay after a successful fetch.
    pub recovery_factor: f64,
    /// Ceiling for the adaptive delay.
    pub max_backoff: f64,

    /// Wall-clock wait after navigation before extracting the document.
    pub page_load_wait: f64,
    /// Extra wait before the single in-place re-extraction of a short page.
    pub challenge_wait: f64,
    /// Per-fetch retry bound for challenges and transient failures.
    pub max_retries: u32,
    /// Minimum rendered-document length for a page to count as real content.
    pub min_content_chars: usize,

    /// Highest listing offset to paginate to (inclusive).
    pub max_offset: u32,
    /// Listing page size; offsets advance by this much.
    pub results_per_page: u32,

    pub overview_batch_size: usize,
    pub map_stats_batch_size: usize,
    pub perf_economy_batch_size: usize,

    /// Root of the gzip page archive.
    pub data_dir: String,
    /// Path of the sqlite database file.
    pub db_path: String,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            min_delay: 3.0,
            max_delay: 8.0,
            backoff_factor: 2.0,
            recovery_factor: 0.95,
            max_backoff: 120.0,
            page_load_wait: 4.0,
            challenge_wait: 6.0,
            max_retries: 5,
            min_content_chars: 10_000,
            max_offset: 9900,
            results_per_page: 100,
            overview_batch_size: 10,
            map_stats_batch_size: 10,
            perf_economy_batch_size: 10,
            data_dir: "data".to_owned(),
            db_path: "clutch.db".to_owned(),
        }
    }
}

impl HarvestConfig {
    pub fn from_file(file_path: &str) -> Result<HarvestConfig> {
        let file_contents_str = String::from_utf8_lossy(&read(file_path)?).to_string();
        let config: HarvestConfig = toml::from_str(&file_contents_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn encode_toml(&self) -> Result<String> {
        let encoded = toml::to_string(self)?;
        Ok(encoded)
    }

    pub fn save_toml(&self, file_path: &str) -> Result<()> {
        let encoded = self.encode_toml()?;
        std::fs::write(file_path, encoded)?;
        Ok(())
    }

    /// Rejects configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.min_delay <= 0.0 || self.max_delay < self.min_delay {
            return Err(Error::Invalid(
                "delay band requires 0 < min_delay <= max_delay",
            ));
        }
        if self.backoff_factor < 1.0 {
            return Err(Error::Invalid("backoff_factor must be >= 1.0"));
        }
        if !(0.0..=1.0).contains(&self.recovery_factor) {
            return Err(Error::Invalid("recovery_factor must be within 0..=1"));
        }
        if self.results_per_page == 0 {
            return Err(Error::Invalid("results_per_page must be nonzero"));
        }
        Ok(())
    }
}

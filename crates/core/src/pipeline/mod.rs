//! Stage orchestrators.
//!
//! All four stages share one shape: read the pending batch from the store,
//! fetch-and-archive every item first, then parse, validate and persist
//! item by item. A batch-fatal transport error discards the whole batch
//! (items stay pending and the next invocation retries cleanly); item
//! failures are quarantined or marked and never cascade.

mod discovery;
mod map_stats;
mod overview;
mod perf_economy;
mod runner;

pub use discovery::{run_discovery, DiscoveryOpts};
pub use map_stats::run_map_stats;
pub use overview::run_overview;
pub use perf_economy::run_perf_economy;
pub use runner::{run_all, RunAllOpts};

use crate::db::{DbOps, QuarantineEntry};
use crate::error::FetchError;
use serde::Serialize;
use std::fmt;
use tracing::{error, warn};

/// Per-invocation counters every stage returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageStats {
    pub fetched: u64,
    pub parsed: u64,
    pub failed: u64,
    pub fetch_errors: u64,
}

impl StageStats {
    /// Rows moved forward. Failures deliberately do not count: a map whose
    /// page keeps failing to parse stays pending forever, and treating that
    /// as progress would keep `run_all` looping on it.
    pub fn made_progress(&self) -> bool {
        self.parsed > 0
    }

    pub fn absorb(&mut self, other: &StageStats) {
        self.fetched += other.fetched;
        self.parsed += other.parsed;
        self.failed += other.failed;
        self.fetch_errors += other.fetch_errors;
    }
}

impl fmt::Display for StageStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fetched={} parsed={} failed={} fetch_errors={}",
            self.fetched, self.parsed, self.failed, self.fetch_errors
        )
    }
}

/// Structured error line for a batch-aborting transport failure.
pub(crate) fn log_batch_fatal(stage: &str, err: &FetchError) {
    error!(
        stage,
        kind = err.kind(),
        url = err.url().unwrap_or("-"),
        %err,
        "transport failure; discarding batch"
    );
}

/// Best-effort quarantine: a quarantine failure is logged and never blocks
/// the pipeline.
pub(crate) fn quarantine<D: DbOps>(
    db: &D,
    entity_type: &str,
    match_id: Option<u64>,
    map_number: Option<u8>,
    payload: &impl Serialize,
    error: &dyn fmt::Display,
) {
    let payload_json =
        serde_json::to_string(payload).unwrap_or_else(|e| format!("{{\"unserialisable\":\"{e}\"}}"));
    let entry = QuarantineEntry::new(
        entity_type,
        match_id,
        map_number,
        payload_json,
        error.to_string(),
    );
    if let Err(err) = db.insert_quarantine(&entry) {
        warn!(entity_type, ?match_id, %err, "failed to write quarantine entry");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_render_as_one_line() {
        let stats = StageStats {
            fetched: 3,
            parsed: 0,
            failed: 0,
            fetch_errors: 1,
        };
        assert_eq!(stats.to_string(), "fetched=3 parsed=0 failed=0 fetch_errors=1");
    }

    #[test]
    fn failures_alone_are_not_progress() {
        let stats = StageStats {
            fetched: 2,
            parsed: 0,
            failed: 2,
            fetch_errors: 0,
        };
        assert!(!stats.made_progress());
        assert!(StageStats {
            parsed: 1,
            ..Default::default()
        }
        .made_progress());
    }
}

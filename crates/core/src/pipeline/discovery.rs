//! Listing pagination: walks the results pages at a fixed offset stride,
//! recording each completed offset so a restart resumes at the first
//! unprocessed one.

use super::{log_batch_fatal, StageStats};
use crate::archive::PageArchive;
use crate::db::{DbOps, DiscoveryEntry, DiscoveryStatus};
use crate::parser::parse_results;
use crate::transport::Fetcher;
use crate::{urls, Error, Result};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy)]
pub struct DiscoveryOpts {
    pub start_offset: u32,
    /// Inclusive upper pagination bound.
    pub max_offset: u32,
    pub results_per_page: u32,
}

impl Default for DiscoveryOpts {
    fn default() -> Self {
        Self {
            start_offset: 0,
            max_offset: 9900,
            results_per_page: 100,
        }
    }
}

pub async fn run_discovery<D, F>(
    db: &D,
    fetcher: &F,
    archive: &PageArchive,
    opts: &DiscoveryOpts,
) -> Result<StageStats>
where
    D: DbOps,
    F: Fetcher + ?Sized,
{
    let mut stats = StageStats::default();

    let mut offset = opts.start_offset;
    while offset <= opts.max_offset {
        if db.offset_completed(offset)? {
            debug!(offset, "offset already discovered; skipping");
            offset += opts.results_per_page;
            continue;
        }

        let url = urls::results_url(offset);
        match fetcher.fetch(&url).await {
            Ok(html) => {
                archive.save_results(offset, &html)?;
                stats.fetched += 1;
            }
            Err(err) => {
                stats.fetch_errors += 1;
                log_batch_fatal("discover", &err);
                return Ok(stats);
            }
        }

        let html = archive.load_results(offset)?;
        let parsed = parse_results(&html, offset)?;
        // a rendered listing with zero entries is almost certainly an
        // interstitial that slipped past challenge detection
        if parsed.is_empty() {
            return Err(Error::EmptyListing { offset });
        }

        let entries: Vec<DiscoveryEntry> = parsed
            .into_iter()
            .map(|entry| DiscoveryEntry {
                match_id: entry.match_id,
                url: entry.url,
                offset,
                forfeit_hint: entry.forfeit_hint,
                timestamp_ms: entry.timestamp_ms,
                status: DiscoveryStatus::Pending,
            })
            .collect();
        db.upsert_discovery_page(offset, &entries)?;
        stats.parsed += entries.len() as u64;
        info!(offset, entries = entries.len(), "listing page discovered");

        offset += opts.results_per_page;
    }

    Ok(stats)
}

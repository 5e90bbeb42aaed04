//! Overview stage: drains pending discovery entries, writes the atomic
//! match bundle and advances each entry's status.

use super::{log_batch_fatal, quarantine, StageStats};
use crate::archive::PageArchive;
use crate::db::{DbOps, DiscoveryStatus};
use crate::parser::parse_match_overview;
use crate::transport::Fetcher;
use crate::validator::validate_overview;
use crate::{urls, Result};
use tracing::{error, info, warn};

pub async fn run_overview<D, F>(
    db: &D,
    fetcher: &F,
    archive: &PageArchive,
    limit: usize,
) -> Result<StageStats>
where
    D: DbOps,
    F: Fetcher + ?Sized,
{
    let mut stats = StageStats::default();
    let pending = db.pending_overview(limit)?;
    if pending.is_empty() {
        return Ok(stats);
    }

    // fetch-first: archive the whole batch before parsing any of it
    let mut fetched = Vec::with_capacity(pending.len());
    for entry in pending {
        let url = urls::match_url(&entry.url);
        match fetcher.fetch(&url).await {
            Ok(html) => {
                archive.save_overview(entry.match_id, &html)?;
                stats.fetched += 1;
                fetched.push(entry);
            }
            Err(err) if err.is_item_fatal() => {
                warn!(match_id = entry.match_id, %err, "page gone; marking entry failed");
                db.set_discovery_status(entry.match_id, DiscoveryStatus::Failed)?;
                stats.failed += 1;
            }
            Err(err) => {
                stats.fetch_errors += 1;
                log_batch_fatal("overview", &err);
                return Ok(stats);
            }
        }
    }

    for entry in fetched {
        let html = archive.load_overview(entry.match_id)?;
        let mut overview = match parse_match_overview(&html, entry.match_id) {
            Ok(overview) => overview,
            Err(err) => {
                quarantine(db, "match_overview", Some(entry.match_id), None, &entry, &err);
                db.set_discovery_status(entry.match_id, DiscoveryStatus::Failed)?;
                stats.failed += 1;
                continue;
            }
        };
        overview.match_record.url = entry.url.clone();

        if let Err(err) = validate_overview(&overview) {
            quarantine(db, "match_overview", Some(entry.match_id), None, &overview, &err);
            db.set_discovery_status(entry.match_id, DiscoveryStatus::Failed)?;
            stats.failed += 1;
            continue;
        }

        if let Err(err) = db.upsert_overview(&overview) {
            error!(match_id = entry.match_id, %err, "failed to persist overview");
            db.set_discovery_status(entry.match_id, DiscoveryStatus::Failed)?;
            stats.failed += 1;
            continue;
        }
        db.set_discovery_status(entry.match_id, DiscoveryStatus::Scraped)?;
        stats.parsed += 1;
        info!(
            match_id = entry.match_id,
            maps = overview.maps.len(),
            forfeit = overview.match_record.is_forfeit,
            "overview persisted"
        );
    }

    Ok(stats)
}

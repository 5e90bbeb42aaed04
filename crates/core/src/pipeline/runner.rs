//! Runs the four stages in order until each reports no forward progress.

use super::{
    run_discovery, run_map_stats, run_overview, run_perf_economy, DiscoveryOpts, StageStats,
};
use crate::archive::PageArchive;
use crate::db::DbOps;
use crate::transport::Fetcher;
use crate::Result;
use tracing::info;

#[derive(Debug, Clone, Copy)]
pub struct RunAllOpts {
    pub discovery: DiscoveryOpts,
    pub overview_limit: usize,
    pub map_stats_limit: usize,
    pub perf_economy_limit: usize,
}

impl Default for RunAllOpts {
    fn default() -> Self {
        Self {
            discovery: DiscoveryOpts::default(),
            overview_limit: 10,
            map_stats_limit: 10,
            perf_economy_limit: 10,
        }
    }
}

/// Discovery once, then overview / map-stats / perf-economy cycles until a
/// full cycle moves nothing forward. A batch-fatal transport failure stops
/// the run early with the fetch-error counter set; pending work is
/// untouched and the next invocation resumes.
pub async fn run_all<D, F>(
    db: &D,
    fetcher: &F,
    archive: &PageArchive,
    opts: &RunAllOpts,
) -> Result<StageStats>
where
    D: DbOps,
    F: Fetcher + ?Sized,
{
    let mut total = StageStats::default();

    let discovery = run_discovery(db, fetcher, archive, &opts.discovery).await?;
    info!(stage = "discover", %discovery, "stage finished");
    total.absorb(&discovery);
    if discovery.fetch_errors > 0 {
        return Ok(total);
    }

    loop {
        let mut progressed = false;
        for stage in [Stage::Overview, Stage::MapStats, Stage::PerfEconomy] {
            let stats = match stage {
                Stage::Overview => {
                    run_overview(db, fetcher, archive, opts.overview_limit).await?
                }
                Stage::MapStats => {
                    run_map_stats(db, fetcher, archive, opts.map_stats_limit).await?
                }
                Stage::PerfEconomy => {
                    run_perf_economy(db, fetcher, archive, opts.perf_economy_limit).await?
                }
            };
            info!(stage = stage.name(), %stats, "stage finished");
            progressed |= stats.made_progress();
            total.absorb(&stats);
            if stats.fetch_errors > 0 {
                return Ok(total);
            }
        }
        if !progressed {
            break;
        }
    }

    Ok(total)
}

#[derive(Clone, Copy)]
enum Stage {
    Overview,
    MapStats,
    PerfEconomy,
}

impl Stage {
    fn name(self) -> &'static str {
        match self {
            Self::Overview => "overview",
            Self::MapStats => "map-stats",
            Self::PerfEconomy => "perf-economy",
        }
    }
}

//! Performance + economy stage. Fetches both sub-pages for each pending
//! map before parsing either; the performance columns are layered onto the
//! existing `player_stat` rows (read-merge-write) so the map-stats columns
//! survive the second write.

use super::{log_batch_fatal, quarantine, StageStats};
use crate::archive::{MapPage, PageArchive};
use crate::db::{
    DbOps, KillMatrixEntry, MatchRecord, PendingMap, PerformanceColumns, RoundEconomy,
};
use crate::parser::{parse_economy, parse_performance};
use crate::transport::Fetcher;
use crate::validator::validate_economy;
use crate::{urls, Result};
use tracing::{error, info, warn};

pub async fn run_perf_economy<D, F>(
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
    let pending = db.pending_perf_economy(limit)?;
    if pending.is_empty() {
        return Ok(stats);
    }

    let mut fetched = Vec::with_capacity(pending.len());
    'fetch: for pm in pending {
        for (url, page) in [
            (urls::performance_url(pm.mapstatsid), MapPage::Performance),
            (urls::economy_url(pm.mapstatsid), MapPage::Economy),
        ] {
            match fetcher.fetch(&url).await {
                Ok(html) => {
                    archive.save_map_page(pm.match_id, pm.mapstatsid, page, &html)?;
                }
                Err(err) if err.is_item_fatal() => {
                    warn!(match_id = pm.match_id, mapstatsid = pm.mapstatsid, %err, "sub-page gone");
                    quarantine(
                        db,
                        "perf_economy_page",
                        Some(pm.match_id),
                        Some(pm.map_number),
                        &pm.mapstatsid,
                        &err,
                    );
                    stats.failed += 1;
                    continue 'fetch;
                }
                Err(err) => {
                    stats.fetch_errors += 1;
                    log_batch_fatal("perf-economy", &err);
                    return Ok(stats);
                }
            }
        }
        stats.fetched += 1;
        fetched.push(pm);
    }

    for pm in fetched {
        let perf_html = archive.load_map_page(pm.match_id, pm.mapstatsid, MapPage::Performance)?;
        let econ_html = archive.load_map_page(pm.match_id, pm.mapstatsid, MapPage::Economy)?;

        let perf = match parse_performance(&perf_html, pm.mapstatsid) {
            Ok(perf) => perf,
            Err(err) => {
                quarantine(db, "performance_page", Some(pm.match_id), Some(pm.map_number), &pm.mapstatsid, &err);
                stats.failed += 1;
                continue;
            }
        };
        let economy = match parse_economy(&econ_html, pm.mapstatsid) {
            Ok(economy) => economy,
            Err(err) => {
                quarantine(db, "economy_page", Some(pm.match_id), Some(pm.map_number), &pm.mapstatsid, &err);
                stats.failed += 1;
                continue;
            }
        };

        let Some(match_record) = db.get_match(pm.match_id)? else {
            // pending query joins through maps, so this means external deletion
            warn!(match_id = pm.match_id, "match row vanished; skipping");
            stats.failed += 1;
            continue;
        };

        let perf_cols: Vec<PerformanceColumns> = perf
            .players
            .iter()
            .map(|line| PerformanceColumns {
                match_id: pm.match_id,
                map_number: pm.map_number,
                player_id: line.player_id,
                kpr: Some(line.kpr),
                dpr: Some(line.dpr),
                mk_rating: Some(line.mk_rating),
            })
            .collect();

        let mut economy_rows = Vec::with_capacity(economy.rounds.len());
        for line in &economy.rounds {
            let row = to_round_economy(&pm, &match_record, line);
            match validate_economy(&row) {
                Ok(()) => economy_rows.push(row),
                Err(err) => {
                    quarantine(db, "round_economy", Some(pm.match_id), Some(pm.map_number), &row, &err);
                }
            }
        }

        let matrix_rows: Vec<KillMatrixEntry> = perf
            .matrix
            .iter()
            .map(|cell| KillMatrixEntry {
                match_id: pm.match_id,
                map_number: pm.map_number,
                matrix_type: cell.matrix_type,
                row_player_id: cell.row_player_id,
                col_player_id: cell.col_player_id,
                row_kills: cell.row_kills,
                col_kills: cell.col_kills,
            })
            .collect();

        if let Err(err) = db.merge_perf_economy(&perf_cols, &economy_rows, &matrix_rows) {
            error!(match_id = pm.match_id, map_number = pm.map_number, %err, "failed to persist performance + economy");
            stats.failed += 1;
            continue;
        }
        stats.parsed += 1;
        info!(
            match_id = pm.match_id,
            map_number = pm.map_number,
            economy_rows = economy_rows.len(),
            "performance + economy persisted"
        );
    }

    Ok(stats)
}

fn to_round_economy(
    pm: &PendingMap,
    match_record: &MatchRecord,
    line: &crate::parser::EconomyLine,
) -> RoundEconomy {
    let team_id = if line.team_number == 1 {
        match_record.team1_id
    } else {
        match_record.team2_id
    };
    RoundEconomy {
        match_id: pm.match_id,
        map_number: pm.map_number,
        round_number: line.round_number,
        team_id,
        equipment_value: line.equipment_value,
        buy_type: line.buy_type,
        side: line.side,
    }
}

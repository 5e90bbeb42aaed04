//! Map-stats stage. There is no status column to advance here: done-ness is
//! the presence of `player_stat` rows, so re-running simply re-offers any
//! map that never yielded a persisted row.

use super::{log_batch_fatal, quarantine, StageStats};
use crate::archive::{MapPage, PageArchive};
use crate::db::{DbOps, PendingMap, PlayerStat, RoundOutcome};
use crate::parser::{parse_map_stats, PlayerStatLine, RoundOutcomeLine};
use crate::transport::Fetcher;
use crate::validator::{validate_map_stats_header, validate_player_stat, validate_round_outcome};
use crate::{urls, Result};
use tracing::{error, info, warn};

pub async fn run_map_stats<D, F>(
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
    let pending = db.pending_map_stats(limit)?;
    if pending.is_empty() {
        return Ok(stats);
    }

    let mut fetched = Vec::with_capacity(pending.len());
    for pm in pending {
        let url = urls::map_stats_url(pm.mapstatsid);
        match fetcher.fetch(&url).await {
            Ok(html) => {
                archive.save_map_page(pm.match_id, pm.mapstatsid, MapPage::Stats, &html)?;
                stats.fetched += 1;
                fetched.push(pm);
            }
            Err(err) if err.is_item_fatal() => {
                warn!(match_id = pm.match_id, mapstatsid = pm.mapstatsid, %err, "stats page gone");
                quarantine(
                    db,
                    "map_stats_page",
                    Some(pm.match_id),
                    Some(pm.map_number),
                    &pm.mapstatsid,
                    &err,
                );
                stats.failed += 1;
            }
            Err(err) => {
                stats.fetch_errors += 1;
                log_batch_fatal("map-stats", &err);
                return Ok(stats);
            }
        }
    }

    for pm in fetched {
        let html = archive.load_map_page(pm.match_id, pm.mapstatsid, MapPage::Stats)?;
        let page = match parse_map_stats(&html, pm.mapstatsid) {
            Ok(page) => page,
            Err(err) => {
                quarantine(
                    db,
                    "map_stats_page",
                    Some(pm.match_id),
                    Some(pm.map_number),
                    &pm.mapstatsid,
                    &err,
                );
                stats.failed += 1;
                continue;
            }
        };
        if let Err(err) = validate_map_stats_header(&page) {
            quarantine(
                db,
                "map_stats_page",
                Some(pm.match_id),
                Some(pm.map_number),
                &page,
                &err,
            );
            stats.failed += 1;
            continue;
        }

        // siblings persist independently; only the invalid child is lost
        let mut player_stats = Vec::with_capacity(page.players.len());
        for line in &page.players {
            let stat = to_player_stat(&pm, line);
            match validate_player_stat(&stat) {
                Ok(()) => player_stats.push(stat),
                Err(err) => {
                    quarantine(db, "player_stat", Some(pm.match_id), Some(pm.map_number), &stat, &err);
                }
            }
        }
        if player_stats.len() != 10 {
            warn!(
                match_id = pm.match_id,
                map_number = pm.map_number,
                players = player_stats.len(),
                "played map does not have exactly 10 valid player rows"
            );
        }

        let mut rounds = Vec::with_capacity(page.rounds.len());
        for line in &page.rounds {
            let round = to_round_outcome(&pm, line);
            match validate_round_outcome(&round, page.team1_id, page.team2_id) {
                Ok(()) => rounds.push(round),
                Err(err) => {
                    quarantine(db, "round_outcome", Some(pm.match_id), Some(pm.map_number), &round, &err);
                }
            }
        }

        if player_stats.is_empty() {
            stats.failed += 1;
            continue;
        }
        if let Err(err) = db.insert_map_stats(&player_stats, &rounds) {
            error!(match_id = pm.match_id, map_number = pm.map_number, %err, "failed to persist map stats");
            stats.failed += 1;
            continue;
        }
        stats.parsed += 1;
        info!(
            match_id = pm.match_id,
            map_number = pm.map_number,
            players = player_stats.len(),
            rounds = rounds.len(),
            "map stats persisted"
        );
    }

    Ok(stats)
}

fn to_player_stat(pm: &PendingMap, line: &PlayerStatLine) -> PlayerStat {
    PlayerStat {
        match_id: pm.match_id,
        map_number: pm.map_number,
        player_id: line.player_id,
        player_name: line.player_name.clone(),
        team_id: line.team_id,
        kills: Some(line.kills),
        deaths: Some(line.deaths),
        assists: Some(line.assists),
        flash_assists: Some(line.flash_assists),
        hs_kills: Some(line.hs_kills),
        kd_diff: Some(line.kd_diff),
        adr: line.adr,
        kast: line.kast,
        fk_diff: Some(line.fk_diff),
        rating: Some(line.rating),
        opening_kills: line.opening_kills,
        opening_deaths: line.opening_deaths,
        multi_kills: line.multi_kills,
        clutch_wins: line.clutch_wins,
        traded_deaths: line.traded_deaths,
        round_swing: line.round_swing,
        kpr: None,
        dpr: None,
        mk_rating: None,
    }
}

fn to_round_outcome(pm: &PendingMap, line: &RoundOutcomeLine) -> RoundOutcome {
    RoundOutcome {
        match_id: pm.match_id,
        map_number: pm.map_number,
        round_number: line.round_number,
        winner_team_id: line.winner_team_id,
        winner_side: line.winner_side,
        win_type: line.win_type,
    }
}

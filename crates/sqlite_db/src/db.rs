use crate::migrations::MIGRATIONS;
use crate::{Error, Result, DB_VERSION};
use clutch_core::db::{
    DbOps, DiscoveryEntry, DiscoveryStatus, KillMatrixEntry, MapRecord, MatchOverview,
    MatchPlayer, MatchRecord, PendingMap, PerformanceColumns, PlayerStat, QuarantineEntry,
    Result as CoreResult, RoundEconomy, RoundOutcome, VetoStep,
};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, Row};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug)]
struct SqliteConnectionCustomizer;

impl r2d2::CustomizeConnection<rusqlite::Connection, rusqlite::Error>
    for SqliteConnectionCustomizer
{
    fn on_acquire(
        &self,
        conn: &mut rusqlite::Connection,
    ) -> std::result::Result<(), rusqlite::Error> {
        // WAL keeps concurrent readers cheap while the single writer holds
        // the database.
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        // Retry instead of failing immediately when the database is locked.
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
        // round_economy -> round_outcomes and the map/match parent chains
        // rely on enforcement.
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct SqliteDb {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteDb {
    pub fn from_file(file: &str) -> Result<Self> {
        let manager = SqliteConnectionManager::file(file);
        // one connection: the pipeline is a single cooperative task and the
        // store has a single writer
        let pool = Pool::builder()
            .max_size(1)
            .connection_timeout(Duration::from_secs(30))
            .connection_customizer(Box::new(SqliteConnectionCustomizer))
            .build(manager)?;
        Ok(Self { pool })
    }

    pub fn new_memory() -> Self {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .connection_customizer(Box::new(SqliteConnectionCustomizer))
            .build(manager)
            .expect("failed to create connection pool");
        Self { pool }
    }

    fn get_pool(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    fn apply_migrations(&self) -> Result<()> {
        let mut conn = self.get_pool()?;
        let current = schema_version(&conn)?;
        if current > DB_VERSION {
            return Err(Error::Schema(format!(
                "database is at version {current}, this binary only knows {DB_VERSION}"
            )));
        }
        for (version, sql) in MIGRATIONS {
            if *version <= current {
                continue;
            }
            debug!(version, "applying migration");
            let tx = conn.transaction()?;
            tx.execute_batch(sql)?;
            tx.pragma_update(None, "user_version", version)?;
            tx.commit()?;
        }
        Ok(())
    }

    fn write_discovery_page(&self, offset: u32, entries: &[DiscoveryEntry]) -> Result<()> {
        let mut conn = self.get_pool()?;
        let tx = conn.transaction()?;
        for entry in entries {
            // the update set never touches status: a re-discovered entry
            // that was already scraped or failed keeps its state
            tx.execute(
                "INSERT INTO discovery_entries (match_id, url, offset, forfeit_hint, timestamp_ms, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(match_id) DO UPDATE SET
                   url = excluded.url,
                   offset = excluded.offset,
                   forfeit_hint = excluded.forfeit_hint,
                   timestamp_ms = excluded.timestamp_ms,
                   updated_at = datetime('now')",
                params![
                    entry.match_id,
                    entry.url,
                    offset,
                    entry.forfeit_hint,
                    entry.timestamp_ms,
                    entry.status.to_string(),
                ],
            )?;
        }
        tx.execute(
            "INSERT INTO discovery_pages (offset) VALUES (?1)
             ON CONFLICT(offset) DO UPDATE SET completed_at = datetime('now')",
            params![offset],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn has_offset(&self, offset: u32) -> Result<bool> {
        let exists: bool = self
            .get_pool()?
            .query_row(
                "SELECT 1 FROM discovery_pages WHERE offset = ?1",
                params![offset],
                |_| Ok(true),
            )
            .unwrap_or(false);
        Ok(exists)
    }

    fn fetch_pending_overview(&self, limit: usize) -> Result<Vec<DiscoveryEntry>> {
        let pool = self.get_pool()?;
        let mut stmt = pool.prepare(
            "SELECT match_id, url, offset, forfeit_hint, timestamp_ms, status
             FROM discovery_entries WHERE status = 'pending'
             ORDER BY match_id ASC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], DiscoveryEntryRow::from_row)?;
        rows.map(|r| r.map_err(Error::from).and_then(DiscoveryEntryRow::into_entry))
            .collect()
    }

    fn update_discovery_status(&self, match_id: u64, status: DiscoveryStatus) -> Result<()> {
        self.get_pool()?.execute(
            "UPDATE discovery_entries SET status = ?2, updated_at = datetime('now')
             WHERE match_id = ?1",
            params![match_id, status.to_string()],
        )?;
        Ok(())
    }

    fn write_overview(&self, overview: &MatchOverview) -> Result<()> {
        let mut conn = self.get_pool()?;
        let tx = conn.transaction()?;
        upsert_match(&tx, &overview.match_record)?;
        for map in &overview.maps {
            upsert_map(&tx, map)?;
        }
        for step in &overview.veto {
            upsert_veto_step(&tx, step)?;
        }
        for player in &overview.players {
            upsert_match_player(&tx, player)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn fetch_match(&self, match_id: u64) -> Result<Option<MatchRecord>> {
        let pool = self.get_pool()?;
        let mut stmt = pool.prepare(
            "SELECT match_id, url, team1_id, team1_name, team2_id, team2_name,
                    event_id, event_name, team1_score, team2_score, best_of, lan,
                    match_date, is_forfeit
             FROM matches WHERE match_id = ?1",
        )?;
        let row = stmt
            .query_map(params![match_id], |row| {
                Ok(MatchRecord {
                    match_id: row.get(0)?,
                    url: row.get(1)?,
                    team1_id: row.get(2)?,
                    team1_name: row.get(3)?,
                    team2_id: row.get(4)?,
                    team2_name: row.get(5)?,
                    event_id: row.get(6)?,
                    event_name: row.get(7)?,
                    team1_score: row.get(8)?,
                    team2_score: row.get(9)?,
                    best_of: row.get(10)?,
                    lan: row.get(11)?,
                    date: row.get(12)?,
                    is_forfeit: row.get(13)?,
                })
            })?
            .next()
            .transpose()?;
        Ok(row)
    }

    fn fetch_pending_map_stats(&self, limit: usize) -> Result<Vec<PendingMap>> {
        self.fetch_pending_maps(
            "SELECT m.match_id, m.map_number, m.mapstatsid
             FROM maps m
             WHERE m.mapstatsid IS NOT NULL
               AND NOT EXISTS (
                 SELECT 1 FROM player_stats ps
                 WHERE ps.match_id = m.match_id AND ps.map_number = m.map_number)
             ORDER BY m.match_id ASC, m.map_number ASC
             LIMIT ?1",
            limit,
        )
    }

    fn fetch_pending_perf_economy(&self, limit: usize) -> Result<Vec<PendingMap>> {
        // null kpr is the sentinel for "performance stage has not run"
        self.fetch_pending_maps(
            "SELECT m.match_id, m.map_number, m.mapstatsid
             FROM maps m
             WHERE m.mapstatsid IS NOT NULL
               AND EXISTS (
                 SELECT 1 FROM player_stats ps
                 WHERE ps.match_id = m.match_id AND ps.map_number = m.map_number
                   AND ps.kpr IS NULL)
             ORDER BY m.match_id ASC, m.map_number ASC
             LIMIT ?1",
            limit,
        )
    }

    fn fetch_pending_maps(&self, query: &str, limit: usize) -> Result<Vec<PendingMap>> {
        let pool = self.get_pool()?;
        let mut stmt = pool.prepare(query)?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(PendingMap {
                match_id: row.get(0)?,
                map_number: row.get(1)?,
                mapstatsid: row.get(2)?,
            })
        })?;
        rows.map(|r| r.map_err(Error::from)).collect()
    }

    fn write_map_stats(&self, stats: &[PlayerStat], rounds: &[RoundOutcome]) -> Result<()> {
        let mut conn = self.get_pool()?;
        let tx = conn.transaction()?;
        for stat in stats {
            upsert_player_stat(&tx, stat, UPSERT_PLAYER_STAT_STAGE1)?;
        }
        for round in rounds {
            tx.execute(
                "INSERT INTO round_outcomes (match_id, map_number, round_number, winner_team_id, winner_side, win_type)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(match_id, map_number, round_number) DO UPDATE SET
                   winner_team_id = excluded.winner_team_id,
                   winner_side = excluded.winner_side,
                   win_type = excluded.win_type,
                   updated_at = datetime('now')",
                params![
                    round.match_id,
                    round.map_number,
                    round.round_number,
                    round.winner_team_id,
                    round.winner_side.to_string(),
                    round.win_type.to_string(),
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn write_perf_economy(
        &self,
        perf: &[PerformanceColumns],
        economy: &[RoundEconomy],
        matrix: &[KillMatrixEntry],
    ) -> Result<()> {
        let mut conn = self.get_pool()?;
        let tx = conn.transaction()?;

        // read-merge-write: layering the new columns onto the row read in
        // this transaction keeps every map-stats column intact
        for cols in perf {
            match read_player_stat(&tx, cols.match_id, cols.map_number, cols.player_id)? {
                Some(mut stat) => {
                    stat.merge_performance(cols);
                    upsert_player_stat(&tx, &stat, UPSERT_PLAYER_STAT_FULL)?;
                }
                None => {
                    warn!(
                        match_id = cols.match_id,
                        map_number = cols.map_number,
                        player_id = cols.player_id,
                        "no map-stats row to merge performance columns into; skipping"
                    );
                }
            }
        }

        // only economy rows whose round exists in round_outcomes may be
        // written; shorter regulation formats legitimately omit overtime
        let mut known_rounds: HashMap<(u64, u8), HashSet<u32>> = HashMap::new();
        for row in economy {
            let key = (row.match_id, row.map_number);
            if !known_rounds.contains_key(&key) {
                let rounds = read_round_numbers(&tx, row.match_id, row.map_number)?;
                known_rounds.insert(key, rounds.into_iter().collect());
            }
            if !known_rounds[&key].contains(&row.round_number) {
                warn!(
                    match_id = row.match_id,
                    map_number = row.map_number,
                    round = row.round_number,
                    "dropping economy row without a matching round outcome"
                );
                continue;
            }
            tx.execute(
                "INSERT INTO round_economy (match_id, map_number, round_number, team_id, equipment_value, buy_type, side)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(match_id, map_number, round_number, team_id) DO UPDATE SET
                   equipment_value = excluded.equipment_value,
                   buy_type = excluded.buy_type,
                   side = excluded.side,
                   updated_at = datetime('now')",
                params![
                    row.match_id,
                    row.map_number,
                    row.round_number,
                    row.team_id,
                    row.equipment_value,
                    row.buy_type.to_string(),
                    row.side.to_string(),
                ],
            )?;
        }

        for cell in matrix {
            tx.execute(
                "INSERT INTO kill_matrix (match_id, map_number, matrix_type, row_player_id, col_player_id, row_kills, col_kills)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(match_id, map_number, matrix_type, row_player_id, col_player_id) DO UPDATE SET
                   row_kills = excluded.row_kills,
                   col_kills = excluded.col_kills,
                   updated_at = datetime('now')",
                params![
                    cell.match_id,
                    cell.map_number,
                    cell.matrix_type.to_string(),
                    cell.row_player_id,
                    cell.col_player_id,
                    cell.row_kills,
                    cell.col_kills,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn write_quarantine(&self, entry: &QuarantineEntry) -> Result<()> {
        self.get_pool()?.execute(
            "INSERT INTO quarantine (entity_type, match_id, map_number, payload, error)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.entity_type,
                entry.match_id,
                entry.map_number,
                entry.payload_json,
                entry.error,
            ],
        )?;
        Ok(())
    }

    fn count_quarantine(&self) -> Result<u64> {
        Ok(self.get_pool()?.query_row(
            "SELECT COUNT(*) FROM quarantine",
            params![],
            |row| row.get(0),
        )?)
    }

    fn fetch_recent_quarantine(&self, limit: usize) -> Result<Vec<QuarantineEntry>> {
        let pool = self.get_pool()?;
        let mut stmt = pool.prepare(
            "SELECT entity_type, match_id, map_number, payload, error
             FROM quarantine ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(QuarantineEntry {
                entity_type: row.get(0)?,
                match_id: row.get(1)?,
                map_number: row.get(2)?,
                payload_json: row.get(3)?,
                error: row.get(4)?,
            })
        })?;
        rows.map(|r| r.map_err(Error::from)).collect()
    }

    fn count_player_stats(&self, match_id: u64, map_number: u8) -> Result<u64> {
        Ok(self.get_pool()?.query_row(
            "SELECT COUNT(*) FROM player_stats WHERE match_id = ?1 AND map_number = ?2",
            params![match_id, map_number],
            |row| row.get(0),
        )?)
    }

    fn fetch_round_numbers(&self, match_id: u64, map_number: u8) -> Result<Vec<u32>> {
        let pool = self.get_pool()?;
        read_round_numbers(&pool, match_id, map_number)
    }

    fn fetch_economy_rounds(&self, match_id: u64, map_number: u8) -> Result<Vec<u32>> {
        let pool = self.get_pool()?;
        let mut stmt = pool.prepare(
            "SELECT DISTINCT round_number FROM round_economy
             WHERE match_id = ?1 AND map_number = ?2 ORDER BY round_number ASC",
        )?;
        let rows = stmt.query_map(params![match_id, map_number], |row| row.get(0))?;
        rows.map(|r| r.map_err(Error::from)).collect()
    }

    fn count_kill_matrix(&self, match_id: u64, map_number: u8) -> Result<u64> {
        Ok(self.get_pool()?.query_row(
            "SELECT COUNT(*) FROM kill_matrix WHERE match_id = ?1 AND map_number = ?2",
            params![match_id, map_number],
            |row| row.get(0),
        )?)
    }
}

impl DbOps for SqliteDb {
    fn migrate(&self) -> CoreResult<()> {
        self.apply_migrations().map_err(Into::into)
    }

    fn version(&self) -> u64 {
        self.get_pool()
            .ok()
            .and_then(|conn| schema_version(&conn).ok())
            .unwrap_or(0)
    }

    fn upsert_discovery_page(&self, offset: u32, entries: &[DiscoveryEntry]) -> CoreResult<()> {
        self.write_discovery_page(offset, entries).map_err(Into::into)
    }

    fn offset_completed(&self, offset: u32) -> CoreResult<bool> {
        self.has_offset(offset).map_err(Into::into)
    }

    fn pending_overview(&self, limit: usize) -> CoreResult<Vec<DiscoveryEntry>> {
        self.fetch_pending_overview(limit).map_err(Into::into)
    }

    fn set_discovery_status(&self, match_id: u64, status: DiscoveryStatus) -> CoreResult<()> {
        self.update_discovery_status(match_id, status)
            .map_err(Into::into)
    }

    fn upsert_overview(&self, overview: &MatchOverview) -> CoreResult<()> {
        self.write_overview(overview).map_err(Into::into)
    }

    fn get_match(&self, match_id: u64) -> CoreResult<Option<MatchRecord>> {
        self.fetch_match(match_id).map_err(Into::into)
    }

    fn pending_map_stats(&self, limit: usize) -> CoreResult<Vec<PendingMap>> {
        self.fetch_pending_map_stats(limit).map_err(Into::into)
    }

    fn insert_map_stats(&self, stats: &[PlayerStat], rounds: &[RoundOutcome]) -> CoreResult<()> {
        self.write_map_stats(stats, rounds).map_err(Into::into)
    }

    fn pending_perf_economy(&self, limit: usize) -> CoreResult<Vec<PendingMap>> {
        self.fetch_pending_perf_economy(limit).map_err(Into::into)
    }

    fn merge_perf_economy(
        &self,
        perf: &[PerformanceColumns],
        economy: &[RoundEconomy],
        matrix: &[KillMatrixEntry],
    ) -> CoreResult<()> {
        self.write_perf_economy(perf, economy, matrix)
            .map_err(Into::into)
    }

    fn insert_quarantine(&self, entry: &QuarantineEntry) -> CoreResult<()> {
        self.write_quarantine(entry).map_err(Into::into)
    }

    fn quarantine_count(&self) -> CoreResult<u64> {
        self.count_quarantine().map_err(Into::into)
    }

    fn recent_quarantine(&self, limit: usize) -> CoreResult<Vec<QuarantineEntry>> {
        self.fetch_recent_quarantine(limit).map_err(Into::into)
    }

    fn player_stat_count(&self, match_id: u64, map_number: u8) -> CoreResult<u64> {
        self.count_player_stats(match_id, map_number)
            .map_err(Into::into)
    }

    fn round_numbers(&self, match_id: u64, map_number: u8) -> CoreResult<Vec<u32>> {
        self.fetch_round_numbers(match_id, map_number)
            .map_err(Into::into)
    }

    fn economy_rounds(&self, match_id: u64, map_number: u8) -> CoreResult<Vec<u32>> {
        self.fetch_economy_rounds(match_id, map_number)
            .map_err(Into::into)
    }

    fn kill_matrix_count(&self, match_id: u64, map_number: u8) -> CoreResult<u64> {
        self.count_kill_matrix(match_id, map_number)
            .map_err(Into::into)
    }
}

fn schema_version(conn: &Connection) -> Result<u64> {
    Ok(conn.query_row("PRAGMA user_version", params![], |row| row.get(0))?)
}

struct DiscoveryEntryRow {
    match_id: u64,
    url: String,
    offset: u32,
    forfeit_hint: bool,
    timestamp_ms: i64,
    status: String,
}

impl DiscoveryEntryRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            match_id: row.get(0)?,
            url: row.get(1)?,
            offset: row.get(2)?,
            forfeit_hint: row.get(3)?,
            timestamp_ms: row.get(4)?,
            status: row.get(5)?,
        })
    }

    fn into_entry(self) -> Result<DiscoveryEntry> {
        let status = DiscoveryStatus::from_str(&self.status)
            .map_err(|_| Error::Schema(format!("unrecognised discovery status {}", self.status)))?;
        Ok(DiscoveryEntry {
            match_id: self.match_id,
            url: self.url,
            offset: self.offset,
            forfeit_hint: self.forfeit_hint,
            timestamp_ms: self.timestamp_ms,
            status,
        })
    }
}

fn upsert_match(conn: &Connection, m: &MatchRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO matches (match_id, url, team1_id, team1_name, team2_id, team2_name,
                              event_id, event_name, team1_score, team2_score, best_of, lan,
                              match_date, is_forfeit)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
         ON CONFLICT(match_id) DO UPDATE SET
           url = excluded.url,
           team1_id = excluded.team1_id,
           team1_name = excluded.team1_name,
           team2_id = excluded.team2_id,
           team2_name = excluded.team2_name,
           event_id = excluded.event_id,
           event_name = excluded.event_name,
           team1_score = excluded.team1_score,
           team2_score = excluded.team2_score,
           best_of = excluded.best_of,
           lan = excluded.lan,
           match_date = excluded.match_date,
           is_forfeit = excluded.is_forfeit,
           updated_at = datetime('now')",
        params![
            m.match_id,
            m.url,
            m.team1_id,
            m.team1_name,
            m.team2_id,
            m.team2_name,
            m.event_id,
            m.event_name,
            m.team1_score,
            m.team2_score,
            m.best_of,
            m.lan,
            m.date,
            m.is_forfeit,
        ],
    )?;
    Ok(())
}

fn upsert_map(conn: &Connection, map: &MapRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO maps (match_id, map_number, map_name, mapstatsid, team1_rounds, team2_rounds,
                           team1_ct_rounds, team1_t_rounds, team2_ct_rounds, team2_t_rounds, is_unplayed)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(match_id, map_number) DO UPDATE SET
           map_name = excluded.map_name,
           mapstatsid = excluded.mapstatsid,
           team1_rounds = excluded.team1_rounds,
           team2_rounds = excluded.team2_rounds,
           team1_ct_rounds = excluded.team1_ct_rounds,
           team1_t_rounds = excluded.team1_t_rounds,
           team2_ct_rounds = excluded.team2_ct_rounds,
           team2_t_rounds = excluded.team2_t_rounds,
           is_unplayed = excluded.is_unplayed,
           updated_at = datetime('now')",
        params![
            map.match_id,
            map.map_number,
            map.map_name,
            map.mapstatsid,
            map.team1_rounds,
            map.team2_rounds,
            map.team1_ct_rounds,
            map.team1_t_rounds,
            map.team2_ct_rounds,
            map.team2_t_rounds,
            map.is_unplayed,
        ],
    )?;
    Ok(())
}

fn upsert_veto_step(conn: &Connection, step: &VetoStep) -> Result<()> {
    conn.execute(
        "INSERT INTO veto_steps (match_id, step_number, action, team_name, map_name)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(match_id, step_number) DO UPDATE SET
           action = excluded.action,
           team_name = excluded.team_name,
           map_name = excluded.map_name,
           updated_at = datetime('now')",
        params![
            step.match_id,
            step.step_number,
            step.action.to_string(),
            step.team_name,
            step.map_name,
        ],
    )?;
    Ok(())
}

fn upsert_match_player(conn: &Connection, player: &MatchPlayer) -> Result<()> {
    conn.execute(
        "INSERT INTO match_players (match_id, player_id, player_name, team_id, team_number)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(match_id, player_id) DO UPDATE SET
           player_name = excluded.player_name,
           team_id = excluded.team_id,
           team_number = excluded.team_number,
           updated_at = datetime('now')",
        params![
            player.match_id,
            player.player_id,
            player.player_name,
            player.team_id,
            player.team_number,
        ],
    )?;
    Ok(())
}

const PLAYER_STAT_INSERT: &str = "INSERT INTO player_stats (match_id, map_number, player_id, player_name, team_id,
        kills, deaths, assists, flash_assists, hs_kills, kd_diff, adr, kast, fk_diff, rating,
        opening_kills, opening_deaths, multi_kills, clutch_wins, traded_deaths, round_swing,
        kpr, dpr, mk_rating)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24)
     ON CONFLICT(match_id, map_number, player_id) DO UPDATE SET
       player_name = excluded.player_name,
       team_id = excluded.team_id,
       kills = excluded.kills,
       deaths = excluded.deaths,
       assists = excluded.assists,
       flash_assists = excluded.flash_assists,
       hs_kills = excluded.hs_kills,
       kd_diff = excluded.kd_diff,
       adr = excluded.adr,
       kast = excluded.kast,
       fk_diff = excluded.fk_diff,
       rating = excluded.rating,
       opening_kills = excluded.opening_kills,
       opening_deaths = excluded.opening_deaths,
       multi_kills = excluded.multi_kills,
       clutch_wins = excluded.clutch_wins,
       traded_deaths = excluded.traded_deaths,
       round_swing = excluded.round_swing,
       updated_at = datetime('now')";

/// Map-stats writes must not disturb the performance columns, so the
/// conflict update set stops at the stage-1 columns.
const UPSERT_PLAYER_STAT_STAGE1: &str = PLAYER_STAT_INSERT;

/// The merge path writes a row it has already read and layered, so the full
/// column set is safe.
const UPSERT_PLAYER_STAT_FULL: &str =
    "INSERT INTO player_stats (match_id, map_number, player_id, player_name, team_id,
        kills, deaths, assists, flash_assists, hs_kills, kd_diff, adr, kast, fk_diff, rating,
        opening_kills, opening_deaths, multi_kills, clutch_wins, traded_deaths, round_swing,
        kpr, dpr, mk_rating)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24)
     ON CONFLICT(match_id, map_number, player_id) DO UPDATE SET
       player_name = excluded.player_name,
       team_id = excluded.team_id,
       kills = excluded.kills,
       deaths = excluded.deaths,
       assists = excluded.assists,
       flash_assists = excluded.flash_assists,
       hs_kills = excluded.hs_kills,
       kd_diff = excluded.kd_diff,
       adr = excluded.adr,
       kast = excluded.kast,
       fk_diff = excluded.fk_diff,
       rating = excluded.rating,
       opening_kills = excluded.opening_kills,
       opening_deaths = excluded.opening_deaths,
       multi_kills = excluded.multi_kills,
       clutch_wins = excluded.clutch_wins,
       traded_deaths = excluded.traded_deaths,
       round_swing = excluded.round_swing,
       kpr = excluded.kpr,
       dpr = excluded.dpr,
       mk_rating = excluded.mk_rating,
       updated_at = datetime('now')";

fn upsert_player_stat(conn: &Connection, stat: &PlayerStat, sql: &str) -> Result<()> {
    conn.execute(
        sql,
        params![
            stat.match_id,
            stat.map_number,
            stat.player_id,
            stat.player_name,
            stat.team_id,
            stat.kills,
            stat.deaths,
            stat.assists,
            stat.flash_assists,
            stat.hs_kills,
            stat.kd_diff,
            stat.adr,
            stat.kast,
            stat.fk_diff,
            stat.rating,
            stat.opening_kills,
            stat.opening_deaths,
            stat.multi_kills,
            stat.clutch_wins,
            stat.traded_deaths,
            stat.round_swing,
            stat.kpr,
            stat.dpr,
            stat.mk_rating,
        ],
    )?;
    Ok(())
}

fn read_player_stat(
    conn: &Connection,
    match_id: u64,
    map_number: u8,
    player_id: u64,
) -> Result<Option<PlayerStat>> {
    let mut stmt = conn.prepare(
        "SELECT match_id, map_number, player_id, player_name, team_id,
                kills, deaths, assists, flash_assists, hs_kills, kd_diff, adr, kast, fk_diff,
                rating, opening_kills, opening_deaths, multi_kills, clutch_wins, traded_deaths,
                round_swing, kpr, dpr, mk_rating
         FROM player_stats WHERE match_id = ?1 AND map_number = ?2 AND player_id = ?3",
    )?;
    let row = stmt
        .query_map(params![match_id, map_number, player_id], |row| {
            Ok(PlayerStat {
                match_id: row.get(0)?,
                map_number: row.get(1)?,
                player_id: row.get(2)?,
                player_name: row.get(3)?,
                team_id: row.get(4)?,
                kills: row.get(5)?,
                deaths: row.get(6)?,
                assists: row.get(7)?,
                flash_assists: row.get(8)?,
                hs_kills: row.get(9)?,
                kd_diff: row.get(10)?,
                adr: row.get(11)?,
                kast: row.get(12)?,
                fk_diff: row.get(13)?,
                rating: row.get(14)?,
                opening_kills: row.get(15)?,
                opening_deaths: row.get(16)?,
                multi_kills: row.get(17)?,
                clutch_wins: row.get(18)?,
                traded_deaths: row.get(19)?,
                round_swing: row.get(20)?,
                kpr: row.get(21)?,
                dpr: row.get(22)?,
                mk_rating: row.get(23)?,
            })
        })?
        .next()
        .transpose()?;
    Ok(row)
}

fn read_round_numbers(conn: &Connection, match_id: u64, map_number: u8) -> Result<Vec<u32>> {
    let mut stmt = conn.prepare(
        "SELECT round_number FROM round_outcomes
         WHERE match_id = ?1 AND map_number = ?2 ORDER BY round_number ASC",
    )?;
    let rows = stmt.query_map(params![match_id, map_number], |row| row.get(0))?;
    rows.map(|r| r.map_err(Error::from)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clutch_core::db::{BuyType, MatrixType, Side, VetoAction, WinType};

    fn db() -> SqliteDb {
        let db = SqliteDb::new_memory();
        DbOps::migrate(&db).unwrap();
        db
    }

    fn entry(match_id: u64, offset: u32) -> DiscoveryEntry {
        DiscoveryEntry {
            match_id,
            url: format!("/matches/{match_id}/a-vs-b"),
            offset,
            forfeit_hint: false,
            timestamp_ms: 1_718_052_000_000,
            status: DiscoveryStatus::Pending,
        }
    }

    fn overview(match_id: u64) -> MatchOverview {
        let match_record = MatchRecord {
            match_id,
            url: format!("/matches/{match_id}/a-vs-b"),
            team1_id: 10,
            team1_name: "Alpha".into(),
            team2_id: 20,
            team2_name: "Bravo".into(),
            event_id: 7,
            event_name: "Event".into(),
            team1_score: Some(2),
            team2_score: Some(1),
            best_of: 3,
            lan: true,
            date: "2024-06-10".into(),
            is_forfeit: false,
        };
        let maps = vec![
            MapRecord {
                match_id,
                map_number: 1,
                map_name: "Inferno".into(),
                mapstatsid: Some(match_id * 100 + 1),
                team1_rounds: Some(13),
                team2_rounds: Some(7),
                team1_ct_rounds: Some(9),
                team1_t_rounds: Some(4),
                team2_ct_rounds: Some(4),
                team2_t_rounds: Some(3),
                is_unplayed: false,
            },
            MapRecord {
                match_id,
                map_number: 2,
                map_name: "Mirage".into(),
                mapstatsid: Some(match_id * 100 + 2),
                team1_rounds: Some(16),
                team2_rounds: Some(14),
                team1_ct_rounds: Some(6),
                team1_t_rounds: Some(6),
                team2_ct_rounds: Some(6),
                team2_t_rounds: Some(6),
                is_unplayed: false,
            },
        ];
        let veto = (1..=7)
            .map(|step_number| VetoStep {
                match_id,
                step_number,
                action: if step_number == 7 {
                    VetoAction::LeftOver
                } else {
                    VetoAction::Removed
                },
                team_name: (step_number != 7).then(|| "Alpha".to_owned()),
                map_name: "Nuke".into(),
            })
            .collect();
        let players = (0..10)
            .map(|i| MatchPlayer {
                match_id,
                player_id: 1000 + i,
                player_name: format!("p{i}"),
                team_id: if i < 5 { 10 } else { 20 },
                team_number: if i < 5 { 1 } else { 2 },
            })
            .collect();
        MatchOverview {
            match_record,
            maps,
            veto,
            players,
        }
    }

    fn stat(match_id: u64, map_number: u8, player_id: u64) -> PlayerStat {
        let mut stat = PlayerStat::empty(match_id, map_number, player_id);
        stat.player_name = format!("p{player_id}");
        stat.team_id = if player_id < 1005 { 10 } else { 20 };
        stat.kills = Some(20);
        stat.deaths = Some(14);
        stat.assists = Some(4);
        stat.flash_assists = Some(1);
        stat.hs_kills = Some(9);
        stat.kd_diff = Some(6);
        stat.adr = Some(82.0);
        stat.kast = Some(71.0);
        stat.fk_diff = Some(1);
        stat.rating = Some(1.18);
        stat.round_swing = Some(1.4);
        stat
    }

    fn round(match_id: u64, map_number: u8, round_number: u32, winner_team_id: u64) -> RoundOutcome {
        RoundOutcome {
            match_id,
            map_number,
            round_number,
            winner_team_id,
            winner_side: Side::Ct,
            win_type: WinType::Elimination,
        }
    }

    #[test]
    fn migrations_apply_once_and_stamp_the_version() {
        let db = db();
        assert_eq!(DbOps::version(&db), DB_VERSION);
        DbOps::migrate(&db).unwrap();
        assert_eq!(DbOps::version(&db), DB_VERSION);
    }

    #[test]
    fn refuses_a_database_from_the_future() {
        let db = SqliteDb::new_memory();
        db.get_pool()
            .unwrap()
            .pragma_update(None, "user_version", 99)
            .unwrap();
        assert!(DbOps::migrate(&db).is_err());
    }

    #[test]
    fn rediscovery_never_clobbers_status() {
        let db = db();
        db.upsert_discovery_page(0, &[entry(1, 0), entry(2, 0)]).unwrap();
        db.set_discovery_status(1, DiscoveryStatus::Scraped).unwrap();

        // the same listing page comes around again with a fresher url
        let mut seen_again = entry(1, 0);
        seen_again.url = "/matches/1/a-vs-b-rescheduled".into();
        db.upsert_discovery_page(0, &[seen_again]).unwrap();

        let pending = db.pending_overview(10).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].match_id, 2);
        assert!(db.offset_completed(0).unwrap());
        assert!(!db.offset_completed(100).unwrap());
    }

    #[test]
    fn pending_overview_is_ordered_and_limited() {
        let db = db();
        db.upsert_discovery_page(0, &[entry(30, 0), entry(10, 0), entry(20, 0)])
            .unwrap();
        let pending = db.pending_overview(2).unwrap();
        assert_eq!(
            pending.iter().map(|e| e.match_id).collect::<Vec<_>>(),
            vec![10, 20]
        );
    }

    #[test]
    fn overview_upsert_is_idempotent() {
        let db = db();
        let o = overview(1);
        db.upsert_overview(&o).unwrap();
        db.upsert_overview(&o).unwrap();

        let m = db.get_match(1).unwrap().unwrap();
        assert_eq!(m, o.match_record);
        let count: i64 = db
            .get_pool()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM maps WHERE match_id = 1", params![], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 2);
        let vetoes: i64 = db
            .get_pool()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM veto_steps WHERE match_id = 1", params![], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(vetoes, 7);
    }

    #[test]
    fn map_stats_write_moves_the_map_out_of_pending() {
        let db = db();
        db.upsert_overview(&overview(1)).unwrap();

        let pending = db.pending_map_stats(10).unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].map_number, 1);
        assert_eq!(pending[0].mapstatsid, 101);

        let stats: Vec<PlayerStat> = (1000..1010).map(|id| stat(1, 1, id)).collect();
        let rounds: Vec<RoundOutcome> = (1..=20).map(|n| round(1, 1, n, 10)).collect();
        db.insert_map_stats(&stats, &rounds).unwrap();

        let pending = db.pending_map_stats(10).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].map_number, 2);
        assert_eq!(db.player_stat_count(1, 1).unwrap(), 10);
        assert_eq!(db.round_numbers(1, 1).unwrap().len(), 20);

        // the freshly statted map now waits for the performance stage
        let perf_pending = db.pending_perf_economy(10).unwrap();
        assert_eq!(perf_pending.len(), 1);
        assert_eq!(perf_pending[0].map_number, 1);
    }

    #[test]
    fn merge_preserves_stage_one_columns() {
        let db = db();
        db.upsert_overview(&overview(1)).unwrap();
        let stats: Vec<PlayerStat> = (1000..1010).map(|id| stat(1, 1, id)).collect();
        let rounds: Vec<RoundOutcome> = (1..=20).map(|n| round(1, 1, n, 10)).collect();
        db.insert_map_stats(&stats, &rounds).unwrap();

        let perf = vec![PerformanceColumns {
            match_id: 1,
            map_number: 1,
            player_id: 1000,
            kpr: Some(0.83),
            dpr: Some(0.58),
            mk_rating: Some(1.1),
        }];
        db.merge_perf_economy(&perf, &[], &[]).unwrap();

        let merged = read_player_stat(&db.get_pool().unwrap(), 1, 1, 1000)
            .unwrap()
            .unwrap();
        assert_eq!(merged.kills, Some(20));
        assert_eq!(merged.rating, Some(1.18));
        assert_eq!(merged.round_swing, Some(1.4));
        assert_eq!(merged.kpr, Some(0.83));
        assert_eq!(merged.mk_rating, Some(1.1));

        // map no longer pending for the performance stage
        assert!(db.pending_perf_economy(10).unwrap().iter().all(|p| p.map_number != 1));
    }

    #[test]
    fn economy_rows_without_an_outcome_are_dropped() {
        let db = db();
        db.upsert_overview(&overview(1)).unwrap();
        let stats: Vec<PlayerStat> = (1000..1010).map(|id| stat(1, 1, id)).collect();
        let rounds: Vec<RoundOutcome> = (1..=3).map(|n| round(1, 1, n, 10)).collect();
        db.insert_map_stats(&stats, &rounds).unwrap();

        let economy: Vec<RoundEconomy> = [1u32, 2, 30]
            .iter()
            .map(|&round_number| RoundEconomy {
                match_id: 1,
                map_number: 1,
                round_number,
                team_id: 10,
                equipment_value: 4200,
                buy_type: BuyType::FullEco,
                side: Side::Ct,
            })
            .collect();
        db.merge_perf_economy(&[], &economy, &[]).unwrap();

        let written: i64 = db
            .get_pool()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM round_economy", params![], |r| r.get(0))
            .unwrap();
        assert_eq!(written, 2);
    }

    #[test]
    fn kill_matrix_cells_upsert_on_their_composite_key() {
        let db = db();
        db.upsert_overview(&overview(1)).unwrap();
        let stats: Vec<PlayerStat> = (1000..1010).map(|id| stat(1, 1, id)).collect();
        db.insert_map_stats(&stats, &[round(1, 1, 1, 10)]).unwrap();

        let cell = KillMatrixEntry {
            match_id: 1,
            map_number: 1,
            matrix_type: MatrixType::FirstKill,
            row_player_id: 1000,
            col_player_id: 1005,
            row_kills: 2,
            col_kills: 1,
        };
        db.merge_perf_economy(&[], &[], &[cell.clone()]).unwrap();
        let updated = KillMatrixEntry {
            row_kills: 3,
            ..cell
        };
        db.merge_perf_economy(&[], &[], &[updated]).unwrap();

        let (count, kills): (i64, i64) = db
            .get_pool()
            .unwrap()
            .query_row(
                "SELECT COUNT(*), MAX(row_kills) FROM kill_matrix WHERE match_id = 1",
                params![],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(kills, 3);
    }

    #[test]
    fn quarantine_round_trip() {
        let db = db();
        assert_eq!(db.quarantine_count().unwrap(), 0);
        db.insert_quarantine(&QuarantineEntry::new(
            "player_stat",
            Some(1),
            Some(2),
            r#"{"kills":-1}"#,
            "negative kills",
        ))
        .unwrap();

        assert_eq!(db.quarantine_count().unwrap(), 1);
        let recent = db.recent_quarantine(5).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].entity_type, "player_stat");
        assert_eq!(recent[0].match_id, Some(1));
        assert_eq!(recent[0].error, "negative kills");
    }

    #[test]
    fn forfeit_maps_never_reach_the_pending_queues() {
        let db = db();
        let mut o = overview(9);
        o.match_record.is_forfeit = true;
        o.match_record.team1_score = None;
        o.match_record.team2_score = None;
        o.maps = vec![MapRecord {
            match_id: 9,
            map_number: 1,
            map_name: "Default".into(),
            mapstatsid: None,
            team1_rounds: None,
            team2_rounds: None,
            team1_ct_rounds: None,
            team1_t_rounds: None,
            team2_ct_rounds: None,
            team2_t_rounds: None,
            is_unplayed: false,
        }];
        db.upsert_overview(&o).unwrap();

        assert!(db.pending_map_stats(10).unwrap().is_empty());
        assert!(db.pending_perf_economy(10).unwrap().is_empty());
        let m = db.get_match(9).unwrap().unwrap();
        assert!(m.is_forfeit);
        assert_eq!(m.team1_score, None);
    }
}

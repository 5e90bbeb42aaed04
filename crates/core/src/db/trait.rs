use crate::db::{
    DiscoveryEntry, DiscoveryStatus, KillMatrixEntry, MatchOverview, MatchRecord,
    PerformanceColumns, PlayerStat, QuarantineEntry, Result, RoundEconomy, RoundOutcome,
};

/// A map waiting for a later stage, identified by its stats-page id.
/// Ordering is ascending `(match_id, map_number)` so restarts observe the
/// same sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingMap {
    pub match_id: u64,
    pub map_number: u8,
    pub mapstatsid: u64,
}

pub trait DbOps {
    /// Applies outstanding numbered migrations in order. Schema mismatches
    /// surface here and the pipeline refuses to start.
    fn migrate(&self) -> Result<()>;

    fn version(&self) -> u64;

    // --- discovery ---

    /// Upserts the offset's listing entries and records the offset as
    /// complete, in one transaction. Re-discovery must never clobber an
    /// entry's status.
    fn upsert_discovery_page(&self, offset: u32, entries: &[DiscoveryEntry]) -> Result<()>;

    fn offset_completed(&self, offset: u32) -> Result<bool>;

    /// Discovery entries with `status = pending`, ascending match id.
    fn pending_overview(&self, limit: usize) -> Result<Vec<DiscoveryEntry>>;

    fn set_discovery_status(&self, match_id: u64, status: DiscoveryStatus) -> Result<()>;

    // --- overview ---

    /// Commits match + maps + veto + roster in one transaction.
    fn upsert_overview(&self, overview: &MatchOverview) -> Result<()>;

    fn get_match(&self, match_id: u64) -> Result<Option<MatchRecord>>;

    // --- map stats ---

    /// Maps with a non-null `mapstatsid` and no `player_stat` rows yet.
    fn pending_map_stats(&self, limit: usize) -> Result<Vec<PendingMap>>;

    /// Commits player stats + round outcomes in one transaction.
    fn insert_map_stats(&self, stats: &[PlayerStat], rounds: &[RoundOutcome]) -> Result<()>;

    // --- performance + economy ---

    /// Maps whose `player_stat` rows exist but still have a null `kpr`.
    fn pending_perf_economy(&self, limit: usize) -> Result<Vec<PendingMap>>;

    /// Read-merge-writes the performance columns onto existing player rows,
    /// then writes economy rows (filtered to rounds present in
    /// `round_outcome`) and kill-matrix cells, all in one transaction.
    fn merge_perf_economy(
        &self,
        perf: &[PerformanceColumns],
        economy: &[RoundEconomy],
        matrix: &[KillMatrixEntry],
    ) -> Result<()>;

    // --- quarantine ---

    fn insert_quarantine(&self, entry: &QuarantineEntry) -> Result<()>;

    fn quarantine_count(&self) -> Result<u64>;

    fn recent_quarantine(&self, limit: usize) -> Result<Vec<QuarantineEntry>>;

    // --- inspection ---

    fn player_stat_count(&self, match_id: u64, map_number: u8) -> Result<u64>;

    fn round_numbers(&self, match_id: u64, map_number: u8) -> Result<Vec<u32>>;

    /// Distinct round numbers that have economy rows.
    fn economy_rounds(&self, match_id: u64, map_number: u8) -> Result<Vec<u32>>;

    fn kill_matrix_count(&self, match_id: u64, map_number: u8) -> Result<u64>;
}

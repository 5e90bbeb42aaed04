use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Per-player, per-map statistics. Two stages populate disjoint column sets
/// of the same row: the map-stats stage fills the traditional columns, the
/// performance stage later fills `kpr`/`dpr`/`mk_rating`. A null `kpr` is
/// the sentinel for "performance stage has not run".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStat {
    pub match_id: u64,
    pub map_number: u8,
    pub player_id: u64,
    pub player_name: String,
    pub team_id: u64,

    // map-stats stage
    pub kills: Option<i32>,
    pub deaths: Option<i32>,
    pub assists: Option<i32>,
    pub flash_assists: Option<i32>,
    pub hs_kills: Option<i32>,
    pub kd_diff: Option<i32>,
    pub adr: Option<f64>,
    pub kast: Option<f64>,
    pub fk_diff: Option<i32>,
    pub rating: Option<f64>,
    pub opening_kills: Option<i32>,
    pub opening_deaths: Option<i32>,
    pub multi_kills: Option<i32>,
    pub clutch_wins: Option<i32>,
    pub traded_deaths: Option<i32>,
    /// Absent on rating-2.0 pages.
    pub round_swing: Option<f64>,

    // performance stage
    pub kpr: Option<f64>,
    pub dpr: Option<f64>,
    pub mk_rating: Option<f64>,
}

impl PlayerStat {
    pub fn empty(match_id: u64, map_number: u8, player_id: u64) -> Self {
        Self {
            match_id,
            map_number,
            player_id,
            player_name: String::new(),
            team_id: 0,
            kills: None,
            deaths: None,
            assists: None,
            flash_assists: None,
            hs_kills: None,
            kd_diff: None,
            adr: None,
            kast: None,
            fk_diff: None,
            rating: None,
            opening_kills: None,
            opening_deaths: None,
            multi_kills: None,
            clutch_wins: None,
            traded_deaths: None,
            round_swing: None,
            kpr: None,
            dpr: None,
            mk_rating: None,
        }
    }

    /// Layers the performance-stage columns onto an existing row, leaving
    /// every map-stats column untouched. The second half of the
    /// read-merge-write pattern.
    pub fn merge_performance(&mut self, perf: &PerformanceColumns) {
        self.kpr = perf.kpr;
        self.dpr = perf.dpr;
        self.mk_rating = perf.mk_rating;
    }
}

/// The columns the performance stage contributes to `PlayerStat`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceColumns {
    pub match_id: u64,
    pub map_number: u8,
    pub player_id: u64,
    pub kpr: Option<f64>,
    pub dpr: Option<f64>,
    pub mk_rating: Option<f64>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
pub enum MatrixType {
    All,
    FirstKill,
    Awp,
}

/// One cell of a 5x5 head-to-head kill grid. Three grids per played map
/// (all kills, first kills, AWP kills) give 75 rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KillMatrixEntry {
    pub match_id: u64,
    pub map_number: u8,
    pub matrix_type: MatrixType,
    pub row_player_id: u64,
    pub col_player_id: u64,
    pub row_kills: u32,
    pub col_kills: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_performance_preserves_map_stats_columns() {
        let mut stat = PlayerStat::empty(1, 1, 7998);
        stat.kills = Some(25);
        stat.deaths = Some(14);
        stat.rating = Some(1.45);

        stat.merge_performance(&PerformanceColumns {
            match_id: 1,
            map_number: 1,
            player_id: 7998,
            kpr: Some(0.79),
            dpr: Some(0.58),
            mk_rating: Some(1.2),
        });

        assert_eq!(stat.kills, Some(25));
        assert_eq!(stat.rating, Some(1.45));
        assert_eq!(stat.kpr, Some(0.79));
    }

    #[test]
    fn matrix_type_text_forms() {
        assert_eq!(MatrixType::FirstKill.to_string(), "first_kill");
        assert_eq!(MatrixType::Awp.to_string(), "awp");
    }
}

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Sentinel map name the site uses for forfeited (awarded) maps.
pub const FORFEIT_MAP_NAME: &str = "Default";

/// One match row. Teams and event are stored inline (id + name); no
/// normalisation into side tables, matching the site's own page model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub match_id: u64,
    /// Provenance: the site-relative URL the overview was fetched from.
    pub url: String,
    pub team1_id: u64,
    pub team1_name: String,
    pub team2_id: u64,
    pub team2_name: String,
    pub event_id: u64,
    pub event_name: String,
    /// For best-of-N this is maps won; for best-of-1 it is the raw round
    /// score of the single map. `best_of` disambiguates. Nullable on
    /// forfeits.
    pub team1_score: Option<u32>,
    pub team2_score: Option<u32>,
    pub best_of: u8,
    pub lan: bool,
    /// ISO date (yyyy-mm-dd) derived from the listing timestamp.
    pub date: String,
    pub is_forfeit: bool,
}

/// One map of a match. Round totals and the regulation CT/T breakdown come
/// from the overview page; `mapstatsid` is null for forfeited or unplayed
/// maps and gates the later stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapRecord {
    pub match_id: u64,
    /// 1-based position within the series.
    pub map_number: u8,
    pub map_name: String,
    pub mapstatsid: Option<u64>,
    pub team1_rounds: Option<u32>,
    pub team2_rounds: Option<u32>,
    pub team1_ct_rounds: Option<u32>,
    pub team1_t_rounds: Option<u32>,
    pub team2_ct_rounds: Option<u32>,
    pub team2_t_rounds: Option<u32>,
    /// Decider maps that were never played in a short series.
    pub is_unplayed: bool,
}

impl MapRecord {
    pub fn is_forfeit(&self) -> bool {
        self.map_name == FORFEIT_MAP_NAME
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
pub enum VetoAction {
    Removed,
    Picked,
    LeftOver,
}

/// One step of the pre-match veto. Exactly 7 steps regardless of best-of.
/// `team_name` is None iff the step is the final left-over map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VetoStep {
    pub match_id: u64,
    /// 1..=7.
    pub step_number: u8,
    pub action: VetoAction,
    pub team_name: Option<String>,
    pub map_name: String,
}

/// Roster entry; `team_number` is 1 or 2 and mirrors the overview layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchPlayer {
    pub match_id: u64,
    pub player_id: u64,
    pub player_name: String,
    pub team_id: u64,
    pub team_number: u8,
}

/// Everything the overview page yields for one match; persisted atomically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchOverview {
    pub match_record: MatchRecord,
    pub maps: Vec<MapRecord>,
    pub veto: Vec<VetoStep>,
    pub players: Vec<MatchPlayer>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forfeit_detection_uses_sentinel_name() {
        let map = MapRecord {
            match_id: 1,
            map_number: 1,
            map_name: FORFEIT_MAP_NAME.to_owned(),
            mapstatsid: None,
            team1_rounds: None,
            team2_rounds: None,
            team1_ct_rounds: None,
            team1_t_rounds: None,
            team2_ct_rounds: None,
            team2_t_rounds: None,
            is_unplayed: false,
        };
        assert!(map.is_forfeit());
    }

    #[test]
    fn veto_action_text_forms() {
        assert_eq!(VetoAction::Removed.to_string(), "removed");
        assert_eq!(VetoAction::LeftOver.to_string(), "left_over");
    }
}

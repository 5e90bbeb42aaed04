//! Economy page parser.
//!
//! Page contract: the whole dataset is one JSON blob in a
//! `<script id="economy-data" type="application/json">` element:
//!
//! ```json
//! {"rounds": [
//!   {"round": 1, "team1Value": 4400, "team2Value": 4150,
//!    "team1Won": false, "winnerIcon": "…/rounds/t_win.svg"}
//! ]}
//! ```
//!
//! The winner's side is inferred from the outcome icon URL and propagated
//! to both teams (the loser holds the opposite side). Buy types are derived
//! from the equipment-value thresholds. Overtime rounds may simply be
//! absent from the blob on shorter regulation formats; only rounds that are
//! present are emitted.

use super::{icon_stem, round_icon_outcome, selector};
use crate::db::{BuyType, Side};
use crate::error::ParseError;
use scraper::Html;
use serde::{Deserialize, Serialize};

const PAGE: &str = "economy";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomyPage {
    pub mapstatsid: u64,
    /// Two lines per present round, one per team.
    pub rounds: Vec<EconomyLine>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EconomyLine {
    pub round_number: u32,
    /// 1 or 2; the orchestrator resolves this to a team id via the match row.
    pub team_number: u8,
    pub equipment_value: u32,
    pub buy_type: BuyType,
    pub side: Side,
}

#[derive(Deserialize)]
struct EconomyBlob {
    rounds: Vec<BlobRound>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlobRound {
    round: u32,
    team1_value: u32,
    team2_value: u32,
    team1_won: bool,
    winner_icon: String,
}

pub fn parse_economy(html: &str, mapstatsid: u64) -> Result<EconomyPage, ParseError> {
    let doc = Html::parse_document(html);
    let blob_sel = selector("script#economy-data");

    let raw: String = doc
        .select(&blob_sel)
        .next()
        .map(|el| el.text().collect())
        .ok_or_else(|| ParseError::new(PAGE, "missing economy data blob"))?;
    let blob: EconomyBlob = serde_json::from_str(&raw)
        .map_err(|e| ParseError::new(PAGE, format!("bad economy blob: {e}")))?;

    let mut rounds = Vec::with_capacity(blob.rounds.len() * 2);
    for round in &blob.rounds {
        let stem = icon_stem(&round.winner_icon);
        let (winner_side, _) = round_icon_outcome(stem).ok_or_else(|| {
            ParseError::new(
                PAGE,
                format!("round {}: unknown winner icon {stem:?}", round.round),
            )
        })?;
        let team1_side = if round.team1_won {
            winner_side
        } else {
            winner_side.opposite()
        };

        for (team_number, value, side) in [
            (1u8, round.team1_value, team1_side),
            (2u8, round.team2_value, team1_side.opposite()),
        ] {
            rounds.push(EconomyLine {
                round_number: round.round,
                team_number,
                equipment_value: value,
                buy_type: BuyType::from_equipment_value(value),
                side,
            });
        }
    }

    Ok(EconomyPage { mapstatsid, rounds })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(rounds_json: &str) -> String {
        format!(
            r#"<html><body>
                 <script id="economy-data" type="application/json">{{"rounds":[{rounds_json}]}}</script>
               </body></html>"#
        )
    }

    fn round_json(round: u32, v1: u32, v2: u32, team1_won: bool, icon: &str) -> String {
        format!(
            r#"{{"round":{round},"team1Value":{v1},"team2Value":{v2},"team1Won":{team1_won},"winnerIcon":"https://x.org/rounds/{icon}.svg"}}"#
        )
    }

    #[test]
    fn emits_two_sided_lines_per_round() {
        let html = page(&[
            round_json(1, 4400, 4150, false, "t_win"),
            round_json(2, 19650, 23200, true, "bomb_defused"),
        ]
        .join(","));
        let economy = parse_economy(&html, 171234).unwrap();

        assert_eq!(economy.rounds.len(), 4);
        // round 1: team2 won as T, so team1 was CT
        assert_eq!(economy.rounds[0].team_number, 1);
        assert_eq!(economy.rounds[0].side, Side::Ct);
        assert_eq!(economy.rounds[0].buy_type, BuyType::FullEco);
        assert_eq!(economy.rounds[1].side, Side::T);
        // round 2: team1 defended the defuse as CT
        assert_eq!(economy.rounds[2].side, Side::Ct);
        assert_eq!(economy.rounds[2].buy_type, BuyType::SemiBuy);
        assert_eq!(economy.rounds[3].buy_type, BuyType::FullBuy);
    }

    #[test]
    fn shorter_formats_omit_overtime_rounds() {
        let html = page(&round_json(24, 30000, 28000, true, "ct_win"));
        let economy = parse_economy(&html, 1).unwrap();
        assert_eq!(economy.rounds.len(), 2);
        assert_eq!(economy.rounds[0].round_number, 24);
    }

    #[test]
    fn missing_blob_is_a_parse_error() {
        assert!(parse_economy("<html><body></body></html>", 1).is_err());
    }

    #[test]
    fn unknown_winner_icon_is_a_parse_error() {
        let html = page(&round_json(1, 100, 100, true, "mystery"));
        assert!(parse_economy(&html, 1).is_err());
    }
}

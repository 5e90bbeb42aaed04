//! Map-stats page parser.
//!
//! Page contract:
//! - `.match-info-box` — `.team-left`/`.team-right` blocks with a
//!   `/stats/teams/{id}/…` link and a `.bold` round total; a
//!   `.match-info-row.round-breakdown .right` whose spans carry
//!   `ct-color`/`t-color` classes for regulation halves (overtime spans are
//!   unclassed and excluded from the CT/T columns). Span pairs alternate
//!   team1 : team2.
//! - two `table.stats-table` elements, one per team, whose `th.st-player`
//!   header carries the team link. Row cells are `td.st-*` columns. The
//!   rating-3.0 schema adds a "Swing" column; its presence is detected from
//!   the header text and `round_swing` is absent otherwise.
//! - `div.player-extended-stats[data-player-id]` panels carrying opening
//!   duel, multi-kill, clutch and trade counts as data attributes.
//! - `.round-history-con` containers with two `.round-history-team-row`
//!   rows of outcome icons. One container holds regulation plus any inline
//!   single overtime; extended overtime adds a second container. Rounds are
//!   normalised to one flat 1-based sequence across containers.

use super::{
    count_with_paren, decimal, icon_stem, id_from_path, percent, round_icon_outcome, selector,
    signed_count, text_of, RatingSchema,
};
use crate::db::{Side, WinType};
use crate::error::ParseError;
use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const PAGE: &str = "map stats";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapStatsPage {
    pub mapstatsid: u64,
    pub rating_schema: RatingSchema,
    pub team1_id: u64,
    pub team2_id: u64,
    pub team1_rounds: u32,
    pub team2_rounds: u32,
    pub team1_ct: u32,
    pub team1_t: u32,
    pub team2_ct: u32,
    pub team2_t: u32,
    pub players: Vec<PlayerStatLine>,
    pub rounds: Vec<RoundOutcomeLine>,
}

/// One row of the per-team stats table, with the extended-panel counters
/// merged in when the page carries them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStatLine {
    pub player_id: u64,
    pub player_name: String,
    pub team_id: u64,
    pub kills: i32,
    pub hs_kills: i32,
    pub assists: i32,
    pub flash_assists: i32,
    pub deaths: i32,
    pub kast: Option<f64>,
    pub kd_diff: i32,
    pub adr: Option<f64>,
    pub fk_diff: i32,
    pub rating: f64,
    pub opening_kills: Option<i32>,
    pub opening_deaths: Option<i32>,
    pub multi_kills: Option<i32>,
    pub clutch_wins: Option<i32>,
    pub traded_deaths: Option<i32>,
    /// None on rating-2.0 pages.
    pub round_swing: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoundOutcomeLine {
    pub round_number: u32,
    pub winner_team_id: u64,
    pub winner_side: Side,
    pub win_type: WinType,
}

pub fn parse_map_stats(html: &str, mapstatsid: u64) -> Result<MapStatsPage, ParseError> {
    let doc = Html::parse_document(html);

    let (team1_id, team1_rounds) = parse_team_box(&doc, "team-left")?;
    let (team2_id, team2_rounds) = parse_team_box(&doc, "team-right")?;
    let (team1_ct, team1_t, team2_ct, team2_t) = parse_breakdown(&doc)?;
    let rating_schema = detect_schema(&doc);
    let extended = parse_extended_panels(&doc);
    let players = parse_stats_tables(&doc, rating_schema, &extended)?;
    let rounds = parse_round_history(&doc, team1_id, team2_id)?;

    Ok(MapStatsPage {
        mapstatsid,
        rating_schema,
        team1_id,
        team2_id,
        team1_rounds,
        team2_rounds,
        team1_ct,
        team1_t,
        team2_ct,
        team2_t,
        players,
        rounds,
    })
}

fn parse_team_box(doc: &Html, class: &str) -> Result<(u64, u32), ParseError> {
    let link_sel = selector(&format!(".match-info-box .{class} a[href*='/stats/teams/']"));
    let score_sel = selector(&format!(".match-info-box .{class} .bold"));

    let id = doc
        .select(&link_sel)
        .next()
        .and_then(|a| a.value().attr("href"))
        .and_then(|href| id_from_path(href, "teams"))
        .ok_or_else(|| ParseError::new(PAGE, format!("missing {class} team link")))?;
    let rounds = doc
        .select(&score_sel)
        .next()
        .and_then(|el| text_of(el).parse().ok())
        .ok_or_else(|| ParseError::new(PAGE, format!("missing {class} round total")))?;
    Ok((id, rounds))
}

/// Regulation halves only: spans alternate team1 : team2 and carry a side
/// class; unclassed overtime spans are skipped.
fn parse_breakdown(doc: &Html) -> Result<(u32, u32, u32, u32), ParseError> {
    let span_sel = selector(".match-info-row.round-breakdown .right span");
    let (mut t1_ct, mut t1_t, mut t2_ct, mut t2_t) = (0, 0, 0, 0);
    let mut seen = 0usize;

    for (i, span) in doc.select(&span_sel).enumerate() {
        let value: u32 = match text_of(span).parse() {
            Ok(v) => v,
            Err(_) => continue,
        };
        let is_ct = if span.value().classes().any(|c| c == "ct-color") {
            true
        } else if span.value().classes().any(|c| c == "t-color") {
            false
        } else {
            continue;
        };
        seen += 1;
        match (i % 2 == 0, is_ct) {
            (true, true) => t1_ct += value,
            (true, false) => t1_t += value,
            (false, true) => t2_ct += value,
            (false, false) => t2_t += value,
        }
    }

    if seen == 0 {
        return Err(ParseError::new(PAGE, "missing round breakdown"));
    }
    Ok((t1_ct, t1_t, t2_ct, t2_t))
}

/// The rating-3.0 table carries a "Swing" column; the header text is the
/// stable discriminator between the two schemas.
fn detect_schema(doc: &Html) -> RatingSchema {
    let th_sel = selector("table.stats-table th");
    if doc.select(&th_sel).any(|th| text_of(th) == "Swing") {
        RatingSchema::V3
    } else {
        RatingSchema::V2
    }
}

struct ExtendedCounters {
    opening_kills: i32,
    opening_deaths: i32,
    multi_kills: i32,
    clutch_wins: i32,
    traded_deaths: i32,
}

fn parse_extended_panels(doc: &Html) -> HashMap<u64, ExtendedCounters> {
    let panel_sel = selector("div.player-extended-stats[data-player-id]");
    let mut panels = HashMap::new();
    for panel in doc.select(&panel_sel) {
        let attr_i32 = |name: &str| -> Option<i32> {
            panel.value().attr(name).and_then(|v| v.trim().parse().ok())
        };
        let Some(player_id) = panel
            .value()
            .attr("data-player-id")
            .and_then(|v| v.parse().ok())
        else {
            continue;
        };
        let (Some(opening_kills), Some(opening_deaths)) =
            (attr_i32("data-opening-kills"), attr_i32("data-opening-deaths"))
        else {
            continue;
        };
        panels.insert(
            player_id,
            ExtendedCounters {
                opening_kills,
                opening_deaths,
                multi_kills: attr_i32("data-multi-kills").unwrap_or(0),
                clutch_wins: attr_i32("data-clutch-wins").unwrap_or(0),
                traded_deaths: attr_i32("data-traded-deaths").unwrap_or(0),
            },
        );
    }
    panels
}

fn parse_stats_tables(
    doc: &Html,
    schema: RatingSchema,
    extended: &HashMap<u64, ExtendedCounters>,
) -> Result<Vec<PlayerStatLine>, ParseError> {
    let table_sel = selector("table.stats-table");
    let team_sel = selector("th.st-player a[href*='/stats/teams/']");
    let row_sel = selector("tbody tr");

    let mut players = Vec::new();
    for table in doc.select(&table_sel) {
        let team_id = table
            .select(&team_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| id_from_path(href, "teams"))
            .ok_or_else(|| ParseError::new(PAGE, "stats table without team header"))?;
        for row in table.select(&row_sel) {
            players.push(parse_stats_row(row, team_id, schema, extended)?);
        }
    }

    if players.is_empty() {
        return Err(ParseError::new(PAGE, "no player rows found"));
    }
    Ok(players)
}

fn parse_stats_row(
    row: ElementRef,
    team_id: u64,
    schema: RatingSchema,
    extended: &HashMap<u64, ExtendedCounters>,
) -> Result<PlayerStatLine, ParseError> {
    let cell = |class: &str| -> Option<String> {
        row.select(&selector(&format!("td.{class}")))
            .next()
            .map(text_of)
    };
    let player_link_sel = selector("td.st-player a[href*='/stats/players/']");

    let link = row
        .select(&player_link_sel)
        .next()
        .ok_or_else(|| ParseError::new(PAGE, "player row without player link"))?;
    let player_id = link
        .value()
        .attr("href")
        .and_then(|href| id_from_path(href, "players"))
        .ok_or_else(|| ParseError::new(PAGE, "unparseable player href"))?;
    let player_name = text_of(link);

    let bad = |what: &str| ParseError::new(PAGE, format!("player {player_id}: bad {what}"));

    let (kills, hs) = cell("st-kills")
        .as_deref()
        .and_then(count_with_paren)
        .ok_or_else(|| bad("kills"))?;
    let (assists, flash) = cell("st-assists")
        .as_deref()
        .and_then(count_with_paren)
        .ok_or_else(|| bad("assists"))?;
    let deaths: i32 = cell("st-deaths")
        .and_then(|t| t.trim().parse().ok())
        .ok_or_else(|| bad("deaths"))?;
    let kast = cell("st-kdratio").as_deref().and_then(percent);
    let kd_diff = cell("st-kddiff")
        .as_deref()
        .and_then(signed_count)
        .ok_or_else(|| bad("k-d diff"))?;
    let adr = cell("st-adr").as_deref().and_then(decimal);
    let fk_diff = cell("st-fkdiff")
        .as_deref()
        .and_then(signed_count)
        .ok_or_else(|| bad("fk diff"))?;
    let rating = cell("st-rating")
        .as_deref()
        .and_then(decimal)
        .ok_or_else(|| bad("rating"))?;
    let round_swing = match schema {
        RatingSchema::V3 => cell("st-swing").as_deref().and_then(percent),
        RatingSchema::V2 => None,
    };

    let ext = extended.get(&player_id);
    Ok(PlayerStatLine {
        player_id,
        player_name,
        team_id,
        kills,
        hs_kills: hs.unwrap_or(0),
        assists,
        flash_assists: flash.unwrap_or(0),
        deaths,
        kast,
        kd_diff,
        adr,
        fk_diff,
        rating,
        opening_kills: ext.map(|e| e.opening_kills),
        opening_deaths: ext.map(|e| e.opening_deaths),
        multi_kills: ext.map(|e| e.multi_kills),
        clutch_wins: ext.map(|e| e.clutch_wins),
        traded_deaths: ext.map(|e| e.traded_deaths),
        round_swing,
    })
}

/// Flattens the one-or-two round-history containers into a single 1-based
/// round sequence. Each slot has the winner's icon on exactly one team row;
/// slots where both rows show the empty icon carry no round.
fn parse_round_history(
    doc: &Html,
    team1_id: u64,
    team2_id: u64,
) -> Result<Vec<RoundOutcomeLine>, ParseError> {
    let con_sel = selector(".round-history-con");
    let row_sel = selector(".round-history-team-row");
    let icon_sel = selector("img.round-history-outcome");

    let mut rounds = Vec::new();
    let mut round_number = 0u32;
    for container in doc.select(&con_sel) {
        let rows: Vec<ElementRef> = container.select(&row_sel).collect();
        if rows.len() != 2 {
            return Err(ParseError::new(
                PAGE,
                format!("round history container with {} team rows", rows.len()),
            ));
        }
        let stems = |row: ElementRef| -> Vec<String> {
            row.select(&icon_sel)
                .filter_map(|img| img.value().attr("src"))
                .map(|src| icon_stem(src).to_owned())
                .collect()
        };
        let team1_icons = stems(rows[0]);
        let team2_icons = stems(rows[1]);

        for i in 0..team1_icons.len().max(team2_icons.len()) {
            let outcome1 = team1_icons.get(i).and_then(|s| round_icon_outcome(s));
            let outcome2 = team2_icons.get(i).and_then(|s| round_icon_outcome(s));
            let (winner_team_id, (winner_side, win_type)) = match (outcome1, outcome2) {
                (Some(o), None) => (team1_id, o),
                (None, Some(o)) => (team2_id, o),
                (None, None) => continue,
                (Some(_), Some(_)) => {
                    return Err(ParseError::new(
                        PAGE,
                        format!("both teams marked winner at history slot {i}"),
                    ))
                }
            };
            round_number += 1;
            rounds.push(RoundOutcomeLine {
                round_number,
                winner_team_id,
                winner_side,
                win_type,
            });
        }
    }

    if rounds.is_empty() {
        return Err(ParseError::new(PAGE, "no round history found"));
    }
    Ok(rounds)
}

//! Match-overview parser.
//!
//! Page contract (the parts this parser reads):
//! - `.timeAndEvent .date[data-unix]` — millisecond timestamp, converted to
//!   an ISO date here.
//! - `.timeAndEvent .event a[href^='/events/']` — event id + name.
//! - `.team1-gradient` / `.team2-gradient` — team link (`/team/{id}/…`),
//!   `.teamName`, and a `.won`/`.lost`/`.tie` series score. The visible
//!   score is maps won for best-of-N but the raw round score for best-of-1;
//!   it is stored as-is and `best_of` disambiguates.
//! - first `.veto-box` (`.padding.preformatted-text`) — "Best of N (LAN)".
//! - second `.veto-box` — one div per veto step, "N. Team removed Map" /
//!   "N. Team picked Map" / "N. Map was left over".
//! - `div.mapholder` per map — `.mapname`, optional `a.results-stats` link
//!   carrying the mapstatsid, team scores ("-" when the map was never
//!   played), and `.results-center-half-score` spans. Regulation half spans
//!   carry a `ct`/`t` class; overtime spans carry none and contribute to
//!   totals only.
//! - `.lineup` blocks — team link plus five `.player` cells.
//!
//! A full forfeit is detected by the sentinel map name "Default" on any map
//! holder; partial forfeits carry a real map name.

use super::{id_from_path, selector, text_of};
use crate::db::{
    MapRecord, MatchOverview, MatchPlayer, MatchRecord, VetoAction, VetoStep, FORFEIT_MAP_NAME,
};
use crate::error::ParseError;
use scraper::{ElementRef, Html};

const PAGE: &str = "match overview";

pub fn parse_match_overview(html: &str, match_id: u64) -> Result<MatchOverview, ParseError> {
    let doc = Html::parse_document(html);

    let date = parse_date(&doc)?;
    let (event_id, event_name) = parse_event(&doc)?;
    let (team1_id, team1_name, team1_score) = parse_team(&doc, 1)?;
    let (team2_id, team2_name, team2_score) = parse_team(&doc, 2)?;
    let (best_of, lan) = parse_series_format(&doc)?;
    let veto = parse_veto(&doc, match_id);
    let maps = parse_maps(&doc, match_id)?;
    let players = parse_lineups(&doc, match_id)?;

    let is_forfeit = maps.iter().any(|m| m.is_forfeit());

    Ok(MatchOverview {
        match_record: MatchRecord {
            match_id,
            // provenance URL is stamped by the orchestrator from the
            // discovery entry
            url: String::new(),
            team1_id,
            team1_name,
            team2_id,
            team2_name,
            event_id,
            event_name,
            team1_score,
            team2_score,
            best_of,
            lan,
            date,
            is_forfeit,
        },
        maps,
        veto,
        players,
    })
}

fn parse_date(doc: &Html) -> Result<String, ParseError> {
    let date_sel = selector(".timeAndEvent .date[data-unix]");
    let ms: i64 = doc
        .select(&date_sel)
        .next()
        .and_then(|el| el.value().attr("data-unix"))
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| ParseError::new(PAGE, "missing or bad date timestamp"))?;
    let date = chrono::DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| ParseError::new(PAGE, format!("timestamp {ms} out of range")))?;
    Ok(date.date_naive().to_string())
}

fn parse_event(doc: &Html) -> Result<(u64, String), ParseError> {
    let event_sel = selector(".timeAndEvent .event a[href^='/events/']");
    let link = doc
        .select(&event_sel)
        .next()
        .ok_or_else(|| ParseError::new(PAGE, "missing event link"))?;
    let id = link
        .value()
        .attr("href")
        .and_then(|href| id_from_path(href, "events"))
        .ok_or_else(|| ParseError::new(PAGE, "unparseable event href"))?;
    Ok((id, text_of(link)))
}

fn parse_team(doc: &Html, team_number: u8) -> Result<(u64, String, Option<u32>), ParseError> {
    let root_sel = selector(&format!(".team{team_number}-gradient"));
    let link_sel = selector("a[href^='/team/']");
    let name_sel = selector(".teamName");
    let score_sel = selector(".won, .lost, .tie");

    let root = doc
        .select(&root_sel)
        .next()
        .ok_or_else(|| ParseError::new(PAGE, format!("missing team{team_number} block")))?;
    let id = root
        .select(&link_sel)
        .next()
        .and_then(|a| a.value().attr("href"))
        .and_then(|href| id_from_path(href, "team"))
        .ok_or_else(|| ParseError::new(PAGE, format!("missing team{team_number} link")))?;
    let name = root
        .select(&name_sel)
        .next()
        .map(text_of)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ParseError::new(PAGE, format!("missing team{team_number} name")))?;
    // absent on forfeits
    let score = root
        .select(&score_sel)
        .next()
        .and_then(|el| text_of(el).parse().ok());
    Ok((id, name, score))
}

fn parse_series_format(doc: &Html) -> Result<(u8, bool), ParseError> {
    let format_sel = selector(".veto-box .padding.preformatted-text");
    let text = doc
        .select(&format_sel)
        .next()
        .map(text_of)
        .ok_or_else(|| ParseError::new(PAGE, "missing series format box"))?;
    let best_of: u8 = text
        .split("Best of ")
        .nth(1)
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| ParseError::new(PAGE, format!("unparseable series format: {text}")))?;
    Ok((best_of, text.contains("(LAN)")))
}

fn parse_veto(doc: &Html, match_id: u64) -> Vec<VetoStep> {
    let line_sel = selector(".veto-box .padding div");
    doc.select(&line_sel)
        .filter_map(|el| parse_veto_line(match_id, &text_of(el)))
        .collect()
}

/// "1. Vitality removed Nuke" / "3. Spirit picked Inferno" /
/// "7. Dust2 was left over". Lines that do not match are not veto steps.
fn parse_veto_line(match_id: u64, line: &str) -> Option<VetoStep> {
    let (num, rest) = line.split_once(". ")?;
    let step_number: u8 = num.trim().parse().ok()?;
    let rest = rest.trim();

    if let Some(map_name) = rest.strip_suffix(" was left over") {
        return Some(VetoStep {
            match_id,
            step_number,
            action: VetoAction::LeftOver,
            team_name: None,
            map_name: map_name.to_owned(),
        });
    }
    let (action, team, map) = if let Some((team, map)) = rest.split_once(" removed ") {
        (VetoAction::Removed, team, map)
    } else if let Some((team, map)) = rest.split_once(" picked ") {
        (VetoAction::Picked, team, map)
    } else {
        return None;
    };
    Some(VetoStep {
        match_id,
        step_number,
        action,
        team_name: Some(team.to_owned()),
        map_name: map.to_owned(),
    })
}

fn parse_maps(doc: &Html, match_id: u64) -> Result<Vec<MapRecord>, ParseError> {
    let holder_sel = selector("div.mapholder");
    let name_sel = selector(".mapname");
    let stats_sel = selector("a.results-stats");
    let left_sel = selector(".results-left .results-team-score");
    let right_sel = selector(".results-right .results-team-score");
    let half_sel = selector(".results-center-half-score span");

    let mut maps = Vec::new();
    for (idx, holder) in doc.select(&holder_sel).enumerate() {
        let map_number = (idx + 1) as u8;
        let map_name = holder
            .select(&name_sel)
            .next()
            .map(text_of)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ParseError::new(PAGE, format!("map {map_number} missing name")))?;

        let mapstatsid = holder
            .select(&stats_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| id_from_path(href, "mapstatsid"));

        let team1 = score_cell(holder, &left_sel);
        let team2 = score_cell(holder, &right_sel);
        let is_unplayed =
            matches!(team1, ScoreCell::Dash) && map_name != FORFEIT_MAP_NAME;

        let mut halves = HalfTotals::default();
        for (i, span) in holder.select(&half_sel).enumerate() {
            let value: u32 = match text_of(span).parse() {
                Ok(v) => v,
                Err(_) => continue,
            };
            let classes: Vec<&str> = span.value().classes().collect();
            // overtime spans carry no side class; totals already include them
            let side = if classes.contains(&"ct") {
                Some(true)
            } else if classes.contains(&"t") {
                Some(false)
            } else {
                None
            };
            halves.add(i % 2 == 0, side, value);
        }

        maps.push(MapRecord {
            match_id,
            map_number,
            map_name,
            mapstatsid,
            team1_rounds: team1.value(),
            team2_rounds: team2.value(),
            team1_ct_rounds: halves.team1_ct,
            team1_t_rounds: halves.team1_t,
            team2_ct_rounds: halves.team2_ct,
            team2_t_rounds: halves.team2_t,
            is_unplayed,
        });
    }

    if maps.is_empty() {
        return Err(ParseError::new(PAGE, "no map holders found"));
    }
    Ok(maps)
}

enum ScoreCell {
    Value(u32),
    Dash,
    Missing,
}

impl ScoreCell {
    fn value(&self) -> Option<u32> {
        match self {
            Self::Value(v) => Some(*v),
            _ => None,
        }
    }
}

fn score_cell(holder: ElementRef, sel: &scraper::Selector) -> ScoreCell {
    match holder.select(sel).next() {
        None => ScoreCell::Missing,
        Some(el) => {
            let text = text_of(el);
            if text == "-" {
                ScoreCell::Dash
            } else {
                text.parse().map(ScoreCell::Value).unwrap_or(ScoreCell::Missing)
            }
        }
    }
}

#[derive(Default)]
struct HalfTotals {
    team1_ct: Option<u32>,
    team1_t: Option<u32>,
    team2_ct: Option<u32>,
    team2_t: Option<u32>,
}

impl HalfTotals {
    fn add(&mut self, is_team1: bool, side: Option<bool>, value: u32) {
        let Some(is_ct) = side else { return };
        let slot = match (is_team1, is_ct) {
            (true, true) => &mut self.team1_ct,
            (true, false) => &mut self.team1_t,
            (false, true) => &mut self.team2_ct,
            (false, false) => &mut self.team2_t,
        };
        *slot = Some(slot.unwrap_or(0) + value);
    }
}

fn parse_lineups(doc: &Html, match_id: u64) -> Result<Vec<MatchPlayer>, ParseError> {
    let lineup_sel = selector(".lineup");
    let team_sel = selector("a[href^='/team/']");
    let player_sel = selector(".player a[href^='/player/']");

    let mut players = Vec::new();
    for (idx, lineup) in doc.select(&lineup_sel).enumerate() {
        let team_number = (idx + 1) as u8;
        let team_id = lineup
            .select(&team_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| id_from_path(href, "team"))
            .ok_or_else(|| {
                ParseError::new(PAGE, format!("lineup {team_number} missing team link"))
            })?;
        for link in lineup.select(&player_sel) {
            let player_id = link
                .value()
                .attr("href")
                .and_then(|href| id_from_path(href, "player"))
                .ok_or_else(|| ParseError::new(PAGE, "unparseable player href"))?;
            players.push(MatchPlayer {
                match_id,
                player_id,
                player_name: text_of(link),
                team_id,
                team_number,
            });
        }
    }

    if players.is_empty() {
        return Err(ParseError::new(PAGE, "no lineups found"));
    }
    Ok(players)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lineup_html(team_id: u64, player_ids: [u64; 5]) -> String {
        let players = player_ids
            .iter()
            .map(|id| {
                format!(
                    r#"<td class="player"><a href="/player/{id}/player-{id}">player-{id}</a></td>"#
                )
            })
            .collect::<String>();
        format!(
            r#"<div class="lineup">
                 <a href="/team/{team_id}/team-{team_id}">team-{team_id}</a>
                 <table><tbody><tr>{players}</tr></tbody></table>
               </div>"#
        )
    }

    fn bo3_overview_html() -> String {
        format!(
            r#"<div class="match-page">
              <div class="timeAndEvent">
                <div class="date" data-unix="1718052000000">10 June 2024</div>
                <div class="event"><a href="/events/7148/blast-premier">BLAST Premier Spring Final</a></div>
              </div>
              <div class="team1-gradient">
                <a href="/team/9565/vitality"><div class="teamName">Vitality</div></a>
                <div class="team1-score won">2</div>
              </div>
              <div class="team2-gradient">
                <a href="/team/7020/spirit"><div class="teamName">Spirit</div></a>
                <div class="team2-score lost">1</div>
              </div>
              <div class="standard-box veto-box">
                <div class="padding preformatted-text">Best of 3 (LAN)

* Grand final</div>
              </div>
              <div class="standard-box veto-box">
                <div class="padding">
                  <div>1. Vitality removed Nuke</div>
                  <div>2. Spirit removed Overpass</div>
                  <div>3. Vitality picked Inferno</div>
                  <div>4. Spirit picked Mirage</div>
                  <div>5. Vitality removed Vertigo</div>
                  <div>6. Spirit removed Ancient</div>
                  <div>7. Dust2 was left over</div>
                </div>
              </div>
              <div class="mapholder">
                <div class="mapname">Inferno</div>
                <div class="results">
                  <div class="results-left"><div class="results-team-score">13</div></div>
                  <div class="results-center"><div class="results-center-half-score">(<span class="ct">9</span>:<span class="t">3</span>; <span class="t">4</span>:<span class="ct">4</span>)</div></div>
                  <div class="results-right"><div class="results-team-score">7</div></div>
                  <a class="results-stats" href="/stats/matches/mapstatsid/171234/vitality-vs-spirit">STATS</a>
                </div>
              </div>
              <div class="mapholder">
                <div class="mapname">Mirage</div>
                <div class="results">
                  <div class="results-left"><div class="results-team-score">16</div></div>
                  <div class="results-center"><div class="results-center-half-score">(<span class="t">6</span>:<span class="ct">6</span>; <span class="ct">6</span>:<span class="t">6</span>; <span>4</span>:<span>2</span>)</div></div>
                  <div class="results-right"><div class="results-team-score">14</div></div>
                  <a class="results-stats" href="/stats/matches/mapstatsid/171235/vitality-vs-spirit">STATS</a>
                </div>
              </div>
              <div class="mapholder">
                <div class="mapname">Dust2</div>
                <div class="results">
                  <div class="results-left"><div class="results-team-score">-</div></div>
                  <div class="results-right"><div class="results-team-score">-</div></div>
                </div>
              </div>
              <div class="lineups">{lineup1}{lineup2}</div>
            </div>"#,
            lineup1 = lineup_html(9565, [101, 102, 103, 104, 105]),
            lineup2 = lineup_html(7020, [201, 202, 203, 204, 205]),
        )
    }

    #[test]
    fn parses_a_bo3_with_overtime_and_unplayed_decider() {
        let overview = parse_match_overview(&bo3_overview_html(), 2372000).unwrap();
        let m = &overview.match_record;
        assert_eq!(m.match_id, 2372000);
        assert_eq!(m.team1_id, 9565);
        assert_eq!(m.team1_name, "Vitality");
        assert_eq!(m.team2_id, 7020);
        assert_eq!(m.event_id, 7148);
        assert_eq!(m.team1_score, Some(2));
        assert_eq!(m.team2_score, Some(1));
        assert_eq!(m.best_of, 3);
        assert!(m.lan);
        assert_eq!(m.date, "2024-06-10");
        assert!(!m.is_forfeit);

        assert_eq!(overview.maps.len(), 3);
        let inferno = &overview.maps[0];
        assert_eq!(inferno.map_name, "Inferno");
        assert_eq!(inferno.mapstatsid, Some(171234));
        assert_eq!(inferno.team1_rounds, Some(13));
        assert_eq!(inferno.team2_rounds, Some(7));
        assert_eq!(inferno.team1_ct_rounds, Some(9));
        assert_eq!(inferno.team1_t_rounds, Some(4));
        assert_eq!(inferno.team2_ct_rounds, Some(4));
        assert_eq!(inferno.team2_t_rounds, Some(3));
        assert!(!inferno.is_unplayed);

        // overtime spans carry no side class and only affect totals
        let mirage = &overview.maps[1];
        assert_eq!(mirage.team1_rounds, Some(16));
        assert_eq!(mirage.team1_ct_rounds, Some(6));
        assert_eq!(mirage.team1_t_rounds, Some(6));
        assert_eq!(mirage.team2_ct_rounds, Some(6));
        assert_eq!(mirage.team2_t_rounds, Some(6));

        let decider = &overview.maps[2];
        assert!(decider.is_unplayed);
        assert_eq!(decider.mapstatsid, None);
        assert_eq!(decider.team1_rounds, None);

        assert_eq!(overview.veto.len(), 7);
        assert_eq!(overview.veto[0].action, VetoAction::Removed);
        assert_eq!(overview.veto[0].team_name.as_deref(), Some("Vitality"));
        assert_eq!(overview.veto[0].map_name, "Nuke");
        assert_eq!(overview.veto[6].action, VetoAction::LeftOver);
        assert_eq!(overview.veto[6].team_name, None);
        assert_eq!(overview.veto[6].map_name, "Dust2");

        assert_eq!(overview.players.len(), 10);
        assert!(overview
            .players
            .iter()
            .filter(|p| p.team_number == 1)
            .all(|p| p.team_id == 9565));
        assert_eq!(
            overview.players.iter().filter(|p| p.team_number == 2).count(),
            5
        );
    }

    #[test]
    fn detects_full_forfeit_from_sentinel_map() {
        let html = format!(
            r#"<div class="match-page">
              <div class="timeAndEvent">
                <div class="date" data-unix="1718052000000"></div>
                <div class="event"><a href="/events/7148/ev">Event</a></div>
              </div>
              <div class="team1-gradient">
                <a href="/team/9565/a"><div class="teamName">Alpha</div></a>
              </div>
              <div class="team2-gradient">
                <a href="/team/7020/b"><div class="teamName">Bravo</div></a>
              </div>
              <div class="standard-box veto-box">
                <div class="padding preformatted-text">Best of 3 (Online)</div>
              </div>
              <div class="standard-box veto-box">
                <div class="padding">
                  <div>1. Alpha removed Nuke</div>
                  <div>2. Bravo removed Overpass</div>
                  <div>3. Alpha picked Inferno</div>
                  <div>4. Bravo picked Mirage</div>
                  <div>5. Alpha removed Vertigo</div>
                  <div>6. Bravo removed Ancient</div>
                  <div>7. Dust2 was left over</div>
                </div>
              </div>
              <div class="mapholder">
                <div class="mapname">Default</div>
                <div class="results">
                  <div class="results-left"><div class="results-team-score">1</div></div>
                  <div class="results-right"><div class="results-team-score">0</div></div>
                </div>
              </div>
              <div class="lineups">{lineup1}{lineup2}</div>
            </div>"#,
            lineup1 = lineup_html(9565, [1, 2, 3, 4, 5]),
            lineup2 = lineup_html(7020, [6, 7, 8, 9, 10]),
        );

        let overview = parse_match_overview(&html, 9).unwrap();
        assert!(overview.match_record.is_forfeit);
        assert!(!overview.match_record.lan);
        assert_eq!(overview.match_record.team1_score, None);
        assert_eq!(overview.maps.len(), 1);
        assert!(overview.maps[0].is_forfeit());
        assert!(!overview.maps[0].is_unplayed);
        assert_eq!(overview.maps[0].mapstatsid, None);
    }

    #[test]
    fn bo1_scores_are_raw_round_scores() {
        let html = bo3_overview_html()
            .replace("Best of 3 (LAN)", "Best of 1 (LAN)")
            .replace(
                r#"<div class="team1-score won">2</div>"#,
                r#"<div class="team1-score won">16</div>"#,
            )
            .replace(
                r#"<div class="team2-score lost">1</div>"#,
                r#"<div class="team2-score lost">14</div>"#,
            );
        let overview = parse_match_overview(&html, 5).unwrap();
        assert_eq!(overview.match_record.best_of, 1);
        assert_eq!(overview.match_record.team1_score, Some(16));
        assert_eq!(overview.match_record.team2_score, Some(14));
    }

    #[test]
    fn rejects_page_without_teams() {
        assert!(parse_match_overview("<html><body/></html>", 1).is_err());
    }
}

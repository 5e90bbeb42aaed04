//! Performance page parser.
//!
//! Page contract:
//! - `div.player-performance-card[data-player-id]` per player, with the
//!   metrics embedded as a chart configuration JSON in the
//!   `data-fusionchart-config` attribute. Each bar is
//!   `{"label": …, "value": …, "displayValue": …}`; the display value (not
//!   the normalised chart value) carries the real number, and the sentinel
//!   "-" maps to 0.0. The last bar's label names the rating schema
//!   ("Rating 2.0" / "Rating 3.0").
//! - three `table.killmatrix[data-matrix-type]` grids (`all`, `first_kill`,
//!   `awp`). Column players are `thead th[data-player-id]`, row players are
//!   `tbody th[data-player-id]`, and each `td.killmatrix-cell` reads
//!   "rowkills:colkills".
//! - a `div.team-overview` summary with per-team kill totals as data
//!   attributes.

use super::{selector, text_of, RatingSchema};
use crate::db::MatrixType;
use crate::error::ParseError;
use scraper::Html;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

const PAGE: &str = "performance";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformancePage {
    pub mapstatsid: u64,
    pub rating_schema: RatingSchema,
    pub players: Vec<PerformanceLine>,
    /// 75 cells: 3 matrix types x 5x5 player pairs.
    pub matrix: Vec<MatrixCell>,
    pub team1_kills: u32,
    pub team2_kills: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceLine {
    pub player_id: u64,
    pub kpr: f64,
    pub dpr: f64,
    pub mk_rating: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatrixCell {
    pub matrix_type: MatrixType,
    pub row_player_id: u64,
    pub col_player_id: u64,
    pub row_kills: u32,
    pub col_kills: u32,
}

#[derive(Deserialize)]
struct ChartConfig {
    data: Vec<ChartBar>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartBar {
    label: String,
    #[allow(dead_code)]
    value: Option<String>,
    display_value: String,
}

pub fn parse_performance(html: &str, mapstatsid: u64) -> Result<PerformancePage, ParseError> {
    let doc = Html::parse_document(html);

    let (players, rating_schema) = parse_player_cards(&doc)?;
    let matrix = parse_matrices(&doc)?;
    let (team1_kills, team2_kills) = parse_team_overview(&doc)?;

    Ok(PerformancePage {
        mapstatsid,
        rating_schema,
        players,
        matrix,
        team1_kills,
        team2_kills,
    })
}

fn parse_player_cards(doc: &Html) -> Result<(Vec<PerformanceLine>, RatingSchema), ParseError> {
    let card_sel = selector("div.player-performance-card[data-player-id][data-fusionchart-config]");

    let mut players = Vec::new();
    let mut schema = None;
    for card in doc.select(&card_sel) {
        let player_id: u64 = card
            .value()
            .attr("data-player-id")
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| ParseError::new(PAGE, "card with bad player id"))?;
        let raw = card
            .value()
            .attr("data-fusionchart-config")
            .expect("attribute-gated selector");
        let config: ChartConfig = serde_json::from_str(raw).map_err(|e| {
            ParseError::new(PAGE, format!("player {player_id}: bad chart config: {e}"))
        })?;

        let bar = |label: &str| -> Result<f64, ParseError> {
            let bar = config
                .data
                .iter()
                .find(|b| b.label.starts_with(label))
                .ok_or_else(|| {
                    ParseError::new(PAGE, format!("player {player_id}: no '{label}' bar"))
                })?;
            display_number(&bar.display_value).ok_or_else(|| {
                ParseError::new(
                    PAGE,
                    format!("player {player_id}: bad display value {:?}", bar.display_value),
                )
            })
        };

        players.push(PerformanceLine {
            player_id,
            kpr: bar("Kills per round")?,
            dpr: bar("Deaths per round")?,
            mk_rating: bar("Multi-kill rating")?,
        });

        // schema comes from the last bar's label and is identical on every card
        let last = config
            .data
            .last()
            .ok_or_else(|| ParseError::new(PAGE, format!("player {player_id}: empty chart")))?;
        let card_schema = if last.label.ends_with("3.0") {
            RatingSchema::V3
        } else if last.label.ends_with("2.0") {
            RatingSchema::V2
        } else {
            return Err(ParseError::new(
                PAGE,
                format!("unrecognised rating label {:?}", last.label),
            ));
        };
        schema.get_or_insert(card_schema);
    }

    let schema = schema.ok_or_else(|| ParseError::new(PAGE, "no player cards found"))?;
    Ok((players, schema))
}

/// Sentinel "-" in a display value means the metric never materialised;
/// the source data maps it to zero.
fn display_number(display: &str) -> Option<f64> {
    let display = display.trim();
    if display == "-" {
        return Some(0.0);
    }
    display.parse().ok()
}

fn parse_matrices(doc: &Html) -> Result<Vec<MatrixCell>, ParseError> {
    let table_sel = selector("table.killmatrix[data-matrix-type]");
    let col_sel = selector("thead th[data-player-id]");
    let row_sel = selector("tbody tr");
    let row_player_sel = selector("th[data-player-id]");
    let cell_sel = selector("td.killmatrix-cell");

    let mut cells = Vec::new();
    let mut tables = 0usize;
    for table in doc.select(&table_sel) {
        tables += 1;
        let matrix_type = table
            .value()
            .attr("data-matrix-type")
            .and_then(|v| MatrixType::from_str(v).ok())
            .ok_or_else(|| ParseError::new(PAGE, "kill matrix with unknown type"))?;

        let col_ids: Vec<u64> = table
            .select(&col_sel)
            .filter_map(|th| th.value().attr("data-player-id"))
            .filter_map(|v| v.parse().ok())
            .collect();
        if col_ids.len() != 5 {
            return Err(ParseError::new(
                PAGE,
                format!("{matrix_type} matrix has {} column players", col_ids.len()),
            ));
        }

        let mut row_count = 0usize;
        for row in table.select(&row_sel) {
            row_count += 1;
            let row_player_id: u64 = row
                .select(&row_player_sel)
                .next()
                .and_then(|th| th.value().attr("data-player-id"))
                .and_then(|v| v.parse().ok())
                .ok_or_else(|| ParseError::new(PAGE, "matrix row without player id"))?;
            let row_cells: Vec<_> = row.select(&cell_sel).collect();
            if row_cells.len() != col_ids.len() {
                return Err(ParseError::new(
                    PAGE,
                    format!("matrix row {row_player_id} has {} cells", row_cells.len()),
                ));
            }
            for (col_player_id, cell) in col_ids.iter().zip(row_cells) {
                let text = text_of(cell);
                let (row_kills, col_kills) = text
                    .split_once(':')
                    .and_then(|(r, c)| Some((r.trim().parse().ok()?, c.trim().parse().ok()?)))
                    .ok_or_else(|| {
                        ParseError::new(PAGE, format!("bad matrix cell {text:?}"))
                    })?;
                cells.push(MatrixCell {
                    matrix_type,
                    row_player_id,
                    col_player_id: *col_player_id,
                    row_kills,
                    col_kills,
                });
            }
        }
        if row_count != 5 {
            return Err(ParseError::new(
                PAGE,
                format!("{matrix_type} matrix has {row_count} row players"),
            ));
        }
    }

    // three grids (all, first kills, AWP), 5x5 each
    if tables != 3 {
        return Err(ParseError::new(
            PAGE,
            format!("expected 3 kill matrices, found {tables}"),
        ));
    }
    Ok(cells)
}

fn parse_team_overview(doc: &Html) -> Result<(u32, u32), ParseError> {
    let overview_sel = selector("div.team-overview[data-team1-kills][data-team2-kills]");
    let overview = doc
        .select(&overview_sel)
        .next()
        .ok_or_else(|| ParseError::new(PAGE, "missing team overview"))?;
    let kills = |attr: &str| -> Result<u32, ParseError> {
        overview
            .value()
            .attr(attr)
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| ParseError::new(PAGE, format!("bad {attr}")))
    };
    Ok((kills("data-team1-kills")?, kills("data-team2-kills")?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chart_config(kpr: &str, dpr: &str, mk: &str, rating_label: &str) -> String {
        format!(
            concat!(
                r#"{{"chart":{{"theme":"hltv"}},"data":["#,
                r#"{{"label":"Kills per round","value":"0.9","displayValue":"{kpr}"}},"#,
                r#"{{"label":"Deaths per round","value":"0.5","displayValue":"{dpr}"}},"#,
                r#"{{"label":"Multi-kill rating","value":"0.3","displayValue":"{mk}"}},"#,
                r#"{{"label":"{label}","value":"0.8","displayValue":"1.31"}}]}}"#
            ),
            kpr = kpr,
            dpr = dpr,
            mk = mk,
            label = rating_label,
        )
    }

    fn card(player_id: u64, config: &str) -> String {
        let escaped = config.replace('"', "&quot;");
        format!(
            r#"<div class="player-performance-card" data-player-id="{player_id}" data-fusionchart-config="{escaped}"></div>"#
        )
    }

    fn matrix(matrix_type: &str, rows: [u64; 5], cols: [u64; 5]) -> String {
        let header: String = cols
            .iter()
            .map(|id| format!(r#"<th data-player-id="{id}">p{id}</th>"#))
            .collect();
        let body: String = rows
            .iter()
            .map(|row_id| {
                let cells: String = (0..5)
                    .map(|c| format!(r#"<td class="killmatrix-cell">{}:{}</td>"#, c + 1, c))
                    .collect();
                format!(r#"<tr><th data-player-id="{row_id}">p{row_id}</th>{cells}</tr>"#)
            })
            .collect();
        format!(
            r#"<table class="killmatrix" data-matrix-type="{matrix_type}">
                 <thead><tr><th></th>{header}</tr></thead>
                 <tbody>{body}</tbody>
               </table>"#
        )
    }

    fn page(rating_label: &str) -> String {
        let cards: String = (1..=10u64)
            .map(|id| card(id, &chart_config("0.79", "0.58", "1.05", rating_label)))
            .collect();
        let matrices: String = ["all", "first_kill", "awp"]
            .iter()
            .map(|t| matrix(t, [1, 2, 3, 4, 5], [6, 7, 8, 9, 10]))
            .collect();
        format!(
            r#"<div class="performance-page">
                 {cards}{matrices}
                 <div class="team-overview" data-team1-kills="97" data-team2-kills="84"></div>
               </div>"#
        )
    }

    #[test]
    fn parses_cards_matrices_and_overview() {
        let perf = parse_performance(&page("Rating 3.0"), 171234).unwrap();
        assert_eq!(perf.rating_schema, RatingSchema::V3);
        assert_eq!(perf.players.len(), 10);
        assert_eq!(perf.players[0].kpr, 0.79);
        assert_eq!(perf.players[0].dpr, 0.58);
        assert_eq!(perf.players[0].mk_rating, 1.05);
        assert_eq!(perf.matrix.len(), 75);
        assert_eq!(perf.team1_kills, 97);
        assert_eq!(perf.team2_kills, 84);

        let first = &perf.matrix[0];
        assert_eq!(first.matrix_type, MatrixType::All);
        assert_eq!(first.row_player_id, 1);
        assert_eq!(first.col_player_id, 6);
        assert_eq!((first.row_kills, first.col_kills), (1, 0));

        let awp_cells = perf
            .matrix
            .iter()
            .filter(|c| c.matrix_type == MatrixType::Awp)
            .count();
        assert_eq!(awp_cells, 25);
    }

    #[test]
    fn rating_schema_comes_from_last_bar_label() {
        let perf = parse_performance(&page("Rating 2.0"), 1).unwrap();
        assert_eq!(perf.rating_schema, RatingSchema::V2);
    }

    #[test]
    fn dash_display_values_map_to_zero() {
        let html = page("Rating 3.0").replace(
            r#"{&quot;label&quot;:&quot;Multi-kill rating&quot;,&quot;value&quot;:&quot;0.3&quot;,&quot;displayValue&quot;:&quot;1.05&quot;}"#,
            r#"{&quot;label&quot;:&quot;Multi-kill rating&quot;,&quot;value&quot;:&quot;0.3&quot;,&quot;displayValue&quot;:&quot;-&quot;}"#,
        );
        let perf = parse_performance(&html, 1).unwrap();
        assert_eq!(perf.players[0].mk_rating, 0.0);
    }

    #[test]
    fn rejects_unknown_rating_label() {
        assert!(parse_performance(&page("Rating X"), 1).is_err());
    }

    #[test]
    fn rejects_matrix_with_missing_column() {
        let html = page("Rating 3.0").replace(r#"<th data-player-id="10">p10</th>"#, "");
        assert!(parse_performance(&html, 1).is_err());
    }

    #[test]
    fn rejects_page_with_a_missing_matrix() {
        let html =
            page("Rating 3.0").replace(r#"data-matrix-type="awp""#, r#"data-matrix="awp""#);
        assert!(parse_performance(&html, 1).is_err());
    }

    #[test]
    fn rejects_matrix_with_missing_row() {
        let cells: String = (0..5)
            .map(|c| format!(r#"<td class="killmatrix-cell">{}:{}</td>"#, c + 1, c))
            .collect();
        let row5 = format!(r#"<tr><th data-player-id="5">p5</th>{cells}</tr>"#);
        let html = page("Rating 3.0").replace(&row5, "");
        assert!(parse_performance(&html, 1).is_err());
    }
}

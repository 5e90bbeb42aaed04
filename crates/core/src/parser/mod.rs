//! Pure-function parsers over static HTML and embedded JSON.
//!
//! Each parser has the shape `(html, identifier) -> typed record`, performs
//! no I/O, and is deterministic; every page is archived before it reaches a
//! parser, so all of these are replayable offline. Selector contracts are
//! documented per module.

mod economy;
mod map_stats;
mod overview;
mod performance;
mod results;

pub use economy::{parse_economy, EconomyLine, EconomyPage};
pub use map_stats::{parse_map_stats, MapStatsPage, PlayerStatLine, RoundOutcomeLine};
pub use overview::parse_match_overview;
pub use performance::{parse_performance, MatrixCell, PerformanceLine, PerformancePage};
pub use results::{parse_results, ResultsEntry};

use crate::db::{Side, WinType};
use scraper::{ElementRef, Selector};
use serde::{Deserialize, Serialize};

/// The two composite player-rating schemas the site has shipped. They differ
/// in one column's presence on the map-stats page and in the label of the
/// last bar on the performance page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RatingSchema {
    V2,
    V3,
}

/// Selectors are compile-time literals; a parse failure is a programming
/// error, not a data error.
pub(crate) fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

/// Concatenated text content, whitespace-collapsed.
pub(crate) fn text_of(el: ElementRef) -> String {
    el.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extracts the numeric id that follows `segment` in a site path, e.g.
/// `id_from_path("/stats/teams/4608/navi", "teams") == Some(4608)`.
pub(crate) fn id_from_path(href: &str, segment: &str) -> Option<u64> {
    let mut parts = href.split('/');
    while let Some(part) = parts.next() {
        if part == segment {
            return parts.next()?.parse().ok();
        }
    }
    None
}

/// "25 (12)" -> (25, Some(12)); "25" -> (25, None).
pub(crate) fn count_with_paren(text: &str) -> Option<(i32, Option<i32>)> {
    let text = text.trim();
    match text.split_once('(') {
        Some((head, tail)) => {
            let outer = head.trim().parse().ok()?;
            let inner = tail.trim_end_matches(')').trim().parse().ok()?;
            Some((outer, Some(inner)))
        }
        None => Some((text.parse().ok()?, None)),
    }
}

/// Signed counts rendered as "+11", "-3" or "0".
pub(crate) fn signed_count(text: &str) -> Option<i32> {
    text.trim().trim_start_matches('+').parse().ok()
}

/// "75.0%" -> 75.0; bare "-" is absent data.
pub(crate) fn percent(text: &str) -> Option<f64> {
    let text = text.trim().trim_start_matches('+');
    if text == "-" {
        return None;
    }
    text.trim_end_matches('%').parse().ok()
}

/// "95.4" -> 95.4; bare "-" is absent data.
pub(crate) fn decimal(text: &str) -> Option<f64> {
    let text = text.trim();
    if text == "-" {
        return None;
    }
    text.parse().ok()
}

/// File stem of a round-outcome icon URL ("…/t_win.svg" -> "t_win").
pub(crate) fn icon_stem(src: &str) -> &str {
    let name = src.rsplit('/').next().unwrap_or(src);
    name.split('.').next().unwrap_or(name)
}

/// Maps a round-outcome icon stem to the winning side and win type.
pub(crate) fn round_icon_outcome(stem: &str) -> Option<(Side, WinType)> {
    match stem {
        "ct_win" => Some((Side::Ct, WinType::Elimination)),
        "t_win" => Some((Side::T, WinType::Elimination)),
        "bomb_exploded" => Some((Side::T, WinType::BombPlanted)),
        "bomb_defused" => Some((Side::Ct, WinType::Defuse)),
        "stopwatch" => Some((Side::Ct, WinType::Time)),
        _ => None,
    }
}

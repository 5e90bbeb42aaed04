//! Results-listing parser.
//!
//! Page contract: each real listing entry is a `div.result-con` carrying a
//! `data-zonedgrouping-entry-unix` millisecond timestamp. The first listing
//! page duplicates a handful of matches in a "featured" block whose entries
//! lack that attribute; selecting on the attribute suppresses them. A
//! forfeited match shows "Def." in its `.result-score` cell.

use super::{id_from_path, selector, text_of};
use crate::error::ParseError;
use scraper::Html;
use serde::{Deserialize, Serialize};

const PAGE: &str = "results listing";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsEntry {
    pub match_id: u64,
    /// Site-relative match URL.
    pub url: String,
    pub forfeit_hint: bool,
    pub timestamp_ms: i64,
}

pub fn parse_results(html: &str, offset: u32) -> Result<Vec<ResultsEntry>, ParseError> {
    let doc = Html::parse_document(html);
    let entry_sel = selector("div.result-con[data-zonedgrouping-entry-unix]");
    let link_sel = selector("a[href^='/matches/']");
    let score_sel = selector(".result-score");

    let mut entries = Vec::new();
    for entry in doc.select(&entry_sel) {
        let timestamp_ms: i64 = entry
            .value()
            .attr("data-zonedgrouping-entry-unix")
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| {
                ParseError::new(PAGE, format!("bad entry timestamp at offset {offset}"))
            })?;

        let link = entry.select(&link_sel).next().ok_or_else(|| {
            ParseError::new(PAGE, format!("entry without match link at offset {offset}"))
        })?;
        let href = link
            .value()
            .attr("href")
            .ok_or_else(|| ParseError::new(PAGE, "match link without href"))?;
        let match_id = id_from_path(href, "matches")
            .ok_or_else(|| ParseError::new(PAGE, format!("unparseable match href {href}")))?;

        let forfeit_hint = entry
            .select(&score_sel)
            .next()
            .map(|score| text_of(score).contains("Def"))
            .unwrap_or(false);

        entries.push(ResultsEntry {
            match_id,
            url: href.to_owned(),
            forfeit_hint,
            timestamp_ms,
        });
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(match_id: u64, ts: i64, score: &str) -> String {
        format!(
            r#"<div class="result-con" data-zonedgrouping-entry-unix="{ts}">
                 <a href="/matches/{match_id}/team-a-vs-team-b">
                   <div class="result-score">{score}</div>
                 </a>
               </div>"#
        )
    }

    #[test]
    fn parses_entries_and_skips_featured_block() {
        let html = format!(
            r#"<div class="results-holder">
                 <div class="result-con"><a href="/matches/999/featured"><div class="result-score">2 - 0</div></a></div>
                 {}{}
               </div>"#,
            entry(2372000, 1718052000000, "2 - 1"),
            entry(2372001, 1718050000000, "16 - 14"),
        );
        let entries = parse_results(&html, 0).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].match_id, 2372000);
        assert_eq!(entries[0].url, "/matches/2372000/team-a-vs-team-b");
        assert_eq!(entries[0].timestamp_ms, 1718052000000);
        assert!(!entries[0].forfeit_hint);
    }

    #[test]
    fn flags_forfeits_from_score_sentinel() {
        let html = entry(2372002, 1718052000000, "Def.");
        let entries = parse_results(&html, 100).unwrap();
        assert!(entries[0].forfeit_hint);
    }

    #[test]
    fn empty_page_parses_to_no_entries() {
        let entries = parse_results("<html><body></body></html>", 9900).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn rejects_entry_without_link() {
        let html = r#"<div class="result-con" data-zonedgrouping-entry-unix="1"></div>"#;
        assert!(parse_results(html, 0).is_err());
    }
}

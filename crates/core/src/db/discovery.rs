use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Lifecycle of a discovered match URL. `Scraped` and `Failed` are terminal
/// for the overview stage; re-discovery must never move an entry backwards.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
pub enum DiscoveryStatus {
    Pending,
    Scraped,
    Failed,
}

/// One row of the discovery queue. This is the only explicit queue in the
/// schema; match URLs cannot be reconstructed from later rows, so they must
/// be recorded at listing time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryEntry {
    pub match_id: u64,
    /// Site-relative match URL, e.g. `/matches/2372000/vitality-vs-spirit`.
    pub url: String,
    /// Listing offset the entry was found at.
    pub offset: u32,
    /// The listing showed a "Def." score for this match.
    pub forfeit_hint: bool,
    /// Millisecond timestamp from the listing entry.
    pub timestamp_ms: i64,
    pub status: DiscoveryStatus,
}

impl DiscoveryEntry {
    pub fn new(match_id: u64, url: impl Into<String>, offset: u32) -> Self {
        Self {
            match_id,
            url: url.into(),
            offset,
            forfeit_hint: false,
            timestamp_ms: 0,
            status: DiscoveryStatus::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            DiscoveryStatus::Pending,
            DiscoveryStatus::Scraped,
            DiscoveryStatus::Failed,
        ] {
            let text = status.to_string();
            assert_eq!(DiscoveryStatus::from_str(&text).unwrap(), status);
        }
        assert_eq!(DiscoveryStatus::Pending.to_string(), "pending");
    }
}

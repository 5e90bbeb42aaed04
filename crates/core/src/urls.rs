//! URL builders for the pages the harvester visits.

pub const BASE_URL: &str = "https://www.hltv.org";

pub fn results_url(offset: u32) -> String {
    if offset == 0 {
        format!("{BASE_URL}/results")
    } else {
        format!("{BASE_URL}/results?offset={offset}")
    }
}

/// Discovery entries carry site-relative match URLs.
pub fn match_url(relative: &str) -> String {
    format!("{BASE_URL}{relative}")
}

pub fn map_stats_url(mapstatsid: u64) -> String {
    format!("{BASE_URL}/stats/matches/mapstatsid/{mapstatsid}/map")
}

pub fn performance_url(mapstatsid: u64) -> String {
    format!("{BASE_URL}/stats/matches/performance/mapstatsid/{mapstatsid}/map")
}

pub fn economy_url(mapstatsid: u64) -> String {
    format!("{BASE_URL}/stats/matches/economy/mapstatsid/{mapstatsid}/map")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_results_page_has_no_offset_param() {
        assert_eq!(results_url(0), "https://www.hltv.org/results");
        assert_eq!(results_url(100), "https://www.hltv.org/results?offset=100");
    }

    #[test]
    fn stats_urls_embed_mapstatsid() {
        assert!(map_stats_url(171234).contains("/mapstatsid/171234/"));
        assert!(performance_url(171234).contains("/performance/"));
        assert!(economy_url(171234).contains("/economy/"));
    }
}

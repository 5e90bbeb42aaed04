use crate::db::{PlayerStat, RoundEconomy, RoundOutcome};
use crate::error::ValidationError;
use crate::parser::MapStatsPage;
use tracing::warn;

/// Page-level constraints on a parsed map-stats page; a failure here
/// quarantines the whole page before any row conversion.
pub fn validate_map_stats_header(page: &MapStatsPage) -> Result<(), ValidationError> {
    const ENTITY: &str = "map stats page";
    if page.team1_id == page.team2_id {
        return Err(ValidationError::new(
            ENTITY,
            format!("identical team ids ({})", page.team1_id),
        ));
    }
    for (team, ct, t, total) in [
        ("team1", page.team1_ct, page.team1_t, page.team1_rounds),
        ("team2", page.team2_ct, page.team2_t, page.team2_rounds),
    ] {
        // equality under regulation, strictly less under overtime
        if ct + t > total {
            return Err(ValidationError::new(
                ENTITY,
                format!("{team} half rounds {ct}+{t} exceed total {total}"),
            ));
        }
    }
    Ok(())
}

/// Validates one player row ahead of the map-stats write. Siblings are
/// validated independently so one bad row never sinks the other nine.
pub fn validate_player_stat(stat: &PlayerStat) -> Result<(), ValidationError> {
    const ENTITY: &str = "player stat";
    let reject = |reason: String| Err(ValidationError::new(ENTITY, reason));

    if stat.player_id == 0 {
        return reject("player id is zero".into());
    }

    for (name, value) in [
        ("kills", stat.kills),
        ("deaths", stat.deaths),
        ("assists", stat.assists),
        ("flash_assists", stat.flash_assists),
        ("hs_kills", stat.hs_kills),
        ("opening_kills", stat.opening_kills),
        ("opening_deaths", stat.opening_deaths),
        ("multi_kills", stat.multi_kills),
        ("clutch_wins", stat.clutch_wins),
        ("traded_deaths", stat.traded_deaths),
    ] {
        if let Some(value) = value {
            if value < 0 {
                return reject(format!(
                    "player {}: negative {name} ({value})",
                    stat.player_id
                ));
            }
        }
    }

    if let (Some(hs), Some(kills)) = (stat.hs_kills, stat.kills) {
        if hs > kills {
            return reject(format!(
                "player {}: {hs} headshot kills exceed {kills} kills",
                stat.player_id
            ));
        }
    }
    if let (Some(kd_diff), Some(kills), Some(deaths)) = (stat.kd_diff, stat.kills, stat.deaths) {
        if kd_diff != kills - deaths {
            return reject(format!(
                "player {}: kd_diff {kd_diff} != {kills} - {deaths}",
                stat.player_id
            ));
        }
    }
    if let (Some(fk_diff), Some(ok), Some(od)) =
        (stat.fk_diff, stat.opening_kills, stat.opening_deaths)
    {
        if fk_diff != ok - od {
            return reject(format!(
                "player {}: fk_diff {fk_diff} != {ok} - {od}",
                stat.player_id
            ));
        }
    }

    if let Some(rating) = stat.rating {
        if !(0.1..=3.0).contains(&rating) {
            warn!(
                player_id = stat.player_id,
                rating, "rating outside the plausible band"
            );
        }
    }
    if let Some(adr) = stat.adr {
        if adr > 200.0 {
            warn!(player_id = stat.player_id, adr, "implausibly high adr");
        }
    }

    Ok(())
}

/// Validates a round outcome against the map's two teams.
pub fn validate_round_outcome(
    round: &RoundOutcome,
    team1_id: u64,
    team2_id: u64,
) -> Result<(), ValidationError> {
    const ENTITY: &str = "round outcome";
    if round.round_number == 0 {
        return Err(ValidationError::new(ENTITY, "round number is zero"));
    }
    if round.winner_team_id != team1_id && round.winner_team_id != team2_id {
        return Err(ValidationError::new(
            ENTITY,
            format!(
                "round {}: winner {} is neither {team1_id} nor {team2_id}",
                round.round_number, round.winner_team_id
            ),
        ));
    }
    Ok(())
}

/// Validates one team-round economy line. Coverage against the round
/// outcomes is a write-time concern; only intrinsic constraints live here.
pub fn validate_economy(economy: &RoundEconomy) -> Result<(), ValidationError> {
    const ENTITY: &str = "round economy";
    if economy.round_number == 0 {
        return Err(ValidationError::new(ENTITY, "round number is zero"));
    }
    if economy.equipment_value > 50_000 {
        warn!(
            match_id = economy.match_id,
            round = economy.round_number,
            value = economy.equipment_value,
            "implausibly high equipment value"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{BuyType, Side, WinType};

    fn stat() -> PlayerStat {
        let mut stat = PlayerStat::empty(1, 1, 7998);
        stat.kills = Some(25);
        stat.deaths = Some(14);
        stat.assists = Some(5);
        stat.flash_assists = Some(2);
        stat.hs_kills = Some(12);
        stat.kd_diff = Some(11);
        stat.adr = Some(95.4);
        stat.kast = Some(75.0);
        stat.fk_diff = Some(2);
        stat.rating = Some(1.45);
        stat.opening_kills = Some(4);
        stat.opening_deaths = Some(2);
        stat
    }

    #[test]
    fn accepts_a_consistent_row() {
        validate_player_stat(&stat()).unwrap();
    }

    #[test]
    fn rejects_headshots_exceeding_kills() {
        let mut s = stat();
        s.hs_kills = Some(26);
        assert!(validate_player_stat(&s).is_err());
    }

    #[test]
    fn rejects_kd_diff_mismatch() {
        let mut s = stat();
        s.kd_diff = Some(10);
        assert!(validate_player_stat(&s).is_err());
    }

    #[test]
    fn rejects_fk_diff_mismatch() {
        let mut s = stat();
        s.fk_diff = Some(5);
        assert!(validate_player_stat(&s).is_err());
    }

    #[test]
    fn rejects_negative_counts() {
        let mut s = stat();
        s.deaths = Some(-1);
        assert!(validate_player_stat(&s).is_err());
    }

    #[test]
    fn missing_components_skip_cross_field_checks() {
        let mut s = stat();
        s.opening_kills = None;
        s.opening_deaths = None;
        s.fk_diff = Some(99);
        validate_player_stat(&s).unwrap();
    }

    #[test]
    fn unusual_rating_is_soft() {
        let mut s = stat();
        s.rating = Some(3.4);
        validate_player_stat(&s).unwrap();
    }

    #[test]
    fn round_outcome_winner_must_play_the_map() {
        let round = RoundOutcome {
            match_id: 1,
            map_number: 1,
            round_number: 3,
            winner_team_id: 30,
            winner_side: Side::Ct,
            win_type: WinType::Elimination,
        };
        assert!(validate_round_outcome(&round, 10, 20).is_err());
        let round = RoundOutcome {
            winner_team_id: 20,
            ..round
        };
        validate_round_outcome(&round, 10, 20).unwrap();
    }

    #[test]
    fn economy_round_zero_is_rejected() {
        let economy = RoundEconomy {
            match_id: 1,
            map_number: 1,
            round_number: 0,
            team_id: 10,
            equipment_value: 4000,
            buy_type: BuyType::FullEco,
            side: Side::Ct,
        };
        assert!(validate_economy(&economy).is_err());
    }
}

use super::max_wins;
use crate::db::{MatchOverview, VetoAction};
use crate::error::ValidationError;
use tracing::warn;

const ENTITY: &str = "match overview";

/// Validates a parsed overview before the atomic overview write.
///
/// Forfeited matches use a lighter model: score-consistency checks are
/// waived (scores are nullable and the awarded map has no real rounds) but
/// every structural check still applies.
pub fn validate_overview(overview: &MatchOverview) -> Result<(), ValidationError> {
    let m = &overview.match_record;
    let reject = |reason: String| Err(ValidationError::new(ENTITY, reason));

    if m.team1_id == m.team2_id {
        return reject(format!("identical team ids ({})", m.team1_id));
    }
    if !matches!(m.best_of, 1 | 3 | 5) {
        return reject(format!("best_of {} out of range", m.best_of));
    }

    for step in &overview.veto {
        if !(1..=7).contains(&step.step_number) {
            return reject(format!("veto step {} out of range", step.step_number));
        }
        let left_over = step.action == VetoAction::LeftOver;
        if step.team_name.is_none() != left_over {
            return reject(format!(
                "veto step {}: team name must be absent iff left over",
                step.step_number
            ));
        }
    }
    if overview.veto.len() != 7 {
        warn!(
            match_id = m.match_id,
            steps = overview.veto.len(),
            "veto sequence is not 7 steps"
        );
    }

    for map in &overview.maps {
        if map.is_forfeit() && map.mapstatsid.is_some() {
            return reject(format!(
                "map {}: forfeited map cannot carry a mapstatsid",
                map.map_number
            ));
        }
    }

    for player in &overview.players {
        if !matches!(player.team_number, 1 | 2) {
            return reject(format!(
                "player {}: team number {} out of range",
                player.player_id, player.team_number
            ));
        }
        if player.team_id != m.team1_id && player.team_id != m.team2_id {
            return reject(format!(
                "player {}: team {} not in this match",
                player.player_id, player.team_id
            ));
        }
    }
    if overview.players.len() != 10 {
        warn!(
            match_id = m.match_id,
            players = overview.players.len(),
            "roster is not 10 players"
        );
    }

    if m.is_forfeit {
        return Ok(());
    }

    // score consistency, regular matches only
    let limit = max_wins(m.best_of);
    for (team, score) in [("team1", m.team1_score), ("team2", m.team2_score)] {
        match score {
            None => return reject(format!("{team} score missing on a played match")),
            // best-of-1 scores are raw round scores and not bounded by map wins
            Some(score) if m.best_of > 1 && score > limit => {
                return reject(format!(
                    "{team} score {score} exceeds possible wins for best of {}",
                    m.best_of
                ));
            }
            Some(_) => {}
        }
    }
    if m.best_of > 1 {
        let won = m.team1_score.unwrap_or(0).max(m.team2_score.unwrap_or(0));
        if won < limit {
            warn!(
                match_id = m.match_id,
                "winner has fewer map wins than the series requires"
            );
        }
    }

    for map in &overview.maps {
        for (team, ct, t, total) in [
            ("team1", map.team1_ct_rounds, map.team1_t_rounds, map.team1_rounds),
            ("team2", map.team2_ct_rounds, map.team2_t_rounds, map.team2_rounds),
        ] {
            if let (Some(ct), Some(t), Some(total)) = (ct, t, total) {
                if ct + t > total {
                    return reject(format!(
                        "map {}: {team} half rounds {}+{} exceed total {total}",
                        map.map_number, ct, t
                    ));
                }
            }
        }
    }

    Ok(())
}

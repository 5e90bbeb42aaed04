use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
pub enum Side {
    #[strum(serialize = "CT")]
    Ct,
    #[strum(serialize = "T")]
    T,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Self::Ct => Self::T,
            Self::T => Self::Ct,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
pub enum WinType {
    Elimination,
    BombPlanted,
    Defuse,
    Time,
}

/// Outcome of one round, keyed `(match_id, map_number, round_number)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundOutcome {
    pub match_id: u64,
    pub map_number: u8,
    /// 1-based, flat across regulation and any overtime.
    pub round_number: u32,
    pub winner_team_id: u64,
    pub winner_side: Side,
    pub win_type: WinType,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
pub enum BuyType {
    FullEco,
    SemiEco,
    SemiBuy,
    FullBuy,
}

impl BuyType {
    /// Buy-type thresholds in equipment dollars:
    /// `[0, 5000)` eco, `[5000, 10000)` semi-eco, `[10000, 20000)` semi-buy,
    /// `[20000, ..)` full buy.
    pub fn from_equipment_value(value: u32) -> Self {
        match value {
            0..=4999 => Self::FullEco,
            5000..=9999 => Self::SemiEco,
            10000..=19999 => Self::SemiBuy,
            _ => Self::FullBuy,
        }
    }
}

/// One team's economy for one round. References the round outcome row with
/// the same `(match_id, map_number, round_number)`; rows with no matching
/// outcome are dropped at write time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundEconomy {
    pub match_id: u64,
    pub map_number: u8,
    pub round_number: u32,
    pub team_id: u64,
    pub equipment_value: u32,
    pub buy_type: BuyType,
    pub side: Side,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buy_type_thresholds() {
        assert_eq!(BuyType::from_equipment_value(0), BuyType::FullEco);
        assert_eq!(BuyType::from_equipment_value(4999), BuyType::FullEco);
        assert_eq!(BuyType::from_equipment_value(5000), BuyType::SemiEco);
        assert_eq!(BuyType::from_equipment_value(9999), BuyType::SemiEco);
        assert_eq!(BuyType::from_equipment_value(10000), BuyType::SemiBuy);
        assert_eq!(BuyType::from_equipment_value(19999), BuyType::SemiBuy);
        assert_eq!(BuyType::from_equipment_value(20000), BuyType::FullBuy);
        assert_eq!(BuyType::from_equipment_value(34000), BuyType::FullBuy);
    }

    #[test]
    fn side_text_and_opposite() {
        assert_eq!(Side::Ct.to_string(), "CT");
        assert_eq!(Side::T.opposite(), Side::Ct);
    }
}

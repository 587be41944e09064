use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::settings::StatusThresholds;
use crate::types::{Money, Percent};

/// Traffic-light position of a group against the ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AidStatus {
    Green,
    Yellow,
    Red,
}

impl AidStatus {
    /// Red at or above `red`, yellow at or above `yellow`, green otherwise.
    pub fn classify(utilization_pct: Percent, thresholds: &StatusThresholds) -> Self {
        if utilization_pct >= thresholds.red {
            AidStatus::Red
        } else if utilization_pct >= thresholds.yellow {
            AidStatus::Yellow
        } else {
            AidStatus::Green
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AidStatus::Green => "green",
            AidStatus::Yellow => "yellow",
            AidStatus::Red => "red",
        }
    }
}

/// `total / ceiling * 100`, truncated to two decimals so the reported
/// value never reaches a band it has not actually reached. Zero when the
/// ceiling is zero.
pub fn utilization_pct(total: Money, ceiling: Money) -> Percent {
    if ceiling.is_zero() {
        return Decimal::ZERO;
    }
    (total / ceiling * dec!(100)).round_dp_with_strategy(2, RoundingStrategy::ToZero)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_boundaries() {
        let t = StatusThresholds::default();
        assert_eq!(AidStatus::classify(dec!(89.9), &t), AidStatus::Yellow);
        assert_eq!(AidStatus::classify(dec!(90.0), &t), AidStatus::Red);
        assert_eq!(AidStatus::classify(dec!(69.9), &t), AidStatus::Green);
        assert_eq!(AidStatus::classify(dec!(70), &t), AidStatus::Yellow);
        assert_eq!(AidStatus::classify(dec!(150), &t), AidStatus::Red);
        assert_eq!(AidStatus::classify(dec!(0), &t), AidStatus::Green);
    }

    #[test]
    fn test_utilization() {
        assert_eq!(utilization_pct(dec!(150000), dec!(300000)), dec!(50));
        assert_eq!(utilization_pct(dec!(46368.50), dec!(300000)), dec!(15.45));
        assert_eq!(utilization_pct(dec!(269985), dec!(300000)), dec!(89.99));
        assert_eq!(utilization_pct(dec!(209985), dec!(300000)), dec!(69.99));
        assert_eq!(utilization_pct(dec!(1), dec!(0)), dec!(0));
    }

    #[test]
    fn test_just_under_threshold_stays_in_lower_band() {
        let t = StatusThresholds::default();
        let red_edge = utilization_pct(dec!(269985), dec!(300000));
        assert_eq!(AidStatus::classify(red_edge, &t), AidStatus::Yellow);
        let yellow_edge = utilization_pct(dec!(209985), dec!(300000));
        assert_eq!(AidStatus::classify(yellow_edge, &t), AidStatus::Green);
        let exact = utilization_pct(dec!(270000), dec!(300000));
        assert_eq!(AidStatus::classify(exact, &t), AidStatus::Red);
    }
}

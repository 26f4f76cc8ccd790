//! Time-of-day commentary that accompanies a classification.

use serde::Serialize;

/// A recurring period with a known footfall pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RushPeriod {
    MorningRush,
    EveningRush,
    Night,
}

impl RushPeriod {
    pub fn commentary(self) -> &'static str {
        match self {
            Self::MorningRush => "Morning rush hour detected. Optimizing for peak efficiency.",
            Self::EveningRush => "Evening rush hour detected. Preparing for increased footfall.",
            Self::Night => "Night hours - maintaining minimal security presence.",
        }
    }
}

/// Returns the period for a local hour (`0..=23`), if any.
///
/// Hour 22 belongs to the evening rush, not the night.
pub fn rush_period(hour: u32) -> Option<RushPeriod> {
    match hour {
        6..=10 => Some(RushPeriod::MorningRush),
        18..=22 => Some(RushPeriod::EveningRush),
        0..=5 | 23 => Some(RushPeriod::Night),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hours_map_to_expected_periods() {
        assert_eq!(rush_period(6), Some(RushPeriod::MorningRush));
        assert_eq!(rush_period(10), Some(RushPeriod::MorningRush));
        assert_eq!(rush_period(12), None);
        assert_eq!(rush_period(18), Some(RushPeriod::EveningRush));
        assert_eq!(rush_period(22), Some(RushPeriod::EveningRush));
        assert_eq!(rush_period(23), Some(RushPeriod::Night));
        assert_eq!(rush_period(0), Some(RushPeriod::Night));
        assert_eq!(rush_period(5), Some(RushPeriod::Night));
        assert_eq!(rush_period(24), None);
    }
}

//! Sutradhar: the crowd classification engine.
//!
//! Maps a crowd count to a [`SeverityTier`] plus the fixed message,
//! suggestion and recommended actions for that tier. The mapping is an
//! ordered table of inclusive upper bounds scanned once; it has no side
//! effects and does not read the clock.
//!
//! | Count | Tier |
//! |-------|------|
//! | `0..=50` | `Normal` |
//! | `51..=150` | `Moderate` |
//! | `151..=300` | `High` |
//! | `301..=500` | `Critical` |
//! | `501..` | `Extreme` |
//!
//! A separate time-of-day annotation ([`rush_period`]) is keyed only off
//! an hour supplied by the caller and never influences the tier.

mod rules;
mod schedule;

pub use devasthan_types::SeverityTier;
pub use rules::{classify, rule_for, Classification, TierRule, TIER_RULES};
pub use schedule::{rush_period, RushPeriod};

//! The tier table and the classifier that scans it.

use devasthan_types::SeverityTier;
use serde::Serialize;

/// One row of the classification table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierRule {
    /// Inclusive upper bound on the count; `None` for the open-ended last row.
    pub upper_bound: Option<u64>,
    pub tier: SeverityTier,
    pub message: &'static str,
    pub suggestion: &'static str,
    /// Operational steps recommended for this tier, in order.
    pub actions: &'static [&'static str],
    /// Text pushed to visitors' devices, if the tier warrants one.
    pub visitor_notice: Option<&'static str>,
}

/// Classification rows ordered by ascending upper bound.
pub const TIER_RULES: [TierRule; 5] = [
    TierRule {
        upper_bound: Some(50),
        tier: SeverityTier::Normal,
        message: "All systems operating smoothly",
        suggestion: "Maintain current security deployment",
        actions: &["Maintain current security deployment"],
        visitor_notice: None,
    },
    TierRule {
        upper_bound: Some(150),
        tier: SeverityTier::Moderate,
        message: "Moderate crowd detected",
        suggestion: "Deploy 1 additional security unit to main entrance",
        actions: &[
            "Initiate standard crowd protocols",
            "Deploy 1 additional security unit to main entrance",
        ],
        visitor_notice: Some("Temple is moderately busy. Expected wait time: 15-20 minutes."),
    },
    TierRule {
        upper_bound: Some(300),
        tier: SeverityTier::High,
        message: "High crowd density detected",
        suggestion: "Deploy 2 additional security units to East Corridor",
        actions: &[
            "Activate enhanced crowd protocols",
            "Deploy 2 additional security units to East Corridor",
            "Send high-traffic alert to police",
            "Activate crowd flow optimization",
        ],
        visitor_notice: Some("High crowd density. Expected wait time: 30-45 minutes."),
    },
    TierRule {
        upper_bound: Some(500),
        tier: SeverityTier::Critical,
        message: "CRITICAL crowd levels detected",
        suggestion: "Deploy 3 additional security units to all corridors",
        actions: &[
            "Initiate emergency protocols",
            "Deploy 3 additional security units to all corridors",
            "Send emergency alert to police and local authorities",
            "Activate emergency crowd control measures",
            "Place medical team on standby",
        ],
        visitor_notice: Some("CRITICAL: Temple at capacity. Please wait or return later."),
    },
    TierRule {
        upper_bound: None,
        tier: SeverityTier::Extreme,
        message: "EXTREME crowd levels - Emergency protocols activated",
        suggestion: "Deploy ALL available security units immediately",
        actions: &[
            "Initiate maximum security protocols",
            "Deploy ALL available security units immediately",
            "Send maximum alert to all emergency services",
            "Activate full emergency response",
            "Contact temple management for immediate intervention",
        ],
        visitor_notice: Some("EMERGENCY: Temple overcrowded. Entry temporarily restricted."),
    },
];

/// Result of classifying a single count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub tier: SeverityTier,
    pub message: &'static str,
    pub suggestion: &'static str,
    pub actions: &'static [&'static str],
}

impl From<&TierRule> for Classification {
    fn from(rule: &TierRule) -> Self {
        Self {
            tier: rule.tier,
            message: rule.message,
            suggestion: rule.suggestion,
            actions: rule.actions,
        }
    }
}

/// Returns the first table row whose upper bound admits `count`.
pub fn rule_for(count: u64) -> &'static TierRule {
    TIER_RULES
        .iter()
        .find(|rule| rule.upper_bound.map_or(true, |bound| count <= bound))
        .unwrap_or(&TIER_RULES[TIER_RULES.len() - 1])
}

/// Classifies a crowd count. Total and deterministic in `count`.
pub fn classify(count: u64) -> Classification {
    Classification::from(rule_for(count))
}

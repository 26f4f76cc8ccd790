//! Shared types for the Devasthan crowd-monitoring platform.
//!
//! This crate holds the vocabulary every other crate speaks: zone
//! identifiers, geographic points, severity tiers, alert statuses, and the
//! two outbound live-event shapes pushed to connected observers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum length of a zone identifier, in characters.
pub const MAX_ZONE_ID_LEN: usize = 50;

/// Errors produced when validating a zone identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ZoneIdError {
    /// The identifier was empty after trimming whitespace.
    #[error("zone id must not be empty")]
    Empty,
    /// The identifier exceeded [`MAX_ZONE_ID_LEN`].
    #[error("zone id exceeds {max} characters (got {len})")]
    TooLong { len: usize, max: usize },
    /// The identifier contained a character outside `[A-Za-z0-9_-]`.
    #[error("zone id contains invalid character {0:?}")]
    InvalidCharacter(char),
}

/// A named physical sub-area of the venue, e.g. `main_entrance`.
///
/// The set of zones is open: any identifier that passes validation is
/// accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ZoneId(String);

impl ZoneId {
    /// Validates and normalises a raw zone identifier.
    ///
    /// Leading and trailing whitespace is trimmed before validation.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneIdError`] if the trimmed identifier is empty, too long,
    /// or contains characters other than ASCII alphanumerics, `_` and `-`.
    pub fn parse(raw: &str) -> Result<Self, ZoneIdError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ZoneIdError::Empty);
        }
        let len = trimmed.chars().count();
        if len > MAX_ZONE_ID_LEN {
            return Err(ZoneIdError::TooLong {
                len,
                max: MAX_ZONE_ID_LEN,
            });
        }
        if let Some(bad) = trimmed
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
        {
            return Err(ZoneIdError::InvalidCharacter(bad));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ZoneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ZoneId {
    type Error = ZoneIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ZoneId> for String {
    fn from(zone: ZoneId) -> Self {
        zone.0
    }
}

/// Error returned when a coordinate pair is out of range or not finite.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid coordinates: latitude {latitude}, longitude {longitude}")]
pub struct GeoPointError {
    pub latitude: f64,
    pub longitude: f64,
}

/// A WGS84 latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Builds a point, rejecting non-finite or out-of-range coordinates.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, GeoPointError> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        if !valid {
            return Err(GeoPointError {
                latitude,
                longitude,
            });
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

/// Discrete crowd severity, ordered by escalation.
///
/// Derived from a count on demand; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SeverityTier {
    Normal,
    Moderate,
    High,
    Critical,
    Extreme,
}

impl SeverityTier {
    /// All tiers from least to most severe.
    pub const ALL: [SeverityTier; 5] = [
        Self::Normal,
        Self::Moderate,
        Self::High,
        Self::Critical,
        Self::Extreme,
    ];

    /// Returns the canonical label, matching the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Moderate => "Moderate",
            Self::High => "High",
            Self::Critical => "Critical",
            Self::Extreme => "Extreme",
        }
    }
}

impl std::fmt::Display for SeverityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of an SOS alert.
///
/// Transitions only move forward: `New → Acknowledged → Resolved`, with
/// `New → Resolved` allowed directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    New,
    Acknowledged,
    Resolved,
}

impl AlertStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Acknowledged => "acknowledged",
            Self::Resolved => "resolved",
        }
    }
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AlertStatus {
    type Err = ParseAlertStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "acknowledged" => Ok(Self::Acknowledged),
            "resolved" => Ok(Self::Resolved),
            _ => Err(ParseAlertStatusError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown alert status string.
#[derive(Debug, Clone, Error)]
#[error("unknown alert status: {0}")]
pub struct ParseAlertStatusError(pub String);

/// Payload of a `crowd_update` live event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrowdUpdate {
    pub zone: ZoneId,
    pub count: u64,
    pub timestamp: DateTime<Utc>,
    pub tier: SeverityTier,
    pub message: String,
    pub suggestion: String,
}

/// Payload of an `sos_alert` live event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SosAlertEvent {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub location: GeoPoint,
    pub status: AlertStatus,
    pub description: Option<String>,
}

/// Events pushed to every connected observer.
///
/// Serialized with an inline `type` tag, e.g.
/// `{"type":"crowd_update","zone":"main_entrance","count":320,...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveEvent {
    CrowdUpdate(CrowdUpdate),
    SosAlert(SosAlertEvent),
}

impl LiveEvent {
    /// The wire tag of this event.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CrowdUpdate(_) => "crowd_update",
            Self::SosAlert(_) => "sos_alert",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn zone_id_is_trimmed_and_validated() {
        assert_eq!(ZoneId::parse("  east_corridor ").unwrap().as_str(), "east_corridor");
        assert_eq!(ZoneId::parse("   "), Err(ZoneIdError::Empty));
        assert_eq!(
            ZoneId::parse("gate 3"),
            Err(ZoneIdError::InvalidCharacter(' '))
        );
        let long = "z".repeat(MAX_ZONE_ID_LEN + 1);
        assert!(matches!(
            ZoneId::parse(&long),
            Err(ZoneIdError::TooLong { .. })
        ));
    }

    #[test]
    fn zone_id_deserialization_rejects_invalid_values() {
        let ok: ZoneId = serde_json::from_str("\"parking_area\"").unwrap();
        assert_eq!(ok.as_str(), "parking_area");
        assert!(serde_json::from_str::<ZoneId>("\"\"").is_err());
    }

    #[test]
    fn geo_point_rejects_out_of_range() {
        assert!(GeoPoint::new(25.3176, 82.9739).is_ok());
        assert!(GeoPoint::new(90.5, 0.0).is_err());
        assert!(GeoPoint::new(0.0, -180.1).is_err());
        assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn tiers_are_ordered_by_escalation() {
        let mut sorted = SeverityTier::ALL;
        sorted.sort();
        assert_eq!(sorted, SeverityTier::ALL);
        assert!(SeverityTier::Critical > SeverityTier::High);
    }

    #[test]
    fn alert_status_round_trips_through_str() {
        for status in [AlertStatus::New, AlertStatus::Acknowledged, AlertStatus::Resolved] {
            assert_eq!(status.as_str().parse::<AlertStatus>().unwrap(), status);
        }
        assert!("closed".parse::<AlertStatus>().is_err());
    }

    #[test]
    fn crowd_update_serializes_with_type_tag() {
        let event = LiveEvent::CrowdUpdate(CrowdUpdate {
            zone: ZoneId::parse("main_entrance").unwrap(),
            count: 320,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 9, 30, 0).unwrap(),
            tier: SeverityTier::Critical,
            message: "CRITICAL crowd levels detected".to_string(),
            suggestion: "Deploy 3 additional security units to all corridors".to_string(),
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "crowd_update");
        assert_eq!(json["zone"], "main_entrance");
        assert_eq!(json["count"], 320);
        assert_eq!(json["tier"], "Critical");
        assert_eq!(json["timestamp"], "2024-01-01T09:30:00Z");
    }

    #[test]
    fn sos_alert_serializes_with_lowercase_status() {
        let event = LiveEvent::SosAlert(SosAlertEvent {
            id: 7,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            location: GeoPoint::new(25.31, 82.97).unwrap(),
            status: AlertStatus::Acknowledged,
            description: None,
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(event.kind(), "sos_alert");
        assert_eq!(json["type"], "sos_alert");
        assert_eq!(json["status"], "acknowledged");
        assert_eq!(json["location"]["latitude"], 25.31);
        assert!(json["description"].is_null());
    }
}

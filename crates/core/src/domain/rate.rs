use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RateMasterId(pub String);

impl RateMasterId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for RateMasterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RateDetailId(pub String);

impl RateDetailId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// Priced component kinds carried by a rate detail line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RateKind {
    /// Starting fare, optionally scoped to a destination region.
    Base,
    /// Per extra stop.
    CallFee,
    /// Per extra distinct region.
    WaypointFee,
    /// Flat surcharge applied unconditionally.
    Special,
}

impl RateKind {
    pub const ALL: [RateKind; 4] =
        [RateKind::Base, RateKind::CallFee, RateKind::WaypointFee, RateKind::Special];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Base => "BASE",
            Self::CallFee => "CALL_FEE",
            Self::WaypointFee => "WAYPOINT_FEE",
            Self::Special => "SPECIAL",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Base => "기본운임",
            Self::CallFee => "콜비",
            Self::WaypointFee => "경유비",
            Self::Special => "특수요금",
        }
    }
}

impl fmt::Display for RateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RateKind {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let normalized = trimmed.to_ascii_uppercase().replace(|c: char| c == '-' || c == ' ', "_");
        RateKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized || kind.label() == trimmed)
            .ok_or_else(|| {
                DomainError::InvariantViolation(format!(
                    "unknown rate kind `{trimmed}` (expected BASE|CALL_FEE|WAYPOINT_FEE|SPECIAL)"
                ))
            })
    }
}

/// Fare configuration for one (center, tonnage) pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateMaster {
    pub id: RateMasterId,
    pub center_name: String,
    pub tonnage: Decimal,
    pub active: bool,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RateMaster {
    /// True when this master answers to the given lookup key.
    pub fn matches_key(&self, center_name: &str, tonnage: Decimal) -> bool {
        center_key(&self.center_name) == center_key(center_name) && self.tonnage == tonnage
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateDetail {
    pub id: RateDetailId,
    pub rate_master_id: RateMasterId,
    pub kind: RateKind,
    pub region: Option<String>,
    pub amount: Decimal,
    pub conditions: Option<String>,
    pub active: bool,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub position: u32,
}

impl RateDetail {
    /// Inclusive on both ends of the validity window.
    pub fn is_valid_as_of(&self, as_of: DateTime<Utc>) -> bool {
        self.active
            && self.valid_from.map_or(true, |from| from <= as_of)
            && self.valid_to.map_or(true, |to| to >= as_of)
    }

    /// Normalized region key, `None` for lines that apply generally.
    pub fn region_key(&self) -> Option<String> {
        self.region.as_deref().map(normalize_region).filter(|region| !region.is_empty())
    }

    pub fn conditions_text(&self) -> Option<&str> {
        self.conditions.as_deref().map(str::trim).filter(|text| !text.is_empty())
    }
}

/// Payload for creating or replacing a master's detail lines.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRateDetail {
    pub kind: RateKind,
    #[serde(default)]
    pub region: Option<String>,
    pub amount: Decimal,
    #[serde(default)]
    pub conditions: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub valid_to: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

impl NewRateDetail {
    pub fn new(kind: RateKind, amount: Decimal) -> Self {
        Self {
            kind,
            region: None,
            amount,
            conditions: None,
            active: true,
            valid_from: None,
            valid_to: None,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_conditions(mut self, conditions: impl Into<String>) -> Self {
        self.conditions = Some(conditions.into());
        self
    }

    pub fn with_validity(
        mut self,
        valid_from: Option<DateTime<Utc>>,
        valid_to: Option<DateTime<Utc>>,
    ) -> Self {
        self.valid_from = valid_from;
        self.valid_to = valid_to;
        self
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.amount < Decimal::ZERO {
            return Err(DomainError::InvariantViolation(format!(
                "{} amount must not be negative (got {})",
                self.kind, self.amount
            )));
        }
        if let (Some(from), Some(to)) = (self.valid_from, self.valid_to) {
            if from > to {
                return Err(DomainError::InvariantViolation(format!(
                    "{} validity window starts after it ends ({from} > {to})",
                    self.kind
                )));
            }
        }
        Ok(())
    }

    /// Materializes the line under `master_id` at `position`.
    pub fn into_detail(self, master_id: &RateMasterId, position: u32) -> RateDetail {
        let region = self
            .region
            .map(|region| region.trim().to_string())
            .filter(|region| !region.is_empty());
        let conditions = self
            .conditions
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());

        RateDetail {
            id: RateDetailId::generate(),
            rate_master_id: master_id.clone(),
            kind: self.kind,
            region,
            amount: self.amount,
            conditions,
            active: self.active,
            valid_from: self.valid_from,
            valid_to: self.valid_to,
            position,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRateMaster {
    pub center_name: String,
    pub tonnage: Decimal,
    #[serde(default)]
    pub created_by: Option<String>,
}

impl NewRateMaster {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.center_name.trim().is_empty() {
            return Err(DomainError::InvariantViolation(
                "center name must not be empty".to_string(),
            ));
        }
        if self.tonnage <= Decimal::ZERO {
            return Err(DomainError::InvariantViolation(format!(
                "tonnage must be positive (got {})",
                self.tonnage
            )));
        }
        Ok(())
    }
}

/// Region identity used at every comparison point: trimmed and lower-cased.
pub fn normalize_region(region: &str) -> String {
    region.trim().to_lowercase()
}

/// Center identity for lookups: trimmed and lower-cased.
pub fn center_key(center_name: &str) -> String {
    center_name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    use super::{
        normalize_region, NewRateDetail, NewRateMaster, RateDetail, RateDetailId, RateKind,
        RateMasterId,
    };

    fn detail() -> RateDetail {
        RateDetail {
            id: RateDetailId("d-1".to_string()),
            rate_master_id: RateMasterId("m-1".to_string()),
            kind: RateKind::Base,
            region: None,
            amount: dec!(50000),
            conditions: None,
            active: true,
            valid_from: None,
            valid_to: None,
            position: 0,
        }
    }

    #[test]
    fn open_window_is_always_valid() {
        assert!(detail().is_valid_as_of(Utc::now()));
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let now = Utc::now();
        let line = RateDetail { valid_from: Some(now), valid_to: Some(now), ..detail() };

        assert!(line.is_valid_as_of(now));
        assert!(!line.is_valid_as_of(now + Duration::seconds(1)));
        assert!(!line.is_valid_as_of(now - Duration::seconds(1)));
    }

    #[test]
    fn inactive_line_is_never_valid() {
        let line = RateDetail { active: false, ..detail() };
        assert!(!line.is_valid_as_of(Utc::now()));
    }

    #[test]
    fn blank_region_counts_as_general() {
        let line = RateDetail { region: Some("   ".to_string()), ..detail() };
        assert_eq!(line.region_key(), None);

        let line = RateDetail { region: Some(" Seoul ".to_string()), ..detail() };
        assert_eq!(line.region_key().as_deref(), Some("seoul"));
    }

    #[test]
    fn kind_parses_codes_and_labels() {
        assert_eq!("call_fee".parse::<RateKind>().expect("code"), RateKind::CallFee);
        assert_eq!("waypoint-fee".parse::<RateKind>().expect("dashed"), RateKind::WaypointFee);
        assert_eq!("특수요금".parse::<RateKind>().expect("label"), RateKind::Special);
        assert!("surcharge".parse::<RateKind>().is_err());
    }

    #[test]
    fn normalize_region_trims_and_lowercases() {
        assert_eq!(normalize_region("  BUSAN "), "busan");
        assert_eq!(normalize_region("서울"), "서울");
    }

    #[test]
    fn new_detail_rejects_negative_amount_and_inverted_window() {
        assert!(NewRateDetail::new(RateKind::Special, dec!(-1)).validate().is_err());

        let now = Utc::now();
        let inverted = NewRateDetail::new(RateKind::Base, dec!(1))
            .with_validity(Some(now), Some(now - Duration::days(1)));
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn into_detail_drops_blank_region_and_conditions() {
        let line = NewRateDetail::new(RateKind::Special, dec!(1000))
            .with_region("  ")
            .with_conditions(" ")
            .into_detail(&RateMasterId("m-1".to_string()), 3);

        assert_eq!(line.region, None);
        assert_eq!(line.conditions, None);
        assert_eq!(line.position, 3);
    }

    #[test]
    fn new_master_requires_center_and_positive_tonnage() {
        let master =
            NewRateMaster { center_name: " ".to_string(), tonnage: dec!(5), created_by: None };
        assert!(master.validate().is_err());

        let master =
            NewRateMaster { center_name: "서울센터".to_string(), tonnage: dec!(0), created_by: None };
        assert!(master.validate().is_err());
    }
}

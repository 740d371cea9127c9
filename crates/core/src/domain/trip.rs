use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::rate::normalize_region;

/// Ephemeral calculation request for one trip.
///
/// Construction normalizes caller input: the center is trimmed and region
/// entries are trimmed with blanks dropped, so the calculator only ever sees
/// well-formed values.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripQuery {
    pub center_name: String,
    pub tonnage: Decimal,
    pub regions: Vec<String>,
    pub total_stops: Option<u32>,
    pub distinct_regions: Option<u32>,
    pub as_of: DateTime<Utc>,
}

impl TripQuery {
    pub fn new(
        center_name: impl Into<String>,
        tonnage: Decimal,
        regions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            center_name: center_name.into().trim().to_string(),
            tonnage,
            regions: normalize_regions(regions),
            total_stops: None,
            distinct_regions: None,
            as_of: Utc::now(),
        }
    }

    pub fn with_total_stops(mut self, total_stops: Option<u32>) -> Self {
        self.total_stops = total_stops;
        self
    }

    pub fn with_distinct_regions(mut self, distinct_regions: Option<u32>) -> Self {
        self.distinct_regions = distinct_regions;
        self
    }

    pub fn as_of(mut self, as_of: Option<DateTime<Utc>>) -> Self {
        if let Some(as_of) = as_of {
            self.as_of = as_of;
        }
        self
    }
}

pub fn normalize_regions(regions: impl IntoIterator<Item = impl Into<String>>) -> Vec<String> {
    regions
        .into_iter()
        .map(|region| region.into().trim().to_string())
        .filter(|region| !region.is_empty())
        .collect()
}

pub fn distinct_region_count(regions: &[String]) -> u32 {
    let unique = regions
        .iter()
        .map(|region| normalize_region(region))
        .filter(|region| !region.is_empty())
        .collect::<BTreeSet<_>>();
    u32::try_from(unique.len()).unwrap_or(u32::MAX)
}

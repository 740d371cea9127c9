use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

use crate::domain::rate::{RateDetail, RateDetailId, RateKind, RateMaster, RateMasterId};
use crate::errors::CatalogError;
use crate::fare::catalog::RateCatalog;

static NEXT_DETAIL: AtomicU32 = AtomicU32::new(0);

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single().unwrap_or_else(Utc::now)
}

pub fn master(id: &str, center_name: &str, tonnage: Decimal) -> RateMaster {
    RateMaster {
        id: RateMasterId(id.to_string()),
        center_name: center_name.to_string(),
        tonnage,
        active: true,
        created_by: Some("test".to_string()),
        created_at: epoch(),
        updated_at: epoch(),
    }
}

pub fn detail(master_id: &str, kind: RateKind, region: Option<&str>, amount: Decimal) -> RateDetail {
    let position = NEXT_DETAIL.fetch_add(1, Ordering::Relaxed);
    RateDetail {
        id: RateDetailId(format!("d-{position}")),
        rate_master_id: RateMasterId(master_id.to_string()),
        kind,
        region: region.map(str::to_string),
        amount,
        conditions: None,
        active: true,
        valid_from: None,
        valid_to: None,
        position,
    }
}

/// Read-only catalog over fixed vectors. Deliberately skips the date filter
/// so callers' own filtering is exercised.
pub struct FakeCatalog {
    masters: Vec<RateMaster>,
    details: Vec<RateDetail>,
}

impl FakeCatalog {
    pub fn new(masters: Vec<RateMaster>, details: Vec<RateDetail>) -> Self {
        Self { masters, details }
    }
}

#[async_trait]
impl RateCatalog for FakeCatalog {
    async fn find_active_master(
        &self,
        center_name: &str,
        tonnage: Decimal,
    ) -> Result<Option<RateMaster>, CatalogError> {
        Ok(self
            .masters
            .iter()
            .find(|master| master.active && master.matches_key(center_name, tonnage))
            .cloned())
    }

    async fn list_valid_details(
        &self,
        master_id: &RateMasterId,
        _as_of: DateTime<Utc>,
    ) -> Result<Vec<RateDetail>, CatalogError> {
        Ok(self.details.iter().filter(|detail| &detail.rate_master_id == master_id).cloned().collect())
    }

    async fn list_active_centers(&self) -> Result<Vec<String>, CatalogError> {
        Ok(self
            .masters
            .iter()
            .filter(|master| master.active)
            .map(|master| master.center_name.clone())
            .collect())
    }

    async fn list_active_tonnages(&self) -> Result<Vec<Decimal>, CatalogError> {
        Ok(self.masters.iter().filter(|master| master.active).map(|master| master.tonnage).collect())
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::rate::{NewRateDetail, NewRateMaster, RateDetail, RateMaster, RateMasterId};
use crate::errors::CatalogError;

/// Read side of the rate catalog consumed by the fare engine.
#[async_trait]
pub trait RateCatalog: Send + Sync {
    /// Active master for the key; center match is case-insensitive, tonnage exact.
    async fn find_active_master(
        &self,
        center_name: &str,
        tonnage: Decimal,
    ) -> Result<Option<RateMaster>, CatalogError>;

    /// Detail lines of `master_id` valid as of the instant, in submission order.
    async fn list_valid_details(
        &self,
        master_id: &RateMasterId,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<RateDetail>, CatalogError>;

    async fn list_active_centers(&self) -> Result<Vec<String>, CatalogError>;

    async fn list_active_tonnages(&self) -> Result<Vec<Decimal>, CatalogError>;
}

/// Administrative write path.
///
/// Detail sets are never patched line by line: `create_master` and
/// `replace_details` take the complete desired set and apply it atomically.
#[async_trait]
pub trait RateCatalogAdmin: RateCatalog {
    /// Master for the key regardless of its active flag.
    async fn find_master_by_key(
        &self,
        center_name: &str,
        tonnage: Decimal,
    ) -> Result<Option<RateMaster>, CatalogError>;

    async fn create_master(
        &self,
        master: NewRateMaster,
        details: Vec<NewRateDetail>,
    ) -> Result<RateMaster, CatalogError>;

    async fn replace_details(
        &self,
        master_id: &RateMasterId,
        details: Vec<NewRateDetail>,
    ) -> Result<Vec<RateDetail>, CatalogError>;

    async fn set_master_active(
        &self,
        master_id: &RateMasterId,
        active: bool,
    ) -> Result<RateMaster, CatalogError>;

    /// Hard delete; detail lines go with the master.
    async fn delete_master(&self, master_id: &RateMasterId) -> Result<bool, CatalogError>;

    /// Every line of the master, active or not, in submission order.
    async fn list_details(&self, master_id: &RateMasterId)
        -> Result<Vec<RateDetail>, CatalogError>;
}

/// Shared validation for a write payload.
pub fn validate_detail_set(details: &[NewRateDetail]) -> Result<(), CatalogError> {
    for detail in details {
        detail.validate()?;
    }
    Ok(())
}

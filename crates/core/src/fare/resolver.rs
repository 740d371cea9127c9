use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::rate::{RateDetail, RateMaster};
use crate::errors::RateLookupError;
use crate::fare::catalog::RateCatalog;

/// A master together with the lines in force on the requested date.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRate {
    pub master: RateMaster,
    pub details: Vec<RateDetail>,
}

pub struct RateResolver<C> {
    catalog: C,
}

impl<C> RateResolver<C> {
    pub fn new(catalog: C) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }
}

impl<C: RateCatalog> RateResolver<C> {
    pub async fn resolve(
        &self,
        center_name: &str,
        tonnage: Decimal,
        as_of: DateTime<Utc>,
    ) -> Result<ResolvedRate, RateLookupError> {
        let center_name = center_name.trim();
        let master = self.catalog.find_active_master(center_name, tonnage).await?;

        let Some(master) = master else {
            warn!(
                event_name = "fare.resolve.rate_not_found",
                center_name,
                tonnage = %tonnage,
                "no active rate master for center/tonnage"
            );
            return Err(RateLookupError::RateNotFound {
                center_name: center_name.to_string(),
                tonnage,
            });
        };

        // Window enforced here as well as in the store.
        let details = self
            .catalog
            .list_valid_details(&master.id, as_of)
            .await?
            .into_iter()
            .filter(|detail| detail.is_valid_as_of(as_of))
            .collect::<Vec<_>>();

        if details.is_empty() {
            warn!(
                event_name = "fare.resolve.no_valid_rates",
                rate_master_id = %master.id,
                as_of = %as_of,
                "rate master has no detail lines valid on the requested date"
            );
            return Err(RateLookupError::NoValidRatesForDate {
                center_name: master.center_name.clone(),
                tonnage: master.tonnage,
                as_of,
            });
        }

        debug!(
            event_name = "fare.resolve.resolved",
            rate_master_id = %master.id,
            detail_count = details.len(),
            "rate resolved"
        );

        Ok(ResolvedRate { master, details })
    }
}

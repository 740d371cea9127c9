pub mod calculator;
pub mod catalog;
pub mod resolver;
pub mod suggestion;

#[cfg(test)]
pub(crate) mod testing;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::rate::RateMasterId;
use crate::domain::trip::TripQuery;
use crate::errors::{CatalogError, RateLookupError};

use self::{
    calculator::{
        CalculationDetail, DeterministicFareCalculator, FareBreakdown, FareCalculator, FareInput,
    },
    catalog::RateCatalog,
    resolver::RateResolver,
    suggestion::RateSuggestions,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateMasterSummary {
    pub id: RateMasterId,
    pub center_name: String,
    pub tonnage: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateCalculation {
    pub rate_master: RateMasterSummary,
    pub breakdown: FareBreakdown,
    pub calculation: CalculationDetail,
    pub calculated_for: DateTime<Utc>,
}

/// Resolver + calculator behind one call.
pub struct FareEngine<C, F = DeterministicFareCalculator> {
    resolver: RateResolver<C>,
    calculator: F,
}

impl<C: RateCatalog> FareEngine<C, DeterministicFareCalculator> {
    pub fn new(catalog: C) -> Self {
        Self::with_calculator(catalog, DeterministicFareCalculator)
    }
}

impl<C: RateCatalog, F: FareCalculator> FareEngine<C, F> {
    pub fn with_calculator(catalog: C, calculator: F) -> Self {
        Self { resolver: RateResolver::new(catalog), calculator }
    }

    pub fn catalog(&self) -> &C {
        self.resolver.catalog()
    }

    pub async fn calculate_rate(&self, query: &TripQuery) -> Result<RateCalculation, RateLookupError> {
        validate_query(query)?;

        let resolved = self.resolver.resolve(&query.center_name, query.tonnage, query.as_of).await?;
        let result = self.calculator.compute(&FareInput {
            details: &resolved.details,
            regions: &query.regions,
            total_stops: query.total_stops,
            distinct_regions: query.distinct_regions,
        });

        info!(
            event_name = "fare.calculate.completed",
            rate_master_id = %resolved.master.id,
            total = %result.breakdown.total,
            base_source = ?result.calculation.base_source,
            "fare calculated"
        );

        Ok(RateCalculation {
            rate_master: RateMasterSummary {
                id: resolved.master.id,
                center_name: resolved.master.center_name,
                tonnage: resolved.master.tonnage,
            },
            breakdown: result.breakdown,
            calculation: result.calculation,
            calculated_for: query.as_of,
        })
    }

    /// Known active centers and tonnages from the catalog.
    pub async fn suggestions(&self) -> Result<RateSuggestions, CatalogError> {
        let catalog = self.resolver.catalog();
        let centers = catalog.list_active_centers().await?;
        let tonnages = catalog.list_active_tonnages().await?;
        Ok(RateSuggestions::from_values(centers, tonnages))
    }
}

fn validate_query(query: &TripQuery) -> Result<(), RateLookupError> {
    if query.center_name.trim().is_empty() {
        return Err(RateLookupError::InvalidQuery("center name must not be empty".to_string()));
    }
    if query.tonnage <= Decimal::ZERO {
        return Err(RateLookupError::InvalidQuery(format!(
            "tonnage must be positive (got {})",
            query.tonnage
        )));
    }
    Ok(())
}

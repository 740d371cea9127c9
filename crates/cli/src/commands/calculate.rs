use chrono::{DateTime, Utc};
use haulrate_core::errors::RateLookupError;
use haulrate_core::fare::{FareEngine, RateCalculation};
use haulrate_core::import::{parse_date, parse_tonnage};
use haulrate_core::TripQuery;
use haulrate_db::SqlRateCatalog;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use crate::commands::{with_database, CommandResult};

/// One fare quote as entered on the command line.
#[derive(Clone, Debug)]
pub struct CalculateRequest {
    pub center: String,
    pub tonnage: Decimal,
    pub regions: Vec<String>,
    pub total_stops: Option<u32>,
    pub distinct_regions: Option<u32>,
    pub as_of: Option<DateTime<Utc>>,
}

impl CalculateRequest {
    fn into_query(self) -> TripQuery {
        TripQuery::new(self.center, self.tonnage, self.regions)
            .with_total_stops(self.total_stops)
            .with_distinct_regions(self.distinct_regions)
            .as_of(self.as_of)
    }
}

enum Outcome {
    Calculated(RateCalculation),
    Rejected { error: RateLookupError, suggestions: Option<Value> },
}

pub fn run(request: CalculateRequest) -> CommandResult {
    let query = request.into_query();

    let outcome = with_database("calculate", |_config, pool| async move {
        let engine = FareEngine::new(SqlRateCatalog::new(pool));
        match engine.calculate_rate(&query).await {
            Ok(calculation) => Ok(Outcome::Calculated(calculation)),
            Err(error @ RateLookupError::RateNotFound { .. }) => {
                let suggestions = engine
                    .suggestions()
                    .await
                    .ok()
                    .and_then(|suggestions| serde_json::to_value(suggestions).ok());
                Ok(Outcome::Rejected { error, suggestions })
            }
            Err(error) => Ok(Outcome::Rejected { error, suggestions: None }),
        }
    });

    match outcome {
        Ok(Outcome::Calculated(calculation)) => {
            let message = format!(
                "total {} for {} {}t (rate master {})",
                calculation.breakdown.total,
                calculation.rate_master.center_name,
                calculation.rate_master.tonnage,
                calculation.rate_master.id
            );
            CommandResult::success_with_data("calculate", message, serde_json::to_value(&calculation).ok())
        }
        Ok(Outcome::Rejected { error, suggestions }) => CommandResult::failure_with_data(
            "calculate",
            error.error_class(),
            error.to_string(),
            lookup_exit_code(&error),
            suggestions.map(|suggestions| json!({ "suggestions": suggestions })),
        ),
        Err(failure) => failure,
    }
}

pub(crate) fn lookup_exit_code(error: &RateLookupError) -> u8 {
    match error {
        RateLookupError::InvalidQuery(_) => 7,
        RateLookupError::RateNotFound { .. } => 8,
        RateLookupError::NoValidRatesForDate { .. } => 9,
        RateLookupError::Catalog(_) => 4,
    }
}

pub fn parse_tonnage_arg(raw: &str) -> Result<Decimal, String> {
    parse_tonnage(raw).ok_or_else(|| format!("`{raw}` is not a tonnage (expected e.g. 5, 2.5 or 5t)"))
}

pub fn parse_date_arg(raw: &str) -> Result<DateTime<Utc>, String> {
    parse_date(raw).ok_or_else(|| format!("`{raw}` is not a date (expected YYYY-MM-DD or RFC 3339)"))
}

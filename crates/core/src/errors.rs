use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::rate::RateMasterId;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("rate catalog unavailable: {0}")]
    Unavailable(String),
    #[error("rate catalog record could not be decoded: {0}")]
    Decode(String),
    #[error("rate master `{0}` does not exist")]
    MasterNotFound(RateMasterId),
    #[error("a rate master already exists for center `{center_name}` and tonnage {tonnage}")]
    DuplicateKey { center_name: String, tonnage: Decimal },
    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Failures surfaced by rate resolution.
///
/// `RateNotFound` means the (center, tonnage) combination is not configured;
/// `NoValidRatesForDate` means it is configured but nothing is in force on
/// the requested date. Callers render different guidance for each.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RateLookupError {
    #[error("no active rate is configured for center `{center_name}` and tonnage {tonnage}")]
    RateNotFound { center_name: String, tonnage: Decimal },
    #[error(
        "rate for center `{center_name}` and tonnage {tonnage} has no lines valid on {}",
        .as_of.format("%Y-%m-%d")
    )]
    NoValidRatesForDate { center_name: String, tonnage: Decimal, as_of: DateTime<Utc> },
    #[error("invalid fare query: {0}")]
    InvalidQuery(String),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl RateLookupError {
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::RateNotFound { .. } => "rate_not_found",
            Self::NoValidRatesForDate { .. } => "no_valid_rates_for_date",
            Self::InvalidQuery(_) => "invalid_query",
            Self::Catalog(_) => "catalog",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Lookup(#[from] RateLookupError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("unprocessable: {message}")]
    Unprocessable { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::NotFound { .. } => {
                "No rate is configured for that center and tonnage. Pick one of the suggested combinations."
            }
            Self::Unprocessable { .. } => {
                "The rate exists but nothing is in force on that date. Try another date or update the rate."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. }
            | Self::NotFound { message, .. }
            | Self::Unprocessable { message, .. }
            | Self::ServiceUnavailable { message, .. } => message,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::Unprocessable { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::Unprocessable { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<CatalogError> for InterfaceError {
    fn from(value: CatalogError) -> Self {
        let message = value.to_string();
        match value {
            CatalogError::Domain(_) | CatalogError::DuplicateKey { .. } => {
                Self::BadRequest { message, correlation_id: "unassigned".to_owned() }
            }
            CatalogError::MasterNotFound(_) => {
                Self::NotFound { message, correlation_id: "unassigned".to_owned() }
            }
            CatalogError::Unavailable(_) | CatalogError::Decode(_) => {
                Self::ServiceUnavailable { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::Domain(error) => Self::BadRequest {
                message: error.to_string(),
                correlation_id: "unassigned".to_owned(),
            },
            ApplicationError::Lookup(RateLookupError::Catalog(error))
            | ApplicationError::Catalog(error) => Self::from(error),
            ApplicationError::Lookup(error @ RateLookupError::RateNotFound { .. }) => {
                Self::NotFound { message: error.to_string(), correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Lookup(error @ RateLookupError::NoValidRatesForDate { .. }) => {
                Self::Unprocessable {
                    message: error.to_string(),
                    correlation_id: "unassigned".to_owned(),
                }
            }
            ApplicationError::Lookup(error @ RateLookupError::InvalidQuery(_)) => {
                Self::BadRequest { message: error.to_string(), correlation_id: "unassigned".to_owned() }
            }
        }
    }
}

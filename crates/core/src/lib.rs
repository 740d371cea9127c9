pub mod config;
pub mod domain;
pub mod errors;
pub mod fare;
pub mod import;

pub use domain::rate::{
    NewRateDetail, NewRateMaster, RateDetail, RateDetailId, RateKind, RateMaster, RateMasterId,
};
pub use domain::trip::TripQuery;
pub use errors::{
    ApplicationError, CatalogError, DomainError, InterfaceError, RateLookupError,
};
pub use fare::calculator::{
    compute_breakdown, BaseFareSource, CalculationDetail, DeterministicFareCalculator,
    FareBreakdown, FareCalculation, FareCalculator, SpecialFee,
};
pub use fare::catalog::{RateCatalog, RateCatalogAdmin};
pub use fare::resolver::{RateResolver, ResolvedRate};
pub use fare::suggestion::{suggest, RateSuggestions};
pub use fare::{FareEngine, RateCalculation, RateMasterSummary};
pub use import::{ImportError, ImportMode, ImportReport, ParsedImport, RateImporter};

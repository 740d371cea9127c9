//! Fare rate HTTP API.
//!
//! - `POST /api/v1/rates/calculate`              quote one trip
//! - `GET  /api/v1/rates/suggestions`            active centers and tonnages
//! - `PUT  /api/v1/rates/{master_id}/details`    replace a master's line set
//! - `POST /api/v1/rates/import?mode=...`        validate or load a CSV sheet
//!
//! Request and response bodies use camelCase field names.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use haulrate_core::domain::rate::{NewRateDetail, RateDetail, RateKind, RateMasterId};
use haulrate_core::errors::{
    ApplicationError, CatalogError, DomainError, InterfaceError, RateLookupError,
};
use haulrate_core::fare::calculator::{AppliedRate, BaseFareSource, CalculationDetail, FareBreakdown};
use haulrate_core::fare::suggestion::RateSuggestions;
use haulrate_core::fare::{FareEngine, RateCalculation};
use haulrate_core::import::{
    parse_date, parse_import_file, ImportError, ImportMode, ImportReport, RateImporter,
};
use haulrate_core::{RateCatalogAdmin, TripQuery};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub struct RatesState<C> {
    engine: Arc<FareEngine<C>>,
    max_import_rows: usize,
}

impl<C> Clone for RatesState<C> {
    fn clone(&self) -> Self {
        Self { engine: Arc::clone(&self.engine), max_import_rows: self.max_import_rows }
    }
}

type ApiError = (StatusCode, Json<ErrorBody>);

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculateBody {
    pub center_name: String,
    pub tonnage: Decimal,
    #[serde(default)]
    pub regions: Vec<String>,
    pub total_stops: Option<u32>,
    pub distinct_regions: Option<u32>,
    /// `YYYY-MM-DD` or RFC 3339; defaults to now.
    #[serde(alias = "asOf")]
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculateResponse {
    pub rate_master: RateMasterBody,
    pub breakdown: BreakdownBody,
    pub calculation: CalculationBody,
    pub calculated_for: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateMasterBody {
    pub id: String,
    pub center_name: String,
    pub tonnage: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakdownBody {
    pub base_fare: Decimal,
    pub call_fee: Decimal,
    pub waypoint_fee: Decimal,
    pub special_fees: Vec<SpecialFeeBody>,
    pub total: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialFeeBody {
    pub detail_id: String,
    pub amount: Decimal,
    pub description: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationBody {
    pub base_source: BaseFareSource,
    pub base_detail_id: Option<String>,
    pub base_region: Option<String>,
    pub call_fee_rate: Option<AppliedRateBody>,
    pub waypoint_fee_rate: Option<AppliedRateBody>,
    pub total_stops: u32,
    pub distinct_regions: u32,
    pub extra_stops: u32,
    pub extra_regions: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedRateBody {
    pub detail_id: String,
    pub rate: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionsBody {
    pub available_centers: Vec<String>,
    pub available_tonnages: Vec<Decimal>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceDetailsBody {
    pub details: Vec<DetailInput>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailInput {
    /// Code (`CALL_FEE`) or label (`콜비`).
    pub kind: String,
    pub region: Option<String>,
    pub amount: Decimal,
    pub conditions: Option<String>,
    pub active: Option<bool>,
    pub valid_from: Option<String>,
    pub valid_to: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailsResponse {
    pub rate_master_id: String,
    pub details: Vec<DetailBody>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailBody {
    pub id: String,
    pub kind: RateKind,
    pub region: Option<String>,
    pub amount: Decimal,
    pub conditions: Option<String>,
    pub active: bool,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub position: u32,
}

#[derive(Debug, Deserialize)]
pub struct ImportQuery {
    pub mode: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    pub mode: ImportMode,
    pub total_rows: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub created_master_ids: Vec<String>,
    pub errors: Vec<ImportIssueBody>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportIssueBody {
    pub kind: &'static str,
    pub row: Option<usize>,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    pub error_class: String,
    pub message: String,
    pub correlation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<SuggestionsBody>,
}

impl From<RateCalculation> for CalculateResponse {
    fn from(value: RateCalculation) -> Self {
        Self {
            rate_master: RateMasterBody {
                id: value.rate_master.id.0,
                center_name: value.rate_master.center_name,
                tonnage: value.rate_master.tonnage,
            },
            breakdown: BreakdownBody::from(value.breakdown),
            calculation: CalculationBody::from(value.calculation),
            calculated_for: value.calculated_for,
        }
    }
}

impl From<FareBreakdown> for BreakdownBody {
    fn from(value: FareBreakdown) -> Self {
        Self {
            base_fare: value.base_fare,
            call_fee: value.call_fee,
            waypoint_fee: value.waypoint_fee,
            special_fees: value
                .special_fees
                .into_iter()
                .map(|fee| SpecialFeeBody {
                    detail_id: fee.detail_id.0,
                    amount: fee.amount,
                    description: fee.description,
                })
                .collect(),
            total: value.total,
        }
    }
}

impl From<CalculationDetail> for CalculationBody {
    fn from(value: CalculationDetail) -> Self {
        Self {
            base_source: value.base_source,
            base_detail_id: value.base_detail_id.map(|id| id.0),
            base_region: value.base_region,
            call_fee_rate: value.call_fee_rate.map(AppliedRateBody::from),
            waypoint_fee_rate: value.waypoint_fee_rate.map(AppliedRateBody::from),
            total_stops: value.total_stops,
            distinct_regions: value.distinct_regions,
            extra_stops: value.extra_stops,
            extra_regions: value.extra_regions,
        }
    }
}

impl From<AppliedRate> for AppliedRateBody {
    fn from(value: AppliedRate) -> Self {
        Self { detail_id: value.detail_id.0, rate: value.rate }
    }
}

impl From<RateSuggestions> for SuggestionsBody {
    fn from(value: RateSuggestions) -> Self {
        Self { available_centers: value.available_centers, available_tonnages: value.available_tonnages }
    }
}

impl From<RateDetail> for DetailBody {
    fn from(value: RateDetail) -> Self {
        Self {
            id: value.id.0,
            kind: value.kind,
            region: value.region,
            amount: value.amount,
            conditions: value.conditions,
            active: value.active,
            valid_from: value.valid_from,
            valid_to: value.valid_to,
            position: value.position,
        }
    }
}

impl From<ImportReport> for ImportResponse {
    fn from(value: ImportReport) -> Self {
        Self {
            mode: value.mode,
            total_rows: value.total_rows,
            accepted: value.accepted,
            rejected: value.rejected,
            created_master_ids: value.created_master_ids.into_iter().map(|id| id.0).collect(),
            errors: value.errors.iter().map(ImportIssueBody::from).collect(),
        }
    }
}

impl From<&ImportError> for ImportIssueBody {
    fn from(value: &ImportError) -> Self {
        Self { kind: value.kind(), row: value.row(), message: value.to_string() }
    }
}

impl DetailInput {
    fn into_new_detail(self) -> Result<NewRateDetail, String> {
        let kind = self.kind.parse::<RateKind>().map_err(|error| error.to_string())?;
        let valid_from = parse_optional_date("validFrom", self.valid_from.as_deref())?;
        let valid_to = parse_optional_date("validTo", self.valid_to.as_deref())?;

        let mut detail = NewRateDetail::new(kind, self.amount).with_validity(valid_from, valid_to);
        detail.region = self.region;
        detail.conditions = self.conditions;
        detail.active = self.active.unwrap_or(true);
        Ok(detail)
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router<C>(catalog: C, max_import_rows: usize) -> Router
where
    C: RateCatalogAdmin + 'static,
{
    let state = RatesState { engine: Arc::new(FareEngine::new(catalog)), max_import_rows };

    Router::new()
        .route("/api/v1/rates/calculate", post(calculate::<C>))
        .route("/api/v1/rates/suggestions", get(suggestions::<C>))
        .route("/api/v1/rates/{master_id}/details", put(replace_details::<C>))
        .route("/api/v1/rates/import", post(import_rates::<C>))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn calculate<C: RateCatalogAdmin>(
    State(state): State<RatesState<C>>,
    headers: HeaderMap,
    Json(body): Json<CalculateBody>,
) -> Result<Json<CalculateResponse>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let as_of = parse_optional_date("date", body.date.as_deref()).map_err(|message| {
        interface_failure(
            ApplicationError::from(RateLookupError::InvalidQuery(message)),
            "invalid_query",
            &correlation_id,
            None,
        )
    })?;

    let query = TripQuery::new(body.center_name, body.tonnage, body.regions)
        .with_total_stops(body.total_stops)
        .with_distinct_regions(body.distinct_regions)
        .as_of(as_of);

    match state.engine.calculate_rate(&query).await {
        Ok(calculation) => {
            info!(
                event_name = "http.rates.calculate.ok",
                correlation_id = %correlation_id,
                rate_master_id = %calculation.rate_master.id,
                total = %calculation.breakdown.total,
                "fare quoted"
            );
            Ok(Json(CalculateResponse::from(calculation)))
        }
        Err(error) => {
            warn!(
                event_name = "http.rates.calculate.rejected",
                correlation_id = %correlation_id,
                error_class = error.error_class(),
                error = %error,
                "fare request rejected"
            );
            Err(lookup_failure(&state, error, &correlation_id).await)
        }
    }
}

async fn suggestions<C: RateCatalogAdmin>(
    State(state): State<RatesState<C>>,
    headers: HeaderMap,
) -> Result<Json<SuggestionsBody>, ApiError> {
    let correlation_id = correlation_id(&headers);
    state
        .engine
        .suggestions()
        .await
        .map(|suggestions| Json(SuggestionsBody::from(suggestions)))
        .map_err(|error| catalog_failure(error, &correlation_id))
}

async fn replace_details<C: RateCatalogAdmin>(
    State(state): State<RatesState<C>>,
    Path(master_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<ReplaceDetailsBody>,
) -> Result<Json<DetailsResponse>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let details = body
        .details
        .into_iter()
        .enumerate()
        .map(|(index, input)| {
            input.into_new_detail().map_err(|message| format!("details[{index}]: {message}"))
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(|message| bad_request("invalid_detail", message, &correlation_id))?;

    let master_id = RateMasterId(master_id);
    let saved = state
        .engine
        .catalog()
        .replace_details(&master_id, details)
        .await
        .map_err(|error| catalog_failure(error, &correlation_id))?;

    info!(
        event_name = "http.rates.details.replaced",
        correlation_id = %correlation_id,
        rate_master_id = %master_id,
        line_count = saved.len(),
        "rate detail set replaced"
    );

    Ok(Json(DetailsResponse {
        rate_master_id: master_id.0,
        details: saved.into_iter().map(DetailBody::from).collect(),
    }))
}

async fn import_rates<C: RateCatalogAdmin>(
    State(state): State<RatesState<C>>,
    Query(query): Query<ImportQuery>,
    headers: HeaderMap,
    body: String,
) -> Result<(StatusCode, Json<ImportResponse>), ApiError> {
    let correlation_id = correlation_id(&headers);
    let mode = match query.mode.as_deref() {
        Some(raw) => raw
            .parse::<ImportMode>()
            .map_err(|message| bad_request("invalid_mode", message, &correlation_id))?,
        None => ImportMode::default(),
    };

    let parsed = parse_import_file(body.as_bytes(), state.max_import_rows);
    let report = RateImporter::new(state.engine.catalog())
        .with_actor("http")
        .run(parsed, mode)
        .await
        .map_err(|error| catalog_failure(error, &correlation_id))?;

    let status =
        if report.has_errors() { StatusCode::UNPROCESSABLE_ENTITY } else { StatusCode::OK };
    Ok((status, Json(ImportResponse::from(report))))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

fn parse_optional_date(field: &str, raw: Option<&str>) -> Result<Option<DateTime<Utc>>, String> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => parse_date(value)
            .map(Some)
            .ok_or_else(|| format!("{field} `{value}` is not a date (expected YYYY-MM-DD or RFC 3339)")),
        None => Ok(None),
    }
}

fn status_for(error: &InterfaceError) -> StatusCode {
    match error {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
        InterfaceError::Unprocessable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn interface_failure(
    error: ApplicationError,
    error_class: &str,
    correlation_id: &str,
    suggestions: Option<SuggestionsBody>,
) -> ApiError {
    let interface = error.into_interface(correlation_id);
    let body = ErrorBody {
        error: interface.user_message().to_string(),
        error_class: error_class.to_string(),
        message: interface.message().to_string(),
        correlation_id: interface.correlation_id().to_string(),
        suggestions,
    };
    (status_for(&interface), Json(body))
}

async fn lookup_failure<C: RateCatalogAdmin>(
    state: &RatesState<C>,
    error: RateLookupError,
    correlation_id: &str,
) -> ApiError {
    let suggestions = match error {
        RateLookupError::RateNotFound { .. } => {
            state.engine.suggestions().await.ok().map(SuggestionsBody::from)
        }
        _ => None,
    };
    let error_class = error.error_class();
    interface_failure(ApplicationError::from(error), error_class, correlation_id, suggestions)
}

fn catalog_failure(error: CatalogError, correlation_id: &str) -> ApiError {
    let error_class = match &error {
        CatalogError::MasterNotFound(_) => "master_not_found",
        CatalogError::DuplicateKey { .. } => "duplicate_key",
        CatalogError::Domain(_) => "invalid_detail",
        CatalogError::Unavailable(_) | CatalogError::Decode(_) => "catalog",
    };
    interface_failure(ApplicationError::from(error), error_class, correlation_id, None)
}

fn bad_request(error_class: &str, message: String, correlation_id: &str) -> ApiError {
    interface_failure(
        ApplicationError::from(DomainError::InvariantViolation(message)),
        error_class,
        correlation_id,
        None,
    )
}

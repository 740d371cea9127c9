use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::rate::{normalize_region, RateDetail, RateDetailId, RateKind};
use crate::domain::trip::distinct_region_count;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialFee {
    pub detail_id: RateDetailId,
    pub amount: Decimal,
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FareBreakdown {
    pub base_fare: Decimal,
    pub call_fee: Decimal,
    pub waypoint_fee: Decimal,
    pub special_fees: Vec<SpecialFee>,
    pub total: Decimal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseFareSource {
    /// Most expensive BASE line among the visited regions.
    RegionMatch,
    /// The BASE line without a region.
    General,
    /// Neither existed; base fare is zero.
    Unpriced,
}

/// A per-unit rate that was applied, and the line it came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedRate {
    pub detail_id: RateDetailId,
    pub rate: Decimal,
}

/// Audit record of how a breakdown was derived.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculationDetail {
    pub base_source: BaseFareSource,
    pub base_detail_id: Option<RateDetailId>,
    pub base_region: Option<String>,
    pub call_fee_rate: Option<AppliedRate>,
    pub waypoint_fee_rate: Option<AppliedRate>,
    pub total_stops: u32,
    pub distinct_regions: u32,
    pub extra_stops: u32,
    pub extra_regions: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FareCalculation {
    pub breakdown: FareBreakdown,
    pub calculation: CalculationDetail,
}

#[derive(Clone, Copy, Debug)]
pub struct FareInput<'a> {
    pub details: &'a [RateDetail],
    pub regions: &'a [String],
    pub total_stops: Option<u32>,
    pub distinct_regions: Option<u32>,
}

pub trait FareCalculator: Send + Sync {
    fn compute(&self, input: &FareInput<'_>) -> FareCalculation;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DeterministicFareCalculator;

impl FareCalculator for DeterministicFareCalculator {
    fn compute(&self, input: &FareInput<'_>) -> FareCalculation {
        compute_breakdown(input.details, input.regions, input.total_stops, input.distinct_regions)
    }
}

/// Computes the fare for already-resolved detail lines.
///
/// - base: the highest BASE amount among lines whose region matches any
///   visited region; otherwise the general BASE line; otherwise zero.
/// - call fee: first CALL_FEE rate × (stops − 1), floored at zero.
/// - waypoint fee: first WAYPOINT_FEE rate × (distinct regions − 1), floored
///   at zero.
/// - every SPECIAL line is added as its own item.
///
/// An explicit `distinct_regions` always wins over the count derived from
/// `regions`, including an explicit zero.
pub fn compute_breakdown(
    details: &[RateDetail],
    regions: &[String],
    total_stops: Option<u32>,
    distinct_regions: Option<u32>,
) -> FareCalculation {
    let total_stops = total_stops.unwrap_or(1);
    let distinct_regions = distinct_regions.unwrap_or_else(|| distinct_region_count(regions));
    let extra_stops = total_stops.saturating_sub(1);
    let extra_regions = distinct_regions.saturating_sub(1);

    let (base_source, base_line) = select_base(details, regions);
    let base_fare = base_line.map(|line| line.amount).unwrap_or(Decimal::ZERO);

    let call_line = first_of_kind(details, RateKind::CallFee);
    let call_fee = call_line.map(|line| line.amount * Decimal::from(extra_stops)).unwrap_or_default();

    let waypoint_line = first_of_kind(details, RateKind::WaypointFee);
    let waypoint_fee =
        waypoint_line.map(|line| line.amount * Decimal::from(extra_regions)).unwrap_or_default();

    let special_fees = details
        .iter()
        .filter(|line| line.kind == RateKind::Special)
        .map(|line| SpecialFee {
            detail_id: line.id.clone(),
            amount: line.amount,
            description: special_description(line),
        })
        .collect::<Vec<_>>();
    let special_total: Decimal = special_fees.iter().map(|fee| fee.amount).sum();

    let total = base_fare + call_fee + waypoint_fee + special_total;

    FareCalculation {
        breakdown: FareBreakdown { base_fare, call_fee, waypoint_fee, special_fees, total },
        calculation: CalculationDetail {
            base_source,
            base_detail_id: base_line.map(|line| line.id.clone()),
            base_region: base_line.and_then(|line| line.region.clone()),
            call_fee_rate: call_line
                .map(|line| AppliedRate { detail_id: line.id.clone(), rate: line.amount }),
            waypoint_fee_rate: waypoint_line
                .map(|line| AppliedRate { detail_id: line.id.clone(), rate: line.amount }),
            total_stops,
            distinct_regions,
            extra_stops,
            extra_regions,
        },
    }
}

fn select_base<'a>(
    details: &'a [RateDetail],
    regions: &[String],
) -> (BaseFareSource, Option<&'a RateDetail>) {
    let base_lines = details.iter().filter(|line| line.kind == RateKind::Base).collect::<Vec<_>>();

    let mut best: Option<&RateDetail> = None;
    for region in regions {
        let wanted = normalize_region(region);
        if wanted.is_empty() {
            continue;
        }
        for line in &base_lines {
            if line.region_key().as_deref() != Some(wanted.as_str()) {
                continue;
            }
            // Strictly greater: ties keep the first line seen.
            if best.map_or(true, |current| line.amount > current.amount) {
                best = Some(line);
            }
        }
    }
    if best.is_some() {
        return (BaseFareSource::RegionMatch, best);
    }

    match base_lines.into_iter().find(|line| line.region_key().is_none()) {
        Some(general) => (BaseFareSource::General, Some(general)),
        None => (BaseFareSource::Unpriced, None),
    }
}

fn first_of_kind(details: &[RateDetail], kind: RateKind) -> Option<&RateDetail> {
    details.iter().find(|line| line.kind == kind)
}

fn special_description(line: &RateDetail) -> String {
    match line.conditions_text() {
        Some(text) => text.to_string(),
        None => {
            let scope = line.region.as_deref().map(str::trim).filter(|r| !r.is_empty());
            format!("특수요금 ({})", scope.unwrap_or("전체"))
        }
    }
}

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{NaiveDate, Utc};
use napi::Result as NapiResult;
use napi_derive::napi;
use rust_decimal::Decimal;
use serde::Deserialize;

use deminimis_core::aggregation::{Associate, GroupAggregator};
use deminimis_core::extraction::RawSnapshot;
use deminimis_core::settings::RegistrySettings;
use deminimis_core::types::CompanyAidResult;
use deminimis_core::DeMinimisError;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

// ---------------------------------------------------------------------------
// Amounts
// ---------------------------------------------------------------------------

/// Parse "€ 1.234,56" style text; `null` when no positive amount is found.
#[napi]
pub fn parse_amount(text: String) -> Option<String> {
    deminimis_core::amount::parse_amount(&text).map(|a| a.to_string())
}

/// Format a canonical decimal string the Italian way ("1.234,56").
#[napi]
pub fn format_amount(value: String) -> NapiResult<String> {
    let value = Decimal::from_str(value.trim()).map_err(to_napi_error)?;
    Ok(deminimis_core::amount::format_amount_it(value))
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ExtractSnapshotInput {
    tax_id: String,
    snapshot: RawSnapshot,
    #[serde(default)]
    reference_date: Option<NaiveDate>,
    #[serde(default)]
    settings: RegistrySettings,
}

/// `{tax_id, snapshot: {format: "html"|"csv", content}, reference_date?, settings?}`
#[napi]
pub fn extract_snapshot(input_json: String) -> NapiResult<String> {
    let input: ExtractSnapshotInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let reference_date = input.reference_date.unwrap_or_else(|| Utc::now().date_naive());
    let output = deminimis_core::extraction::extract_snapshot(
        &input.tax_id,
        &input.snapshot,
        reference_date,
        &input.settings,
    )
    .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct AggregateGroupInput {
    principal_id: String,
    #[serde(default)]
    principal_name: Option<String>,
    #[serde(default)]
    associates: Vec<Associate>,
    #[serde(default)]
    associate_error: Option<String>,
    #[serde(default)]
    results: HashMap<String, CompanyAidResult>,
    #[serde(default)]
    settings: RegistrySettings,
}

/// Aggregate per-company results already computed by the host.
/// Companies without a supplied result become member errors.
#[napi]
pub fn aggregate_group(input_json: String) -> NapiResult<String> {
    let input: AggregateGroupInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    input.settings.validate().map_err(to_napi_error)?;

    let lookup = match input.associate_error {
        Some(msg) => Err(DeMinimisError::AssociateLookup(msg)),
        None => Ok(input.associates),
    };
    let mut aggregator = GroupAggregator::new(input.settings);
    if let Some(name) = input.principal_name {
        aggregator = aggregator.with_principal_name(name);
    }
    let group = aggregator.aggregate_supplied(&input.principal_id, lookup, input.results);
    serde_json::to_string(&group).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// SME classification
// ---------------------------------------------------------------------------

#[napi]
pub fn classify_sme(input_json: String) -> NapiResult<String> {
    let input: deminimis_core::sme::SmeInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = deminimis_core::sme::classify_enterprise(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

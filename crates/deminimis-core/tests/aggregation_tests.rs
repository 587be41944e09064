use std::collections::HashMap;

use chrono::NaiveDate;
use deminimis_core::aggregation::{aggregate, AidStatus, Associate, GroupAggregator, MemberRole, Methodology};
use deminimis_core::settings::RegistrySettings;
use deminimis_core::types::{AidRecord, CompanyAidResult, Money};
use deminimis_core::DeMinimisError;
use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;

fn company(tax_id: &str, amounts: &[Money]) -> CompanyAidResult {
    let d = NaiveDate::from_ymd_opt(2024, 4, 10).unwrap();
    let records = amounts
        .iter()
        .filter_map(|a| AidRecord::new(d, *a, "Misura"))
        .collect();
    CompanyAidResult::from_records(tax_id, records)
}

fn associate(tax_id: &str, name: &str) -> Associate {
    Associate {
        tax_id: tax_id.into(),
        display_name: name.into(),
        control_percentage: dec!(60),
    }
}

fn group_results(tax_id: &str) -> CompanyAidResult {
    match tax_id {
        "PRINCIPAL" => company(tax_id, &[dec!(40000), dec!(5368.50)]),
        "ASSOC1" => company(tax_id, &[dec!(1000)]),
        _ => CompanyAidResult::failed(tax_id, "timeout"),
    }
}

// ===========================================================================
// Totals and member bookkeeping
// ===========================================================================

#[test]
fn test_error_member_excluded_from_total() {
    let associates = [associate("ASSOC1", "Alfa Srl"), associate("ASSOC2", "Beta Srl")];
    let group = aggregate("PRINCIPAL", &associates, group_results);

    assert_eq!(group.total_amount, dec!(46368.50));
    assert_eq!(group.member_results.len(), 3);
    assert_eq!(group.member_count, 3);
    assert_eq!(group.aid_count, 3);
    assert_eq!(group.methodology, Methodology::Aggregate);
    assert_eq!(group.member_results[0].role, MemberRole::Principal);
    assert_eq!(group.member_results[2].result.error.as_deref(), Some("timeout"));
    assert_eq!(group.failed_members().count(), 1);
    assert_eq!(group.warnings, vec!["Calculation failed for ASSOC2: timeout".to_string()]);
    assert_eq!(group.status, AidStatus::Green);
    assert_eq!(group.utilization_pct, dec!(15.45));
    assert_eq!(group.remaining_margin, dec!(253631.50));
}

#[test]
fn test_members_processed_in_order() {
    let associates = [associate("B", "B"), associate("A", "A")];
    let mut seen = Vec::new();
    aggregate("P", &associates, |id| {
        seen.push(id.to_string());
        company(id, &[])
    });
    assert_eq!(seen, vec!["P", "B", "A"]);
}

#[test]
fn test_rerun_is_identical_apart_from_timestamp() {
    let associates = [associate("ASSOC1", "Alfa Srl"), associate("ASSOC2", "Beta Srl")];
    let mut first = aggregate("PRINCIPAL", &associates, group_results);
    let second = aggregate("PRINCIPAL", &associates, group_results);
    first.computed_at = second.computed_at;
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

// ===========================================================================
// Degraded modes
// ===========================================================================

#[test]
fn test_no_associates_is_single_mode() {
    let group = aggregate("02918700168", &[], |id| company(id, &[dec!(12000)]));
    assert_eq!(group.methodology, Methodology::Single);
    assert_eq!(group.member_results.len(), 1);
    assert_eq!(group.principal_id, "02918700168");
    let json = serde_json::to_value(&group).unwrap();
    assert_eq!(json["methodology"], "single");
}

#[test]
fn test_zero_records_is_green_and_not_an_error() {
    let group = aggregate("01234567890", &[], |id| company(id, &[]));
    assert_eq!(group.total_amount, dec!(0));
    assert_eq!(group.status, AidStatus::Green);
    assert!(group.member_results[0].result.error.is_none());
    assert!(group.warnings.is_empty());
    assert_eq!(group.remaining_margin, dec!(300000));
}

#[test]
fn test_lookup_failure_falls_back_to_principal() {
    let aggregator = GroupAggregator::new(RegistrySettings::default());
    let mut finder = |_: &str| -> Result<Vec<Associate>, DeMinimisError> {
        Err(DeMinimisError::AssociateLookup("login rejected".into()))
    };
    let group = aggregator.aggregate_with_finder("PRINCIPAL", &mut finder, group_results);

    assert_eq!(group.methodology, Methodology::Single);
    assert_eq!(group.member_results.len(), 1);
    assert_eq!(group.total_amount, dec!(45368.50));
    assert_eq!(
        group.associate_lookup_error.as_deref(),
        Some("Associate lookup failed: login rejected")
    );
    assert_eq!(group.warnings.len(), 1);
}

#[test]
fn test_total_failure_still_returns_group() {
    let aggregator = GroupAggregator::default();
    let group = aggregator.aggregate_lookup(
        "PRINCIPAL",
        Err(DeMinimisError::AssociateLookup("unreachable".into())),
        |id| CompanyAidResult::failed(id, "Navigation failure: registry unreachable"),
    );
    assert_eq!(group.total_amount, dec!(0));
    assert_eq!(group.status, AidStatus::Green);
    assert_eq!(group.warnings.len(), 2);
}

#[test]
fn test_duplicate_associates_skipped() {
    let associates = [associate("ASSOC1", "Alfa"), associate("ASSOC1", "Alfa bis"), associate("PRINCIPAL", "Self")];
    let group = aggregate("PRINCIPAL", &associates, group_results);
    assert_eq!(group.member_results.len(), 2);
    assert_eq!(group.warnings.len(), 2);
    assert_eq!(group.total_amount, dec!(46368.50));
}

// ===========================================================================
// Ceiling and status
// ===========================================================================

#[test]
fn test_status_bands_at_group_level() {
    let yellow = aggregate("P", &[], |id| company(id, &[dec!(269700)]));
    assert_eq!(yellow.utilization_pct, dec!(89.90));
    assert_eq!(yellow.status, AidStatus::Yellow);

    let red = aggregate("P", &[], |id| company(id, &[dec!(270000)]));
    assert_eq!(red.status, AidStatus::Red);

    let green = aggregate("P", &[], |id| company(id, &[dec!(209700)]));
    assert_eq!(green.utilization_pct, dec!(69.90));
    assert_eq!(green.status, AidStatus::Green);
}

#[test]
fn test_group_just_under_threshold_keeps_lower_band() {
    let yellow = aggregate("P", &[], |id| company(id, &[dec!(269985.00)]));
    assert_eq!(yellow.utilization_pct, dec!(89.99));
    assert_eq!(yellow.status, AidStatus::Yellow);

    let green = aggregate("P", &[], |id| company(id, &[dec!(209985.00)]));
    assert_eq!(green.utilization_pct, dec!(69.99));
    assert_eq!(green.status, AidStatus::Green);
}

#[test]
fn test_ceiling_exceeded_clamps_margin() {
    let group = aggregate("P", &[associate("A", "A")], |id| company(id, &[dec!(200000)]));
    assert_eq!(group.total_amount, dec!(400000));
    assert!(group.ceiling_exceeded);
    assert_eq!(group.remaining_margin, dec!(0));
    assert_eq!(group.status, AidStatus::Red);
}

#[test]
fn test_custom_ceiling_from_settings() {
    let settings = RegistrySettings {
        ceiling: dec!(200000),
        ..RegistrySettings::default()
    };
    let group = GroupAggregator::new(settings).aggregate("P", &[], |id| company(id, &[dec!(150000)]));
    assert_eq!(group.utilization_pct, dec!(75));
    assert_eq!(group.status, AidStatus::Yellow);
}

// ===========================================================================
// Results supplied by the caller
// ===========================================================================

#[test]
fn test_supplied_results_rekeyed_and_missing_members_fail() {
    let mut stale = company("WRONG-ID", &[dec!(1000), dec!(500)]);
    stale.total = dec!(999999);
    let results = HashMap::from([
        ("PRINCIPAL".to_string(), company("PRINCIPAL", &[dec!(20000)])),
        ("ASSOC1".to_string(), stale),
    ]);
    let associates = vec![associate("ASSOC1", "Alfa Srl"), associate("ASSOC2", "Beta Srl")];

    let group = GroupAggregator::default()
        .with_principal_name("Rossi Costruzioni Spa")
        .aggregate_supplied("PRINCIPAL", Ok(associates), results);

    assert_eq!(group.member_results[0].display_name, "Rossi Costruzioni Spa");
    assert_eq!(group.member_results[1].result.tax_id, "ASSOC1");
    assert_eq!(group.member_results[1].result.total, dec!(1500));
    assert_eq!(
        group.member_results[2].result.error.as_deref(),
        Some("No calculation result supplied")
    );
    assert_eq!(group.total_amount, dec!(21500));
}

#[test]
fn test_principal_name_defaults_when_blank() {
    let group = GroupAggregator::default()
        .with_principal_name("   ")
        .aggregate("P", &[], |id| company(id, &[dec!(10)]));
    assert_eq!(group.member_results[0].display_name, "Principal company");
}

use std::collections::HashMap;
use std::time::Duration;

use chrono::NaiveDate;
use deminimis_core::aggregation::{Associate, GroupAggregator, Methodology};
use deminimis_core::alert::{AlertKind, RecordingAlertSink};
use deminimis_core::collaborators::BrowserDriver;
use deminimis_core::extraction::ResultTable;
use deminimis_core::registry::{RegistryCalculator, RegistrySelectors};
use deminimis_core::settings::RegistrySettings;
use deminimis_core::types::ResultSource;
use deminimis_core::{DeMinimisError, DeMinimisResult};
use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;

/// Scripted registry session. Pages are chosen by the tax id typed into the
/// search form.
#[derive(Default)]
struct FakeDriver {
    companies: HashMap<String, Vec<ResultTable>>,
    exports: HashMap<String, Vec<u8>>,
    current_tax_id: String,
    current_page: usize,
    fields: Vec<(String, String)>,
    navigations: usize,
    refuse_connection: bool,
    navigation_times_out: bool,
    table_never_appears: bool,
    rows_missing: bool,
}

impl FakeDriver {
    fn with_pages(mut self, tax_id: &str, pages: Vec<ResultTable>) -> Self {
        self.companies.insert(tax_id.into(), pages);
        self
    }

    fn with_export(mut self, tax_id: &str, body: &str) -> Self {
        self.exports.insert(tax_id.into(), body.as_bytes().to_vec());
        self
    }

    fn pages(&self) -> &[ResultTable] {
        self.companies
            .get(&self.current_tax_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

impl BrowserDriver for FakeDriver {
    fn navigate(&mut self, _url: &str, timeout: Duration) -> DeMinimisResult<()> {
        if self.refuse_connection {
            return Err(DeMinimisError::Navigation("connection refused".into()));
        }
        if self.navigation_times_out {
            return Err(DeMinimisError::Timeout {
                operation: "loading the registry search page".into(),
                seconds: timeout.as_secs(),
            });
        }
        self.navigations += 1;
        self.current_page = 0;
        Ok(())
    }

    fn fill_field(&mut self, selector: &str, value: &str) -> DeMinimisResult<()> {
        if selector == RegistrySelectors::default().tax_id_field {
            self.current_tax_id = value.to_string();
        }
        self.fields.push((selector.into(), value.into()));
        Ok(())
    }

    fn submit(&mut self) -> DeMinimisResult<()> {
        Ok(())
    }

    fn wait_for(&mut self, selector: &str, timeout: Duration) -> DeMinimisResult<()> {
        if self.table_never_appears {
            return Err(DeMinimisError::Timeout {
                operation: format!("waiting for {selector}"),
                seconds: timeout.as_secs(),
            });
        }
        Ok(())
    }

    fn get_rows(&mut self, table_selector: &str) -> DeMinimisResult<ResultTable> {
        if self.table_never_appears || self.rows_missing {
            return Err(DeMinimisError::ElementNotFound(table_selector.into()));
        }
        Ok(self.pages().get(self.current_page).cloned().unwrap_or_default())
    }

    fn click_if_enabled(&mut self, _selector: &str, _timeout: Duration) -> DeMinimisResult<bool> {
        if self.current_page + 1 < self.pages().len() {
            self.current_page += 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn download_export(&mut self) -> DeMinimisResult<Vec<u8>> {
        self.exports
            .get(&self.current_tax_id)
            .cloned()
            .ok_or_else(|| DeMinimisError::ElementNotFound("export link".into()))
    }
}

fn page(rows: &[(&str, &str)]) -> ResultTable {
    ResultTable::from_triples(rows.iter().map(|(d, a)| (*d, *a, "Misura")))
}

fn calculator(driver: FakeDriver) -> RegistryCalculator<FakeDriver, RecordingAlertSink> {
    RegistryCalculator::new(driver, RecordingAlertSink::default(), RegistrySettings::default())
        .with_reference_date(NaiveDate::from_ymd_opt(2025, 1, 15).unwrap())
}

// ===========================================================================
// Successful sessions
// ===========================================================================

#[test]
fn test_multi_page_session() {
    let driver = FakeDriver::default().with_pages(
        "01234567890",
        vec![
            page(&[("10/12/2024", "€ 10.000,00"), ("01/03/2023", "€ 2.500,00")]),
            page(&[("05/05/2022", "€ 1.000,50"), ("01/01/2021", "1,00"), ("01/01/2020", "1,00"), ("01/01/2019", "1,00")]),
            page(&[("01/06/2024", "€ 999,00")]),
        ],
    );
    let mut calc = calculator(driver);
    let result = calc.calculate(" 01234567890 ");

    assert!(result.error.is_none());
    assert_eq!(result.tax_id, "01234567890");
    assert_eq!(result.total, dec!(13500.50));
    assert_eq!(result.records.len(), 3);
    assert_eq!(result.pages_visited, 2);
    assert_eq!(result.source, ResultSource::Table);
    assert!(result.searched_at.is_some());

    let (driver, alerts) = calc.into_parts();
    assert!(alerts.alerts.is_empty());
    let sel = RegistrySelectors::default();
    assert!(driver.fields.contains(&(sel.aid_type_field.clone(), "De Minimis".to_string())));
    assert!(driver.fields.contains(&(sel.date_from_field.clone(), "17/01/2019".to_string())));
    assert!(driver.fields.contains(&(sel.date_to_field.clone(), "15/01/2025".to_string())));
}

#[test]
fn test_export_fallback_when_table_is_empty() {
    let export = "Beneficiario;Titolo misura;Data concessione;Elemento aiuto\n\
                  ACME;Voucher;01/12/2024;5.000,00\n\
                  ACME;Old;01/01/2019;1.000,00\n";
    let driver = FakeDriver::default()
        .with_pages("01234567890", vec![page(&[])])
        .with_export("01234567890", export);
    let result = calculator(driver).calculate("01234567890");

    assert!(result.error.is_none());
    assert_eq!(result.source, ResultSource::Export);
    assert_eq!(result.total, dec!(5000));
}

#[test]
fn test_no_records_anywhere_is_a_zero_result() {
    let driver = FakeDriver::default().with_pages("01234567890", vec![page(&[])]);
    let mut calc = calculator(driver);
    let result = calc.calculate("01234567890");

    assert!(result.error.is_none());
    assert_eq!(result.total, dec!(0));
    assert_eq!(result.source, ResultSource::None);
    assert!(calc.into_parts().1.alerts.is_empty());
}

#[test]
fn test_single_company_over_ceiling_raises_suspicious_alert() {
    let driver = FakeDriver::default().with_pages("01234567890", vec![page(&[("01/06/2024", "€ 350.000,00")])]);
    let mut calc = calculator(driver);
    let result = calc.calculate("01234567890");

    assert!(result.error.is_none());
    assert_eq!(result.total, dec!(350000));
    let alerts = calc.into_parts().1.alerts;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].kind, AlertKind::SuspiciousResult);
}

// ===========================================================================
// Failures
// ===========================================================================

#[test]
fn test_missing_results_table_falls_back_to_export() {
    let export = "Data concessione;Elemento aiuto\n01/12/2024;5.000,00\n";
    let driver = FakeDriver {
        table_never_appears: true,
        ..FakeDriver::default()
    }
    .with_export("01234567890", export);
    let mut calc = calculator(driver);
    let result = calc.calculate("01234567890");

    assert!(result.error.is_none());
    assert_eq!(result.total, dec!(5000));
    assert_eq!(result.source, ResultSource::Export);
    assert_eq!(result.pages_visited, 0);
    assert!(calc.into_parts().1.alerts.is_empty());
}

#[test]
fn test_missing_results_table_without_export_is_a_zero_result() {
    let driver = FakeDriver {
        table_never_appears: true,
        ..FakeDriver::default()
    };
    let mut calc = calculator(driver);
    let result = calc.calculate("01234567890");

    assert!(result.error.is_none());
    assert_eq!(result.total, dec!(0));
    assert_eq!(result.source, ResultSource::None);
    assert!(calc.into_parts().1.alerts.is_empty());
}

#[test]
fn test_rows_vanishing_after_wait_read_as_empty_page() {
    let export = "Data concessione;Elemento aiuto\n01/12/2024;750,00\n";
    let driver = FakeDriver {
        rows_missing: true,
        ..FakeDriver::default()
    }
    .with_export("01234567890", export);
    let result = calculator(driver).calculate("01234567890");

    assert!(result.error.is_none());
    assert_eq!(result.total, dec!(750));
    assert_eq!(result.source, ResultSource::Export);
}

#[cfg(feature = "html")]
#[test]
fn test_html_export_is_scanned_in_full() {
    let export = "<table><tr><th>Data Concessione</th><th>Elemento Aiuto</th></tr>\
                  <tr><td>01/01/2020</td><td>1.000,00</td></tr>\
                  <tr><td>01/01/2019</td><td>1.000,00</td></tr>\
                  <tr><td>01/01/2018</td><td>1.000,00</td></tr>\
                  <tr><td>10/10/2024</td><td>2.345,67</td></tr></table>";
    let driver = FakeDriver::default()
        .with_pages("01234567890", vec![page(&[])])
        .with_export("01234567890", export);
    let result = calculator(driver).calculate("01234567890");

    assert!(result.error.is_none());
    assert_eq!(result.total, dec!(2345.67));
    assert_eq!(result.source, ResultSource::Export);
}

#[test]
fn test_navigation_timeout_becomes_error_result_and_alert() {
    let driver = FakeDriver {
        navigation_times_out: true,
        ..FakeDriver::default()
    };
    let mut calc = calculator(driver);
    let result = calc.calculate("01234567890");

    assert!(result.is_error());
    assert!(result.records.is_empty());
    assert_eq!(result.total, dec!(0));

    let alerts = calc.into_parts().1.alerts;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].kind, AlertKind::ScrapingFailure);
    assert_eq!(alerts[0].tax_id, "01234567890");
    assert_eq!(alerts[0].context.get("error_kind").map(String::as_str), Some("timeout"));
    assert_eq!(alerts[0].context.get("step").map(String::as_str), Some("navigate"));
}

#[test]
fn test_connection_failure_is_not_alerted() {
    let driver = FakeDriver {
        refuse_connection: true,
        ..FakeDriver::default()
    };
    let mut calc = calculator(driver);
    let result = calc.calculate("01234567890");

    assert_eq!(result.error.as_deref(), Some("Navigation failure: connection refused"));
    assert!(calc.into_parts().1.alerts.is_empty());
}

// ===========================================================================
// Group run over one shared session
// ===========================================================================

#[test]
fn test_group_calculated_sequentially_on_one_session() {
    let driver = FakeDriver::default()
        .with_pages("PRINCIPAL", vec![page(&[("01/06/2024", "€ 45.368,50")])])
        .with_pages("ASSOC1", vec![page(&[("01/02/2023", "€ 1.000,00")])]);
    let mut calc = calculator(driver);
    let associates = [Associate {
        tax_id: "ASSOC1".into(),
        display_name: "Alfa Srl".into(),
        control_percentage: dec!(75),
    }];

    let group = GroupAggregator::default().aggregate("PRINCIPAL", &associates, |id| calc.calculate(id));

    assert_eq!(group.methodology, Methodology::Aggregate);
    assert_eq!(group.total_amount, dec!(46368.50));
    assert_eq!(calc.into_parts().0.navigations, 2);
}

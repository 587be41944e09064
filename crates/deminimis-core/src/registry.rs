//! Per-company calculation against the registry through a [`BrowserDriver`].

use std::time::Duration;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::alert::{Alert, AlertKind, AlertSink, TracingAlertSink};
use crate::collaborators::BrowserDriver;
use crate::extraction::{export_strategies, extract_with_strategies, RawSnapshot, RecencyWindow, ResultExtractor, ResultTable};
use crate::pagination::{PageSource, PaginationWalker};
use crate::settings::RegistrySettings;
use crate::types::{AidRecord, CompanyAidResult, ResultSource};
use crate::{DeMinimisError, DeMinimisResult};

/// Selectors handed to the driver. The core never interprets them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySelectors {
    pub tax_id_field: String,
    pub aid_type_field: String,
    pub aid_type_label: String,
    pub date_from_field: String,
    pub date_to_field: String,
    pub results_table: String,
    pub next_page: String,
}

impl Default for RegistrySelectors {
    fn default() -> Self {
        RegistrySelectors {
            tax_id_field: "input[name='cfBen']".into(),
            aid_type_field: "select[name='tipp']".into(),
            aid_type_label: "De Minimis".into(),
            date_from_field: "input[name='annoc']".into(),
            date_to_field: "input[name='annoc2']".into(),
            results_table: "table#trasparenzaAiuti".into(),
            next_page: "a.paginate_button.next".into(),
        }
    }
}

struct DriverPages<'a, D> {
    driver: &'a mut D,
    selectors: &'a RegistrySelectors,
    wait: Duration,
}

impl<D: BrowserDriver> PageSource for DriverPages<'_, D> {
    fn fetch_page(&mut self, page: u32) -> DeMinimisResult<ResultTable> {
        match self.driver.get_rows(&self.selectors.results_table) {
            Err(DeMinimisError::ElementNotFound(selector)) => {
                debug!(page, selector = %selector, "results table missing; treating page as empty");
                Ok(ResultTable::default())
            }
            other => other,
        }
    }

    fn advance(&mut self, _page: u32) -> DeMinimisResult<bool> {
        if !self.driver.click_if_enabled(&self.selectors.next_page, self.wait)? {
            return Ok(false);
        }
        self.driver.wait_for(&self.selectors.results_table, self.wait)?;
        Ok(true)
    }
}

/// Computes a [`CompanyAidResult`] per tax id, one blocking session step at
/// a time. Failures become error results; alert-worthy ones also go to the
/// alert sink.
pub struct RegistryCalculator<D, A = TracingAlertSink> {
    driver: D,
    alerts: A,
    settings: RegistrySettings,
    selectors: RegistrySelectors,
    reference_date: Option<NaiveDate>,
    step: &'static str,
}

impl<D: BrowserDriver, A: AlertSink> RegistryCalculator<D, A> {
    pub fn new(driver: D, alerts: A, settings: RegistrySettings) -> Self {
        RegistryCalculator {
            driver,
            alerts,
            settings,
            selectors: RegistrySelectors::default(),
            reference_date: None,
            step: "idle",
        }
    }

    pub fn with_selectors(mut self, selectors: RegistrySelectors) -> Self {
        self.selectors = selectors;
        self
    }

    /// Pin "today"; otherwise the current UTC date is used per calculation.
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    pub fn settings(&self) -> &RegistrySettings {
        &self.settings
    }

    pub fn into_parts(self) -> (D, A) {
        (self.driver, self.alerts)
    }

    /// Calculate one company. Never fails: errors are returned as data.
    pub fn calculate(&mut self, tax_id: &str) -> CompanyAidResult {
        let tax_id = tax_id.trim();
        let today = self.reference_date.unwrap_or_else(|| Utc::now().date_naive());
        let searched_at = Utc::now();

        match self.run(tax_id, today) {
            Ok(result) => {
                if result.total > self.settings.ceiling {
                    let alert = Alert::new(
                        AlertKind::SuspiciousResult,
                        tax_id,
                        format!(
                            "Single-company total {} exceeds the {} ceiling",
                            result.total, self.settings.ceiling
                        ),
                    )
                    .with_context("records", result.records.len());
                    self.alerts.notify(&alert);
                }
                result.searched_at(searched_at)
            }
            Err(e) => {
                warn!(tax_id, step = self.step, error = %e, "registry calculation failed");
                if e.is_alertable() {
                    let alert = Alert::new(AlertKind::ScrapingFailure, tax_id, e.to_string())
                        .with_context("error_kind", e.kind())
                        .with_context("step", self.step)
                        .with_context("url", &self.settings.registry_url);
                    self.alerts.notify(&alert);
                }
                CompanyAidResult::failed(tax_id, e.to_string()).searched_at(searched_at)
            }
        }
    }

    fn run(&mut self, tax_id: &str, today: NaiveDate) -> DeMinimisResult<CompanyAidResult> {
        let nav_timeout = Duration::from_secs(self.settings.navigation_timeout_secs);
        let wait = Duration::from_secs(self.settings.page_wait_timeout_secs);
        let from = today - chrono::Duration::days(self.settings.search_window_days);

        self.step = "navigate";
        self.driver.navigate(&self.settings.registry_url, nav_timeout)?;

        self.step = "fill_form";
        self.driver.fill_field(&self.selectors.tax_id_field, tax_id)?;
        self.driver
            .fill_field(&self.selectors.aid_type_field, &self.selectors.aid_type_label)?;
        self.driver
            .fill_field(&self.selectors.date_from_field, &from.format("%d/%m/%Y").to_string())?;
        self.driver
            .fill_field(&self.selectors.date_to_field, &today.format("%d/%m/%Y").to_string())?;

        self.step = "submit";
        self.driver.submit()?;

        // No results table is how the registry shows "no aid"; fall through
        // to the export with nothing collected.
        self.step = "wait_results";
        let table_present = match self.driver.wait_for(&self.selectors.results_table, wait) {
            Ok(()) => true,
            Err(e @ (DeMinimisError::Timeout { .. } | DeMinimisError::ElementNotFound(_))) => {
                debug!(tax_id, error = %e, "results table did not appear");
                false
            }
            Err(e) => return Err(e),
        };

        let window = RecencyWindow::new(today, self.settings.lookback_days);
        let (table_records, pages_visited) = if table_present {
            self.step = "paginate";
            let mut walker = PaginationWalker::new(
                ResultExtractor::new(window, self.settings.old_row_limit),
                self.settings.max_pages,
            );
            let outcome = walker.walk(&mut DriverPages {
                driver: &mut self.driver,
                selectors: &self.selectors,
                wait,
            })?;
            debug!(tax_id, pages = outcome.pages_visited, stop = ?outcome.stop_reason, "pagination finished");
            (outcome.records, outcome.pages_visited)
        } else {
            (Vec::new(), 0)
        };

        let (records, source) = if table_records.is_empty() {
            self.step = "export";
            let exported = self.export_fallback(&window);
            let source = if exported.is_empty() {
                ResultSource::None
            } else {
                ResultSource::Export
            };
            (exported, source)
        } else {
            (table_records, ResultSource::Table)
        };

        self.step = "done";
        let result = CompanyAidResult::from_records(tax_id, records)
            .with_source(source)
            .with_pages_visited(pages_visited);
        info!(tax_id, total = %result.total, aids = result.records.len(), "registry calculation complete");
        Ok(result)
    }

    /// Last resort when the table yielded nothing. A failed download is a
    /// zero result, not an error.
    fn export_fallback(&mut self, window: &RecencyWindow) -> Vec<AidRecord> {
        let bytes = match self.driver.download_export() {
            Ok(b) => b,
            Err(e) => {
                debug!(error = %e, "export download unavailable");
                return Vec::new();
            }
        };
        let snapshot = RawSnapshot::detect(String::from_utf8_lossy(&bytes).into_owned());
        extract_with_strategies(&export_strategies(), &snapshot, window)
            .map(|(_, records)| records)
            .unwrap_or_default()
    }
}

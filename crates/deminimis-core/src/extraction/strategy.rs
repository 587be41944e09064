//! Prioritised extraction strategies over a raw page or export snapshot.

use std::time::Instant;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::extractor::{RecencyWindow, ResultExtractor};
use crate::error::DeMinimisError;
use crate::settings::RegistrySettings;
use crate::types::{with_metadata, AidRecord, CompanyAidResult, ComputationOutput, ResultSource};
use crate::DeMinimisResult;

#[cfg(any(feature = "html", feature = "csv_export"))]
use super::table::ResultTable;

/// Raw content captured from the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "format", content = "content", rename_all = "snake_case")]
pub enum RawSnapshot {
    Html(String),
    Csv(String),
}

impl RawSnapshot {
    /// Guess the format: anything with a `<table` or `<html` tag is a page.
    pub fn detect(text: impl Into<String>) -> Self {
        let text = text.into();
        let lower = text.to_lowercase();
        if lower.contains("<table") || lower.contains("<html") {
            RawSnapshot::Html(text)
        } else {
            RawSnapshot::Csv(text)
        }
    }

    pub fn source(&self) -> ResultSource {
        match self {
            RawSnapshot::Html(_) => ResultSource::Table,
            RawSnapshot::Csv(_) => ResultSource::Export,
        }
    }
}

/// One way of locating aid rows in a snapshot.
///
/// `None` means the strategy does not apply or found nothing; the caller
/// moves on to the next strategy.
pub trait ExtractionStrategy {
    fn name(&self) -> &'static str;
    fn extract(&self, snapshot: &RawSnapshot, window: &RecencyWindow) -> Option<Vec<AidRecord>>;
}

/// Results grid of an HTML document. A rendered page stops after
/// `old_row_limit` consecutive out-of-window rows; with no limit the table
/// is scanned in full, as for an HTML-formatted export.
#[cfg(feature = "html")]
#[derive(Debug, Clone, Copy)]
pub struct HtmlTableStrategy {
    pub old_row_limit: Option<u32>,
}

#[cfg(feature = "html")]
impl HtmlTableStrategy {
    pub fn full_scan() -> Self {
        HtmlTableStrategy { old_row_limit: None }
    }
}

#[cfg(feature = "html")]
impl Default for HtmlTableStrategy {
    fn default() -> Self {
        HtmlTableStrategy {
            old_row_limit: Some(crate::settings::OLD_ROW_LIMIT),
        }
    }
}

#[cfg(feature = "html")]
impl ExtractionStrategy for HtmlTableStrategy {
    fn name(&self) -> &'static str {
        "html_table"
    }

    fn extract(&self, snapshot: &RawSnapshot, window: &RecencyWindow) -> Option<Vec<AidRecord>> {
        let RawSnapshot::Html(html) = snapshot else {
            return None;
        };
        let table = match ResultTable::from_html(html) {
            Ok(Some(t)) => t,
            Ok(None) => return None,
            Err(e) => {
                debug!(error = %e, "html table strategy failed");
                return None;
            }
        };
        let records = match self.old_row_limit {
            Some(limit) => ResultExtractor::new(*window, limit).extract_page(&table).records,
            None => ResultExtractor::new(*window, u32::MAX).scan_all(&table),
        };
        non_empty(records)
    }
}

/// Bulk tabular export, scanned in full.
#[cfg(feature = "csv_export")]
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvExportStrategy;

#[cfg(feature = "csv_export")]
impl ExtractionStrategy for CsvExportStrategy {
    fn name(&self) -> &'static str {
        "csv_export"
    }

    fn extract(&self, snapshot: &RawSnapshot, window: &RecencyWindow) -> Option<Vec<AidRecord>> {
        let RawSnapshot::Csv(text) = snapshot else {
            return None;
        };
        match ResultTable::from_csv(text) {
            Ok(table) => non_empty(ResultExtractor::new(*window, u32::MAX).scan_all(&table)),
            Err(e) => {
                debug!(error = %e, "csv export strategy failed");
                None
            }
        }
    }
}

fn non_empty(records: Vec<AidRecord>) -> Option<Vec<AidRecord>> {
    if records.is_empty() {
        None
    } else {
        Some(records)
    }
}

/// Strategies compiled into this build, in priority order.
pub fn default_strategies() -> Vec<Box<dyn ExtractionStrategy>> {
    strategies_with_limit(crate::settings::OLD_ROW_LIMIT)
}

/// Like [`default_strategies`], with the page strategy stopping after
/// `old_row_limit` consecutive out-of-window rows.
#[cfg_attr(not(feature = "html"), allow(unused_variables))]
pub fn strategies_with_limit(old_row_limit: u32) -> Vec<Box<dyn ExtractionStrategy>> {
    #[allow(unused_mut)]
    let mut strategies: Vec<Box<dyn ExtractionStrategy>> = Vec::new();
    #[cfg(feature = "html")]
    strategies.push(Box::new(HtmlTableStrategy {
        old_row_limit: Some(old_row_limit),
    }));
    #[cfg(feature = "csv_export")]
    strategies.push(Box::new(CsvExportStrategy));
    strategies
}

/// Strategies for a downloaded export: every format is scanned in full.
pub fn export_strategies() -> Vec<Box<dyn ExtractionStrategy>> {
    #[allow(unused_mut)]
    let mut strategies: Vec<Box<dyn ExtractionStrategy>> = Vec::new();
    #[cfg(feature = "html")]
    strategies.push(Box::new(HtmlTableStrategy::full_scan()));
    #[cfg(feature = "csv_export")]
    strategies.push(Box::new(CsvExportStrategy));
    strategies
}

/// Try each strategy in order; the first non-empty result wins.
pub fn extract_with_strategies(
    strategies: &[Box<dyn ExtractionStrategy>],
    snapshot: &RawSnapshot,
    window: &RecencyWindow,
) -> Option<(&'static str, Vec<AidRecord>)> {
    strategies.iter().find_map(|s| {
        let records = s.extract(snapshot, window)?;
        debug!(strategy = s.name(), records = records.len(), "strategy matched");
        Some((s.name(), records))
    })
}

/// Result of extracting a single saved snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotExtraction {
    pub window: RecencyWindow,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    pub company: CompanyAidResult,
}

/// Extract a saved page or export for one company.
///
/// An empty outcome is a legitimate zero result, not an error.
pub fn extract_snapshot(
    tax_id: &str,
    snapshot: &RawSnapshot,
    reference_date: NaiveDate,
    settings: &RegistrySettings,
) -> DeMinimisResult<ComputationOutput<SnapshotExtraction>> {
    let start = Instant::now();
    settings.validate()?;
    if tax_id.trim().is_empty() {
        return Err(DeMinimisError::InvalidInput {
            field: "tax_id".into(),
            reason: "Tax identifier must not be empty".into(),
        });
    }

    let mut warnings = Vec::new();
    let window = RecencyWindow::new(reference_date, settings.lookback_days);
    let strategies = strategies_with_limit(settings.old_row_limit);
    if strategies.is_empty() {
        warnings.push("No extraction strategies compiled in; enable `html` or `csv_export`.".into());
    }

    let (strategy, company) = match extract_with_strategies(&strategies, snapshot, &window) {
        Some((name, records)) => (
            Some(name.to_string()),
            CompanyAidResult::from_records(tax_id.trim(), records).with_source(snapshot.source()),
        ),
        None => {
            warnings.push("No aid records within the lookback window.".into());
            (None, CompanyAidResult::from_records(tax_id.trim(), Vec::new()))
        }
    };
    let company = company.with_pages_visited(1);

    info!(tax_id = %company.tax_id, total = %company.total, records = company.records.len(), "snapshot extracted");

    let assumptions = serde_json::json!({
        "reference_date": reference_date.to_string(),
        "cutoff": window.cutoff.to_string(),
        "lookback_days": settings.lookback_days,
        "old_row_limit": settings.old_row_limit,
    });

    Ok(with_metadata(
        "De Minimis snapshot extraction (3-year rolling window)",
        &assumptions,
        warnings,
        start.elapsed().as_micros() as u64,
        SnapshotExtraction {
            window,
            strategy,
            company,
        },
    ))
}

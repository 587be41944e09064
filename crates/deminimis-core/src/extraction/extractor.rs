use std::sync::OnceLock;

use chrono::{Duration, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::table::{ColumnMap, ResultTable};
use crate::amount::{looks_monetary, parse_amount};
use crate::settings::{LOOKBACK_DAYS, OLD_ROW_LIMIT};
use crate::types::{AidRecord, Money};

fn date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b(\d{2}/\d{2}/\d{4})\b").expect("valid date regex"))
}

/// Rolling recency window ending at `reference_date`.
///
/// The cutoff is a fixed day offset, not calendar-year arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecencyWindow {
    pub reference_date: NaiveDate,
    pub cutoff: NaiveDate,
}

impl RecencyWindow {
    pub fn new(reference_date: NaiveDate, lookback_days: i64) -> Self {
        RecencyWindow {
            reference_date,
            cutoff: reference_date - Duration::days(lookback_days),
        }
    }

    /// The De Minimis three-year window (1095 days).
    pub fn three_years(reference_date: NaiveDate) -> Self {
        Self::new(reference_date, LOOKBACK_DAYS)
    }

    /// Dates strictly before the cutoff fall outside the window.
    pub fn includes(&self, date: NaiveDate) -> bool {
        date >= self.cutoff
    }
}

/// Records pulled from one page plus the pagination verdict.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageExtraction {
    pub records: Vec<AidRecord>,
    pub should_continue: bool,
    pub rows_examined: usize,
    pub rows_skipped: usize,
}

enum RowOutcome {
    NoDate,
    Dated {
        date: NaiveDate,
        amount: Option<Money>,
        title: String,
    },
}

/// Turns result rows into [`AidRecord`]s inside a [`RecencyWindow`].
///
/// Rows are expected newest first. The extractor keeps a count of
/// consecutive rows dated before the cutoff; once it reaches the limit the
/// scan stops and no further pages should be requested. The count carries
/// over between pages of the same scan and resets on any in-window row.
#[derive(Debug, Clone)]
pub struct ResultExtractor {
    window: RecencyWindow,
    old_row_limit: u32,
    consecutive_old: u32,
}

impl ResultExtractor {
    pub fn new(window: RecencyWindow, old_row_limit: u32) -> Self {
        ResultExtractor {
            window,
            old_row_limit: old_row_limit.max(1),
            consecutive_old: 0,
        }
    }

    pub fn for_reference_date(reference_date: NaiveDate) -> Self {
        Self::new(RecencyWindow::three_years(reference_date), OLD_ROW_LIMIT)
    }

    pub fn window(&self) -> &RecencyWindow {
        &self.window
    }

    pub fn consecutive_old(&self) -> u32 {
        self.consecutive_old
    }

    /// Extract one page, applying the early-termination heuristic.
    pub fn extract_page(&mut self, table: &ResultTable) -> PageExtraction {
        let columns = table.column_map();
        let mut out = PageExtraction {
            should_continue: true,
            ..Default::default()
        };

        for row in &table.rows {
            out.rows_examined += 1;
            let (date, amount, title) = match parse_row(row, &columns) {
                RowOutcome::NoDate => {
                    out.rows_skipped += 1;
                    continue;
                }
                RowOutcome::Dated { date, amount, title } => (date, amount, title),
            };

            if !self.window.includes(date) {
                self.consecutive_old += 1;
                out.rows_skipped += 1;
                if self.consecutive_old >= self.old_row_limit {
                    debug!(
                        consecutive_old = self.consecutive_old,
                        cutoff = %self.window.cutoff,
                        "stopping scan on consecutive out-of-window rows"
                    );
                    out.should_continue = false;
                    break;
                }
                continue;
            }
            self.consecutive_old = 0;

            match amount.and_then(|a| AidRecord::new(date, a, title)) {
                Some(record) => out.records.push(record),
                None => {
                    debug!(date = %date, "row has no parseable amount; skipped");
                    out.rows_skipped += 1;
                }
            }
        }

        out
    }

    /// Scan every row with the same window and parsing rules but without
    /// early termination. Used for bulk exports.
    pub fn scan_all(&self, table: &ResultTable) -> Vec<AidRecord> {
        let columns = table.column_map();
        table
            .rows
            .iter()
            .filter_map(|row| match parse_row(row, &columns) {
                RowOutcome::Dated { date, amount, title } if self.window.includes(date) => {
                    amount.and_then(|a| AidRecord::new(date, a, title))
                }
                _ => None,
            })
            .collect()
    }
}

/// Extract a single page with a fresh three-year window.
///
/// Returns the in-window records and whether pagination should proceed.
pub fn extract(table: &ResultTable, reference_date: NaiveDate) -> (Vec<AidRecord>, bool) {
    let page = ResultExtractor::for_reference_date(reference_date).extract_page(table);
    (page.records, page.should_continue)
}

fn parse_row(row: &[String], columns: &ColumnMap) -> RowOutcome {
    let Some(date) = find_date(row, columns) else {
        return RowOutcome::NoDate;
    };

    let amount = columns
        .amount
        .resolve(row.len())
        .and_then(|i| parse_amount(&row[i]))
        .or_else(|| {
            row.iter()
                .filter(|cell| looks_monetary(cell))
                .find_map(|cell| parse_amount(cell))
        });

    let title = columns
        .title
        .and_then(|c| c.resolve(row.len()))
        .map(|i| row[i].trim().to_string())
        .unwrap_or_default();

    RowOutcome::Dated { date, amount, title }
}

/// First `DD/MM/YYYY` substring, looking at the date column before the
/// rest of the row. A match that is not a real calendar date voids the row.
fn find_date(row: &[String], columns: &ColumnMap) -> Option<NaiveDate> {
    let preferred = columns.date.resolve(row.len()).map(|i| row[i].as_str());
    let text = preferred
        .into_iter()
        .chain(row.iter().map(String::as_str))
        .find_map(|cell| date_pattern().captures(cell))?;
    NaiveDate::parse_from_str(&text[1], "%d/%m/%Y").ok()
}

//! Raw result tables and column discovery.
//!
//! A [`ResultTable`] is a snapshot of the registry's results grid (or of its
//! tabular export) as plain cell text. Which column holds what is decided by
//! [`ColumnMap`], either supplied explicitly or discovered from header text.

use serde::{Deserialize, Serialize};

#[cfg(any(feature = "html", feature = "csv_export"))]
use crate::DeMinimisResult;

/// Index used for the grant date when no header identifies it.
const FALLBACK_DATE_COLUMN: usize = 6;

/// Index used for the measure title when no header identifies it.
const FALLBACK_TITLE_COLUMN: usize = 2;

/// Column reference that may depend on the row width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    At(usize),
    Last,
}

impl Column {
    pub fn resolve(self, row_len: usize) -> Option<usize> {
        match self {
            Column::At(i) if i < row_len => Some(i),
            Column::At(_) => None,
            Column::Last => row_len.checked_sub(1),
        }
    }
}

/// Which cells of a row carry the date, the amount and the measure title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMap {
    pub date: Column,
    pub amount: Column,
    pub title: Option<Column>,
}

impl ColumnMap {
    pub fn explicit(date: usize, amount: usize, title: Option<usize>) -> Self {
        ColumnMap {
            date: Column::At(date),
            amount: Column::At(amount),
            title: title.map(Column::At),
        }
    }

    /// Discover columns from header text.
    ///
    /// Amount: header with "elemento" and "aiuto", else one with "importo",
    /// else the last column. Date: header with "data" and "concessione", else
    /// index 6. Title: header with "titolo" and ("misura" or "progetto"),
    /// else index 2 when the table is wide enough.
    pub fn discover(headers: Option<&[String]>, width: usize) -> Self {
        let headers: Vec<String> = headers
            .unwrap_or_default()
            .iter()
            .map(|h| h.trim().to_lowercase())
            .collect();
        let amount = position(&headers, |h| h.contains("elemento") && h.contains("aiuto"))
            .or_else(|| position(&headers, |h| h.contains("importo")))
            .map(Column::At)
            .unwrap_or(Column::Last);

        let date = position(&headers, |h| h.contains("data") && h.contains("concessione"))
            .map(Column::At)
            .unwrap_or(Column::At(FALLBACK_DATE_COLUMN));

        let wide = headers.len().max(width) > FALLBACK_TITLE_COLUMN;
        let title = position(&headers, |h| {
            h.contains("titolo") && (h.contains("misura") || h.contains("progetto"))
        })
            .map(Column::At)
            .or(if wide {
                Some(Column::At(FALLBACK_TITLE_COLUMN))
            } else {
                None
            });

        ColumnMap { date, amount, title }
    }
}

fn position(headers: &[String], pred: impl Fn(&str) -> bool) -> Option<usize> {
    headers.iter().position(|h| pred(h.as_str()))
}

/// Plain-text snapshot of a results grid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultTable {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<String>>,
    pub rows: Vec<Vec<String>>,
    /// Explicit mapping; when absent, columns are discovered from headers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<ColumnMap>,
}

impl ResultTable {
    pub fn new(headers: Option<Vec<String>>, rows: Vec<Vec<String>>) -> Self {
        ResultTable {
            headers,
            rows,
            columns: None,
        }
    }

    /// Rows already mapped to `(date_text, amount_text, title_text)`.
    pub fn from_triples<I, S>(triples: I) -> Self
    where
        I: IntoIterator<Item = (S, S, S)>,
        S: Into<String>,
    {
        let rows = triples
            .into_iter()
            .map(|(d, a, t)| vec![d.into(), a.into(), t.into()])
            .collect();
        ResultTable {
            headers: None,
            rows,
            columns: Some(ColumnMap::explicit(0, 1, Some(2))),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn column_map(&self) -> ColumnMap {
        self.columns
            .unwrap_or_else(|| ColumnMap::discover(self.headers.as_deref(), self.width()))
    }

    /// Parse the results grid out of a rendered page.
    ///
    /// Prefers the `#trasparenzaAiuti` table and falls back to the first
    /// `<table>`. Returns `Ok(None)` when the page has no table at all.
    #[cfg(feature = "html")]
    pub fn from_html(html: &str) -> DeMinimisResult<Option<Self>> {
        use scraper::{ElementRef, Html};

        let document = Html::parse_document(html);
        let by_id = selector("table#trasparenzaAiuti")?;
        let any_table = selector("table")?;
        let tr = selector("tr")?;
        let cell = selector("th, td")?;

        let table = match document
            .select(&by_id)
            .next()
            .or_else(|| document.select(&any_table).next())
        {
            Some(t) => t,
            None => return Ok(None),
        };

        let in_thead = |row: &ElementRef| {
            row.ancestors()
                .filter_map(|n| n.value().as_element())
                .any(|e| e.name() == "thead")
        };

        let mut headers: Option<Vec<String>> = None;
        let mut rows = Vec::new();

        for (i, row) in table.select(&tr).enumerate() {
            let cells: Vec<ElementRef> = row.select(&cell).collect();
            if cells.is_empty() {
                continue;
            }
            let header_like = cells.iter().all(|c| c.value().name() == "th");
            let texts: Vec<String> = cells.iter().map(|c| normalize_ws(&c.text().collect::<String>())).collect();

            if headers.is_none() && (in_thead(&row) || (i == 0 && header_like)) {
                headers = Some(texts);
            } else if !in_thead(&row) {
                rows.push(texts);
            }
        }

        tracing::debug!(rows = rows.len(), has_headers = headers.is_some(), "parsed html results table");
        Ok(Some(ResultTable::new(headers, rows)))
    }

    /// Parse a tabular export. The delimiter (`;` or `,`) is detected from
    /// the header line; the first record is always the header.
    #[cfg(feature = "csv_export")]
    pub fn from_csv(text: &str) -> DeMinimisResult<Self> {
        let text = text.trim_start_matches('\u{feff}');
        let first_line = text.lines().next().unwrap_or_default();
        if first_line.trim().is_empty() {
            return Ok(ResultTable::default());
        }
        let delimiter = if first_line.matches(';').count() > first_line.matches(',').count() {
            b';'
        } else {
            b','
        };

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes());

        let mut records = reader.records();
        let headers: Vec<String> = match records.next() {
            Some(rec) => rec?
                .iter()
                .map(|h| h.trim().trim_matches('"').trim().to_string())
                .collect(),
            None => return Ok(ResultTable::default()),
        };

        let mut rows = Vec::new();
        for rec in records {
            let rec = rec?;
            if rec.iter().all(|c| c.trim().is_empty()) {
                continue;
            }
            rows.push(rec.iter().map(|c| c.trim().to_string()).collect());
        }

        tracing::debug!(rows = rows.len(), delimiter = %(delimiter as char), "parsed csv export");
        Ok(ResultTable::new(Some(headers), rows))
    }
}

#[cfg(feature = "html")]
fn selector(css: &str) -> DeMinimisResult<scraper::Selector> {
    scraper::Selector::parse(css)
        .map_err(|e| crate::DeMinimisError::Parse(format!("invalid selector '{css}': {e}")))
}

#[cfg(feature = "html")]
fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

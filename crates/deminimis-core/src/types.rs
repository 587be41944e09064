use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Percentages expressed on a 0–100 scale (72.5 = 72.5%).
pub type Percent = Decimal;

/// Round a monetary amount to cents, half away from zero.
pub fn round_money(value: Money) -> Money {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// One grant line from the national aid registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AidRecord {
    pub grant_date: NaiveDate,
    pub amount: Money,
    /// Measure or project title; empty when the source did not expose one.
    #[serde(default)]
    pub measure_title: String,
}

impl AidRecord {
    /// Build a record, rejecting non-positive amounts.
    pub fn new(grant_date: NaiveDate, amount: Money, measure_title: impl Into<String>) -> Option<Self> {
        if amount <= Decimal::ZERO {
            return None;
        }
        Some(AidRecord {
            grant_date,
            amount: round_money(amount),
            measure_title: measure_title.into(),
        })
    }
}

/// Where the records of a company result came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    /// Paginated results table.
    Table,
    /// Bulk tabular export, used when the table yielded nothing.
    Export,
    #[default]
    None,
}

/// De Minimis total for a single tax identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyAidResult {
    pub tax_id: String,
    #[serde(default)]
    pub records: Vec<AidRecord>,
    #[serde(default)]
    pub total: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub pages_visited: u32,
    #[serde(default)]
    pub source: ResultSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub searched_at: Option<DateTime<Utc>>,
}

impl CompanyAidResult {
    /// Successful result; the total is always derived from the records.
    pub fn from_records(tax_id: impl Into<String>, records: Vec<AidRecord>) -> Self {
        let total = round_money(records.iter().map(|r| r.amount).sum());
        let source = if records.is_empty() {
            ResultSource::None
        } else {
            ResultSource::Table
        };
        CompanyAidResult {
            tax_id: tax_id.into(),
            records,
            total,
            error: None,
            pages_visited: 0,
            source,
            searched_at: None,
        }
    }

    /// Failed result: no records, zero total, error annotation.
    pub fn failed(tax_id: impl Into<String>, message: impl Into<String>) -> Self {
        CompanyAidResult {
            tax_id: tax_id.into(),
            records: Vec::new(),
            total: Decimal::ZERO,
            error: Some(message.into()),
            pages_visited: 0,
            source: ResultSource::None,
            searched_at: None,
        }
    }

    pub fn with_source(mut self, source: ResultSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_pages_visited(mut self, pages: u32) -> Self {
        self.pages_visited = pages;
        self
    }

    pub fn searched_at(mut self, at: DateTime<Utc>) -> Self {
        self.searched_at = Some(at);
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Re-derive `total` from `records` and drop records from error
    /// results. Used on results deserialized from outside the crate.
    pub fn normalized(mut self) -> Self {
        if self.error.is_some() {
            self.records.clear();
            self.total = Decimal::ZERO;
        } else {
            self.records.retain(|r| r.amount > Decimal::ZERO);
            self.total = round_money(self.records.iter().map(|r| r.amount).sum());
        }
        self
    }
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}

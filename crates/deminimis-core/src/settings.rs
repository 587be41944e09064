use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::DeMinimisError;
use crate::types::{Money, Percent};
use crate::DeMinimisResult;

/// EU De Minimis ceiling per single undertaking over the rolling period.
pub const DE_MINIMIS_CEILING: Money = dec!(300000.00);

/// Rolling window, as a fixed day count (3 × 365, no leap-year adjustment).
pub const LOOKBACK_DAYS: i64 = 3 * 365;

/// Window submitted to the registry search form; results are filtered
/// locally down to [`LOOKBACK_DAYS`].
pub const SEARCH_WINDOW_DAYS: i64 = 6 * 365;

/// Circuit breaker against endless pagination.
pub const DEFAULT_MAX_PAGES: u32 = 10;

/// Consecutive out-of-window rows that end a paginated scan.
pub const OLD_ROW_LIMIT: u32 = 3;

pub const REGISTRY_URL: &str = "https://www.rna.gov.it/trasparenza/aiuti";

/// Utilization levels (0–100) at which the group status escalates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusThresholds {
    pub yellow: Percent,
    pub red: Percent,
}

impl Default for StatusThresholds {
    fn default() -> Self {
        StatusThresholds {
            yellow: dec!(70),
            red: dec!(90),
        }
    }
}

/// Runtime knobs for extraction, pagination and aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySettings {
    pub ceiling: Money,
    pub lookback_days: i64,
    pub search_window_days: i64,
    pub max_pages: u32,
    pub old_row_limit: u32,
    pub navigation_timeout_secs: u64,
    pub page_wait_timeout_secs: u64,
    pub registry_url: String,
    pub thresholds: StatusThresholds,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        RegistrySettings {
            ceiling: DE_MINIMIS_CEILING,
            lookback_days: LOOKBACK_DAYS,
            search_window_days: SEARCH_WINDOW_DAYS,
            max_pages: DEFAULT_MAX_PAGES,
            old_row_limit: OLD_ROW_LIMIT,
            navigation_timeout_secs: 60,
            page_wait_timeout_secs: 30,
            registry_url: REGISTRY_URL.to_string(),
            thresholds: StatusThresholds::default(),
        }
    }
}

impl RegistrySettings {
    /// Parse settings from JSON; missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> DeMinimisResult<Self> {
        let settings: RegistrySettings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> DeMinimisResult<()> {
        if self.ceiling <= Decimal::ZERO {
            return Err(invalid("ceiling", "Ceiling must be positive"));
        }
        if self.lookback_days <= 0 {
            return Err(invalid("lookback_days", "Lookback window must be at least one day"));
        }
        if self.search_window_days < self.lookback_days {
            return Err(invalid(
                "search_window_days",
                "Search window must cover the lookback window",
            ));
        }
        if self.max_pages == 0 {
            return Err(invalid("max_pages", "At least one page must be visited"));
        }
        if self.old_row_limit == 0 {
            return Err(invalid("old_row_limit", "Old-row limit must be at least 1"));
        }
        if self.navigation_timeout_secs == 0 || self.page_wait_timeout_secs == 0 {
            return Err(invalid("timeouts", "Timeouts must be explicit and non-zero"));
        }
        if self.thresholds.yellow >= self.thresholds.red {
            return Err(invalid("thresholds", "Yellow threshold must be below red"));
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> DeMinimisError {
    DeMinimisError::InvalidInput {
        field: field.into(),
        reason: reason.into(),
    }
}

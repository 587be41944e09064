//! Italian-formatted currency parsing.
//!
//! Registry cells carry amounts like `€ 1.234,56` or `1.234,56 €`: `.` groups
//! thousands and `,` marks the decimals.

use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::Decimal;

use crate::types::{round_money, Money};

fn amount_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // The leading sign is captured only so negatives can be rejected.
    PATTERN.get_or_init(|| Regex::new(r"-?\d+(?:\.\d{3})*(?:,\d{2})?").expect("valid amount regex"))
}

/// Parse the first localized monetary value found in `text`.
///
/// Returns `None` for text with no number, for zero and for negative values.
pub fn parse_amount(text: &str) -> Option<Money> {
    let m = amount_pattern().find(text)?;
    let canonical = m.as_str().replace('.', "").replace(',', ".");
    let value = Decimal::from_str(&canonical).ok()?;
    if value > Decimal::ZERO {
        Some(round_money(value))
    } else {
        None
    }
}

/// True when a cell looks like it may hold money: a currency sign or a
/// decimal comma. Used to pick fallback cells in a row.
pub fn looks_monetary(text: &str) -> bool {
    text.contains('€') || text.contains(',')
}

/// Format a value the Italian way (`1.234,56`), for human-facing output.
pub fn format_amount_it(value: Money) -> String {
    let rounded = round_money(value);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let text = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    if negative {
        format!("-{grouped},{frac_part}")
    } else {
        format!("{grouped},{frac_part}")
    }
}

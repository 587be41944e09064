//! EU SME size classification (Recommendation 2003/361/EC).
//!
//! Linked enterprises (control above 50%) are added in full; partner
//! enterprises (25% to 50%) are added pro-rata to the held stake.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::DeMinimisError;
use crate::types::{round_money, with_metadata, ComputationOutput, Money, Percent};
use crate::DeMinimisResult;

// ---------------------------------------------------------------------------
// Input / Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedEnterprise {
    #[serde(default)]
    pub name: String,
    pub headcount: Decimal,
    pub turnover: Money,
    pub balance_sheet_total: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartnerEnterprise {
    #[serde(default)]
    pub name: String,
    pub headcount: Decimal,
    pub turnover: Money,
    pub balance_sheet_total: Money,
    /// Stake held, 25 to 50 inclusive.
    pub percentage: Percent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmeInput {
    /// Annual work units of the enterprise itself.
    pub headcount: Decimal,
    pub turnover: Money,
    pub balance_sheet_total: Money,
    #[serde(default)]
    pub linked: Vec<LinkedEnterprise>,
    #[serde(default)]
    pub partners: Vec<PartnerEnterprise>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnterpriseSize {
    Micro,
    Small,
    Medium,
    Large,
}

impl EnterpriseSize {
    pub fn is_sme(&self) -> bool {
        !matches!(self, EnterpriseSize::Large)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmeOutput {
    pub size: EnterpriseSize,
    pub is_sme: bool,
    pub headcount: Decimal,
    pub turnover: Money,
    pub balance_sheet_total: Money,
    pub linked_count: usize,
    pub partner_count: usize,
}

struct Tier {
    size: EnterpriseSize,
    headcount_below: Decimal,
    turnover_max: Money,
    balance_max: Money,
}

const TIERS: [Tier; 3] = [
    Tier {
        size: EnterpriseSize::Micro,
        headcount_below: dec!(10),
        turnover_max: dec!(2000000),
        balance_max: dec!(2000000),
    },
    Tier {
        size: EnterpriseSize::Small,
        headcount_below: dec!(50),
        turnover_max: dec!(10000000),
        balance_max: dec!(10000000),
    },
    Tier {
        size: EnterpriseSize::Medium,
        headcount_below: dec!(250),
        turnover_max: dec!(50000000),
        balance_max: dec!(43000000),
    },
];

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

pub fn classify_enterprise(input: &SmeInput) -> DeMinimisResult<ComputationOutput<SmeOutput>> {
    let start = Instant::now();
    validate(input)?;

    let mut warnings = Vec::new();
    let mut headcount = input.headcount;
    let mut turnover = input.turnover;
    let mut balance = input.balance_sheet_total;

    for l in &input.linked {
        headcount += l.headcount;
        turnover += l.turnover;
        balance += l.balance_sheet_total;
    }
    for p in &input.partners {
        let share = p.percentage / dec!(100);
        headcount += p.headcount * share;
        turnover += p.turnover * share;
        balance += p.balance_sheet_total * share;
    }

    let headcount = headcount.round_dp(1);
    let turnover = round_money(turnover);
    let balance = round_money(balance);
    let size = size_for(headcount, turnover, balance);

    if !input.linked.is_empty() || !input.partners.is_empty() {
        warnings.push(
            "Group figures must come from the same reference year as the enterprise's own accounts.".into(),
        );
    }

    let output = SmeOutput {
        size,
        is_sme: size.is_sme(),
        headcount,
        turnover,
        balance_sheet_total: balance,
        linked_count: input.linked.len(),
        partner_count: input.partners.len(),
    };

    let assumptions = serde_json::json!({
        "linked_weight": "100%",
        "partner_weight": "pro-rata to stake",
        "financial_test": "turnover OR balance sheet total within tier ceiling",
    });

    Ok(with_metadata(
        "EU SME definition (Recommendation 2003/361/EC)",
        &assumptions,
        warnings,
        start.elapsed().as_micros() as u64,
        output,
    ))
}

/// First tier whose headcount and either financial limit both hold.
fn size_for(headcount: Decimal, turnover: Money, balance: Money) -> EnterpriseSize {
    TIERS
        .iter()
        .find(|t| {
            headcount < t.headcount_below && (turnover <= t.turnover_max || balance <= t.balance_max)
        })
        .map(|t| t.size)
        .unwrap_or(EnterpriseSize::Large)
}

fn validate(input: &SmeInput) -> DeMinimisResult<()> {
    non_negative("headcount", input.headcount)?;
    non_negative("turnover", input.turnover)?;
    non_negative("balance_sheet_total", input.balance_sheet_total)?;
    for (i, l) in input.linked.iter().enumerate() {
        non_negative(&format!("linked[{i}].headcount"), l.headcount)?;
        non_negative(&format!("linked[{i}].turnover"), l.turnover)?;
        non_negative(&format!("linked[{i}].balance_sheet_total"), l.balance_sheet_total)?;
    }
    for (i, p) in input.partners.iter().enumerate() {
        non_negative(&format!("partners[{i}].headcount"), p.headcount)?;
        non_negative(&format!("partners[{i}].turnover"), p.turnover)?;
        non_negative(&format!("partners[{i}].balance_sheet_total"), p.balance_sheet_total)?;
        if p.percentage < dec!(25) || p.percentage > dec!(50) {
            return Err(DeMinimisError::InvalidInput {
                field: format!("partners[{i}].percentage"),
                reason: "Partner stake must be between 25 and 50 percent".into(),
            });
        }
    }
    Ok(())
}

fn non_negative(field: &str, value: Decimal) -> DeMinimisResult<()> {
    if value < Decimal::ZERO {
        return Err(DeMinimisError::InvalidInput {
            field: field.to_string(),
            reason: "Must not be negative".into(),
        });
    }
    Ok(())
}

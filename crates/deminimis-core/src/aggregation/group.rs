use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::status::{utilization_pct, AidStatus};
use crate::collaborators::AssociateFinder;
use crate::settings::{RegistrySettings, StatusThresholds};
use crate::types::{round_money, CompanyAidResult, Money, Percent};
use crate::DeMinimisResult;

/// A company controlled by the principal above the majority threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Associate {
    pub tax_id: String,
    pub display_name: String,
    pub control_percentage: Percent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Principal,
    Associate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Methodology {
    /// Principal plus its associates.
    Aggregate,
    /// Principal only: no associates, or the lookup failed.
    Single,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    pub result: CompanyAidResult,
    pub role: MemberRole,
    pub display_name: String,
    pub control_percentage: Percent,
}

impl GroupMember {
    pub fn is_error(&self) -> bool {
        self.result.is_error()
    }
}

/// De Minimis position of a company group against the ceiling.
///
/// The summary fields (`total_amount` through `aid_count`) are derived from
/// `member_results` by [`GroupAggregateResult::summarize`] and never set on
/// their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupAggregateResult {
    pub principal_id: String,
    pub methodology: Methodology,
    pub member_results: Vec<GroupMember>,
    #[serde(default)]
    pub associates_found: Vec<Associate>,
    pub total_amount: Money,
    pub ceiling: Money,
    pub utilization_pct: Percent,
    pub status: AidStatus,
    pub remaining_margin: Money,
    pub ceiling_exceeded: bool,
    pub member_count: usize,
    pub aid_count: usize,
    #[serde(default)]
    pub thresholds: StatusThresholds,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub associate_lookup_error: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    pub computed_at: DateTime<Utc>,
}

impl GroupAggregateResult {
    fn empty(principal_id: &str, ceiling: Money, thresholds: StatusThresholds) -> Self {
        GroupAggregateResult {
            principal_id: principal_id.to_string(),
            methodology: Methodology::Single,
            member_results: Vec::new(),
            associates_found: Vec::new(),
            total_amount: Decimal::ZERO,
            ceiling,
            utilization_pct: Decimal::ZERO,
            status: AidStatus::Green,
            remaining_margin: ceiling,
            ceiling_exceeded: false,
            member_count: 0,
            aid_count: 0,
            thresholds,
            associate_lookup_error: None,
            warnings: Vec::new(),
            computed_at: Utc::now(),
        }
    }

    /// Recompute every derived field from the member results.
    pub fn summarize(&mut self) {
        let (total, aid_count) = self
            .member_results
            .iter()
            .filter(|m| !m.is_error())
            .fold((Decimal::ZERO, 0usize), |(sum, n), m| {
                (sum + m.result.total, n + m.result.records.len())
            });
        self.total_amount = round_money(total);
        self.aid_count = aid_count;
        self.member_count = self.member_results.len();
        self.utilization_pct = utilization_pct(self.total_amount, self.ceiling);
        self.status = AidStatus::classify(self.utilization_pct, &self.thresholds);
        self.remaining_margin = (self.ceiling - self.total_amount).max(Decimal::ZERO);
        self.ceiling_exceeded = self.total_amount > self.ceiling;
    }

    pub fn failed_members(&self) -> impl Iterator<Item = &GroupMember> {
        self.member_results.iter().filter(|m| m.is_error())
    }
}

/// Fans the per-company calculation out over a group, one company at a time.
#[derive(Debug, Clone, Default)]
pub struct GroupAggregator {
    settings: RegistrySettings,
    principal_name: Option<String>,
}

impl GroupAggregator {
    pub fn new(settings: RegistrySettings) -> Self {
        GroupAggregator {
            settings,
            principal_name: None,
        }
    }

    /// Display name for the principal member. Defaults to "Principal company".
    pub fn with_principal_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !name.trim().is_empty() {
            self.principal_name = Some(name.trim().to_string());
        }
        self
    }

    pub fn settings(&self) -> &RegistrySettings {
        &self.settings
    }

    /// Aggregate the principal and the given associates.
    ///
    /// An empty list degrades to single-company mode. Member failures are
    /// kept in `member_results`, contribute nothing to the total, and add a
    /// group warning.
    pub fn aggregate<F>(&self, principal_id: &str, associates: &[Associate], per_company: F) -> GroupAggregateResult
    where
        F: FnMut(&str) -> CompanyAidResult,
    {
        self.aggregate_lookup(principal_id, Ok(associates.to_vec()), per_company)
    }

    /// Ask `finder` for the group, then aggregate. A lookup failure falls
    /// back to the principal alone and is recorded, not raised.
    pub fn aggregate_with_finder<A, F>(&self, principal_id: &str, finder: &mut A, per_company: F) -> GroupAggregateResult
    where
        A: AssociateFinder + ?Sized,
        F: FnMut(&str) -> CompanyAidResult,
    {
        let lookup = finder.find_associates(principal_id.trim());
        self.aggregate_lookup(principal_id, lookup, per_company)
    }

    pub fn aggregate_lookup<F>(
        &self,
        principal_id: &str,
        lookup: DeMinimisResult<Vec<Associate>>,
        mut per_company: F,
    ) -> GroupAggregateResult
    where
        F: FnMut(&str) -> CompanyAidResult,
    {
        let principal_id = principal_id.trim();
        let mut group = GroupAggregateResult::empty(
            principal_id,
            self.settings.ceiling,
            self.settings.thresholds.clone(),
        );

        let associates = match lookup {
            Ok(list) => list,
            Err(e) => {
                warn!(principal = principal_id, error = %e, "associate lookup failed; principal only");
                group.associate_lookup_error = Some(e.to_string());
                group
                    .warnings
                    .push("Associate lookup failed - calculating the principal company only".into());
                Vec::new()
            }
        };
        group.associates_found = associates.clone();

        let principal_name = self
            .principal_name
            .clone()
            .unwrap_or_else(|| "Principal company".into());
        let mut members: Vec<(String, MemberRole, String, Percent)> =
            vec![(principal_id.to_string(), MemberRole::Principal, principal_name, dec!(100))];
        let mut seen: HashSet<String> = HashSet::from([principal_id.to_string()]);
        for a in associates {
            let id = a.tax_id.trim().to_string();
            if !seen.insert(id.clone()) {
                group
                    .warnings
                    .push(format!("Duplicate associate {id} ignored"));
                continue;
            }
            members.push((id, MemberRole::Associate, a.display_name, a.control_percentage));
        }

        group.methodology = if members.len() > 1 {
            Methodology::Aggregate
        } else {
            Methodology::Single
        };

        let count = members.len();
        for (i, (tax_id, role, display_name, control_percentage)) in members.into_iter().enumerate() {
            info!(tax_id = %tax_id, position = i + 1, of = count, "calculating company");
            let result = per_company(&tax_id);
            match &result.error {
                Some(err) => {
                    warn!(tax_id = %tax_id, error = %err, "company calculation failed");
                    group.warnings.push(format!("Calculation failed for {tax_id}: {err}"));
                }
                None => info!(tax_id = %tax_id, total = %result.total, aids = result.records.len(), "company calculated"),
            }
            group.member_results.push(GroupMember {
                result,
                role,
                display_name,
                control_percentage,
            });
        }

        group.summarize();
        info!(
            principal = principal_id,
            total = %group.total_amount,
            utilization = %group.utilization_pct,
            status = group.status.as_str(),
            "group aggregated"
        );
        group
    }

    /// Aggregate per-company results computed elsewhere, keyed by tax id.
    /// A member with no supplied result becomes a member error; a supplied
    /// one is re-keyed to the member and has its total re-derived.
    pub fn aggregate_supplied(
        &self,
        principal_id: &str,
        lookup: DeMinimisResult<Vec<Associate>>,
        mut results: HashMap<String, CompanyAidResult>,
    ) -> GroupAggregateResult {
        self.aggregate_lookup(principal_id, lookup, |id| match results.remove(id) {
            Some(r) => CompanyAidResult {
                tax_id: id.to_string(),
                ..r
            }
            .normalized(),
            None => CompanyAidResult::failed(id, "No calculation result supplied"),
        })
    }
}

/// Aggregate with default settings (300 000 ceiling, 70/90 thresholds).
pub fn aggregate<F>(principal_id: &str, associate_list: &[Associate], per_company_fn: F) -> GroupAggregateResult
where
    F: FnMut(&str) -> CompanyAidResult,
{
    GroupAggregator::default().aggregate(principal_id, associate_list, per_company_fn)
}

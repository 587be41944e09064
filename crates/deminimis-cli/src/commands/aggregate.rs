use clap::Args;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Instant;

use deminimis_core::aggregation::{Associate, GroupAggregator, Methodology};
use deminimis_core::store::{JsonFileStore, ResultStore, StoredEntry};
use deminimis_core::types::{with_metadata, CompanyAidResult};
use deminimis_core::DeMinimisError;

use crate::commands::load_settings;
use crate::input;

/// Per-company results gathered elsewhere, plus the group membership.
#[derive(Debug, Deserialize)]
pub struct AggregateInput {
    pub principal_id: String,
    #[serde(default)]
    pub principal_name: Option<String>,
    #[serde(default)]
    pub associates: Vec<Associate>,
    /// Set when the associate lookup failed; `associates` is then ignored.
    #[serde(default)]
    pub associate_error: Option<String>,
    #[serde(default)]
    pub results: HashMap<String, CompanyAidResult>,
}

/// Arguments for group aggregation
#[derive(Args)]
pub struct AggregateArgs {
    /// Path to JSON input file (stdin when omitted)
    #[arg(long)]
    pub input: Option<String>,

    /// Save the group result into this JSON results file
    #[arg(long)]
    pub store: Option<String>,

    /// Free-text note saved alongside the result
    #[arg(long, requires = "store")]
    pub note: Option<String>,

    /// Override the ceiling from the settings (EUR)
    #[arg(long)]
    pub ceiling: Option<Decimal>,
}

pub fn run_aggregate(args: AggregateArgs, config: Option<&str>) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let mut settings = load_settings(config)?;
    if let Some(ceiling) = args.ceiling {
        settings.ceiling = ceiling;
        settings.validate()?;
    }

    let agg_input: AggregateInput = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input <file.json> or stdin required for aggregation".into());
    };

    let lookup = match agg_input.associate_error {
        Some(msg) => Err(DeMinimisError::AssociateLookup(msg)),
        None => Ok(agg_input.associates),
    };
    let mut aggregator = GroupAggregator::new(settings.clone());
    if let Some(name) = agg_input.principal_name {
        aggregator = aggregator.with_principal_name(name);
    }
    let group = aggregator.aggregate_supplied(&agg_input.principal_id, lookup, agg_input.results);

    if let Some(ref path) = args.store {
        let mut entry = StoredEntry::new(group.clone());
        if let Some(note) = args.note {
            entry = entry.with_note(note);
        }
        JsonFileStore::new(path).save(entry)?;
        tracing::info!(path = %path, principal = %group.principal_id, "group result saved");
    }

    let assumptions = serde_json::json!({
        "ceiling": settings.ceiling,
        "thresholds": settings.thresholds,
        "lookback_days": settings.lookback_days,
    });
    let methodology = format!("De Minimis group aggregation ({})", methodology_label(&group.methodology));
    let warnings = group.warnings.clone();
    let output = with_metadata(
        &methodology,
        &assumptions,
        warnings,
        start.elapsed().as_micros() as u64,
        group,
    );
    Ok(serde_json::to_value(output)?)
}

fn methodology_label(m: &Methodology) -> &'static str {
    match m {
        Methodology::Aggregate => "principal and associates",
        Methodology::Single => "principal only",
    }
}

use clap::{Args, Subcommand};
use serde_json::{json, Value};

use deminimis_core::store::{JsonFileStore, ResultStore};

/// Arguments for results-file maintenance
#[derive(Args)]
pub struct StoreArgs {
    /// Results file written by `aggregate --store`
    #[arg(long)]
    pub path: String,

    #[command(subcommand)]
    pub action: StoreAction,
}

#[derive(Subcommand)]
pub enum StoreAction {
    /// List saved principals with their totals
    List,
    /// Show one saved group result
    Show { key: String },
    /// Delete one saved group result
    Remove { key: String },
}

pub fn run_store(args: StoreArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut store = JsonFileStore::new(&args.path);
    match args.action {
        StoreAction::List => {
            let mut rows = Vec::new();
            for key in store.keys()? {
                if let Some(entry) = store.load(&key)? {
                    rows.push(json!({
                        "principal_id": key,
                        "total_amount": entry.result.total_amount,
                        "status": entry.result.status,
                        "methodology": entry.result.methodology,
                        "saved_at": entry.saved_at,
                    }));
                }
            }
            Ok(Value::Array(rows))
        }
        StoreAction::Show { key } => match store.load(&key)? {
            Some(entry) => Ok(serde_json::to_value(entry)?),
            None => Err(format!("No saved result for '{key}'").into()),
        },
        StoreAction::Remove { key } => {
            let removed = store.remove(&key)?;
            Ok(json!({ "key": key, "removed": removed }))
        }
    }
}

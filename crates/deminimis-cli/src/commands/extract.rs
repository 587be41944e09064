use chrono::{NaiveDate, Utc};
use clap::{Args, ValueEnum};
use serde_json::Value;
use std::path::Path;

use deminimis_core::extraction::{extract_snapshot, RawSnapshot};

use crate::commands::load_settings;
use crate::input;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SnapshotFormat {
    /// Guess from the content
    Auto,
    Html,
    Csv,
}

/// Arguments for snapshot extraction
#[derive(Args)]
pub struct ExtractArgs {
    /// Saved results page (.html) or export (.csv); stdin when omitted
    #[arg(long)]
    pub input: Option<String>,

    /// Snapshot format
    #[arg(long, default_value = "auto")]
    pub format: SnapshotFormat,

    /// Reference date for the three-year window (YYYY-MM-DD); defaults to today
    #[arg(long)]
    pub reference_date: Option<NaiveDate>,

    /// Tax id to report; defaults to the input file name
    #[arg(long)]
    pub tax_id: Option<String>,
}

pub fn run_extract(args: ExtractArgs, config: Option<&str>) -> Result<Value, Box<dyn std::error::Error>> {
    let settings = load_settings(config)?;

    let text = if let Some(ref path) = args.input {
        input::file::read_text(path)?
    } else if let Some(text) = input::stdin::read_stdin_text()? {
        text
    } else {
        return Err("--input <page.html|export.csv> or stdin required for extraction".into());
    };

    let snapshot = match args.format {
        SnapshotFormat::Auto => RawSnapshot::detect(text),
        SnapshotFormat::Html => RawSnapshot::Html(text),
        SnapshotFormat::Csv => RawSnapshot::Csv(text),
    };

    let tax_id = args
        .tax_id
        .or_else(|| {
            args.input.as_deref().and_then(|p| {
                Path::new(p)
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
            })
        })
        .ok_or("--tax-id is required when reading from stdin")?;

    let reference_date = args.reference_date.unwrap_or_else(|| Utc::now().date_naive());
    let result = extract_snapshot(&tax_id, &snapshot, reference_date, &settings)?;
    Ok(serde_json::to_value(result)?)
}

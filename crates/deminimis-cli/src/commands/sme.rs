use clap::Args;
use serde_json::Value;

use deminimis_core::sme::{self, SmeInput};

use crate::input;

/// Arguments for SME classification
#[derive(Args)]
pub struct SmeArgs {
    /// Path to JSON input file (stdin when omitted)
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_sme(args: SmeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let sme_input: SmeInput = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input <file.json> or stdin required for SME classification".into());
    };
    let result = sme::classify_enterprise(&sme_input)?;
    Ok(serde_json::to_value(result)?)
}

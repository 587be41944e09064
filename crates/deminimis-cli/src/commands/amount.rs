use clap::Args;
use serde_json::{json, Value};

use deminimis_core::amount::{format_amount_it, parse_amount};

/// Arguments for amount parsing
#[derive(Args)]
pub struct ParseAmountArgs {
    /// Text containing an amount, e.g. "€ 1.234,56"
    #[arg(allow_hyphen_values = true)]
    pub text: String,
}

pub fn run_parse_amount(args: ParseAmountArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let amount = parse_amount(&args.text);
    Ok(json!({
        "text": args.text,
        "amount": amount,
        "formatted": amount.map(format_amount_it),
    }))
}

pub mod csv_out;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::Value;

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => match serde_json::to_string_pretty(value) {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("JSON serialization error: {}", e),
        },
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}

/// Rows worth listing on their own: group members or extracted records.
pub(crate) fn detail_rows(result: &Value) -> Option<Vec<Vec<String>>> {
    if let Some(Value::Array(members)) = result.get("member_results") {
        let mut rows = vec![vec![
            "tax_id".to_string(),
            "role".into(),
            "name".into(),
            "aids".into(),
            "total".into(),
            "error".into(),
        ]];
        for m in members {
            let company = &m["result"];
            rows.push(vec![
                scalar(&company["tax_id"]),
                scalar(&m["role"]),
                scalar(&m["display_name"]),
                company["records"].as_array().map_or(0, Vec::len).to_string(),
                scalar(&company["total"]),
                scalar(&company["error"]),
            ]);
        }
        return Some(rows);
    }

    let records = result
        .get("company")
        .and_then(|c| c.get("records"))
        .or_else(|| result.get("records"))?
        .as_array()?;
    let mut rows = vec![vec!["grant_date".to_string(), "amount".into(), "measure_title".into()]];
    for r in records {
        rows.push(vec![
            scalar(&r["grant_date"]),
            scalar(&r["amount"]),
            scalar(&r["measure_title"]),
        ]);
    }
    Some(rows)
}

pub(crate) fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

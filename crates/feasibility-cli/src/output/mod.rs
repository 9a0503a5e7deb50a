pub mod csv_out;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::Value;

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => match serde_json::to_string_pretty(value) {
            Ok(s) => println!("{s}"),
            Err(e) => eprintln!("JSON serialization error: {e}"),
        },
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}

/// Render a scalar JSON value for text output.
///
/// Undefined metrics arrive as `{"undefined": "<reason>"}` and are shown as
/// `n/a (<reason>)` so they can never be mistaken for a computed zero.
pub fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "-".to_string(),
        Value::Object(map) => match map.get("undefined") {
            Some(Value::String(reason)) if map.len() == 1 => {
                format!("n/a ({})", reason.replace('_', " "))
            }
            _ => serde_json::to_string(value).unwrap_or_default(),
        },
        Value::Array(arr) => arr.iter().map(render_scalar).collect::<Vec<_>>().join(", "),
    }
}

/// The main monthly table carried by a result, if any: ledger rows, debt
/// periods or scenario results.
pub fn row_table(result: &Value) -> Option<&Vec<Value>> {
    ["rows", "periods", "results"]
        .iter()
        .find_map(|k| result.get(*k).and_then(Value::as_array))
        .or_else(|| result.pointer("/ledger/rows").and_then(Value::as_array))
        .filter(|rows| rows.first().is_some_and(Value::is_object))
}

/// Flatten nested objects into `parent.child` keys, leaving arrays out.
pub fn flatten_scalars(prefix: &str, value: &Value, out: &mut Vec<(String, Value)>) {
    match value {
        Value::Object(map) if !map.contains_key("undefined") => {
            for (key, val) in map {
                let name = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_scalars(&name, val, out);
            }
        }
        Value::Array(_) => {}
        _ => out.push((prefix.to_string(), value.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_undefined_metric_renders_placeholder() {
        assert_eq!(
            render_scalar(&json!({ "undefined": "never_recovered" })),
            "n/a (never recovered)"
        );
        assert_eq!(render_scalar(&json!("12.5")), "12.5");
    }

    #[test]
    fn test_flatten_skips_arrays_and_keeps_metrics() {
        let mut out = Vec::new();
        flatten_scalars(
            "",
            &json!({ "investor": { "npv": "10", "irr": { "undefined": "not_converged" } }, "rows": [1] }),
            &mut out,
        );
        let keys: Vec<&str> = out.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["investor.irr", "investor.npv"]);
    }

    #[test]
    fn test_row_table_finds_ledger() {
        let v = json!({ "ledger": { "rows": [{ "month": 0 }] } });
        assert_eq!(row_table(&v).map(|r| r.len()), Some(1));
        assert!(row_table(&json!({ "lots_sold": [1, 2] })).is_none());
    }
}

use serde_json::Value;
use tabled::{builder::Builder, Table};

use super::{flatten_scalars, render_scalar, row_table};

/// Print a result as tables: its scalar fields, then its row table if any.
pub fn print_table(value: &Value) {
    let result = value.get("result").unwrap_or(value);

    let mut scalars = Vec::new();
    flatten_scalars("", result, &mut scalars);
    if !scalars.is_empty() {
        let mut builder = Builder::default();
        builder.push_record(["Field", "Value"]);
        for (key, val) in &scalars {
            builder.push_record([key.clone(), render_scalar(val)]);
        }
        println!("{}", Table::from(builder));
    }

    if let Some(rows) = row_table(result) {
        println!();
        print_rows(rows);
    }
    print_sensitivity(result);

    if let Some(Value::Array(warnings)) = value.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings.iter().filter_map(Value::as_str) {
                println!("  - {w}");
            }
        }
    }
    if let Some(Value::String(meth)) = value.get("methodology") {
        println!("\nMethodology: {meth}");
    }
}

fn print_rows(rows: &[Value]) {
    let Some(Value::Object(first)) = rows.first() else {
        return;
    };
    let headers: Vec<String> = first.keys().cloned().collect();
    let mut builder = Builder::default();
    builder.push_record(headers.clone());
    for row in rows {
        builder.push_record(
            headers
                .iter()
                .map(|h| row.get(h).map(render_scalar).unwrap_or_default()),
        );
    }
    println!("{}", Table::from(builder));
}

/// Pivot tables: one row per target, one column per variation.
fn print_sensitivity(result: &Value) {
    for key in ["npv", "irr"] {
        let Some(pivot) = result.get(key) else {
            continue;
        };
        let (Some(variations), Some(rows)) = (
            pivot.get("variations").and_then(Value::as_array),
            pivot.get("rows").and_then(Value::as_array),
        ) else {
            continue;
        };
        let mut builder = Builder::default();
        let mut header = vec![pivot
            .get("metric")
            .map(render_scalar)
            .unwrap_or_else(|| key.to_string())];
        header.extend(variations.iter().map(render_scalar));
        builder.push_record(header);
        for row in rows {
            let mut record = vec![row.get("target").map(render_scalar).unwrap_or_default()];
            if let Some(values) = row.get("values").and_then(Value::as_array) {
                record.extend(values.iter().map(render_scalar));
            }
            builder.push_record(record);
        }
        println!("\n{}", Table::from(builder));
    }
}

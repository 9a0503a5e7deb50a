use serde_json::Value;
use std::io;

use super::{flatten_scalars, render_scalar, row_table};

/// Write output as CSV to stdout.
///
/// Results carrying a row table (ledger, debt periods, scenarios) are written
/// one row per record; anything else as `field,value` pairs.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());
    let result = value.get("result").unwrap_or(value);

    if let Some(rows) = row_table(result) {
        write_rows(&mut wtr, rows);
    } else {
        let mut scalars = Vec::new();
        flatten_scalars("", result, &mut scalars);
        let _ = wtr.write_record(["field", "value"]);
        for (key, val) in &scalars {
            let _ = wtr.write_record([key.as_str(), &render_scalar(val)]);
        }
    }

    let _ = wtr.flush();
}

fn write_rows(wtr: &mut csv::Writer<io::StdoutLock<'_>>, rows: &[Value]) {
    let Some(Value::Object(first)) = rows.first() else {
        return;
    };
    let headers: Vec<&str> = first.keys().map(String::as_str).collect();
    let _ = wtr.write_record(&headers);
    for row in rows {
        let record: Vec<String> = headers
            .iter()
            .map(|h| row.get(*h).map(render_scalar).unwrap_or_default())
            .collect();
        let _ = wtr.write_record(&record);
    }
}

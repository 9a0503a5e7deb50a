use serde_json::Value;

use super::render_scalar;

/// Print just the headline figure of a result.
///
/// Looks for well-known fields in priority order, then falls back to the
/// first field of the result object.
pub fn print_minimal(value: &Value) {
    let result = value.get("result").unwrap_or(value);

    let priority = [
        "/investor/npv",
        "/base_investor_npv",
        "/probability_weighted_npv",
        "/npv",
        "/irr/annual",
        "/irr",
        "/wacc",
        "/payback_months",
        "/total_interest",
        "/equity_multiple",
    ];

    if let Some(val) = headline(result, &priority) {
        println!("{}", render_scalar(val));
        return;
    }

    if let Some((key, val)) = result.as_object().and_then(|m| m.iter().next()) {
        println!("{key}: {}", render_scalar(val));
        return;
    }
    println!("{}", render_scalar(result));
}

/// First priority field holding a scalar or an undefined-metric placeholder.
///
/// Nested objects such as sensitivity pivots are skipped.
fn headline<'a>(result: &'a Value, priority: &[&str]) -> Option<&'a Value> {
    priority
        .iter()
        .filter_map(|pointer| result.pointer(pointer))
        .find(|val| match val {
            Value::Null | Value::Array(_) => false,
            Value::Object(map) => map.len() == 1 && map.contains_key("undefined"),
            _ => true,
        })
}

use rust_decimal::Decimal;

use crate::params::InvestmentItem;
use crate::types::{Money, Month};

/// Lay CAPEX items onto the monthly grid as negative cash flows.
///
/// Items dated after the horizon are dropped (parameter validation reports
/// them). Several items in the same month are summed.
pub fn capex_schedule(items: &[InvestmentItem], horizon_months: Month) -> Vec<Money> {
    let mut series = vec![Decimal::ZERO; horizon_months as usize + 1];
    for item in items {
        if let Some(slot) = series.get_mut(item.month as usize) {
            *slot -= item.amount;
        }
    }
    series
}

use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use crate::error::FeasibilityError;
use crate::params::{ParameterSet, SaleKind, SalesPlan};
use crate::types::*;
use crate::FeasibilityResult;

/// Input for a stand-alone absorption run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbsorptionInput {
    pub sales_plans: Vec<SalesPlan>,
    #[serde(default)]
    pub annual_price_growth: Rate,
    pub horizon_months: Month,
}

impl AbsorptionInput {
    pub fn from_parameters(params: &ParameterSet) -> Self {
        Self {
            sales_plans: params.sales_plans.clone(),
            annual_price_growth: params.annual_price_growth,
            horizon_months: params.horizon_months,
        }
    }
}

/// Absorption outcome of a single plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanAbsorption {
    pub name: String,
    pub lots_sold: u32,
    pub lots_remaining: u32,
    /// Month the last lot sold, if the plan sold out within the horizon
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sell_out_month: Option<Month>,
}

/// Monthly lot sales and the cash they collect, indexed 0..=horizon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbsorptionSchedule {
    pub lots_sold: Vec<u32>,
    pub down_payment_collections: Vec<Money>,
    pub installment_collections: Vec<Money>,
    pub plans: Vec<PlanAbsorption>,
    pub total_lots: u32,
}

impl AbsorptionSchedule {
    /// Total sales collections (down payments plus installments) in `month`.
    pub fn collections_at(&self, month: Month) -> Money {
        let i = month as usize;
        self.down_payment_collections.get(i).copied().unwrap_or(Decimal::ZERO)
            + self.installment_collections.get(i).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn total_collections(&self) -> Money {
        self.down_payment_collections.iter().sum::<Money>()
            + self.installment_collections.iter().sum::<Money>()
    }
}

/// Run the absorption engine wrapped in the computation envelope.
pub fn build_absorption(
    input: &AbsorptionInput,
) -> FeasibilityResult<ComputationOutput<AbsorptionSchedule>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let schedule = absorb(
        &input.sales_plans,
        input.annual_price_growth,
        input.horizon_months,
        &mut warnings,
    )?;

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Lot absorption with down-payment and installment collections",
        input,
        warnings,
        elapsed,
        schedule,
    ))
}

/// Price escalation for sales closed in `month`.
///
/// Prices step up once per elapsed project year: the exponent is
/// `floor((month - 1) / 12)`, so months 1..=12 carry base prices.
pub fn price_factor(annual_price_growth: Rate, month: Month) -> FeasibilityResult<Decimal> {
    if month == 0 {
        return Ok(Decimal::ONE);
    }
    let years = ((month - 1) / 12) as i64;
    (Decimal::ONE + annual_price_growth)
        .checked_powi(years)
        .ok_or_else(|| FeasibilityError::OutOfRange {
            context: format!("price escalation at month {month}"),
        })
}

/// `amount * factor * units`, added into `slot`.
fn accrue(slot: &mut Money, amount: Money, factor: Decimal, units: Decimal) -> FeasibilityResult<()> {
    *slot = amount
        .checked_mul(factor)
        .and_then(|v| v.checked_mul(units))
        .and_then(|v| slot.checked_add(v))
        .ok_or_else(|| FeasibilityError::OutOfRange {
            context: "sales collections".into(),
        })?;
    Ok(())
}

/// Turn sale plans into monthly lot sales and cash collections.
///
/// Scheduled plans sell everything in their start month and begin collecting
/// installments that same month. Dynamic plans sell up to `units_per_month`
/// each month from their start month, with the first installment one
/// installment period after the sale. Installments past the horizon are
/// dropped. A total lot count beyond `u32` is rejected up front.
pub fn absorb(
    plans: &[SalesPlan],
    annual_price_growth: Rate,
    horizon_months: Month,
    warnings: &mut Vec<String>,
) -> FeasibilityResult<AbsorptionSchedule> {
    let total_lots = plans
        .iter()
        .try_fold(0u32, |acc, p| acc.checked_add(p.lot_count))
        .ok_or_else(|| FeasibilityError::InvalidInput {
            field: "sales_plans".into(),
            reason: "Total lot count is too large".into(),
        })?;
    let len = horizon_months as usize + 1;
    let mut lots_sold = vec![0u32; len];
    let mut down_payments = vec![Decimal::ZERO; len];
    let mut installments = vec![Decimal::ZERO; len];

    let mut remaining: Vec<u32> = plans.iter().map(|p| p.lot_count).collect();
    let mut sold_total = vec![0u32; plans.len()];
    let mut sell_out: Vec<Option<Month>> = vec![None; plans.len()];
    let mut installment_events = 0u64;

    for month in 1..=horizon_months {
        for (i, plan) in plans.iter().enumerate() {
            if remaining[i] == 0 {
                continue;
            }
            let start = plan.start_month.max(1);
            let sold = match plan.kind {
                SaleKind::Scheduled if month == start => remaining[i],
                SaleKind::Scheduled => 0,
                SaleKind::Dynamic if month >= start => plan.units_per_month.min(remaining[i]),
                SaleKind::Dynamic => 0,
            };
            if sold == 0 {
                continue;
            }
            let factor = price_factor(annual_price_growth, month)?;

            remaining[i] -= sold;
            sold_total[i] += sold;
            if remaining[i] == 0 {
                sell_out[i] = Some(month);
            }

            let units = Decimal::from(sold);
            lots_sold[month as usize] += sold;
            accrue(&mut down_payments[month as usize], plan.down_payment, factor, units)?;

            if plan.installment_count == 0 || plan.installment_amount.is_zero() {
                continue;
            }
            let frequency = plan.installment_frequency_months.max(1);
            let first = match plan.kind {
                SaleKind::Dynamic => month + frequency,
                SaleKind::Scheduled => month,
            };
            // One accumulator entry per installment date covers every unit sold this month
            for k in 0..plan.installment_count {
                let due = first as u64 + k as u64 * frequency as u64;
                if due > horizon_months as u64 {
                    break;
                }
                accrue(&mut installments[due as usize], plan.installment_amount, factor, units)?;
            }
            installment_events =
                installment_events.saturating_add(sold as u64 * plan.installment_count as u64);
        }
    }

    for (i, plan) in plans.iter().enumerate() {
        if remaining[i] > 0 {
            warnings.push(format!(
                "Sales plan '{}' still holds {} of {} lots at the end of the horizon",
                plan.name, remaining[i], plan.lot_count
            ));
        }
    }

    debug!(
        plans = plans.len(),
        lots = total_lots - remaining.iter().sum::<u32>(),
        installment_events,
        "absorption complete"
    );

    let plan_results = plans
        .iter()
        .enumerate()
        .map(|(i, plan)| PlanAbsorption {
            name: plan.name.clone(),
            lots_sold: sold_total[i],
            lots_remaining: remaining[i],
            sell_out_month: sell_out[i],
        })
        .collect();

    Ok(AbsorptionSchedule {
        lots_sold,
        down_payment_collections: down_payments,
        installment_collections: installments,
        plans: plan_results,
        total_lots,
    })
}

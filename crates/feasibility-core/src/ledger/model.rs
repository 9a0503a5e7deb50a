use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use crate::error::FeasibilityError;
use crate::financing::amortisation::{schedule_debt, DebtSchedule, DebtScheduleInput};
use crate::ledger::capex::capex_schedule;
use crate::ledger::periodic::{MonthDrivers, PeriodicItemEvaluator};
use crate::params::ParameterSet;
use crate::sales::absorption::{absorb, PlanAbsorption};
use crate::types::*;
use crate::FeasibilityResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One month of the P&L and cash-flow waterfall.
///
/// Sign convention: outflows (`operating_costs`, `capex`) are negative;
/// `interest`, `tax`, `operating_tax` and `principal_paid` are positive
/// magnitudes that are subtracted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub month: Month,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    pub lots_sold: u32,
    pub inventory_lots: u32,
    pub down_payment_revenue: Money,
    pub installment_revenue: Money,
    pub other_income: Money,
    pub total_revenue: Money,
    pub operating_costs: Money,
    pub ebitda: Money,
    pub depreciation: Money,
    pub ebit: Money,
    pub interest: Money,
    pub ebt: Money,
    pub tax: Money,
    /// Unused tax losses carried into the next month
    pub tax_loss_carryforward: Money,
    pub net_income: Money,
    /// Tax on EBIT as if the project carried no debt
    pub operating_tax: Money,
    pub nopat: Money,
    /// Net income minus NOPAT: the after-tax cost of debt this month
    pub after_tax_interest: Money,
    pub capex: Money,
    pub debt_draw: Money,
    pub principal_paid: Money,
    pub net_debt_cashflow: Money,
    pub debt_balance: Money,
    pub fcff: Money,
    pub fcfe: Money,
    pub equity_contribution: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyLedger {
    pub rows: Vec<LedgerRow>,
    pub plans: Vec<PlanAbsorption>,
    /// Cumulative net income over total CAPEX
    pub static_roi: Metric<Rate>,
    /// Positive FCFE over the magnitude of negative FCFE
    pub equity_multiple: Metric<Multiple>,
}

impl MonthlyLedger {
    pub fn fcff(&self) -> Vec<Money> {
        self.rows.iter().map(|r| r.fcff).collect()
    }

    pub fn fcfe(&self) -> Vec<Money> {
        self.rows.iter().map(|r| r.fcfe).collect()
    }

    pub fn total_net_income(&self) -> Money {
        self.rows.iter().map(|r| r.net_income).sum()
    }

    /// Equity called from the sponsor: sum of negative FCFE magnitudes.
    pub fn invested_equity(&self) -> Money {
        self.rows.iter().map(|r| r.equity_contribution).sum()
    }

    /// Cash distributed to the sponsor: sum of positive FCFE.
    pub fn total_returned(&self) -> Money {
        self.rows.iter().map(|r| r.fcfe.max(Decimal::ZERO)).sum()
    }
}

/// Running balance of unused tax losses.
#[derive(Debug, Clone, Copy, Default)]
struct LossCarryforward {
    balance: Money,
}

impl LossCarryforward {
    /// Tax due on `base`, absorbing losses first. Never negative.
    fn charge(&mut self, base: Money, rate: Rate) -> Money {
        if base < Decimal::ZERO {
            self.balance += -base;
            return Decimal::ZERO;
        }
        let used = base.min(self.balance);
        self.balance -= used;
        (base - used) * rate
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// Build the ledger from parameters alone, wrapped in the envelope.
pub fn build_monthly_ledger(
    params: &ParameterSet,
) -> FeasibilityResult<ComputationOutput<MonthlyLedger>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    params.validate(&mut warnings)?;
    let capex = capex_schedule(&params.investment_schedule, params.horizon_months);
    let debt = schedule_debt(&DebtScheduleInput::from_parameters(params), &mut warnings)?;
    let ledger = build_ledger(
        params,
        &capex,
        &debt,
        params.financing.debt_amount,
        &mut warnings,
    )?;

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Monthly P&L with loss carryforward, FCFF and FCFE",
        params,
        warnings,
        elapsed,
        ledger,
    ))
}

/// Assemble the monthly ledger for months 0..=horizon.
///
/// Each month is computed in order: sales and inventory, revenue, dynamic
/// operating costs, EBITDA/EBIT/EBT, tax with loss carryforward, net income,
/// FCFF, net debt cash flow and FCFE. Month 0 carries only CAPEX and the
/// debt draw.
pub fn build_ledger(
    params: &ParameterSet,
    capex: &[Money],
    debt: &DebtSchedule,
    debt_amount: Money,
    warnings: &mut Vec<String>,
) -> FeasibilityResult<MonthlyLedger> {
    let horizon = params.horizon_months;
    let len = horizon as usize + 1;
    if capex.len() != len {
        return Err(FeasibilityError::InvalidInput {
            field: "capex".into(),
            reason: format!("Expected {len} monthly CAPEX values, got {}", capex.len()),
        });
    }

    let tax_rate = params.financing.tax_rate;
    let sales = absorb(
        &params.sales_plans,
        params.annual_price_growth,
        horizon,
        warnings,
    )?;
    let evaluator = PeriodicItemEvaluator::new(&params.periodic_items, warnings);

    let mut rows = Vec::with_capacity(len);
    let mut inventory = sales.total_lots;
    let mut real_losses = LossCarryforward::default();
    let mut operating_losses = LossCarryforward::default();

    for month in 0..=horizon {
        let t = month as usize;

        // 1. Lots and inventory
        let lots_sold = sales.lots_sold[t];
        inventory = inventory.saturating_sub(lots_sold);

        // 2-3. Revenue and dynamic operating costs
        let down_payment_revenue = sales.down_payment_collections[t];
        let installment_revenue = sales.installment_collections[t];
        let sales_collections = down_payment_revenue + installment_revenue;
        let periodic = if month == 0 {
            Default::default()
        } else {
            evaluator.evaluate(&MonthDrivers {
                month,
                sales_collections,
                inventory_lots: inventory,
            })
        };
        let total_revenue = sales_collections + periodic.other_income;
        let operating_costs = -periodic.operating_cost;

        // 4. Profit stages
        let ebitda = total_revenue + operating_costs;
        let depreciation = Decimal::ZERO;
        let ebit = ebitda - depreciation;
        let interest = debt.interest_at(month);
        let ebt = ebit - interest;

        // 5-6. Tax and net income
        let tax = real_losses.charge(ebt, tax_rate);
        let net_income = ebt - tax;
        let operating_tax = operating_losses.charge(ebit, tax_rate);
        let nopat = ebit - operating_tax;

        // 7. Unlevered flow
        let capex_t = capex[t];
        let fcff = nopat + depreciation + capex_t;

        // 8-9. Debt and levered flow
        let debt_draw = if month == 0 { debt_amount } else { Decimal::ZERO };
        let principal_paid = debt.principal_at(month);
        let net_debt_cashflow = debt_draw - principal_paid;
        let fcfe = net_income + depreciation + capex_t + net_debt_cashflow;
        let debt_balance = if month == 0 {
            debt_amount
        } else {
            debt.closing_balance_at(month)
        };

        rows.push(LedgerRow {
            month,
            date: params
                .start_date
                .and_then(|d| d.checked_add_months(chrono::Months::new(month))),
            lots_sold,
            inventory_lots: inventory,
            down_payment_revenue,
            installment_revenue,
            other_income: periodic.other_income,
            total_revenue,
            operating_costs,
            ebitda,
            depreciation,
            ebit,
            interest,
            ebt,
            tax,
            tax_loss_carryforward: real_losses.balance,
            net_income,
            operating_tax,
            nopat,
            after_tax_interest: net_income - nopat,
            capex: capex_t,
            debt_draw,
            principal_paid,
            net_debt_cashflow,
            debt_balance,
            fcff,
            fcfe,
            equity_contribution: (-fcfe).max(Decimal::ZERO),
        });
    }

    let total_capex: Money = capex.iter().map(|c| c.abs()).sum();
    let total_net_income: Money = rows.iter().map(|r| r.net_income).sum();
    let static_roi = if total_capex.is_zero() {
        Metric::undefined(UndefinedReason::InvalidConfiguration)
    } else {
        Metric::Value(total_net_income / total_capex)
    };

    let positive: Money = rows.iter().map(|r| r.fcfe.max(Decimal::ZERO)).sum();
    let negative: Money = rows.iter().map(|r| r.equity_contribution).sum();
    let equity_multiple = if negative.is_zero() {
        Metric::undefined(UndefinedReason::InvalidConfiguration)
    } else {
        Metric::Value(positive / negative)
    };

    debug!(
        months = rows.len(),
        unsold = inventory,
        carryforward = %real_losses.balance,
        "ledger built"
    );

    Ok(MonthlyLedger {
        rows,
        plans: sales.plans,
        static_roi,
        equity_multiple,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::*;
    use rust_decimal_macros::dec;

    fn params(debt_amount: Decimal) -> ParameterSet {
        ParameterSet {
            horizon_months: 6,
            start_date: None,
            investment_schedule: vec![InvestmentItem {
                label: "Land".into(),
                amount: dec!(1000),
                month: 0,
                sensitivity_tag: None,
            }],
            sales_plans: vec![SalesPlan {
                name: "Cash".into(),
                lot_count: 4,
                units_per_month: 1,
                down_payment: dec!(400),
                installment_amount: Decimal::ZERO,
                installment_count: 0,
                installment_frequency_months: 1,
                kind: SaleKind::Dynamic,
                start_month: 1,
            }],
            periodic_items: vec![],
            financing: FinancingTerms {
                debt_amount,
                annual_debt_rate: Decimal::ZERO,
                term_months: 4,
                capitalization_period: 1,
                amortisation_system: AmortisationSystem::German,
                annual_equity_cost: dec!(0.15),
                tax_rate: dec!(0.25),
            },
            annual_price_growth: Decimal::ZERO,
        }
    }

    #[test]
    fn test_month_zero_carries_capex_and_draw() {
        let out = build_monthly_ledger(&params(dec!(600))).unwrap();
        let row = &out.result.rows[0];
        assert_eq!(row.capex, dec!(-1000));
        assert_eq!(row.debt_draw, dec!(600));
        assert_eq!(row.fcfe, dec!(-400));
        assert_eq!(row.fcff, dec!(-1000));
        assert_eq!(row.total_revenue, Decimal::ZERO);
        assert_eq!(row.inventory_lots, 4);
    }

    #[test]
    fn test_inventory_runs_down() {
        let out = build_monthly_ledger(&params(Decimal::ZERO)).unwrap();
        let inv: Vec<u32> = out.result.rows.iter().map(|r| r.inventory_lots).collect();
        assert_eq!(inv, vec![4, 3, 2, 1, 0, 0, 0]);
    }

    #[test]
    fn test_loss_carryforward_shields_later_profit() {
        let mut p = params(Decimal::ZERO);
        p.periodic_items.push(PeriodicItem {
            label: Some("Overhead".into()),
            amount_or_percent: dec!(600),
            basis: ItemBasis::Fixed,
            start_month: 1,
            end_month: 1,
            kind: ItemKind::Expense,
        });
        let rows = build_monthly_ledger(&p).unwrap().result.rows;
        // Month 1: 400 - 600 = -200 loss
        assert_eq!(rows[1].tax, Decimal::ZERO);
        assert_eq!(rows[1].tax_loss_carryforward, dec!(200));
        // Month 2: 400 profit, 200 shielded, 200 taxed at 25%
        assert_eq!(rows[2].tax, dec!(50));
        assert_eq!(rows[2].tax_loss_carryforward, Decimal::ZERO);
        assert_eq!(rows[3].tax, dec!(100));
    }

    #[test]
    fn test_zero_debt_fcff_equals_fcfe() {
        let rows = build_monthly_ledger(&params(Decimal::ZERO)).unwrap().result.rows;
        for r in &rows {
            assert_eq!(r.fcff, r.fcfe, "month {}", r.month);
        }
    }

    #[test]
    fn test_levered_identity_holds() {
        let mut p = params(dec!(600));
        p.financing.annual_debt_rate = dec!(0.12);
        let rows = build_monthly_ledger(&p).unwrap().result.rows;
        for r in &rows {
            assert_eq!(r.ebitda, r.total_revenue + r.operating_costs);
            assert_eq!(r.ebt, r.ebit - r.interest);
            let rebuilt = r.fcff + r.after_tax_interest + r.net_debt_cashflow;
            assert!((r.fcfe - rebuilt).abs() < dec!(0.0000001), "month {}", r.month);
            assert!(r.tax >= Decimal::ZERO);
        }
        let repaid: Money = rows.iter().map(|r| r.principal_paid).sum();
        assert_eq!(repaid, dec!(600));
    }

    #[test]
    fn test_summary_metrics() {
        let out = build_monthly_ledger(&params(Decimal::ZERO)).unwrap().result;
        // Net income 4 * 400 * 0.75 = 1200 over 1000 CAPEX
        assert_eq!(out.static_roi, Metric::Value(dec!(1.2)));
        // 1200 returned over 1000 invested
        assert_eq!(out.equity_multiple, Metric::Value(dec!(1.2)));
        assert_eq!(out.invested_equity(), dec!(1000));
        assert_eq!(out.total_returned(), dec!(1200));
    }

    #[test]
    fn test_equity_multiple_undefined_without_capital_call() {
        let mut p = params(Decimal::ZERO);
        p.investment_schedule.clear();
        let out = build_monthly_ledger(&p).unwrap().result;
        assert_eq!(
            out.equity_multiple.reason(),
            Some(UndefinedReason::InvalidConfiguration)
        );
        assert!(!out.static_roi.is_defined());
    }

    #[test]
    fn test_dates_follow_start_date() {
        let mut p = params(Decimal::ZERO);
        p.start_date = NaiveDate::from_ymd_opt(2025, 1, 31);
        let rows = build_monthly_ledger(&p).unwrap().result.rows;
        assert_eq!(rows[1].date, NaiveDate::from_ymd_opt(2025, 2, 28));
    }

    #[test]
    fn test_capex_length_mismatch_rejected() {
        let p = params(Decimal::ZERO);
        let debt = schedule_debt(&DebtScheduleInput::from_parameters(&p), &mut Vec::new()).unwrap();
        let err = build_ledger(&p, &[Decimal::ZERO], &debt, Decimal::ZERO, &mut Vec::new());
        assert!(err.is_err());
    }
}

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

use crate::financing::amortisation::{schedule_debt, DebtSchedule, DebtScheduleInput};
use crate::financing::wacc::{wacc_rate, WaccInput};
use crate::ledger::capex::capex_schedule;
use crate::ledger::model::{build_ledger, MonthlyLedger};
use crate::params::ParameterSet;
use crate::time_value::{self, IrrSolution, RateBasis};
use crate::types::*;
use crate::FeasibilityResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapitalSummary {
    pub total_investment: Money,
    pub debt_amount: Money,
    pub equity_required: Money,
    pub debt_share: Rate,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IrrSummary {
    pub monthly: Rate,
    pub annual: Rate,
}

impl From<IrrSolution> for IrrSummary {
    fn from(s: IrrSolution) -> Self {
        Self {
            monthly: s.monthly,
            annual: s.annual,
        }
    }
}

/// Return metrics of one cash-flow stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamMetrics {
    pub discount_rate: Rate,
    pub npv: Metric<Money>,
    pub irr: Metric<IrrSummary>,
    pub payback_months: Metric<Months>,
    pub discounted_payback_months: Metric<Months>,
}

/// Base-case feasibility appraisal.
///
/// The project view discounts FCFF at WACC; the investor view discounts
/// FCFE at the cost of equity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeasibilityReport {
    pub capital: CapitalSummary,
    pub wacc: Rate,
    pub cost_of_equity: Rate,
    pub project: StreamMetrics,
    pub investor: StreamMetrics,
    pub static_roi: Metric<Rate>,
    pub moic: Metric<Multiple>,
    pub investor_roi: Metric<Rate>,
    pub invested_equity: Money,
    pub total_returned: Money,
    pub total_interest: Money,
    pub ledger: MonthlyLedger,
    pub debt_schedule: DebtSchedule,
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Run the full pipeline on a parameter set and summarise it.
pub fn evaluate_project(
    params: &ParameterSet,
) -> FeasibilityResult<ComputationOutput<FeasibilityReport>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let report = appraise(params, &mut warnings)?;
    for w in &warnings {
        warn!("{w}");
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Land development feasibility: monthly ledger, FCFF at WACC, FCFE at cost of equity",
        params,
        warnings,
        elapsed,
        report,
    ))
}

/// Pipeline without the envelope. Used directly by the scenario drivers.
pub fn appraise(
    params: &ParameterSet,
    warnings: &mut Vec<String>,
) -> FeasibilityResult<FeasibilityReport> {
    params.validate(warnings)?;

    let capex = capex_schedule(&params.investment_schedule, params.horizon_months);
    let debt_schedule = schedule_debt(&DebtScheduleInput::from_parameters(params), warnings)?;
    let ledger = build_ledger(
        params,
        &capex,
        &debt_schedule,
        params.financing.debt_amount,
        warnings,
    )?;

    let cost_of_equity = params.financing.annual_equity_cost;
    let wacc = wacc_rate(&WaccInput::from_parameters(params));

    let project = stream_metrics(&ledger.fcff(), wacc)?;
    let investor = stream_metrics(&ledger.fcfe(), cost_of_equity)?;

    let invested_equity = ledger.invested_equity();
    let total_returned = ledger.total_returned();
    let investor_roi = if invested_equity > Decimal::ZERO {
        Metric::Value((total_returned - invested_equity) / invested_equity)
    } else {
        Metric::undefined(UndefinedReason::InvalidConfiguration)
    };

    debug!(
        wacc = %wacc,
        investor_npv = %investor.npv,
        investor_irr = ?investor.irr.value().map(|i| i.annual),
        "appraisal complete"
    );

    Ok(FeasibilityReport {
        capital: CapitalSummary {
            total_investment: params.total_investment(),
            debt_amount: params.financing.debt_amount,
            equity_required: params.equity_required(),
            debt_share: params.debt_share(),
        },
        wacc,
        cost_of_equity,
        project,
        investor,
        static_roi: ledger.static_roi,
        moic: ledger.equity_multiple,
        investor_roi,
        invested_equity,
        total_returned,
        total_interest: debt_schedule.total_interest,
        ledger,
        debt_schedule,
    })
}

fn stream_metrics(flows: &[Money], annual_rate: Rate) -> FeasibilityResult<StreamMetrics> {
    Ok(StreamMetrics {
        discount_rate: annual_rate,
        npv: Metric::from_result(time_value::npv(flows, annual_rate, RateBasis::Effective, 1))?,
        irr: Metric::from_result(time_value::irr(flows))?.map(IrrSummary::from),
        payback_months: Metric::from_result(time_value::payback(flows))?,
        discounted_payback_months: Metric::from_result(time_value::discounted_payback(
            flows,
            annual_rate,
        ))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::*;
    use rust_decimal_macros::dec;

    fn params() -> ParameterSet {
        ParameterSet {
            horizon_months: 24,
            start_date: None,
            investment_schedule: vec![InvestmentItem {
                label: "Land".into(),
                amount: dec!(10000),
                month: 0,
                sensitivity_tag: Some("land".into()),
            }],
            sales_plans: vec![SalesPlan {
                name: "Presale".into(),
                lot_count: 20,
                units_per_month: 2,
                down_payment: dec!(500),
                installment_amount: dec!(100),
                installment_count: 6,
                installment_frequency_months: 1,
                kind: SaleKind::Dynamic,
                start_month: 1,
            }],
            periodic_items: vec![],
            financing: FinancingTerms {
                debt_amount: dec!(4000),
                annual_debt_rate: dec!(0.10),
                term_months: 12,
                capitalization_period: 3,
                amortisation_system: AmortisationSystem::German,
                annual_equity_cost: dec!(0.15),
                tax_rate: dec!(0.25),
            },
            annual_price_growth: Decimal::ZERO,
        }
    }

    #[test]
    fn test_report_capital_summary() {
        let report = evaluate_project(&params()).unwrap().result;
        assert_eq!(report.capital.total_investment, dec!(10000));
        assert_eq!(report.capital.equity_required, dec!(6000));
        assert_eq!(report.capital.debt_share, dec!(0.4));
        assert_eq!(report.cost_of_equity, dec!(0.15));
        // 0.6 * 0.15 + 0.4 * 0.10 * 0.75
        assert_eq!(report.wacc, dec!(0.12));
    }

    #[test]
    fn test_report_metrics_defined_for_profitable_project() {
        let report = evaluate_project(&params()).unwrap().result;
        assert!(report.investor.npv.is_defined());
        assert!(report.investor.irr.is_defined());
        assert!(report.project.irr.is_defined());
        assert!(report.investor.payback_months.is_defined());
        assert!(report.moic.is_defined());
        assert!(report.total_interest > Decimal::ZERO);
        assert!(report.invested_equity >= dec!(6000));
    }

    #[test]
    fn test_unsellable_project_reports_undefined_not_zero() {
        let mut p = params();
        p.sales_plans.clear();
        p.financing.debt_amount = Decimal::ZERO;
        let report = evaluate_project(&p).unwrap().result;
        assert_eq!(
            report.investor.irr.reason(),
            Some(UndefinedReason::DegenerateCashFlow)
        );
        assert_eq!(
            report.investor.payback_months.reason(),
            Some(UndefinedReason::NeverRecovered)
        );
        assert!(report.investor.npv.is_defined());
    }

    #[test]
    fn test_investor_payback_counts_later_capital_calls() {
        // The month-0 draw exceeds month-0 CAPEX, so FCFE starts positive
        let mut p = params();
        p.financing.debt_amount = dec!(12000);
        p.sales_plans[0].down_payment = dec!(1500);
        p.investment_schedule.push(InvestmentItem {
            label: "Roads".into(),
            amount: dec!(12000),
            month: 2,
            sensitivity_tag: None,
        });
        let report = evaluate_project(&p).unwrap().result;
        let fcfe = report.ledger.fcfe();
        assert!(fcfe[0] > Decimal::ZERO);
        assert!(fcfe[..3].iter().copied().sum::<Decimal>() < Decimal::ZERO);

        let payback = report.investor.payback_months.value().copied().unwrap();
        assert!(payback > dec!(2), "payback {payback}");
    }

    #[test]
    fn test_invalid_parameters_propagate() {
        let mut p = params();
        p.financing.tax_rate = dec!(1.5);
        assert!(evaluate_project(&p).is_err());
    }
}

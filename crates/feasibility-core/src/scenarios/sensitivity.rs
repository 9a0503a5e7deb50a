use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::appraisal::appraise;
use crate::error::FeasibilityError;
use crate::params::{ItemKind, ParameterSet};
use crate::types::*;
use crate::FeasibilityResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Parameter leaf (or group of leaves) scaled by a sensitivity run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "lever", rename_all = "snake_case")]
pub enum Lever {
    PriceGrowth,
    DebtRate,
    DebtAmount,
    EquityCost,
    TaxRate,
    /// Down payment of every sales plan
    DownPayment,
    /// Installment amount of every sales plan
    InstallmentAmount,
    /// Units per month of every sales plan, rounded, at least 1
    SalesVelocity,
    /// Every expense periodic item
    AllExpenses,
    /// Periodic items carrying this label
    PeriodicItem { label: String },
    /// CAPEX items carrying this sensitivity tag
    CapexTag { tag: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensitivityTarget {
    pub name: String,
    #[serde(flatten)]
    pub lever: Lever,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityInput {
    pub base: ParameterSet,
    /// Empty means `default_targets(&base)`
    #[serde(default)]
    pub targets: Vec<SensitivityTarget>,
    /// Relative changes applied as `value * (1 + variation)`; empty means
    /// `default_variations()`
    #[serde(default)]
    pub variations: Vec<Rate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PivotRow {
    pub target: String,
    pub values: Vec<Metric<Decimal>>,
}

/// One metric indexed by target (rows) and variation (columns)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PivotTable {
    pub metric: String,
    pub variations: Vec<Rate>,
    pub rows: Vec<PivotRow>,
}

impl PivotTable {
    pub fn cell(&self, target: &str, variation: Rate) -> Option<&Metric<Decimal>> {
        let col = self.variations.iter().position(|v| *v == variation)?;
        self.rows
            .iter()
            .find(|r| r.target == target)
            .and_then(|r| r.values.get(col))
    }

    pub fn cell_count(&self) -> usize {
        self.rows.iter().map(|r| r.values.len()).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityOutput {
    pub base_investor_npv: Metric<Money>,
    pub base_investor_irr: Metric<Rate>,
    /// Investor NPV at the cost of equity
    pub npv: PivotTable,
    /// Annual investor IRR
    pub irr: PivotTable,
}

// ---------------------------------------------------------------------------
// Catalogue
// ---------------------------------------------------------------------------

pub fn default_variations() -> Vec<Rate> {
    vec![dec!(-0.2), dec!(-0.1), Decimal::ZERO, dec!(0.1), dec!(0.2)]
}

/// Price growth, debt rate and debt amount, plus one target per CAPEX tag.
pub fn default_targets(params: &ParameterSet) -> Vec<SensitivityTarget> {
    let mut targets = vec![
        SensitivityTarget {
            name: "Price growth".into(),
            lever: Lever::PriceGrowth,
        },
        SensitivityTarget {
            name: "Debt rate".into(),
            lever: Lever::DebtRate,
        },
        SensitivityTarget {
            name: "Debt amount".into(),
            lever: Lever::DebtAmount,
        },
    ];
    targets.extend(params.sensitivity_tags().into_iter().map(|tag| SensitivityTarget {
        name: format!("CAPEX: {tag}"),
        lever: Lever::CapexTag { tag },
    }));
    targets
}

/// Scale the leaves behind `lever` by `1 + variation` in place.
pub fn apply_lever(
    params: &mut ParameterSet,
    lever: &Lever,
    variation: Rate,
) -> FeasibilityResult<()> {
    let factor = Decimal::ONE + variation;
    let fin = &mut params.financing;
    match lever {
        Lever::PriceGrowth => params.annual_price_growth *= factor,
        Lever::DebtRate => fin.annual_debt_rate *= factor,
        Lever::DebtAmount => fin.debt_amount *= factor,
        Lever::EquityCost => fin.annual_equity_cost *= factor,
        Lever::TaxRate => fin.tax_rate *= factor,
        Lever::DownPayment => params
            .sales_plans
            .iter_mut()
            .for_each(|p| p.down_payment *= factor),
        Lever::InstallmentAmount => params
            .sales_plans
            .iter_mut()
            .for_each(|p| p.installment_amount *= factor),
        Lever::SalesVelocity => {
            for plan in params.sales_plans.iter_mut() {
                let scaled = (Decimal::from(plan.units_per_month) * factor).round();
                plan.units_per_month = scaled.to_u32().unwrap_or(0).max(1);
            }
        }
        Lever::AllExpenses => params
            .periodic_items
            .iter_mut()
            .filter(|i| i.kind == ItemKind::Expense)
            .for_each(|i| i.amount_or_percent *= factor),
        Lever::PeriodicItem { label } => {
            let mut matched = false;
            for item in params
                .periodic_items
                .iter_mut()
                .filter(|i| i.label.as_deref() == Some(label.as_str()))
            {
                item.amount_or_percent *= factor;
                matched = true;
            }
            if !matched {
                return Err(FeasibilityError::InvalidInput {
                    field: format!("targets:{label}"),
                    reason: "No periodic item carries this label".into(),
                });
            }
        }
        Lever::CapexTag { tag } => {
            let mut matched = false;
            for item in params
                .investment_schedule
                .iter_mut()
                .filter(|i| i.sensitivity_tag.as_deref() == Some(tag.as_str()))
            {
                item.amount *= factor;
                matched = true;
            }
            if !matched {
                return Err(FeasibilityError::InvalidInput {
                    field: format!("targets:{tag}"),
                    reason: "No CAPEX item carries this sensitivity tag".into(),
                });
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

struct Cell {
    npv: Metric<Money>,
    irr: Metric<Rate>,
    failure: Option<String>,
}

/// Run the full pipeline for every (target, variation) pair.
///
/// Each cell works on its own copy of the base parameters. A cell whose
/// perturbed parameters cannot be evaluated is reported as undefined with
/// a warning rather than failing the whole grid.
pub fn run_sensitivity(
    input: &SensitivityInput,
) -> FeasibilityResult<ComputationOutput<SensitivityOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let targets = if input.targets.is_empty() {
        default_targets(&input.base)
    } else {
        input.targets.clone()
    };
    let variations = if input.variations.is_empty() {
        default_variations()
    } else {
        input.variations.clone()
    };
    for v in &variations {
        if *v <= dec!(-1) {
            return Err(FeasibilityError::InvalidInput {
                field: "variations".into(),
                reason: format!("Variation {v} would remove the whole value"),
            });
        }
    }

    // Rejects an invalid base before fanning out
    let base = appraise(&input.base, &mut warnings)?;
    let base_investor_npv = base.investor.npv;
    let base_investor_irr = base.investor.irr.map(|i| i.annual);

    let grid: Vec<(usize, usize)> = (0..targets.len())
        .flat_map(|i| (0..variations.len()).map(move |j| (i, j)))
        .collect();

    let evaluate = |&(i, j): &(usize, usize)| -> Cell {
        evaluate_cell(&input.base, &targets[i], variations[j])
    };

    #[cfg(feature = "parallel")]
    let cells: Vec<Cell> = grid.par_iter().map(evaluate).collect();
    #[cfg(not(feature = "parallel"))]
    let cells: Vec<Cell> = grid.iter().map(evaluate).collect();

    let cols = variations.len();
    let mut npv_rows = Vec::with_capacity(targets.len());
    let mut irr_rows = Vec::with_capacity(targets.len());
    for (i, target) in targets.iter().enumerate() {
        let row = &cells[i * cols..(i + 1) * cols];
        for (cell, v) in row.iter().zip(&variations) {
            if let Some(reason) = &cell.failure {
                warnings.push(format!("{} at {v}: {reason}", target.name));
            }
        }
        npv_rows.push(PivotRow {
            target: target.name.clone(),
            values: row.iter().map(|c| c.npv).collect(),
        });
        irr_rows.push(PivotRow {
            target: target.name.clone(),
            values: row.iter().map(|c| c.irr).collect(),
        });
    }

    debug!(
        targets = targets.len(),
        variations = cols,
        cells = cells.len(),
        "sensitivity grid evaluated"
    );

    let output = SensitivityOutput {
        base_investor_npv,
        base_investor_irr,
        npv: PivotTable {
            metric: "investor_npv".into(),
            variations: variations.clone(),
            rows: npv_rows,
        },
        irr: PivotTable {
            metric: "investor_irr_annual".into(),
            variations: variations.clone(),
            rows: irr_rows,
        },
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "One-way sensitivity of investor NPV and IRR",
        &serde_json::json!({
            "targets": targets,
            "variations": variations,
        }),
        warnings,
        elapsed,
        output,
    ))
}

fn evaluate_cell(base: &ParameterSet, target: &SensitivityTarget, variation: Rate) -> Cell {
    let mut params = base.clone();
    let result = apply_lever(&mut params, &target.lever, variation)
        .and_then(|_| appraise(&params, &mut Vec::new()));
    match result {
        Ok(report) => Cell {
            npv: report.investor.npv,
            irr: report.investor.irr.map(|i| i.annual),
            failure: None,
        },
        Err(e) => Cell {
            npv: Metric::undefined(UndefinedReason::InvalidConfiguration),
            irr: Metric::undefined(UndefinedReason::InvalidConfiguration),
            failure: Some(e.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::*;

    fn base() -> ParameterSet {
        ParameterSet {
            horizon_months: 24,
            start_date: None,
            investment_schedule: vec![
                InvestmentItem {
                    label: "Land".into(),
                    amount: dec!(6000),
                    month: 0,
                    sensitivity_tag: Some("land".into()),
                },
                InvestmentItem {
                    label: "Works".into(),
                    amount: dec!(2000),
                    month: 2,
                    sensitivity_tag: Some("works".into()),
                },
            ],
            sales_plans: vec![SalesPlan {
                name: "Presale".into(),
                lot_count: 20,
                units_per_month: 2,
                down_payment: dec!(400),
                installment_amount: dec!(80),
                installment_count: 6,
                installment_frequency_months: 1,
                kind: SaleKind::Dynamic,
                start_month: 1,
            }],
            periodic_items: vec![PeriodicItem {
                label: Some("Marketing".into()),
                amount_or_percent: dec!(50),
                basis: ItemBasis::Fixed,
                start_month: 1,
                end_month: 24,
                kind: ItemKind::Expense,
            }],
            financing: FinancingTerms {
                debt_amount: dec!(3000),
                annual_debt_rate: dec!(0.12),
                term_months: 12,
                capitalization_period: 1,
                amortisation_system: AmortisationSystem::German,
                annual_equity_cost: dec!(0.18),
                tax_rate: dec!(0.30),
            },
            annual_price_growth: dec!(0.05),
        }
    }

    #[test]
    fn test_default_targets_include_capex_tags() {
        let names: Vec<String> = default_targets(&base()).into_iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec!["Price growth", "Debt rate", "Debt amount", "CAPEX: land", "CAPEX: works"]
        );
    }

    #[test]
    fn test_capex_tag_scales_only_matching_items() {
        let mut p = base();
        apply_lever(&mut p, &Lever::CapexTag { tag: "works".into() }, dec!(0.1)).unwrap();
        assert_eq!(p.investment_schedule[0].amount, dec!(6000));
        assert_eq!(p.investment_schedule[1].amount, dec!(2200));
        // Debt is not resized with CAPEX
        assert_eq!(p.financing.debt_amount, dec!(3000));
    }

    #[test]
    fn test_unknown_label_rejected() {
        let mut p = base();
        let err = apply_lever(&mut p, &Lever::PeriodicItem { label: "Nope".into() }, dec!(0.1));
        assert!(err.is_err());
    }

    #[test]
    fn test_velocity_never_drops_to_zero() {
        let mut p = base();
        p.sales_plans[0].units_per_month = 1;
        apply_lever(&mut p, &Lever::SalesVelocity, dec!(-0.9)).unwrap();
        assert_eq!(p.sales_plans[0].units_per_month, 1);
    }

    #[test]
    fn test_grid_shape_and_base_column() {
        let input = SensitivityInput {
            base: base(),
            targets: vec![],
            variations: vec![],
        };
        let out = run_sensitivity(&input).unwrap().result;
        assert_eq!(out.npv.cell_count(), 5 * 5);
        assert_eq!(out.irr.cell_count(), 5 * 5);
        for row in &out.npv.rows {
            assert_eq!(row.values[2], out.base_investor_npv, "{}", row.target);
        }
        for row in &out.irr.rows {
            assert_eq!(row.values[2], out.base_investor_irr, "{}", row.target);
        }
    }

    #[test]
    fn test_higher_debt_rate_lowers_investor_npv() {
        let input = SensitivityInput {
            base: base(),
            targets: vec![SensitivityTarget {
                name: "Debt rate".into(),
                lever: Lever::DebtRate,
            }],
            variations: vec![dec!(-0.2), dec!(0.2)],
        };
        let out = run_sensitivity(&input).unwrap().result;
        let low = *out.npv.cell("Debt rate", dec!(-0.2)).unwrap().value().unwrap();
        let high = *out.npv.cell("Debt rate", dec!(0.2)).unwrap().value().unwrap();
        assert!(low > high);
    }

    #[test]
    fn test_failed_cell_is_undefined_with_warning() {
        let mut p = base();
        p.financing.tax_rate = dec!(0.9);
        let input = SensitivityInput {
            base: p,
            targets: vec![SensitivityTarget {
                name: "Tax".into(),
                lever: Lever::TaxRate,
            }],
            variations: vec![Decimal::ZERO, dec!(0.2)],
        };
        let output = run_sensitivity(&input).unwrap();
        let row = &output.result.npv.rows[0];
        assert!(row.values[0].is_defined());
        assert_eq!(row.values[1].reason(), Some(UndefinedReason::InvalidConfiguration));
        assert!(output.warnings.iter().any(|w| w.starts_with("Tax at")));
    }

    #[test]
    fn test_target_serde_shape() {
        let t = SensitivityTarget {
            name: "Roads".into(),
            lever: Lever::CapexTag { tag: "roads".into() },
        };
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "name": "Roads", "lever": "capex_tag", "tag": "roads" })
        );
    }
}

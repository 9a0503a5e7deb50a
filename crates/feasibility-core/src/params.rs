use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::FeasibilityError;
use crate::types::{Money, Month, Rate};
use crate::FeasibilityResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Root configuration of a single appraisal run.
///
/// Built once per scenario and treated as read-only by every component;
/// the sensitivity driver clones it for each perturbation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    /// Number of months modelled after month 0
    pub horizon_months: Month,
    /// Calendar date of month 0, used only to label ledger rows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    /// CAPEX events; items beyond the horizon are ignored by the ledger
    pub investment_schedule: Vec<InvestmentItem>,
    /// Lot-sale absorption plans
    #[serde(default)]
    pub sales_plans: Vec<SalesPlan>,
    /// Recurring income and expense rules, evaluated in list order per basis
    #[serde(default)]
    pub periodic_items: Vec<PeriodicItem>,
    pub financing: FinancingTerms,
    /// Annual escalation applied to down payments and installments
    #[serde(default)]
    pub annual_price_growth: Rate,
}

/// A capital expenditure event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentItem {
    pub label: String,
    /// Positive outlay; the ledger records it as a negative cash flow
    pub amount: Money,
    pub month: Month,
    /// Groups items for CAPEX sensitivity (e.g. "urbanisation")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensitivity_tag: Option<String>,
}

/// How a sales plan releases its lots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleKind {
    /// Sells `units_per_month` every month from `start_month` until sold out
    #[default]
    Dynamic,
    /// Sells the whole plan in `start_month`
    Scheduled,
}

/// A lot-sale plan: price terms plus an absorption pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesPlan {
    pub name: String,
    pub lot_count: u32,
    /// Absorption velocity; ignored for scheduled plans
    #[serde(default)]
    pub units_per_month: u32,
    /// Down payment per lot at month-1 prices
    pub down_payment: Money,
    /// Installment per lot at month-1 prices
    #[serde(default)]
    pub installment_amount: Money,
    #[serde(default)]
    pub installment_count: u32,
    #[serde(default = "default_installment_frequency")]
    pub installment_frequency_months: u32,
    #[serde(default)]
    pub kind: SaleKind,
    #[serde(default = "default_start_month")]
    pub start_month: Month,
}

fn default_installment_frequency() -> u32 {
    1
}

fn default_start_month() -> Month {
    1
}

/// What a periodic item's `amount_or_percent` is applied to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemBasis {
    /// Flat monthly amount
    #[default]
    Fixed,
    /// Share of the month's revenue (0.05 = 5%)
    PercentOfRevenue,
    /// Amount per lot still in inventory at month end
    PerUnitInInventory,
    /// Share of the month's EBITDA before this line
    PercentOfProfit,
}

impl ItemBasis {
    /// Evaluation rank inside a month. Lower ranks are applied first.
    pub fn evaluation_rank(&self) -> u8 {
        match self {
            ItemBasis::Fixed => 0,
            ItemBasis::PercentOfRevenue => 1,
            ItemBasis::PerUnitInInventory => 2,
            ItemBasis::PercentOfProfit => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    Income,
    Expense,
}

/// A recurring income or expense rule, active for `start_month..=end_month`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodicItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub amount_or_percent: Decimal,
    #[serde(default)]
    pub basis: ItemBasis,
    pub start_month: Month,
    pub end_month: Month,
    pub kind: ItemKind,
}

impl PeriodicItem {
    pub fn is_active(&self, month: Month) -> bool {
        self.start_month <= month && month <= self.end_month
    }
}

/// Repayment profile of the construction loan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AmortisationSystem {
    /// Constant principal per payment event, declining interest
    #[default]
    German,
    /// Constant total payment per payment event (annuity)
    French,
}

/// Debt facility, cost of equity and tax terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancingTerms {
    /// Drawn in full at month 0
    pub debt_amount: Money,
    /// Effective annual rate (EAR)
    pub annual_debt_rate: Rate,
    /// Loan term in months; zero or negative means the loan is never amortised
    pub term_months: i32,
    /// Months between payment events (1, 3, 6 or 12); zero or negative is treated as 1
    #[serde(default = "default_capitalization_period")]
    pub capitalization_period: i32,
    #[serde(default)]
    pub amortisation_system: AmortisationSystem,
    /// Effective annual cost of equity (EAR)
    pub annual_equity_cost: Rate,
    pub tax_rate: Rate,
}

fn default_capitalization_period() -> i32 {
    1
}

// ---------------------------------------------------------------------------
// Derived quantities
// ---------------------------------------------------------------------------

impl ParameterSet {
    /// Sum of every CAPEX item, including items scheduled after the horizon.
    pub fn total_investment(&self) -> Money {
        self.investment_schedule.iter().map(|i| i.amount).sum()
    }

    /// Equity the sponsor must fund on top of the debt facility.
    pub fn equity_required(&self) -> Money {
        self.total_investment() - self.financing.debt_amount
    }

    /// Debt as a share of total invested capital; zero without investment.
    pub fn debt_share(&self) -> Rate {
        let total = self.total_investment();
        if total <= Decimal::ZERO {
            Decimal::ZERO
        } else {
            self.financing.debt_amount / total
        }
    }

    /// Lots across every plan, saturating at `u32::MAX`.
    pub fn total_lots(&self) -> u32 {
        self.sales_plans
            .iter()
            .fold(0u32, |acc, p| acc.saturating_add(p.lot_count))
    }

    /// Distinct CAPEX sensitivity tags in schedule order of first appearance.
    pub fn sensitivity_tags(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.investment_schedule
            .iter()
            .filter_map(|i| i.sensitivity_tag.clone())
            .filter(|t| seen.insert(t.clone()))
            .collect()
    }

    /// Check the parameter set for values the engine cannot model.
    ///
    /// Hard errors are returned; questionable but computable values are
    /// reported through `warnings`.
    pub fn validate(&self, warnings: &mut Vec<String>) -> FeasibilityResult<()> {
        let fin = &self.financing;

        if fin.tax_rate < Decimal::ZERO || fin.tax_rate > Decimal::ONE {
            return Err(FeasibilityError::InvalidInput {
                field: "financing.tax_rate".into(),
                reason: "Tax rate must be between 0 and 1".into(),
            });
        }
        if fin.annual_debt_rate <= -Decimal::ONE {
            return Err(FeasibilityError::InvalidInput {
                field: "financing.annual_debt_rate".into(),
                reason: "Debt rate must be greater than -100%".into(),
            });
        }
        if fin.annual_equity_cost <= -Decimal::ONE {
            return Err(FeasibilityError::InvalidInput {
                field: "financing.annual_equity_cost".into(),
                reason: "Cost of equity must be greater than -100%".into(),
            });
        }
        if fin.debt_amount < Decimal::ZERO {
            return Err(FeasibilityError::InvalidInput {
                field: "financing.debt_amount".into(),
                reason: "Debt amount cannot be negative".into(),
            });
        }
        if self.annual_price_growth <= -Decimal::ONE {
            return Err(FeasibilityError::InvalidInput {
                field: "annual_price_growth".into(),
                reason: "Price growth must be greater than -100%".into(),
            });
        }

        for item in &self.investment_schedule {
            if item.amount < Decimal::ZERO {
                return Err(FeasibilityError::InvalidInput {
                    field: format!("investment_schedule:{}", item.label),
                    reason: "CAPEX amounts are outlays and must be non-negative".into(),
                });
            }
            if item.month > self.horizon_months {
                warnings.push(format!(
                    "CAPEX item '{}' at month {} lies beyond the {}-month horizon and is ignored",
                    item.label, item.month, self.horizon_months
                ));
            }
        }

        if self.total_lots() == u32::MAX {
            return Err(FeasibilityError::InvalidInput {
                field: "sales_plans".into(),
                reason: format!("Total lot count must be below {}", u32::MAX),
            });
        }

        for plan in &self.sales_plans {
            if plan.installment_count > 0 && plan.installment_frequency_months == 0 {
                return Err(FeasibilityError::InvalidInput {
                    field: format!("sales_plans:{}.installment_frequency_months", plan.name),
                    reason: "Installment frequency must be at least one month".into(),
                });
            }
            if plan.kind == SaleKind::Dynamic && plan.lot_count > 0 && plan.units_per_month == 0 {
                return Err(FeasibilityError::InvalidInput {
                    field: format!("sales_plans:{}.units_per_month", plan.name),
                    reason: "Dynamic plans need a positive absorption velocity".into(),
                });
            }
            if plan.start_month == 0 {
                warnings.push(format!(
                    "Sales plan '{}' starts at month 0; sales begin at month 1",
                    plan.name
                ));
            }
            if plan.start_month > self.horizon_months && plan.lot_count > 0 {
                warnings.push(format!(
                    "Sales plan '{}' starts after the horizon and never sells",
                    plan.name
                ));
            }
        }

        for item in &self.periodic_items {
            if item.start_month > item.end_month {
                warnings.push(format!(
                    "Periodic item '{}' has start month {} after end month {} and is never active",
                    item.label.as_deref().unwrap_or("unnamed"),
                    item.start_month,
                    item.end_month
                ));
            }
        }

        if !matches!(fin.capitalization_period, 1 | 3 | 6 | 12) {
            warnings.push(format!(
                "Capitalisation period of {} months is non-standard (expected 1, 3, 6 or 12)",
                fin.capitalization_period
            ));
        }
        if fin.debt_amount > self.total_investment() {
            warnings.push("Debt exceeds total investment; equity requirement is negative".into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample() -> ParameterSet {
        ParameterSet {
            horizon_months: 24,
            start_date: None,
            investment_schedule: vec![
                InvestmentItem {
                    label: "Land".into(),
                    amount: dec!(600),
                    month: 0,
                    sensitivity_tag: Some("land".into()),
                },
                InvestmentItem {
                    label: "Roads".into(),
                    amount: dec!(400),
                    month: 30,
                    sensitivity_tag: Some("works".into()),
                },
            ],
            sales_plans: vec![],
            periodic_items: vec![],
            financing: FinancingTerms {
                debt_amount: dec!(250),
                annual_debt_rate: dec!(0.10),
                term_months: 12,
                capitalization_period: 1,
                amortisation_system: AmortisationSystem::German,
                annual_equity_cost: dec!(0.15),
                tax_rate: dec!(0.25),
            },
            annual_price_growth: Decimal::ZERO,
        }
    }

    #[test]
    fn test_capital_summary() {
        let p = sample();
        assert_eq!(p.total_investment(), dec!(1000));
        assert_eq!(p.equity_required(), dec!(750));
        assert_eq!(p.debt_share(), dec!(0.25));
    }

    #[test]
    fn test_capex_beyond_horizon_warns() {
        let mut warnings = Vec::new();
        sample().validate(&mut warnings).unwrap();
        assert!(warnings.iter().any(|w| w.contains("Roads")));
    }

    #[test]
    fn test_total_lots_overflow_rejected() {
        let plan = |lots| SalesPlan {
            name: "Block".into(),
            lot_count: lots,
            units_per_month: 1,
            down_payment: dec!(10),
            installment_amount: Decimal::ZERO,
            installment_count: 0,
            installment_frequency_months: 1,
            kind: SaleKind::Dynamic,
            start_month: 1,
        };
        let mut p = sample();
        p.sales_plans = vec![plan(u32::MAX - 1), plan(5)];
        assert_eq!(p.total_lots(), u32::MAX);
        assert!(matches!(
            p.validate(&mut Vec::new()),
            Err(FeasibilityError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_tax_rate_out_of_range() {
        let mut p = sample();
        p.financing.tax_rate = dec!(1.5);
        assert!(p.validate(&mut Vec::new()).is_err());
    }

    #[test]
    fn test_sensitivity_tags_are_distinct() {
        let mut p = sample();
        p.investment_schedule.push(InvestmentItem {
            label: "Roads phase 2".into(),
            amount: dec!(100),
            month: 6,
            sensitivity_tag: Some("works".into()),
        });
        assert_eq!(p.sensitivity_tags(), vec!["land".to_string(), "works".to_string()]);
    }

    #[test]
    fn test_deserialise_with_defaults() {
        let json = r#"{
            "horizon_months": 12,
            "investment_schedule": [{"label": "Land", "amount": "100", "month": 0}],
            "sales_plans": [{"name": "A", "lot_count": 4, "units_per_month": 1, "down_payment": "10"}],
            "financing": {
                "debt_amount": "0", "annual_debt_rate": "0.1", "term_months": 12,
                "annual_equity_cost": "0.12", "tax_rate": "0.3"
            }
        }"#;
        let p: ParameterSet = serde_json::from_str(json).unwrap();
        assert_eq!(p.sales_plans[0].kind, SaleKind::Dynamic);
        assert_eq!(p.sales_plans[0].start_month, 1);
        assert_eq!(p.financing.capitalization_period, 1);
        assert!(p.periodic_items.is_empty());
    }
}

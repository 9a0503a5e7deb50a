//! Monthly evaluation of recurring income and expense rules.
//!
//! Expense lines are applied in basis order Fixed, PercentOfRevenue,
//! PerUnitInInventory, PercentOfProfit, keeping input order within a basis.
//! A PercentOfProfit line is charged on the EBITDA accumulated before that
//! line (floored at zero), so a later profit-based line sees the earlier
//! ones. This ordering is part of the contract: reordering changes results.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::params::{ItemBasis, ItemKind, PeriodicItem};
use crate::types::{Money, Month};

/// Result of evaluating the periodic items for one month
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodicAmounts {
    pub other_income: Money,
    /// Positive magnitude of the month's dynamic operating cost
    pub operating_cost: Money,
}

/// Inputs that percentage and per-unit bases are applied to
#[derive(Debug, Clone, Copy)]
pub struct MonthDrivers {
    pub month: Month,
    /// Down payments plus installments collected this month
    pub sales_collections: Money,
    /// Lots still unsold at the end of the month
    pub inventory_lots: u32,
}

pub struct PeriodicItemEvaluator<'a> {
    income: Vec<&'a PeriodicItem>,
    expenses: Vec<&'a PeriodicItem>,
}

impl<'a> PeriodicItemEvaluator<'a> {
    pub fn new(items: &'a [PeriodicItem], warnings: &mut Vec<String>) -> Self {
        let mut income = Vec::new();
        let mut expenses = Vec::new();
        for item in items {
            match item.kind {
                ItemKind::Income => {
                    if item.basis == ItemBasis::PercentOfProfit {
                        warnings.push(format!(
                            "Income item '{}' uses a profit basis and contributes nothing",
                            item.label.as_deref().unwrap_or("unnamed")
                        ));
                    }
                    income.push(item);
                }
                ItemKind::Expense => expenses.push(item),
            }
        }
        // sort_by_key is stable, so input order survives within a basis
        expenses.sort_by_key(|i| i.basis.evaluation_rank());
        Self { income, expenses }
    }

    pub fn evaluate(&self, drivers: &MonthDrivers) -> PeriodicAmounts {
        let inventory = Decimal::from(drivers.inventory_lots);

        let other_income: Money = self
            .income
            .iter()
            .filter(|i| i.is_active(drivers.month))
            .map(|i| match i.basis {
                ItemBasis::Fixed => i.amount_or_percent,
                ItemBasis::PercentOfRevenue => drivers.sales_collections * i.amount_or_percent,
                ItemBasis::PerUnitInInventory => inventory * i.amount_or_percent,
                ItemBasis::PercentOfProfit => Decimal::ZERO,
            })
            .sum();

        let total_revenue = drivers.sales_collections + other_income;
        let mut cost = Decimal::ZERO;
        for item in self.expenses.iter().filter(|i| i.is_active(drivers.month)) {
            cost += match item.basis {
                ItemBasis::Fixed => item.amount_or_percent,
                ItemBasis::PercentOfRevenue => total_revenue * item.amount_or_percent,
                ItemBasis::PerUnitInInventory => inventory * item.amount_or_percent,
                ItemBasis::PercentOfProfit => {
                    let ebitda_before_line = total_revenue - cost;
                    ebitda_before_line.max(Decimal::ZERO) * item.amount_or_percent
                }
            };
        }

        PeriodicAmounts {
            other_income,
            operating_cost: cost,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn expense(amount: Decimal, basis: ItemBasis) -> PeriodicItem {
        PeriodicItem {
            label: None,
            amount_or_percent: amount,
            basis,
            start_month: 1,
            end_month: 12,
            kind: ItemKind::Expense,
        }
    }

    fn drivers(collections: Decimal, inventory: u32) -> MonthDrivers {
        MonthDrivers {
            month: 1,
            sales_collections: collections,
            inventory_lots: inventory,
        }
    }

    #[test]
    fn test_profit_line_sees_earlier_lines() {
        // Listed out of order on purpose: the profit line is evaluated last
        let items = vec![
            expense(dec!(0.10), ItemBasis::PercentOfProfit),
            expense(dec!(100), ItemBasis::Fixed),
            expense(dec!(0.05), ItemBasis::PercentOfRevenue),
            expense(dec!(2), ItemBasis::PerUnitInInventory),
        ];
        let eval = PeriodicItemEvaluator::new(&items, &mut Vec::new());
        let out = eval.evaluate(&drivers(dec!(1000), 50));
        // 100 + 50 + 100 = 250; profit line on 750 = 75
        assert_eq!(out.operating_cost, dec!(325));
    }

    #[test]
    fn test_profit_line_floors_negative_ebitda() {
        let items = vec![
            expense(dec!(500), ItemBasis::Fixed),
            expense(dec!(0.20), ItemBasis::PercentOfProfit),
        ];
        let eval = PeriodicItemEvaluator::new(&items, &mut Vec::new());
        let out = eval.evaluate(&drivers(dec!(100), 0));
        assert_eq!(out.operating_cost, dec!(500));
    }

    #[test]
    fn test_inactive_items_skipped() {
        let mut late = expense(dec!(100), ItemBasis::Fixed);
        late.start_month = 6;
        let eval = PeriodicItemEvaluator::new(std::slice::from_ref(&late), &mut Vec::new());
        assert_eq!(eval.evaluate(&drivers(dec!(0), 0)), PeriodicAmounts::default());
    }

    #[test]
    fn test_income_bases() {
        let items = vec![
            PeriodicItem {
                label: Some("Rent".into()),
                amount_or_percent: dec!(20),
                basis: ItemBasis::Fixed,
                start_month: 1,
                end_month: 12,
                kind: ItemKind::Income,
            },
            PeriodicItem {
                label: Some("Fees".into()),
                amount_or_percent: dec!(0.01),
                basis: ItemBasis::PercentOfRevenue,
                start_month: 1,
                end_month: 12,
                kind: ItemKind::Income,
            },
            PeriodicItem {
                label: Some("Bonus".into()),
                amount_or_percent: dec!(0.5),
                basis: ItemBasis::PercentOfProfit,
                start_month: 1,
                end_month: 12,
                kind: ItemKind::Income,
            },
        ];
        let mut warnings = Vec::new();
        let eval = PeriodicItemEvaluator::new(&items, &mut warnings);
        let out = eval.evaluate(&drivers(dec!(1000), 3));
        assert_eq!(out.other_income, dec!(30));
        assert_eq!(warnings.len(), 1);
    }
}

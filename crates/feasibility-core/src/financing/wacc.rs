use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::FeasibilityError;
use crate::params::ParameterSet;
use crate::types::{with_metadata, ComputationOutput, Rate};
use crate::FeasibilityResult;

/// Input parameters for the project discount rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaccInput {
    /// Effective annual cost of equity
    pub cost_of_equity: Rate,
    /// Effective annual pre-tax cost of debt
    pub cost_of_debt: Rate,
    /// Income tax rate applied to the interest shield
    pub tax_rate: Rate,
    /// Debt share of total invested capital
    pub debt_weight: Rate,
}

impl WaccInput {
    /// Weights come from the debt facility over total CAPEX.
    pub fn from_parameters(params: &ParameterSet) -> Self {
        Self {
            cost_of_equity: params.financing.annual_equity_cost,
            cost_of_debt: params.financing.annual_debt_rate,
            tax_rate: params.financing.tax_rate,
            debt_weight: params.debt_share(),
        }
    }
}

/// Output of the WACC calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaccOutput {
    pub wacc: Rate,
    pub cost_of_equity: Rate,
    pub after_tax_cost_of_debt: Rate,
    pub debt_weight: Rate,
    pub equity_weight: Rate,
}

/// Weighted average cost of capital.
///
/// WACC = (1 - Wd) * Ke + Wd * Kd * (1 - t); equals Ke when there is no debt.
pub fn calculate_wacc(input: &WaccInput) -> FeasibilityResult<ComputationOutput<WaccOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_wacc_input(input)?;

    let after_tax_cost_of_debt = input.cost_of_debt * (Decimal::ONE - input.tax_rate);
    let wacc = wacc_rate(input);

    if input.debt_weight > dec!(0.8) {
        warnings.push(format!(
            "Debt funds {:.1}% of the investment; equity returns will be highly levered",
            input.debt_weight * dec!(100)
        ));
    }
    if after_tax_cost_of_debt > input.cost_of_equity {
        warnings.push("After-tax cost of debt exceeds cost of equity; verify financing terms".into());
    }

    let output = WaccOutput {
        wacc,
        cost_of_equity: input.cost_of_equity,
        after_tax_cost_of_debt,
        debt_weight: input.debt_weight,
        equity_weight: Decimal::ONE - input.debt_weight,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "WACC from debt share of invested capital",
        input,
        warnings,
        elapsed,
        output,
    ))
}

/// The bare WACC figure, without validation or envelope.
pub fn wacc_rate(input: &WaccInput) -> Rate {
    if input.debt_weight <= Decimal::ZERO {
        return input.cost_of_equity;
    }
    (Decimal::ONE - input.debt_weight) * input.cost_of_equity
        + input.debt_weight * input.cost_of_debt * (Decimal::ONE - input.tax_rate)
}

fn validate_wacc_input(input: &WaccInput) -> FeasibilityResult<()> {
    if input.tax_rate < Decimal::ZERO || input.tax_rate > Decimal::ONE {
        return Err(FeasibilityError::InvalidInput {
            field: "tax_rate".into(),
            reason: "Tax rate must be between 0 and 1".into(),
        });
    }
    if input.debt_weight < Decimal::ZERO {
        return Err(FeasibilityError::InvalidInput {
            field: "debt_weight".into(),
            reason: "Debt weight cannot be negative".into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample() -> WaccInput {
        WaccInput {
            cost_of_equity: dec!(0.18),
            cost_of_debt: dec!(0.12),
            tax_rate: dec!(0.30),
            debt_weight: dec!(0.6),
        }
    }

    #[test]
    fn test_wacc_blend() {
        let out = calculate_wacc(&sample()).unwrap().result;
        // 0.4 * 0.18 + 0.6 * 0.12 * 0.7 = 0.072 + 0.0504
        assert_eq!(out.wacc, dec!(0.1224));
        assert_eq!(out.after_tax_cost_of_debt, dec!(0.084));
        assert_eq!(out.equity_weight, dec!(0.4));
    }

    #[test]
    fn test_wacc_without_debt_is_cost_of_equity() {
        let mut input = sample();
        input.debt_weight = Decimal::ZERO;
        assert_eq!(wacc_rate(&input), dec!(0.18));
    }

    #[test]
    fn test_wacc_invalid_tax() {
        let mut input = sample();
        input.tax_rate = dec!(-0.1);
        assert!(calculate_wacc(&input).is_err());
    }
}

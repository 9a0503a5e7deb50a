use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::appraisal::appraise;
use crate::error::FeasibilityError;
use crate::params::ParameterSet;
use crate::types::*;
use crate::FeasibilityResult;

/// An alternative parameter set evaluated against the base case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedScenario {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<Rate>,
    pub parameters: ParameterSet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioInput {
    pub base: ParameterSet,
    pub scenarios: Vec<NamedScenario>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probability: Option<Rate>,
    pub investor_npv: Metric<Money>,
    pub investor_irr: Metric<Rate>,
    pub moic: Metric<Multiple>,
    pub deviation_from_base: Metric<Money>,
    pub deviation_pct: Metric<Rate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioOutput {
    pub base_investor_npv: Metric<Money>,
    pub results: Vec<ScenarioResult>,
    /// Present only when every scenario carries a probability
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probability_weighted_npv: Option<Metric<Money>>,
}

/// Evaluate named scenarios and compare their investor NPV to the base case.
///
/// Probabilities are optional, but if any scenario has one then all must,
/// and they must sum to 1.0 within 0.001.
pub fn compare_scenarios(input: &ScenarioInput) -> FeasibilityResult<ComputationOutput<ScenarioOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.scenarios.is_empty() {
        return Err(FeasibilityError::InvalidInput {
            field: "scenarios".into(),
            reason: "At least one scenario required".into(),
        });
    }
    let probabilities = validate_probabilities(&input.scenarios, &mut warnings)?;

    let base = appraise(&input.base, &mut warnings)?;
    let base_npv = base.investor.npv;

    let mut results = Vec::with_capacity(input.scenarios.len());
    for scenario in &input.scenarios {
        let mut scenario_warnings = Vec::new();
        let report = appraise(&scenario.parameters, &mut scenario_warnings).map_err(|e| {
            FeasibilityError::InvalidInput {
                field: format!("scenario:{}", scenario.name),
                reason: e.to_string(),
            }
        })?;
        warnings.extend(
            scenario_warnings
                .into_iter()
                .map(|w| format!("{}: {w}", scenario.name)),
        );

        let npv = report.investor.npv;
        let (deviation, deviation_pct) = match (npv.value(), base_npv.value()) {
            (Some(v), Some(b)) => {
                let d = *v - *b;
                let pct = if b.is_zero() {
                    Metric::undefined(UndefinedReason::InvalidConfiguration)
                } else {
                    Metric::Value(d / b.abs())
                };
                (Metric::Value(d), pct)
            }
            _ => (
                Metric::undefined(UndefinedReason::InvalidConfiguration),
                Metric::undefined(UndefinedReason::InvalidConfiguration),
            ),
        };

        results.push(ScenarioResult {
            name: scenario.name.clone(),
            probability: scenario.probability,
            investor_npv: npv,
            investor_irr: report.investor.irr.map(|i| i.annual),
            moic: report.moic,
            deviation_from_base: deviation,
            deviation_pct,
        });
    }

    let probability_weighted_npv = probabilities.map(|probs| {
        let mut weighted = Decimal::ZERO;
        for (p, r) in probs.iter().zip(&results) {
            match r.investor_npv.value() {
                Some(v) => weighted += *p * *v,
                None => return r.investor_npv,
            }
        }
        Metric::Value(weighted)
    });

    let output = ScenarioOutput {
        base_investor_npv: base_npv,
        results,
        probability_weighted_npv,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Scenario comparison of investor NPV, IRR and MOIC",
        &serde_json::json!({
            "num_scenarios": input.scenarios.len(),
            "scenarios": input.scenarios.iter().map(|s| &s.name).collect::<Vec<_>>(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

fn validate_probabilities(
    scenarios: &[NamedScenario],
    warnings: &mut Vec<String>,
) -> FeasibilityResult<Option<Vec<Rate>>> {
    let given: Vec<Rate> = scenarios.iter().filter_map(|s| s.probability).collect();
    if given.is_empty() {
        return Ok(None);
    }
    if given.len() != scenarios.len() {
        return Err(FeasibilityError::InvalidInput {
            field: "probabilities".into(),
            reason: "Either every scenario or none carries a probability".into(),
        });
    }
    for s in scenarios {
        let p = s.probability.unwrap_or_default();
        if p < Decimal::ZERO || p > Decimal::ONE {
            return Err(FeasibilityError::InvalidInput {
                field: format!("scenario:{} probability", s.name),
                reason: "Probability must be between 0 and 1".into(),
            });
        }
    }

    let total: Decimal = given.iter().sum();
    let tolerance = dec!(0.001);
    if (total - Decimal::ONE).abs() > tolerance {
        return Err(FeasibilityError::InvalidInput {
            field: "probabilities".into(),
            reason: format!("Probabilities must sum to 1.0 (got {total})"),
        });
    }
    if total != Decimal::ONE {
        warnings.push(format!("Probabilities sum to {total}; treated as approximately 1.0"));
    }
    Ok(Some(given))
}

use napi::Result as NapiResult;
use napi_derive::napi;
use rust_decimal::Decimal;
use serde::Deserialize;

use feasibility_core::time_value::{self, RateBasis};
use feasibility_core::Metric;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

// ---------------------------------------------------------------------------
// Appraisal
// ---------------------------------------------------------------------------

#[napi]
pub fn evaluate_project(input_json: String) -> NapiResult<String> {
    let params: feasibility_core::params::ParameterSet =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = feasibility_core::appraisal::evaluate_project(&params).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn build_monthly_ledger(input_json: String) -> NapiResult<String> {
    let params: feasibility_core::params::ParameterSet =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        feasibility_core::ledger::model::build_monthly_ledger(&params).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Financing
// ---------------------------------------------------------------------------

#[napi]
pub fn build_debt_schedule(input_json: String) -> NapiResult<String> {
    let input: feasibility_core::financing::amortisation::DebtScheduleInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = feasibility_core::financing::amortisation::build_debt_schedule(&input)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn calculate_wacc(input_json: String) -> NapiResult<String> {
    let input: feasibility_core::financing::wacc::WaccInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = feasibility_core::financing::wacc::calculate_wacc(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Sales
// ---------------------------------------------------------------------------

#[napi]
pub fn build_absorption(input_json: String) -> NapiResult<String> {
    let input: feasibility_core::sales::absorption::AbsorptionInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        feasibility_core::sales::absorption::build_absorption(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[napi]
pub fn run_sensitivity(input_json: String) -> NapiResult<String> {
    let input: feasibility_core::scenarios::sensitivity::SensitivityInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        feasibility_core::scenarios::sensitivity::run_sensitivity(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn compare_scenarios(input_json: String) -> NapiResult<String> {
    let input: feasibility_core::scenarios::scenario::ScenarioInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        feasibility_core::scenarios::scenario::compare_scenarios(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Time value
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct CashFlowInput {
    cash_flows: Vec<Decimal>,
    #[serde(default)]
    rate: Option<Decimal>,
    #[serde(default)]
    basis: RateBasis,
    #[serde(default = "one_month")]
    period_months: u32,
}

fn one_month() -> u32 {
    1
}

#[napi]
pub fn calculate_npv(input_json: String) -> NapiResult<String> {
    let input: CashFlowInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let rate = input
        .rate
        .ok_or_else(|| to_napi_error("rate is required for NPV"))?;
    let npv = time_value::npv(&input.cash_flows, rate, input.basis, input.period_months)
        .map_err(to_napi_error)?;
    serde_json::to_string(&serde_json::json!({ "npv": npv })).map_err(to_napi_error)
}

#[napi]
pub fn calculate_irr(input_json: String) -> NapiResult<String> {
    let input: CashFlowInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let irr = Metric::from_result(time_value::irr(&input.cash_flows)).map_err(to_napi_error)?;
    serde_json::to_string(&serde_json::json!({ "irr": irr })).map_err(to_napi_error)
}

#[napi]
pub fn calculate_payback(input_json: String) -> NapiResult<String> {
    let input: CashFlowInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let simple = Metric::from_result(time_value::payback(&input.cash_flows)).map_err(to_napi_error)?;
    let discounted = match input.rate {
        Some(rate) => Some(
            Metric::from_result(time_value::discounted_payback(&input.cash_flows, rate))
                .map_err(to_napi_error)?,
        ),
        None => None,
    };
    serde_json::to_string(&serde_json::json!({
        "payback_months": simple,
        "discounted_payback_months": discounted,
    }))
    .map_err(to_napi_error)
}

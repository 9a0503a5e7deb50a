use clap::Args;
use serde_json::Value;

use feasibility_core::appraisal::evaluate_project;
use feasibility_core::ledger::model::build_monthly_ledger;

use super::ParamsSource;

/// Arguments for the full feasibility appraisal
#[derive(Args)]
pub struct EvaluateArgs {
    #[command(flatten)]
    pub source: ParamsSource,

    /// Omit the monthly ledger and debt schedule from the report
    #[arg(long)]
    pub summary: bool,
}

pub fn run_evaluate(args: EvaluateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let params = args.source.load()?;
    let result = evaluate_project(&params)?;
    let mut value = serde_json::to_value(result)?;
    if args.summary {
        if let Some(Value::Object(report)) = value.get_mut("result") {
            report.remove("ledger");
            report.remove("debt_schedule");
        }
    }
    Ok(value)
}

/// Arguments for the monthly ledger alone
#[derive(Args)]
pub struct LedgerArgs {
    #[command(flatten)]
    pub source: ParamsSource,
}

pub fn run_ledger(args: LedgerArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let params = args.source.load()?;
    let result = build_monthly_ledger(&params)?;
    Ok(serde_json::to_value(result)?)
}

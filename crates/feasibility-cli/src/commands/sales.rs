use clap::Args;
use serde_json::Value;

use feasibility_core::sales::absorption::{build_absorption, AbsorptionInput};

use super::ParamsSource;

/// Arguments for the lot absorption schedule
#[derive(Args)]
pub struct AbsorptionArgs {
    #[command(flatten)]
    pub source: ParamsSource,
}

pub fn run_absorption(args: AbsorptionArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let params = args.source.load()?;
    let result = build_absorption(&AbsorptionInput::from_parameters(&params))?;
    Ok(serde_json::to_value(result)?)
}

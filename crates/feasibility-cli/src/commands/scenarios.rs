use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use feasibility_core::scenarios::scenario::{compare_scenarios, ScenarioInput};
use feasibility_core::scenarios::sensitivity::{run_sensitivity, SensitivityInput};

use super::ParamsSource;
use crate::input;

/// Arguments for the one-way sensitivity grid
#[derive(Args)]
pub struct SensitivityArgs {
    // A parameter set, or a full sensitivity document with a "base" key
    #[command(flatten)]
    pub source: ParamsSource,

    /// Relative variations (comma-separated, e.g. "-0.2,-0.1,0,0.1,0.2")
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub variations: Option<Vec<Decimal>>,
}

pub fn run_sensitivity_grid(args: SensitivityArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let document = args.source.read_value()?;
    let mut sens_input: SensitivityInput = if document.get("base").is_some() {
        serde_json::from_value(document)?
    } else {
        SensitivityInput {
            base: serde_json::from_value(document)?,
            targets: Vec::new(),
            variations: Vec::new(),
        }
    };
    if let Some(variations) = args.variations {
        sens_input.variations = variations;
    }

    let result = run_sensitivity(&sens_input)?;
    Ok(serde_json::to_value(result)?)
}

/// Arguments for scenario comparison
#[derive(Args)]
pub struct ScenarioArgs {
    /// Path to JSON with "base" and "scenarios"
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_scenarios(args: ScenarioArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let scenario_input: ScenarioInput = if let Some(ref path) = args.input {
        input::read_json(path)?
    } else if let Some(data) = input::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input <file.json> or stdin required for scenario comparison".into());
    };
    let result = compare_scenarios(&scenario_input)?;
    Ok(serde_json::to_value(result)?)
}

use clap::{Args, Subcommand};
use serde_json::{json, Value};

use feasibility_core::params::ParameterSet;
use feasibility_core::store::{load_parameters, save_parameters, JsonDirStore};

use crate::input;

/// Arguments for the parameter store
#[derive(Args)]
pub struct StoreArgs {
    /// Directory holding one JSON document per project
    #[arg(long, global = true, default_value = ".lfa-store")]
    pub store_dir: String,

    #[command(subcommand)]
    pub action: StoreAction,
}

#[derive(Subcommand)]
pub enum StoreAction {
    /// Validate a parameter set and save it under a project id
    Put {
        project: String,
        /// Path to the parameter set (stdin if omitted)
        #[arg(long)]
        input: Option<String>,
    },
    /// Print the parameter set saved under a project id
    Get { project: String },
}

pub fn run_store(args: StoreArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let store = JsonDirStore::new(&args.store_dir);
    match args.action {
        StoreAction::Put { project, input: source } => {
            let params: ParameterSet = if let Some(ref path) = source {
                input::read_json(path)?
            } else if let Some(data) = input::read_stdin()? {
                serde_json::from_value(data)?
            } else {
                return Err("--input <file.json> or stdin required".into());
            };
            let mut warnings = Vec::new();
            params.validate(&mut warnings)?;
            save_parameters(&store, &project, &params)?;
            Ok(json!({
                "result": {
                    "project": project,
                    "stored_in": store.root().display().to_string(),
                },
                "warnings": warnings,
            }))
        }
        StoreAction::Get { project } => {
            let params = load_parameters(&store, &project)?;
            Ok(json!({ "result": params }))
        }
    }
}

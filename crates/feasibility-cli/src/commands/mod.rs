pub mod evaluate;
pub mod financing;
pub mod sales;
pub mod scenarios;
pub mod store;
pub mod time_value;

use clap::Args;
use serde_json::Value;
use tracing::debug;

use feasibility_core::params::ParameterSet;
use feasibility_core::store::{load_parameters, JsonDirStore};

use crate::input;

/// Where to read a parameter set from
#[derive(Args)]
pub struct ParamsSource {
    /// Path to a JSON parameter set
    #[arg(long)]
    pub input: Option<String>,

    /// Directory of a JSON document store
    #[arg(long, requires = "project")]
    pub store_dir: Option<String>,

    /// Project id inside the store
    #[arg(long, requires = "store_dir")]
    pub project: Option<String>,
}

impl ParamsSource {
    /// Raw JSON document from `--input`, the store, or piped stdin.
    pub fn read_value(&self) -> Result<Value, Box<dyn std::error::Error>> {
        if let Some(ref path) = self.input {
            debug!(path = %path, "reading parameter set");
            return input::read_json_value(path);
        }
        if let (Some(dir), Some(project)) = (&self.store_dir, &self.project) {
            debug!(dir = %dir, project = %project, "loading parameter set from store");
            let params = load_parameters(&JsonDirStore::new(dir), project)?;
            return Ok(serde_json::to_value(params)?);
        }
        input::read_stdin()?
            .ok_or_else(|| "--input <file.json>, --store-dir/--project or stdin required".into())
    }

    pub fn load(&self) -> Result<ParameterSet, Box<dyn std::error::Error>> {
        Ok(serde_json::from_value(self.read_value()?)?)
    }
}

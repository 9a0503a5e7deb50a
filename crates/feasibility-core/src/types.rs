use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::FeasibilityResult;

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.05 = 5%). Never as percentages.
pub type Rate = Decimal;

/// Multiples (e.g., 1.8x equity multiple)
pub type Multiple = Decimal;

/// Fractional month counts (payback periods)
pub type Months = Decimal;

/// Month index on the project timeline; month 0 is the closing/acquisition date.
pub type Month = u32;

/// Why a metric could not be computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UndefinedReason {
    DegenerateCashFlow,
    NotConverged,
    NeverRecovered,
    InvalidConfiguration,
}

impl fmt::Display for UndefinedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            UndefinedReason::DegenerateCashFlow => "degenerate cash flow",
            UndefinedReason::NotConverged => "not converged",
            UndefinedReason::NeverRecovered => "never recovered",
            UndefinedReason::InvalidConfiguration => "invalid configuration",
        };
        f.write_str(text)
    }
}

/// A metric that is either a computed value or an explicit "no result".
///
/// Undefined metrics are never collapsed into zero; they serialise as
/// `{"undefined": "<reason>"}` and display as `n/a (<reason>)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Metric<T> {
    Value(T),
    Undefined { undefined: UndefinedReason },
}

impl<T> Metric<T> {
    pub fn undefined(reason: UndefinedReason) -> Self {
        Metric::Undefined { undefined: reason }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Metric::Value(v) => Some(v),
            Metric::Undefined { .. } => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, Metric::Value(_))
    }

    pub fn reason(&self) -> Option<UndefinedReason> {
        match self {
            Metric::Value(_) => None,
            Metric::Undefined { undefined } => Some(*undefined),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Metric<U> {
        match self {
            Metric::Value(v) => Metric::Value(f(v)),
            Metric::Undefined { undefined } => Metric::Undefined { undefined },
        }
    }

    /// Lift a computation result into a metric.
    ///
    /// Recoverable metric failures become `Undefined`; anything else is a
    /// genuine error and is handed back to the caller.
    pub fn from_result(result: FeasibilityResult<T>) -> FeasibilityResult<Self> {
        match result {
            Ok(v) => Ok(Metric::Value(v)),
            Err(e) => match e.undefined_reason() {
                Some(reason) => Ok(Metric::undefined(reason)),
                None => Err(e),
            },
        }
    }
}

impl<T: fmt::Display> fmt::Display for Metric<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Value(v) => v.fmt(f),
            Metric::Undefined { undefined } => write!(f, "n/a ({undefined})"),
        }
    }
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}

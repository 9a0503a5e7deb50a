use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::UndefinedReason;

#[derive(Debug, Error)]
pub enum FeasibilityError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Invalid configuration: {field} — {reason}")]
    InvalidConfiguration { field: String, reason: String },

    #[error("Degenerate cash flow: {0}")]
    DegenerateCashFlow(String),

    #[error("No convergence: {function} found no sign change across {scanned_points} scanned rates")]
    NotConverged {
        function: String,
        scanned_points: u32,
    },

    #[error("Never recovered: cumulative cash flow stays negative through month {horizon_months}")]
    NeverRecovered { horizon_months: usize },

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Arithmetic overflow in {context} (last value: {last_value})")]
    Overflow { context: String, last_value: Decimal },

    #[error("Out of range: {context} leaves the representable decimal range")]
    OutOfRange { context: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl FeasibilityError {
    /// The "no result" category a presentation layer should render for this
    /// error, if it is one of the recoverable metric failures.
    pub fn undefined_reason(&self) -> Option<UndefinedReason> {
        match self {
            FeasibilityError::DegenerateCashFlow(_) => Some(UndefinedReason::DegenerateCashFlow),
            FeasibilityError::NotConverged { .. } => Some(UndefinedReason::NotConverged),
            FeasibilityError::NeverRecovered { .. } => Some(UndefinedReason::NeverRecovered),
            FeasibilityError::InvalidConfiguration { .. }
            | FeasibilityError::DivisionByZero { .. }
            | FeasibilityError::OutOfRange { .. } => Some(UndefinedReason::InvalidConfiguration),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for FeasibilityError {
    fn from(e: serde_json::Error) -> Self {
        FeasibilityError::SerializationError(e.to_string())
    }
}

impl From<std::io::Error> for FeasibilityError {
    fn from(e: std::io::Error) -> Self {
        FeasibilityError::Io(e.to_string())
    }
}

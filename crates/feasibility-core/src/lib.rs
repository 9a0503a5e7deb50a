pub mod error;
pub mod params;
pub mod time_value;
pub mod types;

#[cfg(feature = "financing")]
pub mod financing;

#[cfg(feature = "sales")]
pub mod sales;

#[cfg(feature = "ledger")]
pub mod ledger;

#[cfg(feature = "ledger")]
pub mod appraisal;

#[cfg(feature = "scenarios")]
pub mod scenarios;

#[cfg(feature = "store")]
pub mod store;

pub use error::FeasibilityError;
pub use types::*;

/// Standard result type for all feasibility operations
pub type FeasibilityResult<T> = Result<T, FeasibilityError>;

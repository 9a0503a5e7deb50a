pub mod capex;
pub mod model;
pub mod periodic;

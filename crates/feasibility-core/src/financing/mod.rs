pub mod amortisation;
pub mod wacc;

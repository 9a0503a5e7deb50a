use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use serde_json::Value;

use feasibility_core::financing::amortisation::{build_debt_schedule, DebtScheduleInput};
use feasibility_core::financing::wacc::{calculate_wacc, WaccInput};
use feasibility_core::params::AmortisationSystem;

use super::ParamsSource;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SystemArg {
    German,
    French,
}

impl From<SystemArg> for AmortisationSystem {
    fn from(s: SystemArg) -> Self {
        match s {
            SystemArg::German => AmortisationSystem::German,
            SystemArg::French => AmortisationSystem::French,
        }
    }
}

/// Arguments for the loan schedule
#[derive(Args)]
pub struct DebtScheduleArgs {
    #[command(flatten)]
    pub source: ParamsSource,

    /// Loan principal (used when no parameter set is given)
    #[arg(long)]
    pub principal: Option<Decimal>,

    /// Term in months
    #[arg(long)]
    pub term_months: Option<i32>,

    /// Effective annual interest rate (e.g. 0.12)
    #[arg(long)]
    pub rate: Option<Decimal>,

    /// Months between payments
    #[arg(long, default_value = "1")]
    pub period: i32,

    /// Months to model (defaults to the term)
    #[arg(long)]
    pub horizon: Option<u32>,

    #[arg(long, value_enum, default_value = "german")]
    pub system: SystemArg,
}

pub fn run_debt_schedule(args: DebtScheduleArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let input = match args.principal {
        Some(principal) => {
            let term = args
                .term_months
                .ok_or("--term-months is required with --principal")?;
            let rate = args.rate.ok_or("--rate is required with --principal")?;
            DebtScheduleInput {
                principal,
                term_months: term,
                annual_rate: rate,
                capitalization_period: args.period,
                horizon_months: args.horizon.unwrap_or(term.max(0) as u32),
                system: args.system.into(),
            }
        }
        None => DebtScheduleInput::from_parameters(&args.source.load()?),
    };
    let result = build_debt_schedule(&input)?;
    Ok(serde_json::to_value(result)?)
}

/// Arguments for WACC
#[derive(Args)]
pub struct WaccArgs {
    #[command(flatten)]
    pub source: ParamsSource,

    /// Cost of equity (used with --cost-of-debt instead of a parameter set)
    #[arg(long)]
    pub cost_of_equity: Option<Decimal>,

    #[arg(long)]
    pub cost_of_debt: Option<Decimal>,

    #[arg(long)]
    pub tax_rate: Option<Decimal>,

    /// Debt share of invested capital
    #[arg(long)]
    pub debt_weight: Option<Decimal>,
}

pub fn run_wacc(args: WaccArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let input = match args.cost_of_equity {
        Some(ke) => WaccInput {
            cost_of_equity: ke,
            cost_of_debt: args.cost_of_debt.ok_or("--cost-of-debt is required")?,
            tax_rate: args.tax_rate.unwrap_or(Decimal::ZERO),
            debt_weight: args.debt_weight.unwrap_or(Decimal::ZERO),
        },
        None => WaccInput::from_parameters(&args.source.load()?),
    };
    let result = calculate_wacc(&input)?;
    Ok(serde_json::to_value(result)?)
}

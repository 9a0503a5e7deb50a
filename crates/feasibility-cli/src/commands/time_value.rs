use clap::Args;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use feasibility_core::time_value::{self, RateBasis};
use feasibility_core::Metric;

/// Arguments for NPV
#[derive(Args)]
pub struct NpvArgs {
    /// Monthly cash flows starting at month 0 (comma-separated)
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
    pub cash_flows: Vec<Decimal>,

    /// Annual discount rate (e.g. 0.18)
    #[arg(long)]
    pub rate: Decimal,

    /// Treat the rate as a nominal APR instead of an effective annual rate
    #[arg(long)]
    pub nominal: bool,

    /// Months per cash-flow period
    #[arg(long, default_value = "1")]
    pub period_months: u32,
}

pub fn run_npv(args: NpvArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let basis = if args.nominal {
        RateBasis::Nominal
    } else {
        RateBasis::Effective
    };
    let npv = time_value::npv(&args.cash_flows, args.rate, basis, args.period_months)?;
    Ok(json!({ "result": { "npv": npv, "rate": args.rate, "basis": basis } }))
}

/// Arguments for IRR
#[derive(Args)]
pub struct IrrArgs {
    /// Monthly cash flows starting at month 0 (comma-separated)
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
    pub cash_flows: Vec<Decimal>,
}

pub fn run_irr(args: IrrArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let irr = Metric::from_result(time_value::irr(&args.cash_flows))?;
    Ok(json!({ "result": { "irr": irr } }))
}

/// Arguments for payback
#[derive(Args)]
pub struct PaybackArgs {
    /// Monthly cash flows starting at month 0 (comma-separated)
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
    pub cash_flows: Vec<Decimal>,

    /// Annual rate for the discounted payback
    #[arg(long)]
    pub rate: Option<Decimal>,
}

pub fn run_payback(args: PaybackArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let simple = Metric::from_result(time_value::payback(&args.cash_flows))?;
    let discounted = match args.rate {
        Some(rate) => Some(Metric::from_result(time_value::discounted_payback(
            &args.cash_flows,
            rate,
        ))?),
        None => None,
    };
    Ok(json!({
        "result": {
            "payback_months": simple,
            "discounted_payback_months": discounted,
        }
    }))
}

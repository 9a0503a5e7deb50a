mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

use commands::evaluate::{EvaluateArgs, LedgerArgs};
use commands::financing::{DebtScheduleArgs, WaccArgs};
use commands::sales::AbsorptionArgs;
use commands::scenarios::{ScenarioArgs, SensitivityArgs};
use commands::store::StoreArgs;
use commands::time_value::{IrrArgs, NpvArgs, PaybackArgs};

/// Land development feasibility appraisal
#[derive(Parser)]
#[command(
    name = "lfa",
    version,
    about = "Land development feasibility appraisal",
    long_about = "Monthly cash-flow modelling for phased lot-sale developments with \
                  decimal precision: absorption, construction debt, P&L with loss \
                  carryforward, FCFF/FCFE, NPV, IRR, payback and sensitivity grids. \
                  Set RUST_LOG=debug for pipeline diagnostics on stderr."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full appraisal on a parameter set
    Evaluate(EvaluateArgs),
    /// Build the monthly P&L and cash-flow ledger
    Ledger(LedgerArgs),
    /// Build the construction loan schedule
    DebtSchedule(DebtScheduleArgs),
    /// Weighted average cost of capital
    Wacc(WaccArgs),
    /// Lot absorption and sales collections
    Absorption(AbsorptionArgs),
    /// One-way sensitivity of investor NPV and IRR
    Sensitivity(SensitivityArgs),
    /// Compare named scenarios against a base case
    Scenarios(ScenarioArgs),
    /// Net present value of monthly cash flows
    Npv(NpvArgs),
    /// Internal rate of return of monthly cash flows
    Irr(IrrArgs),
    /// Simple and discounted payback in months
    Payback(PaybackArgs),
    /// Save or load parameter sets by project id
    Store(StoreArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Evaluate(args) => commands::evaluate::run_evaluate(args),
        Commands::Ledger(args) => commands::evaluate::run_ledger(args),
        Commands::DebtSchedule(args) => commands::financing::run_debt_schedule(args),
        Commands::Wacc(args) => commands::financing::run_wacc(args),
        Commands::Absorption(args) => commands::sales::run_absorption(args),
        Commands::Sensitivity(args) => commands::scenarios::run_sensitivity_grid(args),
        Commands::Scenarios(args) => commands::scenarios::run_scenarios(args),
        Commands::Npv(args) => commands::time_value::run_npv(args),
        Commands::Irr(args) => commands::time_value::run_irr(args),
        Commands::Payback(args) => commands::time_value::run_payback(args),
        Commands::Store(args) => commands::store::run_store(args),
        Commands::Version => {
            println!("lfa {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}

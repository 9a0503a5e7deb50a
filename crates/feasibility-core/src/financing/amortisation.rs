use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use crate::error::FeasibilityError;
use crate::params::{AmortisationSystem, ParameterSet};
use crate::time_value::pmt;
use crate::types::*;
use crate::FeasibilityResult;

/// Input for the monthly loan schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebtScheduleInput {
    pub principal: Money,
    /// Loan term; zero or negative yields a draw-only (never amortised) loan
    pub term_months: i32,
    /// Effective annual rate (EAR)
    pub annual_rate: Rate,
    /// Months between payment events; zero or negative is treated as 1
    pub capitalization_period: i32,
    pub horizon_months: Month,
    #[serde(default)]
    pub system: AmortisationSystem,
}

impl DebtScheduleInput {
    pub fn from_parameters(params: &ParameterSet) -> Self {
        let fin = &params.financing;
        Self {
            principal: fin.debt_amount,
            term_months: fin.term_months,
            annual_rate: fin.annual_debt_rate,
            capitalization_period: fin.capitalization_period,
            horizon_months: params.horizon_months,
            system: fin.amortisation_system,
        }
    }
}

/// One month of the loan schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebtPeriod {
    pub month: Month,
    pub opening_balance: Money,
    pub interest_paid: Money,
    pub principal_paid: Money,
    pub closing_balance: Money,
}

/// Monthly loan schedule for months 1..=horizon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebtSchedule {
    pub periods: Vec<DebtPeriod>,
    pub system: AmortisationSystem,
    pub payment_period_months: u32,
    pub num_payments: u32,
    /// Rate charged per full payment period
    pub periodic_rate: Rate,
    pub total_interest: Money,
    pub total_principal: Money,
    /// Balance still owed after the last modelled month
    pub outstanding_at_horizon: Money,
}

impl DebtSchedule {
    /// Interest paid in `month`; zero at month 0 and beyond the horizon.
    pub fn interest_at(&self, month: Month) -> Money {
        self.period(month).map(|p| p.interest_paid).unwrap_or(Decimal::ZERO)
    }

    /// Principal repaid in `month`; zero at month 0 and beyond the horizon.
    pub fn principal_at(&self, month: Month) -> Money {
        self.period(month).map(|p| p.principal_paid).unwrap_or(Decimal::ZERO)
    }

    pub fn closing_balance_at(&self, month: Month) -> Money {
        self.period(month).map(|p| p.closing_balance).unwrap_or(Decimal::ZERO)
    }

    fn period(&self, month: Month) -> Option<&DebtPeriod> {
        if month == 0 {
            return None;
        }
        self.periods.get((month - 1) as usize)
    }
}

/// Build a month-by-month loan schedule wrapped in the computation envelope.
pub fn build_debt_schedule(
    input: &DebtScheduleInput,
) -> FeasibilityResult<ComputationOutput<DebtSchedule>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let schedule = schedule_debt(input, &mut warnings)?;

    let methodology = match input.system {
        AmortisationSystem::German => "Constant-principal (German) amortisation",
        AmortisationSystem::French => "Constant-payment (French) amortisation",
    };
    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(methodology, input, warnings, elapsed, schedule))
}

/// Build the loan schedule, pushing non-fatal observations into `warnings`.
///
/// Payment events fall on every multiple of the capitalisation period up to
/// the term, plus a final stub event at the term if it is not a multiple.
/// Interest is charged only on event months, on the balance outstanding
/// since the previous event. The final event repays the remaining balance.
pub fn schedule_debt(
    input: &DebtScheduleInput,
    warnings: &mut Vec<String>,
) -> FeasibilityResult<DebtSchedule> {
    if input.principal < Decimal::ZERO {
        return Err(FeasibilityError::InvalidInput {
            field: "principal".into(),
            reason: "Loan principal cannot be negative".into(),
        });
    }
    if input.annual_rate <= dec!(-1) {
        return Err(FeasibilityError::InvalidInput {
            field: "annual_rate".into(),
            reason: "Loan rate must be greater than -100%".into(),
        });
    }

    let period = if input.capitalization_period <= 0 {
        warnings.push(format!(
            "Capitalisation period {} is not positive; using monthly payments",
            input.capitalization_period
        ));
        1
    } else {
        input.capitalization_period as u32
    };

    let horizon = input.horizon_months;
    let term = input.term_months.max(0) as u32;
    let num_payments = if term == 0 { 0 } else { term.div_ceil(period) };
    let periodic_rate = if num_payments == 0 {
        Decimal::ZERO
    } else {
        rate_for_months(input.annual_rate, period)?
    };

    if num_payments == 0 {
        if input.principal > Decimal::ZERO {
            warnings.push("Loan term is zero: principal is drawn but never amortised".into());
        }
        return Ok(DebtSchedule {
            periods: (1..=horizon).map(zero_period).collect(),
            system: input.system,
            payment_period_months: period,
            num_payments,
            periodic_rate,
            total_interest: Decimal::ZERO,
            total_principal: Decimal::ZERO,
            outstanding_at_horizon: input.principal,
        });
    }

    let level_payment = match input.system {
        AmortisationSystem::German => input.principal / Decimal::from(num_payments),
        AmortisationSystem::French => pmt(periodic_rate, num_payments, -input.principal, Decimal::ZERO)?,
    };

    let mut periods = Vec::with_capacity(horizon as usize);
    let mut balance = input.principal;
    let mut payments_made = 0u32;
    let mut last_event = 0u32;
    let mut total_interest = Decimal::ZERO;
    let mut total_principal = Decimal::ZERO;

    for month in 1..=horizon {
        if month > term {
            periods.push(zero_period(month));
            continue;
        }

        let opening = balance;
        let mut interest = Decimal::ZERO;
        let mut principal = Decimal::ZERO;

        if month % period == 0 || month == term {
            payments_made += 1;
            let elapsed = month - last_event;
            last_event = month;

            let rate = if elapsed == period {
                periodic_rate
            } else {
                rate_for_months(input.annual_rate, elapsed)?
            };
            interest = opening.checked_mul(rate).ok_or_else(|| out_of_range("loan interest"))?;

            principal = if payments_made == num_payments {
                balance
            } else {
                match input.system {
                    AmortisationSystem::German => level_payment,
                    AmortisationSystem::French => (level_payment - interest).max(Decimal::ZERO),
                }
                .min(balance)
            };
            balance -= principal;
        }

        total_interest = total_interest
            .checked_add(interest)
            .ok_or_else(|| out_of_range("total loan interest"))?;
        total_principal += principal;
        periods.push(DebtPeriod {
            month,
            opening_balance: opening,
            interest_paid: interest,
            principal_paid: principal,
            closing_balance: balance.max(Decimal::ZERO),
        });
    }

    if term > horizon && input.principal > Decimal::ZERO {
        warnings.push(format!(
            "Loan term of {term} months exceeds the {horizon}-month horizon; {balance} remains outstanding"
        ));
    }

    debug!(
        num_payments,
        period,
        %total_interest,
        %total_principal,
        "debt schedule built"
    );

    Ok(DebtSchedule {
        periods,
        system: input.system,
        payment_period_months: period,
        num_payments,
        periodic_rate,
        total_interest,
        total_principal,
        outstanding_at_horizon: balance,
    })
}

/// Effective rate over `months` implied by an effective annual rate.
fn rate_for_months(annual_rate: Rate, months: u32) -> FeasibilityResult<Rate> {
    let growth = if months % 12 == 0 {
        (Decimal::ONE + annual_rate).checked_powi((months / 12) as i64)
    } else {
        (Decimal::ONE + annual_rate).checked_powd(Decimal::from(months) / dec!(12))
    };
    growth
        .map(|g| g - Decimal::ONE)
        .ok_or_else(|| out_of_range("loan periodic rate"))
}

fn out_of_range(context: &str) -> FeasibilityError {
    FeasibilityError::OutOfRange {
        context: context.into(),
    }
}

fn zero_period(month: Month) -> DebtPeriod {
    DebtPeriod {
        month,
        opening_balance: Decimal::ZERO,
        interest_paid: Decimal::ZERO,
        principal_paid: Decimal::ZERO,
        closing_balance: Decimal::ZERO,
    }
}

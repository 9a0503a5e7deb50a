use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::FeasibilityError;
use crate::types::{Money, Months, Rate};
use crate::FeasibilityResult;

/// Rates below this are treated as implausible when choosing between roots.
const PLAUSIBLE_RATE_FLOOR: Decimal = dec!(-0.99);
/// Rates above this are treated as implausible when choosing between roots.
const PLAUSIBLE_RATE_CEILING: Decimal = dec!(10);
/// Score added to a root outside the plausible band.
const IMPLAUSIBLE_ROOT_PENALTY: Decimal = dec!(1000000);

/// How an annual rate converts to a monthly rate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateBasis {
    /// Effective annual rate: monthly = (1 + r)^(1/12) - 1
    #[default]
    Effective,
    /// Nominal APR: monthly = r / 12
    Nominal,
}

/// Monthly rate equivalent to an annual rate under the given basis.
pub fn monthly_rate(annual_rate: Rate, basis: RateBasis) -> FeasibilityResult<Rate> {
    if annual_rate <= dec!(-1) {
        return Err(FeasibilityError::InvalidInput {
            field: "annual_rate".into(),
            reason: "Annual rate must be greater than -100%".into(),
        });
    }
    match basis {
        RateBasis::Effective => (Decimal::ONE + annual_rate)
            .checked_powd(Decimal::ONE / dec!(12))
            .map(|f| f - Decimal::ONE)
            .ok_or_else(|| out_of_range("monthly rate conversion")),
        RateBasis::Nominal => Ok(annual_rate / dec!(12)),
    }
}

fn out_of_range(context: &str) -> FeasibilityError {
    FeasibilityError::OutOfRange {
        context: context.into(),
    }
}

/// Per-period discount factors `1 / (1 + r)^t` for `t` in `0..len`.
///
/// Factors shrink towards zero for positive rates and grow for negative
/// ones; growth past the decimal range is an `OutOfRange` error.
fn discount_factors(one_plus_r: Decimal, len: usize, context: &str) -> FeasibilityResult<Vec<Decimal>> {
    if one_plus_r <= Decimal::ZERO {
        return Err(FeasibilityError::DivisionByZero {
            context: format!("{context} discount factor"),
        });
    }
    let v = Decimal::ONE
        .checked_div(one_plus_r)
        .ok_or_else(|| out_of_range(context))?;
    let mut factors = Vec::with_capacity(len);
    let mut factor = Decimal::ONE;
    for t in 0..len {
        if t > 0 {
            factor = factor.checked_mul(v).ok_or_else(|| out_of_range(context))?;
        }
        factors.push(factor);
    }
    Ok(factors)
}

/// Effective annual rate equivalent to a monthly rate: (1 + r)^12 - 1.
pub fn annualize_monthly_rate(monthly: Rate) -> FeasibilityResult<Rate> {
    (Decimal::ONE + monthly)
        .checked_powi(12)
        .map(|f| f - Decimal::ONE)
        .ok_or_else(|| FeasibilityError::Overflow {
            context: "annualising monthly rate".into(),
            last_value: monthly,
        })
}

// ---------------------------------------------------------------------------
// NPV
// ---------------------------------------------------------------------------

/// Net Present Value of a monthly-indexed series at an annual discount rate.
///
/// `cash_flows[t]` is discounted by `(1 + m)^(period_months * t)` where `m`
/// is the monthly rate implied by `annual_rate` under `basis`.
pub fn npv(
    cash_flows: &[Money],
    annual_rate: Rate,
    basis: RateBasis,
    period_months: u32,
) -> FeasibilityResult<Money> {
    if period_months == 0 {
        return Err(FeasibilityError::InvalidInput {
            field: "period_months".into(),
            reason: "Period length must be at least one month".into(),
        });
    }
    let monthly = monthly_rate(annual_rate, basis)?;
    let one_plus_r = (Decimal::ONE + monthly)
        .checked_powi(period_months as i64)
        .ok_or_else(|| out_of_range("NPV period growth"))?;
    let factors = discount_factors(one_plus_r, cash_flows.len(), "NPV")?;

    cash_flows
        .iter()
        .zip(&factors)
        .try_fold(Decimal::ZERO, |acc, (cf, factor)| {
            cf.checked_mul(*factor).and_then(|pv| acc.checked_add(pv))
        })
        .ok_or_else(|| out_of_range("NPV sum"))
}

/// NPV at a per-period rate, or `None` when the discount arithmetic leaves
/// the representable range (the sample is "non-finite").
pub fn npv_at_periodic_rate(cash_flows: &[Money], rate: Rate) -> Option<Money> {
    let one_plus_r = Decimal::ONE + rate;
    if one_plus_r <= Decimal::ZERO {
        return None;
    }
    let v = Decimal::ONE.checked_div(one_plus_r)?;

    let mut total = Decimal::ZERO;
    let mut factor = Decimal::ONE;
    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            factor = factor.checked_mul(v)?;
        }
        if cf.is_zero() {
            continue;
        }
        total = total.checked_add(cf.checked_mul(factor)?)?;
    }
    Some(total)
}

// ---------------------------------------------------------------------------
// IRR
// ---------------------------------------------------------------------------

/// Bounds and resolution of the IRR root scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrrScanConfig {
    /// Lowest periodic rate scanned
    pub lower: Rate,
    /// Highest periodic rate scanned
    pub upper: Rate,
    /// Grid points between `lower` and `upper` inclusive
    pub steps: u32,
    /// Bisection stops when |NPV| or half the bracket width falls below this
    pub tolerance: Decimal,
    /// Iteration cap per bracket
    pub max_bisections: u32,
}

impl Default for IrrScanConfig {
    fn default() -> Self {
        Self {
            lower: dec!(-0.9999),
            upper: dec!(5),
            steps: 2000,
            tolerance: dec!(0.00000000000001),
            max_bisections: 200,
        }
    }
}

/// A solved internal rate of return.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IrrSolution {
    /// Periodic (monthly) IRR
    pub monthly: Rate,
    /// Effective annual equivalent: (1 + monthly)^12 - 1
    pub annual: Rate,
    /// Number of distinct roots found by the scan
    pub candidate_roots: usize,
}

/// Internal Rate of Return of a monthly series using the default scan.
pub fn irr(cash_flows: &[Money]) -> FeasibilityResult<IrrSolution> {
    irr_with_config(cash_flows, &IrrScanConfig::default())
}

/// Internal Rate of Return via grid bracketing and bisection.
///
/// Every sign change of NPV across the rate grid is bisected to a root.
/// When several roots exist the one with the smallest |NPV| wins, with a
/// heavy penalty for rates outside -99%..+1000% per period.
pub fn irr_with_config(
    cash_flows: &[Money],
    config: &IrrScanConfig,
) -> FeasibilityResult<IrrSolution> {
    ensure_mixed_signs(cash_flows)?;

    let roots = find_irr_roots(cash_flows, config);
    debug!(roots = roots.len(), flows = cash_flows.len(), "IRR scan finished");

    let best = roots
        .iter()
        .filter(|r| **r > config.lower)
        .filter_map(|r| {
            let err = npv_at_periodic_rate(cash_flows, *r)?.abs();
            let plausible = *r > PLAUSIBLE_RATE_FLOOR && *r < PLAUSIBLE_RATE_CEILING;
            let score = if plausible {
                err
            } else {
                err + IMPLAUSIBLE_ROOT_PENALTY
            };
            Some((*r, score))
        })
        .min_by(|a, b| a.1.cmp(&b.1))
        .map(|(r, _)| r);

    let monthly = best.ok_or_else(|| FeasibilityError::NotConverged {
        function: "IRR".into(),
        scanned_points: config.steps,
    })?;

    Ok(IrrSolution {
        monthly,
        annual: annualize_monthly_rate(monthly)?,
        candidate_roots: roots.len(),
    })
}

/// All roots of NPV(r) = 0 found on the scan grid, in ascending order.
pub fn find_irr_roots(cash_flows: &[Money], config: &IrrScanConfig) -> Vec<Rate> {
    let steps = config.steps.max(2);
    let width = (config.upper - config.lower) / Decimal::from(steps - 1);
    let grid: Vec<Rate> = (0..steps)
        .map(|i| config.lower + width * Decimal::from(i))
        .collect();
    let samples: Vec<Option<Money>> = grid
        .iter()
        .map(|r| npv_at_periodic_rate(cash_flows, *r))
        .collect();

    let mut roots = Vec::new();
    for i in 0..grid.len() - 1 {
        let (Some(y1), Some(y2)) = (samples[i], samples[i + 1]) else {
            continue;
        };
        if y1.is_zero() {
            roots.push(grid[i]);
        } else if !y2.is_zero() && y1.is_sign_negative() != y2.is_sign_negative() {
            roots.push(bisect(cash_flows, grid[i], grid[i + 1], y1, config));
        }
    }
    if let (Some(&last), Some(Some(y))) = (grid.last(), samples.last()) {
        if y.is_zero() {
            roots.push(last);
        }
    }
    roots
}

fn bisect(cash_flows: &[Money], mut a: Rate, mut b: Rate, mut fa: Money, config: &IrrScanConfig) -> Rate {
    let two = dec!(2);
    let mut c = (a + b) / two;
    for _ in 0..config.max_bisections {
        c = (a + b) / two;
        let Some(fc) = npv_at_periodic_rate(cash_flows, c) else {
            a = (a + c) / two;
            b = (b + c) / two;
            continue;
        };
        if fc.abs() <= config.tolerance || (b - a) / two < config.tolerance {
            return c;
        }
        if fa.is_sign_negative() != fc.is_sign_negative() {
            b = c;
        } else {
            a = c;
            fa = fc;
        }
    }
    c
}

fn ensure_mixed_signs(cash_flows: &[Money]) -> FeasibilityResult<()> {
    let has_positive = cash_flows.iter().any(|cf| *cf > Decimal::ZERO);
    let has_negative = cash_flows.iter().any(|cf| *cf < Decimal::ZERO);
    if has_positive && has_negative {
        Ok(())
    } else {
        Err(FeasibilityError::DegenerateCashFlow(
            "cash flows need at least one positive and one negative value".into(),
        ))
    }
}

// ---------------------------------------------------------------------------
// Payback
// ---------------------------------------------------------------------------

/// Simple payback period in months, linearly interpolated within the
/// month in which the cumulative cash flow last turns non-negative.
pub fn payback(cash_flows: &[Money]) -> FeasibilityResult<Months> {
    recovery_month(cash_flows)
}

/// Discounted payback period in months at an effective annual rate.
pub fn discounted_payback(cash_flows: &[Money], annual_rate: Rate) -> FeasibilityResult<Months> {
    let monthly = monthly_rate(annual_rate, RateBasis::Effective)?;
    let factors = discount_factors(Decimal::ONE + monthly, cash_flows.len(), "discounted payback")?;
    let discounted = cash_flows
        .iter()
        .zip(&factors)
        .map(|(cf, factor)| cf.checked_mul(*factor))
        .collect::<Option<Vec<Money>>>()
        .ok_or_else(|| out_of_range("discounted payback flows"))?;
    recovery_month(&discounted)
}

/// Months until the cumulative flow turns non-negative for good.
///
/// The crossing that counts is the one after the last month with a negative
/// cumulative balance, so later capital calls push payback out. A series
/// whose cumulative balance never goes negative pays back at month 0.
fn recovery_month(flows: &[Money]) -> FeasibilityResult<Months> {
    if flows.is_empty() {
        return Err(FeasibilityError::DegenerateCashFlow(
            "payback requires at least one cash flow".into(),
        ));
    }

    let mut cumulative = Decimal::ZERO;
    let mut last_shortfall: Option<(usize, Money)> = None;
    for (t, cf) in flows.iter().enumerate() {
        cumulative = cumulative
            .checked_add(*cf)
            .ok_or_else(|| out_of_range("payback cumulative flow"))?;
        if cumulative < Decimal::ZERO {
            last_shortfall = Some((t, cumulative));
        }
    }

    let Some((t, shortfall)) = last_shortfall else {
        return Ok(Decimal::ZERO);
    };
    match flows.get(t + 1) {
        Some(cf) if !cf.is_zero() => Ok(Decimal::from(t as u64) + shortfall.abs() / *cf),
        _ => Err(FeasibilityError::NeverRecovered {
            horizon_months: flows.len() - 1,
        }),
    }
}

// ---------------------------------------------------------------------------
// Annuity payment
// ---------------------------------------------------------------------------

/// Payment (PMT)
pub fn pmt(rate: Rate, nper: u32, present_value: Money, future_value: Money) -> FeasibilityResult<Money> {
    if nper == 0 {
        return Err(FeasibilityError::InvalidInput {
            field: "nper".into(),
            reason: "Number of periods must be > 0".into(),
        });
    }

    if rate.is_zero() {
        return Ok(-(present_value + future_value) / Decimal::from(nper));
    }

    let one_plus_r = Decimal::ONE + rate;
    let factor = one_plus_r
        .checked_powi(nper as i64)
        .ok_or_else(|| out_of_range("PMT growth factor"))?;
    let annuity_factor = (factor - Decimal::ONE) / rate;

    if annuity_factor.is_zero() {
        return Err(FeasibilityError::DivisionByZero {
            context: "PMT annuity factor".into(),
        });
    }

    Ok(-(present_value * factor + future_value) / annuity_factor)
}

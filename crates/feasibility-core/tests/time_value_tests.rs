use feasibility_core::time_value::{
    annualize_monthly_rate, discounted_payback, irr, npv, npv_at_periodic_rate, payback, RateBasis,
};
use feasibility_core::FeasibilityError;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;

// ===========================================================================
// IRR known answers
// ===========================================================================

#[test]
fn test_irr_one_period_ten_percent() {
    let sol = irr(&[dec!(-100), dec!(110)]).unwrap();
    assert!((sol.monthly - dec!(0.10)).abs() < dec!(0.0000001));
    let expected_annual = dec!(1.10).powi(12) - Decimal::ONE;
    assert!(
        (sol.annual - expected_annual).abs() < dec!(0.000001),
        "annual {} vs {}",
        sol.annual,
        expected_annual
    );
}

#[test]
fn test_irr_single_signed_series_is_degenerate() {
    for flows in [
        vec![dec!(100), dec!(200), dec!(300)],
        vec![dec!(-100), dec!(-200), dec!(-300)],
        vec![Decimal::ZERO, Decimal::ZERO],
    ] {
        match irr(&flows) {
            Err(FeasibilityError::DegenerateCashFlow(_)) => {}
            other => panic!("expected DegenerateCashFlow for {flows:?}, got {other:?}"),
        }
    }
}

#[test]
fn test_irr_long_horizon_is_stable() {
    // 120 months: invest up front, level inflows, balloon at the end
    let mut flows = vec![dec!(-1000000)];
    flows.extend(std::iter::repeat(dec!(12000)).take(119));
    flows.push(dec!(900000));
    let sol = irr(&flows).unwrap();
    let residual = npv_at_periodic_rate(&flows, sol.monthly).unwrap();
    assert!(residual.abs() < dec!(0.01), "residual {residual}");
    assert!(sol.monthly > Decimal::ZERO && sol.monthly < dec!(0.05));
}

// ===========================================================================
// NPV conventions
// ===========================================================================

#[test]
fn test_npv_effective_vs_nominal() {
    let flows = vec![dec!(-1000), dec!(0), dec!(0), dec!(0), dec!(0), dec!(0), dec!(0),
        dec!(0), dec!(0), dec!(0), dec!(0), dec!(0), dec!(1120)];
    // Effective 12%: one year of discounting brings 1120 back to 1000
    let eff = npv(&flows, dec!(0.12), RateBasis::Effective, 1).unwrap();
    assert!(eff.abs() < dec!(0.0001), "effective npv {eff}");
    // Nominal 12% compounds monthly, so it discounts harder
    let nom = npv(&flows, dec!(0.12), RateBasis::Nominal, 1).unwrap();
    assert!(nom < eff);
}

#[test]
fn test_npv_period_months_stretches_discounting() {
    let flows = vec![dec!(0), dec!(100)];
    let monthly = npv(&flows, dec!(0.12), RateBasis::Effective, 1).unwrap();
    let yearly = npv(&flows, dec!(0.12), RateBasis::Effective, 12).unwrap();
    assert!(yearly < monthly);
    assert!((yearly - dec!(100) / dec!(1.12)).abs() < dec!(0.0001));
}

// ===========================================================================
// Payback
// ===========================================================================

#[test]
fn test_payback_interpolates_inside_month() {
    // Cumulative: -1000, -700, -400, -100, +200 => 3 + 100/300
    let flows = vec![dec!(-1000), dec!(300), dec!(300), dec!(300), dec!(300)];
    let p = payback(&flows).unwrap();
    assert!((p - dec!(3.3333333)).abs() < dec!(0.0001));
}

#[test]
fn test_payback_never_recovered_is_distinct() {
    let flows = vec![dec!(-1000), dec!(100), dec!(100)];
    match payback(&flows) {
        Err(e @ FeasibilityError::NeverRecovered { horizon_months: 2 }) => {
            assert_eq!(
                e.undefined_reason(),
                Some(feasibility_core::UndefinedReason::NeverRecovered)
            );
        }
        other => panic!("expected NeverRecovered, got {other:?}"),
    }
}

// ===========================================================================
// Algebraic laws
// ===========================================================================

fn arb_rate() -> impl Strategy<Value = Decimal> {
    (0u32..2000u32).prop_map(|bp| Decimal::new(bp as i64, 4))
}

fn arb_inflows() -> impl Strategy<Value = Vec<Decimal>> {
    prop::collection::vec((1u64..5000u64).prop_map(Decimal::from), 1..36)
}

proptest! {
    // NPV at the solved IRR is zero, and the solved IRR is the rate the
    // series was priced at.
    #[test]
    fn irr_npv_round_trip(rate in arb_rate(), inflows in arb_inflows()) {
        let one_plus = Decimal::ONE + rate;
        let mut discount = Decimal::ONE;
        let mut pv = Decimal::ZERO;
        for cf in &inflows {
            discount *= one_plus;
            pv += *cf / discount;
        }
        let mut flows = vec![-pv];
        flows.extend(inflows.iter().copied());

        let sol = irr(&flows).unwrap();
        prop_assert!((sol.monthly - rate).abs() < dec!(0.000001), "irr {} vs {}", sol.monthly, rate);
        let residual = npv_at_periodic_rate(&flows, sol.monthly).unwrap();
        prop_assert!(residual.abs() < dec!(0.001), "residual {}", residual);
        prop_assert_eq!(sol.annual, annualize_monthly_rate(sol.monthly).unwrap());
    }

    // Discounting can only delay recovery.
    #[test]
    fn discounted_payback_not_before_simple(
        invest in (100u64..100000u64).prop_map(Decimal::from),
        inflows in arb_inflows(),
        annual in (1u32..60u32).prop_map(|pct| Decimal::new(pct as i64, 2)),
    ) {
        let mut flows = vec![-invest];
        flows.extend(inflows);
        match (payback(&flows), discounted_payback(&flows, annual)) {
            (Ok(simple), Ok(discounted)) => prop_assert!(discounted >= simple),
            (Err(_), Ok(_)) => prop_assert!(false, "discounted recovered but simple did not"),
            _ => {}
        }
    }

    // Any rate above -100% yields a value or a recoverable error, never a panic.
    #[test]
    fn npv_and_payback_total_over_rates(
        // -99.99% up to 100000x a year
        rate_bp in -9999i64..1_000_000_000i64,
        flows in prop::collection::vec((-1_000_000_000i64..1_000_000_000i64).prop_map(Decimal::from), 1..240),
        period in 1u32..13u32,
    ) {
        let annual = Decimal::new(rate_bp, 4);
        for result in [
            npv(&flows, annual, RateBasis::Effective, period),
            npv(&flows, annual, RateBasis::Nominal, period),
            discounted_payback(&flows, annual),
        ] {
            if let Err(e) = result {
                prop_assert!(e.undefined_reason().is_some(), "hard error {}", e);
            }
        }
    }
}

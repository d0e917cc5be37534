//! Annualized money-weighted rate of return (XIRR)
//!
//! Finds `r` such that `Σ amount_i / (1 + r)^t_i = 0`, where `t_i` is the
//! distance in years (365.25 days each) from the earliest flow. The present
//! value is decreasing in `r` for a series that starts with money going in,
//! so the root is found by bracketing it with doubling steps and bisecting.
//!
//! Results are clamped to `[min_rate, max_rate]`: a series with no root above
//! -1 reports the minimum rate, one whose root lies beyond the maximum
//! reports the maximum.
//!
//! Near the minimum rate `1 + r` is tiny and flows a few years out have
//! discount factors below Decimal's smallest value. Only the sign of the
//! present value steers the search, so such rates are judged on a rescaled
//! sum with the same sign instead.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::prelude::*;
use tracing::{debug, warn};

use crate::config::XirrConfig;
use crate::error::{AnalysisError, Result};

const MILLIS_PER_DAY: i64 = 86_400_000;

/// A dated, signed amount. Negative is money invested, positive money returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CashFlowRecord {
    pub date: NaiveDateTime,
    pub amount: Decimal,
}

impl CashFlowRecord {
    pub fn new(date: NaiveDateTime, amount: Decimal) -> Self {
        Self { date, amount }
    }

    /// A flow at midnight of the given day
    pub fn on(date: NaiveDate, amount: Decimal) -> Self {
        Self::new(date.and_time(NaiveTime::MIN), amount)
    }
}

/// Solve for the annualized rate of a cash-flow series
///
/// The order of `flows` does not matter.
///
/// # Errors
/// [`AnalysisError::NumericDivergence`] when bisection exceeds
/// `config.max_iterations`.
pub fn xirr(flows: &[CashFlowRecord], config: &XirrConfig) -> Result<Decimal> {
    let min_rate = config.min_rate();
    if flows.is_empty() {
        return Ok(min_rate);
    }

    let years = year_fractions(flows, config);
    let pv_positive = |rate: Decimal| npv_is_positive(flows, &years, rate, config.precision);

    if !pv_positive(min_rate) {
        debug!("XIRR has no root above the minimum rate ({} flows)", flows.len());
        return Ok(min_rate);
    }

    // Bracket the root
    let two = Decimal::TWO;
    let mut upper = min_rate;
    let mut step = Decimal::ONE;
    while pv_positive(upper) {
        step *= two;
        upper += step;
        if upper > config.max_rate {
            debug!("XIRR saturated at {}", config.max_rate);
            return Ok(config.max_rate);
        }
    }
    let mut lower = upper - step;

    // Bisect
    let mut iterations = 0usize;
    while upper - lower > config.tolerance {
        let mid = ((upper + lower) / two).round_dp_with_strategy(
            config.midpoint_precision,
            RoundingStrategy::MidpointAwayFromZero,
        );
        if pv_positive(mid) {
            lower = mid;
        } else {
            upper = mid;
        }

        iterations += 1;
        if iterations > config.max_iterations {
            warn!(
                "XIRR did not converge after {} iterations, bracket [{}, {}]",
                config.max_iterations, lower, upper
            );
            return Err(AnalysisError::NumericDivergence {
                iterations: config.max_iterations,
                flows: flows.len(),
                segment: None,
            });
        }
    }

    Ok(lower)
}

/// Net present value of `flows` at `rate`, each term rounded to the
/// configured precision
///
/// `None` when a discount factor or the sum leaves Decimal's range.
pub fn present_value(
    flows: &[CashFlowRecord],
    rate: Decimal,
    config: &XirrConfig,
) -> Option<Decimal> {
    let years = year_fractions(flows, config);
    discounted_sum(flows, &years, Decimal::ONE + rate, config.precision)
}

fn year_fractions(flows: &[CashFlowRecord], config: &XirrConfig) -> Vec<Decimal> {
    let Some(first) = flows.iter().map(|f| f.date).min() else {
        return Vec::new();
    };
    let millis_per_year = Decimal::from(MILLIS_PER_DAY) * config.days_per_year;

    flows
        .iter()
        .map(|f| {
            let elapsed = Decimal::from((f.date - first).num_milliseconds());
            (elapsed / millis_per_year)
                .round_dp_with_strategy(config.precision, RoundingStrategy::MidpointAwayFromZero)
        })
        .collect()
}

/// Whether the present value at `rate` is above zero
///
/// Uses the rounded present value when every term is representable. Otherwise
/// the sign comes from [`rescaled_sum`], which has the sign of the present
/// value without its out-of-range factors.
fn npv_is_positive(
    flows: &[CashFlowRecord],
    years: &[Decimal],
    rate: Decimal,
    precision: u32,
) -> bool {
    let base = Decimal::ONE + rate;
    match discounted_sum(flows, years, base, precision) {
        Some(sum) => sum > Decimal::ZERO,
        None => rescaled_sum(flows, years, base) > Decimal::ZERO,
    }
}

fn discounted_sum(
    flows: &[CashFlowRecord],
    years: &[Decimal],
    base: Decimal,
    precision: u32,
) -> Option<Decimal> {
    flows
        .iter()
        .zip(years)
        .try_fold(Decimal::ZERO, |acc, (flow, &t)| {
            acc.checked_add(discount(flow.amount, base, t, precision)?)
        })
}

/// `amount / base^t` rounded, `None` when the factor leaves Decimal's range
fn discount(amount: Decimal, base: Decimal, t: Decimal, precision: u32) -> Option<Decimal> {
    let round = |d: Decimal| {
        d.round_dp_with_strategy(precision, RoundingStrategy::MidpointAwayFromZero)
    };
    if t.is_zero() {
        return Some(round(amount));
    }
    let factor = base.checked_powd(t).filter(|f| !f.is_zero())?;
    amount.checked_div(factor).map(round)
}

/// The present value times a positive factor, computed so that no term
/// needs a factor outside Decimal's range
///
/// For `base >= 1` this is the present value itself; a factor too large to
/// represent makes its term vanish. For `base < 1` it is
/// `Σ amount · base^(T - t)` with `T` the latest year fraction, which is the
/// present value times `base^T`; a factor too small to represent makes its
/// term vanish.
fn rescaled_sum(flows: &[CashFlowRecord], years: &[Decimal], base: Decimal) -> Decimal {
    let horizon = years.iter().copied().max().unwrap_or(Decimal::ZERO);
    let term = |amount: Decimal, t: Decimal| -> Option<Decimal> {
        if base >= Decimal::ONE {
            if t.is_zero() {
                return Some(amount);
            }
            let factor = base.checked_powd(t).filter(|f| !f.is_zero())?;
            amount.checked_div(factor)
        } else {
            let exponent = horizon - t;
            if exponent.is_zero() {
                return Some(amount);
            }
            amount.checked_mul(base.checked_powd(exponent)?)
        }
    };

    flows
        .iter()
        .zip(years)
        .map(|(flow, &t)| term(flow.amount, t).unwrap_or(Decimal::ZERO))
        .fold(Decimal::ZERO, |acc, term| acc.saturating_add(term))
}

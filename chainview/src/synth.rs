//! Synthetic option metrics driven by moneyness.
//!
//! Nothing here prices an option. Magnitudes are drawn from uniform ranges scaled by the distance
//! between strike and spot, then bounded by the [`OptionMetrics`] invariants.

use rand::Rng;

use crate::model::{OptionMetrics, Side, StrikeRow, round_dp};

/// Floor applied to every last traded price.
pub const LTP_FLOOR: f64 = 0.05;

/// Volumes closer than this to their own strike are re-rolled.
const COLLISION_DISTANCE: f64 = 100.0;

/// Symmetric uniform draw in `[-amplitude, amplitude)`.
pub(crate) fn jitter<R: Rng + ?Sized>(rng: &mut R, amplitude: f64) -> f64 {
    (rng.random::<f64>() * 2.0 - 1.0) * amplitude
}

fn jitter_unsigned<R: Rng + ?Sized>(rng: &mut R, value: u64, amplitude: f64) -> u64 {
    (value as f64 + jitter(rng, amplitude)).round().max(0.0) as u64
}

pub fn is_in_the_money(side: Side, strike: f64, spot: f64) -> bool {
    match side {
        Side::Call => strike < spot,
        Side::Put => strike > spot,
    }
}

/// Delta implied by moneyness alone, clamped to the side's bounds.
pub fn moneyness_delta(side: Side, strike: f64, spot: f64) -> f64 {
    let (lo, hi) = side.delta_bounds();
    let skew = (spot - strike) / 500.0;
    match side {
        Side::Call => (0.5 + skew).clamp(lo, hi),
        Side::Put => (-0.5 + skew).clamp(lo, hi),
    }
}

/// Ascending, equally spaced strikes with roughly half below the interval-aligned base.
pub fn strike_ladder(spot: f64, interval: f64, count: usize) -> Vec<f64> {
    let base = (spot / interval).floor() * interval;
    let start = base - count.div_ceil(2) as f64 * interval;
    (0..count).map(|index| start + index as f64 * interval).collect()
}

/// Fresh metrics for one leg.
pub fn synthesize<R: Rng + ?Sized>(rng: &mut R, side: Side, strike: f64, spot: f64) -> OptionMetrics {
    let distance = (strike - spot).abs();
    let iv = if is_in_the_money(side, strike, spot) {
        20.0 + rng.random::<f64>() * 10.0
    } else {
        25.0 + rng.random::<f64>() * 15.0
    };
    let ltp = (rng.random::<f64>() * 500.0 * (-distance / 500.0).exp()).max(LTP_FLOOR);

    let mut metrics = OptionMetrics {
        ltp: round_dp(ltp, 2),
        iv: round_dp(iv, 1),
        delta: round_dp(moneyness_delta(side, strike, spot), 3),
        gamma: round_dp(rng.random::<f64>() * 0.05, 4),
        theta: round_dp(rng.random::<f64>() * -2.0, 2),
        vega: round_dp(rng.random::<f64>() * 10.0, 2),
        volume: (10_000.0 + rng.random::<f64>() * 100_000.0).round() as u64,
        open_interest: (50_000.0 + rng.random::<f64>() * 200_000.0).round() as u64,
        open_interest_change: jitter(rng, 20_000.0).round() as i64,
    };
    metrics.clamp(side);
    metrics
}

/// Build a full ladder around `spot`, then re-roll volumes that collide with their strike.
pub fn generate_ladder<R: Rng + ?Sized>(
    rng: &mut R,
    spot: f64,
    interval: f64,
    count: usize,
) -> Vec<StrikeRow> {
    let mut rows = strike_ladder(spot, interval, count)
        .into_iter()
        .map(|strike| StrikeRow {
            strike,
            call: synthesize(rng, Side::Call, strike, spot),
            put: synthesize(rng, Side::Put, strike, spot),
        })
        .collect::<Vec<_>>();

    for row in rows.iter_mut() {
        let strike = row.strike;
        for side in Side::ALL {
            let leg = row.leg_mut(side);
            if (leg.volume as f64 - strike).abs() < COLLISION_DISTANCE {
                leg.volume = (strike + 500.0 + (rng.random::<f64>() * 10_000.0).floor()).max(0.0) as u64;
            }
        }
    }

    rows
}

/// One live tick of bounded noise applied in place.
pub fn perturb<R: Rng + ?Sized>(rng: &mut R, side: Side, metrics: &mut OptionMetrics) {
    metrics.ltp = round_dp((metrics.ltp + jitter(rng, 2.0)).max(LTP_FLOOR), 2);
    metrics.iv = round_dp(metrics.iv + jitter(rng, 0.5), 1);
    metrics.delta = round_dp(metrics.delta + jitter(rng, 0.01), 3);
    metrics.gamma = round_dp(metrics.gamma + jitter(rng, 0.001), 4);
    metrics.theta = round_dp(metrics.theta + jitter(rng, 0.1), 2);
    metrics.vega = round_dp(metrics.vega + jitter(rng, 0.1), 2);
    metrics.open_interest = jitter_unsigned(rng, metrics.open_interest, 500.0);
    metrics.open_interest_change = jitter(rng, 1_000.0).round() as i64;
    metrics.volume = jitter_unsigned(rng, metrics.volume, 200.0);
    metrics.clamp(side);
}

/// Metrics for one historical minute, derived from the session's seed metrics and that minute's spot.
pub fn derive_minute<R: Rng + ?Sized>(
    rng: &mut R,
    side: Side,
    strike: f64,
    spot: f64,
    seed: &OptionMetrics,
) -> OptionMetrics {
    let intrinsic = match side {
        Side::Call => (spot - strike).max(0.0),
        Side::Put => (strike - spot).max(0.0),
    };
    let ltp = rng.random::<f64>() * 0.1 + intrinsic * 0.8 + rng.random::<f64>() * 5.0;

    let mut metrics = OptionMetrics {
        ltp: round_dp(ltp.max(LTP_FLOOR), 2),
        iv: round_dp(seed.iv + jitter(rng, 0.2), 1),
        delta: round_dp(moneyness_delta(side, strike, spot), 3),
        open_interest: jitter_unsigned(rng, seed.open_interest, 200.0),
        open_interest_change: jitter(rng, 500.0).round() as i64,
        volume: jitter_unsigned(rng, seed.volume, 100.0),
        ..*seed
    };
    metrics.clamp(side);
    metrics
}

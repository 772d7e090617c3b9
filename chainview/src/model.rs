//! Option-chain data model shared by the live feed, historical playback and the view reconciler.

use std::cmp::Ordering;

use chrono::NaiveDate;
use derive_more::Display;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::error::ChainError;

/// Implied volatility bounds (percent).
pub const IV_MIN: f64 = 5.0;
pub const IV_MAX: f64 = 95.0;

/// Which leg of the chain a metric belongs to.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Deserialize, Serialize)]
pub enum Side {
    #[display("CALL")]
    Call,
    #[display("PUT")]
    Put,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::Call, Side::Put];

    /// Valid delta range for this side.
    pub fn delta_bounds(&self) -> (f64, f64) {
        match self {
            Side::Call => (0.0, 1.0),
            Side::Put => (-1.0, 0.0),
        }
    }
}

/// Ranked metric columns.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Deserialize, Serialize)]
pub enum MetricKind {
    #[display("Volume")]
    Volume,
    #[display("OI")]
    OpenInterest,
    #[display("OI Change")]
    OpenInterestChange,
}

impl MetricKind {
    pub const ALL: [MetricKind; 3] = [
        MetricKind::Volume,
        MetricKind::OpenInterest,
        MetricKind::OpenInterestChange,
    ];
}

/// Quote and greeks for one leg at one strike.
#[derive(Clone, Copy, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct OptionMetrics {
    pub ltp: f64,
    pub iv: f64,
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub vega: f64,
    pub volume: u64,
    pub open_interest: u64,
    pub open_interest_change: i64,
}

impl OptionMetrics {
    /// Enforce the iv and delta invariants for the given side.
    pub fn clamp(&mut self, side: Side) {
        let (lo, hi) = side.delta_bounds();
        self.iv = self.iv.clamp(IV_MIN, IV_MAX);
        self.delta = self.delta.clamp(lo, hi);
    }

    /// Value of a ranked metric as a float for sorting.
    pub fn metric(&self, kind: MetricKind) -> f64 {
        match kind {
            MetricKind::Volume => self.volume as f64,
            MetricKind::OpenInterest => self.open_interest as f64,
            MetricKind::OpenInterestChange => self.open_interest_change as f64,
        }
    }

    pub fn is_finite(&self) -> bool {
        [self.ltp, self.iv, self.delta, self.gamma, self.theta, self.vega]
            .iter()
            .all(|value| value.is_finite())
    }

    pub fn satisfies_invariants(&self, side: Side) -> bool {
        let (lo, hi) = side.delta_bounds();
        (IV_MIN..=IV_MAX).contains(&self.iv) && (lo..=hi).contains(&self.delta)
    }
}

/// One rung of the strike ladder.
#[derive(Clone, Copy, PartialEq, Debug, Deserialize, Serialize)]
pub struct StrikeRow {
    pub strike: f64,
    pub call: OptionMetrics,
    pub put: OptionMetrics,
}

impl StrikeRow {
    pub fn leg(&self, side: Side) -> &OptionMetrics {
        match side {
            Side::Call => &self.call,
            Side::Put => &self.put,
        }
    }

    pub fn leg_mut(&mut self, side: Side) -> &mut OptionMetrics {
        match side {
            Side::Call => &mut self.call,
            Side::Put => &mut self.put,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.strike.is_finite() && self.call.is_finite() && self.put.is_finite()
    }
}

/// Anything the reconciler can render: a spot price and an ascending strike ladder.
pub trait Ladder {
    fn spot_price(&self) -> f64;

    fn strikes(&self) -> &[StrikeRow];

    /// Session clock label for historical snapshots.
    fn time_label(&self) -> Option<&str> {
        None
    }

    /// Reject empty, unsorted or duplicate ladders and non-positive spot prices.
    fn validate(&self) -> Result<(), ChainError> {
        let spot = self.spot_price();
        if !spot.is_finite() || spot <= 0.0 {
            return Err(ChainError::MalformedSnapshot(format!(
                "spot price {spot} is not positive"
            )));
        }
        let strikes = self.strikes();
        if strikes.is_empty() {
            return Err(ChainError::MalformedSnapshot(
                "empty strike ladder".to_string(),
            ));
        }
        if let Some((a, b)) = strikes
            .iter()
            .tuple_windows()
            .find(|(a, b)| a.strike.partial_cmp(&b.strike) != Some(Ordering::Less))
        {
            return Err(ChainError::MalformedSnapshot(format!(
                "strike ladder not strictly ascending at {} -> {}",
                a.strike, b.strike
            )));
        }
        Ok(())
    }

    fn find_strike(&self, strike: f64) -> Option<&StrikeRow> {
        self.strikes()
            .iter()
            .find(|row| (row.strike - strike).abs() < 1.0)
    }
}

/// Current option-chain snapshot for one instrument.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct InstrumentQuote {
    pub symbol: SmolStr,
    pub spot_price: f64,
    /// Spot price at session start; change is measured cumulatively from here.
    pub seed_spot: f64,
    pub change: f64,
    pub percent_change: f64,
    pub expiry_dates: Vec<NaiveDate>,
    pub strikes: Vec<StrikeRow>,
}

impl InstrumentQuote {
    /// Recompute change and percent change against the seed spot price.
    pub fn recompute_change(&mut self) {
        self.change = self.spot_price - self.seed_spot;
        self.percent_change = if self.seed_spot > 0.0 {
            self.change / self.seed_spot * 100.0
        } else {
            0.0
        };
    }
}

impl Ladder for InstrumentQuote {
    fn spot_price(&self) -> f64 {
        self.spot_price
    }

    fn strikes(&self) -> &[StrikeRow] {
        &self.strikes
    }
}

/// One minute of a generated trading session.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct HistoricalSnapshot {
    pub minute_index: usize,
    pub time_label: String,
    pub spot_price: f64,
    pub strikes: Vec<StrikeRow>,
}

impl Ladder for HistoricalSnapshot {
    fn spot_price(&self) -> f64 {
        self.spot_price
    }

    fn strikes(&self) -> &[StrikeRow] {
        &self.strikes
    }

    fn time_label(&self) -> Option<&str> {
        Some(&self.time_label)
    }
}

/// Round to a fixed number of decimal places.
pub(crate) fn round_dp(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

use chrono::NaiveDate;
use indexmap::IndexMap;
use rand::Rng;
use smol_str::SmolStr;
use tracing::info;

use crate::{
    error::{ChainError, MissingData},
    model::{HistoricalSnapshot, InstrumentQuote, Side, StrikeRow, round_dp},
    synth::{derive_minute, jitter},
};

/// Minutes in the regular trading session.
pub const SESSION_MINUTES: usize = 390;

/// Session clock `(hour, minute)` for a minute index: `9 + index / 60` and `15 + index % 60`.
///
/// Minutes are not carried into the hour, so index 45 reads `09:60`.
pub fn session_clock(minute: usize) -> (usize, usize) {
    (9 + minute / 60, 15 + minute % 60)
}

/// `HH:MM` label attached to each snapshot.
pub fn session_label(minute: usize) -> String {
    let (hour, minute) = session_clock(minute);
    format!("{hour:02}:{minute:02}")
}

/// One instrument's generated session.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalDay {
    pub date: NaiveDate,
    pub snapshots: Vec<HistoricalSnapshot>,
}

impl HistoricalDay {
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

/// Generate a session from `seed`: a bounded random walk on spot, with each minute's ladder
/// derived fresh from the seed metrics and that minute's spot.
pub fn generate<R: Rng + ?Sized>(
    seed: &InstrumentQuote,
    walk_step: f64,
    minutes: usize,
    rng: &mut R,
) -> Vec<HistoricalSnapshot> {
    let mut spot = seed.spot_price;
    let mut snapshots = Vec::with_capacity(minutes);

    for minute_index in 0..minutes {
        if minute_index > 0 {
            spot = round_dp((spot + jitter(rng, walk_step)).max(1.0), 2);
        }

        let strikes = seed
            .strikes
            .iter()
            .map(|row| StrikeRow {
                strike: row.strike,
                call: derive_minute(rng, Side::Call, row.strike, spot, &row.call),
                put: derive_minute(rng, Side::Put, row.strike, spot, &row.put),
            })
            .collect();

        snapshots.push(HistoricalSnapshot {
            minute_index,
            time_label: session_label(minute_index),
            spot_price: spot,
            strikes,
        });
    }

    snapshots
}

/// Cached historical sessions keyed by symbol.
#[derive(Debug, Clone, Default)]
pub struct HistoricalStore {
    days: IndexMap<SmolStr, HistoricalDay>,
}

impl HistoricalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.days.contains_key(symbol)
    }

    pub fn day(&self, symbol: &str) -> Option<&HistoricalDay> {
        self.days.get(symbol)
    }

    /// Replace the whole session for the seed's symbol.
    pub fn regenerate<R: Rng + ?Sized>(
        &mut self,
        seed: &InstrumentQuote,
        date: NaiveDate,
        walk_step: f64,
        minutes: usize,
        rng: &mut R,
    ) -> &HistoricalDay {
        let snapshots = generate(seed, walk_step, minutes, rng);
        info!(
            symbol = %seed.symbol,
            %date,
            minutes = snapshots.len(),
            "generated historical session"
        );
        let day = HistoricalDay { date, snapshots };
        let (index, _) = self.days.insert_full(seed.symbol.clone(), day);
        &self.days[index]
    }

    pub fn snapshot_at(&self, symbol: &str, minute: usize) -> Result<&HistoricalSnapshot, ChainError> {
        let day = self
            .days
            .get(symbol)
            .ok_or_else(|| MissingData::History(SmolStr::new(symbol)))?;
        day.snapshots.get(minute).ok_or_else(|| {
            MissingData::Minute {
                symbol: SmolStr::new(symbol),
                minute,
            }
            .into()
        })
    }

    pub fn clear(&mut self) {
        self.days.clear();
    }
}

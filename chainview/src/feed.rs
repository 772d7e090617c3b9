use chrono::NaiveDate;
use rand::{SeedableRng, rngs::StdRng};
use tracing::debug;

use crate::{
    config::ChainConfig,
    error::{ChainError, MissingData},
    history::{HistoricalDay, HistoricalStore},
    model::{HistoricalSnapshot, InstrumentQuote},
    store::{LadderRule, QuoteStore},
};

/// Source of live quotes and historical snapshots.
///
/// The reconciler only ever sees what this trait hands out, so any feed producing the same
/// shapes can replace [`SyntheticFeed`].
pub trait ChainFeed {
    /// Advance the live quote for `symbol` by one tick.
    fn next_tick(&mut self, symbol: &str) -> Result<&InstrumentQuote, ChainError>;

    /// Latest live quote without advancing it.
    fn current(&mut self, symbol: &str) -> Result<&InstrumentQuote, ChainError>;

    fn snapshot_at(&self, symbol: &str, minute: usize) -> Result<&HistoricalSnapshot, ChainError>;

    /// (Re)build the historical session for `symbol`, seeded from its current live quote.
    fn generate_history(&mut self, symbol: &str, date: NaiveDate) -> Result<&HistoricalDay, ChainError>;

    fn has_history(&self, symbol: &str) -> bool;

    fn symbols(&self) -> Vec<smol_str::SmolStr>;
}

/// In-process randomised feed.
#[derive(Debug, Clone)]
pub struct SyntheticFeed {
    store: QuoteStore,
    history: HistoricalStore,
    session_minutes: usize,
    rng: StdRng,
}

impl SyntheticFeed {
    pub fn new(config: &ChainConfig) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let mut store = QuoteStore::new(LadderRule {
            interval: config.strike_interval,
            count: config.strike_count,
        });
        store.initialize(&config.instruments, &mut rng);

        Self {
            store,
            history: HistoricalStore::new(),
            session_minutes: config.session_minutes,
            rng,
        }
    }

    pub fn store(&self) -> &QuoteStore {
        &self.store
    }

    /// Mutable access to the backing store, e.g. to simulate data loss.
    pub fn store_mut(&mut self) -> &mut QuoteStore {
        &mut self.store
    }
}

impl ChainFeed for SyntheticFeed {
    fn next_tick(&mut self, symbol: &str) -> Result<&InstrumentQuote, ChainError> {
        self.store.apply_tick(symbol, &mut self.rng)
    }

    fn current(&mut self, symbol: &str) -> Result<&InstrumentQuote, ChainError> {
        self.store.get_or_recover(symbol, &mut self.rng)
    }

    fn snapshot_at(&self, symbol: &str, minute: usize) -> Result<&HistoricalSnapshot, ChainError> {
        self.history.snapshot_at(symbol, minute)
    }

    fn generate_history(&mut self, symbol: &str, date: NaiveDate) -> Result<&HistoricalDay, ChainError> {
        let walk_step = self
            .store
            .seed(symbol)
            .map(|seed| seed.walk_step)
            .ok_or_else(|| MissingData::Symbol(symbol.into()))?;
        let seed = self.store.get_or_recover(symbol, &mut self.rng)?.clone();
        debug!(%symbol, spot = seed.spot_price, walk_step, "seeding historical session");
        Ok(self
            .history
            .regenerate(&seed, date, walk_step, self.session_minutes, &mut self.rng))
    }

    fn has_history(&self, symbol: &str) -> bool {
        self.history.contains(symbol)
    }

    fn symbols(&self) -> Vec<smol_str::SmolStr> {
        self.store.symbols().cloned().collect()
    }
}

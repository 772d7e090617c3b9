use indexmap::IndexMap;
use rand::Rng;
use smol_str::SmolStr;
use tracing::{debug, info, warn};

use crate::{
    config::InstrumentSeed,
    error::{ChainError, MissingData},
    model::{InstrumentQuote, Side, round_dp},
    synth::{generate_ladder, perturb},
};

/// Strike ladder generation rule shared by the live store and historical regeneration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LadderRule {
    pub interval: f64,
    pub count: usize,
}

/// Current option-chain snapshot per instrument, in configuration order.
#[derive(Debug, Clone)]
pub struct QuoteStore {
    rule: LadderRule,
    seeds: Vec<InstrumentSeed>,
    quotes: IndexMap<SmolStr, InstrumentQuote>,
}

impl QuoteStore {
    pub fn new(rule: LadderRule) -> Self {
        Self {
            rule,
            seeds: Vec::new(),
            quotes: IndexMap::new(),
        }
    }

    /// Build one quote per seed, replacing anything held before.
    pub fn initialize<R: Rng + ?Sized>(&mut self, seeds: &[InstrumentSeed], rng: &mut R) {
        self.seeds = seeds.to_vec();
        self.quotes.clear();
        for seed in seeds {
            let quote = self.build_quote(seed, rng);
            info!(
                symbol = %seed.symbol,
                spot = seed.spot_price,
                strikes = quote.strikes.len(),
                "initialised instrument quote"
            );
            self.quotes.insert(seed.symbol.clone(), quote);
        }
    }

    fn build_quote<R: Rng + ?Sized>(&self, seed: &InstrumentSeed, rng: &mut R) -> InstrumentQuote {
        InstrumentQuote {
            symbol: seed.symbol.clone(),
            spot_price: seed.spot_price,
            seed_spot: seed.spot_price,
            change: seed.change,
            percent_change: seed.percent_change,
            expiry_dates: seed.expiry_dates.clone(),
            strikes: generate_ladder(rng, seed.spot_price, self.rule.interval, self.rule.count),
        }
    }

    pub fn rule(&self) -> LadderRule {
        self.rule
    }

    pub fn symbols(&self) -> impl Iterator<Item = &SmolStr> {
        self.seeds.iter().map(|seed| &seed.symbol)
    }

    pub fn seed(&self, symbol: &str) -> Option<&InstrumentSeed> {
        self.seeds.iter().find(|seed| seed.symbol == symbol)
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    pub fn get(&self, symbol: &str) -> Result<&InstrumentQuote, ChainError> {
        if self.quotes.is_empty() {
            return Err(MissingData::EmptyStore.into());
        }
        self.quotes
            .get(symbol)
            .ok_or_else(|| MissingData::Symbol(SmolStr::new(symbol)).into())
    }

    /// Like [`Self::get`], but regenerates from the retained seeds when data was lost.
    ///
    /// An empty store is rebuilt whole. A seeded symbol whose quote went missing is rebuilt alone.
    /// A symbol with no seed is returned as an error and the store is left untouched.
    pub fn get_or_recover<R: Rng + ?Sized>(
        &mut self,
        symbol: &str,
        rng: &mut R,
    ) -> Result<&InstrumentQuote, ChainError> {
        if self.quotes.is_empty() {
            warn!(%symbol, "quote store empty, regenerating from seeds");
            let seeds = self.seeds.clone();
            self.initialize(&seeds, rng);
        } else if !self.quotes.contains_key(symbol) {
            if let Some(seed) = self.seed(symbol).cloned() {
                warn!(%symbol, "quote missing, regenerating from seed");
                let quote = self.build_quote(&seed, rng);
                self.quotes.insert(seed.symbol, quote);
            }
        }
        self.get(symbol)
    }

    /// Drop every quote. Seeds are kept so the next lookup can recover.
    pub fn clear(&mut self) {
        self.quotes.clear();
    }

    /// Replace a quote wholesale, e.g. from an external feed.
    pub fn insert(&mut self, quote: InstrumentQuote) {
        self.quotes.insert(quote.symbol.clone(), quote);
    }

    /// Perturb the symbol's spot and every leg with bounded noise.
    pub fn apply_tick<R: Rng + ?Sized>(
        &mut self,
        symbol: &str,
        rng: &mut R,
    ) -> Result<&InstrumentQuote, ChainError> {
        let tick_step = self.seed(symbol).map(|seed| seed.tick_step).unwrap_or(5.0);
        self.get_or_recover(symbol, rng)?;

        let quote = self
            .quotes
            .get_mut(symbol)
            .ok_or_else(|| ChainError::from(MissingData::Symbol(SmolStr::new(symbol))))?;

        let step = (rng.random::<f64>() * 2.0 - 1.0) * tick_step;
        quote.spot_price = round_dp((quote.spot_price + step).max(1.0), 2);
        quote.recompute_change();

        for row in quote.strikes.iter_mut() {
            for side in Side::ALL {
                perturb(rng, side, row.leg_mut(side));
            }
        }

        debug!(
            %symbol,
            spot = quote.spot_price,
            change = quote.change,
            "applied tick"
        );
        Ok(quote)
    }
}

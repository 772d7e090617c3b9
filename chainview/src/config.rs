//! Runtime configuration for the chain engine.
//!
//! Defaults reproduce the NIFTY / BANKNIFTY mock session. A JSON file named by `CHAINVIEW_CONFIG`
//! replaces the defaults, after which `CHAINVIEW_SEED` and `CHAINVIEW_ROWS_PER_SIDE` are applied.

use std::{collections::HashSet, path::Path, time::Duration};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use tracing::warn;

use crate::error::ChainError;

/// Starting state for one instrument.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct InstrumentSeed {
    pub symbol: SmolStr,
    pub spot_price: f64,
    /// Change reported before the first tick.
    pub change: f64,
    pub percent_change: f64,
    pub expiry_dates: Vec<NaiveDate>,
    /// Maximum spot move per live tick.
    pub tick_step: f64,
    /// Maximum spot move per minute of historical random walk.
    pub walk_step: f64,
}

impl InstrumentSeed {
    pub fn new(symbol: &str, spot_price: f64, change: f64, percent_change: f64, walk_step: f64) -> Self {
        Self {
            symbol: SmolStr::new(symbol),
            spot_price,
            change,
            percent_change,
            expiry_dates: default_expiries(),
            tick_step: 5.0,
            walk_step,
        }
    }
}

fn default_expiries() -> Vec<NaiveDate> {
    [(2024, 6, 27), (2024, 7, 4), (2024, 7, 11), (2024, 7, 18)]
        .into_iter()
        .filter_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d))
        .collect()
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ChainConfig {
    pub strike_interval: f64,
    pub strike_count: usize,
    pub rows_per_side: usize,
    /// Maximum drift (in scroll units) for the raw offset to be accepted on restore.
    pub scroll_tolerance: f64,
    /// Height of one rendered row in scroll units.
    pub row_height: f64,
    #[serde(with = "millis")]
    pub tick_period: Duration,
    #[serde(with = "millis")]
    pub chart_period: Duration,
    pub session_minutes: usize,
    pub graph_points: usize,
    pub zoom_min: u16,
    pub zoom_max: u16,
    pub zoom_step: u16,
    pub zoom_default: u16,
    /// Fixed RNG seed for reproducible sessions.
    pub seed: Option<u64>,
    pub instruments: Vec<InstrumentSeed>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            strike_interval: 50.0,
            strike_count: 150,
            rows_per_side: 35,
            scroll_tolerance: 50.0,
            row_height: 1.0,
            tick_period: Duration::from_millis(1500),
            chart_period: Duration::from_millis(1000),
            session_minutes: 390,
            graph_points: 20,
            zoom_min: 70,
            zoom_max: 150,
            zoom_step: 2,
            zoom_default: 100,
            seed: None,
            instruments: vec![
                InstrumentSeed::new("NIFTY", 22445.65, 125.30, 0.56, 5.0),
                InstrumentSeed::new("BANKNIFTY", 48756.25, 320.45, 0.66, 15.0),
            ],
        }
    }
}

impl ChainConfig {
    /// Load configuration from the environment, falling back to defaults.
    pub fn from_env() -> Result<Self, ChainError> {
        let mut config = match std::env::var("CHAINVIEW_CONFIG") {
            Ok(path) => Self::from_json_file(path)?,
            Err(_) => Self::default(),
        };

        if let Ok(seed) = std::env::var("CHAINVIEW_SEED") {
            match seed.trim().parse::<u64>() {
                Ok(seed) => config.seed = Some(seed),
                Err(error) => warn!(%seed, %error, "ignoring unparsable CHAINVIEW_SEED"),
            }
        }

        if let Ok(rows) = std::env::var("CHAINVIEW_ROWS_PER_SIDE") {
            match rows.trim().parse::<usize>() {
                Ok(rows) => config.rows_per_side = rows,
                Err(error) => warn!(%rows, %error, "ignoring unparsable CHAINVIEW_ROWS_PER_SIDE"),
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ChainError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|error| ChainError::Config(format!("{}: {error}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|error| ChainError::Config(format!("{}: {error}", path.display())))
    }

    pub fn validate(&self) -> Result<(), ChainError> {
        if !(self.strike_interval > 0.0) {
            return Err(ChainError::Config("strike_interval must be positive".to_string()));
        }
        if self.strike_count == 0 {
            return Err(ChainError::Config("strike_count must be positive".to_string()));
        }
        if self.session_minutes == 0 {
            return Err(ChainError::Config("session_minutes must be positive".to_string()));
        }
        if self.tick_period.is_zero() || self.chart_period.is_zero() {
            return Err(ChainError::Config("timer periods must be non-zero".to_string()));
        }
        if !(self.row_height > 0.0) {
            return Err(ChainError::Config("row_height must be positive".to_string()));
        }
        if self.zoom_min > self.zoom_max
            || !(self.zoom_min..=self.zoom_max).contains(&self.zoom_default)
        {
            return Err(ChainError::Config(format!(
                "zoom_default {} outside [{}, {}]",
                self.zoom_default, self.zoom_min, self.zoom_max
            )));
        }
        if self.instruments.is_empty() {
            return Err(ChainError::Config("at least one instrument is required".to_string()));
        }

        let mut symbols = HashSet::new();
        for seed in &self.instruments {
            if !symbols.insert(seed.symbol.clone()) {
                return Err(ChainError::Config(format!("duplicate symbol {}", seed.symbol)));
            }
            if !(seed.spot_price > 0.0) {
                return Err(ChainError::Config(format!(
                    "{} spot price must be positive",
                    seed.symbol
                )));
            }
        }

        // Each instrument walks with its own volatility.
        for (index, seed) in self.instruments.iter().enumerate() {
            if let Some(other) = self.instruments[index + 1..]
                .iter()
                .find(|other| other.walk_step == seed.walk_step)
            {
                return Err(ChainError::Config(format!(
                    "{} and {} share walk_step {}",
                    seed.symbol, other.symbol, seed.walk_step
                )));
            }
        }

        Ok(())
    }

    pub fn seed(&self, symbol: &str) -> Option<&InstrumentSeed> {
        self.instruments.iter().find(|seed| seed.symbol == symbol)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_rows_per_side(mut self, rows: usize) -> Self {
        self.rows_per_side = rows;
        self
    }

    pub fn with_strike_count(mut self, count: usize) -> Self {
        self.strike_count = count;
        self
    }

    pub fn with_instruments(mut self, instruments: Vec<InstrumentSeed>) -> Self {
        self.instruments = instruments;
        self
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ChainConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.instruments.len(), 2);
        assert_eq!(config.seed("NIFTY").map(|s| s.walk_step), Some(5.0));
        assert_eq!(config.seed("BANKNIFTY").map(|s| s.walk_step), Some(15.0));
    }

    #[test]
    fn test_config_validate() {
        struct TestCase {
            input: ChainConfig,
            expected: bool,
        }

        let base = ChainConfig::default();
        let tests = vec![
            TestCase {
                // TC0: defaults
                input: base.clone(),
                expected: true,
            },
            TestCase {
                // TC1: zero strike count
                input: base.clone().with_strike_count(0),
                expected: false,
            },
            TestCase {
                // TC2: duplicate symbols
                input: base.clone().with_instruments(vec![
                    InstrumentSeed::new("NIFTY", 100.0, 0.0, 0.0, 5.0),
                    InstrumentSeed::new("NIFTY", 200.0, 0.0, 0.0, 15.0),
                ]),
                expected: false,
            },
            TestCase {
                // TC3: shared walk volatility
                input: base.clone().with_instruments(vec![
                    InstrumentSeed::new("NIFTY", 100.0, 0.0, 0.0, 5.0),
                    InstrumentSeed::new("BANKNIFTY", 200.0, 0.0, 0.0, 5.0),
                ]),
                expected: false,
            },
            TestCase {
                // TC4: no instruments
                input: base.clone().with_instruments(vec![]),
                expected: false,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = test.input.validate().is_ok();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_config_json_partial_override() {
        let config: ChainConfig =
            serde_json::from_str(r#"{ "rows_per_side": 10, "tick_period": 250 }"#).unwrap();
        assert_eq!(config.rows_per_side, 10);
        assert_eq!(config.tick_period, Duration::from_millis(250));
        assert_eq!(config.strike_interval, 50.0);
        assert_eq!(config.instruments.len(), 2);
    }
}

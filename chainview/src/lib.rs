/// Chainview - Options Chain View-State Engine
///
/// This library holds everything an options-chain viewer needs apart from drawing:
/// - A synthetic quote feed with per-instrument strike ladders and live ticks
/// - Per-minute historical sessions with a playback scrubber
/// - Column ranking with primary/secondary highlights and trend arrows
/// - Windowed table reconciliation that keeps the user's scroll focus across updates
///
/// [`ChainApp`] ties these together behind a timer-driven, single-threaded state object.
pub mod app;
pub mod config;
pub mod display;
pub mod error;
pub mod feed;
pub mod graph;
pub mod history;
pub mod model;
pub mod prefs;
pub mod schedule;
pub mod scrubber;
pub mod store;
pub mod synth;
pub mod trend;
pub mod view;

// Re-export commonly used types for convenience
pub use app::{ChainApp, ChainView, Expiry, Mode, QuoteHeader};
pub use config::{ChainConfig, InstrumentSeed};
pub use display::{Theme, Zoom};
pub use error::{ChainError, MissingData};
pub use feed::{ChainFeed, SyntheticFeed};
pub use graph::DetailGraph;
pub use model::{HistoricalSnapshot, InstrumentQuote, Ladder, MetricKind, OptionMetrics, Side, StrikeRow};
pub use prefs::{FilePreferences, MemoryPreferences, PreferenceStore};
pub use schedule::{Schedule, TaskKind};
pub use scrubber::{PlaybackState, Scrubber, SPEEDS};
pub use trend::{CellRank, Highlight, Trend, TrendBoard, TrendKey, TrendMemory, TrendReport};
pub use view::{RenderedChain, RenderedRow, RestoreMethod, Viewport, reconcile};

//! The application-state object.
//!
//! [`ChainApp`] owns everything the viewer mutates: the feed, the schedule, the scrubber, trend
//! memory and the last render. The presentation layer drives it through the public operations and
//! [`ChainApp::on_timer`], then reads [`ChainApp::view`].

use std::time::Instant;

use chrono::{Local, NaiveDate, NaiveDateTime};
use rand::{SeedableRng, rngs::StdRng};
use smol_str::SmolStr;
use tracing::{debug, info, warn};

use crate::{
    config::ChainConfig,
    display::{THEME_KEY, Theme, Zoom},
    error::{ChainError, MissingData},
    feed::{ChainFeed, SyntheticFeed},
    graph::DetailGraph,
    model::{InstrumentQuote, Side, StrikeRow},
    prefs::PreferenceStore,
    schedule::{Schedule, TaskKind},
    scrubber::{PlaybackEvent, Scrubber, TimerChange},
    trend::{TrendBoard, TrendMemory},
    view::{self, ReconcileSettings, RenderedChain, Viewport, reconcile},
};

/// Expiry filter. Mock data is identical across expiries.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub enum Expiry {
    #[default]
    Current,
    Date(NaiveDate),
}

impl Expiry {
    pub fn label(&self) -> String {
        match self {
            Expiry::Current => "Current".to_string(),
            Expiry::Date(date) => date.format("%d-%b-%Y").to_string(),
        }
    }
}

/// Which source feeds the table.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Mode {
    Live,
    Historical(NaiveDate),
}

/// Instrument summary shown above the table.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct QuoteHeader {
    pub symbol: SmolStr,
    pub spot_price: f64,
    pub seed_spot: f64,
    pub change: f64,
    pub percent_change: f64,
    pub expiry_dates: Vec<NaiveDate>,
}

impl QuoteHeader {
    fn from_quote(quote: &InstrumentQuote) -> Self {
        Self {
            symbol: quote.symbol.clone(),
            spot_price: quote.spot_price,
            seed_spot: quote.seed_spot,
            change: quote.change,
            percent_change: quote.percent_change,
            expiry_dates: quote.expiry_dates.clone(),
        }
    }

    fn set_spot(&mut self, spot: f64) {
        self.spot_price = spot;
        self.change = spot - self.seed_spot;
        self.percent_change = if self.seed_spot > 0.0 {
            self.change / self.seed_spot * 100.0
        } else {
            0.0
        };
    }
}

/// Everything the presentation layer needs for one frame.
#[derive(Clone, Copy, Debug)]
pub struct ChainView<'a> {
    pub header: &'a QuoteHeader,
    pub expiry: Expiry,
    pub mode: Mode,
    pub scrubber: &'a Scrubber,
    pub rendered: Option<&'a RenderedChain>,
    pub trends: &'a TrendBoard,
    pub graph: Option<&'a DetailGraph>,
    pub viewport: Option<Viewport>,
    pub zoom: Zoom,
    pub theme: Theme,
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

pub struct ChainApp<F = SyntheticFeed> {
    config: ChainConfig,
    settings: ReconcileSettings,
    feed: F,
    symbols: Vec<SmolStr>,
    prefs: Option<Box<dyn PreferenceStore>>,
    schedule: Schedule,
    scrubber: Scrubber,
    memory: TrendMemory,
    trends: TrendBoard,
    rendered: Option<RenderedChain>,
    viewport: Option<Viewport>,
    header: QuoteHeader,
    symbol: SmolStr,
    expiry: Expiry,
    mode: Mode,
    graph: Option<DetailGraph>,
    zoom: Zoom,
    theme: Theme,
    rng: StdRng,
    clock: fn() -> NaiveDateTime,
}

impl ChainApp<SyntheticFeed> {
    /// Validate `config`, build the synthetic feed, start the live tick and render.
    pub fn initialize(config: ChainConfig, now: Instant) -> Result<Self, ChainError> {
        config.validate()?;
        let feed = SyntheticFeed::new(&config);
        Self::with_feed(config, feed, now)
    }
}

impl<F: ChainFeed> ChainApp<F> {
    pub fn with_feed(config: ChainConfig, feed: F, now: Instant) -> Result<Self, ChainError> {
        config.validate()?;
        let symbols = feed.symbols();
        let symbol = symbols
            .first()
            .cloned()
            .ok_or(ChainError::MissingData(MissingData::EmptyStore))?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1)),
            None => StdRng::from_os_rng(),
        };

        let mut app = Self {
            settings: ReconcileSettings::from(&config),
            scrubber: Scrubber::new(config.session_minutes),
            zoom: Zoom::from(&config),
            config,
            feed,
            symbols,
            prefs: None,
            schedule: Schedule::new(),
            memory: TrendMemory::new(),
            trends: TrendBoard::new(),
            rendered: None,
            viewport: None,
            header: QuoteHeader::default(),
            symbol,
            expiry: Expiry::Current,
            mode: Mode::Live,
            graph: None,
            theme: Theme::default(),
            rng,
            clock: local_now,
        };

        app.schedule.start(TaskKind::Tick, app.config.tick_period, now);
        app.render();
        info!(symbol = %app.symbol, "chain app initialised");
        Ok(app)
    }

    /// Attach a preference store and apply the saved theme.
    pub fn with_preferences(mut self, prefs: Box<dyn PreferenceStore>) -> Self {
        match prefs.get(THEME_KEY) {
            Ok(Some(value)) => match Theme::from_pref(&value) {
                Some(theme) => self.theme = theme,
                None => warn!(%value, "ignoring unrecognised theme preference"),
            },
            Ok(None) => {}
            Err(error) => warn!(%error, "failed to read theme preference"),
        }
        self.prefs = Some(prefs);
        self
    }

    /// Wall clock used for detail graph labels and the default historical date.
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    /// Cancel every task and drop view state.
    pub fn teardown(&mut self) {
        self.schedule.cancel_all();
        self.graph = None;
        self.rendered = None;
        self.memory.clear();
        self.trends = TrendBoard::new();
        info!("chain app torn down");
    }

    pub fn view(&self) -> ChainView<'_> {
        ChainView {
            header: &self.header,
            expiry: self.expiry,
            mode: self.mode,
            scrubber: &self.scrubber,
            rendered: self.rendered.as_ref(),
            trends: &self.trends,
            graph: self.graph.as_ref(),
            viewport: self.viewport,
            zoom: self.zoom,
            theme: self.theme,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn symbols(&self) -> &[SmolStr] {
        &self.symbols
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn scrubber(&self) -> &Scrubber {
        &self.scrubber
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn feed(&self) -> &F {
        &self.feed
    }

    pub fn feed_mut(&mut self) -> &mut F {
        &mut self.feed
    }

    pub fn rendered(&self) -> Option<&RenderedChain> {
        self.rendered.as_ref()
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.schedule.next_deadline()
    }

    // ------------------------------------------------------------------------
    // Instrument and expiry
    // ------------------------------------------------------------------------

    pub fn select_instrument(&mut self, symbol: &str) {
        if !self.symbols.iter().any(|known| known == symbol) {
            let error = ChainError::from(MissingData::Symbol(SmolStr::new(symbol)));
            warn!(%error, "ignoring instrument selection");
            return;
        }
        if self.symbol == symbol {
            return;
        }

        info!(from = %self.symbol, to = %symbol, "instrument selected");
        self.symbol = SmolStr::new(symbol);
        self.expiry = Expiry::Current;
        self.close_detail_graph();
        self.memory.clear();
        self.rendered = None;
        match self.feed.current(&self.symbol) {
            Ok(quote) => self.header = QuoteHeader::from_quote(quote),
            Err(error) => warn!(%error, "no live quote for selected instrument"),
        }

        if let Mode::Historical(_) = self.mode {
            if !self.feed.has_history(&self.symbol) {
                if let Err(error) = self.regenerate_history() {
                    warn!(%error, "failed to generate history for new instrument");
                }
            }
        }
        self.render();
        self.scroll_to_atm();
    }

    /// Select the next instrument in configuration order.
    pub fn cycle_instrument(&mut self) {
        let index = self
            .symbols
            .iter()
            .position(|symbol| *symbol == self.symbol)
            .unwrap_or(0);
        if let Some(next) = self.symbols.get((index + 1) % self.symbols.len().max(1)).cloned() {
            self.select_instrument(&next);
        }
    }

    pub fn expiry(&self) -> Expiry {
        self.expiry
    }

    pub fn select_expiry(&mut self, expiry: Expiry) {
        if let Expiry::Date(date) = expiry {
            if !self.header.expiry_dates.contains(&date) {
                let error = ChainError::from(MissingData::Expiry {
                    symbol: self.symbol.clone(),
                    expiry: expiry.label(),
                });
                warn!(%error, "ignoring expiry selection");
                return;
            }
        }
        debug!(expiry = %expiry.label(), "expiry selected");
        self.expiry = expiry;
        self.render();
    }

    /// Step through `Current` then each listed expiry.
    pub fn cycle_expiry(&mut self) {
        let dates = &self.header.expiry_dates;
        let next = match self.expiry {
            Expiry::Current => dates.first().copied().map(Expiry::Date),
            Expiry::Date(date) => dates
                .iter()
                .position(|listed| *listed == date)
                .and_then(|index| dates.get(index + 1))
                .copied()
                .map(Expiry::Date),
        };
        self.select_expiry(next.unwrap_or(Expiry::Current));
    }

    // ------------------------------------------------------------------------
    // Historical mode and playback
    // ------------------------------------------------------------------------

    pub fn enter_historical_mode(&mut self, date: NaiveDate, now: Instant) {
        self.schedule.cancel(TaskKind::Tick);
        self.mode = Mode::Historical(date);
        self.scrubber = Scrubber::new(self.config.session_minutes);
        self.schedule.cancel(TaskKind::Playback);
        info!(%date, symbol = %self.symbol, "entered historical mode");

        match self.regenerate_history() {
            Ok(()) => self.render(),
            Err(error) => {
                warn!(%error, "failed to generate history, staying live");
                self.mode = Mode::Live;
                self.schedule.start(TaskKind::Tick, self.config.tick_period, now);
            }
        }
    }

    pub fn exit_historical_mode(&mut self, now: Instant) {
        if self.mode == Mode::Live {
            return;
        }
        self.scrubber.stop();
        self.schedule.cancel(TaskKind::Playback);
        self.mode = Mode::Live;
        self.schedule.start(TaskKind::Tick, self.config.tick_period, now);
        info!("returned to live mode");
        self.render();
    }

    /// Start playback, entering historical mode for today if needed.
    pub fn play(&mut self, now: Instant) {
        match self.mode {
            Mode::Live => self.enter_historical_mode((self.clock)().date(), now),
            Mode::Historical(_) if !self.feed.has_history(&self.symbol) => {
                if let Err(error) = self.regenerate_history() {
                    warn!(%error, "cannot play without history");
                    return;
                }
            }
            Mode::Historical(_) => {}
        }
        if self.mode == Mode::Live {
            return;
        }
        let event = self.scrubber.play();
        self.apply_playback(event, now);
    }

    pub fn pause(&mut self, now: Instant) {
        let event = self.scrubber.pause();
        self.apply_playback(event, now);
    }

    pub fn stop(&mut self, now: Instant) {
        let event = self.scrubber.stop();
        self.apply_playback(event, now);
    }

    pub fn seek(&mut self, minute: usize, now: Instant) {
        let event = self.scrubber.seek(minute);
        self.apply_playback(event, now);
    }

    pub fn seek_by(&mut self, delta: isize, now: Instant) {
        self.seek(self.scrubber.minute().saturating_add_signed(delta), now);
    }

    pub fn set_speed(&mut self, speed: u32, now: Instant) {
        let event = self.scrubber.set_speed(speed);
        self.apply_playback(event, now);
    }

    pub fn cycle_speed(&mut self, faster: bool, now: Instant) {
        let event = self.scrubber.cycle_speed(faster);
        self.apply_playback(event, now);
    }

    fn apply_playback(&mut self, event: PlaybackEvent, now: Instant) {
        match event.timer {
            TimerChange::Keep => {}
            TimerChange::Start(period) => {
                self.schedule.start(TaskKind::Playback, period, now);
            }
            TimerChange::Cancel => {
                self.schedule.cancel(TaskKind::Playback);
            }
        }
        if let Some(minute) = event.render {
            if let Mode::Historical(_) = self.mode {
                self.render_historical(minute);
            }
        }
    }

    fn regenerate_history(&mut self) -> Result<(), ChainError> {
        let date = match self.mode {
            Mode::Historical(date) => date,
            Mode::Live => (self.clock)().date(),
        };
        self.feed.generate_history(&self.symbol, date).map(|_| ())
    }

    // ------------------------------------------------------------------------
    // Detail graph
    // ------------------------------------------------------------------------

    pub fn open_detail_graph(&mut self, strike: f64, side: Side, now: Instant) {
        let row = self.rendered.as_ref().and_then(|rendered| {
            rendered.row_for_strike(strike).map(|index| {
                let row = &rendered.rows[index];
                StrikeRow {
                    strike: row.strike,
                    call: row.call,
                    put: row.put,
                }
            })
        });
        let Some(row) = row else {
            let error = ChainError::from(MissingData::Strike {
                symbol: self.symbol.clone(),
                strike,
            });
            warn!(%error, "cannot open detail graph");
            return;
        };

        self.graph = Some(DetailGraph::open(
            &mut self.rng,
            &row,
            side,
            self.config.graph_points,
            (self.clock)(),
        ));
        self.schedule.start(TaskKind::Chart, self.config.chart_period, now);
        info!(strike = row.strike, %side, "detail graph opened");
    }

    /// Open the graph for the row nearest the viewport centre.
    pub fn open_focused_graph(&mut self, side: Side, now: Instant) {
        let strike = match (self.viewport, self.rendered.as_ref()) {
            (Some(viewport), Some(rendered)) => viewport
                .centre_row(rendered.rows.len())
                .map(|index| rendered.rows[index].strike),
            _ => None,
        };
        match strike {
            Some(strike) => self.open_detail_graph(strike, side, now),
            None => debug!(
                error = %ChainError::PresentationUnavailable("viewport"),
                "no focused row for detail graph"
            ),
        }
    }

    pub fn close_detail_graph(&mut self) {
        if self.graph.take().is_some() {
            debug!("detail graph closed");
        }
        self.schedule.cancel(TaskKind::Chart);
    }

    // ------------------------------------------------------------------------
    // Display settings
    // ------------------------------------------------------------------------

    pub fn zoom(&self) -> Zoom {
        self.zoom
    }

    pub fn set_zoom(&mut self, percent: u16) -> u16 {
        self.zoom.set(percent)
    }

    pub fn zoom_in(&mut self) -> u16 {
        self.zoom.zoom_in()
    }

    pub fn zoom_out(&mut self) -> u16 {
        self.zoom.zoom_out()
    }

    pub fn reset_zoom(&mut self) -> u16 {
        self.zoom.reset()
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn toggle_theme(&mut self) -> Theme {
        self.theme = self.theme.toggled();
        match self.prefs.as_mut() {
            Some(prefs) => {
                if let Err(error) = prefs.set(THEME_KEY, self.theme.as_pref()) {
                    warn!(%error, "failed to persist theme");
                }
            }
            None => debug!(
                error = %ChainError::PresentationUnavailable("preference store"),
                "theme not persisted"
            ),
        }
        self.theme
    }

    // ------------------------------------------------------------------------
    // Scrolling
    // ------------------------------------------------------------------------

    /// Report the visible table height. The first report centres the ATM row.
    pub fn set_viewport(&mut self, height: f64) {
        let first = self.viewport.is_none();
        let mut viewport = Viewport {
            offset: self.viewport.map(|viewport| viewport.offset).unwrap_or_default(),
            height,
            row_height: self.config.row_height,
        };
        if let Some(rendered) = &self.rendered {
            viewport.offset = viewport.clamp_offset(viewport.offset, rendered.rows.len());
        }
        self.viewport = Some(viewport);
        if first {
            self.scroll_to_atm();
        }
    }

    pub fn scroll_by(&mut self, delta: f64) {
        if let (Some(viewport), Some(rendered)) = (self.viewport.as_mut(), self.rendered.as_ref()) {
            viewport.offset = viewport.clamp_offset(viewport.offset + delta, rendered.rows.len());
        }
    }

    pub fn scroll_to_atm(&mut self) {
        match (self.viewport.as_mut(), self.rendered.as_ref()) {
            (Some(viewport), Some(rendered)) => {
                if let Some(offset) = view::scroll_to_atm(viewport, rendered) {
                    viewport.offset = offset;
                }
            }
            _ => debug!(
                error = %ChainError::PresentationUnavailable("viewport"),
                "skipping scroll to ATM"
            ),
        }
    }

    // ------------------------------------------------------------------------
    // Timers and rendering
    // ------------------------------------------------------------------------

    /// Run every task due at `now`, skipping any cancelled by an earlier one.
    pub fn on_timer(&mut self, now: Instant) {
        for task in self.schedule.due(now) {
            if !self.schedule.is_live(&task) {
                debug!(kind = %task.kind, "skipping cancelled task");
                continue;
            }
            match task.kind {
                TaskKind::Tick => self.on_tick(),
                TaskKind::Playback => {
                    let event = self.scrubber.advance();
                    self.apply_playback(event, now);
                }
                TaskKind::Chart => match self.graph.as_mut() {
                    Some(graph) => graph.refresh(&mut self.rng, (self.clock)()),
                    None => {
                        self.schedule.cancel(TaskKind::Chart);
                    }
                },
            }
        }
    }

    fn on_tick(&mut self) {
        if self.mode != Mode::Live {
            return;
        }
        if let Err(error) = self.feed.next_tick(&self.symbol).map(|_| ()) {
            warn!(%error, symbol = %self.symbol, "tick failed");
        }
        self.render_live();
    }

    /// Re-render the active snapshot.
    pub fn render(&mut self) {
        match self.mode {
            Mode::Live => self.render_live(),
            Mode::Historical(_) => self.render_historical(self.scrubber.minute()),
        }
    }

    fn reconcile_live(&mut self) -> Result<RenderedChain, ChainError> {
        let quote = self.feed.current(&self.symbol)?;
        self.header = QuoteHeader::from_quote(quote);
        reconcile(
            quote,
            self.rendered.as_ref(),
            self.viewport.as_ref(),
            &mut self.memory,
            &self.settings,
        )
    }

    fn reconcile_minute(&mut self, minute: usize) -> Result<RenderedChain, ChainError> {
        let snapshot = self.feed.snapshot_at(&self.symbol, minute)?;
        reconcile(
            snapshot,
            self.rendered.as_ref(),
            self.viewport.as_ref(),
            &mut self.memory,
            &self.settings,
        )
    }

    fn render_live(&mut self) {
        let outcome = self.reconcile_live();
        self.commit_render(outcome);
    }

    fn render_historical(&mut self, minute: usize) {
        let outcome = match self.reconcile_minute(minute) {
            Err(ChainError::MissingData(missing)) => {
                warn!(%missing, minute, "historical snapshot missing, regenerating session");
                self.regenerate_history()
                    .and_then(|()| self.reconcile_minute(minute))
            }
            other => other,
        };
        let outcome = match outcome {
            Err(ChainError::MalformedSnapshot(reason)) => {
                warn!(%reason, minute, "rejecting historical snapshot, falling back to live quote");
                self.reconcile_live()
            }
            other => other,
        };
        if let Ok(chain) = &outcome {
            self.header.set_spot(chain.spot_price);
        }
        self.commit_render(outcome);
    }

    fn commit_render(&mut self, outcome: Result<RenderedChain, ChainError>) {
        match outcome {
            Ok(chain) => {
                if let Some(viewport) = self.viewport.as_mut() {
                    viewport.offset = chain.offset;
                }
                self.trends.commit(chain.trends);
                self.rendered = Some(chain);
            }
            Err(error) => {
                warn!(%error, recoverable = error.is_recoverable(), "render skipped, keeping previous view");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{prefs::MemoryPreferences, scrubber::PlaybackState};
    use std::time::Duration;

    fn fixed_clock() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 27)
            .and_then(|date| date.and_hms_opt(10, 30, 0))
            .unwrap_or_default()
    }

    fn app(now: Instant) -> ChainApp {
        let config = ChainConfig::default().with_seed(7);
        ChainApp::initialize(config, now).unwrap().with_clock(fixed_clock)
    }

    #[test]
    fn test_initialize_renders_live_chain() {
        let now = Instant::now();
        let app = app(now);
        let view = app.view();

        assert_eq!(view.header.symbol, "NIFTY");
        assert_eq!(view.mode, Mode::Live);
        let rendered = view.rendered.unwrap();
        assert_eq!(rendered.rows.len(), 71);
        assert_eq!(rendered.rows[rendered.atm_row().unwrap()].strike, 22450.0);
        assert!(app.schedule().is_running(TaskKind::Tick));
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let config = ChainConfig::default().with_strike_count(0);
        let result = ChainApp::initialize(config, Instant::now());
        assert!(matches!(result, Err(ChainError::Config(_))));
    }

    #[test]
    fn test_timer_ticks_live_quote() {
        let now = Instant::now();
        let mut app = app(now);
        let before = app.view().header.spot_price;

        app.on_timer(now + Duration::from_millis(1499));
        assert_eq!(app.view().header.spot_price, before);

        let mut moved = false;
        for step in 1..=5 {
            app.on_timer(now + Duration::from_millis(1500 * step));
            moved |= app.view().header.spot_price != before;
        }
        assert!(moved);
        let header = app.view().header;
        assert!((header.change - (header.spot_price - 22445.65)).abs() < 1e-6);
    }

    #[test]
    fn test_select_instrument() {
        let mut app = app(Instant::now());
        app.select_instrument("SENSEX");
        assert_eq!(app.symbol(), "NIFTY");

        app.select_instrument("BANKNIFTY");
        assert_eq!(app.symbol(), "BANKNIFTY");
        assert_eq!(app.view().header.spot_price, 48756.25);

        app.cycle_instrument();
        assert_eq!(app.symbol(), "NIFTY");
    }

    #[test]
    fn test_select_expiry() {
        let mut app = app(Instant::now());
        let listed = NaiveDate::from_ymd_opt(2024, 7, 4).unwrap();
        app.select_expiry(Expiry::Date(listed));
        assert_eq!(app.expiry(), Expiry::Date(listed));

        let unlisted = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        app.select_expiry(Expiry::Date(unlisted));
        assert_eq!(app.expiry(), Expiry::Date(listed));

        app.select_expiry(Expiry::Current);
        app.cycle_expiry();
        assert_eq!(
            app.expiry(),
            Expiry::Date(NaiveDate::from_ymd_opt(2024, 6, 27).unwrap())
        );
        assert_eq!(app.expiry().label(), "27-Jun-2024");
    }

    #[test]
    fn test_historical_mode_swaps_tasks() {
        let now = Instant::now();
        let mut app = app(now);
        let date = NaiveDate::from_ymd_opt(2024, 6, 27).unwrap();

        app.enter_historical_mode(date, now);
        assert_eq!(app.mode(), Mode::Historical(date));
        assert!(!app.schedule().is_running(TaskKind::Tick));
        assert_eq!(app.view().rendered.unwrap().time_label.as_deref(), Some("09:15"));

        app.play(now);
        assert!(app.schedule().is_running(TaskKind::Playback));
        app.on_timer(now + Duration::from_millis(1000));
        assert_eq!(app.scrubber().minute(), 1);
        assert_eq!(app.view().rendered.unwrap().time_label.as_deref(), Some("09:16"));

        app.exit_historical_mode(now + Duration::from_millis(1000));
        assert_eq!(app.mode(), Mode::Live);
        assert!(!app.schedule().is_running(TaskKind::Playback));
        assert!(app.schedule().is_running(TaskKind::Tick));
        assert_eq!(app.scrubber().state(), PlaybackState::Stopped);
        assert_eq!(app.view().rendered.unwrap().time_label, None);
    }

    #[test]
    fn test_play_from_live_enters_historical_mode() {
        let now = Instant::now();
        let mut app = app(now);
        app.play(now);
        assert_eq!(app.mode(), Mode::Historical(fixed_clock().date()));
        assert_eq!(app.scrubber().state(), PlaybackState::Playing);

        app.stop(now);
        assert_eq!(app.scrubber().minute(), 0);
        assert_eq!(app.scrubber().state(), PlaybackState::Stopped);
        assert!(!app.schedule().is_running(TaskKind::Playback));
    }

    #[test]
    fn test_set_speed_restarts_playback_period() {
        let now = Instant::now();
        let mut app = app(now);
        app.play(now);
        app.set_speed(10, now);
        assert_eq!(
            app.schedule().period(TaskKind::Playback),
            Some(Duration::from_millis(100))
        );
        app.on_timer(now + Duration::from_millis(100));
        assert_eq!(app.scrubber().minute(), 1);
    }

    #[test]
    fn test_playback_deadlines_follow_caller_clock() {
        let now = Instant::now();
        let mut app = app(now);
        app.play(now);
        assert_eq!(app.next_deadline(), Some(now + Duration::from_millis(1000)));

        app.pause(now + Duration::from_millis(400));
        assert_eq!(app.next_deadline(), None);

        let resume = now + Duration::from_millis(5000);
        app.play(resume);
        assert_eq!(app.next_deadline(), Some(resume + Duration::from_millis(1000)));

        app.seek(45, resume);
        assert_eq!(app.next_deadline(), Some(resume + Duration::from_millis(1000)));
        assert_eq!(app.view().rendered.unwrap().time_label.as_deref(), Some("09:60"));

        app.stop(resume);
        assert_eq!(app.next_deadline(), None);
    }

    #[test]
    fn test_detail_graph_lifecycle() {
        let now = Instant::now();
        let mut app = app(now);

        app.open_detail_graph(99999.0, Side::Call, now);
        assert!(app.view().graph.is_none());

        app.open_detail_graph(22450.0, Side::Put, now);
        let graph = app.view().graph.unwrap();
        assert_eq!(graph.len(), 20);
        assert_eq!(graph.labels().last(), Some("10:30"));
        assert!(app.schedule().is_running(TaskKind::Chart));

        app.on_timer(now + Duration::from_millis(1000));
        assert_eq!(app.view().graph.unwrap().len(), 20);

        app.close_detail_graph();
        assert!(app.view().graph.is_none());
        assert!(!app.schedule().is_running(TaskKind::Chart));
    }

    #[test]
    fn test_theme_persists_to_preferences() {
        let mut prefs = MemoryPreferences::new();
        prefs.set(THEME_KEY, "true").unwrap();
        let mut saved = app(Instant::now()).with_preferences(Box::new(prefs));
        assert_eq!(saved.theme(), Theme::Dark);
        assert_eq!(saved.toggle_theme(), Theme::Light);
        assert_eq!(saved.toggle_theme(), Theme::Dark);

        // No store attached: the toggle still works.
        let mut bare = app(Instant::now());
        assert_eq!(bare.toggle_theme(), Theme::Dark);
    }

    #[test]
    fn test_zoom_operations() {
        let mut app = app(Instant::now());
        assert_eq!(app.set_zoom(10), 70);
        assert_eq!(app.zoom_in(), 72);
        assert_eq!(app.reset_zoom(), 100);
        assert_eq!(app.zoom_out(), 98);
    }

    #[test]
    fn test_viewport_scrolls_to_atm() {
        let mut app = app(Instant::now());
        app.set_viewport(21.0);
        let offset = app.viewport().unwrap().offset;
        assert_eq!(offset, 25.0);

        app.scroll_by(-10.0);
        assert_eq!(app.viewport().unwrap().offset, 15.0);
        app.scroll_by(-100.0);
        assert_eq!(app.viewport().unwrap().offset, 0.0);
        app.scroll_to_atm();
        assert_eq!(app.viewport().unwrap().offset, 25.0);
    }

    #[test]
    fn test_render_recovers_lost_store() {
        let mut app = app(Instant::now());
        app.feed_mut().store_mut().clear();
        app.render();
        let rendered = app.view().rendered.unwrap();
        assert_eq!(rendered.rows.len(), 71);
        assert!(!app.feed().store().is_empty());
    }

    #[test]
    fn test_teardown_stops_tasks() {
        let now = Instant::now();
        let mut app = app(now);
        app.teardown();
        assert_eq!(app.next_deadline(), None);
        assert!(app.view().rendered.is_none());
        app.on_timer(now + Duration::from_secs(10));
        assert!(app.view().rendered.is_none());
    }
}

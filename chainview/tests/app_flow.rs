use std::time::{Duration, Instant};

use chainview::{
    ChainApp, ChainConfig, ChainFeed, Highlight, MemoryPreferences, MetricKind, Mode,
    PlaybackState, PreferenceStore, RestoreMethod, Side, TaskKind, Theme, TrendKey,
};
use chrono::{NaiveDate, NaiveDateTime};

fn clock() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 27)
        .and_then(|date| date.and_hms_opt(11, 0, 0))
        .unwrap()
}

fn app(now: Instant) -> ChainApp {
    ChainApp::initialize(ChainConfig::default().with_seed(2024), now)
        .unwrap()
        .with_clock(clock)
}

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

#[test]
fn test_live_ticks_keep_table_consistent() {
    let start = Instant::now();
    let mut app = app(start);
    app.set_viewport(21.0);

    for step in 1..=20 {
        app.on_timer(start + ms(1500 * step));

        let view = app.view();
        let rendered = view.rendered.unwrap();
        assert!(!rendered.rows.is_empty());
        assert!(rendered.rows.len() <= 71);
        assert!(rendered.rows.windows(2).all(|pair| pair[0].strike < pair[1].strike));
        assert!(rendered.rows.iter().filter(|row| row.flags.atm).count() <= 1);
        assert!(rendered.rows.iter().all(|row| !(row.flags.call_itm && row.flags.put_itm)));
        assert!(rendered.rows.iter().all(|row| row.call.satisfies_invariants(Side::Call)));
        assert!(rendered.rows.iter().all(|row| row.put.satisfies_invariants(Side::Put)));
        assert!(rendered.restore.is_some());

        for key in TrendKey::all() {
            let report = &rendered.reports[&key];
            let primaries = report
                .ranks
                .iter()
                .filter(|rank| rank.highlight == Some(Highlight::Primary))
                .count();
            assert!(primaries <= 1);
            assert!(report.ranks.iter().all(|rank| rank.percentage <= 100));
        }
    }
}

#[test]
fn test_scroll_position_survives_ticks() {
    let start = Instant::now();
    let mut app = app(start);
    app.set_viewport(21.0);
    app.scroll_by(-7.0);
    let before = app.viewport().unwrap().offset;

    app.on_timer(start + ms(1500));
    let rendered = app.view().rendered.unwrap();
    assert_eq!(rendered.restore, Some(RestoreMethod::Offset));
    assert_eq!(app.viewport().unwrap().offset, before);
}

#[test]
fn test_historical_playback_session() {
    let start = Instant::now();
    let mut app = app(start);

    app.play(start);
    assert_eq!(app.mode(), Mode::Historical(clock().date()));
    assert!(app.feed().has_history("NIFTY"));
    assert!(!app.schedule().is_running(TaskKind::Tick));

    app.set_speed(10, start);
    for step in 1..=5 {
        app.on_timer(start + ms(100 * step));
    }
    assert_eq!(app.scrubber().minute(), 5);
    assert_eq!(app.scrubber().time_label(), "09:20 AM");
    assert_eq!(app.view().rendered.unwrap().time_label.as_deref(), Some("09:20"));

    app.pause(start + ms(500));
    app.on_timer(start + ms(10_000));
    assert_eq!(app.scrubber().minute(), 5);
    assert_eq!(app.scrubber().state(), PlaybackState::Paused);

    app.seek(45, start + ms(10_000));
    assert_eq!(app.scrubber().time_label(), "09:60 AM");
    assert_eq!(app.view().rendered.unwrap().time_label.as_deref(), Some("09:60"));

    app.seek(1_000, start + ms(10_000));
    assert_eq!(app.scrubber().minute(), 389);
    assert_eq!(app.scrubber().time_label(), "03:44 PM");
    assert_eq!(app.view().rendered.unwrap().time_label.as_deref(), Some("15:44"));

    // Resume at the last minute: the next advance ends the session.
    let resume = start + ms(10_000);
    app.play(resume);
    app.on_timer(resume + ms(100));
    assert_eq!(app.scrubber().state(), PlaybackState::Stopped);
    assert_eq!(app.scrubber().minute(), 0);
    assert!(!app.schedule().is_running(TaskKind::Playback));

    app.exit_historical_mode(resume + ms(100));
    assert_eq!(app.mode(), Mode::Live);
    assert!(app.schedule().is_running(TaskKind::Tick));
}

#[test]
fn test_switching_instrument_in_historical_mode() {
    let start = Instant::now();
    let mut app = app(start);
    let date = NaiveDate::from_ymd_opt(2024, 6, 20).unwrap();

    app.enter_historical_mode(date, start);
    app.select_instrument("BANKNIFTY");
    assert_eq!(app.symbol(), "BANKNIFTY");
    assert!(app.feed().has_history("BANKNIFTY"));

    let view = app.view();
    assert_eq!(view.header.symbol, "BANKNIFTY");
    let rendered = view.rendered.unwrap();
    assert_eq!(rendered.time_label.as_deref(), Some("09:15"));
    let atm = rendered.atm_row().unwrap();
    assert!(rendered.rows[atm].strike >= rendered.spot_price);
}

#[test]
fn test_detail_graph_refresh() {
    let start = Instant::now();
    let mut app = app(start);
    let strike = {
        let rendered = app.view().rendered.unwrap();
        rendered.rows[rendered.atm_row().unwrap()].strike
    };

    app.open_detail_graph(strike, Side::Call, start);
    let graph = app.view().graph.unwrap();
    assert_eq!(graph.title(), format!("OI Change Comparison for Strike {}", strike));
    assert_eq!(graph.labels().next(), Some("10:41"));

    for step in 1..=3 {
        app.on_timer(start + ms(1000 * step));
    }
    let graph = app.view().graph.unwrap();
    assert_eq!(graph.len(), 20);
    assert_eq!(graph.series(Side::Put).len(), 20);

    app.select_instrument("BANKNIFTY");
    assert!(app.view().graph.is_none());
    assert!(!app.schedule().is_running(TaskKind::Chart));
}

#[test]
fn test_display_settings() {
    let mut prefs = MemoryPreferences::new();
    prefs.set("darkMode", "false").unwrap();
    let mut app = app(Instant::now()).with_preferences(Box::new(prefs));

    assert_eq!(app.theme(), Theme::Light);
    assert_eq!(app.toggle_theme(), Theme::Dark);
    assert!(app.view().theme.is_dark());

    assert_eq!(app.set_zoom(500), 150);
    assert_eq!(app.zoom_out(), 148);
    assert_eq!(app.reset_zoom(), 100);
}

#[test]
fn test_render_after_store_loss() {
    let start = Instant::now();
    let mut app = app(start);
    app.feed_mut().store_mut().clear();

    app.on_timer(start + ms(1500));
    let rendered = app.view().rendered.unwrap();
    assert_eq!(rendered.rows.len(), 71);
    assert!(app.feed().store().get("NIFTY").is_ok());

    let key = TrendKey::new(MetricKind::Volume, Side::Call);
    assert!(rendered.reports.contains_key(&key));
}

/// Chainview - Options Chain Terminal
///
/// Single-screen options-chain viewer:
/// - CALL | Strike | PUT table windowed around the at-the-money strike
/// - Trend arrows on the Volume, OI and OI Change headers
/// - Historical session playback with scrubbing and speed control
/// - OI-change comparison chart for the focused strike
mod ui;

use std::{
    error::Error,
    fs::File,
    io,
    sync::Mutex,
    time::{Duration, Instant},
};

use chainview::{ChainApp, ChainConfig, FilePreferences, Mode, PlaybackState, Side};
use chrono::Local;
use crossterm::{
    event::{
        DisableMouseCapture, EnableMouseCapture, Event, EventStream, KeyCode, KeyEvent,
        KeyEventKind,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures::StreamExt;
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::{error, info};

/// Wake-up interval when no timer task is scheduled.
const IDLE_WAKE: Duration = Duration::from_millis(500);

/// Minutes moved by the coarse seek keys.
const SEEK_JUMP: isize = 15;

/// Get log file path from CHAINVIEW_LOG env var (default: chainview.log)
fn log_path() -> String {
    std::env::var("CHAINVIEW_LOG").unwrap_or_else(|_| "chainview.log".to_string())
}

/// Get preference file path from CHAINVIEW_PREFS env var (default: chainview-prefs.json)
fn prefs_path() -> String {
    std::env::var("CHAINVIEW_PREFS").unwrap_or_else(|_| "chainview-prefs.json".to_string())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    init_logging()?;

    let config = ChainConfig::from_env()?;
    let mut app = ChainApp::initialize(config, Instant::now())?
        .with_preferences(Box::new(FilePreferences::new(prefs_path())));

    // Setup panic hook to restore terminal on crash
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        original_hook(panic_info);
    }));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run(&mut terminal, &mut app).await;
    if let Err(error) = &result {
        error!(%error, "chainview exited with error");
    }
    app.teardown();

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    result
}

async fn run(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut ChainApp,
) -> Result<(), Box<dyn Error>> {
    let mut events = EventStream::new();

    loop {
        terminal.draw(|f| {
            let graph_open = app.view().graph.is_some();
            let height = ui::table_rows(f.area(), graph_open);
            if app.viewport().map(|viewport| viewport.height) != Some(height) {
                app.set_viewport(height);
            }
            ui::render(f, &app.view());
        })?;

        let deadline = app
            .next_deadline()
            .unwrap_or_else(|| Instant::now() + IDLE_WAKE);

        tokio::select! {
            _ = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)) => {
                app.on_timer(Instant::now());
            }
            event = events.next() => match event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    if !handle_key(app, key) {
                        break;
                    }
                }
                // Resize and other events only need a redraw
                Some(Ok(_)) => {}
                Some(Err(error)) => return Err(error.into()),
                None => break,
            },
        }
    }

    info!("chainview quit");
    Ok(())
}

/// Apply one key press. Returns `false` to quit.
fn handle_key(app: &mut ChainApp, key: KeyEvent) -> bool {
    let page = app
        .viewport()
        .map(|viewport| (viewport.height - 1.0).max(1.0))
        .unwrap_or(10.0);
    let now = Instant::now();

    match key.code {
        KeyCode::Char('q') => return false,
        KeyCode::Esc => app.close_detail_graph(),

        // Scrolling
        KeyCode::Up | KeyCode::Char('k') => app.scroll_by(-1.0),
        KeyCode::Down | KeyCode::Char('j') => app.scroll_by(1.0),
        KeyCode::PageUp => app.scroll_by(-page),
        KeyCode::PageDown => app.scroll_by(page),
        KeyCode::Char('a') | KeyCode::Home => app.scroll_to_atm(),

        // Instrument and expiry
        KeyCode::Char('s') => app.cycle_instrument(),
        KeyCode::Char('e') => app.cycle_expiry(),

        // Historical mode and playback
        KeyCode::Char('h') => match app.mode() {
            Mode::Live => app.enter_historical_mode(Local::now().date_naive(), now),
            Mode::Historical(_) => app.exit_historical_mode(now),
        },
        KeyCode::Char(' ') => match app.scrubber().state() {
            PlaybackState::Playing => app.pause(now),
            PlaybackState::Stopped | PlaybackState::Paused => app.play(now),
        },
        KeyCode::Char('x') => app.stop(now),
        KeyCode::Left | KeyCode::Char('[') => app.seek_by(-1, now),
        KeyCode::Right | KeyCode::Char(']') => app.seek_by(1, now),
        KeyCode::Char('{') => app.seek_by(-SEEK_JUMP, now),
        KeyCode::Char('}') => app.seek_by(SEEK_JUMP, now),
        KeyCode::Char('<') | KeyCode::Char(',') => app.cycle_speed(false, now),
        KeyCode::Char('>') | KeyCode::Char('.') => app.cycle_speed(true, now),

        // Detail graph
        KeyCode::Enter | KeyCode::Char('c') => app.open_focused_graph(Side::Call, now),
        KeyCode::Char('p') => app.open_focused_graph(Side::Put, now),

        // Display
        KeyCode::Char('+') | KeyCode::Char('=') => {
            app.zoom_in();
        }
        KeyCode::Char('-') => {
            app.zoom_out();
        }
        KeyCode::Char('0') => {
            app.reset_zoom();
        }
        KeyCode::Char('t') => {
            app.toggle_theme();
        }
        _ => {}
    }
    true
}

// Initialise an INFO `Subscriber` for `Tracing` logs, written to a file so the terminal stays clean
fn init_logging() -> Result<(), Box<dyn Error>> {
    let file = File::create(log_path())?;
    tracing_subscriber::fmt()
        // Filter messages based on the INFO level
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        // Install this Tracing subscriber as global default
        .init();
    Ok(())
}

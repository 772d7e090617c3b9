//! View-state reconciliation.
//!
//! [`reconcile`] maps a snapshot and the previous render onto a windowed row set centred on the
//! at-the-money strike. It keeps the user's scroll focus across the swap, applies the ATM and
//! in-the-money classifications, and ranks every metric column. Nothing here knows how rows are
//! drawn: the presentation layer reads a [`RenderedChain`] and the [`Viewport`] it reported.

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::{
    config::ChainConfig,
    error::ChainError,
    model::{Ladder, OptionMetrics, Side, StrikeRow},
    synth::is_in_the_money,
    trend::{CellRank, TrendBoard, TrendCell, TrendKey, TrendMemory, TrendReport},
};

/// Slice of the ladder shown around the ATM strike.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewWindow {
    /// First index with `strike >= spot`, if any.
    pub atm_index: Option<usize>,
    pub start: usize,
    pub end: usize,
}

impl ViewWindow {
    /// Window of `rows_per_side` rows either side of ATM, clipped to the ladder.
    ///
    /// A spot above every strike has no ATM row; the window then shows the top of the ladder.
    pub fn compute(strikes: &[StrikeRow], spot: f64, rows_per_side: usize) -> Self {
        let atm_index = strikes.iter().position(|row| row.strike >= spot);
        let centre = atm_index.unwrap_or(strikes.len());
        Self {
            atm_index,
            start: centre.saturating_sub(rows_per_side),
            end: centre.saturating_add(rows_per_side).saturating_add(1).min(strikes.len()),
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Scrollable surface as last reported by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub offset: f64,
    pub height: f64,
    pub row_height: f64,
}

impl Viewport {
    pub fn new(height: f64, row_height: f64) -> Self {
        Self {
            offset: 0.0,
            height,
            row_height,
        }
    }

    /// Maximum offset for `rows` rows of content.
    pub fn scroll_range(&self, rows: usize) -> f64 {
        (rows as f64 * self.row_height - self.height).max(0.0)
    }

    pub fn clamp_offset(&self, offset: f64, rows: usize) -> f64 {
        offset.clamp(0.0, self.scroll_range(rows))
    }

    /// Offset that puts row `index` in the vertical centre.
    pub fn centre_on(&self, index: usize, rows: usize) -> f64 {
        let centre = (index as f64 + 0.5) * self.row_height;
        self.clamp_offset(centre - self.height / 2.0, rows)
    }

    /// Row whose vertical centre is nearest the viewport centre.
    pub fn centre_row(&self, rows: usize) -> Option<usize> {
        if rows == 0 || !(self.row_height > 0.0) {
            return None;
        }
        let centre = self.offset + self.height / 2.0;
        let index = (centre / self.row_height - 0.5).round().max(0.0) as usize;
        Some(index.min(rows - 1))
    }
}

/// Three independent signals for restoring the user's position.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollFocus {
    pub last_viewed_strike: Option<f64>,
    pub offset: f64,
    /// `offset / scroll_range`, zero when nothing scrolls.
    pub fraction: f64,
}

impl ScrollFocus {
    pub fn capture(rows: &[RenderedRow], viewport: &Viewport) -> Self {
        let range = viewport.scroll_range(rows.len());
        Self {
            last_viewed_strike: viewport.centre_row(rows.len()).map(|index| rows[index].strike),
            offset: viewport.offset,
            fraction: if range > 0.0 {
                (viewport.offset / range).clamp(0.0, 1.0)
            } else {
                0.0
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RowFlags {
    pub atm: bool,
    pub last_viewed: bool,
    pub call_itm: bool,
    pub put_itm: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderedRow {
    pub strike: f64,
    pub call: OptionMetrics,
    pub put: OptionMetrics,
    pub flags: RowFlags,
}

impl RenderedRow {
    pub fn leg(&self, side: Side) -> &OptionMetrics {
        match side {
            Side::Call => &self.call,
            Side::Put => &self.put,
        }
    }
}

/// Which restore strategy produced the final offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreMethod {
    Offset,
    Focus,
    Fraction,
}

/// Output of one reconcile pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedChain {
    pub window: ViewWindow,
    pub spot_price: f64,
    pub time_label: Option<String>,
    pub rows: Vec<RenderedRow>,
    /// Focus captured from the previous render, used for this restore.
    pub captured: ScrollFocus,
    /// Focus at the restored offset, carried into the next render.
    pub focus: ScrollFocus,
    /// `None` when no viewport was available.
    pub restore: Option<RestoreMethod>,
    pub offset: f64,
    pub reports: IndexMap<TrendKey, TrendReport>,
    pub trends: TrendBoard,
}

impl RenderedChain {
    pub fn atm_row(&self) -> Option<usize> {
        self.rows.iter().position(|row| row.flags.atm)
    }

    pub fn rank(&self, key: TrendKey, row: usize) -> Option<&CellRank> {
        self.reports.get(&key).and_then(|report| report.rank_of(row))
    }

    pub fn row_for_strike(&self, strike: f64) -> Option<usize> {
        self.rows
            .iter()
            .position(|row| (row.strike - strike).abs() < 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconcileSettings {
    pub rows_per_side: usize,
    pub scroll_tolerance: f64,
}

impl From<&ChainConfig> for ReconcileSettings {
    fn from(config: &ChainConfig) -> Self {
        Self {
            rows_per_side: config.rows_per_side,
            scroll_tolerance: config.scroll_tolerance,
        }
    }
}

/// Pick exactly one restore strategy for the new row set.
fn restore(
    focus: &ScrollFocus,
    rows: &[RenderedRow],
    viewport: &Viewport,
    tolerance: f64,
) -> (RestoreMethod, f64) {
    let direct = viewport.clamp_offset(focus.offset, rows.len());
    if (direct - focus.offset).abs() <= tolerance {
        return (RestoreMethod::Offset, direct);
    }
    if let Some(index) = rows.iter().position(|row| row.flags.last_viewed) {
        return (RestoreMethod::Focus, viewport.centre_on(index, rows.len()));
    }
    let offset = focus.fraction * viewport.scroll_range(rows.len());
    (RestoreMethod::Fraction, viewport.clamp_offset(offset, rows.len()))
}

/// Rank the six metric/side columns, then update the board in one step.
fn rank_columns(rows: &[RenderedRow], memory: &mut TrendMemory) -> (IndexMap<TrendKey, TrendReport>, TrendBoard) {
    let mut pending = TrendBoard::new();
    let reports = TrendKey::all()
        .map(|key| {
            let cells = rows
                .iter()
                .enumerate()
                .map(|(row, rendered)| TrendCell {
                    value: rendered.leg(key.side).metric(key.metric),
                    row,
                })
                .collect::<Vec<_>>();
            let report = memory.analyze(key, &cells);
            pending.set(key, report.trend);
            (key, report)
        })
        .collect();
    (reports, pending)
}

/// Build the next render from `snapshot`.
///
/// Fails only when the snapshot itself is malformed; the caller keeps the previous render or
/// asks the feed for another snapshot.
pub fn reconcile(
    snapshot: &impl Ladder,
    previous: Option<&RenderedChain>,
    viewport: Option<&Viewport>,
    memory: &mut TrendMemory,
    settings: &ReconcileSettings,
) -> Result<RenderedChain, ChainError> {
    snapshot.validate()?;

    let spot = snapshot.spot_price();
    let strikes = snapshot.strikes();
    let window = ViewWindow::compute(strikes, spot, settings.rows_per_side);

    let captured = match (previous, viewport) {
        (Some(previous), Some(viewport)) => ScrollFocus::capture(&previous.rows, viewport),
        (Some(previous), None) => previous.focus,
        (None, Some(viewport)) => ScrollFocus {
            offset: viewport.offset,
            ..Default::default()
        },
        (None, None) => ScrollFocus::default(),
    };

    let rows = strikes[window.start..window.end]
        .iter()
        .enumerate()
        .filter_map(|(offset, row)| {
            if !row.is_finite() {
                warn!(strike = row.strike, "skipping row with non-finite values");
                return None;
            }
            Some(RenderedRow {
                strike: row.strike,
                call: row.call,
                put: row.put,
                flags: RowFlags {
                    atm: window.atm_index == Some(window.start + offset),
                    last_viewed: captured
                        .last_viewed_strike
                        .is_some_and(|strike| (row.strike - strike).abs() < 1.0),
                    call_itm: is_in_the_money(Side::Call, row.strike, spot),
                    put_itm: is_in_the_money(Side::Put, row.strike, spot),
                },
            })
        })
        .collect::<Vec<_>>();

    let (restore_method, offset, focus) = match viewport {
        Some(viewport) => {
            let (method, offset) = restore(&captured, &rows, viewport, settings.scroll_tolerance);
            let restored = Viewport { offset, ..*viewport };
            (Some(method), offset, ScrollFocus::capture(&rows, &restored))
        }
        None => {
            debug!(
                error = %ChainError::PresentationUnavailable("viewport"),
                "skipping scroll restore"
            );
            (None, captured.offset, captured)
        }
    };

    let (reports, trends) = rank_columns(&rows, memory);

    debug!(
        spot,
        atm = ?window.atm_index,
        start = window.start,
        end = window.end,
        restore = ?restore_method,
        "reconciled chain"
    );

    Ok(RenderedChain {
        window,
        spot_price: spot,
        time_label: snapshot.time_label().map(str::to_owned),
        rows,
        captured,
        focus,
        restore: restore_method,
        offset,
        reports,
        trends,
    })
}

/// Offset that centres the ATM row, if one is rendered.
pub fn scroll_to_atm(viewport: &Viewport, rendered: &RenderedChain) -> Option<f64> {
    rendered
        .atm_row()
        .map(|index| viewport.centre_on(index, rendered.rows.len()))
}

//! Rank highlighting and direction of the runner-up value per metric column.

use std::collections::HashMap;

use tracing::debug;

use crate::model::{MetricKind, Side};

/// Second-ranked cells qualify for highlighting at this share of the maximum.
pub const SECONDARY_THRESHOLD: u32 = 75;

/// Movement must exceed this fraction of the gap to the top value.
const GAP_FRACTION: f64 = 0.1;

/// Direction indicator shown in a column header.
#[derive(Clone, Debug, Copy, PartialEq, Eq, Default)]
pub enum Trend {
    Up,
    Down,
    #[default]
    None,
}

impl Trend {
    pub fn label(&self) -> &'static str {
        match self {
            Trend::Up => "UP",
            Trend::Down => "DOWN",
            Trend::None => "NONE",
        }
    }

    pub fn arrow(&self) -> &'static str {
        match self {
            Trend::Up => "▲",
            Trend::Down => "▼",
            Trend::None => "",
        }
    }
}

#[derive(Clone, Debug, Copy, PartialEq, Eq, Hash)]
pub struct TrendKey {
    pub metric: MetricKind,
    pub side: Side,
}

impl TrendKey {
    pub fn new(metric: MetricKind, side: Side) -> Self {
        Self { metric, side }
    }

    /// All six metric/side combinations.
    pub fn all() -> impl Iterator<Item = TrendKey> {
        MetricKind::ALL
            .into_iter()
            .flat_map(|metric| Side::ALL.into_iter().map(move |side| TrendKey::new(metric, side)))
    }

    fn slot(&self) -> usize {
        let metric = match self.metric {
            MetricKind::Volume => 0,
            MetricKind::OpenInterest => 1,
            MetricKind::OpenInterestChange => 2,
        };
        let side = match self.side {
            Side::Call => 0,
            Side::Put => 1,
        };
        metric * 2 + side
    }
}

/// One rendered cell fed to the analyzer.
#[derive(Clone, Debug, Copy, PartialEq)]
pub struct TrendCell {
    pub value: f64,
    /// Row position within the rendered window.
    pub row: usize,
}

#[derive(Clone, Debug, Copy, PartialEq, Eq, Hash)]
pub enum Highlight {
    Primary,
    Secondary,
}

/// Percentage of maximum for one positive cell.
#[derive(Clone, Debug, Copy, PartialEq, Eq)]
pub struct CellRank {
    pub row: usize,
    pub percentage: u32,
    pub highlight: Option<Highlight>,
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct TrendReport {
    pub trend: Trend,
    /// Positive cells in descending value order.
    pub ranks: Vec<CellRank>,
}

impl TrendReport {
    pub fn rank_of(&self, row: usize) -> Option<&CellRank> {
        self.ranks.iter().find(|rank| rank.row == row)
    }

    pub fn flagged(&self) -> impl Iterator<Item = &CellRank> {
        self.ranks.iter().filter(|rank| rank.highlight.is_some())
    }
}

/// Classify how the runner-up moved relative to the top value since the last call.
fn direction(top: f64, top_row: usize, value: f64, row: usize, previous: f64) -> Trend {
    let margin = (top - previous) * GAP_FRACTION;
    let rising = value > previous && value > previous + margin;
    let falling = value < previous && value < previous - margin;

    if top_row < row {
        match (rising, falling) {
            (true, _) => Trend::Up,
            (_, true) => Trend::Down,
            _ => Trend::None,
        }
    } else {
        match (falling, rising) {
            (true, _) => Trend::Up,
            (_, true) => Trend::Down,
            _ => Trend::None,
        }
    }
}

/// Previously observed runner-up value per metric/side.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrendMemory {
    previous: HashMap<TrendKey, f64>,
}

impl TrendMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn previous(&self, key: TrendKey) -> Option<f64> {
        self.previous.get(&key).copied()
    }

    pub fn clear(&mut self) {
        self.previous.clear();
    }

    /// Rank `cells` for `key` and update the memory slot.
    pub fn analyze(&mut self, key: TrendKey, cells: &[TrendCell]) -> TrendReport {
        let mut sorted = cells.to_vec();
        // Stable, so ties keep row order.
        sorted.sort_by(|a, b| b.value.total_cmp(&a.value));

        let Some(top) = sorted.first().copied() else {
            return TrendReport::default();
        };
        if !(top.value > 0.0) {
            return TrendReport::default();
        }

        let mut trend = Trend::None;
        let mut ranks = Vec::with_capacity(sorted.len());

        for (index, cell) in sorted.iter().enumerate() {
            if !(cell.value > 0.0) {
                continue;
            }
            let percentage = (cell.value / top.value * 100.0).round() as u32;

            let highlight = match index {
                0 => Some(Highlight::Primary),
                1 if percentage >= SECONDARY_THRESHOLD => {
                    if let Some(previous) = self.previous.insert(key, cell.value) {
                        trend = direction(top.value, top.row, cell.value, cell.row, previous);
                    }
                    Some(Highlight::Secondary)
                }
                _ => None,
            };

            ranks.push(CellRank {
                row: cell.row,
                percentage,
                highlight,
            });
        }

        debug!(
            metric = %key.metric,
            side = %key.side,
            trend = trend.label(),
            "analyzed column"
        );
        TrendReport { trend, ranks }
    }
}

/// Header indicator state for all six columns.
#[derive(Clone, Debug, Copy, PartialEq, Eq, Default)]
pub struct TrendBoard {
    slots: [Trend; 6],
}

impl TrendBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: TrendKey) -> Trend {
        self.slots[key.slot()]
    }

    pub fn set(&mut self, key: TrendKey, trend: Trend) {
        self.slots[key.slot()] = trend;
    }

    /// Replace every slot with `pending` in one step.
    pub fn commit(&mut self, pending: TrendBoard) {
        *self = pending;
    }

    pub fn iter(&self) -> impl Iterator<Item = (TrendKey, Trend)> + '_ {
        TrendKey::all().map(|key| (key, self.get(key)))
    }
}

//! Per-strike open-interest-change series shown in the detail chart.

use std::collections::VecDeque;

use chrono::{NaiveDateTime, TimeDelta};
use rand::Rng;

use crate::{
    model::{Side, StrikeRow},
    synth::jitter,
};

fn clock_label(time: NaiveDateTime) -> String {
    time.format("%H:%M").to_string()
}

/// Rolling CALL and PUT OI-change series for one strike.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailGraph {
    pub strike: f64,
    /// Leg the user opened the graph from.
    pub side: Side,
    labels: VecDeque<String>,
    call: VecDeque<i64>,
    put: VecDeque<i64>,
    call_base: i64,
    put_base: i64,
}

impl DetailGraph {
    /// Seed `points` samples ending at `now`, one per minute, as a random walk from the row's
    /// current OI change.
    pub fn open<R: Rng + ?Sized>(
        rng: &mut R,
        row: &StrikeRow,
        side: Side,
        points: usize,
        now: NaiveDateTime,
    ) -> Self {
        let call_base = row.call.open_interest_change;
        let put_base = row.put.open_interest_change;
        let labels = (0..points)
            .rev()
            .map(|minutes_ago| clock_label(now - TimeDelta::minutes(minutes_ago as i64)))
            .collect();

        Self {
            strike: row.strike,
            side,
            labels,
            call: walk(rng, call_base, points),
            put: walk(rng, put_base, points),
            call_base,
            put_base,
        }
    }

    /// Drop the oldest sample and append one labelled `now`.
    pub fn refresh<R: Rng + ?Sized>(&mut self, rng: &mut R, now: NaiveDateTime) {
        if self.labels.is_empty() {
            return;
        }
        step(rng, &mut self.call, self.call_base);
        step(rng, &mut self.put, self.put_base);
        self.labels.pop_front();
        self.labels.push_back(clock_label(now));
    }

    pub fn labels(&self) -> impl ExactSizeIterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    pub fn series(&self, side: Side) -> impl ExactSizeIterator<Item = i64> + '_ {
        match side {
            Side::Call => self.call.iter().copied(),
            Side::Put => self.put.iter().copied(),
        }
    }

    pub fn title(&self) -> String {
        format!("OI Change Comparison for Strike {}", self.strike)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

fn walk<R: Rng + ?Sized>(rng: &mut R, base: i64, points: usize) -> VecDeque<i64> {
    let variance = (base as f64 / 2.0).abs();
    let mut current = base as f64;
    (0..points)
        .map(|_| {
            current += jitter(rng, variance);
            current.round() as i64
        })
        .collect()
}

fn step<R: Rng + ?Sized>(rng: &mut R, series: &mut VecDeque<i64>, base: i64) {
    let last = series.back().copied().unwrap_or(base);
    let next = (last as f64 + jitter(rng, (base as f64 / 4.0).abs())).round() as i64;
    series.pop_front();
    series.push_back(next);
}

//! Candle buffer with sorted-unique merge semantics.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::domain::market_data::value_objects::{Timeframe, Timestamp};

/// Minimum change on any field before a repaint-worthy in-place update
/// is accepted for a settled bucket.
pub const UPDATE_EPSILON: f64 = 1e-4;
/// The forming (most recent) bucket repaints on effectively any change.
pub const LAST_BUCKET_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ohlcv {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Ohlcv {
    pub fn is_valid(&self) -> bool {
        [self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|v| v.is_finite())
            && self.volume >= 0.0
            && self.high >= self.low
    }

    fn max_delta(&self, other: &Ohlcv) -> f64 {
        [
            (self.open - other.open).abs(),
            (self.high - other.high).abs(),
            (self.low - other.low).abs(),
            (self.close - other.close).abs(),
            (self.volume - other.volume).abs(),
        ]
        .into_iter()
        .fold(0.0, f64::max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: Timestamp,
    pub ohlcv: Ohlcv,
}

impl Candle {
    pub fn new(time: Timestamp, ohlcv: Ohlcv) -> Self {
        Self { time, ohlcv }
    }

    pub fn is_bullish(&self) -> bool {
        self.ohlcv.close >= self.ohlcv.open
    }
}

/// Outcome of merging a single candle into the series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// A new bucket was appended or inserted.
    Inserted,
    /// An existing bucket changed by more than its epsilon.
    Updated,
    /// The change was below the epsilon threshold; no repaint needed.
    Unchanged,
}

/// Time-ordered, duplicate-free candle buffer.
///
/// Backed by a `VecDeque` so older history prepends cheaply. Timestamps
/// are unique; a merge for an existing bucket updates it in place.
#[derive(Debug, Clone, Default)]
pub struct CandleSeries {
    candles: VecDeque<Candle>,
}

impl CandleSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Candle> {
        self.candles.get(index)
    }

    pub fn latest(&self) -> Option<&Candle> {
        self.candles.back()
    }

    pub fn oldest(&self) -> Option<&Candle> {
        self.candles.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candle> {
        self.candles.iter()
    }

    pub fn clear(&mut self) {
        self.candles.clear();
    }

    /// Replaces the whole buffer, sorting and deduplicating by open
    /// time (last write wins on duplicates).
    pub fn replace_all(&mut self, mut candles: Vec<Candle>) {
        candles.sort_by_key(|c| c.time);
        self.candles.clear();
        for candle in candles {
            match self.candles.back_mut() {
                Some(back) if back.time == candle.time => *back = candle,
                _ => self.candles.push_back(candle),
            }
        }
    }

    /// Merges one candle, preserving order and uniqueness.
    ///
    /// Updates to an existing bucket are accepted only when some field
    /// moved by more than the bucket's epsilon: `LAST_BUCKET_EPSILON`
    /// for the forming bucket at the back, `UPDATE_EPSILON` otherwise.
    pub fn merge(&mut self, candle: Candle) -> MergeOutcome {
        match self.candles.binary_search_by_key(&candle.time, |c| c.time) {
            Ok(index) => {
                let is_last = index + 1 == self.candles.len();
                let epsilon = if is_last {
                    LAST_BUCKET_EPSILON
                } else {
                    UPDATE_EPSILON
                };
                let existing = &mut self.candles[index];
                if existing.ohlcv.max_delta(&candle.ohlcv) > epsilon {
                    *existing = candle;
                    MergeOutcome::Updated
                } else {
                    MergeOutcome::Unchanged
                }
            }
            Err(index) => {
                self.candles.insert(index, candle);
                MergeOutcome::Inserted
            }
        }
    }

    /// Prepends older history, skipping anything at or past the current
    /// oldest bucket. Returns the number of candles actually added.
    pub fn prepend_older(&mut self, mut older: Vec<Candle>) -> usize {
        older.sort_by_key(|c| c.time);
        older.dedup_by_key(|c| c.time);
        let cutoff = self.candles.front().map(|c| c.time);
        let mut added = 0;
        for candle in older.into_iter().rev() {
            if let Some(cutoff) = cutoff {
                if candle.time >= cutoff {
                    continue;
                }
            }
            self.candles.push_front(candle);
            added += 1;
        }
        added
    }

    /// Min/max price over `[start, end)` candle indices, clamped to the
    /// buffer. `None` when the window misses the buffer entirely.
    pub fn price_bounds(&self, start: usize, end: usize) -> Option<(f64, f64)> {
        let end = end.min(self.candles.len());
        if start >= end {
            return None;
        }
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for candle in self.candles.range(start..end) {
            min = min.min(candle.ohlcv.low);
            max = max.max(candle.ohlcv.high);
        }
        Some((min, max))
    }

    /// Largest volume over `[start, end)` candle indices.
    pub fn volume_max(&self, start: usize, end: usize) -> f64 {
        let end = end.min(self.candles.len());
        if start >= end {
            return 0.0;
        }
        self.candles
            .range(start..end)
            .fold(0.0, |acc, c| acc.max(c.ohlcv.volume))
    }

    pub fn to_vec(&self) -> Vec<Candle> {
        self.candles.iter().copied().collect()
    }
}

/// Parses one wire row `[openTime, open, high, low, close, volume]`.
///
/// The open time is snapped to the bucket grid for the timeframe.
/// Returns `None` for rows with non-finite fields or negative volume.
pub fn candle_from_row(row: &[f64; 6], timeframe: Timeframe) -> Option<Candle> {
    if !row.iter().all(|v| v.is_finite()) || row[0] < 0.0 {
        return None;
    }
    let ohlcv = Ohlcv {
        open: row[1],
        high: row[2],
        low: row[3],
        close: row[4],
        volume: row[5],
    };
    if !ohlcv.is_valid() {
        return None;
    }
    let time = Timestamp::from_millis(row[0] as u64).align_to(timeframe);
    Some(Candle::new(time, ohlcv))
}

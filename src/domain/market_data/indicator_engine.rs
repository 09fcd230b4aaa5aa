//! Indicator computation over the candle buffer.
//!
//! Recalculation is debounced: live ticks that update the forming
//! bucket without growing the buffer trigger at most one recompute per
//! second, while a length change (new bucket, backfill, reload) always
//! recomputes immediately.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strum::{Display as StrumDisplay, EnumString};

use crate::domain::market_data::entities::CandleSeries;
use crate::domain::time::Debounce;

pub const RECALC_DEBOUNCE_MS: f64 = 1_000.0;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, StrumDisplay, EnumString,
)]
pub enum IndicatorKind {
    #[strum(serialize = "sma")]
    #[serde(rename = "sma")]
    Sma,
    #[strum(serialize = "ema")]
    #[serde(rename = "ema")]
    Ema,
    #[strum(serialize = "rsi")]
    #[serde(rename = "rsi")]
    Rsi,
}

impl IndicatorKind {
    /// Overlays draw on the price area; oscillators get their own panel.
    pub fn is_overlay(&self) -> bool {
        !matches!(self, IndicatorKind::Rsi)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorConfig {
    pub id: String,
    pub kind: IndicatorKind,
    pub period: usize,
    pub color: u32,
    pub visible: bool,
}

impl IndicatorConfig {
    pub fn new(id: &str, kind: IndicatorKind, period: usize) -> Self {
        Self {
            id: id.to_string(),
            kind,
            period,
            color: 0xff_cc66_00,
            visible: true,
        }
    }
}

/// One computed line, aligned so `values[i]` belongs to candle index
/// `first_index + i`.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub first_index: usize,
    pub values: Vec<f64>,
}

#[derive(Debug)]
pub struct IndicatorEngine {
    configs: Vec<IndicatorConfig>,
    outputs: HashMap<String, IndicatorSeries>,
    debounce: Debounce,
    last_len: usize,
}

impl Default for IndicatorEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl IndicatorEngine {
    pub fn new() -> Self {
        Self {
            configs: Vec::new(),
            outputs: HashMap::new(),
            debounce: Debounce::new(RECALC_DEBOUNCE_MS),
            last_len: 0,
        }
    }

    pub fn configs(&self) -> &[IndicatorConfig] {
        &self.configs
    }

    pub fn output(&self, id: &str) -> Option<&IndicatorSeries> {
        self.outputs.get(id)
    }

    /// Adds or replaces the config with the same id. The next
    /// `recalculate` always runs.
    pub fn upsert(&mut self, config: IndicatorConfig) {
        match self.configs.iter_mut().find(|c| c.id == config.id) {
            Some(existing) => *existing = config,
            None => self.configs.push(config),
        }
        self.last_len = usize::MAX;
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.configs.len();
        self.configs.retain(|c| c.id != id);
        self.outputs.remove(id);
        self.last_len = usize::MAX;
        self.configs.len() != before
    }

    pub fn toggle_visible(&mut self, id: &str) -> Option<bool> {
        let config = self.configs.iter_mut().find(|c| c.id == id)?;
        config.visible = !config.visible;
        Some(config.visible)
    }

    /// Ids of oscillator indicators that need a dedicated panel.
    pub fn panel_ids(&self) -> Vec<String> {
        self.configs
            .iter()
            .filter(|c| !c.kind.is_overlay())
            .map(|c| c.id.clone())
            .collect()
    }

    /// Restores configs from persisted settings without recomputing.
    pub fn restore(&mut self, configs: Vec<IndicatorConfig>) {
        self.configs = configs;
        self.outputs.clear();
        self.last_len = usize::MAX;
    }

    /// Recomputes all indicator lines if the debounce allows it.
    ///
    /// Returns `true` when a recompute ran. A buffer length change
    /// bypasses the window; same-length updates are coalesced.
    pub fn recalculate(&mut self, candles: &CandleSeries, now_ms: f64) -> bool {
        let len_changed = candles.len() != self.last_len;
        if !self.debounce.should_run(now_ms, len_changed) {
            return false;
        }
        self.last_len = candles.len();
        self.outputs.clear();
        for config in &self.configs {
            if let Some(series) = compute(config, candles) {
                self.outputs.insert(config.id.clone(), series);
            }
        }
        true
    }
}

fn compute(config: &IndicatorConfig, candles: &CandleSeries) -> Option<IndicatorSeries> {
    if config.period == 0 || candles.is_empty() {
        return None;
    }
    let closes: Vec<f64> = candles.iter().map(|c| c.ohlcv.close).collect();
    match config.kind {
        IndicatorKind::Sma => sma(&closes, config.period),
        IndicatorKind::Ema => ema(&closes, config.period),
        IndicatorKind::Rsi => rsi(&closes, config.period),
    }
}

/// Rolling-sum SMA; defined from index `period - 1`.
fn sma(closes: &[f64], period: usize) -> Option<IndicatorSeries> {
    if closes.len() < period {
        return None;
    }
    let mut values = Vec::with_capacity(closes.len() - period + 1);
    let mut sum: f64 = closes[..period].iter().sum();
    values.push(sum / period as f64);
    for i in period..closes.len() {
        sum += closes[i] - closes[i - period];
        values.push(sum / period as f64);
    }
    Some(IndicatorSeries {
        first_index: period - 1,
        values,
    })
}

/// EMA seeded with the SMA of the first window.
fn ema(closes: &[f64], period: usize) -> Option<IndicatorSeries> {
    if closes.len() < period {
        return None;
    }
    let alpha = 2.0 / (period as f64 + 1.0);
    let seed: f64 = closes[..period].iter().sum::<f64>() / period as f64;
    let mut values = Vec::with_capacity(closes.len() - period + 1);
    let mut current = seed;
    values.push(current);
    for close in &closes[period..] {
        current = alpha * close + (1.0 - alpha) * current;
        values.push(current);
    }
    Some(IndicatorSeries {
        first_index: period - 1,
        values,
    })
}

/// RSI with Wilder smoothing; defined from index `period`.
fn rsi(closes: &[f64], period: usize) -> Option<IndicatorSeries> {
    if closes.len() <= period {
        return None;
    }
    let mut gain_sum = 0.0;
    let mut loss_sum = 0.0;
    for window in closes[..=period].windows(2) {
        let delta = window[1] - window[0];
        if delta >= 0.0 {
            gain_sum += delta;
        } else {
            loss_sum -= delta;
        }
    }
    let mut avg_gain = gain_sum / period as f64;
    let mut avg_loss = loss_sum / period as f64;
    let mut values = Vec::with_capacity(closes.len() - period);
    values.push(rsi_value(avg_gain, avg_loss));
    for window in closes[period..].windows(2) {
        let delta = window[1] - window[0];
        let (gain, loss) = if delta >= 0.0 {
            (delta, 0.0)
        } else {
            (0.0, -delta)
        };
        avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
        values.push(rsi_value(avg_gain, avg_loss));
    }
    Some(IndicatorSeries {
        first_index: period,
        values,
    })
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

//! Pure pixel-space geometry for the scene compositor.
//!
//! Everything here is plain math over the viewport and candle buffer so
//! it can be exercised natively without a canvas.

use crate::domain::chart::{PanelLayout, PanelRegion, ViewportController};
use crate::domain::market_data::CandleSeries;

/// Fraction of the price area reserved for the volume strip.
const VOLUME_FRACTION: f64 = 0.15;
/// Vertical padding inside the price area, as a fraction of its range.
const PRICE_PAD_FRACTION: f64 = 0.05;
/// Gap between neighboring candles, as a fraction of the slot.
const CANDLE_GAP_FRACTION: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

/// Resolved layout of one frame in CSS pixels.
#[derive(Debug, Clone)]
pub struct SceneLayout {
    pub width: f64,
    pub height: f64,
    pub price_area: Rect,
    pub volume_area: Rect,
    pub panels: Vec<PanelRegion>,
}

pub fn compute_layout(width: f64, height: f64, panels: &PanelLayout) -> SceneLayout {
    let main_height = panels.main_area_height(height);
    let volume_height = main_height * VOLUME_FRACTION;
    SceneLayout {
        width,
        height,
        price_area: Rect {
            x: 0.0,
            y: 0.0,
            width,
            height: main_height - volume_height,
        },
        volume_area: Rect {
            x: 0.0,
            y: main_height - volume_height,
            width,
            height: volume_height,
        },
        panels: panels.regions(height),
    }
}

/// Padded min/max price over the visible window.
pub fn price_scale(
    candles: &CandleSeries,
    viewport: &ViewportController,
) -> Option<(f64, f64)> {
    let (start, end) = viewport.visible_indices(candles.len());
    let (min, max) = candles.price_bounds(start, end)?;
    let pad = ((max - min) * PRICE_PAD_FRACTION).max(f64::MIN_POSITIVE);
    Some((min - pad, max + pad))
}

pub fn price_to_y(price: f64, min: f64, max: f64, area: &Rect) -> f64 {
    if max <= min {
        return area.y + area.height / 2.0;
    }
    area.y + (max - price) / (max - min) * area.height
}

/// Everything needed to draw one candle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandleGeom {
    pub index: usize,
    pub center_x: f64,
    pub body_left: f64,
    pub body_width: f64,
    pub body_top: f64,
    pub body_bottom: f64,
    pub wick_top: f64,
    pub wick_bottom: f64,
    pub close_y: f64,
    pub bullish: bool,
    /// Volume bar height as a fraction of the volume strip.
    pub volume_fraction: f64,
}

/// Geometry for the candles intersecting the viewport.
pub fn visible_geometry(
    candles: &CandleSeries,
    viewport: &ViewportController,
    price_area: &Rect,
) -> Vec<CandleGeom> {
    let (start, end) = viewport.visible_indices(candles.len());
    let Some((min, max)) = price_scale(candles, viewport) else {
        return Vec::new();
    };
    let volume_max = candles.volume_max(start, end).max(f64::MIN_POSITIVE);
    let slot = viewport.width_px() / viewport.range().span();
    let body_width = (slot * (1.0 - CANDLE_GAP_FRACTION)).max(1.0);
    (start..end)
        .filter_map(|index| {
            let candle = candles.get(index)?;
            let center_x = viewport.px_at_index(index as f64 + 0.5);
            let o = candle.ohlcv;
            let (body_hi, body_lo) = if o.open >= o.close {
                (o.open, o.close)
            } else {
                (o.close, o.open)
            };
            Some(CandleGeom {
                index,
                center_x,
                body_left: center_x - body_width / 2.0,
                body_width,
                body_top: price_to_y(body_hi, min, max, price_area),
                body_bottom: price_to_y(body_lo, min, max, price_area),
                wick_top: price_to_y(o.high, min, max, price_area),
                wick_bottom: price_to_y(o.low, min, max, price_area),
                close_y: price_to_y(o.close, min, max, price_area),
                bullish: candle.is_bullish(),
                volume_fraction: o.volume / volume_max,
            })
        })
        .collect()
}

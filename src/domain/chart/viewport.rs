//! Visible-range state and the pan/zoom math that maintains it.
//!
//! The viewport is a fractional window over candle indices. Fractional
//! bounds keep sub-candle panning smooth; all drawing positions derive
//! from this range plus the pixel width.

use crate::domain::logging::LogComponent;
use crate::log_trace;

/// Fractional candle-index window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibleRange {
    pub start: f64,
    pub end: f64,
}

impl VisibleRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn span(&self) -> f64 {
        self.end - self.start
    }
}

/// Tunable bounds for viewport clamping.
#[derive(Debug, Clone, Copy)]
pub struct ViewportPolicy {
    /// Hard floor on the visible span, in candles.
    pub min_visible: f64,
    /// Per-gesture floor: the span may not shrink below this fraction
    /// of its value before the gesture step.
    pub min_span_ratio: f64,
    /// Blank space allowed past the newest candle, as a span fraction.
    pub future_span_ratio: f64,
    /// How far `start` may overshoot past index zero.
    pub past_overshoot: f64,
    /// `start` at or below this index asks for older history.
    pub older_fetch_threshold: f64,
    /// Candles shown after a reset.
    pub default_visible: f64,
}

impl Default for ViewportPolicy {
    fn default() -> Self {
        Self {
            min_visible: 5.0,
            min_span_ratio: 0.3,
            future_span_ratio: 0.5,
            past_overshoot: 5.0,
            older_fetch_threshold: 5.0,
            default_visible: 100.0,
        }
    }
}

/// Owns the visible range and applies pan/zoom with invariant clamping.
#[derive(Debug, Clone)]
pub struct ViewportController {
    range: VisibleRange,
    width_px: f64,
    policy: ViewportPolicy,
}

impl ViewportController {
    pub fn new(width_px: f64, policy: ViewportPolicy) -> Self {
        Self {
            range: VisibleRange::new(0.0, policy.default_visible),
            width_px: width_px.max(1.0),
            policy,
        }
    }

    pub fn range(&self) -> VisibleRange {
        self.range
    }

    pub fn policy(&self) -> &ViewportPolicy {
        &self.policy
    }

    pub fn width_px(&self) -> f64 {
        self.width_px
    }

    pub fn resize(&mut self, width_px: f64) {
        self.width_px = width_px.max(1.0);
    }

    /// Jumps to the default window over the newest candles.
    pub fn reset(&mut self, candle_count: usize) {
        let dv = self.policy.default_visible;
        if candle_count == 0 {
            self.range = VisibleRange::new(0.0, dv);
            self.clamp(0, self.policy.min_visible);
            return;
        }
        let end = candle_count as f64;
        let start = (end - dv).max(0.0);
        self.range = VisibleRange::new(start, end.max(start + self.policy.min_visible));
        self.clamp(candle_count, self.policy.min_visible);
    }

    /// Shifts the window by a pixel delta. Positive `delta_px` (drag to
    /// the right) reveals older candles.
    pub fn pan_pixels(&mut self, delta_px: f64, sensitivity: f64, candle_count: usize) {
        let span = self.range.span();
        let index_delta = delta_px / self.width_px * span * sensitivity;
        self.range.start -= index_delta;
        self.range.end -= index_delta;
        self.clamp(candle_count, span);
    }

    /// Scales the span by `1 / factor` about the candle under
    /// `center_px`, so the anchored candle stays put on screen.
    /// `factor > 1` zooms in.
    pub fn zoom_at(&mut self, center_px: f64, factor: f64, candle_count: usize) {
        if !(factor.is_finite() && factor > 0.0) {
            return;
        }
        let span = self.range.span();
        let ratio = (center_px / self.width_px).clamp(0.0, 1.0);
        let anchor = self.range.start + ratio * span;
        let new_span = span / factor;
        self.range.start = anchor - ratio * new_span;
        self.range.end = self.range.start + new_span;
        self.clamp(candle_count, span);
        log_trace!(
            LogComponent::Viewport,
            "zoom factor={factor:.3} anchor={anchor:.2} -> [{:.2}, {:.2}]",
            self.range.start,
            self.range.end
        );
    }

    /// Older history landed in front of the buffer: shift by the insert
    /// count so the candle under the cursor keeps its screen position.
    /// Deliberately unclamped.
    pub fn shift_for_prepended(&mut self, inserted: usize) {
        let delta = inserted as f64;
        self.range.start += delta;
        self.range.end += delta;
    }

    /// A new live bucket opened; follow it unless the user is mid-gesture.
    pub fn shift_for_new_bucket(&mut self) {
        self.range.start += 1.0;
        self.range.end += 1.0;
    }

    pub fn needs_older(&self) -> bool {
        self.range.start <= self.policy.older_fetch_threshold
    }

    /// Fractional candle index under a pixel x position.
    pub fn index_at_px(&self, x: f64) -> f64 {
        self.range.start + x / self.width_px * self.range.span()
    }

    /// Pixel x position of a fractional candle index.
    pub fn px_at_index(&self, index: f64) -> f64 {
        (index - self.range.start) / self.range.span() * self.width_px
    }

    /// Integer index window intersected with the buffer, for drawing.
    pub fn visible_indices(&self, candle_count: usize) -> (usize, usize) {
        let start = self.range.start.floor().max(0.0) as usize;
        let end = (self.range.end.ceil().max(0.0) as usize).min(candle_count);
        (start.min(end), end)
    }

    /// Restores the invariants after any mutation.
    ///
    /// Span first: no smaller than `min_visible` and no smaller than
    /// `min_span_ratio` of the pre-step span, no larger than the
    /// addressable domain. Then position: at most `future_span_ratio *
    /// span` past the newest candle and at most `past_overshoot` before
    /// index zero, with the past bound winning when both pinch.
    fn clamp(&mut self, candle_count: usize, prior_span: f64) {
        let p = &self.policy;
        let count = candle_count as f64;
        let span_floor = p.min_visible.max(p.min_span_ratio * prior_span);
        let span_cap = (2.0 * (count + p.past_overshoot)).max(span_floor);
        let span = self.range.span().clamp(span_floor, span_cap);
        if span != self.range.span() {
            let center = (self.range.start + self.range.end) / 2.0;
            self.range.start = center - span / 2.0;
            self.range.end = center + span / 2.0;
        }
        let future_limit = count + p.future_span_ratio * span;
        if self.range.end > future_limit {
            let excess = self.range.end - future_limit;
            self.range.start -= excess;
            self.range.end -= excess;
        }
        if self.range.start < -p.past_overshoot {
            let deficit = -p.past_overshoot - self.range.start;
            self.range.start += deficit;
            self.range.end += deficit;
        }
        if self.range.end > future_limit {
            self.range.end = future_limit;
        }
    }

    /// Restores a previously observed range verbatim, e.g. from saved
    /// layout state. Not clamped; the next gesture re-establishes the
    /// invariants.
    pub fn set_range(&mut self, start: f64, end: f64) {
        self.range = VisibleRange::new(start, end);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> ViewportController {
        ViewportController::new(800.0, ViewportPolicy::default())
    }

    #[test]
    fn zoom_in_preserves_anchor_index() {
        let mut vp = controller();
        vp.set_range(100.0, 200.0);
        let anchor_before = vp.index_at_px(600.0);
        vp.zoom_at(600.0, 1.25, 1_000);
        let anchor_after = vp.index_at_px(600.0);
        assert!((anchor_before - anchor_after).abs() < 1e-9);
        assert!((vp.range().span() - 80.0).abs() < 1e-9);
    }

    #[test]
    fn zoom_in_span_floor_is_five_candles() {
        let mut vp = controller();
        vp.set_range(100.0, 106.0);
        vp.zoom_at(400.0, 10.0, 1_000);
        assert!((vp.range().span() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn zoom_in_cannot_cut_more_than_ratio_per_step() {
        let mut vp = controller();
        vp.set_range(0.0, 100.0);
        vp.zoom_at(400.0, 100.0, 1_000);
        assert!((vp.range().span() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn pan_cannot_drift_past_future_limit() {
        let mut vp = controller();
        vp.set_range(900.0, 1_000.0);
        for _ in 0..50 {
            vp.pan_pixels(-800.0, 1.0, 1_000);
        }
        let range = vp.range();
        assert!(range.end <= 1_000.0 + 0.5 * range.span() + 1e-9);
    }

    #[test]
    fn pan_cannot_overshoot_past_start() {
        let mut vp = controller();
        vp.set_range(0.0, 100.0);
        for _ in 0..50 {
            vp.pan_pixels(800.0, 1.0, 1_000);
        }
        assert!(vp.range().start >= -5.0 - 1e-9);
    }

    #[test]
    fn prepend_shift_keeps_screen_content() {
        let mut vp = controller();
        vp.set_range(2.0, 62.0);
        vp.shift_for_prepended(10);
        let range = vp.range();
        assert_eq!((range.start, range.end), (12.0, 72.0));
    }

    #[test]
    fn needs_older_at_left_edge() {
        let mut vp = controller();
        vp.set_range(5.0, 65.0);
        assert!(vp.needs_older());
        vp.set_range(5.1, 65.1);
        assert!(!vp.needs_older());
    }

    #[test]
    fn reset_shows_newest_default_window() {
        let mut vp = controller();
        vp.reset(1_000);
        let range = vp.range();
        assert_eq!((range.start, range.end), (900.0, 1_000.0));
    }

    #[test]
    fn reset_with_empty_buffer_stays_in_bounds() {
        let mut vp = controller();
        vp.reset(0);
        let range = vp.range();
        assert!(range.span() >= 5.0 - 1e-9);
        assert!(range.start >= -5.0 - 1e-9);
        assert!(range.end <= 0.5 * range.span() + 1e-9);
    }

    #[test]
    fn reset_with_few_candles_stays_in_bounds() {
        let mut vp = controller();
        vp.reset(3);
        let range = vp.range();
        assert!(range.span() >= 5.0 - 1e-9);
        assert!(range.start >= -5.0 - 1e-9);
    }
}

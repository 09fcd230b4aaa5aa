//! Engine-wide tuning knobs, gathered in one place so hosts and tests
//! can override them wholesale.

use crate::domain::chart::ViewportPolicy;

#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Candles requested per history fetch.
    pub fetch_limit: usize,
    /// Minimum spacing between non-gesture refetches.
    pub min_fetch_interval_ms: f64,
    /// Hard timeout on a single history request.
    pub request_timeout_ms: u32,
    /// Pan distance multiplier for mouse drags.
    pub drag_sensitivity: f64,
    /// Pan distance multiplier for one-finger touch pans. Lower than
    /// mouse so touch feels damped.
    pub touch_pan_sensitivity: f64,
    /// Damping applied to the raw pinch ratio before zooming.
    pub pinch_damping: f64,
    /// Span scale step for one wheel notch.
    pub wheel_zoom_step: f64,
    /// Drag events processed at most once per this interval.
    pub drag_throttle_ms: f64,
    /// Hover/crosshair updates processed at most once per this interval.
    pub hover_throttle_ms: f64,
    pub viewport: ViewportPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fetch_limit: 300,
            min_fetch_interval_ms: 15_000.0,
            request_timeout_ms: 10_000,
            drag_sensitivity: 1.0,
            touch_pan_sensitivity: 0.6,
            pinch_damping: 0.5,
            wheel_zoom_step: 0.1,
            drag_throttle_ms: 16.0,
            hover_throttle_ms: 50.0,
            viewport: ViewportPolicy::default(),
        }
    }
}

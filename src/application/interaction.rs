//! Pointer, wheel and touch dispatch.
//!
//! Raw events arrive as plain coordinates from the host bindings. The
//! dispatcher tracks the gesture phase, throttles move streams, applies
//! viewport mutations, and fires the older-history callback when a
//! gesture drags the window against the left edge.

use std::rc::Rc;

use crate::domain::logging::LogComponent;
use crate::domain::time::{Clock, Throttle};
use crate::log_trace;

use super::config::EngineConfig;
use super::state::SharedState;

#[derive(Debug, Clone, PartialEq)]
enum Phase {
    Idle,
    Dragging { last_x: f64 },
    TouchPanning { last_x: f64 },
    Pinching { last_distance: f64 },
    PanelResize { id: String, last_y: f64 },
}

pub struct InteractionDispatcher {
    state: SharedState,
    clock: Rc<dyn Clock>,
    config: EngineConfig,
    canvas_height: f64,
    phase: Phase,
    drag_gate: Throttle,
    wheel_gate: Throttle,
    hover_gate: Throttle,
    hover: Option<(f64, f64)>,
    on_needs_history: Option<Box<dyn Fn()>>,
}

impl InteractionDispatcher {
    pub fn new(
        state: SharedState,
        clock: Rc<dyn Clock>,
        config: EngineConfig,
        canvas_height: f64,
    ) -> Self {
        Self {
            state,
            clock,
            canvas_height,
            phase: Phase::Idle,
            drag_gate: Throttle::new(config.drag_throttle_ms),
            wheel_gate: Throttle::new(config.drag_throttle_ms),
            hover_gate: Throttle::new(config.hover_throttle_ms),
            hover: None,
            on_needs_history: None,
            config,
        }
    }

    /// Invoked whenever a gesture leaves the viewport hungry for older
    /// history. The callee owns dedup via the fetch guard.
    pub fn set_history_callback(&mut self, callback: Box<dyn Fn()>) {
        self.on_needs_history = Some(callback);
    }

    pub fn set_canvas_height(&mut self, height: f64) {
        self.canvas_height = height;
    }

    /// Crosshair position, if any. Suppressed during gestures.
    pub fn hover(&self) -> Option<(f64, f64)> {
        self.hover
    }

    pub fn pointer_down(&mut self, x: f64, y: f64) {
        let handle = self
            .state
            .borrow()
            .panels
            .handle_at(y, self.canvas_height);
        self.phase = match handle {
            Some(id) => Phase::PanelResize { id, last_y: y },
            None => Phase::Dragging { last_x: x },
        };
        self.hover = None;
        self.drag_gate.reset();
        let mut state = self.state.borrow_mut();
        state.interacting = true;
        state.mark_dirty();
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) {
        let now = self.clock.now_ms();
        enum Step {
            Pan(f64),
            Resize(String, f64),
            Hover,
            Skip,
        }
        let step = match &mut self.phase {
            Phase::Dragging { last_x } => {
                if self.drag_gate.ready(now) {
                    let delta = x - *last_x;
                    *last_x = x;
                    Step::Pan(delta)
                } else {
                    Step::Skip
                }
            }
            Phase::PanelResize { id, last_y } => {
                if self.drag_gate.ready(now) {
                    let delta = y - *last_y;
                    *last_y = y;
                    Step::Resize(id.clone(), delta)
                } else {
                    Step::Skip
                }
            }
            Phase::TouchPanning { .. } | Phase::Pinching { .. } => Step::Skip,
            Phase::Idle => {
                if self.hover_gate.ready(now) {
                    Step::Hover
                } else {
                    Step::Skip
                }
            }
        };
        match step {
            Step::Pan(delta) => self.pan(delta, self.config.drag_sensitivity),
            Step::Resize(id, delta) => {
                let mut state = self.state.borrow_mut();
                if state.panels.drag_resize(&id, delta) {
                    state.mark_dirty();
                }
            }
            Step::Hover => {
                self.hover = Some((x, y));
                self.state.borrow_mut().mark_dirty();
            }
            Step::Skip => {}
        }
    }

    pub fn pointer_up(&mut self) {
        self.end_gesture();
    }

    pub fn pointer_leave(&mut self) {
        self.hover = None;
        self.end_gesture();
    }

    /// Wheel zoom about the cursor. Always returns `true`: the host
    /// must suppress page scroll even for throttled events.
    pub fn wheel(&mut self, delta_y: f64, x: f64) -> bool {
        if delta_y == 0.0 || !delta_y.is_finite() {
            return true;
        }
        if !self.wheel_gate.ready(self.clock.now_ms()) {
            return true;
        }
        let step = 1.0 + self.config.wheel_zoom_step;
        let factor = if delta_y < 0.0 { step } else { 1.0 / step };
        self.zoom(x, factor);
        true
    }

    pub fn touch_start(&mut self, points: &[(f64, f64)]) {
        match points {
            [] => return,
            [(x, _)] => {
                self.phase = Phase::TouchPanning { last_x: *x };
            }
            [a, b, ..] => {
                self.phase = Phase::Pinching {
                    last_distance: distance(*a, *b).max(1.0),
                };
            }
        }
        self.hover = None;
        self.drag_gate.reset();
        let mut state = self.state.borrow_mut();
        state.interacting = true;
        state.mark_dirty();
    }

    pub fn touch_move(&mut self, points: &[(f64, f64)]) {
        let now = self.clock.now_ms();
        enum Step {
            Pan(f64),
            Zoom(f64, f64),
            Restart,
            Skip,
        }
        let step = match (&mut self.phase, points) {
            (Phase::TouchPanning { last_x }, [(x, _)]) => {
                if self.drag_gate.ready(now) {
                    let delta = x - *last_x;
                    *last_x = *x;
                    Step::Pan(delta)
                } else {
                    Step::Skip
                }
            }
            (Phase::Pinching { last_distance }, [a, b, ..]) => {
                if self.drag_gate.ready(now) {
                    let dist = distance(*a, *b).max(1.0);
                    let raw = dist / *last_distance;
                    *last_distance = dist;
                    // Damp the raw ratio so pinches feel slower than wheel.
                    let factor = 1.0 + (raw - 1.0) * self.config.pinch_damping;
                    Step::Zoom((a.0 + b.0) / 2.0, factor)
                } else {
                    Step::Skip
                }
            }
            // Finger count changed mid-gesture; restart from here.
            (_, points) if !points.is_empty() => Step::Restart,
            _ => Step::Skip,
        };
        match step {
            Step::Pan(delta) => self.pan(delta, self.config.touch_pan_sensitivity),
            Step::Zoom(center_x, factor) => self.zoom(center_x, factor),
            Step::Restart => self.touch_start(points),
            Step::Skip => {}
        }
    }

    pub fn touch_end(&mut self, remaining: &[(f64, f64)]) {
        if remaining.is_empty() {
            self.end_gesture();
        } else {
            self.touch_start(remaining);
        }
    }

    fn pan(&mut self, delta_px: f64, sensitivity: f64) {
        if delta_px == 0.0 {
            return;
        }
        {
            let mut state = self.state.borrow_mut();
            let count = state.candles.len();
            state.viewport.pan_pixels(delta_px, sensitivity, count);
            state.mark_dirty();
        }
        self.maybe_request_history();
    }

    fn zoom(&mut self, center_px: f64, factor: f64) {
        {
            let mut state = self.state.borrow_mut();
            let count = state.candles.len();
            state.viewport.zoom_at(center_px, factor, count);
            state.mark_dirty();
        }
        self.maybe_request_history();
    }

    fn maybe_request_history(&self) {
        let needs = self.state.borrow().viewport.needs_older();
        if needs {
            log_trace!(LogComponent::Input, "left edge reached, requesting history");
            if let Some(callback) = &self.on_needs_history {
                callback();
            }
        }
    }

    fn end_gesture(&mut self) {
        if self.phase == Phase::Idle {
            return;
        }
        self.phase = Phase::Idle;
        let mut state = self.state.borrow_mut();
        state.interacting = false;
        state.mark_dirty();
    }
}

fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

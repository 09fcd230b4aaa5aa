//! Frame-scheduled render loop.
//!
//! The pipeline reschedules itself through a [`FrameScheduler`] rather
//! than calling the browser directly, measures the achievable rate for
//! the first second, then paces redraws at 30 or 60 Hz driven by the
//! shared dirty flag.

use std::cell::RefCell;
use std::rc::Rc;

use crate::domain::chart::ChartKind;
use crate::domain::logging::LogComponent;
use crate::{log_info, log_warn_keyed};

use super::state::SharedState;

/// One-shot frame callback scheduler (requestAnimationFrame in the
/// browser, a hand-pumped queue in tests). The callback receives the
/// frame timestamp in milliseconds.
pub trait FrameScheduler {
    fn schedule(&self, callback: Box<dyn FnOnce(f64)>);
}

/// Raised by a compositor that could not get a surface this frame.
/// The frame is skipped and the dirty flag survives for the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSkipped;

/// Draws the current state. Production composes offscreen and blits;
/// tests count calls.
pub trait SceneCompositor {
    fn compose_and_blit(
        &self,
        state: &SharedState,
        hover: Option<(f64, f64)>,
        now_ms: f64,
    ) -> Result<(), FrameSkipped>;
}

/// Structure-affecting inputs. A change means render resources must be
/// rebuilt rather than repainted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructuralInputs {
    pub width: u32,
    pub height: u32,
    pub kind: ChartKind,
    pub panel_signature: u64,
}

/// Minimum-interval draw gate with a liveness refresh.
#[derive(Debug, Clone)]
pub struct FramePacer {
    min_interval_ms: f64,
    last_draw_ms: f64,
}

/// Idle charts still repaint this often so clocks and status stay fresh.
const IDLE_REDRAW_MS: f64 = 1_000.0;

impl FramePacer {
    pub fn for_rate(hz: u32) -> Self {
        Self {
            // Slightly under the nominal interval so vsync jitter does
            // not drop every other frame.
            min_interval_ms: 1_000.0 / hz as f64 * 0.9,
            last_draw_ms: f64::NEG_INFINITY,
        }
    }

    pub fn should_draw(&self, now_ms: f64, dirty: bool) -> bool {
        let elapsed = now_ms - self.last_draw_ms;
        if elapsed < self.min_interval_ms {
            return false;
        }
        dirty || elapsed >= IDLE_REDRAW_MS
    }

    pub fn note_draw(&mut self, now_ms: f64) {
        self.last_draw_ms = now_ms;
    }
}

/// Counts frames for one second after startup to pick the pacing rate.
#[derive(Debug, Clone)]
struct FrameRateProbe {
    started_ms: Option<f64>,
    frames: u32,
}

const PROBE_WINDOW_MS: f64 = 1_000.0;
const HIGH_RATE_THRESHOLD: u32 = 50;

impl FrameRateProbe {
    fn new() -> Self {
        Self {
            started_ms: None,
            frames: 0,
        }
    }

    /// Returns the chosen target rate once the window closes.
    fn note_frame(&mut self, now_ms: f64) -> Option<u32> {
        let started = *self.started_ms.get_or_insert(now_ms);
        self.frames += 1;
        if now_ms - started >= PROBE_WINDOW_MS {
            Some(if self.frames >= HIGH_RATE_THRESHOLD {
                60
            } else {
                30
            })
        } else {
            None
        }
    }
}

struct PipelineInner {
    running: bool,
    /// Stale scheduled callbacks from a previous run check this.
    generation: u64,
    pacer: FramePacer,
    probe: Option<FrameRateProbe>,
    structure: Option<StructuralInputs>,
    frames_drawn: u64,
}

pub struct RenderPipeline {
    state: SharedState,
    scheduler: Rc<dyn FrameScheduler>,
    compositor: Rc<dyn SceneCompositor>,
    hover_source: RefCell<Option<Box<dyn Fn() -> Option<(f64, f64)>>>>,
    inner: RefCell<PipelineInner>,
}

impl RenderPipeline {
    pub fn new(
        state: SharedState,
        scheduler: Rc<dyn FrameScheduler>,
        compositor: Rc<dyn SceneCompositor>,
    ) -> Self {
        Self {
            state,
            scheduler,
            compositor,
            hover_source: RefCell::new(None),
            inner: RefCell::new(PipelineInner {
                running: false,
                generation: 0,
                pacer: FramePacer::for_rate(60),
                probe: Some(FrameRateProbe::new()),
                structure: None,
                frames_drawn: 0,
            }),
        }
    }

    /// Supplies the crosshair position each frame.
    pub fn set_hover_source(&self, source: Box<dyn Fn() -> Option<(f64, f64)>>) {
        *self.hover_source.borrow_mut() = Some(source);
    }

    pub fn start(self: &Rc<Self>) {
        let generation = {
            let mut inner = self.inner.borrow_mut();
            if inner.running {
                return;
            }
            inner.running = true;
            inner.generation += 1;
            inner.generation
        };
        log_info!(LogComponent::Render, "render loop started");
        Self::pump(self, generation);
    }

    pub fn stop(&self) {
        self.inner.borrow_mut().running = false;
    }

    pub fn is_running(&self) -> bool {
        self.inner.borrow().running
    }

    pub fn frames_drawn(&self) -> u64 {
        self.inner.borrow().frames_drawn
    }

    /// Recomputes structural inputs; on change the next frame repaints
    /// and downstream resources are rebuilt by the compositor (surface
    /// dimensions are part of the acquire key).
    pub fn refresh_structure(&self, width: u32, height: u32) {
        let next = {
            let state = self.state.borrow();
            StructuralInputs {
                width,
                height,
                kind: state.chart_kind,
                panel_signature: state.panels.structure_signature(),
            }
        };
        let mut inner = self.inner.borrow_mut();
        if inner.structure != Some(next) {
            inner.structure = Some(next);
            drop(inner);
            self.state.borrow_mut().mark_dirty();
        }
    }

    fn pump(this: &Rc<Self>, generation: u64) {
        let pipeline = Rc::clone(this);
        this.scheduler.schedule(Box::new(move |now_ms| {
            {
                let inner = pipeline.inner.borrow();
                if !inner.running || inner.generation != generation {
                    return;
                }
            }
            pipeline.frame(now_ms);
            Self::pump(&pipeline, generation);
        }));
    }

    fn frame(&self, now_ms: f64) {
        {
            let mut inner = self.inner.borrow_mut();
            if let Some(probe) = &mut inner.probe {
                if let Some(rate) = probe.note_frame(now_ms) {
                    log_info!(LogComponent::Render, "frame probe done, pacing at {rate}Hz");
                    inner.pacer = FramePacer::for_rate(rate);
                    inner.probe = None;
                }
            }
            let dirty = self.state.borrow().is_dirty();
            if !inner.pacer.should_draw(now_ms, dirty) {
                return;
            }
        }
        let hover = self
            .hover_source
            .borrow()
            .as_ref()
            .and_then(|source| source());
        match self.compositor.compose_and_blit(&self.state, hover, now_ms) {
            Ok(()) => {
                self.state.borrow_mut().take_dirty();
                let mut inner = self.inner.borrow_mut();
                inner.pacer.note_draw(now_ms);
                inner.frames_drawn += 1;
            }
            Err(FrameSkipped) => {
                // Dirty flag intentionally left set.
                log_warn_keyed!(
                    "render.frame_skipped",
                    LogComponent::Render,
                    "no surface available, frame skipped"
                );
            }
        }
    }
}

mod common;

use std::cell::Cell;
use std::rc::Rc;

use chart_engine_wasm::application::config::EngineConfig;
use chart_engine_wasm::application::render_pipeline::{
    FrameSkipped, RenderPipeline, SceneCompositor,
};
use chart_engine_wasm::application::state::{shared_state, SharedState};
use chart_engine_wasm::infrastructure::rendering::frame_scheduler::ManualScheduler;

struct CountingCompositor {
    draws: Cell<u32>,
    fail: Cell<bool>,
}

impl CountingCompositor {
    fn new() -> Self {
        Self {
            draws: Cell::new(0),
            fail: Cell::new(false),
        }
    }
}

impl SceneCompositor for CountingCompositor {
    fn compose_and_blit(
        &self,
        _state: &SharedState,
        _hover: Option<(f64, f64)>,
        _now_ms: f64,
    ) -> Result<(), FrameSkipped> {
        if self.fail.get() {
            return Err(FrameSkipped);
        }
        self.draws.set(self.draws.get() + 1);
        Ok(())
    }
}

struct Rig {
    state: SharedState,
    scheduler: Rc<ManualScheduler>,
    compositor: Rc<CountingCompositor>,
    pipeline: Rc<RenderPipeline>,
}

fn rig() -> Rig {
    let state = shared_state(800.0, &EngineConfig::default());
    let scheduler = Rc::new(ManualScheduler::new());
    let compositor = Rc::new(CountingCompositor::new());
    let pipeline = Rc::new(RenderPipeline::new(
        Rc::clone(&state),
        Rc::clone(&scheduler) as Rc<dyn chart_engine_wasm::application::render_pipeline::FrameScheduler>,
        Rc::clone(&compositor) as Rc<dyn SceneCompositor>,
    ));
    Rig {
        state,
        scheduler,
        compositor,
        pipeline,
    }
}

/// Pumps the loop at ~60Hz past the probe window so pacing settles.
fn settle_probe(rig: &Rig) -> f64 {
    let mut ts = 0.0;
    for _ in 0..65 {
        rig.scheduler.run_frame(ts);
        ts += 16.7;
    }
    ts
}

#[test]
fn loop_reschedules_itself_each_frame() {
    let rig = rig();
    rig.pipeline.start();
    assert_eq!(rig.scheduler.pending(), 1);
    rig.scheduler.run_frame(0.0);
    assert_eq!(rig.scheduler.pending(), 1);
}

#[test]
fn clean_frames_are_not_redrawn() {
    let rig = rig();
    rig.pipeline.start();
    let ts = settle_probe(&rig);
    let drawn = rig.compositor.draws.get();
    // No dirty flag: frames inside the idle refresh window do nothing.
    rig.scheduler.run_frame(ts + 16.7);
    rig.scheduler.run_frame(ts + 33.4);
    assert_eq!(rig.compositor.draws.get(), drawn);

    rig.state.borrow_mut().mark_dirty();
    rig.scheduler.run_frame(ts + 50.1);
    assert_eq!(rig.compositor.draws.get(), drawn + 1);
    assert!(!rig.state.borrow().is_dirty());
}

#[test]
fn dirty_redraws_are_paced_not_per_event() {
    let rig = rig();
    rig.pipeline.start();
    let ts = settle_probe(&rig);
    let drawn = rig.compositor.draws.get();
    // Dirty every frame at 240Hz event rate; draws stay ~60Hz paced.
    for i in 0..40 {
        rig.state.borrow_mut().mark_dirty();
        rig.scheduler.run_frame(ts + i as f64 * 4.0);
    }
    let delta = rig.compositor.draws.get() - drawn;
    assert!(delta <= 12, "drew {delta} frames in 160ms");
    assert!(delta >= 8);
}

#[test]
fn surface_failure_skips_frame_and_keeps_dirty() {
    let rig = rig();
    rig.pipeline.start();
    let ts = settle_probe(&rig);
    rig.compositor.fail.set(true);
    rig.state.borrow_mut().mark_dirty();
    rig.scheduler.run_frame(ts + 20.0);
    assert!(rig.state.borrow().is_dirty());

    rig.compositor.fail.set(false);
    let drawn = rig.compositor.draws.get();
    rig.scheduler.run_frame(ts + 40.0);
    assert_eq!(rig.compositor.draws.get(), drawn + 1);
    assert!(!rig.state.borrow().is_dirty());
}

#[test]
fn slow_environment_drops_to_30hz_pacing() {
    let rig = rig();
    rig.pipeline.start();
    // Probe sees ~25fps for its first second.
    let mut ts = 0.0;
    for _ in 0..30 {
        rig.scheduler.run_frame(ts);
        ts += 40.0;
    }
    let drawn = rig.compositor.draws.get();
    // Dirty every 16ms; 30Hz pacing admits roughly half the frames.
    for i in 0..60 {
        rig.state.borrow_mut().mark_dirty();
        rig.scheduler.run_frame(ts + i as f64 * 16.0);
    }
    let delta = rig.compositor.draws.get() - drawn;
    assert!(delta <= 34, "drew {delta} frames in 960ms at 30Hz pacing");
}

#[test]
fn stop_halts_the_loop() {
    let rig = rig();
    rig.pipeline.start();
    rig.scheduler.run_frame(0.0);
    rig.pipeline.stop();
    rig.scheduler.run_frame(16.0);
    assert_eq!(rig.scheduler.pending(), 0);
    assert!(!rig.pipeline.is_running());
}

#[test]
fn start_is_idempotent() {
    let rig = rig();
    rig.pipeline.start();
    rig.pipeline.start();
    assert_eq!(rig.scheduler.pending(), 1);
}

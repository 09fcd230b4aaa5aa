//! Offscreen surface pooling.
//!
//! Composing frames allocates full-size offscreen surfaces; creating
//! one per frame thrashes the allocator, so released surfaces are kept
//! for exact-dimension reuse. A periodic sweep evicts surfaces idle too
//! long after a resize changed the wanted dimensions.

use std::cell::RefCell;
use std::rc::Rc;

use crate::domain::logging::LogComponent;
use crate::domain::time::Clock;
use crate::log_debug;

pub const POOL_CAP: usize = 8;
pub const SWEEP_INTERVAL_MS: f64 = 30_000.0;
pub const IDLE_EVICT_MS: f64 = 60_000.0;

/// Creates surfaces on demand. `None` means the environment refused
/// (e.g. context loss); callers skip the frame.
pub trait SurfaceFactory {
    type Surface;
    fn create(&self, width: u32, height: u32) -> Option<Self::Surface>;
}

struct PooledSurface<S> {
    surface: S,
    width: u32,
    height: u32,
    released_ms: f64,
}

pub struct SurfacePool<F: SurfaceFactory> {
    factory: F,
    clock: Rc<dyn Clock>,
    free: RefCell<Vec<PooledSurface<F::Surface>>>,
    last_sweep_ms: RefCell<f64>,
}

impl<F: SurfaceFactory> SurfacePool<F> {
    pub fn new(factory: F, clock: Rc<dyn Clock>) -> Self {
        let now = clock.now_ms();
        Self {
            factory,
            clock,
            free: RefCell::new(Vec::new()),
            last_sweep_ms: RefCell::new(now),
        }
    }

    /// Reuses a pooled surface with exactly these dimensions, or
    /// creates a fresh one. Mismatched surfaces stay pooled until the
    /// sweep ages them out.
    pub fn acquire(&self, width: u32, height: u32) -> Option<F::Surface> {
        let mut free = self.free.borrow_mut();
        if let Some(pos) = free
            .iter()
            .position(|s| s.width == width && s.height == height)
        {
            return Some(free.swap_remove(pos).surface);
        }
        drop(free);
        self.factory.create(width, height)
    }

    /// Returns a surface to the pool. Beyond capacity the surface is
    /// dropped instead.
    pub fn release(&self, surface: F::Surface, width: u32, height: u32) {
        let mut free = self.free.borrow_mut();
        if free.len() >= POOL_CAP {
            return;
        }
        free.push(PooledSurface {
            surface,
            width,
            height,
            released_ms: self.clock.now_ms(),
        });
    }

    /// Runs the idle eviction if the sweep interval has elapsed.
    pub fn maybe_sweep(&self) {
        let now = self.clock.now_ms();
        {
            let mut last = self.last_sweep_ms.borrow_mut();
            if now - *last < SWEEP_INTERVAL_MS {
                return;
            }
            *last = now;
        }
        let mut free = self.free.borrow_mut();
        let before = free.len();
        free.retain(|s| now - s.released_ms <= IDLE_EVICT_MS);
        let evicted = before - free.len();
        if evicted > 0 {
            log_debug!(LogComponent::Render, "evicted {evicted} idle surfaces");
        }
    }

    pub fn pooled(&self) -> usize {
        self.free.borrow().len()
    }
}

/// Factory producing unattached canvases with 2D contexts.
pub struct CanvasSurfaceFactory;

pub struct CanvasSurface {
    pub canvas: web_sys::HtmlCanvasElement,
    pub context: web_sys::CanvasRenderingContext2d,
}

impl SurfaceFactory for CanvasSurfaceFactory {
    type Surface = CanvasSurface;

    fn create(&self, width: u32, height: u32) -> Option<CanvasSurface> {
        use wasm_bindgen::JsCast;
        let document = web_sys::window()?.document()?;
        let canvas: web_sys::HtmlCanvasElement = document
            .create_element("canvas")
            .ok()?
            .dyn_into()
            .ok()?;
        canvas.set_width(width);
        canvas.set_height(height);
        let context: web_sys::CanvasRenderingContext2d =
            canvas.get_context("2d").ok()??.dyn_into().ok()?;
        Some(CanvasSurface { canvas, context })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::time::ManualClock;
    use std::cell::Cell;

    struct CountingFactory {
        created: Cell<usize>,
    }

    impl SurfaceFactory for CountingFactory {
        type Surface = u32;

        fn create(&self, _width: u32, _height: u32) -> Option<u32> {
            self.created.set(self.created.get() + 1);
            Some(self.created.get() as u32)
        }
    }

    fn pool(clock: Rc<ManualClock>) -> SurfacePool<CountingFactory> {
        SurfacePool::new(
            CountingFactory {
                created: Cell::new(0),
            },
            clock,
        )
    }

    #[test]
    fn exact_dimensions_are_reused() {
        let clock = Rc::new(ManualClock::new(0.0));
        let pool = pool(clock);
        let surface = pool.acquire(800, 600).unwrap();
        pool.release(surface, 800, 600);
        pool.acquire(800, 600).unwrap();
        assert_eq!(pool.factory.created.get(), 1);
    }

    #[test]
    fn mismatched_dimensions_allocate_fresh() {
        let clock = Rc::new(ManualClock::new(0.0));
        let pool = pool(clock);
        let surface = pool.acquire(800, 600).unwrap();
        pool.release(surface, 800, 600);
        pool.acquire(1_024, 768).unwrap();
        assert_eq!(pool.factory.created.get(), 2);
        assert_eq!(pool.pooled(), 1);
    }

    #[test]
    fn pool_capacity_is_bounded() {
        let clock = Rc::new(ManualClock::new(0.0));
        let pool = pool(clock);
        for _ in 0..(POOL_CAP + 4) {
            let surface = pool.acquire(10, 10).unwrap();
            // Fresh each time: keep none checked out, release all.
            pool.release(surface, 99, 99);
        }
        assert_eq!(pool.pooled(), POOL_CAP);
    }

    #[test]
    fn sweep_evicts_only_stale_surfaces() {
        let clock = Rc::new(ManualClock::new(0.0));
        let pool = pool(Rc::clone(&clock));
        let old = pool.acquire(800, 600).unwrap();
        pool.release(old, 800, 600);
        clock.set(55_000.0);
        let fresh = pool.acquire(400, 300).unwrap();
        pool.release(fresh, 400, 300);
        clock.set(70_000.0);
        pool.maybe_sweep();
        assert_eq!(pool.pooled(), 1);
    }

    #[test]
    fn sweep_respects_cadence() {
        let clock = Rc::new(ManualClock::new(0.0));
        let pool = pool(Rc::clone(&clock));
        let surface = pool.acquire(800, 600).unwrap();
        pool.release(surface, 800, 600);
        // Surface is past the idle TTL but the sweep interval since the
        // last sweep has not elapsed after the first run.
        clock.set(61_000.0);
        pool.maybe_sweep();
        assert_eq!(pool.pooled(), 0);
        let surface = pool.acquire(800, 600).unwrap();
        pool.release(surface, 800, 600);
        clock.set(80_000.0);
        pool.maybe_sweep();
        assert_eq!(pool.pooled(), 1);
    }
}

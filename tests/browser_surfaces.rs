//! Browser-only checks for the DOM-backed surface factory.
//!
//! Run with `wasm-pack test --headless --chrome`.

#![cfg(target_arch = "wasm32")]

use std::rc::Rc;

use chart_engine_wasm::domain::time::Clock;
use chart_engine_wasm::infrastructure::clock::BrowserClock;
use chart_engine_wasm::infrastructure::rendering::surface_pool::{
    CanvasSurfaceFactory, SurfacePool,
};
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

#[wasm_bindgen_test]
fn canvas_factory_produces_sized_surfaces() {
    let pool = SurfacePool::new(CanvasSurfaceFactory, Rc::new(BrowserClock));
    let surface = pool.acquire(320, 240).expect("canvas surface");
    assert_eq!(surface.canvas.width(), 320);
    assert_eq!(surface.canvas.height(), 240);
    pool.release(surface, 320, 240);
    assert_eq!(pool.pooled(), 1);
}

#[wasm_bindgen_test]
fn released_canvas_is_reused() {
    let pool = SurfacePool::new(CanvasSurfaceFactory, Rc::new(BrowserClock));
    let surface = pool.acquire(100, 100).expect("canvas surface");
    pool.release(surface, 100, 100);
    let again = pool.acquire(100, 100).expect("canvas surface");
    assert_eq!(again.canvas.width(), 100);
    assert_eq!(pool.pooled(), 0);
}

#[wasm_bindgen_test]
fn browser_clock_advances() {
    let clock = BrowserClock;
    assert!(clock.now_ms() > 0.0);
}

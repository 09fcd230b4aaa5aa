//! Frame callback schedulers.

use std::cell::RefCell;
use std::collections::VecDeque;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use crate::application::render_pipeline::FrameScheduler;

/// requestAnimationFrame-backed scheduler.
#[derive(Default)]
pub struct BrowserFrameScheduler;

impl FrameScheduler for BrowserFrameScheduler {
    fn schedule(&self, callback: Box<dyn FnOnce(f64)>) {
        let closure = Closure::once(move |timestamp: f64| callback(timestamp));
        if let Some(window) = web_sys::window() {
            let _ = window.request_animation_frame(closure.as_ref().unchecked_ref());
        }
        // The browser owns the callback from here.
        closure.forget();
    }
}

/// Hand-pumped scheduler so tests drive frames deterministically.
#[derive(Default)]
pub struct ManualScheduler {
    queue: RefCell<VecDeque<Box<dyn FnOnce(f64)>>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Delivers the next scheduled callback at `timestamp_ms`.
    /// Returns `false` when nothing was queued.
    pub fn run_frame(&self, timestamp_ms: f64) -> bool {
        let callback = self.queue.borrow_mut().pop_front();
        match callback {
            Some(callback) => {
                callback(timestamp_ms);
                true
            }
            None => false,
        }
    }
}

impl FrameScheduler for ManualScheduler {
    fn schedule(&self, callback: Box<dyn FnOnce(f64)>) {
        self.queue.borrow_mut().push_back(callback);
    }
}

//! Interactive candlestick chart engine for the browser.
//!
//! Layered bottom-up: `domain` holds the pure chart model (candle
//! buffer, viewport math, indicators), `application` the services wired
//! over shared state, `infrastructure` the HTTP/WebSocket/canvas
//! bindings, and `presentation` the JS-facing facade.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

use wasm_bindgen::prelude::*;

use domain::logging::{init_log_time, init_logger, LogLevel, RateLimitedLogger};
use infrastructure::clock::BrowserClock;
use infrastructure::console_logger::ConsoleLogger;

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    init_log_time(Box::new(BrowserClock));
    init_logger(Box::new(RateLimitedLogger::new(
        ConsoleLogger::new(LogLevel::Info),
        domain::logging::DEFAULT_SUPPRESSION_WINDOW_MS,
    )));
}

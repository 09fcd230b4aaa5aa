//! Wall-clock backed by the JS `Date` object.

use crate::domain::logging::LogTimeSource;
use crate::domain::time::Clock;

#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserClock;

impl Clock for BrowserClock {
    fn now_ms(&self) -> f64 {
        js_sys::Date::now()
    }
}

// Log entries share the same timestamps as engine decisions.
impl LogTimeSource for BrowserClock {
    fn now_ms(&self) -> f64 {
        js_sys::Date::now()
    }
}

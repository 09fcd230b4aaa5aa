//! Browser console sink for the logging facade.

use crate::domain::logging::{LogEntry, LogLevel, Logger};

#[derive(Default)]
pub struct ConsoleLogger {
    min_level: LogLevel,
}

impl ConsoleLogger {
    pub fn new(min_level: LogLevel) -> Self {
        Self { min_level }
    }
}

impl Logger for ConsoleLogger {
    fn log(&self, entry: LogEntry) {
        if entry.level < self.min_level {
            return;
        }
        let line = entry.format();
        match entry.level {
            LogLevel::Trace | LogLevel::Debug => gloo::console::debug!(line),
            LogLevel::Info => gloo::console::log!(line),
            LogLevel::Warn => gloo::console::warn!(line),
            LogLevel::Error => gloo::console::error!(line),
        }
    }
}

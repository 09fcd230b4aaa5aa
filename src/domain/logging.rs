//! Structured logging with per-key suppression.
//!
//! The engine logs through a global [`Logger`] installed once at startup.
//! High-frequency paths (stream parse failures, render skips) tag entries
//! with a stable key so [`RateLimitedLogger`] can collapse repeats into a
//! single line per suppression window.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

use derive_more::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, Default)]
pub enum LogLevel {
    #[display(fmt = "TRACE")]
    Trace,
    #[display(fmt = "DEBUG")]
    Debug,
    #[default]
    #[display(fmt = "INFO")]
    Info,
    #[display(fmt = "WARN")]
    Warn,
    #[display(fmt = "ERROR")]
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum LogComponent {
    #[display(fmt = "data")]
    Data,
    #[display(fmt = "stream")]
    Stream,
    #[display(fmt = "viewport")]
    Viewport,
    #[display(fmt = "input")]
    Input,
    #[display(fmt = "render")]
    Render,
    #[display(fmt = "indicators")]
    Indicators,
    #[display(fmt = "settings")]
    Settings,
    #[display(fmt = "engine")]
    Engine,
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp_ms: f64,
    pub level: LogLevel,
    pub component: LogComponent,
    pub message: String,
    /// Stable identity for rate limiting; entries without a key are
    /// never suppressed.
    pub key: Option<&'static str>,
}

impl LogEntry {
    pub fn new(level: LogLevel, component: LogComponent, message: String) -> Self {
        Self {
            timestamp_ms: log_now_ms(),
            level,
            component,
            message,
            key: None,
        }
    }

    pub fn keyed(
        key: &'static str,
        level: LogLevel,
        component: LogComponent,
        message: String,
    ) -> Self {
        Self {
            key: Some(key),
            ..Self::new(level, component, message)
        }
    }

    pub fn format(&self) -> String {
        format!(
            "[{:.0}ms] {} [{}] {}",
            self.timestamp_ms, self.level, self.component, self.message
        )
    }
}

pub trait Logger: Send + Sync {
    fn log(&self, entry: LogEntry);

    fn trace(&self, component: LogComponent, message: String) {
        self.log(LogEntry::new(LogLevel::Trace, component, message));
    }
    fn debug(&self, component: LogComponent, message: String) {
        self.log(LogEntry::new(LogLevel::Debug, component, message));
    }
    fn info(&self, component: LogComponent, message: String) {
        self.log(LogEntry::new(LogLevel::Info, component, message));
    }
    fn warn(&self, component: LogComponent, message: String) {
        self.log(LogEntry::new(LogLevel::Warn, component, message));
    }
    fn error(&self, component: LogComponent, message: String) {
        self.log(LogEntry::new(LogLevel::Error, component, message));
    }
}

/// Swallows everything; used before `init_logger` runs.
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    fn log(&self, _entry: LogEntry) {}
}

/// Collects entries for assertions in tests.
#[derive(Default)]
pub struct MemoryLogger {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl Logger for MemoryLogger {
    fn log(&self, entry: LogEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
    }
}

/// Wraps another logger and drops keyed entries that repeat within the
/// suppression window. Unkeyed entries always pass through.
pub struct RateLimitedLogger<L: Logger> {
    inner: L,
    window_ms: f64,
    last_seen: Mutex<HashMap<&'static str, f64>>,
}

pub const DEFAULT_SUPPRESSION_WINDOW_MS: f64 = 5_000.0;

impl<L: Logger> RateLimitedLogger<L> {
    pub fn new(inner: L, window_ms: f64) -> Self {
        Self {
            inner,
            window_ms,
            last_seen: Mutex::new(HashMap::new()),
        }
    }
}

impl<L: Logger> Logger for RateLimitedLogger<L> {
    fn log(&self, entry: LogEntry) {
        if let Some(key) = entry.key {
            let mut seen = match self.last_seen.lock() {
                Ok(seen) => seen,
                Err(_) => return,
            };
            if let Some(&last) = seen.get(key) {
                if entry.timestamp_ms - last < self.window_ms {
                    return;
                }
            }
            seen.insert(key, entry.timestamp_ms);
        }
        self.inner.log(entry);
    }
}

static LOGGER: OnceLock<Box<dyn Logger>> = OnceLock::new();
static NOOP: NoOpLogger = NoOpLogger;

pub fn init_logger(logger: Box<dyn Logger>) {
    let _ = LOGGER.set(logger);
}

pub fn get_logger() -> &'static dyn Logger {
    LOGGER.get().map(|l| l.as_ref()).unwrap_or(&NOOP)
}

/// Timestamp source for log entries. Falls back to a monotonic counter
/// when no real clock has been installed (native tests).
pub trait LogTimeSource: Send + Sync {
    fn now_ms(&self) -> f64;
}

struct CounterTime(AtomicU64);

impl LogTimeSource for CounterTime {
    fn now_ms(&self) -> f64 {
        self.0.fetch_add(1, Ordering::Relaxed) as f64
    }
}

static LOG_TIME: OnceLock<Box<dyn LogTimeSource>> = OnceLock::new();

pub fn init_log_time(source: Box<dyn LogTimeSource>) {
    let _ = LOG_TIME.set(source);
}

fn log_now_ms() -> f64 {
    static FALLBACK: OnceLock<CounterTime> = OnceLock::new();
    match LOG_TIME.get() {
        Some(source) => source.now_ms(),
        None => FALLBACK
            .get_or_init(|| CounterTime(AtomicU64::new(0)))
            .now_ms(),
    }
}

#[macro_export]
macro_rules! log_trace {
    ($component:expr, $($arg:tt)*) => {
        $crate::domain::logging::get_logger().trace($component, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_debug {
    ($component:expr, $($arg:tt)*) => {
        $crate::domain::logging::get_logger().debug($component, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_info {
    ($component:expr, $($arg:tt)*) => {
        $crate::domain::logging::get_logger().info($component, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($component:expr, $($arg:tt)*) => {
        $crate::domain::logging::get_logger().warn($component, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_error {
    ($component:expr, $($arg:tt)*) => {
        $crate::domain::logging::get_logger().error($component, format!($($arg)*))
    };
}

/// Warn with a suppression key; repeats inside the window are dropped
/// when a [`RateLimitedLogger`] is installed.
#[macro_export]
macro_rules! log_warn_keyed {
    ($key:expr, $component:expr, $($arg:tt)*) => {
        $crate::domain::logging::get_logger().log(
            $crate::domain::logging::LogEntry::keyed(
                $key,
                $crate::domain::logging::LogLevel::Warn,
                $component,
                format!($($arg)*),
            ),
        )
    };
}

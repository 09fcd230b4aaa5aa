pub mod clock;
pub mod console_logger;
pub mod http;
pub mod rendering;
pub mod settings;
pub mod websocket;

pub use clock::BrowserClock;
pub use console_logger::ConsoleLogger;
pub use http::RestHistorySource;
pub use settings::{
    load_indicators, save_indicators, LocalStorageSettings, MemorySettings, SettingsStore,
    INDICATOR_SETTINGS_KEY,
};

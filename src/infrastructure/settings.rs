//! Indicator settings persistence.

use std::cell::RefCell;
use std::collections::HashMap;

use gloo::storage::{LocalStorage, Storage};

use crate::domain::logging::LogComponent;
use crate::domain::market_data::IndicatorConfig;
use crate::log_warn_keyed;

pub const INDICATOR_SETTINGS_KEY: &str = "chart.indicators.v1";

/// Key/value settings backend. Browser uses localStorage; tests use
/// the in-memory store.
pub trait SettingsStore {
    fn load(&self, key: &str) -> Option<String>;
    fn save(&self, key: &str, value: &str) -> Result<(), String>;
}

#[derive(Default)]
pub struct LocalStorageSettings;

impl SettingsStore for LocalStorageSettings {
    fn load(&self, key: &str) -> Option<String> {
        LocalStorage::get(key).ok()
    }

    fn save(&self, key: &str, value: &str) -> Result<(), String> {
        LocalStorage::set(key, value).map_err(|err| err.to_string())
    }
}

#[derive(Default)]
pub struct MemorySettings {
    entries: RefCell<HashMap<String, String>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettings {
    fn load(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn save(&self, key: &str, value: &str) -> Result<(), String> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Persists the indicator set. Failures are logged, never fatal.
pub fn save_indicators(store: &dyn SettingsStore, configs: &[IndicatorConfig]) {
    let json = match serde_json::to_string(configs) {
        Ok(json) => json,
        Err(err) => {
            log_warn_keyed!(
                "settings.encode",
                LogComponent::Settings,
                "indicator settings encode failed: {err}"
            );
            return;
        }
    };
    if let Err(err) = store.save(INDICATOR_SETTINGS_KEY, &json) {
        log_warn_keyed!(
            "settings.save",
            LogComponent::Settings,
            "indicator settings save failed: {err}"
        );
    }
}

/// Loads the persisted indicator set; corrupt payloads yield an empty
/// set rather than an error.
pub fn load_indicators(store: &dyn SettingsStore) -> Vec<IndicatorConfig> {
    let Some(json) = store.load(INDICATOR_SETTINGS_KEY) else {
        return Vec::new();
    };
    match serde_json::from_str(&json) {
        Ok(configs) => configs,
        Err(err) => {
            log_warn_keyed!(
                "settings.decode",
                LogComponent::Settings,
                "ignoring corrupt indicator settings: {err}"
            );
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market_data::IndicatorKind;

    #[test]
    fn indicators_round_trip_through_store() {
        let store = MemorySettings::new();
        let configs = vec![
            IndicatorConfig::new("sma20", IndicatorKind::Sma, 20),
            IndicatorConfig::new("rsi14", IndicatorKind::Rsi, 14),
        ];
        save_indicators(&store, &configs);
        assert_eq!(load_indicators(&store), configs);
    }

    #[test]
    fn corrupt_settings_fall_back_to_empty() {
        let store = MemorySettings::new();
        store.save(INDICATOR_SETTINGS_KEY, "{not valid").unwrap();
        assert!(load_indicators(&store).is_empty());
    }

    #[test]
    fn missing_settings_yield_empty_set() {
        let store = MemorySettings::new();
        assert!(load_indicators(&store).is_empty());
    }
}

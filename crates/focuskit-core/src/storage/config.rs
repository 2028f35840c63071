//! Timer settings and their persistent store.
//!
//! Settings live as one JSON object under [`SETTINGS_KEY`] in a key-value
//! store (the `kv` table of [`Database`](super::Database) in production).
//! Reads are sanitized field by field; writes are validated as a whole.

use std::rc::Rc;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ConfigError, PersistenceError};

/// Fixed key the settings object is stored under.
pub const SETTINGS_KEY: &str = "focus_settings";

/// Minimal string key-value persistence.
pub trait KeyValueStore {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        (**self).read(key)
    }
    fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        (**self).write(key, value)
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Rc<T> {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        (**self).read(key)
    }
    fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        (**self).write(key, value)
    }
}

/// Timer durations and behavior flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    pub focus_minutes: u32,
    pub short_break_minutes: u32,
    pub long_break_minutes: u32,
    /// Number of completed focus phases between long breaks.
    pub long_break_interval: u32,
    pub auto_start_breaks: bool,
    pub auto_start_focus: bool,
    pub sound_enabled: bool,
    pub notifications_enabled: bool,
}

// Defaults
const DEFAULT_FOCUS_MINUTES: u32 = 25;
const DEFAULT_SHORT_BREAK_MINUTES: u32 = 5;
const DEFAULT_LONG_BREAK_MINUTES: u32 = 15;
const DEFAULT_LONG_BREAK_INTERVAL: u32 = 4;
const MIN_LONG_BREAK_INTERVAL: u32 = 2;

impl Default for Configuration {
    fn default() -> Self {
        Self {
            focus_minutes: DEFAULT_FOCUS_MINUTES,
            short_break_minutes: DEFAULT_SHORT_BREAK_MINUTES,
            long_break_minutes: DEFAULT_LONG_BREAK_MINUTES,
            long_break_interval: DEFAULT_LONG_BREAK_INTERVAL,
            auto_start_breaks: false,
            auto_start_focus: false,
            sound_enabled: true,
            notifications_enabled: true,
        }
    }
}

impl Configuration {
    /// Check every invariant, reporting the first violated field.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidConfiguration`] naming the field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, minutes) in [
            ("focusMinutes", self.focus_minutes),
            ("shortBreakMinutes", self.short_break_minutes),
            ("longBreakMinutes", self.long_break_minutes),
        ] {
            if minutes == 0 {
                return Err(ConfigError::invalid(field, "must be greater than 0"));
            }
        }
        if self.long_break_interval < MIN_LONG_BREAK_INTERVAL {
            return Err(ConfigError::invalid(
                "longBreakInterval",
                format!("must be at least {MIN_LONG_BREAK_INTERVAL}"),
            ));
        }
        Ok(())
    }

    /// Decode a stored settings object.
    ///
    /// Never fails: a missing, mistyped or out-of-range field takes its
    /// default without affecting the others, and unreadable input yields
    /// the defaults.
    pub fn from_stored(raw: &str) -> Self {
        let defaults = Self::default();
        let value: serde_json::Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "stored settings are not valid JSON, using defaults");
                return defaults;
            }
        };
        let Some(obj) = value.as_object() else {
            warn!("stored settings are not an object, using defaults");
            return defaults;
        };

        let number = |key: &str, min: u32, fallback: u32| -> u32 {
            let Some(raw) = obj.get(key) else {
                return fallback;
            };
            match raw
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .filter(|n| *n >= min)
            {
                Some(n) => n,
                None => {
                    warn!(key, value = %raw, "malformed stored setting, using default");
                    fallback
                }
            }
        };
        let flag = |key: &str, fallback: bool| -> bool {
            let Some(raw) = obj.get(key) else {
                return fallback;
            };
            match raw.as_bool() {
                Some(b) => b,
                None => {
                    warn!(key, value = %raw, "malformed stored setting, using default");
                    fallback
                }
            }
        };

        Self {
            focus_minutes: number("focusMinutes", 1, defaults.focus_minutes),
            short_break_minutes: number("shortBreakMinutes", 1, defaults.short_break_minutes),
            long_break_minutes: number("longBreakMinutes", 1, defaults.long_break_minutes),
            long_break_interval: number(
                "longBreakInterval",
                MIN_LONG_BREAK_INTERVAL,
                defaults.long_break_interval,
            ),
            auto_start_breaks: flag("autoStartBreaks", defaults.auto_start_breaks),
            auto_start_focus: flag("autoStartFocus", defaults.auto_start_focus),
            sound_enabled: flag("soundEnabled", defaults.sound_enabled),
            notifications_enabled: flag("notificationsEnabled", defaults.notifications_enabled),
        }
    }

    /// Get a field as a string by its camelCase key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        json.get(key).map(|v| v.to_string())
    }

    /// Copy of `self` with one field replaced, parsed by its current type.
    ///
    /// The result is validated before it is returned.
    ///
    /// # Errors
    /// Unknown keys, unparseable values and invariant violations.
    pub fn with_value(&self, key: &str, value: &str) -> Result<Self, ConfigError> {
        let mut json =
            serde_json::to_value(self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        let obj = json
            .as_object_mut()
            .ok_or_else(|| ConfigError::ParseFailed("settings are not an object".into()))?;
        let existing = obj
            .get(key)
            .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

        let new_value = match existing {
            serde_json::Value::Bool(_) => value
                .parse::<bool>()
                .map(serde_json::Value::Bool)
                .map_err(|_| ConfigError::ParseFailed(format!("cannot parse '{value}' as bool")))?,
            serde_json::Value::Number(_) => value
                .parse::<u32>()
                .map(|n| serde_json::Value::Number(n.into()))
                .map_err(|_| {
                    ConfigError::ParseFailed(format!("cannot parse '{value}' as minutes"))
                })?,
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        };
        obj.insert(key.to_string(), new_value);

        let updated: Configuration =
            serde_json::from_value(json).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        updated.validate()?;
        Ok(updated)
    }

    /// Every field key, sorted.
    pub fn keys() -> Vec<String> {
        match serde_json::to_value(Self::default()) {
            Ok(serde_json::Value::Object(map)) => map.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }
}

/// Loads, validates and persists the [`Configuration`].
pub struct ConfigStore {
    kv: Box<dyn KeyValueStore>,
    current: Configuration,
}

impl ConfigStore {
    /// Open the store and load the current settings from `kv`.
    pub fn open(kv: impl KeyValueStore + 'static) -> Self {
        let mut store = Self {
            kv: Box::new(kv),
            current: Configuration::default(),
        };
        store.current = store.load();
        store
    }

    /// Settings as of the last successful load or save.
    pub fn current(&self) -> &Configuration {
        &self.current
    }

    /// Read the settings from the backing store.
    ///
    /// Falls back to defaults (per field) when the entry is absent or
    /// malformed, or when the store itself cannot be read.
    pub fn load(&self) -> Configuration {
        match self.kv.read(SETTINGS_KEY) {
            Ok(Some(raw)) => Configuration::from_stored(&raw),
            Ok(None) => Configuration::default(),
            Err(e) => {
                warn!(error = %e, "failed to read settings, using defaults");
                Configuration::default()
            }
        }
    }

    /// Validate and persist `config`, then make it current.
    ///
    /// # Errors
    /// Invalid settings are rejected before anything is written; a failed
    /// write leaves the current settings unchanged.
    pub fn save(&mut self, config: Configuration) -> Result<(), ConfigError> {
        config.validate()?;
        let json = serde_json::to_string(&config)
            .map_err(|e| ConfigError::SaveFailed(PersistenceError::from(e)))?;
        self.kv
            .write(SETTINGS_KEY, &json)
            .map_err(ConfigError::SaveFailed)?;
        debug!(?config, "settings saved");
        self.current = config;
        Ok(())
    }

    /// Get a config value as string by key.
    pub fn get(&self, key: &str) -> Option<String> {
        self.current.get(key)
    }

    /// Set a config value by key and persist the result.
    ///
    /// # Errors
    /// See [`Configuration::with_value`] and [`ConfigStore::save`].
    pub fn set(&mut self, key: &str, value: &str) -> Result<Configuration, ConfigError> {
        let updated = self.current.with_value(key, value)?;
        self.save(updated.clone())?;
        Ok(updated)
    }

    /// Persist the defaults.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    pub fn reset(&mut self) -> Result<(), ConfigError> {
        self.save(Configuration::default())
    }
}

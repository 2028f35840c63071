mod config;
pub mod database;
pub mod memory;

pub use config::{ConfigStore, Configuration, KeyValueStore, SETTINGS_KEY};
pub use database::{Database, SessionRecord, SessionSink, Stats};
pub use memory::{MemorySessions, MemoryStore};

use std::path::PathBuf;

use crate::error::Result;

/// Returns the focuskit data directory, creating it if needed.
///
/// `FOCUSKIT_DATA_DIR` overrides the location outright. Otherwise this is
/// `~/.config/focuskit[-dev]/`, with `FOCUSKIT_ENV=dev` selecting the
/// development directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os("FOCUSKIT_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("FOCUSKIT_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("focuskit-dev")
            } else {
                base_dir.join("focuskit")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

// Suspender Settings Engine
// Loads, saves and updates the user's suspension options.
// Settings are stored as a JSON file in the platform config directory.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::adapters::OptionsSource;
use crate::types::errors::SettingsError;
use crate::types::settings::SuspenderSettings;

/// Directory name under the platform config dir.
const APP_DIR: &str = "tab-suspender";

/// Trait defining the settings engine interface.
pub trait SettingsEngineTrait {
    fn load(&mut self) -> Result<SuspenderSettings, SettingsError>;
    fn save(&self) -> Result<(), SettingsError>;
    fn get_settings(&self) -> &SuspenderSettings;
    fn set_value(&mut self, key: &str, value: serde_json::Value) -> Result<(), SettingsError>;
    fn reset(&mut self) -> Result<(), SettingsError>;
    fn get_config_path(&self) -> &Path;
}

/// Settings engine that persists options as JSON on disk.
pub struct SettingsEngine {
    config_path: PathBuf,
    settings: SuspenderSettings,
}

impl SettingsEngine {
    /// Creates a new SettingsEngine.
    ///
    /// Uses `path_override` when given, otherwise `settings.json` inside the
    /// platform config directory.
    pub fn new(path_override: Option<PathBuf>) -> Self {
        let config_path = path_override.unwrap_or_else(|| {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
                .join("settings.json")
        });

        Self {
            config_path,
            settings: SuspenderSettings::default(),
        }
    }
}

impl SettingsEngineTrait for SettingsEngine {
    /// Loads settings from the JSON config file.
    ///
    /// A missing file yields defaults; a malformed one is a serialization error.
    fn load(&mut self) -> Result<SuspenderSettings, SettingsError> {
        if !self.config_path.exists() {
            debug!(path = %self.config_path.display(), "no settings file, using defaults");
            self.settings = SuspenderSettings::default();
            return Ok(self.settings.clone());
        }

        let content = fs::read_to_string(&self.config_path)
            .map_err(|e| SettingsError::IoError(format!("Failed to read config file: {}", e)))?;

        let settings: SuspenderSettings = serde_json::from_str(&content).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to parse config file: {}", e))
        })?;

        self.settings = settings;
        Ok(self.settings.clone())
    }

    /// Saves the current settings, creating parent directories as needed.
    fn save(&self) -> Result<(), SettingsError> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SettingsError::IoError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let json = serde_json::to_string_pretty(&self.settings).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to serialize settings: {}", e))
        })?;

        fs::write(&self.config_path, json)
            .map_err(|e| SettingsError::IoError(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    fn get_settings(&self) -> &SuspenderSettings {
        &self.settings
    }

    /// Updates one option by key and saves.
    ///
    /// The settings are round-tripped through `serde_json::Value` so the new
    /// value is type-checked by deserialization before it is accepted.
    fn set_value(&mut self, key: &str, value: serde_json::Value) -> Result<(), SettingsError> {
        if key.is_empty() {
            return Err(SettingsError::InvalidKey("Key cannot be empty".to_string()));
        }

        let mut json_value = serde_json::to_value(&self.settings).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to serialize settings: {}", e))
        })?;

        match json_value.as_object_mut() {
            Some(map) if map.contains_key(key) => {
                map.insert(key.to_string(), value);
            }
            _ => {
                return Err(SettingsError::InvalidKey(format!(
                    "Key '{}' not found in settings",
                    key
                )));
            }
        }

        let new_settings: SuspenderSettings = serde_json::from_value(json_value).map_err(|e| {
            SettingsError::InvalidValue(format!("Invalid value for key '{}': {}", key, e))
        })?;

        self.settings = new_settings;
        self.save()?;

        Ok(())
    }

    fn reset(&mut self) -> Result<(), SettingsError> {
        self.settings = SuspenderSettings::default();
        self.save()?;
        Ok(())
    }

    fn get_config_path(&self) -> &Path {
        &self.config_path
    }
}

impl OptionsSource for SettingsEngine {
    fn options(&self) -> &SuspenderSettings {
        &self.settings
    }

    fn set_whitelist(&mut self, whitelist: String) -> Result<(), SettingsError> {
        let previous = std::mem::replace(&mut self.settings.whitelist, whitelist);
        if let Err(e) = self.save() {
            warn!(error = %e, "failed to persist whitelist, keeping previous value");
            self.settings.whitelist = previous;
            return Err(e);
        }
        Ok(())
    }
}

// SmartMarks Settings Engine
// Loads, saves and edits the JSON settings file at the platform config path.
// Environment variables override file values at read time and are never written back.

use std::env;
use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::platform;
use crate::types::errors::SettingsError;
use crate::types::settings::{AppSettings, BackendKind};

/// Overrides the backend kind (`local` or `hosted`).
pub const ENV_BACKEND: &str = "SMARTMARKS_BACKEND";
/// Overrides `backend.project_url`.
pub const ENV_PROJECT_URL: &str = "SMARTMARKS_PROJECT_URL";
/// Overrides `backend.anon_key`.
pub const ENV_ANON_KEY: &str = "SMARTMARKS_ANON_KEY";

/// Trait defining the settings engine interface.
pub trait SettingsEngineTrait {
    fn load(&mut self) -> Result<AppSettings, SettingsError>;
    fn save(&self) -> Result<(), SettingsError>;
    /// File settings with environment overrides applied.
    fn get_settings(&self) -> AppSettings;
    fn set_value(&mut self, key: &str, value: Value) -> Result<(), SettingsError>;
    fn reset(&mut self) -> Result<(), SettingsError>;
    fn get_config_path(&self) -> &str;
}

/// Settings engine that persists settings as JSON on disk.
pub struct SettingsEngine {
    config_path: String,
    settings: AppSettings,
}

impl SettingsEngine {
    /// Creates a new SettingsEngine.
    ///
    /// If `path_override` is `Some`, uses that path for the config file.
    /// Otherwise, uses the platform-specific config directory with `settings.json`.
    pub fn new(path_override: Option<String>) -> Self {
        let config_path = path_override.unwrap_or_else(|| {
            platform::get_config_dir()
                .join("settings.json")
                .to_string_lossy()
                .to_string()
        });

        Self {
            config_path,
            settings: AppSettings::default(),
        }
    }

    fn apply_env_overrides(settings: &mut AppSettings) {
        if let Ok(kind) = env::var(ENV_BACKEND) {
            match kind.to_ascii_lowercase().as_str() {
                "local" => settings.backend.kind = BackendKind::Local,
                "hosted" => settings.backend.kind = BackendKind::Hosted,
                other => tracing::warn!(value = other, "ignoring unknown {}", ENV_BACKEND),
            }
        }
        if let Ok(url) = env::var(ENV_PROJECT_URL) {
            settings.backend.project_url = url;
        }
        if let Ok(key) = env::var(ENV_ANON_KEY) {
            settings.backend.anon_key = key;
        }
    }
}

impl SettingsEngineTrait for SettingsEngine {
    /// Loads settings from the JSON config file. A missing file yields the
    /// defaults; missing sections or fields fall back to their defaults.
    fn load(&mut self) -> Result<AppSettings, SettingsError> {
        let path = Path::new(&self.config_path);

        self.settings = if path.exists() {
            let content = fs::read_to_string(path)
                .map_err(|e| SettingsError::IoError(format!("Failed to read config file: {}", e)))?;
            serde_json::from_str(&content).map_err(|e| {
                SettingsError::SerializationError(format!("Failed to parse config file: {}", e))
            })?
        } else {
            tracing::debug!(path = %self.config_path, "no config file, using defaults");
            AppSettings::default()
        };

        Ok(self.get_settings())
    }

    fn save(&self) -> Result<(), SettingsError> {
        let path = Path::new(&self.config_path);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SettingsError::IoError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let json = serde_json::to_string_pretty(&self.settings).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to serialize settings: {}", e))
        })?;

        fs::write(path, json)
            .map_err(|e| SettingsError::IoError(format!("Failed to write config file: {}", e)))?;

        tracing::info!(path = %self.config_path, "settings saved");
        Ok(())
    }

    fn get_settings(&self) -> AppSettings {
        let mut effective = self.settings.clone();
        Self::apply_env_overrides(&mut effective);
        effective
    }

    /// Updates one setting by dot-separated path (e.g. `sync.ordering`) and
    /// saves. The key must already exist and the value must fit its type.
    fn set_value(&mut self, key: &str, value: Value) -> Result<(), SettingsError> {
        if key.is_empty() || key.split('.').any(str::is_empty) {
            return Err(SettingsError::InvalidKey(format!("'{}'", key)));
        }

        let mut json_value = serde_json::to_value(&self.settings).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to serialize settings: {}", e))
        })?;

        let pointer = format!("/{}", key.replace('.', "/"));
        match json_value.pointer_mut(&pointer) {
            Some(slot) => *slot = value,
            None => {
                return Err(SettingsError::InvalidKey(format!(
                    "Key '{}' not found in settings",
                    key
                )))
            }
        }

        self.settings = serde_json::from_value(json_value).map_err(|e| {
            SettingsError::InvalidValue(format!("Invalid value for key '{}': {}", key, e))
        })?;

        self.save()
    }

    fn reset(&mut self) -> Result<(), SettingsError> {
        self.settings = AppSettings::default();
        self.save()
    }

    fn get_config_path(&self) -> &str {
        &self.config_path
    }
}

/// Reads a command-line value as JSON when it parses (`true`, `5`,
/// `"text"`), otherwise as a plain string.
pub fn parse_cli_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

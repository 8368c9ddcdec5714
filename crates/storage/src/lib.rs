use directories::ProjectDirs;
use doc_model::HighlightSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const SETTINGS_SCHEMA_VERSION: u32 = 1;

/// Overrides the settings directory, mainly for scripted runs and tests.
pub const CONFIG_DIR_ENV: &str = "QUOTEMARK_CONFIG_DIR";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local config directory")]
    NoConfigDirectory,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("settings schema version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
}

#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SettingsEnvelope {
    version: u32,
    settings: HighlightSettings,
}

impl Storage {
    pub fn from_default_project() -> Result<Self, StorageError> {
        if let Some(root) = std::env::var_os(CONFIG_DIR_ENV) {
            return Ok(Self::with_root(PathBuf::from(root)));
        }

        let dirs = ProjectDirs::from("dev", "Quotemark", "Quotemark")
            .ok_or(StorageError::NoConfigDirectory)?;

        Ok(Self { root: dirs.config_dir().to_path_buf() })
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn settings_path(&self) -> PathBuf {
        self.root.join("settings.json")
    }

    pub fn load_settings(&self) -> Result<HighlightSettings, StorageError> {
        let path = self.settings_path();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(HighlightSettings::default());
        }

        load_settings_file(&path)
    }

    pub fn save_settings(&self, settings: &HighlightSettings) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;

        let envelope =
            SettingsEnvelope { version: SETTINGS_SCHEMA_VERSION, settings: settings.clone() };

        let bytes = serde_json::to_vec_pretty(&envelope)?;
        fs::write(self.settings_path(), bytes)?;
        Ok(())
    }
}

/// Read settings from an explicit file.
///
/// Accepts either the versioned envelope written by [`Storage::save_settings`]
/// or a bare settings object.
pub fn load_settings_file(path: &Path) -> Result<HighlightSettings, StorageError> {
    let bytes = fs::read(path)?;
    let value: serde_json::Value = serde_json::from_slice(&bytes)?;

    let is_envelope = value.get("version").is_some() && value.get("settings").is_some();
    if !is_envelope {
        return Ok(serde_json::from_value(value)?);
    }

    let envelope: SettingsEnvelope = serde_json::from_value(value)?;
    if envelope.version > SETTINGS_SCHEMA_VERSION {
        return Err(StorageError::UnsupportedVersion {
            found: envelope.version,
            supported: SETTINGS_SCHEMA_VERSION,
        });
    }

    Ok(envelope.settings)
}

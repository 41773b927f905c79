//! Reading and writing the settings file.

use super::AppSettings;
use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const CONFIG_DIR: &str = ".config/opendash";
const SETTINGS_FILE: &str = "settings.toml";

/// Location of the settings file plus async load/save
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$HOME/.config/opendash/settings.toml`
    pub fn default_location() -> Self {
        let mut path = get_home_dir();
        path.push(CONFIG_DIR);
        path.push(SETTINGS_FILE);
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory layouts are suggested in when no path was used before
    pub fn layout_dir(&self) -> PathBuf {
        self.path
            .parent()
            .map(|dir| dir.join("layouts"))
            .unwrap_or_else(|| PathBuf::from("layouts"))
    }

    /// Reads the settings file; `None` if it does not exist yet
    pub async fn try_load(&self) -> Result<Option<AppSettings>> {
        if !tokio::fs::try_exists(&self.path)
            .await
            .map_err(|e| eyre!("Failed to check if settings file exists: {}", e))?
        {
            return Ok(None);
        }

        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| eyre!("Failed to read settings file: {}", e))?;
        let settings =
            toml::from_str(&content).map_err(|e| eyre!("Failed to parse settings file: {}", e))?;
        Ok(Some(settings))
    }

    /// Loads the settings, falling back to defaults on any problem
    pub async fn load(&self) -> AppSettings {
        match self.try_load().await {
            Ok(Some(settings)) => {
                info!("Loaded settings from {}", self.path.display());
                settings
            }
            Ok(None) => {
                info!("No settings file at {}, using defaults", self.path.display());
                AppSettings::default()
            }
            Err(e) => {
                warn!("{}, using defaults", e);
                AppSettings::default()
            }
        }
    }

    pub async fn save(&self, settings: &AppSettings) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| eyre!("Failed to create settings directory: {}", e))?;
        }

        let content = toml::to_string_pretty(settings)
            .map_err(|e| eyre!("Failed to serialize settings: {}", e))?;
        tokio::fs::write(&self.path, content)
            .await
            .map_err(|e| eyre!("Failed to write settings file: {}", e))?;

        debug!("Settings written to {}", self.path.display());
        Ok(())
    }
}

fn get_home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| {
        warn!("Could not determine home directory, using current directory");
        PathBuf::from(".")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.toml"));
        assert!(store.try_load().await.unwrap().is_none());
        assert_eq!(store.load().await, AppSettings::default());
    }

    #[tokio::test]
    async fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("deep").join("settings.toml"));

        let mut settings = AppSettings::default();
        settings.auto_connect = true;
        settings.broker.host = "10.0.0.5".to_string();
        settings.broker.use_tls = true;
        settings.remember_layout(Path::new("/home/user/layouts/kitchen.json"));

        store.save(&settings).await.unwrap();
        assert_eq!(store.load().await, settings);
    }

    #[tokio::test]
    async fn corrupt_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        tokio::fs::write(&path, "auto_connect = [not toml").await.unwrap();

        let store = SettingsStore::new(&path);
        assert!(store.try_load().await.is_err());
        assert_eq!(store.load().await, AppSettings::default());
    }

    #[test]
    fn default_location_ends_in_settings_file() {
        let store = SettingsStore::default_location();
        assert!(store.path().ends_with(".config/opendash/settings.toml"));
        assert!(store.layout_dir().ends_with("opendash/layouts"));
    }
}

//! # Persistence Module
//!
//! ## Why This Module Exists
//! Keeps the application settings (broker connection, auto-connect, the
//! layout to open at startup, window and presentation preferences) between
//! runs. Layout files themselves are handled by the dashboard module; this
//! module only remembers where they are.
//!
//! ## Key Abstractions
//! - **AppSettings**: one strongly typed struct, serialized as TOML
//! - **SettingsStore**: reads and writes the settings file with `tokio::fs`
//! - **PersistenceManager**: background task that performs saves requested
//!   by the UI thread without blocking a frame
//!
//! ## Error Handling Strategy
//! Uses `color_eyre` for rich error context in file operations. Loading is
//! fail-safe: a missing or corrupted file degrades to defaults instead of
//! preventing startup.

pub mod persistence_worker;
pub mod settings_store;

pub use persistence_worker::{PersistenceManager, SettingsClient};
pub use settings_store::SettingsStore;

use crate::mqtt::BrokerSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Window size restored at startup
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct WindowSettings {
    pub width: f32,
    pub height: f32,
    pub fullscreen: bool,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 800.0,
            fullscreen: false,
        }
    }
}

impl WindowSettings {
    /// Smallest window size worth restoring
    pub const MIN_SIZE: [f32; 2] = [480.0, 320.0];

    /// Takes over what the viewport currently reports.
    ///
    /// The size is kept from the last windowed frame while fullscreen, so
    /// leaving fullscreen next run restores a normal window. Returns true
    /// when anything changed.
    pub fn track_viewport(&mut self, inner_size: Option<[f32; 2]>, fullscreen: Option<bool>) -> bool {
        let mut changed = false;
        if let Some(fullscreen) = fullscreen {
            changed |= self.fullscreen != fullscreen;
            self.fullscreen = fullscreen;
        }
        if self.fullscreen {
            return changed;
        }
        if let Some([width, height]) = inner_size {
            let usable = width.is_finite()
                && height.is_finite()
                && width >= Self::MIN_SIZE[0]
                && height >= Self::MIN_SIZE[1];
            if usable && (width, height) != (self.width, self.height) {
                self.width = width;
                self.height = height;
                changed = true;
            }
        }
        changed
    }
}

/// Everything the application remembers between runs.
///
/// Every field has a default, so settings files written by older versions
/// (or edited by hand) load without errors.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct AppSettings {
    /// Connect to the broker right after startup
    pub auto_connect: bool,
    /// Layout loaded at startup, takes precedence over `last_layout`
    pub startup_layout: Option<PathBuf>,
    /// Most recently loaded or saved layout file
    pub last_layout: Option<PathBuf>,
    /// "light" or "dark"
    pub theme: String,
    /// Widget opacity in presentation mode
    pub presentation_opacity: f32,
    pub window: WindowSettings,
    pub broker: BrokerSettings,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            auto_connect: false,
            startup_layout: None,
            last_layout: None,
            theme: "light".to_string(),
            presentation_opacity: 1.0,
            window: WindowSettings::default(),
            broker: BrokerSettings::default(),
        }
    }
}

impl AppSettings {
    /// Presentation opacity limited to 0.1..=1.0
    pub fn presentation_opacity(&self) -> f32 {
        if self.presentation_opacity.is_finite() {
            self.presentation_opacity.clamp(0.1, 1.0)
        } else {
            1.0
        }
    }

    pub fn is_dark(&self) -> bool {
        self.theme.eq_ignore_ascii_case("dark")
    }

    pub fn remember_layout(&mut self, path: &Path) {
        self.last_layout = Some(path.to_path_buf());
    }

    /// Layout to open at startup, if any
    pub fn initial_layout(&self) -> Option<&Path> {
        self.startup_layout
            .as_deref()
            .or(self.last_layout.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_size_follows_viewport() {
        let mut window = WindowSettings::default();
        assert!(window.track_viewport(Some([1024.0, 700.0]), Some(false)));
        assert_eq!((window.width, window.height, window.fullscreen), (1024.0, 700.0, false));
        assert!(!window.track_viewport(Some([1024.0, 700.0]), Some(false)));
    }

    #[test]
    fn fullscreen_keeps_last_windowed_size() {
        let mut window = WindowSettings::default();
        window.track_viewport(Some([900.0, 600.0]), Some(false));
        assert!(window.track_viewport(Some([2560.0, 1440.0]), Some(true)));
        assert!(window.fullscreen);
        assert_eq!((window.width, window.height), (900.0, 600.0));
    }

    #[test]
    fn unusable_viewport_sizes_are_ignored() {
        let mut window = WindowSettings::default();
        assert!(!window.track_viewport(Some([0.0, 0.0]), None));
        assert!(!window.track_viewport(Some([f32::NAN, 700.0]), None));
        assert!(!window.track_viewport(None, None));
        assert_eq!(window, WindowSettings::default());
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let settings: AppSettings = toml::from_str(
            r#"
            auto_connect = true

            [broker]
            host = "broker.local"
            "#,
        )
        .unwrap();

        assert!(settings.auto_connect);
        assert_eq!(settings.broker.host, "broker.local");
        assert_eq!(settings.broker.port, 1883);
        assert_eq!(settings.theme, "light");
        assert_eq!(settings.window, WindowSettings::default());
    }

    #[test]
    fn opacity_is_clamped() {
        let mut settings = AppSettings::default();
        settings.presentation_opacity = 0.01;
        assert_eq!(settings.presentation_opacity(), 0.1);
        settings.presentation_opacity = 3.0;
        assert_eq!(settings.presentation_opacity(), 1.0);
        settings.presentation_opacity = f32::NAN;
        assert_eq!(settings.presentation_opacity(), 1.0);
    }

    #[test]
    fn startup_layout_wins_over_last_layout() {
        let mut settings = AppSettings::default();
        assert_eq!(settings.initial_layout(), None);
        settings.remember_layout(Path::new("/tmp/last.json"));
        assert_eq!(settings.initial_layout(), Some(Path::new("/tmp/last.json")));
        settings.startup_layout = Some(PathBuf::from("/tmp/start.json"));
        assert_eq!(settings.initial_layout(), Some(Path::new("/tmp/start.json")));
    }
}

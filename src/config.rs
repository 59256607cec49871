//! Configuration management for subplay
//!
//! Handles config file loading/saving and the settings store the subtitle
//! manager listens to. Config is stored at ~/.config/subplay/config.toml

use crate::models::SubtitlePreference;
use crate::stream::{PlayerType, SubtitleClient};
use anyhow::Result;
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use tokio::sync::broadcast;

pub const DEFAULT_LANGUAGE_PROPERTY: &str = "default_language";
pub const FONT_FAMILY_PROPERTY: &str = "font_family";
pub const FONT_SIZE_PROPERTY: &str = "font_size";
pub const DECORATION_PROPERTY: &str = "decoration";
pub const BOLD_PROPERTY: &str = "bold";
pub const DIRECTORY_PROPERTY: &str = "directory";
pub const AUTO_CLEANING_PROPERTY: &str = "auto_cleaning_enabled";

/// Font used to render overlay subtitles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontFamily {
    #[default]
    Arial,
    ComicSans,
    Georgia,
    Tahoma,
    TrebuchetMs,
    Verdana,
}

/// Decoration drawn around overlay subtitles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecorationType {
    None,
    #[default]
    Outline,
    OpaqueBackground,
    SeeThroughBackground,
}

/// Subtitle settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubtitleSettings {
    /// Directory downloaded subtitles are stored in
    pub directory: PathBuf,
    /// Remove the directory when the application exits
    pub auto_cleaning_enabled: bool,
    /// Preferred subtitle language, `None` disables subtitles
    pub default_language: Option<String>,
    pub font_family: FontFamily,
    pub font_size: u32,
    pub decoration: DecorationType,
    pub bold: bool,
}

impl Default for SubtitleSettings {
    fn default() -> Self {
        Self {
            directory: SubtitleClient::default_cache_dir(),
            auto_cleaning_enabled: true,
            default_language: None,
            font_family: FontFamily::default(),
            font_size: 28,
            decoration: DecorationType::default(),
            bold: false,
        }
    }
}

impl SubtitleSettings {
    /// Names of the properties that differ from `other`
    fn changed_properties(&self, other: &Self) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.default_language != other.default_language {
            changed.push(DEFAULT_LANGUAGE_PROPERTY);
        }
        if self.font_family != other.font_family {
            changed.push(FONT_FAMILY_PROPERTY);
        }
        if self.font_size != other.font_size {
            changed.push(FONT_SIZE_PROPERTY);
        }
        if self.decoration != other.decoration {
            changed.push(DECORATION_PROPERTY);
        }
        if self.bold != other.bold {
            changed.push(BOLD_PROPERTY);
        }
        if self.directory != other.directory {
            changed.push(DIRECTORY_PROPERTY);
        }
        if self.auto_cleaning_enabled != other.auto_cleaning_enabled {
            changed.push(AUTO_CLEANING_PROPERTY);
        }
        changed
    }
}

impl From<&SubtitleSettings> for SubtitlePreference {
    fn from(settings: &SubtitleSettings) -> Self {
        match &settings.default_language {
            Some(language) => SubtitlePreference::Language(language.clone()),
            None => SubtitlePreference::Disabled,
        }
    }
}

/// Player settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSettings {
    /// Preferred local player (vlc, mpv)
    pub preferred: Option<String>,
}

impl PlayerSettings {
    pub fn player_type(&self) -> PlayerType {
        self.preferred
            .as_deref()
            .and_then(PlayerType::from_name)
            .unwrap_or_default()
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub subtitles: SubtitleSettings,
    pub player: PlayerSettings,
}

impl Config {
    /// Get config file path (~/.config/subplay/config.toml)
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("subplay").join("config.toml"))
    }

    /// Load config from the default path, or return default if not found
    pub fn load() -> Self {
        Self::path().map(|p| Self::load_from(&p)).unwrap_or_default()
    }

    /// Load config from `path`, or return default if missing or invalid
    pub fn load_from(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| toml::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Save config to the default path
    pub fn save(&self) -> Result<()> {
        let path = Self::path().ok_or_else(|| anyhow::anyhow!("Could not determine config path"))?;
        self.save_to(&path)
    }

    /// Save config to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let toml = toml::to_string_pretty(self)?;
        std::fs::write(path, toml)?;
        Ok(())
    }
}

/// Notification of a changed subtitle setting
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsEvent {
    /// Name of the changed property, e.g. [`FONT_SIZE_PROPERTY`]
    pub property: &'static str,
    /// Subtitle settings after the change
    pub settings: SubtitleSettings,
}

/// Shared settings with change notifications
pub struct SettingsStore {
    config: RwLock<Config>,
    path: Option<PathBuf>,
    sender: broadcast::Sender<SettingsEvent>,
}

impl SettingsStore {
    /// Create an in-memory store
    pub fn new(config: Config) -> Self {
        let (sender, _) = broadcast::channel(32);
        Self {
            config: RwLock::new(config),
            path: None,
            sender,
        }
    }

    /// Create a store persisting every update to `path`
    pub fn with_path(config: Config, path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::new(config)
        }
    }

    pub fn config(&self) -> Config {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn subtitle_settings(&self) -> SubtitleSettings {
        self.config().subtitles
    }

    /// Subtitle preference derived from the persisted settings
    pub fn preference(&self) -> SubtitlePreference {
        SubtitlePreference::from(&self.subtitle_settings())
    }

    /// Replace the subtitle settings, notifying every changed property
    pub fn update_subtitle_settings(&self, settings: SubtitleSettings) -> Result<()> {
        let changed = {
            let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
            let changed = settings.changed_properties(&config.subtitles);
            if changed.is_empty() {
                return Ok(());
            }
            // persist first so a failed save leaves the store untouched
            if let Some(path) = &self.path {
                let mut updated = config.clone();
                updated.subtitles = settings.clone();
                updated.save_to(path)?;
            }
            config.subtitles = settings.clone();
            changed
        };

        for property in changed {
            debug!("Subtitle setting {} has been changed", property);
            let _ = self.sender.send(SettingsEvent {
                property,
                settings: settings.clone(),
            });
        }
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SettingsEvent> {
        self.sender.subscribe()
    }
}

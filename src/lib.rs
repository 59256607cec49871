//! subplay - Subtitles synchronized with local playback
//!
//! Keeps the subtitle of a local VLC/mpv playback in sync with what the user
//! plays: preferred language selection, cancellable downloads, custom
//! subtitle files and native or overlay rendering.
//!
//! # Modules
//!
//! - `models` - Subtitle, media and play request data structures
//! - `config` - Persisted settings with change notifications
//! - `events` - Playback event bus
//! - `stream` - Subtitle provider, SRT parsing and local players
//! - `sync` - Subtitle manager, preference resolution and rendering
//! - `cli` / `commands` - Command line interface

pub mod cli;
pub mod commands;
pub mod config;
pub mod events;
pub mod models;
pub mod stream;
pub mod sync;

// Re-export commonly used types
pub use models::{
    MediaContext, PlayRequest, SubFormat, Subtitle, SubtitleCue, SubtitleFile, SubtitleInfo,
    SubtitleLine, SubtitleMatcher, SubtitlePreference,
};

pub use config::{Config, SettingsEvent, SettingsStore, SubtitleSettings};
pub use events::{EventBus, PlayerEvent};
pub use stream::{LocalPlayer, Player, PlayerError, SubtitleClient, SubtitleError, SubtitleProvider};
pub use sync::{
    SessionSnapshot, SubtitleEvent, SubtitleListener, SubtitleManager, SubtitlePicker,
};

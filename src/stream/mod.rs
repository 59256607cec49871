//! Playback collaborators
//!
//! - Subtitles: subtitle provider (Stremio OpenSubtitles addon) and download cache
//! - Srt: SubRip parsing into cues
//! - Player: local VLC/mpv players

pub mod player;
pub mod srt;
pub mod subtitles;

pub use player::{LocalPlayer, Player, PlayerError, PlayerType};
pub use subtitles::{SubtitleClient, SubtitleError, SubtitleProvider};

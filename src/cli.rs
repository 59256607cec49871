//! CLI - Command Line Interface for subplay
//!
//! Every command is scriptable. All output is JSON-parseable.
//!
//! # Examples
//!
//! ```bash
//! # Play a stream with English subtitles
//! subplay play https://example.com/Movie.2019.1080p.mkv --imdb tt1877830 --lang eng
//!
//! # List subtitles of an episode
//! subplay subtitles tt0903747 -s 1 -e 3 --json
//!
//! # Persist the preferred subtitle language
//! subplay config set-language eng
//! ```

use crate::models::MediaContext;
use crate::stream::PlayerType;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::io::IsTerminal;
use std::path::PathBuf;

// =============================================================================
// Exit Codes
// =============================================================================

/// Exit codes for CLI operations (semantic for scripting)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// General error
    Error = 1,
    /// Invalid arguments
    InvalidArgs = 2,
    /// Network error
    NetworkError = 3,
    /// Player not installed
    PlayerNotFound = 4,
    /// No subtitles available
    NoSubtitles = 5,
    /// Playback failed
    PlaybackFailed = 6,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> std::process::ExitCode {
        std::process::ExitCode::from(code as u8)
    }
}

// =============================================================================
// Main CLI Structure
// =============================================================================

/// subplay - subtitles synchronized with local playback
#[derive(Parser, Debug)]
#[command(
    name = "subplay",
    version,
    author = "Gorka & Hermes",
    about = "Subtitles synchronized with local VLC/mpv playback",
    long_about = "Plays a stream in VLC or mpv and keeps the subtitle in sync \
                  with the playback: preferred language selection, download, \
                  custom subtitle files and offsets.",
    after_help = "EXAMPLES:\n\
                  subplay play movie.mkv --custom              Pick a subtitle file\n\
                  subplay play URL --imdb tt1877830 -l eng     Play with English subtitles\n\
                  subplay subtitles tt1877830 --json           List subtitles\n\
                  subplay config set-language eng              Persist the language"
)]
pub struct Cli {
    /// Output format as JSON (default for non-TTY)
    #[arg(long, short = 'j', global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Log debug output (RUST_LOG takes precedence)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Check if JSON output should be used
    pub fn should_json(&self) -> bool {
        self.json || !std::io::stdout().is_terminal()
    }

    /// Default log filter when RUST_LOG isn't set
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "subplay=debug"
        } else {
            "subplay=info"
        }
    }
}

// =============================================================================
// Subcommands
// =============================================================================

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Play a stream locally with synchronized subtitles
    #[command(visible_alias = "p")]
    Play(PlayCmd),

    /// List available subtitles
    #[command(visible_alias = "sub")]
    Subtitles(SubtitlesCmd),

    /// Show or change the subtitle settings
    #[command(visible_alias = "cfg")]
    Config(ConfigCmd),
}

// =============================================================================
// Play Command
// =============================================================================

/// Play a stream in VLC or mpv
#[derive(Args, Debug)]
pub struct PlayCmd {
    /// Stream URL or local file
    #[arg(required = true)]
    pub url: String,

    /// Quality of the stream (e.g., 1080p)
    #[arg(long, short = 'Q')]
    pub quality: Option<String>,

    /// IMDB ID used to look up subtitles (e.g., tt1877830)
    #[arg(long, short = 'i')]
    pub imdb: Option<String>,

    /// Season number (for TV shows)
    #[arg(long, short = 's', requires = "imdb")]
    pub season: Option<u16>,

    /// Episode number (for TV shows)
    #[arg(long, short = 'e', requires = "season")]
    pub episode: Option<u16>,

    /// Subtitle language code (e.g., eng), overrides the configured language
    #[arg(long, short = 'l', conflicts_with_all = ["no_subtitles", "custom"])]
    pub lang: Option<String>,

    /// Play without subtitles
    #[arg(long, conflicts_with = "custom")]
    pub no_subtitles: bool,

    /// Pick a custom subtitle file
    #[arg(long)]
    pub custom: bool,

    /// Local player, overrides the configured player
    #[arg(long, short = 'p', value_enum)]
    pub player: Option<PlayerChoice>,

    /// Subtitle offset in milliseconds
    #[arg(long, short = 'o', default_value = "0", allow_hyphen_values = true)]
    pub offset: i64,
}

impl PlayCmd {
    /// Media to look up subtitles for, if an IMDB ID was given
    pub fn media(&self) -> Option<MediaContext> {
        let imdb_id = self.imdb.clone()?;
        Some(media_context(imdb_id, self.season, self.episode))
    }
}

/// Local player selection
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerChoice {
    /// VLC media player
    Vlc,
    /// mpv media player
    Mpv,
}

impl From<PlayerChoice> for PlayerType {
    fn from(choice: PlayerChoice) -> Self {
        match choice {
            PlayerChoice::Vlc => PlayerType::Vlc,
            PlayerChoice::Mpv => PlayerType::Mpv,
        }
    }
}

// =============================================================================
// Subtitles Command
// =============================================================================

/// List the subtitles available for a movie or episode
#[derive(Args, Debug)]
pub struct SubtitlesCmd {
    /// IMDB ID (e.g., tt1877830)
    #[arg(required = true)]
    pub imdb_id: String,

    /// Season number (for TV shows)
    #[arg(long, short = 's')]
    pub season: Option<u16>,

    /// Episode number (for TV shows)
    #[arg(long, short = 'e', requires = "season")]
    pub episode: Option<u16>,

    /// Language codes, comma-separated (default: all)
    #[arg(long, short = 'l')]
    pub lang: Option<String>,
}

impl SubtitlesCmd {
    pub fn media(&self) -> MediaContext {
        media_context(self.imdb_id.clone(), self.season, self.episode)
    }

    /// Parse language codes into a vector, empty for all languages
    pub fn languages(&self) -> Vec<&str> {
        self.lang
            .as_deref()
            .map(|lang| lang.split(',').map(|s| s.trim()).collect())
            .unwrap_or_default()
    }
}

fn media_context(imdb_id: String, season: Option<u16>, episode: Option<u16>) -> MediaContext {
    match season {
        Some(season) => MediaContext::Episode {
            imdb_id,
            season,
            episode: episode.unwrap_or(1),
        },
        None => MediaContext::Movie { imdb_id },
    }
}

// =============================================================================
// Config Command
// =============================================================================

/// Show or change the subtitle settings
#[derive(Args, Debug)]
pub struct ConfigCmd {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigAction {
    /// Print the current configuration
    Show,
    /// Set the preferred subtitle language
    SetLanguage {
        /// Language code (e.g., eng)
        code: String,
    },
    /// Disable subtitles by default
    Disable,
    /// Set the subtitle font size
    SetSize {
        size: u32,
    },
}

// =============================================================================
// JSON Output Types
// =============================================================================

/// Generic JSON output wrapper with status
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonOutput<T: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "is_zero")]
    pub exit_code: i32,
}

fn is_zero(n: &i32) -> bool {
    *n == 0
}

impl<T: Serialize> JsonOutput<T> {
    /// Create success output with data
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
            exit_code: 0,
        }
    }

    /// Create error output (no data)
    pub fn error_msg(msg: impl Into<String>, code: ExitCode) -> JsonOutput<()> {
        JsonOutput::<()> {
            data: None,
            error: Some(msg.into()),
            exit_code: code.into(),
        }
    }
}

/// Playback summary printed when the player exits
#[derive(Debug, Serialize, Deserialize)]
pub struct PlaybackSummary {
    pub status: &'static str,
    pub player: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle_file: Option<PathBuf>,
    pub native_rendering: bool,
}

// =============================================================================
// Output Helpers
// =============================================================================

/// Output handler for consistent formatting
pub struct Output {
    pub json: bool,
    pub quiet: bool,
}

impl Output {
    pub fn new(cli: &Cli) -> Self {
        Self {
            json: cli.should_json(),
            quiet: cli.quiet,
        }
    }

    /// Print success data
    pub fn print<T: Serialize>(&self, data: T) -> anyhow::Result<()> {
        if self.json {
            let output = JsonOutput::success(data);
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("{}", serde_json::to_string_pretty(&data)?);
        }
        Ok(())
    }

    /// Print error and return exit code
    pub fn error(&self, msg: impl Into<String>, code: ExitCode) -> ExitCode {
        let msg = msg.into();
        if self.json {
            let output = JsonOutput::<()>::error_msg(&msg, code);
            if let Ok(json) = serde_json::to_string_pretty(&output) {
                eprintln!("{}", json);
            }
        } else if !self.quiet {
            eprintln!("Error: {}", msg);
        }
        code
    }

    /// Print info message (suppressed in quiet mode)
    pub fn info(&self, msg: impl std::fmt::Display) {
        if !self.quiet && !self.json {
            eprintln!("{}", msg);
        }
    }
}

// =============================================================================
// IMDB ID Validation
// =============================================================================

/// Validate IMDB ID format (tt followed by digits)
pub fn validate_imdb_id(id: &str) -> Result<&str, &'static str> {
    if id.starts_with("tt") && id.len() >= 9 && id[2..].chars().all(|c| c.is_ascii_digit()) {
        Ok(id)
    } else {
        Err("Invalid IMDB ID format (expected tt followed by 7+ digits)")
    }
}

// =============================================================================
// Tests
// =============================================================================

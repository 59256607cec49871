//! Local Player - VLC/mpv playback support
//!
//! Opens streams in VLC or mpv and exposes them through the [`Player`] trait
//! used by the subtitle manager. mpv is controlled through its JSON IPC
//! socket, VLC is launched without a control channel.

use async_trait::async_trait;
use log::{debug, trace};
use serde::Deserialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::{Child, Command};

/// Video player controlled by the subtitle manager
#[async_trait]
pub trait Player: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    async fn pause(&self) -> Result<(), PlayerError>;

    async fn resume(&self) -> Result<(), PlayerError>;

    /// Whether the player renders subtitle files itself
    fn supports_native_subtitle_file(&self) -> bool;

    /// Load and show the given subtitle file
    async fn subtitle_file(&self, path: &Path) -> Result<(), PlayerError>;

    /// Remove the subtitle file loaded through [`Player::subtitle_file`]
    async fn clear_subtitle_file(&self) -> Result<(), PlayerError>;

    /// Delay the natively rendered subtitle by `offset_ms`
    async fn subtitle_delay(&self, offset_ms: i64) -> Result<(), PlayerError>;
}

/// Supported local players
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerType {
    /// VLC media player (default)
    #[default]
    Vlc,
    /// mpv media player
    Mpv,
}

impl PlayerType {
    /// Get the command name for this player
    pub fn command(&self) -> &'static str {
        match self {
            PlayerType::Vlc => {
                // On macOS, VLC is an app bundle - check for it
                #[cfg(target_os = "macos")]
                if std::path::Path::new("/Applications/VLC.app").exists() {
                    return "/Applications/VLC.app/Contents/MacOS/VLC";
                }
                "vlc"
            }
            PlayerType::Mpv => "mpv",
        }
    }

    /// Get a display name for this player
    pub fn display_name(&self) -> &'static str {
        match self {
            PlayerType::Vlc => "VLC",
            PlayerType::Mpv => "mpv",
        }
    }

    /// Parse a configured player name
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "vlc" => Some(PlayerType::Vlc),
            "mpv" => Some(PlayerType::Mpv),
            _ => None,
        }
    }
}

impl std::fmt::Display for PlayerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Errors from local player operations
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("Player '{0}' not found. Install it first.")]
    NotFound(String),
    #[error("Failed to start player: {0}")]
    StartFailed(#[from] std::io::Error),
    #[error("Subtitle file not found: {0}")]
    SubtitleNotFound(String),
    #[error("Player control channel failed: {0}")]
    Ipc(String),
    #[error("Player rejected command: {0}")]
    Command(String),
    #[error("{0} is not supported by this player")]
    Unsupported(&'static str),
}

/// Reply line of the mpv JSON IPC protocol
#[derive(Debug, Deserialize)]
struct MpvReply {
    error: Option<String>,
    event: Option<String>,
}

/// Local player for streaming content
pub struct LocalPlayer {
    player_type: PlayerType,
    ipc_path: PathBuf,
}

impl LocalPlayer {
    /// Create a new local player with the specified type
    pub fn new(player_type: PlayerType) -> Self {
        let ipc_path =
            std::env::temp_dir().join(format!("subplay-{}.sock", uuid::Uuid::new_v4()));

        Self {
            player_type,
            ipc_path,
        }
    }

    /// Create a VLC player
    pub fn vlc() -> Self {
        Self::new(PlayerType::Vlc)
    }

    /// Create an mpv player
    pub fn mpv() -> Self {
        Self::new(PlayerType::Mpv)
    }

    /// Get the player type
    pub fn player_type(&self) -> PlayerType {
        self.player_type
    }

    /// Check if the player is available on the system
    pub async fn is_available(&self) -> bool {
        let cmd = self.player_type.command();

        // If it's a full path (macOS app bundle), check if it exists
        if cmd.starts_with('/') {
            return std::path::Path::new(cmd).exists();
        }

        // Otherwise use 'which' to find in PATH
        Command::new("which")
            .arg(cmd)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Arguments passed to the player process
    fn args(&self, stream_url: &str, subtitle_path: Option<&Path>) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![stream_url.into()];

        match self.player_type {
            PlayerType::Vlc => {
                if let Some(sub_path) = subtitle_path {
                    args.push("--sub-file".into());
                    args.push(sub_path.into());
                }
                // Don't show filename overlay
                args.push("--no-video-title-show".into());
            }
            PlayerType::Mpv => {
                if let Some(sub_path) = subtitle_path {
                    args.push(format!("--sub-file={}", sub_path.display()).into());
                }
                args.push(format!("--input-ipc-server={}", self.ipc_path.display()).into());
                args.push("--force-window=immediate".into());
            }
        }

        args
    }

    /// Play a stream URL with an optional initial subtitle file
    ///
    /// # Returns
    /// The spawned child process
    pub async fn play(
        &self,
        stream_url: &str,
        subtitle_path: Option<&Path>,
    ) -> Result<Child, PlayerError> {
        if let Some(sub_path) = subtitle_path {
            if !sub_path.exists() {
                return Err(PlayerError::SubtitleNotFound(
                    sub_path.display().to_string(),
                ));
            }
        }

        debug!("Starting {} for {}", self.player_type, stream_url);
        let mut cmd = Command::new(self.player_type.command());
        cmd.args(self.args(stream_url, subtitle_path));
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());

        cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PlayerError::NotFound(self.player_type.command().to_string())
            } else {
                PlayerError::StartFailed(e)
            }
        })
    }

    /// Wait until the player accepts control commands
    ///
    /// VLC has no control channel and is ready right away.
    pub async fn wait_ready(&self, timeout: std::time::Duration) -> bool {
        if self.player_type != PlayerType::Mpv {
            return true;
        }

        let start = std::time::Instant::now();
        while start.elapsed() < timeout {
            if self.ipc_path.exists() {
                return true;
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }

        false
    }

    /// Send a command to mpv and wait for its reply
    #[cfg(unix)]
    async fn send_command(&self, command: serde_json::Value) -> Result<(), PlayerError> {
        use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
        use tokio::net::UnixStream;

        let stream = UnixStream::connect(&self.ipc_path)
            .await
            .map_err(|e| PlayerError::Ipc(e.to_string()))?;
        let (read, mut write) = stream.into_split();

        let mut payload = serde_json::json!({ "command": command }).to_string();
        payload.push('\n');
        trace!("Sending mpv command {}", payload.trim_end());
        write
            .write_all(payload.as_bytes())
            .await
            .map_err(|e| PlayerError::Ipc(e.to_string()))?;

        let mut lines = BufReader::new(read).lines();
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| PlayerError::Ipc(e.to_string()))?
        {
            let Ok(reply) = serde_json::from_str::<MpvReply>(&line) else {
                continue;
            };
            // mpv interleaves asynchronous events with command replies
            if reply.event.is_some() {
                continue;
            }
            return match reply.error.as_deref() {
                None | Some("success") => Ok(()),
                Some(error) => Err(PlayerError::Command(error.to_string())),
            };
        }

        Err(PlayerError::Ipc("connection closed".to_string()))
    }

    #[cfg(not(unix))]
    async fn send_command(&self, _command: serde_json::Value) -> Result<(), PlayerError> {
        Err(PlayerError::Unsupported("ipc control"))
    }
}

#[async_trait]
impl Player for LocalPlayer {
    fn name(&self) -> &str {
        self.player_type.display_name()
    }

    async fn pause(&self) -> Result<(), PlayerError> {
        match self.player_type {
            PlayerType::Mpv => {
                self.send_command(serde_json::json!(["set_property", "pause", true]))
                    .await
            }
            PlayerType::Vlc => {
                trace!("VLC has no control channel, ignoring pause");
                Ok(())
            }
        }
    }

    async fn resume(&self) -> Result<(), PlayerError> {
        match self.player_type {
            PlayerType::Mpv => {
                self.send_command(serde_json::json!(["set_property", "pause", false]))
                    .await
            }
            PlayerType::Vlc => {
                trace!("VLC has no control channel, ignoring resume");
                Ok(())
            }
        }
    }

    fn supports_native_subtitle_file(&self) -> bool {
        self.player_type == PlayerType::Mpv
    }

    async fn subtitle_file(&self, path: &Path) -> Result<(), PlayerError> {
        match self.player_type {
            PlayerType::Mpv => {
                let path = path.to_string_lossy();
                self.send_command(serde_json::json!(["sub-add", path, "select"]))
                    .await
            }
            PlayerType::Vlc => Err(PlayerError::Unsupported("subtitle file")),
        }
    }

    async fn clear_subtitle_file(&self) -> Result<(), PlayerError> {
        match self.player_type {
            PlayerType::Mpv => self.send_command(serde_json::json!(["sub-remove"])).await,
            PlayerType::Vlc => Ok(()),
        }
    }

    async fn subtitle_delay(&self, offset_ms: i64) -> Result<(), PlayerError> {
        match self.player_type {
            PlayerType::Mpv => {
                let seconds = offset_ms as f64 / 1000.0;
                self.send_command(serde_json::json!(["set_property", "sub-delay", seconds]))
                    .await
            }
            PlayerType::Vlc => Err(PlayerError::Unsupported("subtitle delay")),
        }
    }
}

impl Drop for LocalPlayer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.ipc_path);
    }
}

//! Custom subtitle picking
//!
//! The picker is a blocking collaborator (a file dialog, a prompt). The
//! manager runs it on the blocking pool while the playback is paused.

use crate::models::SubtitleInfo;
use crate::stream::Player;
use log::{debug, warn};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

/// Lets the user pick a custom subtitle file
pub trait SubtitlePicker: Send + Sync {
    /// Returns `None` when the user cancelled
    fn pick_custom_subtitle(&self) -> Option<SubtitleInfo>;
}

/// Run the picker without blocking the async runtime
pub(crate) async fn pick(picker: Arc<dyn SubtitlePicker>) -> Option<SubtitleInfo> {
    match tokio::task::spawn_blocking(move || picker.pick_custom_subtitle()).await {
        Ok(picked) => picked,
        Err(e) => {
            warn!("Custom subtitle picker failed, {}", e);
            None
        }
    }
}

/// Pause the player, a missing player is fine
pub(crate) async fn pause_player(player: Option<&Arc<dyn Player>>) {
    if let Some(player) = player {
        debug!("Pausing {} for the subtitle picker", player.name());
        if let Err(e) = player.pause().await {
            warn!("Failed to pause {}, {}", player.name(), e);
        }
    }
}

/// Resume the player, a missing player is fine
pub(crate) async fn resume_player(player: Option<&Arc<dyn Player>>) {
    if let Some(player) = player {
        debug!("Resuming {} after the subtitle picker", player.name());
        if let Err(e) = player.resume().await {
            warn!("Failed to resume {}, {}", player.name(), e);
        }
    }
}

/// Picker asking for a subtitle path on the terminal
pub struct PromptPicker<R, W> {
    input: std::sync::Mutex<(R, W)>,
}

impl PromptPicker<std::io::BufReader<std::io::Stdin>, std::io::Stderr> {
    pub fn stdio() -> Self {
        Self::new(std::io::BufReader::new(std::io::stdin()), std::io::stderr())
    }
}

impl<R: BufRead, W: Write> PromptPicker<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            input: std::sync::Mutex::new((reader, writer)),
        }
    }
}

impl<R, W> SubtitlePicker for PromptPicker<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    fn pick_custom_subtitle(&self) -> Option<SubtitleInfo> {
        let mut guard = self
            .input
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let (reader, writer) = &mut *guard;

        let _ = write!(writer, "Subtitle file (empty to cancel): ");
        let _ = writer.flush();

        let mut line = String::new();
        reader.read_line(&mut line).ok()?;
        let path = PathBuf::from(line.trim());
        if path.as_os_str().is_empty() {
            return None;
        }
        if !path.is_file() {
            let _ = writeln!(writer, "Subtitle file not found: {}", path.display());
            return None;
        }

        Some(SubtitleInfo::custom_file(path))
    }
}

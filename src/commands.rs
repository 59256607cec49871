//! CLI Command Handlers
//!
//! Implements all CLI commands by calling the appropriate backend services.
//! Each handler takes CLI args and Output, returns ExitCode.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

use crate::cli::{
    validate_imdb_id, ConfigAction, ConfigCmd, ExitCode, Output, PlayCmd, PlaybackSummary,
    SubtitlesCmd,
};
use crate::config::{Config, SettingsStore};
use crate::events::{EventBus, PlayerEvent};
use crate::models::{PlayRequest, SubtitleInfo, SubtitlePreference};
use crate::stream::{LocalPlayer, Player, PlayerError, PlayerType, SubtitleClient, SubtitleProvider};
use crate::sync::{PromptPicker, SessionSnapshot, SubtitleEvent, SubtitleManager};

/// How long to wait for the player control channel
const PLAYER_READY_TIMEOUT: Duration = Duration::from_secs(5);

/// Config file in use, the `--config` flag wins over the default location
fn config_path(path: Option<&Path>) -> Option<PathBuf> {
    path.map(Path::to_path_buf).or_else(Config::path)
}

fn open_settings(path: Option<&Path>) -> SettingsStore {
    match config_path(path) {
        Some(path) => SettingsStore::with_path(Config::load_from(&path), path),
        None => SettingsStore::new(Config::default()),
    }
}

// =============================================================================
// Play Command
// =============================================================================

pub async fn play_cmd(cmd: PlayCmd, config: Option<&Path>, output: &Output) -> ExitCode {
    if let Some(imdb_id) = cmd.imdb.as_deref() {
        if let Err(e) = validate_imdb_id(imdb_id) {
            return output.error(e, ExitCode::InvalidArgs);
        }
    }

    let store = open_settings(config);
    let settings = store.subtitle_settings();
    let player_type = cmd
        .player
        .map(PlayerType::from)
        .unwrap_or_else(|| store.config().player.player_type());

    let player = Arc::new(LocalPlayer::new(player_type));
    if !player.is_available().await {
        return output.error(
            format!("{} not found. Install it first.", player_type.display_name()),
            ExitCode::PlayerNotFound,
        );
    }

    let client = Arc::new(SubtitleClient::new(settings.directory.clone()));
    let available = match cmd.media() {
        Some(media) => {
            output.info(format!("Looking up subtitles for {}...", media.imdb_id()));
            match client.list_available(&media).await {
                Ok(available) => available,
                Err(e) => {
                    warn!("Failed to retrieve available subtitles, {}", e);
                    output.info("Subtitles unavailable, playing without them");
                    Vec::new()
                }
            }
        }
        None => Vec::new(),
    };

    // an explicit language enables subtitles for this playback only
    let preference = match &cmd.lang {
        Some(language) => SubtitlePreference::Language(language.clone()),
        None => store.preference(),
    };

    let mut request = PlayRequest::new(&cmd.url).with_available_subtitles(available);
    if let Some(quality) = &cmd.quality {
        request = request.with_quality(quality);
    }
    if cmd.no_subtitles {
        request = request.without_subtitles();
    }
    if cmd.custom {
        request = request.with_subtitle(SubtitleInfo::custom());
    }

    let bus = EventBus::new();
    let mut notifications = bus.subscribe();
    let manager = SubtitleManager::new(
        client.clone(),
        Arc::new(PromptPicker::stdio()),
        bus,
        preference.clone(),
    );
    let settings_task = manager.follow_settings(&store);
    manager.add_listener(Arc::new(log_subtitle_event));
    manager.update_subtitle_size(settings.font_size);

    output.info(format!("Opening in {}...", player_type.display_name()));
    let mut child = match player.play(&cmd.url, None).await {
        Ok(child) => child,
        Err(PlayerError::NotFound(name)) => {
            return output.error(
                format!("Player '{}' not found. Install it first.", name),
                ExitCode::PlayerNotFound,
            )
        }
        Err(e) => {
            return output.error(format!("Failed to start player: {}", e), ExitCode::PlaybackFailed)
        }
    };

    if !player.wait_ready(PLAYER_READY_TIMEOUT).await {
        warn!("{} control channel isn't ready, subtitles fall back to the overlay", player_type);
    }
    manager.set_player(Some(player.clone() as Arc<dyn Player>));
    manager.on_playback_started(request);
    // a custom pick is a user choice and isn't subject to the preference
    if cmd.custom && preference == SubtitlePreference::Disabled {
        manager.on_selection_changed(SubtitleInfo::custom());
    }
    if cmd.offset != 0 {
        manager.update_subtitle_offset(cmd.offset);
    }

    let mut listening = true;
    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            event = notifications.recv(), if listening => match event {
                Ok(PlayerEvent::ErrorNotification(message)) => output.info(message),
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => listening = false,
            },
        }
    };

    let snapshot = finish_playback(&manager).await;
    settings_task.abort();

    if settings.auto_cleaning_enabled {
        if let Err(e) = client.cleanup().await {
            warn!("Failed to clean the subtitle directory, {}", e);
        }
    }

    if let Err(e) = status {
        return output.error(format!("Player failed: {}", e), ExitCode::PlaybackFailed);
    }

    let summary = PlaybackSummary {
        status: "stopped",
        player: player_type.display_name().to_string(),
        url: cmd.url,
        subtitle: snapshot
            .as_ref()
            .and_then(|s| s.subtitle.as_ref())
            .filter(|s| !s.is_none())
            .map(ToString::to_string),
        subtitle_file: snapshot.as_ref().and_then(|s| s.active_subtitle.clone()),
        native_rendering: snapshot.map(|s| s.native_rendering).unwrap_or(false),
    };
    if let Err(e) = output.print(&summary) {
        return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
    }
    ExitCode::Success
}

/// Stop the session, returning the state it ended with
///
/// Only returns once the manager handled the stop, so no download of the
/// session is left running when the cache gets cleaned.
async fn finish_playback(manager: &SubtitleManager) -> Option<SessionSnapshot> {
    let snapshot = manager.snapshot().await;
    manager.on_playback_stopped();
    manager.set_player(None);
    manager.snapshot().await;
    snapshot
}

fn log_subtitle_event(event: &SubtitleEvent) {
    match event {
        SubtitleEvent::Downloading(subtitle) => info!("Loading subtitle {}", subtitle),
        SubtitleEvent::Activated(subtitle) => {
            info!("Showing subtitle {} ({} cues)", subtitle, subtitle.cues().len())
        }
        SubtitleEvent::NativeActivated(path) => {
            info!("Player renders subtitle {}", path.display())
        }
        SubtitleEvent::Disabled => info!("Subtitle disabled"),
        SubtitleEvent::Failed(reason) => warn!("Subtitle failed, {}", reason),
        SubtitleEvent::SizeChanged(size) => info!("Subtitle size {}", size),
        SubtitleEvent::OffsetChanged(offset) => info!("Subtitle offset {}ms", offset),
    }
}

// =============================================================================
// Subtitles Command
// =============================================================================

pub async fn subtitles_cmd(cmd: SubtitlesCmd, config: Option<&Path>, output: &Output) -> ExitCode {
    if let Err(e) = validate_imdb_id(&cmd.imdb_id) {
        return output.error(e, ExitCode::InvalidArgs);
    }

    let settings = open_settings(config).subtitle_settings();
    let client = SubtitleClient::new(settings.directory);

    output.info(format!("Searching subtitles for: {}", cmd.imdb_id));

    match client.list_available(&cmd.media()).await {
        Ok(mut subs) => {
            let languages = cmd.languages();
            if !languages.is_empty() {
                subs.retain(|s| s.language().is_some_and(|l| languages.contains(&l)));
            }

            if subs.is_empty() {
                return output.error("No subtitles found", ExitCode::NoSubtitles);
            }

            if let Err(e) = output.print(&subs) {
                return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
            }
            ExitCode::Success
        }
        Err(e) => output.error(
            format!("Subtitle search failed: {}", e),
            ExitCode::NetworkError,
        ),
    }
}

// =============================================================================
// Config Command
// =============================================================================

#[derive(Serialize)]
struct ConfigUpdated {
    status: &'static str,
    path: Option<PathBuf>,
}

pub async fn config_cmd(cmd: ConfigCmd, config: Option<&Path>, output: &Output) -> ExitCode {
    let path = config_path(config);
    let store = open_settings(config);
    let mut settings = store.subtitle_settings();

    match cmd.action {
        ConfigAction::Show => {
            if let Err(e) = output.print(store.config()) {
                return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
            }
            return ExitCode::Success;
        }
        ConfigAction::SetLanguage { code } => settings.default_language = Some(code),
        ConfigAction::Disable => settings.default_language = None,
        ConfigAction::SetSize { size } => {
            if size == 0 {
                return output.error("Subtitle size must be positive", ExitCode::InvalidArgs);
            }
            settings.font_size = size;
        }
    }

    if path.is_none() {
        return output.error("Could not determine config path", ExitCode::Error);
    }
    if let Err(e) = store.update_subtitle_settings(settings) {
        return output.error(format!("Failed to save config: {}", e), ExitCode::Error);
    }

    let response = ConfigUpdated {
        status: "ok",
        path,
    };
    if let Err(e) = output.print(&response) {
        return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
    }
    ExitCode::Success
}

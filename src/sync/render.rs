//! Render dispatching
//!
//! Routes a parsed subtitle either to the player's native subtitle rendering
//! or to the overlay listeners.

use crate::models::Subtitle;
use crate::stream::Player;
use crate::sync::listener::{ListenerRegistry, SubtitleEvent};
use log::{debug, warn};
use std::sync::Arc;

pub struct RenderDispatcher {
    listeners: Arc<ListenerRegistry>,
    active: Option<Arc<Subtitle>>,
    /// The active subtitle is rendered by the player
    native: bool,
    offset_ms: i64,
}

impl RenderDispatcher {
    pub fn new(listeners: Arc<ListenerRegistry>) -> Self {
        Self {
            listeners,
            active: None,
            native: false,
            offset_ms: 0,
        }
    }

    pub fn active(&self) -> Option<&Arc<Subtitle>> {
        self.active.as_ref()
    }

    pub fn is_native(&self) -> bool {
        self.native
    }

    pub fn offset_ms(&self) -> i64 {
        self.offset_ms
    }

    /// Show the given subtitle
    pub async fn activate(&mut self, player: Option<&Arc<dyn Player>>, subtitle: Subtitle) {
        self.dispatch(player, Arc::new(subtitle)).await;
    }

    /// Show the active subtitle again, e.g. on a newly attached player
    pub async fn redispatch(&mut self, player: Option<&Arc<dyn Player>>) {
        if let Some(subtitle) = self.active.clone() {
            self.dispatch(player, subtitle).await;
        }
    }

    async fn dispatch(&mut self, player: Option<&Arc<dyn Player>>, subtitle: Arc<Subtitle>) {
        self.native = false;

        if let Some(player) = player.filter(|p| p.supports_native_subtitle_file()) {
            debug!("Using native subtitle file render of {}", player.name());
            match player.subtitle_file(subtitle.file()).await {
                Ok(()) => {
                    self.native = true;
                    if self.offset_ms != 0 {
                        forward_delay(player, self.offset_ms).await;
                    }
                }
                Err(e) => warn!(
                    "{} failed to load {}, falling back to overlay, {}",
                    player.name(),
                    subtitle.file().display(),
                    e
                ),
            }
        }

        let event = if self.native {
            SubtitleEvent::NativeActivated(subtitle.file().to_path_buf())
        } else {
            SubtitleEvent::Activated(subtitle.clone())
        };
        self.active = Some(subtitle);
        self.listeners.notify(&event);
    }

    /// Hide the active subtitle
    pub async fn deactivate(&mut self, player: Option<&Arc<dyn Player>>) {
        let was_native = std::mem::replace(&mut self.native, false);
        self.active = None;

        if let Some(player) = player.filter(|_| was_native) {
            clear_subtitle_file(player).await;
        }

        self.listeners.notify(&SubtitleEvent::Disabled);
    }

    /// Stop rendering natively on a player that is being replaced
    ///
    /// Returns whether `player` was rendering the active subtitle.
    pub async fn detach(&mut self, player: &Arc<dyn Player>) -> bool {
        if !std::mem::replace(&mut self.native, false) {
            return false;
        }
        clear_subtitle_file(player).await;
        true
    }

    /// Update the subtitle offset
    pub async fn set_offset(&mut self, player: Option<&Arc<dyn Player>>, offset_ms: i64) {
        if self.offset_ms == offset_ms {
            return;
        }
        self.offset_ms = offset_ms;

        if let Some(player) = player.filter(|_| self.native) {
            forward_delay(player, offset_ms).await;
        }
        self.listeners.notify(&SubtitleEvent::OffsetChanged(offset_ms));
    }
}

async fn forward_delay(player: &Arc<dyn Player>, offset_ms: i64) {
    if let Err(e) = player.subtitle_delay(offset_ms).await {
        warn!("{} failed to apply subtitle delay, {}", player.name(), e);
    }
}

async fn clear_subtitle_file(player: &Arc<dyn Player>) {
    if let Err(e) = player.clear_subtitle_file().await {
        warn!("{} failed to clear its subtitle file, {}", player.name(), e);
    }
}

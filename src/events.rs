//! Playback event bus
//!
//! Publish/subscribe channel carrying playback lifecycle events and user
//! facing error notifications between the player side and the subtitle
//! manager.

use crate::models::PlayRequest;
use log::trace;
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 64;

/// Events published on the bus
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// A playback has been started
    PlaybackStarted(PlayRequest),
    /// The active playback has been stopped or closed
    PlaybackStopped,
    /// Message to show to the user
    ErrorNotification(String),
}

/// Broadcast bus for [`PlayerEvent`]s
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PlayerEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers
    pub fn publish(&self, event: PlayerEvent) {
        trace!("Publishing {:?}", event);
        // no subscribers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

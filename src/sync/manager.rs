//! Subtitle manager
//!
//! Decides on every play event which subtitle to fetch, cancels superseded
//! fetches, lets the user pick custom subtitle files and hands the parsed
//! result to the [`RenderDispatcher`].
//!
//! All session state lives in a single actor task. Public calls, bus events
//! and fetch completions reach it as messages, so state is only ever mutated
//! in one place. Every fetch or pick is tagged with an epoch; a completion is
//! only applied when its epoch is still the in-flight one.

use crate::config::{SettingsStore, DEFAULT_LANGUAGE_PROPERTY, FONT_SIZE_PROPERTY};
use crate::events::{EventBus, PlayerEvent};
use crate::models::{PlayRequest, Subtitle, SubtitleInfo, SubtitleMatcher, SubtitlePreference};
use crate::stream::{Player, SubtitleError, SubtitleProvider};
use crate::sync::listener::{ListenerRegistry, SubtitleEvent, SubtitleListener};
use crate::sync::picker::{self, SubtitlePicker};
use crate::sync::preference;
use crate::sync::render::RenderDispatcher;
use log::{debug, error, trace, warn};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Message published on the event bus when a subtitle couldn't be loaded
pub const SUBTITLE_DOWNLOAD_FAILED: &str = "Failed to load the subtitle for the video playback";

const DEFAULT_SUBTITLE_SIZE: u32 = 28;

enum Command {
    PlaybackStarted(PlayRequest),
    SelectionChanged(SubtitleInfo),
    PlaybackStopped,
    SetPlayer(Option<Arc<dyn Player>>),
    UpdatePreference(SubtitlePreference),
    UpdateOffset(i64),
    UpdateSize(u32),
    Snapshot(oneshot::Sender<SessionSnapshot>),
}

enum Completion {
    Fetched {
        epoch: u64,
        result: Result<Subtitle, SubtitleError>,
    },
    Picked {
        epoch: u64,
        picked: Option<SubtitleInfo>,
    },
}

/// Point in time view of the manager state
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    /// Identifier of the active playback session
    pub session_id: Option<Uuid>,
    pub url: Option<String>,
    pub quality: Option<String>,
    /// Current subtitle selection
    pub subtitle: Option<SubtitleInfo>,
    /// A download or custom pick is in progress
    pub in_flight: bool,
    /// File of the subtitle being rendered
    pub active_subtitle: Option<PathBuf>,
    pub native_rendering: bool,
    pub offset_ms: i64,
    pub size: u32,
    pub preference: SubtitlePreference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InFlightKind {
    Fetch,
    Pick,
}

struct InFlight {
    epoch: u64,
    kind: InFlightKind,
    handle: JoinHandle<()>,
}

/// State scoped to one playback
#[derive(Default)]
struct Session {
    id: Option<Uuid>,
    url: Option<String>,
    quality: Option<String>,
    subtitle: Option<SubtitleInfo>,
    in_flight: Option<InFlight>,
    /// Player paused for the custom subtitle picker
    paused_for_pick: Option<Arc<dyn Player>>,
}

impl Session {
    fn is_idle(&self) -> bool {
        self.id.is_none() && self.in_flight.is_none() && self.subtitle.is_none()
    }
}

/// Handle to the subtitle manager
///
/// Cloning is cheap; the manager stops once every handle is dropped.
#[derive(Clone)]
pub struct SubtitleManager {
    commands: mpsc::UnboundedSender<Command>,
    listeners: Arc<ListenerRegistry>,
}

impl SubtitleManager {
    /// Start a manager on the current tokio runtime
    ///
    /// The manager follows `PlaybackStarted`/`PlaybackStopped` on `bus` and
    /// publishes error notifications on it.
    pub fn new(
        provider: Arc<dyn SubtitleProvider>,
        picker: Arc<dyn SubtitlePicker>,
        bus: EventBus,
        preference: SubtitlePreference,
    ) -> Self {
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let (completions, completions_rx) = mpsc::unbounded_channel();
        let listeners = Arc::new(ListenerRegistry::new());
        let events = bus.subscribe();

        let actor = ManagerActor {
            provider,
            picker,
            bus,
            completions,
            listeners: listeners.clone(),
            render: RenderDispatcher::new(listeners.clone()),
            preference,
            player: None,
            session: Session::default(),
            epoch: 0,
            size: DEFAULT_SUBTITLE_SIZE,
        };
        tokio::spawn(actor.run(commands_rx, completions_rx, events));

        Self {
            commands,
            listeners,
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn SubtitleListener>) {
        self.listeners.add(listener);
    }

    pub fn on_playback_started(&self, request: PlayRequest) {
        self.send(Command::PlaybackStarted(request));
    }

    /// Change the subtitle of the active playback
    pub fn on_selection_changed(&self, subtitle: SubtitleInfo) {
        self.send(Command::SelectionChanged(subtitle));
    }

    pub fn on_playback_stopped(&self) {
        self.send(Command::PlaybackStopped);
    }

    /// Replace the active player, `None` when no player is active
    pub fn set_player(&self, player: Option<Arc<dyn Player>>) {
        self.send(Command::SetPlayer(player));
    }

    /// Replace the persisted subtitle preference
    pub fn update_preference(&self, preference: SubtitlePreference) {
        self.send(Command::UpdatePreference(preference));
    }

    pub fn update_subtitle_offset(&self, offset_ms: i64) {
        self.send(Command::UpdateOffset(offset_ms));
    }

    pub fn update_subtitle_size(&self, size: u32) {
        self.send(Command::UpdateSize(size));
    }

    /// Current state, after every previously sent call has been handled
    pub async fn snapshot(&self) -> Option<SessionSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Snapshot(tx));
        rx.await.ok()
    }

    /// Follow subtitle setting changes of `store`
    pub fn follow_settings(&self, store: &SettingsStore) -> JoinHandle<()> {
        let mut events = store.subscribe();
        let commands = self.commands.clone();

        tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Missed {} subtitle setting events", skipped);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                let command = match event.property {
                    DEFAULT_LANGUAGE_PROPERTY => {
                        Command::UpdatePreference(SubtitlePreference::from(&event.settings))
                    }
                    FONT_SIZE_PROPERTY => Command::UpdateSize(event.settings.font_size),
                    _ => continue,
                };
                if commands.send(command).is_err() {
                    break;
                }
            }
        })
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            warn!("Subtitle manager is no longer running");
        }
    }
}

struct ManagerActor {
    provider: Arc<dyn SubtitleProvider>,
    picker: Arc<dyn SubtitlePicker>,
    bus: EventBus,
    completions: mpsc::UnboundedSender<Completion>,
    listeners: Arc<ListenerRegistry>,
    render: RenderDispatcher,
    preference: SubtitlePreference,
    player: Option<Arc<dyn Player>>,
    session: Session,
    /// Monotonic over the manager lifetime, never reset by a stop
    epoch: u64,
    size: u32,
}

impl ManagerActor {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut completions: mpsc::UnboundedReceiver<Completion>,
        mut events: broadcast::Receiver<PlayerEvent>,
    ) {
        trace!("Subtitle manager started");
        loop {
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                Some(completion) = completions.recv() => self.handle_completion(completion).await,
                event = events.recv() => match event {
                    Ok(PlayerEvent::PlaybackStarted(request)) => self.playback_started(request).await,
                    Ok(PlayerEvent::PlaybackStopped) => self.playback_stopped().await,
                    Ok(PlayerEvent::ErrorNotification(_)) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Subtitle manager missed {} playback events", skipped)
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }

        self.cancel_in_flight().await;
        trace!("Subtitle manager stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::PlaybackStarted(request) => self.playback_started(request).await,
            Command::SelectionChanged(subtitle) => self.apply_selection(subtitle).await,
            Command::PlaybackStopped => self.playback_stopped().await,
            Command::SetPlayer(player) => self.set_player(player).await,
            Command::UpdatePreference(preference) => self.update_preference(preference).await,
            Command::UpdateOffset(offset) => {
                self.render.set_offset(self.player.as_ref(), offset).await
            }
            Command::UpdateSize(size) => {
                if self.size != size {
                    self.size = size;
                    self.listeners.notify(&SubtitleEvent::SizeChanged(size));
                }
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    async fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Fetched { epoch, result } => {
                if self.take_in_flight(epoch, InFlightKind::Fetch) {
                    self.fetch_completed(result).await;
                }
            }
            Completion::Picked { epoch, picked } => {
                if self.take_in_flight(epoch, InFlightKind::Pick) {
                    self.pick_completed(picked).await;
                }
            }
        }
    }

    async fn playback_started(&mut self, request: PlayRequest) {
        if !self.session.is_idle() {
            // the same player keeps running, so a native subtitle is cleared on it
            let player = self.player.clone();
            self.reset_session(player.as_ref()).await;
        }

        let subtitle = preference::resolve(&request, &self.preference);
        let id = Uuid::new_v4();
        debug!(
            "Playback {} started for {} ({:?}), resolved subtitle {}",
            id, request.url, request.quality, subtitle
        );
        self.session.id = Some(id);
        self.session.url = Some(request.url);
        self.session.quality = request.quality;

        self.apply_selection(subtitle).await;
    }

    async fn playback_stopped(&mut self) {
        if self.session.is_idle() && self.render.active().is_none() {
            trace!("Playback stopped without an active subtitle session");
            return;
        }

        debug!("Playback stopped, resetting subtitle session");
        self.reset_session(None).await;
        self.render.set_offset(None, 0).await;
    }

    async fn set_player(&mut self, player: Option<Arc<dyn Player>>) {
        let previous = std::mem::replace(&mut self.player, player);
        let detached = match previous {
            Some(previous) if !self.is_active_player(&previous) => {
                self.render.detach(&previous).await
            }
            _ => false,
        };

        if self.render.active().is_some() && (self.player.is_some() || detached) {
            debug!("Active player changed, dispatching the active subtitle again");
            self.render.redispatch(self.player.as_ref()).await;
        }
    }

    fn is_active_player(&self, player: &Arc<dyn Player>) -> bool {
        self.player
            .as_ref()
            .is_some_and(|active| Arc::ptr_eq(active, player))
    }

    async fn update_preference(&mut self, preference: SubtitlePreference) {
        debug!("Subtitle preference changed to {}", preference);
        self.preference = preference;

        let active_session = self.session.id.is_some();
        let enabled = !matches!(self.session.subtitle, None | Some(SubtitleInfo::None));
        if self.preference == SubtitlePreference::Disabled && active_session && enabled {
            self.apply_selection(SubtitleInfo::None).await;
        }
    }

    /// Switch to `subtitle`, superseding anything in flight
    async fn apply_selection(&mut self, subtitle: SubtitleInfo) {
        self.cancel_in_flight().await;
        self.session.subtitle = Some(subtitle.clone());

        if subtitle.is_none() {
            debug!("Disabling the subtitle track");
            self.render.deactivate(self.player.as_ref()).await;
        } else if subtitle.needs_pick() {
            self.start_pick().await;
        } else {
            self.start_fetch(subtitle);
        }
    }

    fn start_fetch(&mut self, subtitle: SubtitleInfo) {
        let epoch = self.next_epoch();
        let matcher = SubtitleMatcher::from_playback(
            self.session.url.as_deref(),
            self.session.quality.as_deref(),
        );
        debug!("Downloading subtitle {} with {:?} (fetch {})", subtitle, matcher, epoch);

        let provider = self.provider.clone();
        let completions = self.completions.clone();
        let info = subtitle.clone();
        let handle = tokio::spawn(async move {
            let result = provider.download_and_parse(&info, &matcher).await;
            let _ = completions.send(Completion::Fetched { epoch, result });
        });

        self.session.in_flight = Some(InFlight {
            epoch,
            kind: InFlightKind::Fetch,
            handle,
        });
        self.listeners.notify(&SubtitleEvent::Downloading(subtitle));
    }

    async fn start_pick(&mut self) {
        let epoch = self.next_epoch();
        debug!("Letting the user pick a custom subtitle (pick {})", epoch);

        // the player stays paused until the picked subtitle is loaded
        picker::pause_player(self.player.as_ref()).await;
        self.session.paused_for_pick = self.player.clone();

        let subtitle_picker = self.picker.clone();
        let completions = self.completions.clone();
        let handle = tokio::spawn(async move {
            let picked = picker::pick(subtitle_picker).await;
            let _ = completions.send(Completion::Picked { epoch, picked });
        });

        self.session.in_flight = Some(InFlight {
            epoch,
            kind: InFlightKind::Pick,
            handle,
        });
    }

    async fn fetch_completed(&mut self, result: Result<Subtitle, SubtitleError>) {
        match result {
            Ok(subtitle) => {
                debug!("Subtitle {} has been loaded with success", subtitle);
                self.render.activate(self.player.as_ref(), subtitle).await;
            }
            Err(e) => {
                error!("Video subtitle failed, {}", e);
                self.bus
                    .publish(PlayerEvent::ErrorNotification(SUBTITLE_DOWNLOAD_FAILED.to_string()));
                self.listeners.notify(&SubtitleEvent::Failed(e.to_string()));
                self.session.subtitle = Some(SubtitleInfo::None);
                self.render.deactivate(self.player.as_ref()).await;
            }
        }

        self.release_pause().await;
    }

    async fn pick_completed(&mut self, picked: Option<SubtitleInfo>) {
        match picked.filter(|s| !s.is_none() && !s.needs_pick()) {
            Some(subtitle) => {
                debug!("User picked custom subtitle {}", subtitle);
                self.session.subtitle = Some(subtitle.clone());
                self.start_fetch(subtitle);
            }
            None => {
                debug!("Custom subtitle pick has been cancelled, disabling the subtitle track");
                self.session.subtitle = Some(SubtitleInfo::None);
                self.render.deactivate(self.player.as_ref()).await;
                self.release_pause().await;
            }
        }
    }

    /// Whether `epoch` is the operation in flight, taking it when it is
    fn take_in_flight(&mut self, epoch: u64, kind: InFlightKind) -> bool {
        match &self.session.in_flight {
            Some(in_flight) if in_flight.epoch == epoch && in_flight.kind == kind => {
                self.session.in_flight = None;
                true
            }
            _ => {
                trace!("Discarding superseded {:?} {}", kind, epoch);
                false
            }
        }
    }

    /// Cancel the fetch or pick in flight, if any
    async fn cancel_in_flight(&mut self) {
        if let Some(in_flight) = self.session.in_flight.take() {
            trace!("Cancelling {:?} {}", in_flight.kind, in_flight.epoch);
            in_flight.handle.abort();
        }
        self.release_pause().await;
    }

    /// Resume the player paused for the picker, even when it was swapped since
    async fn release_pause(&mut self) {
        if let Some(player) = self.session.paused_for_pick.take() {
            picker::resume_player(Some(&player)).await;
        }
    }

    /// Drop the session, clearing a native subtitle on `player` if given
    async fn reset_session(&mut self, player: Option<&Arc<dyn Player>>) {
        // a reset never resumes the paused player
        self.session.paused_for_pick = None;
        self.cancel_in_flight().await;
        self.session = Session::default();
        self.render.deactivate(player).await;
    }

    fn next_epoch(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session.id,
            url: self.session.url.clone(),
            quality: self.session.quality.clone(),
            subtitle: self.session.subtitle.clone(),
            in_flight: self.session.in_flight.is_some(),
            active_subtitle: self.render.active().map(|s| s.file().to_path_buf()),
            native_rendering: self.render.is_native(),
            offset_ms: self.render.offset_ms(),
            size: self.size,
            preference: self.preference.clone(),
        }
    }
}

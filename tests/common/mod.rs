//! Test doubles shared by the integration tests
//!
//! - `FakeProvider`: records download calls, per language gates and failures
//! - `FakePlayer`: records every player call
//! - `FakePicker`: answers picks from a channel
//! - `EventRecorder`: collects subtitle events for assertions

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use subplay::models::{MediaContext, Subtitle, SubtitleInfo, SubtitleMatcher};
use subplay::stream::{Player, PlayerError, SubtitleError, SubtitleProvider};
use subplay::sync::{SubtitleEvent, SubtitleListener, SubtitlePicker};
use tokio::sync::{mpsc, Notify};

pub const TIMEOUT: Duration = Duration::from_secs(2);

/// Key of a subtitle selection used for gates and failures
pub fn key_of(info: &SubtitleInfo) -> String {
    match info {
        SubtitleInfo::None => "none".to_string(),
        SubtitleInfo::Custom { .. } => "custom".to_string(),
        SubtitleInfo::Language { language, .. } => language.clone(),
    }
}

// =============================================================================
// Provider
// =============================================================================

#[derive(Default)]
pub struct FakeProvider {
    calls: Mutex<Vec<(SubtitleInfo, SubtitleMatcher)>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    failures: Mutex<HashSet<String>>,
    available: Mutex<Vec<SubtitleInfo>>,
    started: Notify,
    cancelled: Arc<AtomicUsize>,
    completed: AtomicUsize,
}

/// Counts downloads dropped before completing
struct CancelGuard {
    cancelled: Arc<AtomicUsize>,
    armed: bool,
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if self.armed {
            self.cancelled.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl FakeProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Hold downloads of `key` until the returned gate is notified
    pub fn gate(&self, key: &str) -> Arc<Notify> {
        self.gates
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .clone()
    }

    pub fn fail(&self, key: &str) {
        self.failures.lock().unwrap().insert(key.to_string());
    }

    pub fn set_available(&self, available: Vec<SubtitleInfo>) {
        *self.available.lock().unwrap() = available;
    }

    pub fn calls(&self) -> Vec<(SubtitleInfo, SubtitleMatcher)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Wait until `count` downloads have been cancelled
    pub async fn wait_cancelled(&self, count: usize) {
        let start = std::time::Instant::now();
        while self.cancelled() < count {
            assert!(start.elapsed() < TIMEOUT, "download never cancelled");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Wait until a new download started
    pub async fn wait_started(&self) {
        tokio::time::timeout(TIMEOUT, self.started.notified())
            .await
            .expect("download never started");
    }
}

/// Parsed subtitle the fake provider hands out for `info`
pub fn parsed(info: &SubtitleInfo) -> Subtitle {
    let file = info
        .files()
        .first()
        .and_then(|f| f.local_path())
        .unwrap_or_else(|| PathBuf::from(format!("/tmp/subplay-{}.srt", key_of(info))));

    Subtitle::new(file, Some(info.clone()), Vec::new())
}

#[async_trait]
impl SubtitleProvider for FakeProvider {
    async fn list_available(
        &self,
        _media: &MediaContext,
    ) -> Result<Vec<SubtitleInfo>, SubtitleError> {
        Ok(self.available.lock().unwrap().clone())
    }

    async fn download_and_parse(
        &self,
        info: &SubtitleInfo,
        matcher: &SubtitleMatcher,
    ) -> Result<Subtitle, SubtitleError> {
        let key = key_of(info);
        self.calls
            .lock()
            .unwrap()
            .push((info.clone(), matcher.clone()));
        self.started.notify_one();

        let mut guard = CancelGuard {
            cancelled: self.cancelled.clone(),
            armed: true,
        };
        let gate = self.gates.lock().unwrap().get(&key).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        guard.armed = false;
        self.completed.fetch_add(1, Ordering::SeqCst);

        if self.failures.lock().unwrap().contains(&key) {
            return Err(SubtitleError::NoFilesFound);
        }
        Ok(parsed(info))
    }
}

// =============================================================================
// Player
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCall {
    Pause,
    Resume,
    SubtitleFile(PathBuf),
    ClearSubtitleFile,
    Delay(i64),
}

pub struct FakePlayer {
    native: bool,
    reject_subtitle: bool,
    calls: Mutex<Vec<PlayerCall>>,
}

impl FakePlayer {
    /// Player rendering subtitle files itself
    pub fn native() -> Arc<Self> {
        Arc::new(Self {
            native: true,
            reject_subtitle: false,
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Player relying on the overlay
    pub fn overlay() -> Arc<Self> {
        Arc::new(Self {
            native: false,
            reject_subtitle: false,
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Native player failing to load subtitle files
    pub fn broken() -> Arc<Self> {
        Arc::new(Self {
            native: true,
            reject_subtitle: true,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<PlayerCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: PlayerCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Player for FakePlayer {
    fn name(&self) -> &str {
        "fake"
    }

    async fn pause(&self) -> Result<(), PlayerError> {
        self.record(PlayerCall::Pause);
        Ok(())
    }

    async fn resume(&self) -> Result<(), PlayerError> {
        self.record(PlayerCall::Resume);
        Ok(())
    }

    fn supports_native_subtitle_file(&self) -> bool {
        self.native
    }

    async fn subtitle_file(&self, path: &Path) -> Result<(), PlayerError> {
        self.record(PlayerCall::SubtitleFile(path.to_path_buf()));
        if self.reject_subtitle {
            return Err(PlayerError::Command("invalid subtitle".into()));
        }
        Ok(())
    }

    async fn clear_subtitle_file(&self) -> Result<(), PlayerError> {
        self.record(PlayerCall::ClearSubtitleFile);
        Ok(())
    }

    async fn subtitle_delay(&self, offset_ms: i64) -> Result<(), PlayerError> {
        self.record(PlayerCall::Delay(offset_ms));
        Ok(())
    }
}

// =============================================================================
// Picker
// =============================================================================

/// Picker answering with whatever the test sends
pub struct FakePicker {
    answers: Mutex<std::sync::mpsc::Receiver<Option<SubtitleInfo>>>,
    invocations: AtomicUsize,
}

impl FakePicker {
    pub fn new() -> (Arc<Self>, std::sync::mpsc::Sender<Option<SubtitleInfo>>) {
        let (tx, rx) = std::sync::mpsc::channel();
        let picker = Arc::new(Self {
            answers: Mutex::new(rx),
            invocations: AtomicUsize::new(0),
        });
        (picker, tx)
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

impl SubtitlePicker for FakePicker {
    fn pick_custom_subtitle(&self) -> Option<SubtitleInfo> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        // bounded so a forgotten answer can't hang the runtime shutdown
        self.answers
            .lock()
            .unwrap()
            .recv_timeout(TIMEOUT)
            .ok()
            .flatten()
    }
}

// =============================================================================
// Listener
// =============================================================================

pub struct EventRecorder {
    events: mpsc::UnboundedReceiver<SubtitleEvent>,
}

impl EventRecorder {
    /// Recorder and the listener feeding it
    pub fn new() -> (Self, Arc<dyn SubtitleListener>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let listener = move |event: &SubtitleEvent| {
            let _ = tx.send(event.clone());
        };
        (Self { events: rx }, Arc::new(listener))
    }

    /// Next event, panics when none arrives in time
    pub async fn next(&mut self) -> SubtitleEvent {
        tokio::time::timeout(TIMEOUT, self.events.recv())
            .await
            .expect("no subtitle event received")
            .expect("listener dropped")
    }

    /// Skip events until one matches `predicate`
    pub async fn wait_for<F>(&mut self, predicate: F) -> SubtitleEvent
    where
        F: Fn(&SubtitleEvent) -> bool,
    {
        loop {
            let event = self.next().await;
            if predicate(&event) {
                return event;
            }
        }
    }

    /// Events received so far, without waiting
    pub fn drain(&mut self) -> Vec<SubtitleEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

//! Subtitle listeners
//!
//! Ordered, thread safe registry of listeners interested in subtitle state
//! transitions. A panicking listener is logged and skipped, the remaining
//! listeners are still notified.

use crate::models::{Subtitle, SubtitleInfo};
use log::error;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

/// Subtitle state transitions
#[derive(Debug, Clone, PartialEq)]
pub enum SubtitleEvent {
    /// A subtitle is being downloaded and parsed
    Downloading(SubtitleInfo),
    /// A subtitle should be rendered by the overlay
    Activated(Arc<Subtitle>),
    /// The player renders the subtitle file itself
    NativeActivated(PathBuf),
    /// No subtitle is shown
    Disabled,
    /// The subtitle could not be loaded
    Failed(String),
    /// The subtitle font size changed
    SizeChanged(u32),
    /// The subtitle offset changed, in milliseconds
    OffsetChanged(i64),
}

/// Receives [`SubtitleEvent`]s
pub trait SubtitleListener: Send + Sync {
    fn on_event(&self, event: &SubtitleEvent);
}

impl<F> SubtitleListener for F
where
    F: Fn(&SubtitleEvent) + Send + Sync,
{
    fn on_event(&self, event: &SubtitleEvent) {
        self(event)
    }
}

#[derive(Default)]
pub struct ListenerRegistry {
    listeners: RwLock<Vec<Arc<dyn SubtitleListener>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Arc<dyn SubtitleListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Notify every listener in registration order
    pub fn notify(&self, event: &SubtitleEvent) {
        // snapshot so listeners can register others without deadlocking
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for listener in listeners {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener.on_event(event))) {
                error!(
                    "Failed to invoke subtitle listener for {:?}, {}",
                    event,
                    panic_message(panic.as_ref())
                );
            }
        }
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_notify_in_registration_order() {
        let registry = ListenerRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for name in ["first", "second"] {
            let seen = seen.clone();
            registry.add(Arc::new(move |_: &SubtitleEvent| {
                seen.lock().unwrap().push(name);
            }));
        }
        registry.notify(&SubtitleEvent::Disabled);

        assert_eq!(*seen.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let registry = ListenerRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        registry.add(Arc::new(|_: &SubtitleEvent| panic!("listener exploded")));
        let s = seen.clone();
        registry.add(Arc::new(move |event: &SubtitleEvent| {
            s.lock().unwrap().push(event.clone());
        }));

        registry.notify(&SubtitleEvent::SizeChanged(20));
        registry.notify(&SubtitleEvent::Disabled);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![SubtitleEvent::SizeChanged(20), SubtitleEvent::Disabled]
        );
    }

    #[test]
    fn test_concurrent_registration() {
        let registry = Arc::new(ListenerRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    registry.add(Arc::new(|_: &SubtitleEvent| {}));
                    registry.notify(&SubtitleEvent::Disabled);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.len(), 8);
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(boxed.as_ref()), "static");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(1);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}

// Observer mechanism for engine notifications
// Events are dispatched from the thread that caused them, never under an engine lock

use crate::state::PlaybackState;
use parking_lot::Mutex;
use std::sync::Arc;

/// Engine event types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine state changed
    StateChanged {
        old_state: PlaybackState,
        new_state: PlaybackState,
    },

    /// A source was opened; its duration is now known
    SourceLoaded { duration_secs: u64 },

    /// The clip played to its end. Fires at most once per session.
    PlaybackCompleted,

    /// Playback was stopped on request and the source released
    PlaybackStopped,

    /// Load or playback failure
    Error { message: String },
}

/// Engine observer trait
/// Implementations should be lightweight; they run on the playback thread.
pub trait EngineObserver: Send + Sync {
    fn on_event(&self, event: EngineEvent);
}

/// Fan-out of events to registered observers
pub struct ObserverManager {
    observers: Mutex<Vec<Arc<dyn EngineObserver>>>,
}

impl ObserverManager {
    pub fn new() -> Self {
        Self {
            observers: Mutex::new(Vec::new()),
        }
    }

    pub fn add_observer(&self, observer: Arc<dyn EngineObserver>) {
        self.observers.lock().push(observer);
    }

    pub fn clear_observers(&self) {
        self.observers.lock().clear();
    }

    pub fn dispatch_event(&self, event: EngineEvent) {
        // Snapshot so observers may register or clear from inside on_event
        let observers = self.observers.lock().clone();
        for observer in observers.iter() {
            observer.on_event(event.clone());
        }
    }

    pub fn dispatch_state_change(&self, old_state: PlaybackState, new_state: PlaybackState) {
        if old_state != new_state {
            self.dispatch_event(EngineEvent::StateChanged {
                old_state,
                new_state,
            });
        }
    }
}

impl Default for ObserverManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer that records everything, for tests
#[cfg(test)]
pub struct RecordingObserver {
    events: Mutex<Vec<EngineEvent>>,
    arrived: parking_lot::Condvar,
}

#[cfg(test)]
impl RecordingObserver {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            arrived: parking_lot::Condvar::new(),
        }
    }

    pub fn get_events(&self) -> Vec<EngineEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, wanted: &EngineEvent) -> usize {
        self.events.lock().iter().filter(|e| *e == wanted).count()
    }

    /// Block until `wanted` has been seen, or the timeout passes
    pub fn wait_for(&self, wanted: &EngineEvent, timeout: std::time::Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        let mut events = self.events.lock();
        while !events.contains(wanted) {
            if self.arrived.wait_until(&mut events, deadline).timed_out() {
                return events.contains(wanted);
            }
        }
        true
    }
}

#[cfg(test)]
impl EngineObserver for RecordingObserver {
    fn on_event(&self, event: EngineEvent) {
        self.events.lock().push(event);
        self.arrived.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_to_all_observers() {
        let manager = ObserverManager::new();
        let first = Arc::new(RecordingObserver::new());
        let second = Arc::new(RecordingObserver::new());
        manager.add_observer(first.clone());
        manager.add_observer(second.clone());

        manager.dispatch_event(EngineEvent::PlaybackCompleted);

        assert_eq!(first.get_events(), vec![EngineEvent::PlaybackCompleted]);
        assert_eq!(second.get_events(), vec![EngineEvent::PlaybackCompleted]);
    }

    #[test]
    fn test_unchanged_state_is_not_dispatched() {
        let manager = ObserverManager::new();
        let observer = Arc::new(RecordingObserver::new());
        manager.add_observer(observer.clone());

        manager.dispatch_state_change(PlaybackState::Paused, PlaybackState::Paused);
        manager.dispatch_state_change(PlaybackState::Playing, PlaybackState::Paused);

        assert_eq!(
            observer.get_events(),
            vec![EngineEvent::StateChanged {
                old_state: PlaybackState::Playing,
                new_state: PlaybackState::Paused,
            }]
        );
    }

    #[test]
    fn test_clear_observers() {
        let manager = ObserverManager::new();
        let observer = Arc::new(RecordingObserver::new());
        manager.add_observer(observer.clone());
        manager.clear_observers();

        manager.dispatch_event(EngineEvent::PlaybackStopped);
        assert!(observer.get_events().is_empty());
    }
}

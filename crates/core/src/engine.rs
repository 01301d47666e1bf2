// Playback engine
// Owns one audio line per session and drives it from a dedicated playback thread.
//
// Controller requests are applied to the state immediately and queued as
// commands for the playback thread, which performs the matching line
// operation. The thread sleeps on a condition variable and, when woken, drains
// queued commands before it looks at the line-stopped flag, so a stop event
// caused by a pause is never mistaken for the end of the clip.

use crate::callback::{EngineEvent, EngineObserver, ObserverManager};
use crate::config::EngineConfig;
use crate::error::{LoadError, PlaybackError, Result};
use crate::source::{AudioLine, AudioSourceProvider, LineEvent, LineListener};
use crate::state::{PlaybackState, PlaybackStatus};
use crate::time::{format_hms, micros_to_secs};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle, ThreadId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Pause,
    Resume,
    Stop,
}

struct Control {
    state: PlaybackState,
    commands: VecDeque<Command>,
    /// Raised by the line listener, consumed by the playback thread
    line_stopped: bool,
    /// True from a successful open until the line has been closed
    attached: bool,
    /// Bumped on every load; events from older lines are dropped
    session: u64,
    duration_secs: u64,
    source_path: Option<PathBuf>,
    playback_thread: Option<ThreadId>,
}

struct Shared {
    // Lock order: `line` before `control`. Line operations may raise events
    // synchronously, so none is invoked while `control` is held.
    line: Mutex<Option<Box<dyn AudioLine>>>,
    control: Mutex<Control>,
    /// Wakes the playback thread
    wake: Condvar,
    /// Signalled once a line has been closed
    released: Condvar,
    observers: ObserverManager,
    config: EngineConfig,
}

impl Shared {
    fn set_state(&self, control: &mut Control, new_state: PlaybackState) -> PlaybackState {
        if !control.state.can_transition_to(&new_state) {
            log::warn!(
                "Unexpected state transition from {} to {}",
                control.state,
                new_state
            );
        }
        log::debug!("Playback state changed to: {}", new_state);
        std::mem::replace(&mut control.state, new_state)
    }

    fn with_line<T>(
        &self,
        f: impl FnOnce(&mut dyn AudioLine) -> std::result::Result<T, String>,
    ) -> std::result::Result<T, String> {
        let mut slot = self.line.lock();
        match slot.as_mut() {
            Some(line) => f(line.as_mut()),
            None => Err("no line attached".to_string()),
        }
    }

    fn mark_detached(&self) {
        let mut control = self.control.lock();
        control.attached = false;
        self.released.notify_all();
    }

    /// Close the attached line and enter `terminal`.
    /// Returns the previous state, or None if no session was open.
    fn finish(&self, terminal: PlaybackState) -> Option<PlaybackState> {
        let mut slot = self.line.lock();
        let old_state = {
            let mut control = self.control.lock();
            if !control.state.has_source() {
                return None;
            }
            control.commands.clear();
            control.line_stopped = false;
            control.playback_thread = None;
            self.set_state(&mut control, terminal.clone())
        };

        if let Some(mut line) = slot.take() {
            if line.is_running() {
                if let Err(e) = line.stop() {
                    log::warn!("Failed to stop line before closing: {}", e);
                }
            }
            line.close();
        }
        drop(slot);
        self.mark_detached();

        self.observers.dispatch_state_change(old_state.clone(), terminal);
        Some(old_state)
    }

    /// Enter `Completed` if the line ran out while playing and nothing is queued
    fn complete_if_ended(&self, session: u64) -> bool {
        let mut slot = self.line.lock();
        let old_state = {
            let mut control = self.control.lock();
            if control.session != session
                || control.state != PlaybackState::Playing
                || !control.commands.is_empty()
            {
                return false;
            }
            if slot.as_ref().map_or(false, |line| line.is_running()) {
                return false;
            }
            control.line_stopped = false;
            control.playback_thread = None;
            self.set_state(&mut control, PlaybackState::Completed)
        };

        if let Some(mut line) = slot.take() {
            line.close();
        }
        drop(slot);
        self.mark_detached();

        log::info!("Playback completed");
        self.observers
            .dispatch_state_change(old_state, PlaybackState::Completed);
        self.observers.dispatch_event(EngineEvent::PlaybackCompleted);
        true
    }

    fn fail(&self, reason: String) {
        log::error!("Playback failed: {}", reason);
        if self.finish(PlaybackState::Failed(reason.clone())).is_some() {
            self.observers
                .dispatch_event(EngineEvent::Error { message: reason });
        }
    }

    fn run_session(&self, session: u64) {
        let stop_requested;
        {
            let mut control = self.control.lock();
            if control.session != session || control.state.is_finished() {
                log::debug!("Playback thread for session {} has nothing to do", session);
                return;
            }
            control.playback_thread = Some(thread::current().id());
            stop_requested = control.commands.contains(&Command::Stop);
        }
        log::info!("Playback thread started");

        if stop_requested {
            // Stopped before the line ever started
            if self.finish(PlaybackState::Stopped).is_some() {
                log::info!("Playback stopped");
                self.observers.dispatch_event(EngineEvent::PlaybackStopped);
            }
            return;
        }

        if let Err(e) = self.with_line(|line| line.start()) {
            self.fail(PlaybackError::Line(e).to_string());
            return;
        }

        loop {
            let mut control = self.control.lock();
            if control.session != session {
                return;
            }
            if control.commands.is_empty() && !control.line_stopped {
                // Timeout doubles as a fallback for lines that never raise Stop
                let _ = self.wake.wait_for(&mut control, self.config.poll_interval);
            }

            if let Some(command) = control.commands.pop_front() {
                drop(control);
                match command {
                    Command::Pause => {
                        if let Err(e) = self.with_line(|line| line.stop()) {
                            log::warn!("Failed to halt line on pause: {}", e);
                        }
                    }
                    Command::Resume => {
                        if let Err(e) = self.with_line(|line| line.start()) {
                            self.fail(PlaybackError::Line(e).to_string());
                            break;
                        }
                    }
                    Command::Stop => {
                        if self.finish(PlaybackState::Stopped).is_some() {
                            log::info!("Playback stopped");
                            self.observers.dispatch_event(EngineEvent::PlaybackStopped);
                        }
                        break;
                    }
                }
                continue;
            }

            let line_stopped = std::mem::take(&mut control.line_stopped);
            drop(control);

            if self.complete_if_ended(session) {
                break;
            }
            if line_stopped {
                log::debug!("Line stop event is not a completion, ignoring");
            }
        }

        log::info!("Playback thread exited");
    }
}

/// Forwards line events of one session into the engine
struct SessionListener {
    shared: Weak<Shared>,
    session: u64,
}

impl LineListener for SessionListener {
    fn on_line_event(&self, event: LineEvent) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        match event {
            LineEvent::Stop => {
                let mut control = shared.control.lock();
                if control.session != self.session {
                    log::debug!("Stop event from a previous session, ignoring");
                    return;
                }
                log::debug!("Line stop event while {}", control.state);
                control.line_stopped = true;
                shared.wake.notify_one();
            }
            other => log::trace!("Line event: {:?}", other),
        }
    }
}

/// Playback engine: exposes load/play/pause/resume/stop over one audio line
pub struct PlaybackEngine {
    shared: Arc<Shared>,
    provider: Arc<dyn AudioSourceProvider>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl PlaybackEngine {
    pub fn new(provider: Arc<dyn AudioSourceProvider>) -> Self {
        Self::with_config(provider, EngineConfig::default())
    }

    pub fn with_config(provider: Arc<dyn AudioSourceProvider>, config: EngineConfig) -> Self {
        log::info!("Initializing playback engine");
        Self {
            shared: Arc::new(Shared {
                line: Mutex::new(None),
                control: Mutex::new(Control {
                    state: PlaybackState::Idle,
                    commands: VecDeque::new(),
                    line_stopped: false,
                    attached: false,
                    session: 0,
                    duration_secs: 0,
                    source_path: None,
                    playback_thread: None,
                }),
                wake: Condvar::new(),
                released: Condvar::new(),
                observers: ObserverManager::new(),
                config,
            }),
            provider,
            worker: Mutex::new(None),
        }
    }

    /// Register an observer for engine events
    pub fn add_observer(&self, observer: Arc<dyn EngineObserver>) {
        self.shared.observers.add_observer(observer);
    }

    pub fn clear_observers(&self) {
        self.shared.observers.clear_observers();
    }

    /// Open `path` and make it ready to play.
    /// A session that is still running is stopped first.
    pub fn load(&self, path: impl AsRef<Path>) -> std::result::Result<(), LoadError> {
        let path = path.as_ref();

        if self.state().has_source() {
            log::info!("Stopping current session before loading {}", path.display());
            if let Err(e) = self.stop() {
                log::warn!("Failed to stop current session: {}", e);
            }
        }
        self.reap_worker();

        let (old_state, session) = {
            let mut control = self.shared.control.lock();
            if control.attached {
                // Only reachable when load is called from an observer mid-session
                return Err(LoadError::DeviceUnavailable(
                    "line still held by the previous session".to_string(),
                ));
            }
            control.session += 1;
            control.commands.clear();
            control.line_stopped = false;
            control.duration_secs = 0;
            control.source_path = Some(path.to_path_buf());
            let old_state = self.shared.set_state(&mut control, PlaybackState::Loading);
            (old_state, control.session)
        };
        self.shared
            .observers
            .dispatch_state_change(old_state, PlaybackState::Loading);

        log::info!("Loading audio file: {}", path.display());
        let mut line = match self.provider.open(path) {
            Ok(line) => line,
            Err(err) => {
                log::error!("Failed to load {}: {}", path.display(), err);
                {
                    let mut control = self.shared.control.lock();
                    control.source_path = None;
                    self.shared.set_state(&mut control, PlaybackState::Idle);
                }
                self.shared
                    .observers
                    .dispatch_state_change(PlaybackState::Loading, PlaybackState::Idle);
                self.shared.observers.dispatch_event(EngineEvent::Error {
                    message: err.to_string(),
                });
                return Err(err);
            }
        };

        let duration_secs = micros_to_secs(line.duration_micros());
        line.set_line_listener(Arc::new(SessionListener {
            shared: Arc::downgrade(&self.shared),
            session,
        }));

        {
            let mut slot = self.shared.line.lock();
            *slot = Some(line);
            let mut control = self.shared.control.lock();
            control.attached = true;
            control.duration_secs = duration_secs;
            self.shared.set_state(&mut control, PlaybackState::Ready);
        }

        log::info!(
            "Audio file loaded: {} ({})",
            path.display(),
            format_hms(duration_secs)
        );
        self.shared
            .observers
            .dispatch_event(EngineEvent::SourceLoaded { duration_secs });
        self.shared
            .observers
            .dispatch_state_change(PlaybackState::Loading, PlaybackState::Ready);
        Ok(())
    }

    /// Start playing a freshly loaded source. Returns without waiting for the
    /// clip; completion is reported through the observers.
    pub fn play(&self) -> Result<()> {
        {
            // Reject before reaping: during a session the worker is still live
            let control = self.shared.control.lock();
            if control.state != PlaybackState::Ready {
                return Err(self.invalid("play", &control.state));
            }
        }
        self.reap_worker();

        let session = {
            let mut control = self.shared.control.lock();
            if control.state != PlaybackState::Ready {
                return Err(self.invalid("play", &control.state));
            }
            control.commands.clear();
            control.line_stopped = false;
            // Until the thread is up, this caller drives the session: a stop
            // issued from an observer below must not wait for it
            control.playback_thread = Some(thread::current().id());
            self.shared.set_state(&mut control, PlaybackState::Playing);
            control.session
        };
        log::info!("Starting playback");
        self.shared
            .observers
            .dispatch_state_change(PlaybackState::Ready, PlaybackState::Playing);

        let shared = self.shared.clone();
        let spawned = thread::Builder::new()
            .name("cadence-playback".to_string())
            .spawn(move || shared.run_session(session));

        match spawned {
            Ok(handle) => {
                {
                    let mut control = self.shared.control.lock();
                    if control.playback_thread == Some(thread::current().id()) {
                        control.playback_thread = Some(handle.thread().id());
                    }
                }
                *self.worker.lock() = Some(handle);
                Ok(())
            }
            Err(e) => {
                let err =
                    PlaybackError::Thread(format!("Failed to spawn playback thread: {}", e));
                self.shared.fail(err.to_string());
                Err(err)
            }
        }
    }

    /// Halt output, keeping the position. Idempotent while paused.
    pub fn pause(&self) -> Result<()> {
        self.request(Command::Pause, PlaybackState::Playing, PlaybackState::Paused)
    }

    /// Continue from the paused position. Idempotent while playing.
    pub fn resume(&self) -> Result<()> {
        self.request(Command::Resume, PlaybackState::Paused, PlaybackState::Playing)
    }

    fn request(&self, command: Command, from: PlaybackState, to: PlaybackState) -> Result<()> {
        let op = match command {
            Command::Pause => "pause",
            Command::Resume => "resume",
            Command::Stop => "stop",
        };
        {
            let mut control = self.shared.control.lock();
            if control.state == to {
                log::debug!("{} ignored: already {}", op, to);
                return Ok(());
            }
            if control.state != from {
                return Err(self.invalid(op, &control.state));
            }
            control.commands.push_back(command);
            self.shared.set_state(&mut control, to.clone());
            self.shared.wake.notify_one();
        }
        log::info!("Playback {}", to.to_string().to_lowercase());
        self.shared.observers.dispatch_state_change(from, to);
        Ok(())
    }

    /// Stop playback and close the source.
    ///
    /// Blocks until the line is closed, which takes at most one poll interval.
    /// Called from an observer on the playback thread, the stop is applied as
    /// soon as the observer returns.
    pub fn stop(&self) -> Result<()> {
        let handed_off = {
            let mut control = self.shared.control.lock();
            let state = control.state.clone();
            match state {
                PlaybackState::Ready => false,
                PlaybackState::Playing | PlaybackState::Paused => {
                    if !control.commands.contains(&Command::Stop) {
                        control.commands.push_back(Command::Stop);
                        self.shared.wake.notify_one();
                    }
                    if control.playback_thread == Some(thread::current().id()) {
                        log::debug!("stop requested from the playback thread, deferring");
                        return Ok(());
                    }
                    let session = control.session;
                    while control.session == session && control.attached {
                        self.shared.released.wait(&mut control);
                    }
                    true
                }
                other => return Err(self.invalid("stop", &other)),
            }
        };

        if handed_off {
            self.reap_worker();
        } else if self.shared.finish(PlaybackState::Stopped).is_some() {
            // Never played: no thread to hand the stop to
            log::info!("Playback stopped");
            self.shared.observers.dispatch_event(EngineEvent::PlaybackStopped);
        }
        Ok(())
    }

    /// Stop anything in progress and return to `Idle`
    pub fn release(&self) {
        log::info!("Releasing playback engine");
        if self.state().is_active() {
            if let Err(e) = self.stop() {
                log::warn!("Failed to stop during release: {}", e);
            }
        }
        self.reap_worker();

        let old_state = {
            let mut control = self.shared.control.lock();
            if control.attached {
                return;
            }
            control.duration_secs = 0;
            control.source_path = None;
            self.shared.set_state(&mut control, PlaybackState::Idle)
        };
        self.shared
            .observers
            .dispatch_state_change(old_state, PlaybackState::Idle);
    }

    /// Current position of the attached source, in whole seconds
    pub fn current_position_seconds(&self) -> Result<u64> {
        let slot = self.shared.line.lock();
        slot.as_ref()
            .map(|line| micros_to_secs(line.position_micros()))
            .ok_or(PlaybackError::NoSource)
    }

    /// Duration of the most recently loaded source
    pub fn duration_seconds(&self) -> u64 {
        self.shared.control.lock().duration_secs
    }

    /// Duration formatted as `HH:MM:SS`
    pub fn duration_string(&self) -> String {
        format_hms(self.duration_seconds())
    }

    pub fn state(&self) -> PlaybackState {
        self.shared.control.lock().state.clone()
    }

    pub fn source_path(&self) -> Option<PathBuf> {
        self.shared.control.lock().source_path.clone()
    }

    pub fn status(&self) -> PlaybackStatus {
        let slot = self.shared.line.lock();
        let control = self.shared.control.lock();
        PlaybackStatus {
            state: control.state.clone(),
            position_secs: slot
                .as_ref()
                .map(|line| micros_to_secs(line.position_micros())),
            duration_secs: control.duration_secs,
            source_path: control.source_path.clone(),
        }
    }

    fn invalid(&self, op: &'static str, state: &PlaybackState) -> PlaybackError {
        log::debug!("{} ignored while {}", op, state);
        PlaybackError::InvalidTransition {
            op,
            state: state.clone(),
        }
    }

    fn reap_worker(&self) {
        let handle = {
            let mut worker = self.worker.lock();
            match worker.as_ref() {
                Some(handle) if handle.thread().id() == thread::current().id() => return,
                _ => worker.take(),
            }
        };
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::error!("Playback thread panicked");
            }
        }
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.release();
    }
}

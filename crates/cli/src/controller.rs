// Wires the engine, the ticker and the terminal together

use cadence_clip::is_supported;
use cadence_core::{
    AudioSourceProvider, DisplaySink, EngineEvent, EngineObserver, LoadError, PlaybackEngine,
    PlaybackError, PlaybackState, ProgressTicker,
};
use parking_lot::Mutex;
use std::fmt;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Weak};

/// Failure of a user action
#[derive(Debug)]
pub enum ControlError {
    Load(LoadError),
    Playback(PlaybackError),
    /// Nothing has been opened yet
    NoFile,
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ControlError::Load(e) => write!(f, "{}", e),
            ControlError::Playback(e) => write!(f, "{}", e),
            ControlError::NoFile => write!(f, "No file loaded, use 'o <file>'"),
        }
    }
}

impl std::error::Error for ControlError {}

impl From<LoadError> for ControlError {
    fn from(err: LoadError) -> Self {
        ControlError::Load(err)
    }
}

impl From<PlaybackError> for ControlError {
    fn from(err: PlaybackError) -> Self {
        ControlError::Playback(err)
    }
}

/// Prints the ticker output on one line
struct TerminalSink {
    engine: Weak<PlaybackEngine>,
}

impl DisplaySink for TerminalSink {
    fn on_progress(&self, formatted_time: &str, _progress_value: u64) {
        let total = match self.engine.upgrade() {
            Some(engine) => engine.duration_string(),
            None => return,
        };
        let mut out = std::io::stdout().lock();
        let _ = write!(out, "\r{} / {}  ", formatted_time, total);
        let _ = out.flush();
    }
}

/// Reacts to engine events on behalf of the user
struct EventPrinter {
    ticker: Weak<ProgressTicker>,
}

impl EngineObserver for EventPrinter {
    fn on_event(&self, event: EngineEvent) {
        match event {
            EngineEvent::PlaybackCompleted => {
                if let Some(ticker) = self.ticker.upgrade() {
                    ticker.reset();
                }
                println!("\nfinished");
            }
            EngineEvent::Error { message } => {
                if let Some(ticker) = self.ticker.upgrade() {
                    ticker.reset();
                }
                println!("\nerror: {}", message);
            }
            EngineEvent::SourceLoaded { duration_secs } => {
                log::debug!("Source loaded, {} seconds", duration_secs);
            }
            EngineEvent::StateChanged { old_state, new_state } => {
                log::debug!("State {} -> {}", old_state, new_state);
            }
            EngineEvent::PlaybackStopped => {}
        }
    }
}

pub struct Controller {
    engine: Arc<PlaybackEngine>,
    ticker: Arc<ProgressTicker>,
    // Serializes user actions so engine and ticker move together
    actions: Mutex<()>,
}

impl Controller {
    pub fn new(provider: Arc<dyn AudioSourceProvider>) -> Self {
        let engine = Arc::new(PlaybackEngine::new(provider));
        let ticker = Arc::new(ProgressTicker::new());

        ticker.set_sink(Arc::new(TerminalSink {
            engine: Arc::downgrade(&engine),
        }));
        engine.add_observer(Arc::new(EventPrinter {
            ticker: Arc::downgrade(&ticker),
        }));

        Self {
            engine,
            ticker,
            actions: Mutex::new(()),
        }
    }

    /// Load `path` and start playing it
    pub fn open(&self, path: &Path) -> Result<(), ControlError> {
        let _guard = self.actions.lock();
        self.load_and_play(path)
    }

    /// Play the current file: continue it when paused, otherwise reload it
    /// from the start. A no-op while playing.
    pub fn replay(&self) -> Result<(), ControlError> {
        let _guard = self.actions.lock();
        match self.engine.state() {
            PlaybackState::Playing => Ok(()),
            PlaybackState::Paused => {
                self.engine.resume()?;
                self.ticker.resume();
                Ok(())
            }
            _ => {
                let path = self.engine.source_path().ok_or(ControlError::NoFile)?;
                self.load_and_play(&path)
            }
        }
    }

    fn load_and_play(&self, path: &Path) -> Result<(), ControlError> {
        check_extension(path)?;

        self.ticker.reset();
        self.engine.load(path)?;
        self.engine.play()?;
        self.ticker.start(self.engine.clone());
        println!(
            "playing {} ({})",
            path.display(),
            self.engine.duration_string()
        );
        Ok(())
    }

    pub fn pause(&self) -> Result<(), PlaybackError> {
        let _guard = self.actions.lock();
        self.engine.pause()?;
        self.ticker.pause();
        Ok(())
    }

    pub fn resume(&self) -> Result<(), PlaybackError> {
        let _guard = self.actions.lock();
        self.engine.resume()?;
        self.ticker.resume();
        Ok(())
    }

    pub fn stop(&self) -> Result<(), PlaybackError> {
        let _guard = self.actions.lock();
        let result = self.engine.stop();
        self.ticker.reset();
        result
    }

    pub fn state(&self) -> PlaybackState {
        self.engine.state()
    }

    pub fn status_line(&self) -> String {
        let status = self.engine.status();
        let source = status
            .source_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        format!(
            "{} | {} | {} / {}",
            status.state,
            source,
            self.ticker.last_display().0,
            self.engine.duration_string()
        )
    }

    pub fn shutdown(&self) {
        let _guard = self.actions.lock();
        self.ticker.reset();
        self.engine.clear_observers();
        self.engine.release();
    }
}

/// Accept only files the clip provider knows how to open
pub fn check_extension(path: &Path) -> Result<(), LoadError> {
    if is_supported(path) {
        Ok(())
    } else {
        Err(LoadError::UnsupportedFormat(format!(
            "{}: expected one of {}",
            path.display(),
            cadence_clip::SUPPORTED_EXTENSIONS.join(", ")
        )))
    }
}

// Core types and traits for the Cadence playback controller

pub mod callback;
pub mod config;
pub mod engine;
pub mod error;
pub mod source;
pub mod state;
pub mod ticker;
pub mod time;

// Re-export commonly used types
pub use callback::{EngineEvent, EngineObserver, ObserverManager};
pub use config::{EngineConfig, TickerConfig};
pub use engine::PlaybackEngine;
pub use error::{LoadError, PlaybackError, Result};
pub use source::{AudioLine, AudioSourceProvider, LineEvent, LineListener};
pub use state::{PlaybackState, PlaybackStatus, TickerState};
pub use ticker::{DisplaySink, PositionSource, ProgressTicker};
pub use time::format_hms;

// Audio source abstraction consumed by the engine
//
// The platform layer opens and decodes a file and hands back a line that can
// be started, stopped and closed. The engine never decodes anything itself.

use crate::error::LoadError;
use std::path::Path;
use std::sync::Arc;

/// Host-level line event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEvent {
    Open,
    Start,
    /// The line stopped producing audio, either on request or at end of data
    Stop,
    Close,
}

/// Receiver for line events.
/// Implementations must not call back into the line that raised the event.
pub trait LineListener: Send + Sync {
    fn on_line_event(&self, event: LineEvent);
}

/// An opened, decoded audio stream bound to an output line
pub trait AudioLine: Send {
    /// Total length of the stream
    fn duration_micros(&self) -> u64;

    /// Current playback position; retained across stop/start
    fn position_micros(&self) -> u64;

    /// Whether the line is currently producing audio
    fn is_running(&self) -> bool;

    /// Start or continue output from the current position
    fn start(&mut self) -> Result<(), String>;

    /// Halt output without rewinding
    fn stop(&mut self) -> Result<(), String>;

    /// Release the line. No other method may be called afterwards.
    fn close(&mut self);

    /// Register the single listener for line events, replacing any previous one
    fn set_line_listener(&mut self, listener: Arc<dyn LineListener>);
}

/// Opens audio files into lines
pub trait AudioSourceProvider: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn AudioLine>, LoadError>;
}

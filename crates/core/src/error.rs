// Error handling for the playback core

use crate::state::PlaybackState;
use std::fmt;

/// Errors raised while opening an audio source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// Container or codec not recognized
    UnsupportedFormat(String),

    /// No compatible output line could be acquired
    DeviceUnavailable(String),

    /// Read failure
    Io(String),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LoadError::UnsupportedFormat(msg) => write!(f, "Unsupported format: {}", msg),
            LoadError::DeviceUnavailable(msg) => write!(f, "Device unavailable: {}", msg),
            LoadError::Io(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<std::io::Error> for LoadError {
    fn from(err: std::io::Error) -> Self {
        LoadError::Io(err.to_string())
    }
}

/// Errors raised by transition and query operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    /// Operation not valid from the current state; the engine is unchanged
    InvalidTransition {
        op: &'static str,
        state: PlaybackState,
    },

    /// No audio source is attached
    NoSource,

    /// The audio line rejected a start/stop request
    Line(String),

    /// Playback thread could not be spawned
    Thread(String),
}

impl fmt::Display for PlaybackError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PlaybackError::InvalidTransition { op, state } => {
                write!(f, "Invalid transition: cannot {} while {}", op, state)
            }
            PlaybackError::NoSource => write!(f, "No audio source attached"),
            PlaybackError::Line(msg) => write!(f, "Line error: {}", msg),
            PlaybackError::Thread(msg) => write!(f, "Thread error: {}", msg),
        }
    }
}

impl std::error::Error for PlaybackError {}

impl PlaybackError {
    /// True for the no-op class of errors a controller may safely ignore
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, PlaybackError::InvalidTransition { .. })
    }
}

/// Result type alias for transition operations
pub type Result<T> = std::result::Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = LoadError::UnsupportedFormat("no default track".to_string());
        assert_eq!(err.to_string(), "Unsupported format: no default track");

        let err = PlaybackError::InvalidTransition {
            op: "play",
            state: PlaybackState::Playing,
        };
        assert_eq!(err.to_string(), "Invalid transition: cannot play while Playing");
        assert!(err.is_invalid_transition());
        assert!(!PlaybackError::NoSource.is_invalid_transition());

        let err =
            PlaybackError::Thread("Failed to spawn playback thread: out of memory".to_string());
        assert_eq!(
            err.to_string(),
            "Thread error: Failed to spawn playback thread: out of memory"
        );
        assert!(!err.is_invalid_transition());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.wav");
        let err: LoadError = io.into();
        assert!(matches!(err, LoadError::Io(ref msg) if msg.contains("missing.wav")));
    }
}

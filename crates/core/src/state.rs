// Playback and ticker state

use std::fmt;
use std::path::PathBuf;

/// Engine state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackState {
    /// No audio loaded
    Idle,
    /// Audio source is being opened
    Loading,
    /// Audio is loaded and ready to play
    Ready,
    /// Audio is currently playing
    Playing,
    /// Audio is paused, position retained
    Paused,
    /// Playback was stopped by request
    Stopped,
    /// Playback reached the natural end of the clip
    Completed,
    /// The line failed while starting playback
    Failed(String),
}

impl PlaybackState {
    /// States during which an audio source is attached
    pub fn has_source(&self) -> bool {
        matches!(
            self,
            PlaybackState::Loading
                | PlaybackState::Ready
                | PlaybackState::Playing
                | PlaybackState::Paused
        )
    }

    /// States from which `stop` is meaningful
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            PlaybackState::Ready | PlaybackState::Playing | PlaybackState::Paused
        )
    }

    /// Terminal states of a session
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            PlaybackState::Stopped | PlaybackState::Completed | PlaybackState::Failed(_)
        )
    }

    /// Transition table for the engine
    pub fn can_transition_to(&self, to: &PlaybackState) -> bool {
        use PlaybackState::*;

        match (self, to) {
            // A new load is allowed from anywhere a session is not running
            (Idle | Ready | Stopped | Completed | Failed(_), Loading) => true,

            (Loading, Ready) => true,
            (Loading, Idle) => true,

            (Ready, Playing) => true,
            (Ready, Stopped) => true,

            (Playing, Paused) => true,
            (Playing, Stopped) => true,
            (Playing, Completed) => true,
            (Playing, Failed(_)) => true,

            (Paused, Playing) => true,
            (Paused, Stopped) => true,
            (Paused, Failed(_)) => true,

            // release()
            (_, Idle) => true,

            _ => false,
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PlaybackState::Failed(reason) => write!(f, "Failed ({})", reason),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Ticker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickerState {
    Stopped,
    Running,
    Paused,
}

/// Snapshot of the engine for polling controllers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackStatus {
    pub state: PlaybackState,
    /// None when no source is attached
    pub position_secs: Option<u64>,
    /// Duration of the most recently loaded source
    pub duration_secs: u64,
    pub source_path: Option<PathBuf>,
}

impl Default for PlaybackStatus {
    fn default() -> Self {
        Self {
            state: PlaybackState::Idle,
            position_secs: None,
            duration_secs: 0,
            source_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_window() {
        assert!(!PlaybackState::Idle.has_source());
        assert!(PlaybackState::Loading.has_source());
        assert!(PlaybackState::Ready.has_source());
        assert!(PlaybackState::Playing.has_source());
        assert!(PlaybackState::Paused.has_source());
        assert!(!PlaybackState::Stopped.has_source());
        assert!(!PlaybackState::Completed.has_source());
        assert!(!PlaybackState::Failed("x".into()).has_source());
    }

    #[test]
    fn test_transition_table() {
        use PlaybackState::*;

        assert!(Ready.can_transition_to(&Playing));
        assert!(Playing.can_transition_to(&Paused));
        assert!(Paused.can_transition_to(&Playing));
        assert!(Playing.can_transition_to(&Completed));
        assert!(Completed.can_transition_to(&Loading));

        // Paused is never resumed through play and never completes
        assert!(!Paused.can_transition_to(&Completed));
        assert!(!Stopped.can_transition_to(&Playing));
        assert!(!Completed.can_transition_to(&Playing));
        assert!(!Idle.can_transition_to(&Playing));
        assert!(!Playing.can_transition_to(&Loading));
    }

    #[test]
    fn test_display() {
        assert_eq!(PlaybackState::Paused.to_string(), "Paused");
        assert_eq!(
            PlaybackState::Failed("line busy".into()).to_string(),
            "Failed (line busy)"
        );
    }
}

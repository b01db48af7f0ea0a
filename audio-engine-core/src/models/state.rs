use super::error::EngineError;
use super::recording_result::RecordingResult;

/// Playback session state machine.
///
/// State transitions:
/// ```text
/// idle → playing ⇄ paused
///           ↓        ↓
///        stopped / failed
/// ```
/// `stopped` and `failed` accept a new `play()`, which moves back to `playing`.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
    Stopped,
    Failed(EngineError),
}

impl PlaybackState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, Self::Paused)
    }

    /// Whether a session is in progress (playing or paused).
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Playing | Self::Paused)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Failed(_))
    }

    /// Whether `next` is a legal successor of this state.
    pub fn can_transition_to(&self, next: &PlaybackState) -> bool {
        use PlaybackState::*;
        match (self, next) {
            (Idle | Stopped | Failed(_), Playing) => true,
            (Playing, Paused) | (Paused, Playing) => true,
            (Playing | Paused, Stopped | Failed(_)) => true,
            _ => false,
        }
    }
}

/// Capture session state machine.
///
/// State transitions:
/// ```text
/// idle → recording → stopping → completed / failed
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureState {
    Idle,
    Recording { elapsed_secs: f64 },
    Stopping,
    Completed(Box<RecordingResult>),
    Failed(EngineError),
}

impl CaptureState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, Self::Recording { .. })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Failed(_))
    }

    /// Returns the elapsed duration if in a state that tracks it.
    pub fn duration(&self) -> Option<f64> {
        match self {
            Self::Recording { elapsed_secs } => Some(*elapsed_secs),
            Self::Completed(result) => Some(result.duration_secs),
            _ => None,
        }
    }
}

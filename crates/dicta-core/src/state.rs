//! Input state for the dictation gesture engine.

use std::fmt;

/// The mutually exclusive states of the input engine.
///
/// `Warning` and `Error` are transient: they carry the message being shown
/// and always auto-revert to `Idle` after a fixed display duration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputState {
    /// Waiting for a hold gesture.
    Idle,
    /// Recording audio for transcription.
    Recording,
    /// Recording audio for transcription plus translation.
    RecordingTranslate,
    /// Waiting for the transcription backend.
    Processing,
    /// Waiting for the transcription and translation backends.
    Translating,
    /// Showing a transient warning message.
    Warning(String),
    /// Showing a transient error message.
    Error(String),
}

impl InputState {
    /// True while audio is being captured.
    pub fn is_recording(&self) -> bool {
        matches!(self, Self::Recording | Self::RecordingTranslate)
    }

    /// A new recording may start in any state that is not already recording.
    pub fn can_start_recording(&self) -> bool {
        !self.is_recording()
    }

    /// The status text injected at the cursor when this state is entered.
    /// `Idle` shows nothing.
    pub fn status_text(&self) -> Option<String> {
        match self {
            Self::Idle => None,
            Self::Recording => Some("🎤 recording…".to_string()),
            Self::RecordingTranslate => Some("🎤 recording (translate)…".to_string()),
            Self::Processing => Some("🔄 transcribing…".to_string()),
            Self::Translating => Some("🔄 translating…".to_string()),
            Self::Warning(msg) => Some(format!("⚠️ {msg}")),
            Self::Error(msg) => Some(msg.clone()),
        }
    }
}

impl Default for InputState {
    fn default() -> Self {
        Self::Idle
    }
}

impl fmt::Display for InputState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Recording => write!(f, "Recording"),
            Self::RecordingTranslate => write!(f, "RecordingTranslate"),
            Self::Processing => write!(f, "Processing"),
            Self::Translating => write!(f, "Translating"),
            Self::Warning(_) => write!(f, "Warning"),
            Self::Error(_) => write!(f, "Error"),
        }
    }
}

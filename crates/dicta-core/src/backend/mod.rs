//! Speech-recognition and translation backends.
//!
//! Backends are traits so the pipeline can be tested without a network;
//! the production implementations speak the OpenAI-compatible HTTP APIs.

mod remote;
mod translate;

pub use remote::RemoteSpeechBackend;
pub use translate::ChatTranslator;

use std::time::Duration;

use crate::timeout::CancelToken;

/// Hard deadline for a single speech-recognition HTTP call.
pub const ASR_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Hard deadline for the whole stop-to-injection pipeline, including
/// translation.
pub const PIPELINE_TIMEOUT: Duration = Duration::from_secs(20);

/// Whether the backend should transcribe verbatim or translate to English.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechMode {
    Transcribe,
    Translate,
}

impl SpeechMode {
    /// Endpoint path segment in the OpenAI-compatible audio API.
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::Transcribe => "transcriptions",
            Self::Translate => "translations",
        }
    }
}

/// Speech-recognition backend.
///
/// Takes ownership of the audio buffer so it is released in all cases.
/// An empty `Ok` text means the backend heard nothing usable; transport
/// and API failures are errors.
pub trait SpeechBackend: Send + Sync {
    fn process_audio(
        &self,
        audio: Vec<u8>,
        mode: SpeechMode,
        prompt: &str,
        cancel: &CancelToken,
    ) -> anyhow::Result<String>;
}

/// Text translation backend, used after transcription in translate mode.
pub trait Translator: Send + Sync {
    fn translate(&self, text: &str) -> anyhow::Result<String>;
}

pub mod audio;
pub mod backend;
pub mod clipboard;
pub mod config;
pub mod error;
pub mod hold;
pub mod inject;
pub mod keys;
pub mod machine;
pub mod pipeline;
pub mod state;
pub mod timeout;

pub use audio::{CpalRecorder, Recorder, RecordingOutput};
pub use backend::{ChatTranslator, RemoteSpeechBackend, SpeechBackend, SpeechMode, Translator};
pub use clipboard::{ClipboardBackend, ClipboardGuard, SharedClipboard, SystemClipboard};
pub use config::{Config, HostPlatform};
pub use error::DictationError;
pub use inject::{EnigoSink, HostContext, KeySink, TextInjector};
pub use keys::{KeyBindings, PasteModifier, parse_key};
pub use machine::{DictationHooks, InputStateMachine, MESSAGE_DISPLAY, MachineOptions};
pub use pipeline::TranscriptionPipeline;
pub use state::InputState;
pub use timeout::{CancelToken, run_with_timeout};

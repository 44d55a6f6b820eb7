//! Microphone capture.

mod recorder;

pub use recorder::{CpalRecorder, Recorder, RecordingOutput};

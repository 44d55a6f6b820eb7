//! Error taxonomy for the dictation engine.
//!
//! Fatal errors (`Config`, `Permission`) abort startup; everything else is
//! recoverable and surfaced to the user as transient status text while the
//! engine keeps listening for the next key press.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DictationError {
    /// Invalid configuration, fatal at startup.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The OS denied input monitoring or microphone access, fatal.
    #[error("missing OS permission: {0}")]
    Permission(String),

    /// A backend call exceeded its deadline. Recoverable.
    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// HTTP/transport failure or malformed backend response. Recoverable.
    #[error("{0}")]
    Backend(String),
}

impl DictationError {
    /// Fatal errors terminate the process; recoverable ones become
    /// transient status text and the state machine reverts to idle.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Permission(_))
    }
}

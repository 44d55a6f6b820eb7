//! Startup configuration.
//!
//! Built once from the environment and passed by reference into every
//! component that needs it; nothing reads the environment after startup.

use std::collections::HashMap;
use std::time::Duration;

use crate::error::DictationError;
use crate::keys::{KeyBindings, PasteModifier};

/// Host platform class, selecting the paste chord modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostPlatform {
    Windows,
    #[default]
    Mac,
}

impl HostPlatform {
    pub fn paste_modifier(self) -> PasteModifier {
        match self {
            Self::Windows => PasteModifier::Control,
            Self::Mac => PasteModifier::Command,
        }
    }
}

/// Speech-recognition backend endpoint settings.
#[derive(Debug, Clone)]
pub struct AsrConfig {
    /// Base URL; the mode-specific path (`transcriptions` or
    /// `translations`) is appended per call.
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

/// Translation backend endpoint settings.
#[derive(Debug, Clone)]
pub struct TranslateConfig {
    pub url: String,
    pub model: String,
    /// Optional bearer token; local endpoints typically need none.
    pub api_key: Option<String>,
}

/// Immutable application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub bindings: KeyBindings,
    pub platform: HostPlatform,
    /// Restore the user's clipboard after every dictation cycle.
    pub preserve_clipboard: bool,
    /// Minimum key-down duration that counts as a hold gesture.
    pub hold_threshold: Duration,
    /// Recordings shorter than this are dropped without a backend call.
    pub min_recording: Duration,
    pub asr: AsrConfig,
    pub translate: TranslateConfig,
}

const DEFAULT_TRANSCRIBE_KEY: &str = "F8";
const DEFAULT_TRANSLATE_KEY: &str = "F7";
const DEFAULT_HOLD_THRESHOLD_MS: u64 = 300;
const DEFAULT_MIN_RECORDING_MS: u64 = 1000;
const DEFAULT_ASR_URL: &str = "https://api.groq.com/openai/v1/audio";
const DEFAULT_ASR_MODEL: &str = "whisper-large-v3-turbo";
const DEFAULT_TRANSLATE_URL: &str = "http://127.0.0.1:11434/v1/chat/completions";
const DEFAULT_TRANSLATE_MODEL: &str = "llama3.1";

impl Config {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self, DictationError> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(&vars)
    }

    /// Build configuration from an explicit variable map.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, DictationError> {
        let get = |key: &str| vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        let platform = match get("DICTA_PLATFORM") {
            Some("win" | "windows") => HostPlatform::Windows,
            Some("mac" | "macos") | None => HostPlatform::Mac,
            Some(other) => {
                return Err(DictationError::Config(format!(
                    "DICTA_PLATFORM must be \"mac\" or \"win\", got {other:?}"
                )));
            }
        };

        let bindings = KeyBindings::from_names(
            get("DICTA_TRANSCRIBE_KEY").unwrap_or(DEFAULT_TRANSCRIBE_KEY),
            get("DICTA_TRANSLATE_KEY").unwrap_or(DEFAULT_TRANSLATE_KEY),
            platform.paste_modifier(),
        )?;

        let preserve_clipboard = match get("DICTA_PRESERVE_CLIPBOARD") {
            Some(v) => parse_bool("DICTA_PRESERVE_CLIPBOARD", v)?,
            None => true,
        };

        let hold_threshold = Duration::from_millis(parse_ms(
            "DICTA_HOLD_THRESHOLD_MS",
            get("DICTA_HOLD_THRESHOLD_MS"),
            DEFAULT_HOLD_THRESHOLD_MS,
        )?);
        let min_recording = Duration::from_millis(parse_ms(
            "DICTA_MIN_RECORDING_MS",
            get("DICTA_MIN_RECORDING_MS"),
            DEFAULT_MIN_RECORDING_MS,
        )?);

        let asr = AsrConfig {
            base_url: get("DICTA_ASR_URL").unwrap_or(DEFAULT_ASR_URL).to_string(),
            api_key: get("DICTA_ASR_API_KEY")
                .ok_or_else(|| {
                    DictationError::Config("DICTA_ASR_API_KEY is not set".to_string())
                })?
                .to_string(),
            model: get("DICTA_ASR_MODEL")
                .unwrap_or(DEFAULT_ASR_MODEL)
                .to_string(),
        };

        let translate = TranslateConfig {
            url: get("DICTA_TRANSLATE_URL")
                .unwrap_or(DEFAULT_TRANSLATE_URL)
                .to_string(),
            model: get("DICTA_TRANSLATE_MODEL")
                .unwrap_or(DEFAULT_TRANSLATE_MODEL)
                .to_string(),
            api_key: get("DICTA_TRANSLATE_API_KEY").map(str::to_string),
        };

        Ok(Self {
            bindings,
            platform,
            preserve_clipboard,
            hold_threshold,
            min_recording,
            asr,
            translate,
        })
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, DictationError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(DictationError::Config(format!(
            "{key} must be true or false, got {value:?}"
        ))),
    }
}

fn parse_ms(key: &str, value: Option<&str>, default: u64) -> Result<u64, DictationError> {
    match value {
        None => Ok(default),
        Some(v) => v
            .parse::<u64>()
            .map_err(|_| DictationError::Config(format!("{key} must be milliseconds, got {v:?}"))),
    }
}

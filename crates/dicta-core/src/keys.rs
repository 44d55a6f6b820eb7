//! Logical key names and trigger bindings.
//!
//! Bindings are parsed once at startup from logical names ("F8", "Space",
//! "a"); an unknown name is a fatal configuration error.

use crate::error::DictationError;

/// Modifier used for the paste chord, selected by host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasteModifier {
    /// Ctrl+V hosts (Windows-class, Linux).
    Control,
    /// Cmd+V hosts (Mac-class).
    Command,
}

/// Immutable trigger-key configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyBindings {
    /// Held to record; released to transcribe.
    pub transcribe_key: rdev::Key,
    /// Held together with the transcribe key to select translate mode.
    pub translate_modifier_key: rdev::Key,
    /// Platform paste modifier used by clipboard-paste injection.
    pub paste_modifier: PasteModifier,
}

impl KeyBindings {
    pub fn from_names(
        transcribe: &str,
        translate: &str,
        paste_modifier: PasteModifier,
    ) -> Result<Self, DictationError> {
        let transcribe_key = parse_key(transcribe).ok_or_else(|| {
            DictationError::Config(format!("unknown transcribe key name: {transcribe:?}"))
        })?;
        let translate_modifier_key = parse_key(translate).ok_or_else(|| {
            DictationError::Config(format!("unknown translate key name: {translate:?}"))
        })?;
        if transcribe_key == translate_modifier_key {
            return Err(DictationError::Config(format!(
                "transcribe and translate keys must differ (both {transcribe:?})"
            )));
        }
        Ok(Self {
            transcribe_key,
            translate_modifier_key,
            paste_modifier,
        })
    }
}

/// Parse a logical key name into an [`rdev::Key`].
///
/// Supports F1–F12, common named keys, and single ASCII letters. Returns
/// `None` for unrecognised names so callers can fail with a config error.
pub fn parse_key(name: &str) -> Option<rdev::Key> {
    use rdev::Key;

    match name {
        "F1" => Some(Key::F1),
        "F2" => Some(Key::F2),
        "F3" => Some(Key::F3),
        "F4" => Some(Key::F4),
        "F5" => Some(Key::F5),
        "F6" => Some(Key::F6),
        "F7" => Some(Key::F7),
        "F8" => Some(Key::F8),
        "F9" => Some(Key::F9),
        "F10" => Some(Key::F10),
        "F11" => Some(Key::F11),
        "F12" => Some(Key::F12),

        "Escape" | "Esc" => Some(Key::Escape),
        "Space" => Some(Key::Space),
        "Return" | "Enter" => Some(Key::Return),
        "Tab" => Some(Key::Tab),
        "CapsLock" => Some(Key::CapsLock),
        "Alt" | "Option" => Some(Key::Alt),
        "AltGr" | "RightAlt" => Some(Key::AltGr),
        "Shift" | "LeftShift" => Some(Key::ShiftLeft),
        "RightShift" => Some(Key::ShiftRight),
        "Control" | "Ctrl" | "LeftControl" => Some(Key::ControlLeft),
        "RightControl" => Some(Key::ControlRight),
        "Meta" | "Cmd" | "Command" | "Super" => Some(Key::MetaLeft),

        other if other.len() == 1 => {
            let c = other.chars().next()?;
            letter_key(c.to_ascii_lowercase())
        }
        _ => None,
    }
}

fn letter_key(c: char) -> Option<rdev::Key> {
    use rdev::Key;

    match c {
        'a' => Some(Key::KeyA),
        'b' => Some(Key::KeyB),
        'c' => Some(Key::KeyC),
        'd' => Some(Key::KeyD),
        'e' => Some(Key::KeyE),
        'f' => Some(Key::KeyF),
        'g' => Some(Key::KeyG),
        'h' => Some(Key::KeyH),
        'i' => Some(Key::KeyI),
        'j' => Some(Key::KeyJ),
        'k' => Some(Key::KeyK),
        'l' => Some(Key::KeyL),
        'm' => Some(Key::KeyM),
        'n' => Some(Key::KeyN),
        'o' => Some(Key::KeyO),
        'p' => Some(Key::KeyP),
        'q' => Some(Key::KeyQ),
        'r' => Some(Key::KeyR),
        's' => Some(Key::KeyS),
        't' => Some(Key::KeyT),
        'u' => Some(Key::KeyU),
        'v' => Some(Key::KeyV),
        'w' => Some(Key::KeyW),
        'x' => Some(Key::KeyX),
        'y' => Some(Key::KeyY),
        'z' => Some(Key::KeyZ),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_function_keys() {
        assert_eq!(parse_key("F8"), Some(rdev::Key::F8));
        assert_eq!(parse_key("F1"), Some(rdev::Key::F1));
        assert_eq!(parse_key("F12"), Some(rdev::Key::F12));
    }

    #[test]
    fn parse_named_keys() {
        assert_eq!(parse_key("Escape"), Some(rdev::Key::Escape));
        assert_eq!(parse_key("Option"), Some(rdev::Key::Alt));
        assert_eq!(parse_key("Shift"), Some(rdev::Key::ShiftLeft));
        assert_eq!(parse_key("Cmd"), Some(rdev::Key::MetaLeft));
    }

    #[test]
    fn parse_letters_case_insensitive() {
        assert_eq!(parse_key("a"), Some(rdev::Key::KeyA));
        assert_eq!(parse_key("A"), Some(rdev::Key::KeyA));
        assert_eq!(parse_key("z"), Some(rdev::Key::KeyZ));
    }

    #[test]
    fn parse_unknown_returns_none() {
        assert_eq!(parse_key("xyz"), None);
        assert_eq!(parse_key(""), None);
        assert_eq!(parse_key("Ctrl+V"), None);
    }

    #[test]
    fn bindings_reject_unknown_names() {
        let err = KeyBindings::from_names("NoSuchKey", "F7", PasteModifier::Control).unwrap_err();
        assert!(matches!(err, DictationError::Config(_)));
    }

    #[test]
    fn bindings_reject_identical_keys() {
        let err = KeyBindings::from_names("F8", "F8", PasteModifier::Control).unwrap_err();
        assert!(matches!(err, DictationError::Config(_)));
    }
}

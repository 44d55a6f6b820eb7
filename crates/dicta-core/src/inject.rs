//! Text injection into the focused application.
//!
//! Two strategies, selected by detected host context: per-character key
//! simulation for terminal-like hosts, clipboard paste for GUI hosts. The
//! guess is advisory; both strategies are safe when it is wrong, and each
//! falls back to the other once on failure.

use std::thread;
use std::time::Duration;

use anyhow::Result;
use enigo::{Direction, Enigo, Key, Keyboard, Settings};
use tracing::{debug, warn};

use crate::clipboard::SharedClipboard;
use crate::keys::PasteModifier;

/// Keys the injector taps besides literal characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKey {
    Space,
    Enter,
    Tab,
    Backspace,
}

/// Low-level keyboard simulation surface. Trait so tests capture events
/// instead of driving the real input queue.
pub trait KeySink: Send {
    fn tap_char(&mut self, c: char) -> Result<()>;
    fn tap_key(&mut self, key: SinkKey) -> Result<()>;
    fn paste_chord(&mut self, modifier: PasteModifier) -> Result<()>;
}

/// Production sink backed by enigo.
pub struct EnigoSink {
    enigo: Enigo,
}

impl EnigoSink {
    pub fn new() -> Result<Self> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| anyhow::anyhow!("failed to initialise keyboard simulation: {e}"))?;
        Ok(Self { enigo })
    }
}

impl KeySink for EnigoSink {
    fn tap_char(&mut self, c: char) -> Result<()> {
        self.enigo.key(Key::Unicode(c), Direction::Click)?;
        Ok(())
    }

    fn tap_key(&mut self, key: SinkKey) -> Result<()> {
        let key = match key {
            SinkKey::Space => Key::Space,
            SinkKey::Enter => Key::Return,
            SinkKey::Tab => Key::Tab,
            SinkKey::Backspace => Key::Backspace,
        };
        self.enigo.key(key, Direction::Click)?;
        Ok(())
    }

    fn paste_chord(&mut self, modifier: PasteModifier) -> Result<()> {
        let modifier = match modifier {
            PasteModifier::Control => Key::Control,
            PasteModifier::Command => Key::Meta,
        };
        self.enigo.key(modifier, Direction::Press)?;
        let result = self.enigo.key(Key::Unicode('v'), Direction::Click);
        // Release the modifier even if the tap failed, or it stays held.
        self.enigo.key(modifier, Direction::Release)?;
        result?;
        Ok(())
    }
}

/// Detected category of the focused application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostContext {
    /// Terminal-like: inject text character by character.
    Terminal,
    /// General GUI: inject via clipboard paste.
    #[default]
    Gui,
}

impl HostContext {
    /// Guess the host context from the process environment.
    pub fn detect() -> Self {
        const TERMINAL_VARS: &[&str] = &["TERM", "SSH_TTY", "WT_SESSION", "CONEMUANSI"];
        for var in TERMINAL_VARS {
            if std::env::var_os(var).is_some_and(|v| !v.is_empty()) {
                debug!("terminal indicator {var} set, using per-character injection");
                return Self::Terminal;
            }
        }
        Self::Gui
    }
}

/// Marker appended after paste-mode final text so completion is visible,
/// then erased. Two characters: the space and the glyph.
const COMPLETION_MARKER: &str = " ✅";

const CHAR_DELAY: Duration = Duration::from_millis(10);
const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Inserts and removes text at the OS input focus, tracking the exact
/// character length of the currently injected transient span.
pub struct TextInjector {
    sink: Box<dyn KeySink>,
    clipboard: SharedClipboard,
    context: HostContext,
    paste_modifier: PasteModifier,
    transient_len: usize,
    char_delay: Duration,
    settle_delay: Duration,
}

impl TextInjector {
    pub fn new(
        sink: Box<dyn KeySink>,
        clipboard: SharedClipboard,
        context: HostContext,
        paste_modifier: PasteModifier,
    ) -> Self {
        Self {
            sink,
            clipboard,
            context,
            paste_modifier,
            transient_len: 0,
            char_delay: CHAR_DELAY,
            settle_delay: SETTLE_DELAY,
        }
    }

    /// Override pacing delays. Tests set these to zero.
    pub fn with_delays(mut self, char_delay: Duration, settle_delay: Duration) -> Self {
        self.char_delay = char_delay;
        self.settle_delay = settle_delay;
        self
    }

    /// Length in characters of the currently injected transient span.
    pub fn transient_len(&self) -> usize {
        self.transient_len
    }

    /// Erase exactly the previously injected transient span, never more.
    pub fn erase_transient(&mut self) {
        for _ in 0..self.transient_len {
            if let Err(e) = self.sink.tap_key(SinkKey::Backspace) {
                warn!("backspace simulation failed: {e:#}");
                break;
            }
        }
        self.transient_len = 0;
    }

    /// Replace the current transient span with `text`.
    pub fn inject_transient(&mut self, text: &str) {
        self.erase_transient();
        if text.is_empty() {
            return;
        }
        if self.deliver(text) {
            self.transient_len = text.chars().count();
        }
    }

    /// Erase the transient span and inject the final text.
    ///
    /// In paste mode the text carries a completion marker that is erased
    /// again after a settle delay, leaving only the clean final text.
    pub fn inject_final(&mut self, text: &str) {
        self.erase_transient();
        if text.is_empty() {
            return;
        }
        match self.context {
            HostContext::Terminal => {
                self.deliver(text);
            }
            HostContext::Gui => {
                let marked = format!("{text}{COMPLETION_MARKER}");
                if self.deliver(&marked) {
                    thread::sleep(self.settle_delay);
                    self.transient_len = COMPLETION_MARKER.chars().count();
                    self.erase_transient();
                }
            }
        }
    }

    /// Inject `text` via the preferred strategy, falling back to the
    /// other once. Both failing is logged and swallowed.
    fn deliver(&mut self, text: &str) -> bool {
        let paste_first = self.context == HostContext::Gui;
        let first = if paste_first {
            self.paste(text)
        } else {
            self.type_chars(text)
        };
        let Err(e) = first else { return true };
        warn!("text injection failed, falling back: {e:#}");

        let second = if paste_first {
            self.type_chars(text)
        } else {
            self.paste(text)
        };
        match second {
            Ok(()) => true,
            Err(e) => {
                warn!("fallback injection also failed, dropping text: {e:#}");
                false
            }
        }
    }

    fn type_chars(&mut self, text: &str) -> Result<()> {
        for c in text.chars() {
            match c {
                ' ' => self.sink.tap_key(SinkKey::Space)?,
                '\n' => self.sink.tap_key(SinkKey::Enter)?,
                '\t' => self.sink.tap_key(SinkKey::Tab)?,
                _ => self.sink.tap_char(c)?,
            }
            // Small delay keeps the host input queue stable.
            if !self.char_delay.is_zero() {
                thread::sleep(self.char_delay);
            }
        }
        Ok(())
    }

    fn paste(&mut self, text: &str) -> Result<()> {
        self.clipboard.lock().unwrap().set_text(text)?;
        self.sink.paste_chord(self.paste_modifier)
    }
}

#[cfg(test)]
pub(crate) mod test_sink {
    use std::sync::{Arc, Mutex};

    use super::*;

    /// What a captured sink saw, in order.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum SinkEvent {
        Char(char),
        Key(SinkKey),
        /// Paste chord, with the clipboard content at that instant.
        Paste(String),
    }

    /// Test sink that records every simulated key event.
    pub struct RecordingSink {
        pub events: Arc<Mutex<Vec<SinkEvent>>>,
        clipboard: SharedClipboard,
        fail_chars: bool,
    }

    impl RecordingSink {
        pub fn new(clipboard: SharedClipboard) -> (Self, Arc<Mutex<Vec<SinkEvent>>>) {
            let events = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    events: events.clone(),
                    clipboard,
                    fail_chars: false,
                },
                events,
            )
        }

        /// Make per-character taps fail, to exercise the paste fallback.
        pub fn failing_chars(mut self) -> Self {
            self.fail_chars = true;
            self
        }
    }

    impl KeySink for RecordingSink {
        fn tap_char(&mut self, c: char) -> Result<()> {
            if self.fail_chars {
                anyhow::bail!("simulated tap failure");
            }
            self.events.lock().unwrap().push(SinkEvent::Char(c));
            Ok(())
        }

        fn tap_key(&mut self, key: SinkKey) -> Result<()> {
            self.events.lock().unwrap().push(SinkEvent::Key(key));
            Ok(())
        }

        fn paste_chord(&mut self, _modifier: PasteModifier) -> Result<()> {
            let content = self.clipboard.lock().unwrap().get_text()?;
            self.events.lock().unwrap().push(SinkEvent::Paste(content));
            Ok(())
        }
    }

    /// Replay captured events into the text a user would end up seeing.
    pub fn visible_text(events: &[SinkEvent]) -> String {
        let mut out = String::new();
        for event in events {
            match event {
                SinkEvent::Char(c) => out.push(*c),
                SinkEvent::Key(SinkKey::Space) => out.push(' '),
                SinkEvent::Key(SinkKey::Enter) => out.push('\n'),
                SinkEvent::Key(SinkKey::Tab) => out.push('\t'),
                SinkEvent::Key(SinkKey::Backspace) => {
                    out.pop();
                }
                SinkEvent::Paste(text) => out.push_str(text),
            }
        }
        out
    }
}

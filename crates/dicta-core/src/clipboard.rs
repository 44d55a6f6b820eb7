//! Scoped save/restore of the host clipboard around text injection.

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use arboard::Clipboard;
use tracing::{debug, warn};

/// Minimal clipboard surface, kept as a trait so tests run headless.
pub trait ClipboardBackend: Send {
    fn get_text(&mut self) -> Result<String>;
    fn set_text(&mut self, text: &str) -> Result<()>;
}

/// Shared handle used by both the guard and the paste-mode injector.
pub type SharedClipboard = Arc<Mutex<dyn ClipboardBackend>>;

/// System clipboard via arboard. A fresh handle is opened per operation;
/// some platform backends do not tolerate long-lived connections shared
/// across threads.
pub struct SystemClipboard;

impl SystemClipboard {
    pub fn new() -> Result<SharedClipboard> {
        // Probe once so a missing clipboard surface fails at startup.
        Clipboard::new().context("failed to access clipboard")?;
        Ok(Arc::new(Mutex::new(Self)))
    }
}

impl ClipboardBackend for SystemClipboard {
    fn get_text(&mut self) -> Result<String> {
        Clipboard::new()
            .context("failed to access clipboard")?
            .get_text()
            .context("failed to read clipboard")
    }

    fn set_text(&mut self, text: &str) -> Result<()> {
        Clipboard::new()
            .context("failed to access clipboard")?
            .set_text(text)
            .context("failed to copy text to clipboard")
    }
}

/// Holds at most one snapshot of the clipboard for the duration of one
/// injection sequence. A second save while one is pending is a no-op;
/// restore writes the snapshot back and clears it.
pub struct ClipboardGuard {
    clipboard: SharedClipboard,
    snapshot: Option<String>,
}

impl ClipboardGuard {
    pub fn new(clipboard: SharedClipboard) -> Self {
        Self {
            clipboard,
            snapshot: None,
        }
    }

    pub fn has_snapshot(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Snapshot the current clipboard content. First save wins.
    ///
    /// An unreadable clipboard (empty on some platforms) is treated as
    /// empty text rather than an error, so a cycle never aborts here.
    pub fn save(&mut self) {
        if self.snapshot.is_some() {
            return;
        }
        let content = match self.clipboard.lock().unwrap().get_text() {
            Ok(text) => text,
            Err(e) => {
                debug!("clipboard read failed, snapshotting empty text: {e:#}");
                String::new()
            }
        };
        self.snapshot = Some(content);
    }

    /// Write the snapshot back and clear it. The snapshot is cleared even
    /// if the write fails so it can never get stuck.
    pub fn restore(&mut self) {
        let Some(content) = self.snapshot.take() else {
            return;
        };
        if let Err(e) = self.clipboard.lock().unwrap().set_text(&content) {
            warn!("failed to restore clipboard: {e:#}");
        }
    }

    /// Drop the snapshot without writing it back. Used when the final text
    /// is configured to stay on the clipboard.
    pub fn discard(&mut self) {
        self.snapshot = None;
    }
}

#[cfg(test)]
pub(crate) struct MemoryClipboard {
    pub content: String,
}

#[cfg(test)]
impl MemoryClipboard {
    pub fn shared(initial: &str) -> SharedClipboard {
        Arc::new(Mutex::new(Self {
            content: initial.to_string(),
        }))
    }
}

#[cfg(test)]
impl ClipboardBackend for MemoryClipboard {
    fn get_text(&mut self) -> Result<String> {
        Ok(self.content.clone())
    }

    fn set_text(&mut self, text: &str) -> Result<()> {
        self.content = text.to_string();
        Ok(())
    }
}

//! Global key listener backed by `rdev`.
//!
//! `rdev::listen()` is a blocking OS-level call that never returns while
//! the process is alive, so it runs on a dedicated thread. The callback
//! only forwards key transitions over an unbounded channel; all real work
//! happens on the dispatcher side, so key events are never delayed by
//! backends or timers.

use std::thread;
use std::time::Duration;

use anyhow::{Result, anyhow};
use crossbeam_channel::{RecvTimeoutError, Sender};
use tracing::info;

/// Raw key transitions forwarded to the state machine dispatcher.
#[derive(Debug, Clone, Copy)]
pub enum KeySignal {
    Down(rdev::Key),
    Up(rdev::Key),
}

/// Start the OS key listener on a dedicated thread.
///
/// A listener that fails to start (usually a missing input-monitoring
/// permission) reports back within a short startup window; after that the
/// thread lives until process exit, since rdev has no shutdown API.
pub fn spawn_listener(tx: Sender<KeySignal>) -> Result<()> {
    let (startup_tx, startup_rx) = crossbeam_channel::bounded::<String>(1);

    thread::Builder::new()
        .name("dicta-key-listener".to_string())
        .spawn(move || {
            let result = rdev::listen(move |event| {
                let signal = match event.event_type {
                    rdev::EventType::KeyPress(key) => Some(KeySignal::Down(key)),
                    rdev::EventType::KeyRelease(key) => Some(KeySignal::Up(key)),
                    _ => None,
                };
                if let Some(signal) = signal {
                    let _ = tx.send(signal);
                }
            });
            if let Err(e) = result {
                let _ = startup_tx.send(format!("{e:?}"));
            }
        })?;

    // rdev::listen blocks forever on success; no error within the window
    // means the grab is up.
    match startup_rx.recv_timeout(Duration::from_millis(500)) {
        Ok(error) => Err(anyhow!("failed to start key listener: {error}")),
        Err(RecvTimeoutError::Timeout) => {
            info!("key listener started");
            Ok(())
        }
        Err(RecvTimeoutError::Disconnected) => {
            Err(anyhow!("key listener thread exited unexpectedly"))
        }
    }
}

//! Hard wall-clock deadlines for backend calls.
//!
//! The work runs on its own thread; the caller waits up to the deadline.
//! On expiry the worker is abandoned rather than interrupted, but the
//! cancel token it received is flipped so a well-behaved backend can stop
//! early. Abandoned workers are bounded by call frequency, which is
//! user-triggered and low.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use tracing::warn;

use crate::error::DictationError;

/// Cooperative cancellation flag handed to timeout-guarded work.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Run `work` with a hard deadline.
///
/// Returns the work's own result if it finishes in time. If the deadline
/// elapses first the caller gets [`DictationError::Timeout`] and the
/// worker thread keeps running detached. A [`DictationError`] raised by
/// the work itself passes through unchanged; any other failure is folded
/// into [`DictationError::Backend`].
pub fn run_with_timeout<T, F>(
    label: &str,
    timeout: Duration,
    work: F,
) -> Result<T, DictationError>
where
    T: Send + 'static,
    F: FnOnce(&CancelToken) -> anyhow::Result<T> + Send + 'static,
{
    let token = CancelToken::new();
    let worker_token = token.clone();
    let (tx, rx) = crossbeam_channel::bounded(1);

    let builder = thread::Builder::new().name(format!("dicta-{label}"));
    let spawned = builder.spawn(move || {
        let _ = tx.send(work(&worker_token));
    });
    if let Err(e) = spawned {
        return Err(DictationError::Backend(format!(
            "failed to spawn {label} worker: {e}"
        )));
    }

    match rx.recv_timeout(timeout) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(match e.downcast::<DictationError>() {
            Ok(inner) => inner,
            Err(e) => DictationError::Backend(format!("{e:#}")),
        }),
        Err(RecvTimeoutError::Timeout) => {
            token.cancel();
            warn!("{label} exceeded {}s deadline, abandoning worker", timeout.as_secs());
            Err(DictationError::Timeout(timeout))
        }
        Err(RecvTimeoutError::Disconnected) => Err(DictationError::Backend(format!(
            "{label} worker exited without a result"
        ))),
    }
}

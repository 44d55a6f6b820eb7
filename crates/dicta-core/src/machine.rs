//! The input state machine.
//!
//! Receives raw key events, drives tap/hold disambiguation, injects status
//! text, and fires lifecycle hooks. All shared mutable state (current
//! state, hold session, transient text length, clipboard snapshot) lives
//! behind one mutex; key events, the hold poller, the message-revert timer
//! and backend workers all serialize through it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::clipboard::{ClipboardGuard, SharedClipboard};
use crate::hold::{self, HoldDecision, HoldSession, POLL_INTERVAL};
use crate::inject::TextInjector;
use crate::keys::KeyBindings;
use crate::state::InputState;

/// How long transient warning/error messages stay visible.
pub const MESSAGE_DISPLAY: Duration = Duration::from_secs(2);

const REVERT_TICK: Duration = Duration::from_millis(25);

/// Lifecycle capabilities the machine drives. Implemented by the
/// transcription pipeline in production and by test doubles in tests.
pub trait DictationHooks: Send + Sync {
    /// Recording for transcription has started.
    fn start_transcribe(&self);
    /// Recording finished; transcribe and inject the result.
    fn stop_transcribe(&self);
    /// Recording for translation has started.
    fn start_translate(&self);
    /// Recording finished; transcribe, translate and inject the result.
    fn stop_translate(&self);
    /// The machine was reset; drop any in-flight work.
    fn reset(&self);
}

/// Tuning for the state machine.
#[derive(Debug, Clone)]
pub struct MachineOptions {
    pub bindings: KeyBindings,
    pub hold_threshold: Duration,
    pub revert_after: Duration,
    pub poll_interval: Duration,
    pub preserve_clipboard: bool,
}

impl MachineOptions {
    pub fn new(bindings: KeyBindings) -> Self {
        Self {
            bindings,
            hold_threshold: Duration::from_millis(300),
            revert_after: MESSAGE_DISPLAY,
            poll_interval: POLL_INTERVAL,
            preserve_clipboard: true,
        }
    }

    pub fn with_hold_threshold(mut self, threshold: Duration) -> Self {
        self.hold_threshold = threshold;
        self
    }

    pub fn with_revert_after(mut self, revert_after: Duration) -> Self {
        self.revert_after = revert_after;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_preserve_clipboard(mut self, preserve: bool) -> Self {
        self.preserve_clipboard = preserve;
        self
    }
}

/// Which lifecycle hook a transition asks to fire. Hooks run after the
/// state lock is released.
enum HookCall {
    StartTranscribe,
    StopTranscribe,
    StartTranslate,
    StopTranslate,
}

struct MachineInner {
    state: InputState,
    session: Option<HoldSession>,
    /// Physical translate-modifier state, tracked so a modifier pressed
    /// before the trigger key still selects translate mode.
    modifier_down: bool,
    injector: TextInjector,
    guard: ClipboardGuard,
    clipboard: SharedClipboard,
}

struct Shared {
    inner: Mutex<MachineInner>,
    hooks: Mutex<Option<Arc<dyn DictationHooks>>>,
    /// Bumped on every state change; pending revert timers compare it to
    /// know they are stale.
    epoch: AtomicU64,
    options: MachineOptions,
}

/// Cheaply cloneable handle to the state machine.
#[derive(Clone)]
pub struct InputStateMachine {
    shared: Arc<Shared>,
}

impl InputStateMachine {
    pub fn new(
        options: MachineOptions,
        injector: TextInjector,
        clipboard: SharedClipboard,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(MachineInner {
                    state: InputState::Idle,
                    session: None,
                    modifier_down: false,
                    injector,
                    guard: ClipboardGuard::new(clipboard.clone()),
                    clipboard,
                }),
                hooks: Mutex::new(None),
                epoch: AtomicU64::new(0),
                options,
            }),
        }
    }

    /// Wire the lifecycle hooks. Called once after the pipeline exists;
    /// events before that are dropped.
    pub fn set_hooks(&self, hooks: Arc<dyn DictationHooks>) {
        *self.shared.hooks.lock().unwrap() = Some(hooks);
    }

    pub fn state(&self) -> InputState {
        self.shared.inner.lock().unwrap().state.clone()
    }

    /// Handle a raw key-down event. Non-binding keys are ignored.
    pub fn on_key_down(&self, key: rdev::Key) {
        let bindings = self.shared.options.bindings;
        if key == bindings.transcribe_key {
            let started = {
                let mut inner = self.shared.inner.lock().unwrap();
                if inner.session.is_some() {
                    // OS auto-repeat while held; the first press rules.
                    false
                } else {
                    inner.guard.save();
                    let modifier_down = inner.modifier_down;
                    inner.session = Some(HoldSession::new(modifier_down));
                    true
                }
            };
            if started {
                self.spawn_hold_poller();
            }
        } else if key == bindings.translate_modifier_key {
            let mut inner = self.shared.inner.lock().unwrap();
            inner.modifier_down = true;
            if let Some(session) = inner.session.as_mut() {
                session.modifier_held = true;
            }
        }
    }

    /// Handle a raw key-up event. Key-ups without a matching session are
    /// absorbed; spurious OS events are expected.
    pub fn on_key_up(&self, key: rdev::Key) {
        let bindings = self.shared.options.bindings;
        if key == bindings.transcribe_key {
            let hook = {
                let mut inner = self.shared.inner.lock().unwrap();
                inner.modifier_down = false;
                let Some(session) = inner.session.take() else {
                    return;
                };
                if !session.triggered {
                    debug!("tap below hold threshold, ignoring");
                    None
                } else {
                    match inner.state {
                        InputState::RecordingTranslate => {
                            self.transition_locked(&mut inner, InputState::Translating)
                        }
                        InputState::Recording => {
                            self.transition_locked(&mut inner, InputState::Processing)
                        }
                        _ => None,
                    }
                }
            };
            self.fire(hook);
        } else if key == bindings.translate_modifier_key {
            let hook = {
                let mut inner = self.shared.inner.lock().unwrap();
                inner.modifier_down = false;
                if let Some(session) = inner.session.as_mut() {
                    // Releasing the modifier alone never stops recording;
                    // only the trigger key ends the gesture.
                    session.modifier_held = false;
                    None
                } else if inner.state == InputState::RecordingTranslate {
                    // Trigger key already released and its key-up was lost
                    // or reordered; complete the gesture here.
                    self.transition_locked(&mut inner, InputState::Translating)
                } else {
                    None
                }
            };
            self.fire(hook);
        }
    }

    /// Enter `new_state`. A transition to the current state is a no-op and
    /// re-fires no side effects.
    pub fn transition(&self, new_state: InputState) {
        let hook = {
            let mut inner = self.shared.inner.lock().unwrap();
            self.transition_locked(&mut inner, new_state)
        };
        self.fire(hook);
    }

    pub fn show_warning(&self, message: impl Into<String>) {
        self.transition(InputState::Warning(message.into()));
    }

    pub fn show_error(&self, message: impl Into<String>) {
        self.transition(InputState::Error(message.into()));
    }

    /// Erase transient text, restore the clipboard, clear all session
    /// state and force `Idle`. Safe from any state, including mid-hold.
    pub fn reset_state(&self) {
        {
            let mut inner = self.shared.inner.lock().unwrap();
            inner.injector.erase_transient();
            inner.guard.restore();
            inner.session = None;
            inner.modifier_down = false;
            if inner.state != InputState::Idle {
                self.transition_locked(&mut inner, InputState::Idle);
            }
        }
        let hooks = self.shared.hooks.lock().unwrap().clone();
        if let Some(hooks) = hooks {
            hooks.reset();
        }
    }

    /// Erase the transient span, inject the final text and return to
    /// `Idle`. The clipboard is restored (default) or left holding the
    /// final text when the configuration says not to preserve it.
    pub fn inject_final(&self, text: &str) {
        let mut inner = self.shared.inner.lock().unwrap();
        inner.injector.inject_final(text);
        if self.shared.options.preserve_clipboard {
            inner.guard.restore();
        } else {
            if let Err(e) = inner.clipboard.lock().unwrap().set_text(text) {
                warn!("failed to leave final text on clipboard: {e:#}");
            }
            inner.guard.discard();
        }
        self.transition_locked(&mut inner, InputState::Idle);
    }

    fn transition_locked(
        &self,
        inner: &mut MachineInner,
        new_state: InputState,
    ) -> Option<HookCall> {
        if inner.state == new_state {
            return None;
        }
        info!(from = %inner.state, to = %new_state, "state transition");
        inner.state = new_state;
        self.shared.epoch.fetch_add(1, Ordering::SeqCst);

        let status = inner.state.status_text();
        match inner.state {
            InputState::Recording => {
                inner.injector.inject_transient(&status.unwrap_or_default());
                Some(HookCall::StartTranscribe)
            }
            InputState::RecordingTranslate => {
                inner.injector.inject_transient(&status.unwrap_or_default());
                Some(HookCall::StartTranslate)
            }
            InputState::Processing => {
                inner.injector.inject_transient(&status.unwrap_or_default());
                Some(HookCall::StopTranscribe)
            }
            InputState::Translating => {
                inner.injector.inject_transient(&status.unwrap_or_default());
                Some(HookCall::StopTranslate)
            }
            InputState::Warning(_) | InputState::Error(_) => {
                inner.injector.inject_transient(&status.unwrap_or_default());
                self.schedule_revert(self.shared.epoch.load(Ordering::SeqCst));
                None
            }
            InputState::Idle => None,
        }
    }

    /// Spawn the per-message timer that reverts a transient warning/error
    /// back to `Idle` after the display duration, unless a newer
    /// transition superseded it.
    fn schedule_revert(&self, epoch: u64) {
        let machine = self.clone();
        let spawned = thread::Builder::new()
            .name("dicta-revert".to_string())
            .spawn(move || {
                let started = Instant::now();
                while started.elapsed() < machine.shared.options.revert_after {
                    thread::sleep(REVERT_TICK);
                    if machine.shared.epoch.load(Ordering::SeqCst) != epoch {
                        return;
                    }
                }
                let mut inner = machine.shared.inner.lock().unwrap();
                if machine.shared.epoch.load(Ordering::SeqCst) != epoch {
                    return;
                }
                if matches!(inner.state, InputState::Warning(_) | InputState::Error(_)) {
                    inner.injector.erase_transient();
                    machine.transition_locked(&mut inner, InputState::Idle);
                }
            });
        if let Err(e) = spawned {
            warn!("failed to spawn revert timer: {e}");
        }
    }

    /// Spawn the per-press poller that watches for the hold threshold.
    fn spawn_hold_poller(&self) {
        let machine = self.clone();
        let spawned = thread::Builder::new()
            .name("dicta-hold-poller".to_string())
            .spawn(move || {
                loop {
                    thread::sleep(machine.shared.options.poll_interval);
                    if !machine.poll_hold() {
                        break;
                    }
                }
            });
        if let Err(e) = spawned {
            warn!("failed to spawn hold poller: {e}");
        }
    }

    /// One poller tick. Returns false once polling should stop: the key
    /// was released, or the trigger latched (exactly once per press).
    fn poll_hold(&self) -> bool {
        let hook = {
            let mut inner = self.shared.inner.lock().unwrap();
            let decision = hold::evaluate(
                inner.session.as_ref(),
                &inner.state,
                self.shared.options.hold_threshold,
                Instant::now(),
            );
            match decision {
                HoldDecision::KeepPolling => return true,
                HoldDecision::StopPolling => return false,
                HoldDecision::Trigger { translate } => {
                    if let Some(session) = inner.session.as_mut() {
                        session.triggered = true;
                    }
                    let target = if translate {
                        InputState::RecordingTranslate
                    } else {
                        InputState::Recording
                    };
                    self.transition_locked(&mut inner, target)
                }
            }
        };
        self.fire(hook);
        false
    }

    fn fire(&self, call: Option<HookCall>) {
        let Some(call) = call else { return };
        let hooks = self.shared.hooks.lock().unwrap().clone();
        let Some(hooks) = hooks else {
            debug!("lifecycle hook fired before pipeline was wired, dropping");
            return;
        };
        match call {
            HookCall::StartTranscribe => hooks.start_transcribe(),
            HookCall::StopTranscribe => hooks.stop_transcribe(),
            HookCall::StartTranslate => hooks.start_translate(),
            HookCall::StopTranslate => hooks.stop_translate(),
        }
    }

    #[cfg(test)]
    pub(crate) fn probe(&self) -> (InputState, usize, bool) {
        let inner = self.shared.inner.lock().unwrap();
        (
            inner.state.clone(),
            inner.injector.transient_len(),
            inner.guard.has_snapshot(),
        )
    }
}

//! Transcription pipeline.
//!
//! Consumes the state machine's lifecycle hooks, drives the recorder and
//! the speech/translation backends under hard deadlines, and routes
//! results back into the machine. All stop-side work runs on a spawned
//! worker thread so the key listener is never blocked on a backend.

use std::sync::Arc;
use std::thread;

use tracing::{error, info, warn};

use crate::audio::{Recorder, RecordingOutput};
use crate::backend::{ASR_CALL_TIMEOUT, PIPELINE_TIMEOUT, SpeechBackend, SpeechMode, Translator};
use crate::error::DictationError;
use crate::machine::{DictationHooks, InputStateMachine};
use crate::state::InputState;
use crate::timeout::run_with_timeout;

pub struct TranscriptionPipeline {
    machine: InputStateMachine,
    recorder: Arc<dyn Recorder>,
    backend: Arc<dyn SpeechBackend>,
    translator: Arc<dyn Translator>,
}

impl TranscriptionPipeline {
    pub fn new(
        machine: InputStateMachine,
        recorder: Arc<dyn Recorder>,
        backend: Arc<dyn SpeechBackend>,
        translator: Arc<dyn Translator>,
    ) -> Arc<Self> {
        Arc::new(Self {
            machine,
            recorder,
            backend,
            translator,
        })
    }

    fn start(&self) {
        if let Err(e) = self.recorder.start_recording() {
            error!("failed to start recording: {e:#}");
            self.machine.show_error(format!("❌ {e}"));
        }
    }

    /// Stop the recorder and process the capture on a worker thread.
    fn finish(&self, mode: SpeechMode) {
        let machine = self.machine.clone();
        let recorder = self.recorder.clone();
        let backend = self.backend.clone();
        let translator = self.translator.clone();
        let spawned = thread::Builder::new()
            .name("dicta-pipeline".to_string())
            .spawn(move || run_pipeline(machine, recorder, backend, translator, mode));
        if let Err(e) = spawned {
            error!("failed to spawn pipeline worker: {e}");
            self.machine.reset_state();
        }
    }
}

impl DictationHooks for TranscriptionPipeline {
    fn start_transcribe(&self) {
        self.start();
    }

    fn stop_transcribe(&self) {
        self.finish(SpeechMode::Transcribe);
    }

    fn start_translate(&self) {
        self.start();
    }

    fn stop_translate(&self) {
        self.finish(SpeechMode::Translate);
    }

    fn reset(&self) {
        self.recorder.cancel();
    }
}

fn run_pipeline(
    machine: InputStateMachine,
    recorder: Arc<dyn Recorder>,
    backend: Arc<dyn SpeechBackend>,
    translator: Arc<dyn Translator>,
    mode: SpeechMode,
) {
    let output = match recorder.stop_recording() {
        Ok(output) => output,
        Err(e) => {
            error!("failed to stop recording: {e:#}");
            machine.reset_state();
            return;
        }
    };
    let audio = match output {
        RecordingOutput::Captured(bytes) => bytes,
        RecordingOutput::TooShort => {
            warn!("recording below minimum duration, resetting");
            machine.reset_state();
            return;
        }
        RecordingOutput::Empty => {
            error!("no audio data captured, resetting");
            machine.reset_state();
            return;
        }
    };

    let result = run_with_timeout("pipeline", PIPELINE_TIMEOUT, move |_| {
        let text = run_with_timeout("asr", ASR_CALL_TIMEOUT, {
            let backend = backend.clone();
            move |cancel| backend.process_audio(audio, mode, "", cancel)
        })?;
        if mode == SpeechMode::Translate && !text.trim().is_empty() {
            Ok(translator.translate(&text)?)
        } else {
            Ok(text)
        }
    });

    deliver(&machine, result);
}

/// Route a backend result into the machine.
///
/// Results only land while the machine is still waiting for them; a
/// reset or a new gesture in the meantime discards the late result
/// instead of clobbering the newer state.
fn deliver(machine: &InputStateMachine, result: Result<String, DictationError>) {
    if !matches!(
        machine.state(),
        InputState::Processing | InputState::Translating
    ) {
        warn!("machine no longer waiting, discarding backend result");
        return;
    }
    match result {
        Ok(text) if text.trim().is_empty() => {
            // Backends occasionally return empty text for silence even
            // when the duration gate passed.
            machine.show_warning("recording too short, speak for at least 1 second");
        }
        Ok(text) => {
            let text = text.trim();
            info!("injecting {} characters", text.chars().count());
            machine.inject_final(text);
        }
        Err(e) => {
            error!("pipeline failed: {e}");
            machine.show_error(format!("❌ {e}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    use super::*;
    use crate::clipboard::{ClipboardBackend, MemoryClipboard, SharedClipboard};
    use crate::inject::test_sink::{RecordingSink, SinkEvent, visible_text};
    use crate::inject::{HostContext, TextInjector};
    use crate::keys::{KeyBindings, PasteModifier};
    use crate::machine::MachineOptions;
    use crate::timeout::CancelToken;

    const THRESHOLD: Duration = Duration::from_millis(30);
    const REVERT: Duration = Duration::from_millis(120);

    struct MockRecorder {
        output: Mutex<Option<RecordingOutput>>,
        start_fails: AtomicBool,
        starts: AtomicUsize,
        cancels: AtomicUsize,
    }

    impl MockRecorder {
        fn with_output(output: RecordingOutput) -> Arc<Self> {
            Arc::new(Self {
                output: Mutex::new(Some(output)),
                start_fails: AtomicBool::new(false),
                starts: AtomicUsize::new(0),
                cancels: AtomicUsize::new(0),
            })
        }
    }

    impl Recorder for MockRecorder {
        fn start_recording(&self) -> anyhow::Result<()> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            if self.start_fails.load(Ordering::SeqCst) {
                anyhow::bail!("device unavailable");
            }
            Ok(())
        }

        fn stop_recording(&self) -> anyhow::Result<RecordingOutput> {
            Ok(self
                .output
                .lock()
                .unwrap()
                .take()
                .unwrap_or(RecordingOutput::Empty))
        }

        fn cancel(&self) {
            self.cancels.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct MockBackend {
        response: Mutex<Result<String, String>>,
        calls: AtomicUsize,
        last_mode: Mutex<Option<SpeechMode>>,
    }

    impl MockBackend {
        fn ok(text: &str) -> Arc<Self> {
            Arc::new(Self {
                response: Mutex::new(Ok(text.to_string())),
                calls: AtomicUsize::new(0),
                last_mode: Mutex::new(None),
            })
        }

        fn err(message: &str) -> Arc<Self> {
            Arc::new(Self {
                response: Mutex::new(Err(message.to_string())),
                calls: AtomicUsize::new(0),
                last_mode: Mutex::new(None),
            })
        }
    }

    impl SpeechBackend for MockBackend {
        fn process_audio(
            &self,
            _audio: Vec<u8>,
            mode: SpeechMode,
            _prompt: &str,
            _cancel: &CancelToken,
        ) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_mode.lock().unwrap() = Some(mode);
            match &*self.response.lock().unwrap() {
                Ok(text) => Ok(text.clone()),
                Err(message) => anyhow::bail!("{message}"),
            }
        }
    }

    struct MockTranslator {
        calls: AtomicUsize,
        fails: AtomicBool,
    }

    impl MockTranslator {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fails: AtomicBool::new(false),
            })
        }
    }

    impl Translator for MockTranslator {
        fn translate(&self, text: &str) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fails.load(Ordering::SeqCst) {
                anyhow::bail!("translation backend unreachable");
            }
            Ok(format!("english: {text}"))
        }
    }

    struct Fixture {
        machine: InputStateMachine,
        recorder: Arc<MockRecorder>,
        backend: Arc<MockBackend>,
        translator: Arc<MockTranslator>,
        events: Arc<Mutex<Vec<SinkEvent>>>,
        clipboard: SharedClipboard,
    }

    fn fixture(recorder: Arc<MockRecorder>, backend: Arc<MockBackend>) -> Fixture {
        let clipboard = MemoryClipboard::shared("original");
        let (sink, events) = RecordingSink::new(clipboard.clone());
        let injector = TextInjector::new(
            Box::new(sink),
            clipboard.clone(),
            HostContext::Terminal,
            PasteModifier::Control,
        )
        .with_delays(Duration::ZERO, Duration::ZERO);

        let bindings = KeyBindings::from_names("F8", "F7", PasteModifier::Control).unwrap();
        let machine = InputStateMachine::new(
            MachineOptions::new(bindings)
                .with_hold_threshold(THRESHOLD)
                .with_revert_after(REVERT)
                .with_poll_interval(Duration::from_millis(5)),
            injector,
            clipboard.clone(),
        );
        let translator = MockTranslator::new();
        let pipeline = TranscriptionPipeline::new(
            machine.clone(),
            recorder.clone(),
            backend.clone(),
            translator.clone(),
        );
        machine.set_hooks(pipeline);
        Fixture {
            machine,
            recorder,
            backend,
            translator,
            events,
            clipboard,
        }
    }

    fn wait_until(machine: &InputStateMachine, pred: impl Fn(&InputState) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            if pred(&machine.state()) {
                return;
            }
            assert!(Instant::now() < deadline, "timed out waiting for state");
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn hold_and_release(machine: &InputStateMachine) {
        machine.on_key_down(rdev::Key::F8);
        wait_until(machine, |s| s.is_recording());
        machine.on_key_up(rdev::Key::F8);
    }

    #[test]
    fn full_cycle_injects_transcription_and_restores_clipboard() {
        let f = fixture(
            MockRecorder::with_output(RecordingOutput::Captured(vec![0u8; 64])),
            MockBackend::ok("hello world"),
        );

        hold_and_release(&f.machine);
        wait_until(&f.machine, |s| *s == InputState::Idle);

        assert_eq!(visible_text(&f.events.lock().unwrap()), "hello world");
        assert_eq!(f.recorder.starts.load(Ordering::SeqCst), 1);
        assert_eq!(f.backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            *f.backend.last_mode.lock().unwrap(),
            Some(SpeechMode::Transcribe)
        );
        assert_eq!(f.translator.calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            f.clipboard.lock().unwrap().get_text().unwrap(),
            "original"
        );
    }

    #[test]
    fn unicode_result_is_injected_verbatim() {
        let f = fixture(
            MockRecorder::with_output(RecordingOutput::Captured(vec![0u8; 64])),
            MockBackend::ok("你好"),
        );

        hold_and_release(&f.machine);
        wait_until(&f.machine, |s| *s == InputState::Idle);

        let events = f.events.lock().unwrap();
        assert_eq!(visible_text(&events), "你好");
        assert!(!events.iter().any(|e| matches!(e, SinkEvent::Paste(_))));
    }

    #[test]
    fn translate_gesture_pipes_through_translator() {
        let f = fixture(
            MockRecorder::with_output(RecordingOutput::Captured(vec![0u8; 64])),
            MockBackend::ok("bonjour"),
        );

        f.machine.on_key_down(rdev::Key::F7);
        f.machine.on_key_down(rdev::Key::F8);
        wait_until(&f.machine, |s| *s == InputState::RecordingTranslate);
        f.machine.on_key_up(rdev::Key::F8);
        f.machine.on_key_up(rdev::Key::F7);
        wait_until(&f.machine, |s| *s == InputState::Idle);

        assert_eq!(
            *f.backend.last_mode.lock().unwrap(),
            Some(SpeechMode::Translate)
        );
        assert_eq!(f.translator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            visible_text(&f.events.lock().unwrap()),
            "english: bonjour"
        );
    }

    #[test]
    fn too_short_recording_resets_without_backend_call() {
        let f = fixture(
            MockRecorder::with_output(RecordingOutput::TooShort),
            MockBackend::ok("never used"),
        );

        hold_and_release(&f.machine);
        wait_until(&f.machine, |s| *s == InputState::Idle);

        assert_eq!(f.backend.calls.load(Ordering::SeqCst), 0);
        assert!(f.recorder.cancels.load(Ordering::SeqCst) >= 1);
        assert_eq!(visible_text(&f.events.lock().unwrap()), "");
    }

    #[test]
    fn missing_audio_resets_without_backend_call() {
        let f = fixture(
            MockRecorder::with_output(RecordingOutput::Empty),
            MockBackend::ok("never used"),
        );

        hold_and_release(&f.machine);
        wait_until(&f.machine, |s| *s == InputState::Idle);
        assert_eq!(f.backend.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn backend_error_becomes_transient_error_then_idle() {
        let f = fixture(
            MockRecorder::with_output(RecordingOutput::Captured(vec![0u8; 64])),
            MockBackend::err("rate limited"),
        );

        hold_and_release(&f.machine);
        wait_until(&f.machine, |s| matches!(s, InputState::Error(_)));

        match f.machine.state() {
            InputState::Error(message) => assert!(message.contains("rate limited")),
            other => panic!("expected error state, got {other:?}"),
        }

        wait_until(&f.machine, |s| *s == InputState::Idle);
        assert_eq!(visible_text(&f.events.lock().unwrap()), "");
    }

    #[test]
    fn empty_transcription_shows_too_short_warning() {
        let f = fixture(
            MockRecorder::with_output(RecordingOutput::Captured(vec![0u8; 64])),
            MockBackend::ok("   "),
        );

        hold_and_release(&f.machine);
        wait_until(&f.machine, |s| matches!(s, InputState::Warning(_)));

        match f.machine.state() {
            InputState::Warning(message) => assert!(message.contains("too short")),
            other => panic!("expected warning state, got {other:?}"),
        }
    }

    #[test]
    fn translation_failure_surfaces_as_pipeline_error() {
        let f = fixture(
            MockRecorder::with_output(RecordingOutput::Captured(vec![0u8; 64])),
            MockBackend::ok("hola"),
        );
        f.translator.fails.store(true, Ordering::SeqCst);

        f.machine.on_key_down(rdev::Key::F7);
        f.machine.on_key_down(rdev::Key::F8);
        wait_until(&f.machine, |s| *s == InputState::RecordingTranslate);
        f.machine.on_key_up(rdev::Key::F8);
        f.machine.on_key_up(rdev::Key::F7);

        wait_until(&f.machine, |s| matches!(s, InputState::Error(_)));
        match f.machine.state() {
            InputState::Error(message) => assert!(message.contains("translation")),
            other => panic!("expected error state, got {other:?}"),
        }
    }

    #[test]
    fn failed_recorder_start_shows_error() {
        let recorder = MockRecorder::with_output(RecordingOutput::Empty);
        recorder.start_fails.store(true, Ordering::SeqCst);
        let f = fixture(recorder, MockBackend::ok("unused"));

        f.machine.on_key_down(rdev::Key::F8);
        wait_until(&f.machine, |s| matches!(s, InputState::Error(_)));
        f.machine.on_key_up(rdev::Key::F8);
        wait_until(&f.machine, |s| *s == InputState::Idle);
    }
}

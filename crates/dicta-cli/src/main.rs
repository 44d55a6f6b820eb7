//! dicta: push-to-talk voice dictation.
//!
//! Hold the transcribe key to record, release to transcribe and inject
//! the text at the cursor. Hold the translate modifier alongside to
//! translate into English instead.

mod listener;

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use dicta_core::{
    ChatTranslator, Config, CpalRecorder, EnigoSink, HostContext, InputStateMachine,
    MachineOptions, RemoteSpeechBackend, SystemClipboard, TextInjector, TranscriptionPipeline,
};
use listener::{KeySignal, spawn_listener};

#[derive(Parser)]
#[command(name = "dicta", version, about = "Push-to-talk voice dictation")]
struct Cli {
    /// Load environment variables from this file instead of ./.env
    #[arg(long, value_name = "PATH")]
    env_file: Option<PathBuf>,

    /// Debug-level logging (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    match &cli.env_file {
        Some(path) => {
            if let Err(e) = dotenvy::from_path(path) {
                eprintln!("Error: failed to load {}: {e}", path.display());
                process::exit(1);
            }
        }
        // A missing default .env is fine; the environment may be set
        // directly.
        None => {
            let _ = dotenvy::dotenv();
        }
    }

    init_logging(cli.verbose);

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = run(config) {
        error!("{e:#}");
        process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "dicta=debug,dicta_core=debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run(config: Config) -> Result<()> {
    let clipboard = SystemClipboard::new()?;
    let sink = EnigoSink::new().context("keyboard simulation unavailable")?;
    let context = HostContext::detect();
    let injector = TextInjector::new(
        Box::new(sink),
        clipboard.clone(),
        context,
        config.bindings.paste_modifier,
    );

    let options = MachineOptions::new(config.bindings)
        .with_hold_threshold(config.hold_threshold)
        .with_preserve_clipboard(config.preserve_clipboard);
    let machine = InputStateMachine::new(options, injector, clipboard);

    let recorder = match CpalRecorder::new(config.min_recording) {
        Ok(recorder) => Arc::new(recorder),
        Err(e) => {
            print_microphone_help();
            return Err(e);
        }
    };
    let backend = Arc::new(RemoteSpeechBackend::new(&config.asr)?);
    let translator = Arc::new(ChatTranslator::new(&config.translate)?);
    let pipeline =
        TranscriptionPipeline::new(machine.clone(), recorder, backend, translator);
    machine.set_hooks(pipeline);

    info!("=== dicta started ===");
    info!(
        "hold {:?} to transcribe, add {:?} to translate",
        config.bindings.transcribe_key, config.bindings.translate_modifier_key
    );
    info!("host context: {context:?}");

    let (tx, rx) = crossbeam_channel::unbounded();
    if let Err(e) = spawn_listener(tx) {
        print_accessibility_help();
        return Err(e);
    }

    // Dispatcher loop: the only consumer of raw key events.
    for signal in rx {
        match signal {
            KeySignal::Down(key) => machine.on_key_down(key),
            KeySignal::Up(key) => machine.on_key_up(key),
        }
    }
    Ok(())
}

fn print_accessibility_help() {
    eprintln!("\n=== input monitoring permission required ===");
    eprintln!("dicta needs permission to observe keyboard events.");
    eprintln!("\nmacOS:");
    eprintln!("  1. Open System Settings > Privacy & Security > Accessibility");
    eprintln!("  2. Unlock with your password and enable your terminal app");
    eprintln!("\nLinux:");
    eprintln!("  Add your user to the input group: sudo usermod -aG input $USER");
    eprintln!("\nThen start dicta again.");
    eprintln!("============================================\n");
}

fn print_microphone_help() {
    eprintln!("\n=== microphone permission required ===");
    eprintln!("dicta needs microphone access to record audio.");
    eprintln!("\nmacOS:");
    eprintln!("  1. Open System Settings > Privacy & Security > Microphone");
    eprintln!("  2. Unlock with your password and enable your terminal app");
    eprintln!("\nThen start dicta again.");
    eprintln!("======================================\n");
}

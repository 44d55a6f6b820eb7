//! Push-to-talk microphone recorder.
//!
//! Captures f32 samples from the default input device while a hold
//! gesture is active and hands back an in-memory WAV on stop. The cpal
//! stream is not `Send`, so a dedicated thread owns it for the lifetime
//! of one capture and is told to stop over a channel.

use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::Sender;
use tracing::{debug, info, warn};

/// Result of stopping a capture.
#[derive(Debug)]
pub enum RecordingOutput {
    /// WAV-encoded audio, ready for upload.
    Captured(Vec<u8>),
    /// Below the configured minimum duration; dropped without upload.
    TooShort,
    /// No samples arrived at all.
    Empty,
}

/// Recorder collaborator driven by the pipeline's lifecycle hooks.
pub trait Recorder: Send + Sync {
    fn start_recording(&self) -> Result<()>;
    fn stop_recording(&self) -> Result<RecordingOutput>;
    /// Drop the active capture without producing output.
    fn cancel(&self);
}

struct ActiveCapture {
    samples: Arc<Mutex<Vec<f32>>>,
    sample_rate: u32,
    channels: u16,
    stop_tx: Sender<()>,
}

pub struct CpalRecorder {
    min_duration: Duration,
    active: Mutex<Option<ActiveCapture>>,
}

impl CpalRecorder {
    /// Verify an input device exists up front so a missing microphone
    /// permission fails at startup, not mid-gesture.
    pub fn new(min_duration: Duration) -> Result<Self> {
        cpal::default_host()
            .default_input_device()
            .context("no audio input device available, check microphone permissions")?;
        Ok(Self {
            min_duration,
            active: Mutex::new(None),
        })
    }
}

impl Recorder for CpalRecorder {
    fn start_recording(&self) -> Result<()> {
        let mut active = self.active.lock().unwrap();
        if active.is_some() {
            debug!("recording already active, ignoring start");
            return Ok(());
        }

        let device = cpal::default_host()
            .default_input_device()
            .context("no audio input device available, check microphone permissions")?;
        let supported = device
            .default_input_config()
            .context("failed to query input device configuration")?;
        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels();

        let samples = Arc::new(Mutex::new(Vec::new()));
        let capture_samples = samples.clone();
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<()>>(1);

        thread::Builder::new()
            .name("dicta-capture".to_string())
            .spawn(move || {
                let stream = match build_capture_stream(&device, &supported, capture_samples) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(
                        anyhow::Error::new(e).context("failed to start audio stream")
                    ));
                    return;
                }
                let _ = ready_tx.send(Ok(()));
                // Park until stop; dropping the stream ends the capture.
                let _ = stop_rx.recv();
            })
            .context("failed to spawn capture thread")?;

        match ready_rx.recv_timeout(Duration::from_secs(2)) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => anyhow::bail!("audio capture did not start in time"),
        }

        *active = Some(ActiveCapture {
            samples,
            sample_rate,
            channels,
            stop_tx,
        });
        info!("recording started ({sample_rate} Hz, {channels} ch)");
        Ok(())
    }

    fn stop_recording(&self) -> Result<RecordingOutput> {
        let Some(capture) = self.active.lock().unwrap().take() else {
            warn!("stop without an active recording");
            return Ok(RecordingOutput::Empty);
        };
        let _ = capture.stop_tx.send(());

        let samples = std::mem::take(&mut *capture.samples.lock().unwrap());
        if samples.is_empty() {
            return Ok(RecordingOutput::Empty);
        }

        let duration = capture_duration(samples.len(), capture.channels, capture.sample_rate);
        if duration < self.min_duration {
            info!(
                "recording too short ({}ms < {}ms)",
                duration.as_millis(),
                self.min_duration.as_millis()
            );
            return Ok(RecordingOutput::TooShort);
        }

        let wav = encode_wav(&samples, capture.sample_rate, capture.channels)?;
        info!(
            "captured {:.1}s of audio ({} bytes)",
            duration.as_secs_f32(),
            wav.len()
        );
        Ok(RecordingOutput::Captured(wav))
    }

    fn cancel(&self) {
        if let Some(capture) = self.active.lock().unwrap().take() {
            let _ = capture.stop_tx.send(());
            debug!("recording cancelled, samples dropped");
        }
    }
}

fn build_capture_stream(
    device: &cpal::Device,
    supported: &cpal::SupportedStreamConfig,
    samples: Arc<Mutex<Vec<f32>>>,
) -> Result<cpal::Stream> {
    let config = supported.config();
    let stream = match supported.sample_format() {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, &config, samples)?,
        cpal::SampleFormat::I16 => build_stream::<i16>(device, &config, samples)?,
        cpal::SampleFormat::U16 => build_stream::<u16>(device, &config, samples)?,
        other => anyhow::bail!("unsupported input sample format {other:?}"),
    };
    Ok(stream)
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    samples: Arc<Mutex<Vec<f32>>>,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample,
    f32: cpal::FromSample<T>,
{
    let stream = device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                samples
                    .lock()
                    .unwrap()
                    .extend(data.iter().map(|&s| cpal::Sample::from_sample(s)));
            },
            log_stream_error,
            None,
        )
        .context("failed to build audio input stream")?;
    Ok(stream)
}

// Buffer over/underruns are common and non-fatal, keep them at debug.
fn log_stream_error(err: cpal::StreamError) {
    debug!("audio stream error (non-fatal): {err}");
}

fn capture_duration(sample_count: usize, channels: u16, sample_rate: u32) -> Duration {
    let frames = sample_count / channels.max(1) as usize;
    Duration::from_secs_f64(frames as f64 / sample_rate.max(1) as f64)
}

/// Encode interleaved f32 samples as 16-bit mono WAV, downmixing
/// multi-channel input.
fn encode_wav(samples: &[f32], sample_rate: u32, channels: u16) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).context("failed to create WAV writer")?;
        let channels = channels.max(1) as usize;
        for frame in samples.chunks(channels) {
            let mono = frame.iter().sum::<f32>() / channels as f32;
            let value = (mono.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer.write_sample(value).context("failed to write sample")?;
        }
        writer.finalize().context("failed to finalize WAV")?;
    }
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_duration_accounts_for_channels() {
        assert_eq!(
            capture_duration(16000, 1, 16000),
            Duration::from_secs(1)
        );
        assert_eq!(
            capture_duration(16000, 2, 16000),
            Duration::from_millis(500)
        );
    }

    #[test]
    fn encode_wav_produces_riff_header() {
        let samples = vec![0.0f32; 1600];
        let wav = encode_wav(&samples, 16000, 1).unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
    }

    #[test]
    fn encode_wav_downmixes_stereo_to_mono() {
        // 100 stereo frames become 100 mono samples.
        let samples = vec![0.5f32; 200];
        let wav = encode_wav(&samples, 16000, 2).unwrap();
        let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.len(), 100);
    }

    #[test]
    fn encode_wav_clamps_out_of_range_samples() {
        let samples = vec![2.0f32, -2.0];
        let wav = encode_wav(&samples, 16000, 1).unwrap();
        let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        let values: Vec<i16> = reader.into_samples::<i16>().map(Result::unwrap).collect();
        assert_eq!(values[0], i16::MAX);
        assert_eq!(values[1], -i16::MAX);
    }
}

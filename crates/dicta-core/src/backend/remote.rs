//! OpenAI-compatible speech-recognition client.
//!
//! Multipart form upload with `model` and `file` fields, bearer auth,
//! JSON response with a `text` field. Groq, OpenAI and SiliconFlow all
//! speak this format.

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

use super::{ASR_CALL_TIMEOUT, SpeechBackend, SpeechMode};
use crate::config::AsrConfig;
use crate::timeout::CancelToken;

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

pub struct RemoteSpeechBackend {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::blocking::Client,
}

impl RemoteSpeechBackend {
    pub fn new(config: &AsrConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(ASR_CALL_TIMEOUT)
            .build()
            .context("failed to create HTTP client")?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            client,
        })
    }
}

impl SpeechBackend for RemoteSpeechBackend {
    fn process_audio(
        &self,
        audio: Vec<u8>,
        mode: SpeechMode,
        prompt: &str,
        cancel: &CancelToken,
    ) -> Result<String> {
        if cancel.is_cancelled() {
            anyhow::bail!("cancelled before upload");
        }

        let url = format!("{}/{}", self.base_url, mode.endpoint());
        debug!("uploading {} bytes to {url}", audio.len());

        let mut form = reqwest::blocking::multipart::Form::new()
            .text("model", self.model.clone())
            .part(
                "file",
                reqwest::blocking::multipart::Part::bytes(audio)
                    .file_name("audio.wav")
                    .mime_str("audio/wav")?,
            );
        if !prompt.is_empty() {
            form = form.text("prompt", prompt.to_string());
        }

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .context("failed to send transcription request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .unwrap_or_else(|_| "unknown error".to_string());
            anyhow::bail!("API error ({status}): {error_text}");
        }

        let body = response.text().context("failed to read response body")?;
        let parsed: TranscriptionResponse =
            serde_json::from_str(&body).context("failed to parse transcription response")?;
        let text = parsed.text.trim().to_string();
        info!("transcription returned {} characters", text.chars().count());
        Ok(text)
    }
}

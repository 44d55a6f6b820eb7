//! Chat-completions translation client.
//!
//! Posts the transcribed text with a fixed system prompt to an
//! OpenAI-compatible chat endpoint (a local Ollama server by default) and
//! returns the assistant message.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::Translator;
use crate::backend::ASR_CALL_TIMEOUT;
use crate::config::TranslateConfig;

const SYSTEM_PROMPT: &str =
    "You are a translation assistant. Translate the user's input into English. \
     Reply with the translation only.";

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

pub struct ChatTranslator {
    url: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::blocking::Client,
}

impl ChatTranslator {
    pub fn new(config: &TranslateConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(ASR_CALL_TIMEOUT)
            .build()
            .context("failed to create HTTP client")?;
        Ok(Self {
            url: config.url.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            client,
        })
    }
}

impl Translator for ChatTranslator {
    fn translate(&self, text: &str) -> Result<String> {
        debug!("translating {} characters with {}", text.chars().count(), self.model);

        let payload = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": text },
            ],
            "stream": false,
        });

        let mut request = self.client.post(&self.url).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = request.send().context("failed to send translation request")?;
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .unwrap_or_else(|_| "unknown error".to_string());
            anyhow::bail!("translation API error ({status}): {error_text}");
        }

        let parsed: ChatResponse = response
            .json()
            .context("failed to parse translation response")?;
        let translated = parsed
            .choices
            .first()
            .map(|choice| choice.message.content.trim().to_string())
            .unwrap_or_default();
        if translated.is_empty() {
            anyhow::bail!("translation backend returned no content");
        }
        info!("translation returned {} characters", translated.chars().count());
        Ok(translated)
    }
}

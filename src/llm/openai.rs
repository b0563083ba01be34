// ABOUTME: Streaming client for OpenAI-compatible chat completion APIs
// ABOUTME: Sends the conversation to /chat/completions and decodes the SSE response into fragments
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # OpenAI-compatible Provider
//!
//! Works against any endpoint that speaks the `/chat/completions` streaming
//! format (OpenAI, Azure OpenAI proxies, Groq, Ollama, vLLM).
//!
//! ## Configuration
//!
//! - `OPENAI_API_KEY`: required
//! - `OPENAI_BASE_URL`: defaults to `https://api.openai.com/v1`
//! - `OPENAI_MODEL`: defaults to `gpt-4o-mini`

use async_trait::async_trait;
use promptsmith_core::errors::AppError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument, warn};

use super::sse_parser::create_sse_stream;
use super::{ChatRequest, ChatStream, LlmProvider, StreamChunk};
use crate::config::LlmConfig;

/// Service label used in error messages
const PROVIDER_NAME: &str = "OpenAI";

// ============================================================================
// API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
    /// Sent in place of `choices` when the upstream fails after the 200 header
    #[serde(default)]
    error: Option<OpenAiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    #[serde(default)]
    delta: OpenAiDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAiDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

// ============================================================================
// Provider
// ============================================================================

/// Streaming OpenAI-compatible completion provider
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiProvider {
    /// Create a provider from configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigMissing` when no API key is configured
    pub fn new(config: &LlmConfig) -> Result<Self, AppError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| AppError::config_missing("OPENAI_API_KEY is not configured"))?;

        Ok(Self {
            client: Client::new(),
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            model: config.model.clone(),
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Map a non-success status and body to an error
    fn parse_error_response(status: reqwest::StatusCode, body: &str) -> AppError {
        let detail = serde_json::from_str::<OpenAiErrorResponse>(body).map_or_else(
            |_| body.chars().take(200).collect::<String>(),
            |parsed| {
                let kind = parsed.error.error_type.unwrap_or_else(|| "unknown".to_owned());
                format!("{kind} - {}", parsed.error.message)
            },
        );
        AppError::external_service(PROVIDER_NAME, format!("API error ({status}): {detail}"))
    }

    /// Decode one `data:` payload into a fragment
    fn parse_stream_data(json: &str) -> Option<Result<StreamChunk, AppError>> {
        match serde_json::from_str::<OpenAiStreamChunk>(json) {
            Ok(OpenAiStreamChunk {
                error: Some(detail),
                ..
            }) => {
                let kind = detail.error_type.unwrap_or_else(|| "unknown".to_owned());
                error!(kind = %kind, "Completion stream reported an error: {}", detail.message);
                Some(Err(AppError::external_service(
                    PROVIDER_NAME,
                    format!("Stream error: {kind} - {}", detail.message),
                )))
            }
            Ok(chunk) => {
                let choice = chunk.choices.into_iter().next()?;
                Some(Ok(StreamChunk {
                    delta: choice.delta.content.unwrap_or_default(),
                    is_final: choice.finish_reason.is_some(),
                    finish_reason: choice.finish_reason,
                }))
            }
            Err(e) => {
                warn!("Failed to parse stream chunk: {e}");
                None
            }
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, request), fields(model = %request.model.as_deref().unwrap_or(&self.model)))]
    async fn complete_stream(&self, request: &ChatRequest) -> Result<ChatStream, AppError> {
        let body = OpenAiRequest {
            model: request.model.as_deref().unwrap_or(&self.model),
            messages: request
                .messages
                .iter()
                .map(|m| OpenAiMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: true,
        };

        debug!(
            messages = body.messages.len(),
            "Sending streaming chat completion request"
        );

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to send streaming request: {e}");
                AppError::external_service(PROVIDER_NAME, format!("Failed to connect: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::parse_error_response(status, &body));
        }

        Ok(create_sse_stream(
            response.bytes_stream(),
            Self::parse_stream_data,
            PROVIDER_NAME,
        ))
    }
}

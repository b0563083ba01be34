// ABOUTME: Completion provider abstraction for streaming prompt-engineering replies
// ABOUTME: Defines the LlmProvider contract, request builder and per-turn generation parameters
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # LLM Provider Interface
//!
//! The chat workflow only needs one capability from a model vendor: a lazy,
//! finite, non-restartable stream of text fragments for a list of turns.
//!
//! ```rust,no_run
//! use promptsmith::llm::{ChatRequest, GenerationParams, LlmProvider};
//! use promptsmith_core::models::ChatTurn;
//!
//! async fn example(provider: &dyn LlmProvider) {
//!     let params = GenerationParams::for_turn(false);
//!     let request = ChatRequest::new(vec![ChatTurn::user("Help me write a prompt")])
//!         .with_temperature(params.temperature)
//!         .with_max_tokens(params.max_tokens)
//!         .with_streaming();
//!     let stream = provider.complete_stream(&request).await;
//! }
//! ```

mod openai;
pub mod prompts;
pub mod sse_parser;

pub use openai::OpenAiProvider;
pub use prompts::PROMPT_ENGINEER_SYSTEM_PROMPT;

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use promptsmith_core::constants::generation;
use promptsmith_core::errors::AppError;
use promptsmith_core::models::{ChatTurn, MessageRole};
use serde::{Deserialize, Serialize};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Sampling parameters chosen per turn kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    /// Sampling temperature
    pub temperature: f32,
    /// Output token cap
    pub max_tokens: u32,
}

impl GenerationParams {
    /// Final-generation turns run colder and longer than exploratory chat
    #[must_use]
    pub const fn for_turn(final_generation: bool) -> Self {
        if final_generation {
            Self {
                temperature: generation::FINAL_TEMPERATURE,
                max_tokens: generation::FINAL_MAX_TOKENS,
            }
        } else {
            Self {
                temperature: generation::CHAT_TEMPERATURE,
                max_tokens: generation::CHAT_MAX_TOKENS,
            }
        }
    }
}

/// Configuration for a chat completion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Conversation turns, system instruction first
    pub messages: Vec<ChatTurn>,
    /// Model identifier (provider default when `None`)
    pub model: Option<String>,
    /// Temperature for response randomness
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Whether to stream the response
    pub stream: bool,
}

impl ChatRequest {
    /// Create a new chat request with messages
    #[must_use]
    pub const fn new(messages: Vec<ChatTurn>) -> Self {
        Self {
            messages,
            model: None,
            temperature: None,
            max_tokens: None,
            stream: false,
        }
    }

    /// Build a streaming request for a caller's history: system prompt first,
    /// sampling parameters picked by turn kind
    #[must_use]
    pub fn for_history(history: &[ChatTurn], final_generation: bool) -> Self {
        let params = GenerationParams::for_turn(final_generation);
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatTurn::new(
            MessageRole::System,
            PROMPT_ENGINEER_SYSTEM_PROMPT,
        ));
        messages.extend_from_slice(history);

        Self::new(messages)
            .with_temperature(params.temperature)
            .with_max_tokens(params.max_tokens)
            .with_streaming()
    }

    /// Set the model to use
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the temperature
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the maximum tokens
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Enable streaming
    #[must_use]
    pub const fn with_streaming(mut self) -> Self {
        self.stream = true;
        self
    }
}

/// A chunk of a streaming response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Content delta for this chunk
    pub delta: String,
    /// Whether this is the final chunk
    pub is_final: bool,
    /// Finish reason if final
    pub finish_reason: Option<String>,
}

impl StreamChunk {
    /// A content fragment
    #[must_use]
    pub fn fragment(delta: impl Into<String>) -> Self {
        Self {
            delta: delta.into(),
            is_final: false,
            finish_reason: None,
        }
    }

    /// The end-of-stream marker
    #[must_use]
    pub fn done() -> Self {
        Self {
            delta: String::new(),
            is_final: true,
            finish_reason: Some("stop".to_owned()),
        }
    }
}

/// Stream type for chat completion responses
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, AppError>> + Send>>;

// ============================================================================
// Provider Trait
// ============================================================================

/// LLM provider trait for streamed chat completion
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Unique provider identifier (e.g., "openai")
    fn name(&self) -> &'static str;

    /// Default model to use if not specified in request
    fn default_model(&self) -> &str;

    /// Perform a streaming chat completion
    ///
    /// The returned stream is finite and cannot be restarted. Dropping it
    /// abandons the upstream call.
    async fn complete_stream(&self, request: &ChatRequest) -> Result<ChatStream, AppError>;
}

// ABOUTME: Chat turn workflow: validate, authenticate, check quota, stream the reply, queue bookkeeping
// ABOUTME: Produces a lazy event stream that the HTTP layer frames as server-sent events
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Chat Turn Service
//!
//! Everything that can fail with a status code happens in [`ChatTurnService::start`]
//! before any byte is streamed. Once the stream is handed back, the only
//! failure mode left is an upstream error, which aborts the stream.
//!
//! The completion request is only issued when the stream is first polled, and
//! dropping the stream (client disconnect) drops the upstream connection.
//! Bookkeeping is queued after the upstream stream is exhausted cleanly, just
//! before the terminal event.

use std::pin::Pin;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use futures_util::{Stream, StreamExt};
use http::HeaderMap;
use promptsmith_core::errors::{AppError, AppResult};
use promptsmith_core::models::{ChatTurn, ConversationSession, MessageRole};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::bookkeeping::{BookkeepingJob, BookkeepingQueue};
use crate::auth::AuthProvider;
use crate::database::DatabaseProvider;
use crate::llm::{ChatRequest, LlmProvider};
use crate::quota::QuotaGate;

// ============================================================================
// Request parsing
// ============================================================================

/// A validated chat turn request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurnRequest {
    /// Prior turns, oldest first
    pub messages: Vec<ChatTurn>,
    /// Session to persist the conversation under
    pub session_id: Option<String>,
    /// Produce the finished prompt instead of a conversational reply
    pub generate_final_prompt: bool,
}

impl ChatTurnRequest {
    /// Parse and validate a raw JSON body
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` (400) for malformed JSON, a missing or
    /// non-array `messages`, or a malformed turn
    pub fn parse(body: &[u8]) -> AppResult<Self> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| AppError::invalid_input(format!("Invalid JSON body: {e}")))?;

        let Some(raw_messages) = value.get("messages").and_then(Value::as_array) else {
            return Err(AppError::invalid_input("Messages array is required"));
        };

        let messages = raw_messages
            .iter()
            .enumerate()
            .map(|(index, raw)| parse_turn(index, raw))
            .collect::<AppResult<Vec<_>>>()?;

        let session_id = match value.get("sessionId") {
            None | Some(Value::Null) => None,
            Some(Value::String(id)) if !id.trim().is_empty() => Some(id.clone()),
            Some(_) => return Err(AppError::invalid_input("sessionId must be a non-empty string")),
        };

        let generate_final_prompt = match value.get("generateFinalPrompt") {
            None | Some(Value::Null) => false,
            Some(Value::Bool(flag)) => *flag,
            Some(_) => return Err(AppError::invalid_input("generateFinalPrompt must be a boolean")),
        };

        Ok(Self {
            messages,
            session_id,
            generate_final_prompt,
        })
    }
}

fn parse_turn(index: usize, raw: &Value) -> AppResult<ChatTurn> {
    let role = match raw.get("role").and_then(Value::as_str) {
        Some("system") => MessageRole::System,
        Some("user") => MessageRole::User,
        Some("assistant") => MessageRole::Assistant,
        _ => {
            return Err(AppError::invalid_input(format!(
                "messages[{index}].role must be one of system, user, assistant"
            )))
        }
    };
    let content = raw
        .get("content")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            AppError::invalid_input(format!("messages[{index}].content must be a string"))
        })?;

    Ok(ChatTurn::new(role, content))
}

// ============================================================================
// Stream events
// ============================================================================

/// One relayed fragment as sent to the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FragmentPayload {
    /// Fragment text
    pub content: String,
    /// Echoed session id
    pub session_id: Option<String>,
    /// RFC 3339 emission time
    pub timestamp: String,
}

impl FragmentPayload {
    fn now(content: String, session_id: Option<String>) -> Self {
        Self {
            content,
            session_id,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Item of a turn stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    /// An incremental piece of the reply
    Fragment(FragmentPayload),
    /// The reply is complete
    Done,
}

/// Lazy stream of turn events; an `Err` item aborts the response
pub type TurnStream = Pin<Box<dyn Stream<Item = AppResult<TurnEvent>> + Send>>;

// ============================================================================
// Service
// ============================================================================

/// Runs chat turns against the configured collaborators
#[derive(Clone)]
pub struct ChatTurnService {
    database: Arc<dyn DatabaseProvider>,
    auth: Arc<dyn AuthProvider>,
    llm: Option<Arc<dyn LlmProvider>>,
    bookkeeping: BookkeepingQueue,
}

impl ChatTurnService {
    /// Create a service; `llm` is `None` when no provider credentials are configured
    #[must_use]
    pub fn new(
        database: Arc<dyn DatabaseProvider>,
        auth: Arc<dyn AuthProvider>,
        llm: Option<Arc<dyn LlmProvider>>,
        bookkeeping: BookkeepingQueue,
    ) -> Self {
        Self {
            database,
            auth,
            llm,
            bookkeeping,
        }
    }

    /// Run every pre-stream stage and return the reply stream
    ///
    /// # Errors
    ///
    /// In order of evaluation: `InvalidInput` (400), `ConfigMissing` (500),
    /// `AuthRequired`/`AuthInvalid` (401) or an auth provider failure (500),
    /// a store failure (500), `QuotaExceeded` (429)
    pub async fn start(&self, headers: &HeaderMap, body: &[u8]) -> AppResult<TurnStream> {
        let request = ChatTurnRequest::parse(body)?;

        let llm = self
            .llm
            .clone()
            .ok_or_else(|| AppError::config_missing("Completion provider API key is not configured"))?;

        let user = self.auth.current_user(headers).await?;
        let quota = QuotaGate::check(self.database.as_ref(), &user.id).await?;

        info!(
            user_id = %user.id,
            session_id = request.session_id.as_deref(),
            final_generation = request.generate_final_prompt,
            turns = request.messages.len(),
            tier = quota.tier.as_str(),
            used = quota.used,
            "Starting chat turn"
        );

        Ok(self.reply_stream(llm, user.id, request))
    }

    fn reply_stream(
        &self,
        llm: Arc<dyn LlmProvider>,
        user_id: String,
        request: ChatTurnRequest,
    ) -> TurnStream {
        let bookkeeping = self.bookkeeping.clone();
        let ChatTurnRequest {
            messages,
            session_id,
            generate_final_prompt,
        } = request;
        let completion = ChatRequest::for_history(&messages, generate_final_prompt)
            .with_model(llm.default_model());

        let stream = async_stream::stream! {
            let mut upstream = match llm.complete_stream(&completion).await {
                Ok(upstream) => upstream,
                Err(e) => {
                    warn!(user_id = %user_id, error = %e, "Completion request failed");
                    yield Err(e);
                    return;
                }
            };

            let mut reply = String::new();
            while let Some(item) = upstream.next().await {
                match item {
                    Ok(chunk) if chunk.delta.is_empty() => {}
                    Ok(chunk) => {
                        reply.push_str(&chunk.delta);
                        yield Ok(TurnEvent::Fragment(FragmentPayload::now(
                            chunk.delta,
                            session_id.clone(),
                        )));
                    }
                    Err(e) => {
                        warn!(
                            user_id = %user_id,
                            session_id = session_id.as_deref(),
                            error = %e,
                            "Completion stream failed mid-reply"
                        );
                        yield Err(e);
                        return;
                    }
                }
            }

            debug!(user_id = %user_id, reply_len = reply.len(), "Completion stream finished");

            if let Some(id) = session_id.clone() {
                let session = ConversationSession::from_completed_turn(
                    id,
                    user_id.clone(),
                    messages,
                    reply,
                    generate_final_prompt,
                );
                bookkeeping.enqueue(BookkeepingJob::SaveSession(Box::new(session)));
            }
            if generate_final_prompt {
                bookkeeping.enqueue(BookkeepingJob::IncrementUsage {
                    user_id,
                    session_id,
                });
            }

            yield Ok(TurnEvent::Done);
        };

        Box::pin(stream)
    }
}

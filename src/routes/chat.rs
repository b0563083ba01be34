// ABOUTME: Chat turn route streaming the assistant reply as server-sent events
// ABOUTME: Frames each fragment as `data: <json>` and terminates with `data: [DONE]`
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Chat Route
//!
//! `POST /api/chat` with `{ messages, sessionId?, generateFinalPrompt? }`.
//!
//! Errors detected before streaming return a JSON error body with the mapped
//! status. An upstream failure after streaming has begun aborts the body.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use bytes::Bytes;
use futures_util::StreamExt;
use promptsmith_core::constants::streaming::DONE_SENTINEL;
use promptsmith_core::errors::{AppError, AppResult};

use crate::server::ServerResources;
use crate::services::TurnEvent;

/// Chat routes
pub struct ChatRoutes;

impl ChatRoutes {
    /// Create the chat route
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/chat", post(Self::send_turn))
            .with_state(resources)
    }

    async fn send_turn(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        body: Bytes,
    ) -> Response {
        match resources.chat.start(&headers, &body).await {
            Ok(stream) => Sse::new(stream.map(to_sse_event)).into_response(),
            Err(e) => e.into_http_response(resources.error_verbosity()),
        }
    }
}

fn to_sse_event(item: AppResult<TurnEvent>) -> Result<Event, AppError> {
    match item? {
        TurnEvent::Fragment(payload) => Event::default()
            .json_data(&payload)
            .map_err(|e| AppError::internal(format!("Failed to encode fragment: {e}"))),
        TurnEvent::Done => Ok(Event::default().data(DONE_SENTINEL)),
    }
}

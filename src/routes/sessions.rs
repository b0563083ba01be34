// ABOUTME: Conversation session routes for listing and reading saved chats
// ABOUTME: Sessions are always scoped to the authenticated caller
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use promptsmith_core::constants::session::{DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT};
use promptsmith_core::errors::{AppError, AppResult};
use promptsmith_core::models::{ConversationSession, SessionSummary};
use serde::{Deserialize, Serialize};

use crate::server::ServerResources;

/// Pagination parameters for `GET /api/sessions`
#[derive(Debug, Default, Deserialize)]
pub struct ListSessionsQuery {
    /// Page size, clamped to `1..=100`
    pub limit: Option<i64>,
    /// Rows to skip
    pub offset: Option<i64>,
}

/// Response body for `GET /api/sessions`
#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    /// Sessions, most recently updated first
    pub sessions: Vec<SessionSummary>,
    /// Page size used
    pub limit: i64,
    /// Offset used
    pub offset: i64,
}

/// Session routes
pub struct SessionRoutes;

impl SessionRoutes {
    /// Create all session routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/sessions", get(Self::list_sessions))
            .route("/api/sessions/:session_id", get(Self::get_session))
            .with_state(resources)
    }

    async fn list_sessions(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Query(query): Query<ListSessionsQuery>,
    ) -> Response {
        let result: AppResult<SessionListResponse> = async {
            let user = resources.auth.current_user(&headers).await?;
            let limit = query
                .limit
                .unwrap_or(DEFAULT_LIST_LIMIT)
                .clamp(1, MAX_LIST_LIMIT);
            let offset = query.offset.unwrap_or(0).max(0);

            let sessions = resources
                .database
                .list_sessions(&user.id, limit, offset)
                .await?;
            Ok(SessionListResponse {
                sessions,
                limit,
                offset,
            })
        }
        .await;

        match result {
            Ok(body) => Json(body).into_response(),
            Err(e) => e.into_http_response(resources.error_verbosity()),
        }
    }

    async fn get_session(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(session_id): Path<String>,
    ) -> Response {
        let result: AppResult<ConversationSession> = async {
            let user = resources.auth.current_user(&headers).await?;
            resources
                .database
                .get_session(&session_id, &user.id)
                .await?
                .ok_or_else(|| AppError::not_found("Session"))
        }
        .await;

        match result {
            Ok(session) => Json(session).into_response(),
            Err(e) => e.into_http_response(resources.error_verbosity()),
        }
    }
}

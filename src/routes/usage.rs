// ABOUTME: Usage route reporting the caller's tier, monthly usage and remaining quota
// ABOUTME: Shares the lazy profile and usage row creation of the chat workflow
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};

use crate::quota::QuotaGate;
use crate::server::ServerResources;

/// Usage routes
pub struct UsageRoutes;

impl UsageRoutes {
    /// Create the usage route
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/usage", get(Self::get_usage))
            .with_state(resources)
    }

    /// `{ tier, used, limit, remaining }`; limit is `-1` and remaining `null` when unlimited
    async fn get_usage(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Response {
        let result = async {
            let user = resources.auth.current_user(&headers).await?;
            QuotaGate::snapshot(resources.database.as_ref(), &user.id).await
        }
        .await;

        match result {
            Ok(snapshot) => Json(snapshot.to_usage_report()).into_response(),
            Err(e) => e.into_http_response(resources.error_verbosity()),
        }
    }
}

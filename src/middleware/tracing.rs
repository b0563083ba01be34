// ABOUTME: Request tracing spans carrying a correlation id
// ABOUTME: Used as the span factory for the tower-http trace layer
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use http::Request;
use tracing::Span;
use uuid::Uuid;

/// Header carrying a caller-supplied correlation id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Create the span for one HTTP request
///
/// Reuses `x-request-id` when present, otherwise generates one.
pub fn make_request_span<B>(request: &Request<B>) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| format!("req_{}", Uuid::new_v4().simple()), ToOwned::to_owned);

    tracing::info_span!(
        "http_request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id = %request_id,
    )
}

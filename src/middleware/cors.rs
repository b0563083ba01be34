// ABOUTME: CORS middleware configuration for HTTP API endpoints
// ABOUTME: Provides Cross-Origin Resource Sharing setup for the browser client
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use http::{header, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::CorsConfig;

/// Configure CORS from `CORS_ALLOWED_ORIGINS`
///
/// `*` or an empty value allows any origin; otherwise the comma-separated
/// list is used. Entries that are not valid header values are skipped.
///
/// ```bash
/// export CORS_ALLOWED_ORIGINS="https://app.example.com,https://admin.example.com"
/// ```
#[must_use]
pub fn setup_cors(config: &CorsConfig) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(allowed_origins(&config.allowed_origins))
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::ORIGIN,
            header::HeaderName::from_static("x-requested-with"),
            header::HeaderName::from_static(super::tracing::REQUEST_ID_HEADER),
        ])
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
}

fn allowed_origins(raw: &str) -> AllowOrigin {
    if raw.trim().is_empty() || raw.trim() == "*" {
        return AllowOrigin::any();
    }

    let origins: Vec<HeaderValue> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| HeaderValue::from_str(s).ok())
        .collect();

    if origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins)
    }
}

// ABOUTME: HTTP middleware for request tracing and cross-origin access
// ABOUTME: Layers applied to the whole router at server assembly
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

pub mod cors;
pub mod tracing;

// CORS configuration
pub use self::cors::setup_cors;

// Request spans
pub use self::tracing::{make_request_span, REQUEST_ID_HEADER};

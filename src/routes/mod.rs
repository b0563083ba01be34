// ABOUTME: Route module organization for the Promptsmith HTTP endpoints
// ABOUTME: Each domain module holds route definitions and thin handlers over the service layer
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Route module for Promptsmith
//!
//! Handlers authenticate, delegate, and convert [`AppError`](promptsmith_core::errors::AppError)
//! into JSON bodies with the deployment's error verbosity.

/// Streaming chat turn endpoint
pub mod chat;
/// Health check and readiness routes
pub mod health;
/// Conversation session history routes
pub mod sessions;
/// Monthly usage and quota routes
pub mod usage;

pub use chat::ChatRoutes;
pub use health::HealthRoutes;
pub use sessions::SessionRoutes;
pub use usage::UsageRoutes;

// ABOUTME: Main library entry point for the Promptsmith prompt-engineering service
// ABOUTME: Streams chat turns from an LLM provider with per-tier monthly quotas
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # Promptsmith
//!
//! A conversational prompt-engineering assistant. Each chat turn is
//! authenticated against an external auth provider, gated by a monthly quota
//! that depends on the caller's subscription tier, streamed from an
//! OpenAI-compatible completion API as server-sent events, and finally
//! persisted as a conversation session.
//!
//! ## Architecture
//!
//! - **Routes**: thin axum handlers
//! - **Services**: the chat turn workflow and the bookkeeping queue
//! - **Quota**: tier limits and lazy row creation
//! - **Database**: `DatabaseProvider` trait with a SQLite implementation
//! - **Auth / LLM**: traits for the external collaborators
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use promptsmith::config::ServerConfig;
//! use promptsmith::server::{run, ServerResources};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::from_env()?;
//!     let resources = ServerResources::from_config(config).await?;
//!     run(Arc::new(resources)).await
//! }
//! ```

/// Caller authentication against the external auth provider
pub mod auth;

/// Environment configuration
pub mod config;

/// Relational store for profiles, usage and sessions
pub mod database;

/// Completion provider abstraction and OpenAI-compatible client
pub mod llm;

/// Tracing subscriber setup
pub mod logging;

/// HTTP middleware (tracing spans, CORS)
pub mod middleware;

/// Monthly quota enforcement
pub mod quota;

/// HTTP route handlers
pub mod routes;

/// Server assembly and lifecycle
pub mod server;

/// Chat workflow and background bookkeeping
pub mod services;

pub use promptsmith_core::{constants, errors, models};

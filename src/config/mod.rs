// ABOUTME: Configuration management module for server settings
// ABOUTME: Environment-only configuration for network, store, auth provider and LLM provider
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Configuration module for Promptsmith
//!
//! All settings come from environment variables; see [`environment::ServerConfig`].

/// Environment and server configuration
pub mod environment;

pub use environment::{
    AuthConfig, CorsConfig, DatabaseConfig, Environment, LlmConfig, ServerConfig,
};

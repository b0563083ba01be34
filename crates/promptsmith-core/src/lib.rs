// ABOUTME: Core types and constants for the Promptsmith prompt-engineering service
// ABOUTME: Foundation crate with error handling, domain models, and constants
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # Promptsmith Core
//!
//! Foundation crate shared by the Promptsmith server and its tests. It is
//! designed to change infrequently.
//!
//! ## Modules
//!
//! - **errors**: `AppError`, `ErrorCode`, and the client-facing error body
//! - **models**: tiers, usage counters, conversation sessions
//! - **constants**: quota table, title rules, generation parameters

/// Unified error handling system with standard error codes and HTTP responses
pub mod errors;

/// Application constants organized by domain
pub mod constants;

/// Core data models
pub mod models;

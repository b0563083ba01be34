// ABOUTME: Relational store abstraction for profiles, usage counters and conversation sessions
// ABOUTME: Defines the DatabaseProvider contract with a SQLite implementation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Relational Store
//!
//! All durable state lives behind [`DatabaseProvider`]. Each mutation is a
//! single-row statement; the store is the sole arbiter of concurrent writes
//! from the same user, so no in-process locking is layered on top.

mod sqlite;

pub use sqlite::SqliteDatabase;

use async_trait::async_trait;
use promptsmith_core::errors::AppResult;
use promptsmith_core::models::{ConversationSession, Profile, SessionSummary, UsageLimits};

/// Core database abstraction trait
///
/// Implementations must be usable as `Arc<dyn DatabaseProvider>`.
#[async_trait]
pub trait DatabaseProvider: Send + Sync {
    /// Run migrations to set up schema (idempotent)
    async fn migrate(&self) -> AppResult<()>;

    // ================================
    // Profiles
    // ================================

    /// Get the profile row for a user
    async fn get_profile(&self, user_id: &str) -> AppResult<Option<Profile>>;

    /// Insert a profile row; an existing row is left untouched
    async fn create_profile(&self, profile: &Profile) -> AppResult<()>;

    // ================================
    // Usage
    // ================================

    /// Get the usage row for a user
    async fn get_usage(&self, user_id: &str) -> AppResult<Option<UsageLimits>>;

    /// Insert a usage row; an existing row is left untouched
    async fn create_usage(&self, usage: &UsageLimits) -> AppResult<()>;

    /// Add exactly one to `monthly_prompts_used` with a direct update
    ///
    /// Returns the number of rows updated (0 when the user has no usage row).
    async fn increment_prompts_used(&self, user_id: &str) -> AppResult<u64>;

    // ================================
    // Sessions
    // ================================

    /// Insert or replace a session keyed by id (last write wins)
    ///
    /// An existing title is kept. A row owned by another user is never
    /// overwritten; in that case `false` is returned.
    async fn upsert_session(&self, session: &ConversationSession) -> AppResult<bool>;

    /// Get a session owned by `user_id`
    async fn get_session(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> AppResult<Option<ConversationSession>>;

    /// List a user's sessions, most recently updated first
    async fn list_sessions(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<SessionSummary>>;
}

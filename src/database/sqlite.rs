// ABOUTME: SQLite implementation of the relational store over sqlx
// ABOUTME: Creates schema on startup and maps rows to core domain models
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fs;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use promptsmith_core::errors::{AppError, AppResult};
use promptsmith_core::models::{
    ChatTurn, ConversationSession, Profile, SessionStatus, SessionSummary, SubscriptionTier,
    UsageLimits,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use super::DatabaseProvider;

/// SQLite database implementation
#[derive(Clone)]
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    /// Connect and run migrations
    ///
    /// `sqlite::memory:` URLs get a single shared connection so every caller
    /// sees the same in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid, the connection fails, or
    /// migrations fail
    pub async fn new(database_url: &str) -> AppResult<Self> {
        let in_memory = database_url.contains(":memory:");
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| AppError::config(format!("Invalid DATABASE_URL: {e}")))?
            .create_if_missing(true);

        if !in_memory {
            if let Some(parent) = options.get_filename().parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).map_err(|e| {
                        AppError::database(format!(
                            "Failed to create database directory {}: {e}",
                            parent.display()
                        ))
                    })?;
                }
            }
        }

        let mut pool_options = SqlitePoolOptions::new().max_connections(if in_memory { 1 } else { 5 });
        if in_memory {
            // Closing the only connection would drop the database
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }
        let pool = pool_options
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        info!(in_memory, "SQLite database ready");
        Ok(db)
    }

    /// Underlying pool, for tests and maintenance tasks
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate_accounts(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS profiles (
                user_id TEXT PRIMARY KEY,
                subscription_tier TEXT NOT NULL DEFAULT 'free',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS usage_limits (
                user_id TEXT PRIMARY KEY,
                monthly_prompts_used INTEGER NOT NULL DEFAULT 0 CHECK (monthly_prompts_used >= 0),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn migrate_sessions(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS conversation_sessions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                messages TEXT NOT NULL,
                final_prompt TEXT,
                status TEXT NOT NULL DEFAULT 'in_progress',
                title TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_conversation_sessions_user
            ON conversation_sessions (user_id, updated_at DESC)
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn row_to_session(row: &SqliteRow) -> AppResult<ConversationSession> {
        let messages: String = row.try_get("messages")?;
        let messages: Vec<ChatTurn> = serde_json::from_str(&messages)?;
        let status: String = row.try_get("status")?;

        Ok(ConversationSession {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            messages,
            final_prompt: row.try_get("final_prompt")?,
            status: SessionStatus::from_str_or_default(&status),
            title: row.try_get("title")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Stored counters are non-negative; clamp anything outside `u32`
fn counter_from_db(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

#[async_trait]
impl DatabaseProvider for SqliteDatabase {
    async fn migrate(&self) -> AppResult<()> {
        self.migrate_accounts().await?;
        self.migrate_sessions().await
    }

    async fn get_profile(&self, user_id: &str) -> AppResult<Option<Profile>> {
        let row = sqlx::query(
            r"
            SELECT user_id, subscription_tier, created_at, updated_at
            FROM profiles
            WHERE user_id = $1
            ",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| -> AppResult<Profile> {
            let tier: String = r.try_get("subscription_tier")?;
            Ok(Profile {
                user_id: r.try_get("user_id")?,
                subscription_tier: SubscriptionTier::from_str_or_default(&tier),
                created_at: r.try_get("created_at")?,
                updated_at: r.try_get("updated_at")?,
            })
        })
        .transpose()
    }

    async fn create_profile(&self, profile: &Profile) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO profiles (user_id, subscription_tier, created_at, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT(user_id) DO NOTHING
            ",
        )
        .bind(&profile.user_id)
        .bind(profile.subscription_tier.as_str())
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .execute(&self.pool)
        .await?;

        debug!(user_id = %profile.user_id, "profile row ensured");
        Ok(())
    }

    async fn get_usage(&self, user_id: &str) -> AppResult<Option<UsageLimits>> {
        let row = sqlx::query(
            r"
            SELECT user_id, monthly_prompts_used, created_at, updated_at
            FROM usage_limits
            WHERE user_id = $1
            ",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| -> AppResult<UsageLimits> {
            Ok(UsageLimits {
                user_id: r.try_get("user_id")?,
                monthly_prompts_used: counter_from_db(r.try_get("monthly_prompts_used")?),
                created_at: r.try_get("created_at")?,
                updated_at: r.try_get("updated_at")?,
            })
        })
        .transpose()
    }

    async fn create_usage(&self, usage: &UsageLimits) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO usage_limits (user_id, monthly_prompts_used, created_at, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT(user_id) DO NOTHING
            ",
        )
        .bind(&usage.user_id)
        .bind(i64::from(usage.monthly_prompts_used))
        .bind(usage.created_at)
        .bind(usage.updated_at)
        .execute(&self.pool)
        .await?;

        debug!(user_id = %usage.user_id, "usage row ensured");
        Ok(())
    }

    async fn increment_prompts_used(&self, user_id: &str) -> AppResult<u64> {
        let now: DateTime<Utc> = Utc::now();
        let result = sqlx::query(
            r"
            UPDATE usage_limits
            SET monthly_prompts_used = monthly_prompts_used + 1, updated_at = $2
            WHERE user_id = $1
            ",
        )
        .bind(user_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn upsert_session(&self, session: &ConversationSession) -> AppResult<bool> {
        let messages = serde_json::to_string(&session.messages)?;

        let result = sqlx::query(
            r"
            INSERT INTO conversation_sessions
                (id, user_id, messages, final_prompt, status, title, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT(id) DO UPDATE SET
                messages = excluded.messages,
                final_prompt = excluded.final_prompt,
                status = excluded.status,
                title = COALESCE(conversation_sessions.title, excluded.title),
                updated_at = excluded.updated_at
            WHERE conversation_sessions.user_id = excluded.user_id
            ",
        )
        .bind(&session.id)
        .bind(&session.user_id)
        .bind(messages)
        .bind(&session.final_prompt)
        .bind(session.status.as_str())
        .bind(&session.title)
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_session(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> AppResult<Option<ConversationSession>> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, messages, final_prompt, status, title, created_at, updated_at
            FROM conversation_sessions
            WHERE id = $1 AND user_id = $2
            ",
        )
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_session).transpose()
    }

    async fn list_sessions(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<SessionSummary>> {
        let rows = sqlx::query(
            r"
            SELECT id, title, status, updated_at, json_array_length(messages) AS message_count
            FROM conversation_sessions
            WHERE user_id = $1
            ORDER BY updated_at DESC
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| -> AppResult<SessionSummary> {
                let status: String = r.try_get("status")?;
                let count: i64 = r.try_get("message_count")?;
                Ok(SessionSummary {
                    id: r.try_get("id")?,
                    title: r.try_get("title")?,
                    status: SessionStatus::from_str_or_default(&status),
                    message_count: usize::try_from(count).unwrap_or_default(),
                    updated_at: r.try_get("updated_at")?,
                })
            })
            .collect()
    }
}

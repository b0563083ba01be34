// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Provides an in-memory store with call recording, a scripted LLM provider and token helpers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]
//! Shared test utilities for `promptsmith`

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream;
use promptsmith::auth::JwtAuthProvider;
use promptsmith::config::{Environment, LlmConfig, ServerConfig};
use promptsmith::database::{DatabaseProvider, SqliteDatabase};
use promptsmith::errors::{AppError, AppResult};
use promptsmith::llm::{ChatRequest, ChatStream, LlmProvider, StreamChunk};
use promptsmith::models::{
    AuthUser, ConversationSession, Profile, SessionSummary, SubscriptionTier, UsageLimits,
};
use promptsmith::server::{build_router, ServerResources};

static INIT_LOGGER: Once = Once::new();

/// Shared secret for locally issued test tokens
pub const TEST_JWT_SECRET: &str = "promptsmith-test-secret";

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// Access token for `user_id`, valid for an hour
pub fn token_for(user_id: &str) -> String {
    JwtAuthProvider::new(TEST_JWT_SECRET.as_bytes())
        .issue_token(
            &AuthUser {
                id: user_id.to_owned(),
                email: Some(format!("{user_id}@example.com")),
            },
            Duration::from_secs(3600),
        )
        .unwrap()
}

// ============================================================================
// Recording store
// ============================================================================

/// In-memory SQLite store that counts calls and can fail lazy row creation
pub struct RecordingStore {
    inner: SqliteDatabase,
    calls: AtomicUsize,
    increments: AtomicUsize,
    session_upserts: AtomicUsize,
    fail_creates: AtomicBool,
    fail_upserts: AtomicBool,
    fail_increments: AtomicBool,
}

impl RecordingStore {
    pub async fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: SqliteDatabase::new("sqlite::memory:").await.unwrap(),
            calls: AtomicUsize::new(0),
            increments: AtomicUsize::new(0),
            session_upserts: AtomicUsize::new(0),
            fail_creates: AtomicBool::new(false),
            fail_upserts: AtomicBool::new(false),
            fail_increments: AtomicBool::new(false),
        })
    }

    /// Total calls of any kind
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn increments(&self) -> usize {
        self.increments.load(Ordering::SeqCst)
    }

    pub fn session_upserts(&self) -> usize {
        self.session_upserts.load(Ordering::SeqCst)
    }

    /// Make `create_profile` / `create_usage` return an error
    pub fn fail_creates(&self) {
        self.fail_creates.store(true, Ordering::SeqCst);
    }

    /// Make `upsert_session` return an error
    pub fn fail_upserts(&self, fail: bool) {
        self.fail_upserts.store(fail, Ordering::SeqCst);
    }

    /// Make `increment_prompts_used` return an error
    pub fn fail_increments(&self, fail: bool) {
        self.fail_increments.store(fail, Ordering::SeqCst);
    }

    /// Seed a user's tier and usage, bypassing call counting
    pub async fn seed_user(&self, user_id: &str, tier: &str, used: u32) {
        let mut profile = Profile::new_default(user_id);
        profile.subscription_tier = SubscriptionTier::from_str_or_default(tier);
        self.inner.create_profile(&profile).await.unwrap();
        sqlx::query("UPDATE profiles SET subscription_tier = $1 WHERE user_id = $2")
            .bind(tier)
            .bind(user_id)
            .execute(self.inner.pool())
            .await
            .unwrap();

        let mut usage = UsageLimits::new_default(user_id);
        usage.monthly_prompts_used = used;
        self.inner.create_usage(&usage).await.unwrap();
    }

    /// Current counter, bypassing call counting
    pub async fn used(&self, user_id: &str) -> Option<u32> {
        self.inner
            .get_usage(user_id)
            .await
            .unwrap()
            .map(|u| u.monthly_prompts_used)
    }

    /// Stored session, bypassing call counting
    pub async fn session(&self, session_id: &str, user_id: &str) -> Option<ConversationSession> {
        self.inner.get_session(session_id, user_id).await.unwrap()
    }

    fn record(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DatabaseProvider for RecordingStore {
    async fn migrate(&self) -> AppResult<()> {
        self.inner.migrate().await
    }

    async fn get_profile(&self, user_id: &str) -> AppResult<Option<Profile>> {
        self.record();
        self.inner.get_profile(user_id).await
    }

    async fn create_profile(&self, profile: &Profile) -> AppResult<()> {
        self.record();
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(AppError::database("profiles table is read-only"));
        }
        self.inner.create_profile(profile).await
    }

    async fn get_usage(&self, user_id: &str) -> AppResult<Option<UsageLimits>> {
        self.record();
        self.inner.get_usage(user_id).await
    }

    async fn create_usage(&self, usage: &UsageLimits) -> AppResult<()> {
        self.record();
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(AppError::database("usage_limits table is read-only"));
        }
        self.inner.create_usage(usage).await
    }

    async fn increment_prompts_used(&self, user_id: &str) -> AppResult<u64> {
        self.record();
        self.increments.fetch_add(1, Ordering::SeqCst);
        if self.fail_increments.load(Ordering::SeqCst) {
            return Err(AppError::database("database is locked"));
        }
        self.inner.increment_prompts_used(user_id).await
    }

    async fn upsert_session(&self, session: &ConversationSession) -> AppResult<bool> {
        self.record();
        self.session_upserts.fetch_add(1, Ordering::SeqCst);
        if self.fail_upserts.load(Ordering::SeqCst) {
            return Err(AppError::database("disk I/O error"));
        }
        self.inner.upsert_session(session).await
    }

    async fn get_session(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> AppResult<Option<ConversationSession>> {
        self.record();
        self.inner.get_session(session_id, user_id).await
    }

    async fn list_sessions(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<SessionSummary>> {
        self.record();
        self.inner.list_sessions(user_id, limit, offset).await
    }
}

// ============================================================================
// Scripted completion provider
// ============================================================================

/// Where a scripted completion fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScriptedFailure {
    None,
    /// `complete_stream` itself returns an error
    Before,
    /// The stream errors after the last fragment
    After,
}

/// Completion provider that replays fixed fragments, optionally failing
pub struct ScriptedProvider {
    fragments: Vec<String>,
    failure: ScriptedFailure,
    calls: AtomicUsize,
    last_request: Mutex<Option<ChatRequest>>,
}

impl ScriptedProvider {
    pub fn new(fragments: &[&str]) -> Arc<Self> {
        Self::build(fragments, ScriptedFailure::None)
    }

    /// Rejects the completion request before any fragment
    pub fn failing_before() -> Arc<Self> {
        Self::build(&[], ScriptedFailure::Before)
    }

    /// Yields `fragments`, then a stream error
    pub fn failing_after(fragments: &[&str]) -> Arc<Self> {
        Self::build(fragments, ScriptedFailure::After)
    }

    fn build(fragments: &[&str], failure: ScriptedFailure) -> Arc<Self> {
        Arc::new(Self {
            fragments: fragments.iter().map(|f| (*f).to_owned()).collect(),
            failure,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<ChatRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        "scripted-model"
    }

    async fn complete_stream(&self, request: &ChatRequest) -> Result<ChatStream, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        if self.failure == ScriptedFailure::Before {
            return Err(AppError::external_service(
                "scripted",
                "API error (503 Service Unavailable): overloaded",
            ));
        }

        let mut items: Vec<Result<StreamChunk, AppError>> = self
            .fragments
            .iter()
            .map(|f| Ok(StreamChunk::fragment(f.clone())))
            .collect();
        if self.failure == ScriptedFailure::After {
            items.push(Err(AppError::external_service(
                "scripted",
                "connection reset mid-stream",
            )));
        } else {
            items.push(Ok(StreamChunk::done()));
        }

        Ok(Box::pin(stream::iter(items)))
    }
}

// ============================================================================
// Application harness
// ============================================================================

/// Router plus handles to every test double
pub struct TestApp {
    pub router: axum::Router,
    pub resources: Arc<ServerResources>,
    pub store: Arc<RecordingStore>,
    pub llm: Option<Arc<ScriptedProvider>>,
}

impl TestApp {
    /// App whose completion provider replays `fragments`
    pub async fn with_provider(llm: Arc<ScriptedProvider>) -> Self {
        let provider: Arc<dyn LlmProvider> = llm.clone();
        Self::build(Some(provider), Some(llm), Environment::Testing).await
    }

    /// App backed by any completion provider, such as a real client
    pub async fn with_llm(provider: Arc<dyn LlmProvider>) -> Self {
        Self::build(Some(provider), None, Environment::Testing).await
    }

    /// App without completion credentials
    pub async fn without_provider(environment: Environment) -> Self {
        Self::build(None, None, environment).await
    }

    async fn build(
        provider: Option<Arc<dyn LlmProvider>>,
        llm: Option<Arc<ScriptedProvider>>,
        environment: Environment,
    ) -> Self {
        init_test_logging();
        let store = RecordingStore::new().await;

        let config = ServerConfig {
            environment,
            ..ServerConfig::default()
        };
        let resources = Arc::new(ServerResources::new(
            config,
            store.clone(),
            Arc::new(JwtAuthProvider::new(TEST_JWT_SECRET.as_bytes())),
            provider,
        ));

        Self {
            router: build_router(&resources),
            resources,
            store,
            llm,
        }
    }

    /// Wait for queued bookkeeping to finish
    pub async fn flush(&self) {
        self.resources.bookkeeping.flush().await;
    }

    pub fn llm_calls(&self) -> usize {
        self.llm.as_ref().map_or(0, |p| p.calls())
    }
}

// ============================================================================
// Canned completion endpoint
// ============================================================================

/// Serve `body` as the SSE response of `POST /chat/completions` on a local port
///
/// Returns a config pointing an `OpenAiProvider` at it.
pub async fn spawn_completion_endpoint(body: &'static str) -> LlmConfig {
    let app = axum::Router::new().route(
        "/chat/completions",
        axum::routing::post(move || async move {
            ([(axum::http::header::CONTENT_TYPE, "text/event-stream")], body)
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    LlmConfig {
        api_key: Some("sk-test".to_owned()),
        base_url: format!("http://{addr}"),
        model: "gpt-4o-mini".to_owned(),
    }
}

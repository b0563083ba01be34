// ABOUTME: Server assembly: shared resources, router composition and graceful shutdown
// ABOUTME: Wires the store, auth provider, completion provider and bookkeeping queue into axum
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # HTTP Server
//!
//! [`ServerResources`] is built once at startup and shared with every route
//! through axum state.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use promptsmith_core::errors::{AppError, AppResult, ErrorVerbosity};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::auth::{AuthProvider, JwtAuthProvider, RemoteAuthProvider};
use crate::config::{AuthConfig, ServerConfig};
use crate::database::{DatabaseProvider, SqliteDatabase};
use crate::llm::{LlmProvider, OpenAiProvider};
use crate::middleware::{make_request_span, setup_cors};
use crate::routes::{ChatRoutes, HealthRoutes, SessionRoutes, UsageRoutes};
use crate::services::{BookkeepingQueue, ChatTurnService};

/// Collaborators shared by every request
pub struct ServerResources {
    /// Server configuration
    pub config: Arc<ServerConfig>,
    /// Relational store
    pub database: Arc<dyn DatabaseProvider>,
    /// Caller identity
    pub auth: Arc<dyn AuthProvider>,
    /// Post-stream side effects
    pub bookkeeping: BookkeepingQueue,
    /// Chat turn workflow
    pub chat: ChatTurnService,
}

impl ServerResources {
    /// Assemble resources from already-built collaborators
    ///
    /// Spawns the bookkeeping worker, so must run inside a tokio runtime.
    #[must_use]
    pub fn new(
        config: ServerConfig,
        database: Arc<dyn DatabaseProvider>,
        auth: Arc<dyn AuthProvider>,
        llm: Option<Arc<dyn LlmProvider>>,
    ) -> Self {
        let bookkeeping = BookkeepingQueue::spawn(database.clone());
        let chat = ChatTurnService::new(database.clone(), auth.clone(), llm, bookkeeping.clone());

        Self {
            config: Arc::new(config),
            database,
            auth,
            bookkeeping,
            chat,
        }
    }

    /// Build every collaborator from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened or no auth provider is configured
    pub async fn from_config(config: ServerConfig) -> AppResult<Self> {
        let database: Arc<dyn DatabaseProvider> =
            Arc::new(SqliteDatabase::new(&config.database.url).await?);
        let auth = build_auth_provider(&config.auth)?;
        info!(provider = auth.name(), "Auth provider ready");

        let llm: Option<Arc<dyn LlmProvider>> = match OpenAiProvider::new(&config.llm) {
            Ok(provider) => {
                info!(model = %config.llm.model, "Completion provider ready");
                Some(Arc::new(provider))
            }
            Err(e) => {
                warn!("{e}; chat requests will fail until it is set");
                None
            }
        };

        Ok(Self::new(config, database, auth, llm))
    }

    /// Error body verbosity for this deployment
    #[must_use]
    pub fn error_verbosity(&self) -> ErrorVerbosity {
        self.config.environment.error_verbosity()
    }
}

/// Pick the auth provider: remote when `AUTH_URL` is set, local JWT otherwise
///
/// # Errors
///
/// Returns a configuration error when neither is configured
pub fn build_auth_provider(config: &AuthConfig) -> AppResult<Arc<dyn AuthProvider>> {
    if let Some(url) = &config.provider_url {
        return Ok(Arc::new(RemoteAuthProvider::new(
            url.clone(),
            config.provider_api_key.clone(),
        )));
    }
    if let Some(secret) = &config.jwt_secret {
        return Ok(Arc::new(JwtAuthProvider::new(secret.as_bytes())));
    }
    Err(AppError::config(
        "No auth provider configured: set AUTH_URL or AUTH_JWT_SECRET",
    ))
}

/// Compose every route with tracing and CORS layers
#[must_use]
pub fn build_router(resources: &Arc<ServerResources>) -> Router {
    Router::new()
        .merge(HealthRoutes::routes())
        .merge(ChatRoutes::routes(resources.clone()))
        .merge(UsageRoutes::routes(resources.clone()))
        .merge(SessionRoutes::routes(resources.clone()))
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
        .layer(setup_cors(&resources.config.cors))
}

/// Bind, serve until Ctrl-C/SIGTERM, then drain bookkeeping
///
/// # Errors
///
/// Returns an error if binding or serving fails
pub async fn run(resources: Arc<ServerResources>) -> Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        resources.config.host, resources.config.http_port
    )
    .parse()
    .context("Invalid bind address")?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("HTTP server listening on http://{addr}");

    axum::serve(listener, build_router(&resources))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    resources.bookkeeping.shutdown().await;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl-C handler: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("Shutdown signal received");
}

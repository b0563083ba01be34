// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Parses environment variables into a typed server configuration
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Environment-based configuration management for production deployment

use anyhow::{Context, Result};
use promptsmith_core::errors::ErrorVerbosity;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt::{Display, Formatter, Result as FmtResult};
use tracing::info;

/// Default bind host
const DEFAULT_HOST: &str = "127.0.0.1";
/// Default HTTP port
const DEFAULT_HTTP_PORT: u16 = 8080;
/// Default SQLite database location
const DEFAULT_DATABASE_URL: &str = "sqlite:./data/promptsmith.db";
/// Default OpenAI-compatible endpoint
const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";
/// Default completion model
const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";

/// Deployment environment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development (default)
    #[default]
    Development,
    /// Production deployment
    Production,
    /// Automated tests
    Testing,
}

impl Environment {
    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development,
        }
    }

    /// Check if this is a production environment
    #[must_use]
    pub const fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// How much internal detail error responses may expose
    #[must_use]
    pub const fn error_verbosity(&self) -> ErrorVerbosity {
        if self.is_production() {
            ErrorVerbosity::Terse
        } else {
            ErrorVerbosity::Verbose
        }
    }
}

impl Display for Environment {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
            Self::Testing => write!(f, "testing"),
        }
    }
}

/// Relational store settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// sqlx connection URL
    pub url: String,
}

/// Completion provider settings
#[derive(Clone, PartialEq, Eq)]
pub struct LlmConfig {
    /// API key; `None` makes every chat request fail with a configuration error
    pub api_key: Option<String>,
    /// OpenAI-compatible base URL
    pub base_url: String,
    /// Model identifier
    pub model: String,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("LlmConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

/// Auth provider settings
///
/// The remote provider is preferred when `provider_url` is set; otherwise
/// access tokens are verified locally with `jwt_secret`.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct AuthConfig {
    /// HS256 secret used to verify access tokens locally
    pub jwt_secret: Option<String>,
    /// Base URL of the hosted auth service
    pub provider_url: Option<String>,
    /// Public API key sent to the hosted auth service
    pub provider_api_key: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("provider_url", &self.provider_url)
            .field(
                "provider_api_key",
                &self.provider_api_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// CORS settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsConfig {
    /// Comma-separated origins, or `*`
    pub allowed_origins: String,
}

/// Complete server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Bind host
    pub host: String,
    /// HTTP port
    pub http_port: u16,
    /// Deployment environment
    pub environment: Environment,
    /// Relational store
    pub database: DatabaseConfig,
    /// Completion provider
    pub llm: LlmConfig,
    /// Auth provider
    pub auth: AuthConfig,
    /// CORS
    pub cors: CorsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            http_port: DEFAULT_HTTP_PORT,
            environment: Environment::Development,
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_owned(),
            },
            llm: LlmConfig {
                api_key: None,
                base_url: DEFAULT_LLM_BASE_URL.to_owned(),
                model: DEFAULT_LLM_MODEL.to_owned(),
            },
            auth: AuthConfig::default(),
            cors: CorsConfig {
                allowed_origins: "*".to_owned(),
            },
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable cannot be parsed
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("NODE_ENV"))
            .map(|s| Environment::from_str_or_default(&s))
            .unwrap_or_default();

        let config = Self {
            host: env_var_or("HOST", DEFAULT_HOST),
            http_port: env_var_or("HTTP_PORT", &DEFAULT_HTTP_PORT.to_string())
                .parse()
                .context("Invalid HTTP_PORT value")?,
            environment,
            database: DatabaseConfig {
                url: env_var_or("DATABASE_URL", DEFAULT_DATABASE_URL),
            },
            llm: LlmConfig {
                api_key: non_empty_env("OPENAI_API_KEY"),
                base_url: env_var_or("OPENAI_BASE_URL", DEFAULT_LLM_BASE_URL),
                model: env_var_or("OPENAI_MODEL", DEFAULT_LLM_MODEL),
            },
            auth: AuthConfig {
                jwt_secret: non_empty_env("AUTH_JWT_SECRET"),
                provider_url: non_empty_env("AUTH_URL"),
                provider_api_key: non_empty_env("AUTH_API_KEY"),
            },
            cors: CorsConfig {
                allowed_origins: env_var_or("CORS_ALLOWED_ORIGINS", "*"),
            },
        };

        Ok(config)
    }

    /// Human-readable summary for startup logs (no secrets)
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Promptsmith Configuration:\n\
             - Bind: {}:{}\n\
             - Environment: {}\n\
             - Database: {}\n\
             - LLM: {} ({}, key {})\n\
             - Auth: {}",
            self.host,
            self.http_port,
            self.environment,
            if self.database.url.starts_with("sqlite:") {
                "SQLite"
            } else {
                "Unknown"
            },
            self.llm.model,
            self.llm.base_url,
            if self.llm.api_key.is_some() {
                "configured"
            } else {
                "missing"
            },
            if self.auth.provider_url.is_some() {
                "remote provider"
            } else if self.auth.jwt_secret.is_some() {
                "local JWT verification"
            } else {
                "not configured"
            },
        )
    }
}

/// Read an environment variable with a default
fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Read an environment variable, treating empty values as unset
fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

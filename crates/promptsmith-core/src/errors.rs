// ABOUTME: Unified error handling with stable error codes and HTTP status mapping
// ABOUTME: Formats client-facing JSON error bodies with environment-gated verbosity
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Unified Error Handling
//!
//! Every fallible operation in Promptsmith returns [`AppResult`]. Errors carry an
//! [`ErrorCode`] that fixes the HTTP status, a human-readable message, and
//! optional structured context (upstream details, quota numbers).
//!
//! Turning an error into a response is an explicit step: the caller passes an
//! [`ErrorVerbosity`] so that internal details are only exposed where the
//! deployment allows it.

use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Standard error codes used throughout the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Authentication
    /// No credentials were supplied
    AuthRequired,
    /// Credentials were supplied but rejected
    AuthInvalid,

    // Quota
    /// Monthly prompt allowance exhausted
    QuotaExceeded,

    // Validation
    /// Request body is malformed
    InvalidInput,
    /// A required field is absent
    MissingRequiredField,

    // Resources
    /// Requested resource does not exist or is not owned by the caller
    ResourceNotFound,

    // Upstream collaborators
    /// Auth provider or completion provider failed
    ExternalServiceError,

    // Configuration
    /// Required configuration (e.g. provider credentials) is absent
    ConfigMissing,
    /// Configuration is present but unusable
    ConfigError,

    // Internal
    /// Relational store failure
    DatabaseError,
    /// Serialization failure
    SerializationError,
    /// Anything else
    InternalError,
}

impl ErrorCode {
    /// HTTP status code for this error
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::InvalidInput | Self::MissingRequiredField => 400,
            Self::AuthRequired | Self::AuthInvalid => 401,
            Self::ResourceNotFound => 404,
            Self::QuotaExceeded => 429,
            Self::ExternalServiceError
            | Self::ConfigMissing
            | Self::ConfigError
            | Self::DatabaseError
            | Self::SerializationError
            | Self::InternalError => 500,
        }
    }

    /// Client-facing summary used as the `error` field of the response body
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::AuthRequired => "Authentication required",
            Self::AuthInvalid => "Invalid authentication credentials",
            Self::QuotaExceeded => "Monthly prompt limit reached",
            Self::InvalidInput => "Invalid request",
            Self::MissingRequiredField => "Missing required field",
            Self::ResourceNotFound => "Resource not found",
            Self::ExternalServiceError => "Upstream service error",
            Self::ConfigMissing => "Service is not configured",
            Self::ConfigError => "Service configuration error",
            Self::DatabaseError => "Database operation failed",
            Self::SerializationError => "Serialization failed",
            Self::InternalError => "Internal server error",
        }
    }

    /// Whether the failure is the caller's fault
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        self.http_status() < 500
    }
}

/// How much of an internal error is exposed to the caller
///
/// Selected once from the deployment environment and handed to the error
/// formatting boundary explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorVerbosity {
    /// Include upstream/internal details in 5xx bodies
    Verbose,
    /// Generic messages only
    #[default]
    Terse,
}

/// Quota numbers attached to a `QuotaExceeded` error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaDetails {
    /// Monthly limit for the caller's tier
    pub limit: u32,
    /// Prompts already used this month
    pub current_usage: u32,
}

/// Unified error type for the application
#[derive(Debug, Error)]
pub struct AppError {
    /// Error code
    pub code: ErrorCode,
    /// Human-readable message (internal for 5xx errors)
    pub message: String,
    /// Quota context for `QuotaExceeded`
    pub quota: Option<QuotaDetails>,
    /// Source error for chaining
    #[source]
    pub source: Option<Box<dyn StdError + Send + Sync>>,
}

impl AppError {
    /// Create a new error with the given code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            quota: None,
            source: None,
        }
    }

    /// Attach a source error
    #[must_use]
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// HTTP status code for this error
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        self.code.http_status()
    }

    /// Authentication required (no credentials)
    #[must_use]
    pub fn auth_required() -> Self {
        Self::new(ErrorCode::AuthRequired, "Authentication required")
    }

    /// Invalid authentication
    pub fn auth_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthInvalid, message)
    }

    /// Monthly quota exhausted
    #[must_use]
    pub fn quota_exceeded(limit: u32, current_usage: u32) -> Self {
        let mut error = Self::new(
            ErrorCode::QuotaExceeded,
            format!("Monthly limit of {limit} prompts reached"),
        );
        error.quota = Some(QuotaDetails {
            limit,
            current_usage,
        });
        error
    }

    /// Invalid input
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Missing required field
    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingRequiredField,
            format!("Missing required field: {field}"),
        )
    }

    /// Resource not found
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ResourceNotFound,
            format!("{} not found", resource.into()),
        )
    }

    /// Missing configuration
    pub fn config_missing(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigMissing, message)
    }

    /// Invalid configuration
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    /// External service error
    pub fn external_service(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ExternalServiceError,
            format!("{}: {}", service.into(), message.into()),
        )
    }

    /// Database error
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// Internal server error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Build the client-facing body for this error
    #[must_use]
    pub fn to_error_body(&self, verbosity: ErrorVerbosity) -> ErrorBody {
        let (error, details) = if self.code.is_client_error() {
            // Client errors describe the caller's mistake, nothing internal
            (self.message.clone(), None)
        } else {
            let details = match verbosity {
                ErrorVerbosity::Verbose => Some(self.message.clone()),
                ErrorVerbosity::Terse => None,
            };
            (self.code.description().to_owned(), details)
        };

        ErrorBody {
            error,
            details,
            limit: self.quota.map(|q| q.limit),
            current_usage: self.quota.map(|q| q.current_usage),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.description(), self.message)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::new(
            ErrorCode::SerializationError,
            format!("JSON processing failed: {error}"),
        )
        .with_source(error)
    }
}

#[cfg(feature = "database-errors")]
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> Self {
        Self::database(error.to_string()).with_source(error)
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// JSON error body returned to HTTP callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Summary of what went wrong
    pub error: String,
    /// Internal details (verbose deployments, 5xx only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Monthly limit (quota errors only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Current usage (quota errors only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_usage: Option<u32>,
}

#[cfg(feature = "http-response")]
mod http_response {
    use super::{AppError, ErrorVerbosity};
    use axum::response::{IntoResponse, Response};
    use axum::Json;
    use http::StatusCode;

    impl AppError {
        /// Convert into an HTTP response using the given verbosity
        #[must_use]
        pub fn into_http_response(self, verbosity: ErrorVerbosity) -> Response {
            let status = StatusCode::from_u16(self.http_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            if status.is_server_error() {
                tracing::error!(code = ?self.code, error = %self.message, "request failed");
            }
            (status, Json(self.to_error_body(verbosity))).into_response()
        }
    }
}

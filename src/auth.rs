// ABOUTME: Caller authentication against the external auth provider
// ABOUTME: Local HS256 access-token verification and a remote user-endpoint client
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Authentication
//!
//! Identity is owned by the hosted auth service. Promptsmith only asks "who is
//! calling?" through [`AuthProvider::current_user`] and never issues sessions
//! of its own.
//!
//! Failures split two ways:
//! - no or rejected credentials → `AuthRequired` / `AuthInvalid` (401)
//! - the provider itself failing → `ExternalServiceError` (500)

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use http::{header, HeaderMap};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use promptsmith_core::constants::service_names;
use promptsmith_core::errors::{AppError, AppResult};
use promptsmith_core::models::AuthUser;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Cookie holding the access token for browser clients
const AUTH_COOKIE: &str = "auth_token";

/// Audience the hosted auth service stamps on user access tokens
const TOKEN_AUDIENCE: &str = "authenticated";

/// Source of the current caller's identity
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Provider identifier for logs
    fn name(&self) -> &'static str;

    /// Resolve the caller from request headers
    async fn current_user(&self, headers: &HeaderMap) -> AppResult<AuthUser>;
}

/// Extract the access token from `Authorization: Bearer` or the auth cookie
#[must_use]
pub fn extract_access_token(headers: &HeaderMap) -> Option<String> {
    // Other schemes (e.g. `Basic` added by a proxy) fall through to the cookie
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_owned());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == AUTH_COOKIE)
        .map(|(_, value)| value.to_owned())
        .filter(|t| !t.is_empty())
}

// ============================================================================
// Local verification
// ============================================================================

/// Access-token claims issued by the hosted auth service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    /// User email
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Expiration timestamp
    pub exp: i64,
    /// Audience
    pub aud: String,
}

/// Verifies HS256 access tokens with the auth service's shared secret
pub struct JwtAuthProvider {
    decoding_key: DecodingKey,
    encoding_key: EncodingKey,
    validation: Validation,
}

impl JwtAuthProvider {
    /// Create a provider for the given shared secret
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[TOKEN_AUDIENCE]);
        validation.validate_exp = true;

        Self {
            decoding_key: DecodingKey::from_secret(secret),
            encoding_key: EncodingKey::from_secret(secret),
            validation,
        }
    }

    /// Mint an access token for local tooling and tests
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails
    pub fn issue_token(&self, user: &AuthUser, ttl: Duration) -> AppResult<String> {
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            exp: Utc::now().timestamp().saturating_add(ttl_secs),
            aud: TOKEN_AUDIENCE.to_owned(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("Failed to sign access token: {e}")))
    }

    /// Validate a token and return its claims
    ///
    /// # Errors
    ///
    /// Returns `AuthInvalid` for expired, forged or malformed tokens
    pub fn validate_token(&self, token: &str) -> AppResult<Claims> {
        use jsonwebtoken::errors::ErrorKind;

        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!("Access token validation failed: {e:?}");
                match e.kind() {
                    ErrorKind::ExpiredSignature => AppError::auth_invalid("Access token expired"),
                    ErrorKind::InvalidSignature => {
                        AppError::auth_invalid("Access token signature is invalid")
                    }
                    _ => AppError::auth_invalid("Access token is malformed"),
                }
            })
    }
}

#[async_trait]
impl AuthProvider for JwtAuthProvider {
    fn name(&self) -> &'static str {
        "jwt"
    }

    async fn current_user(&self, headers: &HeaderMap) -> AppResult<AuthUser> {
        let token = extract_access_token(headers).ok_or_else(AppError::auth_required)?;
        let claims = self.validate_token(&token)?;
        Ok(AuthUser {
            id: claims.sub,
            email: claims.email,
        })
    }
}

// ============================================================================
// Remote provider
// ============================================================================

/// User payload returned by the hosted auth service
#[derive(Debug, Deserialize)]
struct RemoteUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

/// Asks the hosted auth service who owns the access token
pub struct RemoteAuthProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl RemoteAuthProvider {
    /// Create a client for the auth service at `base_url`
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            api_key,
        }
    }

    fn user_url(&self) -> String {
        format!("{}/auth/v1/user", self.base_url)
    }
}

#[async_trait]
impl AuthProvider for RemoteAuthProvider {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn current_user(&self, headers: &HeaderMap) -> AppResult<AuthUser> {
        let token = extract_access_token(headers).ok_or_else(AppError::auth_required)?;

        let mut request = self.client.get(self.user_url()).bearer_auth(&token);
        if let Some(api_key) = &self.api_key {
            request = request.header("apikey", api_key);
        }

        let response = request.send().await.map_err(|e| {
            warn!("Auth provider request failed: {e}");
            AppError::external_service(service_names::AUTH_PROVIDER, format!("request failed: {e}"))
        })?;

        match response.status() {
            status if status.is_success() => {
                let user: RemoteUser = response.json().await.map_err(|e| {
                    AppError::external_service(
                        service_names::AUTH_PROVIDER,
                        format!("invalid user payload: {e}"),
                    )
                })?;
                Ok(AuthUser {
                    id: user.id,
                    email: user.email,
                })
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(AppError::auth_invalid("Session is invalid or expired"))
            }
            status => Err(AppError::external_service(
                service_names::AUTH_PROVIDER,
                format!("unexpected status {status}"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use promptsmith_core::errors::ErrorCode;

    fn user() -> AuthUser {
        AuthUser {
            id: "user-123".to_owned(),
            email: Some("writer@example.com".to_owned()),
        }
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn test_extract_token_from_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; auth_token=abc.def.ghi"),
        );
        assert_eq!(extract_access_token(&headers).as_deref(), Some("abc.def.ghi"));
        assert!(extract_access_token(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_non_bearer_authorization_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic Zm9v"));
        assert!(extract_access_token(&headers).is_none());
    }

    #[test]
    fn test_non_bearer_authorization_falls_back_to_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic Zm9v"));
        headers.insert(header::COOKIE, HeaderValue::from_static("auth_token=abc.def.ghi"));
        assert_eq!(extract_access_token(&headers).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn test_bearer_wins_over_cookie() {
        let mut headers = bearer("from-header");
        headers.insert(header::COOKIE, HeaderValue::from_static("auth_token=from-cookie"));
        assert_eq!(extract_access_token(&headers).as_deref(), Some("from-header"));
    }

    #[tokio::test]
    async fn test_round_trip_identity() {
        let provider = JwtAuthProvider::new(b"test-secret");
        let token = provider
            .issue_token(&user(), Duration::from_secs(3600))
            .unwrap();

        let resolved = provider.current_user(&bearer(&token)).await.unwrap();
        assert_eq!(resolved, user());
    }

    #[tokio::test]
    async fn test_missing_token_is_auth_required() {
        let provider = JwtAuthProvider::new(b"test-secret");
        let err = provider.current_user(&HeaderMap::new()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::AuthRequired);
    }

    #[tokio::test]
    async fn test_forged_token_is_rejected() {
        let issuer = JwtAuthProvider::new(b"someone-else");
        let token = issuer
            .issue_token(&user(), Duration::from_secs(3600))
            .unwrap();

        let provider = JwtAuthProvider::new(b"test-secret");
        let err = provider.current_user(&bearer(&token)).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::AuthInvalid);
        assert_eq!(err.http_status(), 401);
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected() {
        let provider = JwtAuthProvider::new(b"test-secret");
        let claims = Claims {
            sub: "user-123".to_owned(),
            email: None,
            exp: Utc::now().timestamp() - 3600,
            aud: TOKEN_AUDIENCE.to_owned(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        let err = provider.validate_token(&token).unwrap_err();
        assert_eq!(err.message, "Access token expired");
    }

    #[tokio::test]
    async fn test_unreachable_remote_provider_is_server_error() {
        // Port 9 (discard) on localhost is not expected to serve HTTP
        let provider = RemoteAuthProvider::new("http://127.0.0.1:9", None);
        let err = provider
            .current_user(&bearer("some-token"))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ExternalServiceError);
        assert_eq!(err.http_status(), 500);
    }
}

// ABOUTME: Axum HTTP testing utilities for integration tests
// ABOUTME: Drives routers with tower oneshot and reads JSON or server-sent event bodies
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(dead_code)]

use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use futures_util::StreamExt;
use serde::Serialize;
use tower::ServiceExt;

/// Helper to build and execute HTTP requests against Axum routers
pub struct AxumTestRequest {
    method: Method,
    uri: String,
    headers: Vec<(String, String)>,
    body: Option<String>,
}

impl AxumTestRequest {
    /// Create a new GET request
    pub fn get(uri: &str) -> Self {
        Self::new(Method::GET, uri)
    }

    /// Create a new POST request
    pub fn post(uri: &str) -> Self {
        Self::new(Method::POST, uri)
    }

    fn new(method: Method, uri: &str) -> Self {
        Self {
            method,
            uri: uri.to_owned(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Add a header to the request
    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.headers.push((key.to_owned(), value.to_owned()));
        self
    }

    /// Authenticate with a bearer token
    pub fn bearer(self, token: &str) -> Self {
        self.header(header::AUTHORIZATION.as_str(), &format!("Bearer {token}"))
    }

    /// Add JSON body to the request
    pub fn json<T: Serialize>(mut self, data: &T) -> Self {
        self.body = Some(serde_json::to_string(data).expect("Failed to serialize JSON"));
        self.headers.push((
            header::CONTENT_TYPE.as_str().to_owned(),
            "application/json".to_owned(),
        ));
        self
    }

    /// Send a raw (possibly malformed) body
    pub fn raw_body(mut self, body: &str) -> Self {
        self.body = Some(body.to_owned());
        self
    }

    async fn dispatch(self, app: Router) -> axum::http::Response<Body> {
        let mut builder = Request::builder().method(self.method).uri(self.uri);
        for (key, value) in self.headers {
            builder = builder.header(key, value);
        }

        let request = builder
            .body(Body::from(self.body.unwrap_or_default()))
            .expect("Failed to build request");

        app.oneshot(request)
            .await
            .expect("Failed to execute request")
    }

    /// Execute the request and read the full body
    pub async fn send(self, app: Router) -> AxumTestResponse {
        let response = self.dispatch(app).await;
        let status = response.status();
        let content_type = content_type(&response);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read response body")
            .to_vec();

        AxumTestResponse {
            status,
            content_type,
            body,
            aborted: false,
        }
    }

    /// Execute a streaming request, reading frames until the body ends or errors
    ///
    /// An aborted body (stream error) is recorded instead of panicking so tests
    /// can assert on what the client saw before the abort.
    pub async fn send_stream(self, app: Router) -> AxumTestResponse {
        let response = self.dispatch(app).await;
        let status = response.status();
        let content_type = content_type(&response);

        let mut stream = response.into_body().into_data_stream();
        let mut body = Vec::new();
        let mut aborted = false;

        loop {
            match tokio::time::timeout(Duration::from_secs(5), stream.next()).await {
                Ok(Some(Ok(bytes))) => body.extend_from_slice(&bytes),
                Ok(Some(Err(_))) => {
                    aborted = true;
                    break;
                }
                Ok(None) => break,
                Err(_) => panic!("Timed out waiting for stream frame"),
            }
        }

        AxumTestResponse {
            status,
            content_type,
            body,
            aborted,
        }
    }
}

fn content_type(response: &axum::http::Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(ToOwned::to_owned)
}

/// Wrapper around Axum HTTP response for testing
pub struct AxumTestResponse {
    status: StatusCode,
    content_type: Option<String>,
    body: Vec<u8>,
    aborted: bool,
}

impl AxumTestResponse {
    /// Get the response status code as u16 for easy assertion
    pub const fn status(&self) -> u16 {
        self.status.as_u16()
    }

    /// Get the response status code as `StatusCode`
    pub const fn status_code(&self) -> StatusCode {
        self.status
    }

    /// `Content-Type` header, if any
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Whether the body ended with a stream error
    pub const fn aborted(&self) -> bool {
        self.aborted
    }

    /// Get the response body as a JSON value
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> T {
        serde_json::from_slice(&self.body).expect("Failed to deserialize JSON response")
    }

    /// Get the response body as a string
    pub fn text(&self) -> String {
        String::from_utf8(self.body.clone()).expect("Failed to decode response as UTF-8")
    }

    /// `data:` payloads of a server-sent event body, in order
    pub fn sse_data(&self) -> Vec<String> {
        self.text()
            .split("\n\n")
            .filter_map(|event| {
                event
                    .lines()
                    .find_map(|line| line.strip_prefix("data: "))
                    .map(ToOwned::to_owned)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;

    #[tokio::test]
    async fn test_axum_test_request_get() {
        let app = Router::new().route("/test", get(|| async { "Hello" }));
        let response = AxumTestRequest::get("/test").send(app).await;
        assert_eq!(response.status(), 200);
        assert_eq!(response.text(), "Hello");
    }
}

//! HTTP utilities for Ivory REST API calls

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
pub fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut cut = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..cut], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Failure of a single HTTP exchange, before it is given a domain meaning
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("API request failed: {status} - {body}")]
    Status { status: StatusCode, body: String },
    #[error("failed to send request: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("failed to parse response JSON: {0}")]
    Decode(#[source] serde_json::Error),
}

/// HTTP client wrapper for Ivory API calls
#[derive(Clone)]
pub struct IvoryHttpClient {
    client: Client,
}

impl IvoryHttpClient {
    /// Create a new HTTP client
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("drcluster/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Make a GET request
    pub async fn get(&self, url: &str, token: Option<&str>) -> Result<Value, HttpError> {
        tracing::debug!("GET {}", url);
        let request = with_token(self.client.get(url), token);
        send(request).await
    }

    /// Make a POST request with an optional JSON body
    pub async fn post(
        &self,
        url: &str,
        token: Option<&str>,
        body: Option<&Value>,
    ) -> Result<Value, HttpError> {
        tracing::debug!("POST {}", url);

        let mut request = with_token(self.client.post(url), token);
        if let Some(body) = body {
            request = request.json(body);
        }

        send(request).await
    }

    /// Make a DELETE request
    pub async fn delete(&self, url: &str, token: Option<&str>) -> Result<Value, HttpError> {
        tracing::debug!("DELETE {}", url);
        let request = with_token(self.client.delete(url), token);
        send(request).await
    }
}

fn with_token(request: reqwest::RequestBuilder, token: Option<&str>) -> reqwest::RequestBuilder {
    match token {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

async fn send(request: reqwest::RequestBuilder) -> Result<Value, HttpError> {
    let response = request.send().await.map_err(HttpError::Transport)?;

    let status = response.status();
    let body = response.text().await.map_err(HttpError::Transport)?;

    if !status.is_success() {
        // Only the sanitized/truncated body is logged or carried further
        let body = sanitize_for_log(&body);
        tracing::error!("API error: {} - {}", status, body);
        return Err(HttpError::Status { status, body });
    }

    // Handle empty response
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str(&body).map_err(HttpError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_keeps_short_bodies() {
        assert_eq!(sanitize_for_log("not found"), "not found");
    }

    #[test]
    fn test_sanitize_strips_control_characters() {
        assert_eq!(sanitize_for_log("line1\nline2\t!"), "line1line2!");
    }

    #[test]
    fn test_sanitize_truncates_long_bodies() {
        let body = "x".repeat(500);
        let sanitized = sanitize_for_log(&body);
        assert!(sanitized.starts_with(&"x".repeat(MAX_LOG_BODY_LENGTH)));
        assert!(sanitized.ends_with("[truncated, 500 bytes total]"));
    }

    #[test]
    fn test_sanitize_respects_char_boundaries() {
        let body = "é".repeat(150);
        let sanitized = sanitize_for_log(&body);
        assert!(sanitized.contains("truncated"));
    }
}

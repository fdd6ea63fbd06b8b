//! Outbound HTTP calls to upstream services.

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::time::Duration;

use crate::error::ApiError;
use crate::health::UpstreamTarget;

#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Send one request to `target` and hand back its status and body
    /// untouched. Only transport failures are errors.
    async fn forward(
        &self,
        target: &UpstreamTarget,
        path: &str,
        method: Method,
        body: Option<Value>,
    ) -> Result<(Value, StatusCode), ApiError>;
}

/// Build the process-wide HTTP client.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, ApiError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("api-gateway/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ApiError::Configuration(format!("Failed to build HTTP client: {}", e)))
}

#[derive(Clone)]
pub struct HttpDispatcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpDispatcher {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl Dispatcher for HttpDispatcher {
    async fn forward(
        &self,
        target: &UpstreamTarget,
        path: &str,
        method: Method,
        body: Option<Value>,
    ) -> Result<(Value, StatusCode), ApiError> {
        let url = target.url(path);
        let mut request = self
            .client
            .request(method.clone(), &url)
            .timeout(self.timeout);
        if let Some(body) = &body {
            request = request.json(body);
        }

        let to_unreachable = |e: reqwest::Error| {
            tracing::warn!(
                service = %target.name,
                method = %method,
                url = %url,
                error = %e,
                "Upstream call failed"
            );
            ApiError::UpstreamUnreachable {
                service: target.name.clone(),
                timed_out: e.is_timeout(),
                message: e.to_string(),
            }
        };

        let response = request.send().await.map_err(to_unreachable)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(to_unreachable)?;

        tracing::debug!(
            service = %target.name,
            method = %method,
            url = %url,
            status = %status,
            "Upstream answered"
        );

        Ok((parse_body(&bytes), status))
    }
}

/// Upstream bodies are JSON when possible, raw text otherwise.
fn parse_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

/// Best-effort error message from an upstream error body.
pub fn error_message(body: &Value) -> String {
    body.get("message")
        .or_else(|| body.get("detail"))
        .and_then(Value::as_str)
        .map(String::from)
        .or_else(|| body.as_str().filter(|s| !s.is_empty()).map(String::from))
        .unwrap_or_else(|| "unknown error".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn dispatcher() -> HttpDispatcher {
        HttpDispatcher::new(reqwest::Client::new(), Duration::from_secs(2))
    }

    #[test]
    fn test_error_message_sources() {
        assert_eq!(error_message(&json!({"message": "User not found"})), "User not found");
        assert_eq!(error_message(&json!({"detail": "Booking not found"})), "Booking not found");
        assert_eq!(error_message(&json!("Bad Gateway")), "Bad Gateway");
        assert_eq!(error_message(&Value::Null), "unknown error");
    }

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body(b""), Value::Null);
        assert_eq!(parse_body(br#"{"a":1}"#), json!({"a": 1}));
        assert_eq!(parse_body(b"oops"), json!("oops"));
    }

    #[tokio::test]
    async fn test_forward_passes_status_and_body_through() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/v1/users")
                    .json_body(json!({"username": "johndoe"}));
                then.status(409).json_body(json!({"message": "User already exists"}));
            })
            .await;

        let target = UpstreamTarget::new("auth-service", server.base_url());
        let (body, status) = dispatcher()
            .forward(&target, "/api/v1/users", reqwest::Method::POST, Some(json!({"username": "johndoe"})))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["message"], "User already exists");
    }

    #[tokio::test]
    async fn test_connection_failure_is_unreachable() {
        let target = UpstreamTarget::new("booking-service", "http://127.0.0.1:1");
        let result = dispatcher()
            .forward(&target, "/api/v1/bookings", reqwest::Method::GET, None)
            .await;

        match result {
            Err(ApiError::UpstreamUnreachable {
                service, timed_out, ..
            }) => {
                assert_eq!(service, "booking-service");
                assert!(!timed_out);
            }
            other => panic!("expected UpstreamUnreachable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_slow_upstream_times_out() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/bookings");
                then.status(200).delay(Duration::from_millis(500));
            })
            .await;

        let dispatcher = HttpDispatcher::new(reqwest::Client::new(), Duration::from_millis(50));
        let target = UpstreamTarget::new("booking-service", server.base_url());
        let result = dispatcher
            .forward(&target, "/api/v1/bookings", reqwest::Method::GET, None)
            .await;

        assert!(matches!(
            result,
            Err(ApiError::UpstreamUnreachable { timed_out: true, .. })
        ));
    }
}

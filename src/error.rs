use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::health::ReadinessReport;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    #[error("{service} is unreachable: {message}")]
    UpstreamUnreachable {
        service: String,
        timed_out: bool,
        message: String,
    },
    #[error("{service} answered {status}: {message}")]
    UpstreamRejected {
        service: String,
        status: StatusCode,
        message: String,
    },
    #[error("Counter store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Limit of: {limit} exceeded")]
    LimitExceeded { limit: u64, retry_after_secs: u64 },
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Service is not ready")]
    NotReady(ReadinessReport),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::UpstreamUnreachable { timed_out: true, .. } => StatusCode::GATEWAY_TIMEOUT,
            ApiError::UpstreamUnreachable { .. } => StatusCode::BAD_GATEWAY,
            ApiError::UpstreamRejected { status, .. } => *status,
            ApiError::StoreUnavailable(_) | ApiError::NotReady(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::LimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Configuration(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::UpstreamUnreachable { timed_out: true, .. } => "upstream_timeout",
            ApiError::UpstreamUnreachable { .. } => "upstream_unreachable",
            ApiError::UpstreamRejected { .. } => "upstream_rejected",
            ApiError::StoreUnavailable(_) => "service_unavailable",
            ApiError::LimitExceeded { .. } => "rate_limit_exceeded",
            ApiError::Validation(_) => "validation_error",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::NotReady(_) => "not_ready",
            ApiError::Configuration(_) => "configuration_error",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl From<redis::RedisError> for ApiError {
    fn from(err: redis::RedisError) -> Self {
        ApiError::StoreUnavailable(err.to_string())
    }
}

/// Error envelope returned for every failed request.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str, code: u16) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
            code,
            upstream: None,
            detail: None,
        }
    }

    pub fn from_api_error(err: &ApiError) -> Self {
        let mut response = Self::new(err.kind(), &err.to_string(), err.status_code().as_u16());

        match err {
            ApiError::UpstreamUnreachable { service, .. } => {
                response.upstream = Some(service.clone());
            }
            ApiError::UpstreamRejected {
                service, message, ..
            } => {
                // Upstream messages are passed through as-is.
                response.upstream = Some(service.clone());
                response.message = message.clone();
            }
            ApiError::NotReady(report) => {
                response.detail = serde_json::to_value(report).ok();
            }
            _ => {}
        }

        response
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse::from_api_error(&self);
        let mut response = (status, Json(body)).into_response();

        if let ApiError::LimitExceeded {
            retry_after_secs, ..
        } = self
        {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }

        response
    }
}

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Success envelope: every successful body is `{"data": <payload>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// A `201 Created` envelope pointing at the new resource.
#[derive(Debug)]
pub struct Created<T> {
    pub location: String,
    pub body: ApiResponse<T>,
}

impl<T> Created<T> {
    pub fn new(location: impl Into<String>, data: T) -> Self {
        Self {
            location: location.into(),
            body: ApiResponse::new(data),
        }
    }
}

impl<T: Serialize> IntoResponse for Created<T> {
    fn into_response(self) -> Response {
        let mut response = (StatusCode::CREATED, Json(self.body)).into_response();
        if let Ok(location) = HeaderValue::from_str(&self.location) {
            response.headers_mut().insert(header::LOCATION, location);
        }
        response
    }
}

/// Liveness/readiness payload of a single process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChecked {
    pub status: String,
}

impl StatusChecked {
    pub fn ok() -> Self {
        Self {
            status: "OK".to_string(),
        }
    }
}

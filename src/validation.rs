//! Request validation: runs before anything is forwarded upstream.

use axum::extract::{FromRequest, Request};
use axum::{async_trait, Json};
use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::LazyLock;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::error::ApiError;
use crate::models::BookFlight;

static FLIGHT_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9]{2}[0-9]{1,4}$").expect("valid flight number regex"));

static AIRPORT_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{3}$").expect("valid airport code regex"));

pub fn validate_flight_number(value: &str) -> Result<(), ValidationError> {
    if FLIGHT_NUMBER.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::new("flight_number")
            .with_message("flight number must look like TP1234".into()))
    }
}

pub fn validate_airport_code(value: &str) -> Result<(), ValidationError> {
    if AIRPORT_CODE.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::new("airport_code")
            .with_message("airport codes are three upper-case letters".into()))
    }
}

pub fn validate_passport_number(value: &str) -> Result<(), ValidationError> {
    if !value.is_empty() && value.len() <= 20 && value.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(())
    } else {
        Err(ValidationError::new("passport_number")
            .with_message("passport number must be 1 to 20 letters or digits".into()))
    }
}

pub fn validate_route(command: &BookFlight) -> Result<(), ValidationError> {
    if command.origin == command.destination {
        return Err(ValidationError::new("route")
            .with_message("origin and destination must differ".into()));
    }
    Ok(())
}

/// Parse a resource identifier taken from the request path.
pub fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::Validation(format!("'{}' is not a valid identifier", raw)))
}

/// JSON body extractor that also runs `validator` rules.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::Validation(rejection.body_text()))?;

        value
            .validate()
            .map_err(|e| ApiError::Validation(e.to_string()))?;

        Ok(ValidatedJson(value))
    }
}

//! Typed gateway operations on top of the dispatcher.

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::dispatcher::{error_message, Dispatcher};
use crate::error::ApiError;
use crate::health::UpstreamTarget;
use crate::models::{BookFlight, FlightReserved, RegisterUser, User};
use crate::response::ApiResponse;

pub const AUTH_SERVICE: &str = "auth-service";
pub const BOOKING_SERVICE: &str = "booking-service";

const USERS_PATH: &str = "/api/v1/users";
const BOOKINGS_PATH: &str = "/api/v1/bookings";
const DOCS_PATH: &str = "/docs";

pub struct Gateway {
    dispatcher: Arc<dyn Dispatcher>,
    auth: UpstreamTarget,
    booking: UpstreamTarget,
}

impl Gateway {
    pub fn new(dispatcher: Arc<dyn Dispatcher>, auth: UpstreamTarget, booking: UpstreamTarget) -> Self {
        Self {
            dispatcher,
            auth,
            booking,
        }
    }

    /// Forward one call and decode the upstream's `{"data": ...}` envelope.
    /// Non-2xx answers become `UpstreamRejected` with the upstream's status.
    async fn call<T: DeserializeOwned>(
        &self,
        target: &UpstreamTarget,
        path: &str,
        method: Method,
        body: Option<Value>,
    ) -> Result<T, ApiError> {
        let (payload, status) = self.dispatcher.forward(target, path, method, body).await?;

        if !status.is_success() {
            tracing::debug!(service = %target.name, status = %status, "Upstream rejected request");
            return Err(ApiError::UpstreamRejected {
                service: target.name.clone(),
                status,
                message: error_message(&payload),
            });
        }

        serde_json::from_value::<ApiResponse<T>>(payload)
            .map(|envelope| envelope.data)
            .map_err(|e| ApiError::UpstreamRejected {
                service: target.name.clone(),
                status: StatusCode::BAD_GATEWAY,
                message: format!("Unexpected payload from {}: {}", target.name, e),
            })
    }

    pub fn auth_docs_url(&self) -> String {
        self.auth.url(DOCS_PATH)
    }

    pub fn booking_docs_url(&self) -> String {
        self.booking.url(DOCS_PATH)
    }

    pub async fn list_users(&self) -> Result<Vec<User>, ApiError> {
        self.call(&self.auth, USERS_PATH, Method::GET, None).await
    }

    pub async fn user_by_id(&self, id: Uuid) -> Result<User, ApiError> {
        self.call(&self.auth, &format!("{}/{}", USERS_PATH, id), Method::GET, None)
            .await
            .map_err(|e| match e {
                ApiError::UpstreamRejected {
                    service, status, ..
                } if status == StatusCode::NOT_FOUND => ApiError::UpstreamRejected {
                    service,
                    status,
                    message: "User not found".to_string(),
                },
                other => other,
            })
    }

    pub async fn create_user(&self, command: &RegisterUser) -> Result<User, ApiError> {
        let body = serde_json::to_value(command).map_err(|e| ApiError::Internal(e.to_string()))?;
        self.call(&self.auth, USERS_PATH, Method::POST, Some(body)).await
    }

    pub async fn list_bookings(&self) -> Result<Vec<FlightReserved>, ApiError> {
        self.call(&self.booking, BOOKINGS_PATH, Method::GET, None).await
    }

    pub async fn booking_by_id(&self, id: Uuid) -> Result<FlightReserved, ApiError> {
        self.call(&self.booking, &format!("{}/{}", BOOKINGS_PATH, id), Method::GET, None)
            .await
    }

    /// Verify the user with the auth service, then book with the booking
    /// service. The booking call is only issued once the user check succeeded;
    /// whichever step fails is reported with its own upstream, status and message.
    pub async fn book_flight(&self, command: &BookFlight) -> Result<FlightReserved, ApiError> {
        let _user: User = self
            .call(
                &self.auth,
                &format!("{}/{}", USERS_PATH, command.user),
                Method::GET,
                None,
            )
            .await?;

        let body = serde_json::to_value(command).map_err(|e| ApiError::Internal(e.to_string()))?;
        self.call(&self.booking, BOOKINGS_PATH, Method::POST, Some(body))
            .await
    }
}

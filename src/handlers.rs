use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect},
};
use std::sync::Arc;

use crate::error::ApiError;
use crate::gateway::Gateway;
use crate::health::{ReadinessAggregator, ReadinessReport};
use crate::middleware::RateLimitState;
use crate::models::{BookFlight, FlightReserved, RegisterUser, User};
use crate::response::{ApiResponse, Created, StatusChecked};
use crate::validation::{parse_id, ValidatedJson};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub rate_limit: RateLimitState,
    pub readiness: Arc<ReadinessAggregator>,
    pub gateway: Arc<Gateway>,
}

/// Liveness: answers immediately, never looks at dependencies.
pub async fn health_check() -> ApiResponse<StatusChecked> {
    ApiResponse::new(StatusChecked::ok())
}

/// Readiness: counter store plus every upstream.
pub async fn readiness_check(
    State(state): State<AppState>,
) -> Result<ApiResponse<ReadinessReport>, ApiError> {
    let report = state.readiness.check_readiness().await?;
    Ok(ApiResponse::new(report))
}

/// Send callers to the auth service's own API docs.
pub async fn auth_docs(State(state): State<AppState>) -> Redirect {
    Redirect::temporary(&state.gateway.auth_docs_url())
}

pub async fn booking_docs(State(state): State<AppState>) -> Redirect {
    Redirect::temporary(&state.gateway.booking_docs_url())
}

pub async fn list_users(State(state): State<AppState>) -> Result<ApiResponse<Vec<User>>, ApiError> {
    Ok(ApiResponse::new(state.gateway.list_users().await?))
}

pub async fn user_by_id(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<ApiResponse<User>, ApiError> {
    let id = parse_id(&user_id)?;
    Ok(ApiResponse::new(state.gateway.user_by_id(id).await?))
}

pub async fn create_user(
    State(state): State<AppState>,
    ValidatedJson(command): ValidatedJson<RegisterUser>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.gateway.create_user(&command).await?;
    Ok(Created::new(format!("/auth-service/users/{}", user.id), user))
}

pub async fn list_bookings(
    State(state): State<AppState>,
) -> Result<ApiResponse<Vec<FlightReserved>>, ApiError> {
    Ok(ApiResponse::new(state.gateway.list_bookings().await?))
}

pub async fn booking_by_id(
    State(state): State<AppState>,
    Path(booking_id): Path<String>,
) -> Result<ApiResponse<FlightReserved>, ApiError> {
    let id = parse_id(&booking_id)?;
    Ok(ApiResponse::new(state.gateway.booking_by_id(id).await?))
}

/// Book a flight: user check with the auth service, then the booking itself.
pub async fn create_booking(
    State(state): State<AppState>,
    ValidatedJson(command): ValidatedJson<BookFlight>,
) -> Result<impl IntoResponse, ApiError> {
    let reserved = state.gateway.book_flight(&command).await?;
    Ok(Created::new(
        format!("/booking-service/bookings/{}", reserved.id),
        reserved,
    ))
}

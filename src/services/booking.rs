//! Booking service: in-memory flight reservations.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{middleware, Router};
use chrono::Utc;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use super::actuator_routes;
use super::repository::{Entity, InMemoryRepository, Repository};
use crate::error::ApiError;
use crate::middleware::logging_middleware;
use crate::models::{BookFlight, FlightReserved};
use crate::response::{ApiResponse, Created};
use crate::validation::{parse_id, ValidatedJson};

impl Entity for FlightReserved {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl FlightReserved {
    /// Reserve the requested flight; both timestamps default to now.
    pub fn reserve(command: BookFlight) -> Self {
        let now = Utc::now().naive_utc();
        Self {
            id: Uuid::new_v4(),
            user: command.user,
            flight_number: command.flight_number,
            origin: command.origin,
            destination: command.destination,
            departure_time: now,
            arrival_time: now,
            passengers: command.passengers,
        }
    }
}

#[derive(Clone)]
pub struct BookingState {
    pub bookings: Arc<dyn Repository<FlightReserved>>,
}

impl BookingState {
    pub fn in_memory() -> Self {
        Self {
            bookings: Arc::new(InMemoryRepository::<FlightReserved>::new()),
        }
    }
}

pub fn router(state: BookingState) -> Router {
    Router::new()
        .merge(actuator_routes())
        .route("/api/v1/bookings", get(get_bookings).post(book_flight))
        .route("/api/v1/bookings/:booking_id", get(get_booking))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(logging_middleware)),
        )
}

pub async fn get_bookings(State(state): State<BookingState>) -> ApiResponse<Vec<FlightReserved>> {
    ApiResponse::new(state.bookings.list().await)
}

pub async fn get_booking(
    State(state): State<BookingState>,
    Path(booking_id): Path<String>,
) -> Result<ApiResponse<FlightReserved>, ApiError> {
    let id = parse_id(&booking_id)?;
    state
        .bookings
        .get(id)
        .await
        .map(ApiResponse::new)
        .ok_or_else(|| ApiError::NotFound("Booking not found".to_string()))
}

pub async fn book_flight(
    State(state): State<BookingState>,
    ValidatedJson(command): ValidatedJson<BookFlight>,
) -> Result<impl IntoResponse, ApiError> {
    let reserved = state.bookings.insert(FlightReserved::reserve(command)).await?;

    tracing::info!(
        booking_id = %reserved.id,
        flight_number = %reserved.flight_number,
        "Flight reserved"
    );
    Ok(Created::new(
        format!("/api/v1/bookings/{}", reserved.id),
        reserved,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    fn book(body: Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/api/v1/bookings")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn command() -> Value {
        json!({
            "user": Uuid::new_v4(),
            "flightNumber": "TP1234",
            "origin": "LIS",
            "destination": "OPO",
            "passengers": [
                {"fullName": "John Doe", "birthDate": "1990-01-01", "passportNumber": "123456789"}
            ]
        })
    }

    #[tokio::test]
    async fn test_booking_round_trips() {
        let app = router(BookingState::in_memory());

        let (status, created) = send(&app, book(command())).await;
        assert_eq!(status, StatusCode::CREATED);

        let id = created["data"]["id"].as_str().unwrap();
        let (status, fetched) = send(
            &app,
            Request::builder()
                .uri(format!("/api/v1/bookings/{}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_invalid_booking_is_unprocessable() {
        let app = router(BookingState::in_memory());
        let mut body = command();
        body["passengers"] = json!([]);

        let (status, _) = send(&app, book(body)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_unknown_booking_is_not_found() {
        let app = router(BookingState::in_memory());
        let (status, body) = send(
            &app,
            Request::builder()
                .uri(format!("/api/v1/bookings/{}", Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Booking not found");
    }
}

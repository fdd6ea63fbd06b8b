//! Wire schemas shared by the gateway and the upstream services.
//! Field names are camelCase on the wire.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::validation::{validate_airport_code, validate_flight_number, validate_passport_number};

/// Command: register a new user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUser {
    #[validate(length(min = 1, max = 64, message = "username must be 1 to 64 characters"))]
    pub username: String,
    #[validate(length(min = 1, message = "password cannot be empty"))]
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

/// A user as exposed to callers. Passwords never leave the auth service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Passenger {
    #[validate(length(min = 1, message = "full name cannot be empty"))]
    pub full_name: String,
    pub birth_date: NaiveDate,
    #[validate(custom(function = "validate_passport_number"))]
    pub passport_number: String,
}

/// Command: book a flight for an existing user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "crate::validation::validate_route"))]
pub struct BookFlight {
    /// Identifier of the user making the reservation.
    pub user: Uuid,
    #[validate(custom(function = "validate_flight_number"))]
    pub flight_number: String,
    #[validate(custom(function = "validate_airport_code"))]
    pub origin: String,
    #[validate(custom(function = "validate_airport_code"))]
    pub destination: String,
    #[validate(length(min = 1, message = "at least one passenger is required"), nested)]
    pub passengers: Vec<Passenger>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightReserved {
    pub id: Uuid,
    pub user: Uuid,
    pub flight_number: String,
    pub origin: String,
    pub destination: String,
    pub departure_time: NaiveDateTime,
    pub arrival_time: NaiveDateTime,
    pub passengers: Vec<Passenger>,
}

//! Simple auth service: an in-memory user directory.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{middleware, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use super::actuator_routes;
use super::repository::{Entity, InMemoryRepository, Repository};
use crate::error::ApiError;
use crate::middleware::logging_middleware;
use crate::models::{RegisterUser, User};
use crate::response::{ApiResponse, Created};
use crate::validation::{parse_id, ValidatedJson};

/// A stored user, password included.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub password: String,
    pub name: Option<String>,
    pub last_name: Option<String>,
}

impl UserRecord {
    pub fn register(command: RegisterUser) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: command.username.trim().to_string(),
            password: command.password,
            name: command.name,
            last_name: command.last_name,
        }
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id,
            username: self.username.clone(),
            name: self.name.clone(),
            last_name: self.last_name.clone(),
        }
    }
}

impl Entity for UserRecord {
    fn id(&self) -> Uuid {
        self.id
    }

    fn unique_key(&self) -> Option<&str> {
        Some(&self.username)
    }
}

#[derive(Clone)]
pub struct AuthState {
    pub users: Arc<dyn Repository<UserRecord>>,
}

impl AuthState {
    pub fn in_memory() -> Self {
        Self {
            users: Arc::new(InMemoryRepository::<UserRecord>::new()),
        }
    }
}

pub fn router(state: AuthState) -> Router {
    Router::new()
        .merge(actuator_routes())
        .route("/api/v1/users", get(get_users).post(create_user))
        .route("/api/v1/users/:user_id", get(get_user))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(logging_middleware)),
        )
}

pub async fn get_users(State(state): State<AuthState>) -> ApiResponse<Vec<User>> {
    let users = state.users.list().await;
    ApiResponse::new(users.iter().map(UserRecord::to_user).collect())
}

pub async fn get_user(
    State(state): State<AuthState>,
    Path(user_id): Path<String>,
) -> Result<ApiResponse<User>, ApiError> {
    let id = parse_id(&user_id)?;
    state
        .users
        .get(id)
        .await
        .map(|record| ApiResponse::new(record.to_user()))
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

pub async fn create_user(
    State(state): State<AuthState>,
    ValidatedJson(command): ValidatedJson<RegisterUser>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state
        .users
        .insert(UserRecord::register(command))
        .await
        .map_err(|e| match e {
            ApiError::Conflict(_) => ApiError::Conflict("User already exists".to_string()),
            other => other,
        })?;

    tracing::info!(user_id = %record.id, "User registered");
    Ok(Created::new(
        format!("/api/v1/users/{}", record.id),
        record.to_user(),
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

    fn register(username: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/api/v1/users")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({"username": username, "password": "secret", "lastName": "Doe"}).to_string(),
            ))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_created_user_round_trips() {
        let app = router(AuthState::in_memory());

        let (status, created) = send(&app, register("johndoe")).await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(created["data"].get("password").is_none());

        let id = created["data"]["id"].as_str().unwrap();
        let (status, fetched) = send(&app, get_request(&format!("/api/v1/users/{}", id))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, created);
        assert_eq!(fetched["data"]["lastName"], "Doe");
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let app = router(AuthState::in_memory());

        send(&app, register("johndoe")).await;
        let (status, body) = send(&app, register("johndoe")).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["message"], "User already exists");
    }

    #[tokio::test]
    async fn test_unknown_user_is_not_found() {
        let app = router(AuthState::in_memory());
        let (status, body) =
            send(&app, get_request(&format!("/api/v1/users/{}", Uuid::new_v4()))).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "User not found");
    }

    #[tokio::test]
    async fn test_list_users() {
        let app = router(AuthState::in_memory());
        send(&app, register("alice")).await;
        send(&app, register("bob")).await;

        let (status, body) = send(&app, get_request("/api/v1/users")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_readiness() {
        let app = router(AuthState::in_memory());
        let (status, body) = send(&app, get_request("/readiness")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"data": {"status": "OK"}}));
    }
}

//! Demo upstream services fronted by the gateway.

pub mod auth;
pub mod booking;
pub mod repository;

use axum::routing::get;
use axum::Router;

use crate::response::{ApiResponse, StatusChecked};

/// Liveness and readiness routes shared by every upstream service.
pub fn actuator_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(check_liveness))
        .route("/readiness", get(check_readiness))
}

pub async fn check_liveness() -> ApiResponse<StatusChecked> {
    ApiResponse::new(StatusChecked::ok())
}

/// The demo services have no dependencies, so ready means alive.
pub async fn check_readiness() -> ApiResponse<StatusChecked> {
    ApiResponse::new(StatusChecked::ok())
}

/// Install logging and serve `app` until Ctrl+C / SIGTERM.
pub async fn run_service(
    name: &str,
    bind: std::net::SocketAddr,
    log_level: &str,
    app: Router,
) -> anyhow::Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("api_gateway={},tower_http=debug", log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("{} listening on {}", name, bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(crate::server::shutdown_signal())
        .await?;

    tracing::info!("{} stopped", name);
    Ok(())
}

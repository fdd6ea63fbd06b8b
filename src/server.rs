use crate::config::Config;
use crate::config_validator::ConfigValidator;
use crate::dispatcher::{build_client, Dispatcher, HttpDispatcher};
use crate::error::ApiError;
use crate::gateway::{Gateway, AUTH_SERVICE, BOOKING_SERVICE};
use crate::handlers::{
    auth_docs, booking_by_id, booking_docs, create_booking, create_user, health_check,
    list_bookings, list_users, readiness_check, user_by_id, AppState,
};
use crate::health::{HttpProber, Prober, ReadinessAggregator, UpstreamTarget};
use crate::middleware::{logging_middleware, rate_limit_middleware, RateLimitState};
use crate::rate_limiter::RateLimiter;
use crate::redis::RedisCounterStore;
use crate::store::CounterStore;
use axum::routing::get;
use axum::{middleware, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub struct Server {
    app: Router,
    bind_addr: SocketAddr,
}

impl Server {
    /// Validate the configuration and build every long-lived resource once:
    /// the HTTP client, the counter store and the application state.
    pub fn new(config: Config) -> Result<Self, ApiError> {
        ConfigValidator::validate(&config)?;

        let client = build_client(config.upstreams.timeout.0)?;
        let store: Arc<dyn CounterStore> = Arc::new(RedisCounterStore::new(&config.redis)?);
        let prober: Arc<dyn Prober> = Arc::new(HttpProber::new(client.clone()));
        let dispatcher: Arc<dyn Dispatcher> =
            Arc::new(HttpDispatcher::new(client, config.upstreams.timeout.0));

        let state = app_state(&config, store, prober, dispatcher);

        Ok(Self {
            app: create_app(state),
            bind_addr: config.bind_addr,
        })
    }

    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let listener = tokio::net::TcpListener::bind(self.bind_addr).await?;

        tracing::info!("API gateway listening on {}", self.bind_addr);
        tracing::info!("Liveness check available at /health");
        tracing::info!("Readiness check available at /readiness");

        axum::serve(
            listener,
            self.app
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        tracing::info!("API gateway stopped");
        Ok(())
    }
}

/// Upstreams in the order they appear in readiness reports.
pub fn upstream_targets(config: &Config) -> (UpstreamTarget, UpstreamTarget) {
    (
        UpstreamTarget::new(AUTH_SERVICE, config.upstreams.auth_service_url.as_str()),
        UpstreamTarget::new(BOOKING_SERVICE, config.upstreams.booking_service_url.as_str()),
    )
}

/// Wire the application state from injected capabilities.
pub fn app_state(
    config: &Config,
    store: Arc<dyn CounterStore>,
    prober: Arc<dyn Prober>,
    dispatcher: Arc<dyn Dispatcher>,
) -> AppState {
    let (auth, booking) = upstream_targets(config);

    let limiter = Arc::new(RateLimiter::new(store.clone(), &config.limiter));
    let readiness = Arc::new(ReadinessAggregator::new(
        prober,
        store,
        vec![auth.clone(), booking.clone()],
        config.limiter.enabled,
        config.upstreams.readiness_timeout.0,
    ));

    AppState {
        rate_limit: RateLimitState::new(limiter, &config.limiter),
        readiness,
        gateway: Arc::new(Gateway::new(dispatcher, auth, booking)),
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        // Actuator
        .route("/health", get(health_check))
        .route("/readiness", get(readiness_check))
        // Auth service
        .route("/auth-service/docs", get(auth_docs))
        .route("/auth-service/users", get(list_users).post(create_user))
        .route("/auth-service/users/:user_id", get(user_by_id))
        // Booking service
        .route("/booking-service/docs", get(booking_docs))
        .route(
            "/booking-service/bookings",
            get(list_bookings).post(create_booking),
        )
        .route("/booking-service/bookings/:booking_id", get(booking_by_id))
        .layer(middleware::from_fn_with_state(
            state.rate_limit.clone(),
            rate_limit_middleware,
        ))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(logging_middleware)),
        )
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        },
    }
}

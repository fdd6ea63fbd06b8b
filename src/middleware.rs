use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{LimiterConfig, PathList};
use crate::error::ApiError;
use crate::key_generator::KeyGenerator;
use crate::rate_limiter::{Decision, RateLimiter};

/// Everything the rate limit gate needs per request.
#[derive(Clone)]
pub struct RateLimitState {
    pub limiter: Arc<RateLimiter>,
    pub key_generator: KeyGenerator,
    pub exempt_paths: PathList,
    pub fail_open_paths: PathList,
}

impl RateLimitState {
    pub fn new(limiter: Arc<RateLimiter>, config: &LimiterConfig) -> Self {
        Self {
            limiter,
            key_generator: KeyGenerator::from_trust(config.trust_forwarded_headers),
            exempt_paths: config.exempt_paths.clone(),
            fail_open_paths: config.fail_open_paths.clone(),
        }
    }
}

/// Logging middleware for request/response tracking
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let client_ip = peer_ip(&request);

    info!(
        target: "api_gateway::middleware",
        method = %method,
        uri = %uri,
        client_ip = %client_ip,
        "Incoming request"
    );

    let response = next.run(request).await;

    let status = response.status();
    info!(
        target: "api_gateway::middleware",
        method = %method,
        uri = %uri,
        status = %status,
        "Request completed"
    );

    response
}

/// Per-client request gate in front of every route.
///
/// Exempt paths skip the limiter entirely. When the counter store is down,
/// fail-open paths are admitted and everything else gets a 503.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    if !state.limiter.is_enabled() || state.exempt_paths.contains(&path) {
        return next.run(request).await;
    }

    let client_id = state.key_generator.client_identifier(&request);

    match state.limiter.admit(&client_id).await {
        Ok(Decision::Allow) => next.run(request).await,
        Ok(Decision::Reject {
            limit,
            retry_after_secs,
        }) => {
            warn!(client_ip = %client_id, path = %path, limit, "Rate limit exceeded");
            ApiError::LimitExceeded {
                limit,
                retry_after_secs,
            }
            .into_response()
        }
        Err(e) if state.fail_open_paths.contains(&path) => {
            warn!(
                client_ip = %client_id,
                path = %path,
                error = %e,
                "Counter store unavailable, admitting fail-open path"
            );
            next.run(request).await
        }
        Err(e) => {
            warn!(client_ip = %client_id, path = %path, error = %e, "Counter store unavailable");
            match e {
                ApiError::StoreUnavailable(_) => e,
                other => ApiError::StoreUnavailable(other.to_string()),
            }
            .into_response()
        }
    }
}

fn peer_ip(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

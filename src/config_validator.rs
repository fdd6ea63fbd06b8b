use crate::config::{Config, LimiterConfig, RedisConfig, UpstreamConfig};
use crate::error::ApiError;

/// Validates configuration objects for consistency and correctness
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validates the whole gateway configuration
    pub fn validate(config: &Config) -> Result<(), ApiError> {
        Self::validate_log_level(&config.log_level)?;
        Self::validate_limiter(&config.limiter)?;
        Self::validate_upstreams(&config.upstreams)?;
        Self::validate_redis(&config.redis)?;
        Ok(())
    }

    /// Validates an upstream base URL
    pub fn validate_service_url(name: &str, url: &str) -> Result<(), ApiError> {
        if url.is_empty() {
            return Err(ApiError::Configuration(format!(
                "{} URL cannot be empty",
                name
            )));
        }

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ApiError::Configuration(format!(
                "{} URL must start with 'http://' or 'https://'",
                name
            )));
        }

        Ok(())
    }

    /// Validates rate limit parameters
    pub fn validate_limiter(limiter: &LimiterConfig) -> Result<(), ApiError> {
        if limiter.max_requests == 0 {
            return Err(ApiError::Configuration(
                "MAX_REQUESTS must be greater than 0".to_string(),
            ));
        }

        if limiter.request_time_limit.0.as_secs() == 0 {
            return Err(ApiError::Configuration(
                "REQUEST_TIME_LIMIT must be greater than 0".to_string(),
            ));
        }

        for path in limiter
            .exempt_paths
            .0
            .iter()
            .chain(limiter.fail_open_paths.0.iter())
        {
            if !path.starts_with('/') {
                return Err(ApiError::Configuration(format!(
                    "Limiter path '{}' must start with '/'",
                    path
                )));
            }
        }

        Ok(())
    }

    pub fn validate_upstreams(upstreams: &UpstreamConfig) -> Result<(), ApiError> {
        Self::validate_service_url("AUTH_SERVICE", &upstreams.auth_service_url)?;
        Self::validate_service_url("BOOKING_SERVICE", &upstreams.booking_service_url)?;

        if upstreams.timeout.0.is_zero() || upstreams.readiness_timeout.0.is_zero() {
            return Err(ApiError::Configuration(
                "Upstream timeouts must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn validate_redis(redis: &RedisConfig) -> Result<(), ApiError> {
        if redis.host.trim().is_empty() {
            return Err(ApiError::Configuration(
                "REDIS_HOST cannot be empty".to_string(),
            ));
        }

        if redis.port == 0 {
            return Err(ApiError::Configuration(
                "REDIS_PORT must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Validates log level
    pub fn validate_log_level(level: &str) -> Result<(), ApiError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&level.to_lowercase().as_str()) {
            return Err(ApiError::Configuration(format!(
                "Invalid log level '{}'. Must be one of: {:?}",
                level, valid_levels
            )));
        }

        Ok(())
    }
}

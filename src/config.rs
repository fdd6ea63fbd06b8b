use envconfig::Envconfig;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Envconfig, Clone)]
pub struct Config {
    /// Server bind address
    #[envconfig(from = "BIND_ADDR", default = "0.0.0.0:8080")]
    pub bind_addr: SocketAddr,

    /// Default log level for the gateway's own targets
    #[envconfig(from = "LOG_LEVEL", default = "info")]
    pub log_level: String,

    #[envconfig(nested = true)]
    pub limiter: LimiterConfig,

    #[envconfig(nested = true)]
    pub upstreams: UpstreamConfig,

    #[envconfig(nested = true)]
    pub redis: RedisConfig,
}

#[derive(Debug, Envconfig, Clone)]
pub struct LimiterConfig {
    /// Enable the rate limiter middleware
    #[envconfig(from = "USE_LIMITER", default = "false")]
    pub enabled: bool,

    /// Requests admitted per client before the window closes
    #[envconfig(from = "MAX_REQUESTS", default = "10")]
    pub max_requests: u64,

    /// Window length in seconds, counted from the first rejection
    #[envconfig(from = "REQUEST_TIME_LIMIT", default = "60")]
    pub request_time_limit: EnvSecsDuration,

    /// Paths that never touch the limiter
    #[envconfig(from = "LIMITER_EXEMPT_PATHS", default = "/health,/readiness")]
    pub exempt_paths: PathList,

    /// Paths admitted when the counter store is unreachable
    #[envconfig(from = "LIMITER_FAIL_OPEN_PATHS", default = "/health")]
    pub fail_open_paths: PathList,

    /// Use X-Forwarded-For / X-Real-IP as the client identifier
    #[envconfig(from = "TRUST_FORWARDED_HEADERS", default = "false")]
    pub trust_forwarded_headers: bool,
}

#[derive(Debug, Envconfig, Clone)]
pub struct UpstreamConfig {
    #[envconfig(from = "AUTH_SERVICE_URL", default = "http://localhost:8000")]
    pub auth_service_url: String,

    #[envconfig(from = "BOOKING_SERVICE_URL", default = "http://localhost:8001")]
    pub booking_service_url: String,

    /// Timeout for forwarded requests
    #[envconfig(from = "TIMEOUT", default = "59")]
    pub timeout: EnvSecsDuration,

    /// Timeout for each readiness probe
    #[envconfig(from = "READINESS_TIMEOUT", default = "5")]
    pub readiness_timeout: EnvSecsDuration,
}

#[derive(Debug, Envconfig, Clone)]
pub struct RedisConfig {
    #[envconfig(from = "REDIS_HOST", default = "localhost")]
    pub host: String,

    #[envconfig(from = "REDIS_PORT", default = "6379")]
    pub port: u16,

    /// Connect in cluster mode
    #[envconfig(from = "REDIS_CLUSTER", default = "false")]
    pub cluster: bool,

    #[envconfig(from = "REDIS_TIMEOUT_MS", default = "500")]
    pub timeout_ms: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, envconfig::Error> {
        Config::init_from_env()
    }
}

impl RedisConfig {
    pub fn url(&self) -> String {
        format!("redis://{}:{}", self.host, self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvSecsDuration(pub Duration);

#[derive(Debug, PartialEq, Eq)]
pub struct ParseEnvSecsDurationError;

impl FromStr for EnvSecsDuration {
    type Err = ParseEnvSecsDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let secs = s.trim().parse::<u64>().map_err(|_| ParseEnvSecsDurationError)?;

        Ok(EnvSecsDuration(Duration::from_secs(secs)))
    }
}

/// Comma-separated list of request paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathList(pub Vec<String>);

impl PathList {
    pub fn contains(&self, path: &str) -> bool {
        self.0.iter().any(|p| p == path)
    }
}

impl FromStr for PathList {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(PathList(
            s.split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect(),
        ))
    }
}

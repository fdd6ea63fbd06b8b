use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::cluster::ClusterClient;
use redis::cluster_async::ClusterConnection;
use redis::{Client, Cmd, FromRedisValue, RedisResult, Script};
use std::future::Future;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::timeout;

use crate::config::RedisConfig;
use crate::error::ApiError;
use crate::store::CounterStore;

// Sets the TTL only when the key exists without one (TTL == -1).
const EXPIRE_IF_UNSET_SCRIPT: &str = r#"
if redis.call('TTL', KEYS[1]) == -1 then
    return redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return 0
"#;

enum Backend {
    Single(Client),
    Cluster(ClusterClient),
}

#[derive(Clone)]
enum StoreConnection {
    Single(MultiplexedConnection),
    Cluster(ClusterConnection),
}

/// Redis-backed counter store.
///
/// The connection is opened on first use and cached. Any failed command
/// drops the cached connection so the next call reconnects, which lets the
/// gateway start (and report itself unready) while Redis is down.
///
/// Each operation, connecting included, runs under a single
/// `REDIS_TIMEOUT_MS` deadline. The cache lock is never held across I/O.
pub struct RedisCounterStore {
    backend: Backend,
    connection: RwLock<Option<StoreConnection>>,
    command_timeout: Duration,
    expire_script: Script,
}

impl RedisCounterStore {
    pub fn new(config: &RedisConfig) -> Result<Self, ApiError> {
        let url = config.url();
        let backend = if config.cluster {
            Backend::Cluster(ClusterClient::new(vec![url]).map_err(|e| {
                ApiError::Configuration(format!("Failed to create Redis cluster client: {}", e))
            })?)
        } else {
            Backend::Single(Client::open(url).map_err(|e| {
                ApiError::Configuration(format!("Failed to create Redis client: {}", e))
            })?)
        };

        Ok(Self {
            backend,
            connection: RwLock::new(None),
            command_timeout: config.timeout(),
            expire_script: Script::new(EXPIRE_IF_UNSET_SCRIPT),
        })
    }

    async fn connection(&self) -> RedisResult<StoreConnection> {
        if let Some(conn) = self.connection.read().await.as_ref() {
            return Ok(conn.clone());
        }

        let conn = match &self.backend {
            Backend::Single(client) => {
                StoreConnection::Single(client.get_multiplexed_async_connection().await?)
            }
            Backend::Cluster(client) => StoreConnection::Cluster(client.get_async_connection().await?),
        };
        tracing::debug!("Connected to Redis");

        // Another task may have connected meanwhile; keep the first one.
        let mut guard = self.connection.write().await;
        Ok(guard.get_or_insert(conn).clone())
    }

    /// Run `op` under the command deadline, dropping the cached connection
    /// when it fails or times out.
    async fn bounded<T>(
        &self,
        what: &str,
        op: impl Future<Output = RedisResult<T>>,
    ) -> Result<T, ApiError> {
        let result = match timeout(self.command_timeout, op).await {
            Ok(result) => result.map_err(ApiError::from),
            Err(_) => Err(ApiError::StoreUnavailable(format!(
                "Redis did not answer within {}ms",
                self.command_timeout.as_millis()
            ))),
        };

        if let Err(e) = &result {
            tracing::warn!(error = %e, "Redis {} failed, dropping connection", what);
            *self.connection.write().await = None;
        }
        result
    }

    async fn query<T: FromRedisValue>(&self, cmd: &Cmd) -> Result<T, ApiError> {
        self.bounded("command", async {
            match self.connection().await? {
                StoreConnection::Single(mut c) => cmd.query_async::<_, T>(&mut c).await,
                StoreConnection::Cluster(mut c) => cmd.query_async::<_, T>(&mut c).await,
            }
        })
        .await
    }

    async fn eval_expire_script(&self, key: &str, ttl_secs: u64) -> Result<i64, ApiError> {
        let mut invocation = self.expire_script.key(key);
        invocation.arg(ttl_secs);

        self.bounded("script", async {
            match self.connection().await? {
                StoreConnection::Single(mut c) => invocation.invoke_async::<_, i64>(&mut c).await,
                StoreConnection::Cluster(mut c) => invocation.invoke_async::<_, i64>(&mut c).await,
            }
        })
        .await
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn incr(&self, key: &str) -> Result<u64, ApiError> {
        let mut cmd = redis::cmd("INCR");
        cmd.arg(key);
        self.query::<u64>(&cmd).await
    }

    async fn expire_if_unset(&self, key: &str, ttl: Duration) -> Result<bool, ApiError> {
        let set = self.eval_expire_script(key, ttl.as_secs().max(1)).await?;
        Ok(set == 1)
    }

    async fn exists(&self, key: &str) -> Result<bool, ApiError> {
        let mut cmd = redis::cmd("EXISTS");
        cmd.arg(key);
        self.query::<bool>(&cmd).await
    }

    async fn ping(&self) -> Result<(), ApiError> {
        let reply = self.query::<String>(&redis::cmd("PING")).await?;
        if reply == "PONG" {
            Ok(())
        } else {
            Err(ApiError::StoreUnavailable(format!(
                "Unexpected PING reply: {}",
                reply
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_config() -> RedisConfig {
        RedisConfig {
            host: "127.0.0.1".to_string(),
            // Nothing listens on port 1.
            port: 1,
            cluster: false,
            timeout_ms: 200,
        }
    }

    #[test]
    fn test_create_client_does_not_connect() {
        assert!(RedisCounterStore::new(&unreachable_config()).is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_redis_is_store_unavailable() {
        let store = RedisCounterStore::new(&unreachable_config()).unwrap();

        assert!(matches!(store.ping().await, Err(ApiError::StoreUnavailable(_))));
        assert!(matches!(
            store.incr("rate-limiter:127.0.0.1").await,
            Err(ApiError::StoreUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_calls_share_one_deadline() {
        // Accepts connections and never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let store = RedisCounterStore::new(&RedisConfig {
            host: "127.0.0.1".to_string(),
            port,
            cluster: false,
            timeout_ms: 200,
        })
        .unwrap();

        let started = std::time::Instant::now();
        let results = futures::future::join_all((0..5).map(|_| store.ping())).await;

        assert!(results
            .iter()
            .all(|r| matches!(r, Err(ApiError::StoreUnavailable(_)))));
        assert!(started.elapsed() < Duration::from_millis(600));
    }
}

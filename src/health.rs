//! Upstream probing and readiness aggregation.

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::error::ApiError;
use crate::store::CounterStore;

/// Name reported for the counter store component.
pub const STORE_COMPONENT: &str = "redis";

/// A named upstream service, fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamTarget {
    pub name: String,
    pub base_url: String,
}

impl UpstreamTarget {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeStatus {
    /// The component answered with a success status.
    #[serde(rename = "healthy")]
    Ok,
    /// The component answered, but reported a failure.
    #[serde(rename = "unhealthy")]
    Error,
    /// The component could not be reached at all.
    #[serde(rename = "offline")]
    Offline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub name: String,
    pub status: ProbeStatus,
}

impl ProbeResult {
    pub fn new(name: impl Into<String>, status: ProbeStatus) -> Self {
        Self {
            name: name.into(),
            status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessReport {
    pub status: ProbeStatus,
    pub components: Vec<ProbeResult>,
}

impl ReadinessReport {
    /// The overall status is `Ok` only if every component is `Ok`; otherwise
    /// it is the status of the first failing component.
    pub fn from_components(components: Vec<ProbeResult>) -> Self {
        let status = components
            .iter()
            .map(|c| c.status)
            .find(|s| *s != ProbeStatus::Ok)
            .unwrap_or(ProbeStatus::Ok);

        Self { status, components }
    }

    pub fn is_ready(&self) -> bool {
        self.status == ProbeStatus::Ok
    }
}

#[async_trait]
pub trait Prober: Send + Sync {
    /// Probe `target`. Never fails: every outcome is a `ProbeResult`.
    async fn probe(&self, target: &UpstreamTarget, timeout: Duration) -> ProbeResult;
}

/// Probes `GET {base_url}/readiness` over HTTP.
#[derive(Clone)]
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, target: &UpstreamTarget, timeout: Duration) -> ProbeResult {
        let url = target.url("/readiness");
        let status = match self.client.get(&url).timeout(timeout).send().await {
            Ok(response) if response.status() == StatusCode::OK => ProbeStatus::Ok,
            Ok(response) => {
                tracing::warn!(
                    service = %target.name,
                    status = %response.status(),
                    "Readiness probe failed: non-success status"
                );
                ProbeStatus::Error
            }
            Err(e) => {
                tracing::warn!(
                    service = %target.name,
                    timed_out = e.is_timeout(),
                    error = %e,
                    "Readiness probe failed: upstream unreachable"
                );
                ProbeStatus::Offline
            }
        };

        ProbeResult::new(target.name.clone(), status)
    }
}

/// Combines the counter store and every upstream into one verdict.
pub struct ReadinessAggregator {
    prober: Arc<dyn Prober>,
    store: Arc<dyn CounterStore>,
    targets: Vec<UpstreamTarget>,
    include_store: bool,
    timeout: Duration,
}

impl ReadinessAggregator {
    pub fn new(
        prober: Arc<dyn Prober>,
        store: Arc<dyn CounterStore>,
        targets: Vec<UpstreamTarget>,
        include_store: bool,
        timeout: Duration,
    ) -> Self {
        Self {
            prober,
            store,
            targets,
            include_store,
            timeout,
        }
    }

    async fn probe_store(&self) -> ProbeResult {
        let status = match timeout(self.timeout, self.store.ping()).await {
            Ok(Ok(())) => ProbeStatus::Ok,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Counter store ping failed");
                ProbeStatus::Offline
            }
            Err(_) => {
                tracing::warn!("Counter store ping timed out");
                ProbeStatus::Offline
            }
        };

        ProbeResult::new(STORE_COMPONENT, status)
    }

    /// Build the report without judging it.
    pub async fn report(&self) -> ReadinessReport {
        let mut components = Vec::with_capacity(self.targets.len() + 1);

        if self.include_store {
            components.push(self.probe_store().await);
        }

        let probes = self
            .targets
            .iter()
            .map(|target| self.prober.probe(target, self.timeout));
        components.extend(join_all(probes).await);

        ReadinessReport::from_components(components)
    }

    /// Probe everything; an unready report is returned as `ApiError::NotReady`.
    pub async fn check_readiness(&self) -> Result<ReadinessReport, ApiError> {
        let report = self.report().await;

        if report.is_ready() {
            Ok(report)
        } else {
            Err(ApiError::NotReady(report))
        }
    }
}

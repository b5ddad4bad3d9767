//! Node health check, independent of any session.

use std::time::Duration;

use indexmap::IndexMap;
use sa_schemas::{HealthReport, NodeHealth};
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::HealthError;

#[derive(Debug, Clone)]
pub struct HealthClient {
    http: reqwest::Client,
    url: String,
}

impl HealthClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
        }
    }

    /// One check. Values other than `"up"` / `"down"` map to
    /// [`NodeHealth::Unknown`]; node order follows the payload.
    pub async fn check(&self) -> Result<HealthReport, HealthError> {
        let resp = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| HealthError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(HealthError::Status(status.as_u16()));
        }

        let raw: IndexMap<String, Value> = resp
            .json()
            .await
            .map_err(|e| HealthError::Decode(e.to_string()))?;

        let nodes = raw
            .into_iter()
            .map(|(node, v)| {
                let health = v.as_str().map(NodeHealth::from_wire).unwrap_or(NodeHealth::Unknown);
                (node, health)
            })
            .collect();

        Ok(HealthReport {
            checked_at: chrono::Utc::now(),
            nodes,
        })
    }
}

/// Latest poll result. A failed check keeps the previous report and records
/// the error.
#[derive(Debug, Clone, Default)]
pub struct HealthStatus {
    pub report: Option<HealthReport>,
    pub last_error: Option<String>,
}

/// Check immediately, then every `interval`, publishing into a watch channel.
/// The task stops once every receiver is dropped.
pub fn spawn_health_poller(
    client: HealthClient,
    interval: Duration,
) -> (watch::Receiver<HealthStatus>, JoinHandle<()>) {
    let (tx, rx) = watch::channel(HealthStatus::default());

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if tx.is_closed() {
                break;
            }
            match client.check().await {
                Ok(report) => {
                    debug!(nodes = report.nodes.len(), up = report.up_count(), "health check");
                    tx.send_replace(HealthStatus {
                        report: Some(report),
                        last_error: None,
                    });
                }
                Err(err) => {
                    warn!(error = %err, "health check failed");
                    tx.send_modify(|st| st.last_error = Some(err.to_string()));
                }
            }
        }
    });

    (rx, handle)
}

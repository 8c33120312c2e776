//! Batched container stats collection.
//!
//! One UI refresh tick asks for usage of many containers at once. The
//! collector fans the sampling requests out concurrently, bounds each one
//! with its own timeout, and reports per-container results so a single
//! stuck or vanished container never poisons the rest of the batch.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tokio::time::timeout;

use runtime::{derive_usage, validate_ref, ContainerRuntime, ContainerUsage, RuntimeError};

use crate::config::BridgeConfig;

/// Per-container outcome of one batch collection.
#[derive(Debug, Clone, Serialize)]
pub struct BatchStatsResult {
    pub id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<ContainerUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Samples usage for a set of containers concurrently.
pub struct BatchStatsCollector<R> {
    runtime: Arc<R>,
    request_timeout: Duration,
}

impl<R: ContainerRuntime> BatchStatsCollector<R> {
    pub fn new(runtime: Arc<R>, config: &BridgeConfig) -> Self {
        Self {
            runtime,
            request_timeout: config.stats_timeout(),
        }
    }

    /// Collects usage for every distinct ID in `ids`.
    ///
    /// Returns exactly one entry per distinct requested ID, in first-seen
    /// request order. Invalid references, unknown containers and per-request
    /// timeouts each yield a failed entry for that ID alone.
    pub async fn collect(&self, ids: &[String]) -> Vec<BatchStatsResult> {
        let mut seen = HashSet::new();
        let distinct: Vec<&String> = ids.iter().filter(|id| seen.insert(id.as_str())).collect();

        let mut requests: FuturesUnordered<_> = distinct
            .iter()
            .enumerate()
            .map(|(index, id)| {
                let runtime = Arc::clone(&self.runtime);
                let deadline = self.request_timeout;
                async move {
                    if let Err(e) = validate_ref(id) {
                        return (index, Err(e));
                    }
                    let sampled = match timeout(deadline, runtime.stats(id)).await {
                        Ok(result) => result,
                        Err(_) => Err(RuntimeError::TimedOut(format!("stats for {id}"))),
                    };
                    (index, sampled)
                }
            })
            .collect();

        let mut slots: Vec<Option<BatchStatsResult>> = vec![None; distinct.len()];
        while let Some((index, sampled)) = requests.next().await {
            let id = distinct[index].clone();
            slots[index] = Some(match sampled {
                Ok(snapshot) => BatchStatsResult {
                    id,
                    success: true,
                    usage: Some(derive_usage(&snapshot)),
                    error: None,
                },
                Err(e) => {
                    tracing::debug!(container_id = %id, error = %e, "Stats sample failed");
                    BatchStatsResult {
                        id,
                        success: false,
                        usage: None,
                        error: Some(e.to_string()),
                    }
                }
            });
        }

        slots.into_iter().flatten().collect()
    }
}

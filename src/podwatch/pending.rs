use tokio::time::{sleep, Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::cluster::Cluster;
use crate::errors::{AppError, AppResult};
use crate::types::{PodDescriptor, PodPhase};

/// Re-checks a pending pod every `interval` until it runs.
///
/// Returns `Ok(None)` when cancelled and `PendingTimeout` once `timeout` has
/// elapsed without the pod leaving `Pending`. A pod that ends up in any other
/// phase is returned as-is so the caller can decide to skip it.
pub async fn wait_until_running(
    cluster: &dyn Cluster,
    namespace: &str,
    pod: &str,
    interval: Duration,
    timeout: Duration,
    cancel: &CancellationToken,
) -> AppResult<Option<PodDescriptor>> {
    let started = Instant::now();

    loop {
        let current = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(None),
            r = cluster.get_pod(namespace, pod) => r?,
        };

        if current.phase != PodPhase::Pending {
            return Ok(Some(current));
        }

        if started.elapsed() >= timeout {
            return Err(AppError::PendingTimeout {
                pod: pod.to_string(),
                phase: current.phase.to_string(),
                waited: timeout,
            });
        }

        tracing::debug!(namespace, pod, "pod still pending");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(None),
            _ = sleep(interval) => {}
        }
    }
}

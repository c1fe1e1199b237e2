//! Simulated cluster for running without Kubernetes (`--dev`).

use std::collections::BTreeMap;
use std::io;

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};
use time::OffsetDateTime;
use tokio::time::{sleep, Duration};

use crate::cluster::{Cluster, LogReader};
use crate::config::DevConfig;
use crate::errors::{AppError, AppResult};
use crate::types::{
    ContainerDescriptor, LogOptions, PodDescriptor, PodEvent, PodPhase, StreamKey,
};

const NAMESPACES: &[&str] = &["default", "kube-system"];

pub struct DevCluster {
    config: DevConfig,
    booted: OffsetDateTime,
}

impl DevCluster {
    pub fn new(config: DevConfig) -> Self {
        Self {
            config,
            booted: OffsetDateTime::now_utc(),
        }
    }

    fn pods(&self, namespace: &str) -> Vec<PodDescriptor> {
        let pod = |name: &str, app: &str, containers: &[&str]| PodDescriptor {
            namespace: namespace.to_string(),
            name: name.to_string(),
            phase: PodPhase::Running,
            labels: BTreeMap::from([
                ("app".to_string(), app.to_string()),
                ("tier".to_string(), "dev".to_string()),
            ]),
            containers: containers
                .iter()
                .map(|c| ContainerDescriptor {
                    name: c.to_string(),
                    running: true,
                    started_at: Some(self.booted),
                })
                .collect(),
        };

        vec![
            pod("web-7f9c4", "web", &["app", "sidecar"]),
            pod("worker-5d2a1", "worker", &["worker"]),
        ]
    }

    fn matching(&self, namespace: &str, selector: &str) -> Vec<PodDescriptor> {
        self.pods(namespace)
            .into_iter()
            .filter(|p| selector_matches(selector, &p.labels))
            .collect()
    }
}

/// Equality-only selector matching (`k=v,k2=v2`, `k!=v`); enough for simulated pods.
fn selector_matches(selector: &str, labels: &BTreeMap<String, String>) -> bool {
    selector
        .split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .all(|term| {
            if let Some((k, v)) = term.split_once("!=") {
                labels.get(k.trim()).map(String::as_str) != Some(v.trim())
            } else if let Some((k, v)) = term.split_once('=') {
                let v = v.trim_start_matches('=');
                labels.get(k.trim()).map(String::as_str) == Some(v.trim())
            } else {
                labels.contains_key(term)
            }
        })
}

#[async_trait]
impl Cluster for DevCluster {
    async fn list_namespaces(&self) -> AppResult<Vec<String>> {
        Ok(NAMESPACES.iter().map(|s| s.to_string()).collect())
    }

    async fn list_pods(&self, namespace: &str, selector: &str) -> AppResult<Vec<PodDescriptor>> {
        Ok(self.matching(namespace, selector))
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> AppResult<PodDescriptor> {
        self.pods(namespace)
            .into_iter()
            .find(|p| p.name == name)
            .ok_or_else(|| AppError::PodNotFound {
                namespace: namespace.to_string(),
                pod: name.to_string(),
            })
    }

    /// Replays the current pods, then simulates a restart of the first pod's containers.
    fn watch_pods(&self, namespace: &str, selector: &str) -> BoxStream<'static, AppResult<PodEvent>> {
        let pods = self.matching(namespace, selector);
        let restart_after = Duration::from_secs(self.config.restart_after_secs);

        let restarted = pods.first().cloned().map(|mut pod| {
            for c in &mut pod.containers {
                c.started_at = c.started_at.map(|t| t + restart_after);
            }
            pod
        });

        let initial = pods
            .into_iter()
            .map(|p| Ok::<_, AppError>(PodEvent::Applied(p)))
            .chain(std::iter::once(Ok(PodEvent::Synced)));

        let restart = stream::iter(restarted).then(move |pod| async move {
            sleep(restart_after).await;
            tracing::info!(pod = %pod.name, "simulating container restart");
            Ok::<_, AppError>(PodEvent::Applied(pod))
        });

        stream::iter(initial)
            .chain(restart)
            .chain(stream::pending())
            .boxed()
    }

    async fn stream_logs(
        &self,
        _namespace: &str,
        key: &StreamKey,
        options: &LogOptions,
    ) -> AppResult<LogReader> {
        let rate = Duration::from_millis(self.config.rate_ms);
        let max_lines = if options.follow {
            self.config.lines
        } else {
            Some(self.config.lines.unwrap_or(10))
        };
        let timestamps = options.timestamps;
        let key = key.clone();

        let lines = stream::unfold(0u64, move |counter| {
            let key = key.clone();
            async move {
                if max_lines.is_some_and(|max| counter >= max) {
                    return None;
                }
                if counter > 0 {
                    sleep(rate).await;
                }

                let counter = counter + 1;
                let mut line = format!("{key} log line {counter}\n");
                if timestamps {
                    let ts = OffsetDateTime::now_utc()
                        .format(&time::format_description::well_known::Rfc3339)
                        .unwrap_or_default();
                    line = format!("{ts} {line}");
                }
                Some((Ok::<_, io::Error>(line.into_bytes()), counter))
            }
        });

        Ok(Box::pin(lines.boxed().into_async_read()))
    }
}

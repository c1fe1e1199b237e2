use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{future, StreamExt};
use k8s_openapi::api::core::v1::{Namespace, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::api::{ListParams, LogParams};
use kube::{Api, Client, ResourceExt};
use kube_runtime::{watcher, WatchStreamExt};
use time::OffsetDateTime;

use crate::cluster::{Cluster, LogReader};
use crate::errors::{AppError, AppResult};
use crate::types::{
    ContainerDescriptor, LogOptions, PodDescriptor, PodEvent, PodPhase, StreamKey,
};

/// Cluster backed by the Kubernetes API.
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    /// Builds a client from the local kubeconfig or the in-cluster environment
    /// and checks that the API server answers.
    pub async fn connect() -> AppResult<Self> {
        let client = Client::try_default().await?;
        Self::verified(client).await
    }

    async fn verified(client: Client) -> AppResult<Self> {
        let version = client.apiserver_version().await?;
        tracing::debug!(
            major = %version.major,
            minor = %version.minor,
            "connected to the API server"
        );
        Ok(Self { client })
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl Cluster for KubeCluster {
    async fn list_namespaces(&self) -> AppResult<Vec<String>> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let list = api.list(&ListParams::default()).await?;
        Ok(list.items.iter().map(|ns| ns.name_any()).collect())
    }

    async fn list_pods(&self, namespace: &str, selector: &str) -> AppResult<Vec<PodDescriptor>> {
        let mut lp = ListParams::default();
        if !selector.is_empty() {
            lp = lp.labels(selector);
        }
        let list = self.pods(namespace).list(&lp).await?;
        Ok(list.items.iter().map(|p| describe(namespace, p)).collect())
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> AppResult<PodDescriptor> {
        match self.pods(namespace).get_opt(name).await? {
            Some(pod) => Ok(describe(namespace, &pod)),
            None => Err(AppError::PodNotFound {
                namespace: namespace.to_string(),
                pod: name.to_string(),
            }),
        }
    }

    fn watch_pods(&self, namespace: &str, selector: &str) -> BoxStream<'static, AppResult<PodEvent>> {
        let mut config = watcher::Config::default();
        if !selector.is_empty() {
            config = config.labels(selector);
        }

        let namespace = namespace.to_string();
        watcher(self.pods(&namespace), config)
            .default_backoff()
            .filter_map(move |item| {
                let ev = match item {
                    Ok(watcher::Event::Apply(pod)) | Ok(watcher::Event::InitApply(pod)) => {
                        Some(Ok(PodEvent::Applied(describe(&namespace, &pod))))
                    }
                    Ok(watcher::Event::Delete(pod)) => {
                        Some(Ok(PodEvent::Deleted(describe(&namespace, &pod))))
                    }
                    Ok(watcher::Event::InitDone) => Some(Ok(PodEvent::Synced)),
                    Ok(watcher::Event::Init) => None,
                    Err(e) => Some(Err(AppError::from(e))),
                };
                future::ready(ev)
            })
            .boxed()
    }

    async fn stream_logs(
        &self,
        namespace: &str,
        key: &StreamKey,
        options: &LogOptions,
    ) -> AppResult<LogReader> {
        let lp = LogParams {
            follow: options.follow,
            previous: options.previous,
            timestamps: options.timestamps,
            container: Some(key.container.clone()),
            since_seconds: options.since.map(|d| d.as_secs().max(1) as i64),
            tail_lines: options.tail_lines,
            ..Default::default()
        };

        let reader = self.pods(namespace).log_stream(&key.pod, &lp).await?;
        Ok(Box::pin(reader))
    }
}

fn describe(namespace: &str, pod: &Pod) -> PodDescriptor {
    let status = pod.status.as_ref();
    let phase = status
        .and_then(|s| s.phase.as_deref())
        .map(PodPhase::from)
        .unwrap_or(PodPhase::Unknown);
    let statuses = status.and_then(|s| s.container_statuses.as_deref()).unwrap_or_default();

    let containers = pod
        .spec
        .as_ref()
        .map(|spec| {
            spec.containers
                .iter()
                .map(|c| {
                    let running = statuses
                        .iter()
                        .find(|cs| cs.name == c.name)
                        .and_then(|cs| cs.state.as_ref())
                        .and_then(|state| state.running.as_ref());

                    ContainerDescriptor {
                        name: c.name.clone(),
                        running: running.is_some(),
                        started_at: running
                            .and_then(|r| r.started_at.as_ref())
                            .and_then(to_offset),
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    PodDescriptor {
        namespace: namespace.to_string(),
        name: pod.name_any(),
        phase,
        labels: pod.labels().clone(),
        containers,
    }
}

fn to_offset(t: &Time) -> Option<OffsetDateTime> {
    let nanos = t.0.timestamp_nanos_opt()?;
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(nanos)).ok()
}

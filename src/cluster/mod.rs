//! The cluster seam: everything the engine needs from Kubernetes.

pub mod dev;
pub mod kubernetes;

#[cfg(test)]
pub(crate) mod fake;

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::AsyncBufRead;

use crate::errors::{AppError, AppResult};
use crate::types::{LogOptions, PodDescriptor, PodEvent, StreamKey};

/// Line-oriented log stream of one container. Dropping it closes the stream.
pub type LogReader = Pin<Box<dyn AsyncBufRead + Send>>;

pub type SharedCluster = Arc<dyn Cluster>;

#[async_trait]
pub trait Cluster: Send + Sync + 'static {
    async fn list_namespaces(&self) -> AppResult<Vec<String>>;

    /// Pods of `namespace` matching `selector` (empty selector matches every pod).
    async fn list_pods(&self, namespace: &str, selector: &str) -> AppResult<Vec<PodDescriptor>>;

    async fn get_pod(&self, namespace: &str, name: &str) -> AppResult<PodDescriptor>;

    /// Live pod events. The watch stops when the stream is dropped.
    fn watch_pods(&self, namespace: &str, selector: &str) -> BoxStream<'static, AppResult<PodEvent>>;

    async fn stream_logs(
        &self,
        namespace: &str,
        key: &StreamKey,
        options: &LogOptions,
    ) -> AppResult<LogReader>;
}

/// Use the requested namespace, or fail listing what is available.
pub async fn resolve_namespace(
    cluster: &dyn Cluster,
    requested: Option<String>,
) -> AppResult<String> {
    if let Some(ns) = requested.filter(|ns| !ns.is_empty()) {
        return Ok(ns);
    }

    let mut available = cluster.list_namespaces().await?;
    available.sort();
    Err(AppError::NamespaceRequired { available })
}

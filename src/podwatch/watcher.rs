use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::cluster::Cluster;
use crate::config::{DiscoveryConfig, DiscoveryMode};
use crate::errors::AppResult;
use crate::podwatch::active::{ActiveStreams, Claim, SyncMap};
use crate::podwatch::filter::PodFilter;
use crate::podwatch::pending::wait_until_running;
use crate::stream::supervisor::StreamCommand;
use crate::stream::tailer::TailTarget;
use crate::types::{PodDescriptor, PodEvent, PodPhase};

/// Finds the containers to tail and hands them to the supervisor.
///
/// Every filter is discovered independently; the union is deduplicated by
/// [`ActiveStreams::claim`], so overlapping filters never start a second tail.
#[derive(Clone)]
pub struct Discovery {
    cluster: Arc<dyn Cluster>,
    namespace: String,
    filters: Vec<PodFilter>,
    config: DiscoveryConfig,
    active: Arc<ActiveStreams>,
    pending: Arc<SyncMap<String, ()>>,
    tx: mpsc::Sender<StreamCommand>,
    cancel: CancellationToken,
}

impl Discovery {
    pub fn new(
        cluster: Arc<dyn Cluster>,
        namespace: String,
        filters: Vec<PodFilter>,
        config: DiscoveryConfig,
        active: Arc<ActiveStreams>,
        tx: mpsc::Sender<StreamCommand>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            cluster,
            namespace,
            filters,
            config,
            active,
            pending: Arc::new(SyncMap::new()),
            tx,
            cancel,
        }
    }

    pub fn spawn(self) -> JoinHandle<AppResult<()>> {
        tokio::spawn(self.run())
    }

    /// Runs until cancelled, or after a single pass in one-shot mode. The command
    /// channel closes once this and every pending-pod waiter are done.
    pub async fn run(self) -> AppResult<()> {
        if self.config.one_shot {
            for filter in &self.filters {
                if let Err(e) = self.poll_once(filter).await {
                    tracing::warn!(filter = %filter, error = %e, "failed to list pods");
                }
            }
            return Ok(());
        }

        let mut tasks = JoinSet::new();
        for filter in self.filters.clone() {
            let this = self.clone();
            match self.config.mode {
                DiscoveryMode::Watch => tasks.spawn(async move { this.watch_filter(&filter).await }),
                DiscoveryMode::Poll => tasks.spawn(async move { this.poll_filter(&filter).await }),
            };
        }
        drop(self);

        while let Some(res) = tasks.join_next().await {
            if let Err(e) = res {
                tracing::error!(error = %e, "discovery task failed");
            }
        }
        Ok(())
    }

    async fn watch_filter(&self, filter: &PodFilter) {
        let mut stream = self.cluster.watch_pods(&self.namespace, filter.selector());
        let mut matched = 0usize;

        loop {
            let item = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return,
                item = stream.next() => item,
            };

            match item {
                Some(Ok(PodEvent::Applied(pod))) => {
                    if filter.matches(&pod) {
                        matched += 1;
                        self.observe(pod).await;
                    }
                }
                Some(Ok(PodEvent::Deleted(pod))) => {
                    if filter.matches(&pod) {
                        tracing::info!(pod = %pod.name, "pod deleted");
                        self.active.forget_pod(&pod.name);
                        let _ = self.tx.send(StreamCommand::StopPod { pod: pod.name }).await;
                    }
                }
                Some(Ok(PodEvent::Synced)) => {
                    if matched == 0 {
                        self.report_empty(filter);
                    }
                    matched = 0;
                }
                Some(Err(e)) => {
                    tracing::warn!(filter = %filter, error = %e, "pod watch error");
                }
                None => {
                    tracing::warn!(filter = %filter, "pod watch ended; falling back to polling");
                    break;
                }
            }
        }

        drop(stream);
        self.poll_filter(filter).await;
    }

    async fn poll_filter(&self, filter: &PodFilter) {
        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return,
                _ = ticker.tick() => {}
            }

            if let Err(e) = self.poll_once(filter).await {
                tracing::warn!(
                    filter = %filter,
                    error = %e,
                    retry_in = ?self.config.interval,
                    "failed to fetch pods"
                );
            }
        }
    }

    /// One discovery pass for `filter`. Returns how many pods matched.
    pub async fn poll_once(&self, filter: &PodFilter) -> AppResult<usize> {
        let pods = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Ok(0),
            r = self.cluster.list_pods(&self.namespace, filter.selector()) => r?,
        };

        let matching: Vec<PodDescriptor> = pods.into_iter().filter(|p| filter.matches(p)).collect();
        if matching.is_empty() {
            self.report_empty(filter);
            return Ok(0);
        }

        let count = matching.len();
        for pod in matching {
            self.observe(pod).await;
        }
        Ok(count)
    }

    fn report_empty(&self, filter: &PodFilter) {
        tracing::info!(
            namespace = %self.namespace,
            filter = %filter,
            "there are no pods for this filter"
        );
    }

    async fn observe(&self, pod: PodDescriptor) {
        match pod.phase {
            PodPhase::Running => self.claim_containers(&pod).await,
            PodPhase::Pending => self.defer_pending(pod.name),
            phase => {
                tracing::debug!(pod = %pod.name, %phase, "skipping pod");
            }
        }
    }

    async fn claim_containers(&self, pod: &PodDescriptor) {
        for container in pod.containers.iter().filter(|c| c.running) {
            let key = pod.stream_key(container);
            let claim = self.active.claim(&key, container.started_at);
            if !claim.should_start() {
                continue;
            }
            if claim == Claim::Restarted {
                tracing::info!(stream = %key, "new container instance detected");
            }

            let target = TailTarget {
                namespace: self.namespace.clone(),
                key,
                started_at: container.started_at,
            };

            if let Err(mpsc::error::SendError(StreamCommand::Start(target))) =
                self.tx.send(StreamCommand::Start(target)).await
            {
                // Supervisor is gone; nobody will tail it.
                self.active.release(&target.key, target.started_at);
            }
        }
    }

    /// Waits in the background for a pending pod, at most one waiter per pod.
    fn defer_pending(&self, pod: String) {
        if !self.pending.try_add(pod.clone(), ()) {
            return;
        }

        tracing::info!(pod = %pod, "pod is pending; waiting for it to run");

        let this = self.clone();
        tokio::spawn(async move {
            let res = wait_until_running(
                this.cluster.as_ref(),
                &this.namespace,
                &pod,
                this.config.pending_interval,
                this.config.pending_timeout,
                &this.cancel,
            )
            .await;
            this.pending.remove(&pod);

            match res {
                Ok(Some(running)) if running.phase == PodPhase::Running => {
                    this.claim_containers(&running).await;
                }
                Ok(Some(other)) => {
                    tracing::info!(pod = %pod, phase = %other.phase, "pod left pending without running");
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(pod = %pod, error = %e, "giving up on pending pod");
                }
            }
        });
    }
}

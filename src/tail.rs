use std::io::Write;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::cluster::{resolve_namespace, SharedCluster};
use crate::config::TailConfig;
use crate::errors::AppResult;
use crate::merge::fanin::fan_in;
use crate::merge::output::run_merger;
use crate::podwatch::active::ActiveStreams;
use crate::podwatch::watcher::Discovery;
use crate::stream::supervisor::StreamSupervisor;

const COMMAND_BUFFER: usize = 128;

/// Tails every matching container into `out` until the streams are exhausted,
/// the output closes, or `shutdown` fires.
pub async fn tail<W: Write>(
    cluster: SharedCluster,
    config: TailConfig,
    shutdown: CancellationToken,
    out: W,
) -> AppResult<()> {
    let namespace = resolve_namespace(cluster.as_ref(), config.namespace.clone()).await?;

    tracing::info!(
        namespace = %namespace,
        filters = ?config.filters,
        follow = config.log.follow,
        "starting"
    );

    let active = Arc::new(ActiveStreams::new());
    let (fanin, lines) = fan_in(config.buffer);
    let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
    let token = shutdown.child_token();

    let discovery = Discovery::new(
        Arc::clone(&cluster),
        namespace,
        config.filters,
        config.discovery,
        Arc::clone(&active),
        tx,
        token.clone(),
    )
    .spawn();

    let supervisor = tokio::spawn(
        StreamSupervisor::new(
            cluster,
            fanin,
            active,
            config.log,
            config.color_by,
            token.clone(),
        )
        .run(rx),
    );

    let written = run_merger(lines, config.output, out).await;

    // Output is done (drained or closed); stop whatever is still running.
    token.cancel();

    match discovery.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(error = %e, "discovery failed"),
        Err(e) => tracing::error!(error = %e, "discovery task failed"),
    }
    if let Err(e) = supervisor.await {
        tracing::error!(error = %e, "supervisor task failed");
    }

    let written = written?;
    tracing::debug!(lines = written, "output finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::cluster::fake::{at, pod, FakeCluster, Logs};
    use crate::config::{
        ColorBy, DiscoveryConfig, DiscoveryMode, HumanFormat, OutputConfig, OutputMode,
    };
    use crate::errors::AppError;
    use crate::podwatch::filter::PodFilter;
    use crate::types::{LogOptions, PodPhase, StreamKey};

    fn config(follow: bool) -> TailConfig {
        TailConfig {
            namespace: Some("default".into()),
            filters: vec![PodFilter::All],
            log: LogOptions {
                follow,
                ..LogOptions::default()
            },
            discovery: DiscoveryConfig {
                mode: DiscoveryMode::Poll,
                one_shot: !follow,
                ..DiscoveryConfig::default()
            },
            output: OutputConfig {
                mode: OutputMode::Json,
                human: HumanFormat { color: false },
            },
            color_by: ColorBy::Stream,
            buffer: 4,
        }
    }

    #[tokio::test]
    async fn one_shot_prints_every_line_then_returns() {
        let cluster = Arc::new(FakeCluster::new("default"));
        cluster.push_list(Ok(vec![
            pod("web-1", PodPhase::Running, &[("app", at(0)), ("sidecar", at(0))]),
            pod("web-2", PodPhase::Running, &[("app", at(0))]),
        ]));
        for (pod, container) in [("web-1", "app"), ("web-1", "sidecar"), ("web-2", "app")] {
            let lines = (0..5).map(|i| format!("{pod}/{container} #{i}")).collect();
            cluster.set_logs(StreamKey::new(pod, container), Logs::Lines(lines));
        }

        let mut out = Vec::new();
        timeout(
            Duration::from_secs(5),
            tail(cluster, config(false), CancellationToken::new(), &mut out),
        )
        .await
        .unwrap()
        .unwrap();

        let text = String::from_utf8(out).unwrap();
        let events: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(events.len(), 15);

        // Same-stream order survives the merge.
        let web2: Vec<&str> = events
            .iter()
            .filter(|e| e["pod"] == "web-2")
            .map(|e| e["message"].as_str().unwrap())
            .collect();
        assert_eq!(web2, (0..5).map(|i| format!("web-2/app #{i}")).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn cancellation_ends_blocked_tails() {
        let cluster = Arc::new(FakeCluster::new("default"));
        cluster.push_list(Ok(vec![
            pod("web-1", PodPhase::Running, &[("app", at(0))]),
            pod("web-2", PodPhase::Running, &[("app", at(0))]),
        ]));

        let shutdown = CancellationToken::new();
        let canceller = {
            let cluster = Arc::clone(&cluster);
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                while cluster.opened().len() < 2 {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
                shutdown.cancel();
            })
        };

        let mut out = Vec::new();
        timeout(
            Duration::from_secs(5),
            tail(cluster, config(true), shutdown, &mut out),
        )
        .await
        .unwrap()
        .unwrap();

        canceller.await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn finished_log_is_not_replayed_by_later_polls() {
        let cluster = Arc::new(FakeCluster::new("default"));
        cluster.push_list(Ok(vec![pod("web-1", PodPhase::Running, &[("app", at(0))])]));
        cluster.set_logs(
            StreamKey::new("web-1", "app"),
            Logs::Lines(vec!["previous instance crashed".into()]),
        );

        let mut cfg = config(true);
        cfg.log.previous = true;

        let shutdown = CancellationToken::new();
        let canceller = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(35)).await;
                shutdown.cancel();
            })
        };

        let mut out = Vec::new();
        tail(cluster.clone(), cfg, shutdown, &mut out).await.unwrap();
        canceller.await.unwrap();

        assert!(cluster.list_calls.load(std::sync::atomic::Ordering::SeqCst) >= 4);
        assert_eq!(cluster.opened().len(), 1);
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 1);
    }

    #[tokio::test]
    async fn missing_namespace_lists_the_choices() {
        let cluster = Arc::new(FakeCluster::new("default").with_namespaces(&["prod", "default"]));
        let mut cfg = config(false);
        cfg.namespace = None;

        let err = tail(cluster, cfg, CancellationToken::new(), Vec::new())
            .await
            .unwrap_err();
        match err {
            AppError::NamespaceRequired { available } => {
                assert_eq!(available, vec!["default", "prod"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

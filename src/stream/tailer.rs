use std::sync::Arc;

use futures::AsyncBufReadExt;
use owo_colors::AnsiColors;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;

use crate::cluster::Cluster;
use crate::merge::fanin::Feeder;
use crate::podwatch::active::ActiveStreams;
use crate::types::{LogLine, LogOptions, StreamKey};

/// One container instance to tail.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TailTarget {
    pub namespace: String,
    pub key: StreamKey,
    pub started_at: Option<OffsetDateTime>,
}

/// How a tail ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TailExit {
    Cancelled,
    Ended,
    OpenFailed,
    ReadFailed,
    OutputClosed,
}

/// Frees the stream's slot in the active set on every exit path unless `keep` is set.
struct SlotGuard<'a> {
    active: &'a ActiveStreams,
    target: &'a TailTarget,
    keep: bool,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        if !self.keep {
            self.active.release(&self.target.key, self.target.started_at);
        }
    }
}

/// Stream logs for a single (pod, container) until the stream ends or is cancelled.
///
/// Failures stay local to this stream: they are logged, the slot is released so a
/// later discovery pass may tail the container again, and the task ends.
///
/// A stream that ends cleanly keeps its slot when the instance has a start time:
/// that log was read in full, and only a newer instance gets tailed again.
pub async fn tail_stream(
    cluster: Arc<dyn Cluster>,
    target: TailTarget,
    options: LogOptions,
    color: AnsiColors,
    feeder: Feeder<LogLine>,
    active: Arc<ActiveStreams>,
    cancel: CancellationToken,
) -> TailExit {
    let mut slot = SlotGuard {
        active: &active,
        target: &target,
        keep: false,
    };
    let _done = cancel.clone().drop_guard();
    let key = &target.key;

    let opened = tokio::select! {
        biased;
        _ = cancel.cancelled() => return TailExit::Cancelled,
        r = cluster.stream_logs(&target.namespace, key, &options) => r,
    };

    let mut reader = match opened {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(
                namespace = %target.namespace,
                pod = %key.pod,
                container = %key.container,
                error = %e,
                "failed to stream logs"
            );
            return TailExit::OpenFailed;
        }
    };

    tracing::debug!(pod = %key.pod, container = %key.container, "tail started");

    let mut buf: Vec<u8> = Vec::with_capacity(8 * 1024);

    loop {
        buf.clear();

        let read_fut = reader.read_until(b'\n', &mut buf);

        let res = tokio::select! {
            biased;
            _ = cancel.cancelled() => return TailExit::Cancelled,
            r = read_fut => r,
        };

        match res {
            Ok(0) => {
                tracing::info!(
                    pod = %key.pod,
                    container = %key.container,
                    "log stream ended"
                );
                slot.keep = target.started_at.is_some();
                return TailExit::Ended;
            }
            Ok(_n) => {
                let line = trim_newline(&buf);
                if line.is_empty() {
                    continue;
                }

                let ev = LogLine {
                    ts: OffsetDateTime::now_utc(),
                    namespace: target.namespace.clone(),
                    pod: key.pod.clone(),
                    container: key.container.clone(),
                    message: String::from_utf8_lossy(line).into_owned(),
                    color,
                };

                if feeder.send(ev).await.is_err() {
                    return TailExit::OutputClosed;
                }
            }
            Err(e) => {
                tracing::warn!(
                    pod = %key.pod,
                    container = %key.container,
                    error = %e,
                    "cannot continue reading"
                );
                return TailExit::ReadFailed;
            }
        }
    }
}

fn trim_newline(bytes: &[u8]) -> &[u8] {
    let mut end = bytes.len();
    while end > 0 && (bytes[end - 1] == b'\n' || bytes[end - 1] == b'\r') {
        end -= 1;
    }
    &bytes[..end]
}

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::cluster::Cluster;
use crate::config::ColorBy;
use crate::merge::color::ColorAssigner;
use crate::merge::fanin::FanIn;
use crate::podwatch::active::ActiveStreams;
use crate::stream::tailer::{tail_stream, TailExit, TailTarget};
use crate::types::{LogLine, LogOptions, StreamKey};

/// Control-plane commands emitted by discovery and consumed by the supervisor.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StreamCommand {
    /// Tail this container instance. The key has already been claimed in the active set.
    Start(TailTarget),

    /// Stop every tail of the given pod (best-effort).
    StopPod { pod: String },
}

/// Spawns and cancels tailers; owns the fan-in registry.
pub struct StreamSupervisor {
    cluster: Arc<dyn Cluster>,
    streams: HashMap<StreamKey, CancellationToken>,
    fanin: FanIn<LogLine>,
    active: Arc<ActiveStreams>,
    colors: ColorAssigner,
    color_by: ColorBy,
    options: LogOptions,
    tasks: JoinSet<TailExit>,
    shutdown: CancellationToken,
}

impl StreamSupervisor {
    pub fn new(
        cluster: Arc<dyn Cluster>,
        fanin: FanIn<LogLine>,
        active: Arc<ActiveStreams>,
        options: LogOptions,
        color_by: ColorBy,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            cluster,
            streams: HashMap::new(),
            fanin,
            active,
            colors: ColorAssigner::new(),
            color_by,
            options,
            tasks: JoinSet::new(),
            shutdown,
        }
    }

    /// Handles commands until discovery is done or shutdown is requested, then
    /// seals the fan-in and waits for every tailer to finish.
    pub async fn run(mut self, mut rx: mpsc::Receiver<StreamCommand>) {
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                cmd = rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
                Some(_) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    self.streams.retain(|_, token| !token.is_cancelled());
                }
            }
        }

        if self.shutdown.is_cancelled() {
            self.shutdown_all();
        }

        let Self {
            fanin, mut tasks, ..
        } = self;
        tracing::debug!(tailers = fanin.active(), "no more tails will start");
        fanin.seal();

        while tasks.join_next().await.is_some() {}
    }

    pub fn handle_command(&mut self, cmd: StreamCommand) {
        match cmd {
            StreamCommand::Start(target) => {
                if self.cancel_previous(&target.key) {
                    tracing::info!(
                        pod = %target.key.pod,
                        container = %target.key.container,
                        "container restarted; replacing tail"
                    );
                }

                let token = self.shutdown.child_token();
                let color = self.colors.assign(&self.color_key(&target.key));

                tracing::info!(
                    namespace = %target.namespace,
                    pod = %target.key.pod,
                    container = %target.key.container,
                    "tailing"
                );

                self.streams.insert(target.key.clone(), token.clone());
                self.tasks.spawn(tail_stream(
                    Arc::clone(&self.cluster),
                    target,
                    self.options.clone(),
                    color,
                    self.fanin.register(),
                    Arc::clone(&self.active),
                    token,
                ));
            }

            StreamCommand::StopPod { pod } => {
                self.streams.retain(|key, token| {
                    if key.pod == pod {
                        token.cancel();
                        false
                    } else {
                        true
                    }
                });

                // Container colors are shared across pods and stay.
                match self.color_by {
                    ColorBy::Stream => self
                        .colors
                        .forget(|k| k.split_once('/').is_some_and(|(p, _)| p == pod)),
                    ColorBy::Pod => self.colors.forget(|k| k == pod),
                    ColorBy::Container => {}
                }
            }
        }
    }

    /// Cancels the tail currently registered for `key`. Returns true only if it
    /// was still running; finished tails may linger until the next prune.
    fn cancel_previous(&mut self, key: &StreamKey) -> bool {
        match self.streams.remove(key) {
            Some(previous) if !previous.is_cancelled() => {
                previous.cancel();
                true
            }
            _ => false,
        }
    }

    pub fn shutdown_all(&mut self) {
        for (_, token) in self.streams.drain() {
            token.cancel();
        }
    }

    fn color_key(&self, key: &StreamKey) -> String {
        match self.color_by {
            ColorBy::Stream => key.to_string(),
            ColorBy::Pod => key.pod.clone(),
            ColorBy::Container => key.container.clone(),
        }
    }
}

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use owo_colors::AnsiColors;
use serde::Serialize;
use time::OffsetDateTime;

/// Stream identity = Pod + Container. Unique within a namespace at a point in time.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct StreamKey {
    pub pod: String,
    pub container: String,
}

impl StreamKey {
    pub fn new(pod: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            pod: pod.into(),
            container: container.into(),
        }
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.pod, self.container)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl From<&str> for PodPhase {
    fn from(s: &str) -> Self {
        match s {
            "Pending" => PodPhase::Pending,
            "Running" => PodPhase::Running,
            "Succeeded" => PodPhase::Succeeded,
            "Failed" => PodPhase::Failed,
            _ => PodPhase::Unknown,
        }
    }
}

impl fmt::Display for PodPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PodPhase::Pending => "Pending",
            PodPhase::Running => "Running",
            PodPhase::Succeeded => "Succeeded",
            PodPhase::Failed => "Failed",
            PodPhase::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ContainerDescriptor {
    pub name: String,
    pub running: bool,
    /// Start time of the current container instance, when the source reports one.
    pub started_at: Option<OffsetDateTime>,
}

/// Snapshot of a pod as reported by the cluster. Only lives for one discovery pass.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PodDescriptor {
    pub namespace: String,
    pub name: String,
    pub phase: PodPhase,
    pub labels: BTreeMap<String, String>,
    pub containers: Vec<ContainerDescriptor>,
}

impl PodDescriptor {
    pub fn stream_key(&self, container: &ContainerDescriptor) -> StreamKey {
        StreamKey::new(self.name.clone(), container.name.clone())
    }
}

/// Pod lifecycle event produced by a watch.
#[derive(Clone, Debug)]
pub enum PodEvent {
    Applied(PodDescriptor),
    Deleted(PodDescriptor),
    /// The initial listing of the watch has been fully delivered.
    Synced,
}

/// Options applied to every log stream opened by a tailer.
#[derive(Clone, Debug, Default)]
pub struct LogOptions {
    pub follow: bool,
    pub previous: bool,
    pub timestamps: bool,
    pub since: Option<Duration>,
    pub tail_lines: Option<i64>,
}

/// One line of output, produced by a tailer and consumed once by the console writer.
#[derive(Clone, Debug, Serialize)]
pub struct LogLine {
    #[serde(with = "time::serde::rfc3339")]
    pub ts: OffsetDateTime,
    pub namespace: String,
    pub pod: String,
    pub container: String,
    pub message: String,
    #[serde(skip)]
    pub color: AnsiColors,
}

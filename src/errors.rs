use std::io;
use std::time::Duration;

use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Cli(String),

    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    #[error("watch error: {0}")]
    Watch(#[from] kube_runtime::watcher::Error),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("a namespace is required (--namespace); available: {}", .available.join(", "))]
    NamespaceRequired { available: Vec<String> },

    #[error("pod \"{pod}\" not found in namespace \"{namespace}\"")]
    PodNotFound { namespace: String, pod: String },

    #[error("pod \"{pod}\" still {phase} after {waited:?}")]
    PendingTimeout {
        pod: String,
        phase: String,
        waited: Duration,
    },

    #[error("{0}")]
    Other(String),
}

pub mod cli;
pub mod cluster;
pub mod config;
pub mod errors;
pub mod list;
pub mod logging;
pub mod merge;
pub mod podwatch;
pub mod shutdown;
pub mod stream;
pub mod tail;
pub mod types;

use std::sync::Arc;

use crate::cluster::dev::DevCluster;
use crate::cluster::kubernetes::KubeCluster;
use crate::cluster::SharedCluster;
use crate::config::{Command, Config};
use crate::errors::AppResult;
use crate::shutdown::{wait_ctrl_c, wait_sigterm, Shutdown, ShutdownReason};

pub async fn run(config: Config) -> AppResult<()> {
    // A client that cannot be built is fatal before anything streams.
    let cluster: SharedCluster = match config.dev {
        Some(dev) => Arc::new(DevCluster::new(dev)),
        None => Arc::new(KubeCluster::connect().await?),
    };

    match config.command {
        Command::List(list) => crate::list::run(cluster, list, std::io::stdout().lock()).await,
        Command::Tail(tail) => {
            let shutdown = Shutdown::new();
            let ctrl_c = tokio::spawn(wait_ctrl_c(shutdown.clone()));
            let sigterm = tokio::spawn(wait_sigterm(shutdown.clone()));

            let res = crate::tail::tail(cluster, tail, shutdown.token(), std::io::stdout()).await;

            let reason = if shutdown.is_cancelled() {
                let (a, b) = (ctrl_c.await, sigterm.await);
                a.ok().flatten().or(b.ok().flatten())
            } else {
                shutdown.cancel();
                Some(ShutdownReason::OutputClosed)
            };
            tracing::info!(reason = ?reason, "shutting down");

            res
        }
    }
}

use std::fmt::Write as _;
use std::io::Write;

use owo_colors::OwoColorize;

use crate::cluster::{resolve_namespace, SharedCluster};
use crate::config::ListConfig;
use crate::errors::AppResult;
use crate::types::PodDescriptor;

/// Prints the matching pods of the namespace with their labels.
pub async fn run<W: Write>(cluster: SharedCluster, config: ListConfig, mut out: W) -> AppResult<()> {
    let namespace = resolve_namespace(cluster.as_ref(), config.namespace).await?;
    let pods = cluster.list_pods(&namespace, "").await?;

    let text = render_pods(&pods, &config.filters, config.color);
    if text.is_empty() {
        tracing::info!(namespace = %namespace, filters = ?config.filters, "no pods found");
        return Ok(());
    }

    out.write_all(text.as_bytes())?;
    out.flush()?;
    Ok(())
}

/// Pods whose name contains any of `filters` (all of them when empty), each
/// followed by its sorted `key=value` labels and a blank line.
pub fn render_pods(pods: &[PodDescriptor], filters: &[String], color: bool) -> String {
    let mut text = String::new();

    let matching = pods
        .iter()
        .filter(|p| filters.is_empty() || filters.iter().any(|f| p.name.contains(f.as_str())));

    for pod in matching {
        if color {
            let _ = writeln!(text, "{}", pod.name.cyan());
        } else {
            let _ = writeln!(text, "{}", pod.name);
        }
        // BTreeMap iterates in key order.
        for (k, v) in &pod.labels {
            let _ = writeln!(text, "  {k}={v}");
        }
        text.push('\n');
    }

    text
}

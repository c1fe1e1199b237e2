use std::io::{self, Write};

use tokio::sync::mpsc;

use crate::config::{OutputConfig, OutputMode};
use crate::merge::format::LineFormatter;
use crate::types::LogLine;

/// Drains the merged lines into `out` until every feeder is done.
///
/// Returns the number of lines written. A closed downstream (broken pipe) ends
/// the drain without an error.
pub async fn run_merger<W: Write>(
    mut rx: mpsc::Receiver<LogLine>,
    output: OutputConfig,
    mut out: W,
) -> io::Result<u64> {
    let formatter = LineFormatter::new(output.human);
    let mut written = 0u64;

    while let Some(line) = rx.recv().await {
        let write_result: io::Result<()> = match output.mode {
            OutputMode::Human => {
                let text = formatter.format_human(&line);
                out.write_all(text.as_bytes())
                    .and_then(|_| out.write_all(b"\n"))
            }
            OutputMode::Json => serde_json::to_writer(&mut out, &line)
                .map_err(io::Error::other)
                .and_then(|_| out.write_all(b"\n")),
        };

        if let Err(e) = write_result.and_then(|_| flush_if_idle(&rx, &mut out)) {
            if e.kind() == io::ErrorKind::BrokenPipe {
                tracing::debug!("output closed");
                return Ok(written);
            }
            return Err(e);
        }
        written += 1;
    }

    match out.flush() {
        Err(e) if e.kind() != io::ErrorKind::BrokenPipe => Err(e),
        _ => Ok(written),
    }
}

/// Flush whenever the backlog is drained so interactive tails stay live.
fn flush_if_idle<W: Write>(rx: &mpsc::Receiver<LogLine>, out: &mut W) -> io::Result<()> {
    if rx.is_empty() {
        out.flush()
    } else {
        Ok(())
    }
}

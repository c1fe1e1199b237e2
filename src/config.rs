use std::io::IsTerminal;
use std::time::Duration;

use crate::cli::{Cli, CliCommand, ColorByArg, ColorModeArg, ListArgs, TailArgs};
use crate::errors::{AppError, AppResult};
use crate::podwatch::filter::PodFilter;
use crate::types::LogOptions;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OutputMode {
    Human,
    Json,
}

/// Which part of the stream identity picks the label color.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ColorBy {
    Stream,
    Pod,
    Container,
}

#[derive(Clone, Copy, Debug)]
pub struct HumanFormat {
    pub color: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct OutputConfig {
    pub mode: OutputMode,
    pub human: HumanFormat,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DiscoveryMode {
    /// React to pod events, falling back to polling if the watch ends.
    Watch,
    /// List pods on a fixed interval.
    Poll,
}

#[derive(Clone, Debug)]
pub struct DiscoveryConfig {
    pub mode: DiscoveryMode,
    pub interval: Duration,
    pub pending_interval: Duration,
    pub pending_timeout: Duration,
    /// A single discovery pass (`--follow=false`).
    pub one_shot: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            mode: DiscoveryMode::Watch,
            interval: Duration::from_secs(10),
            pending_interval: Duration::from_secs(1),
            pending_timeout: Duration::from_secs(20),
            one_shot: false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct TailConfig {
    pub namespace: Option<String>,
    pub filters: Vec<PodFilter>,
    pub log: LogOptions,
    pub discovery: DiscoveryConfig,
    pub output: OutputConfig,
    pub color_by: ColorBy,
    pub buffer: usize,
}

#[derive(Clone, Debug)]
pub struct ListConfig {
    pub namespace: Option<String>,
    pub filters: Vec<String>,
    pub color: bool,
}

#[derive(Clone, Debug)]
pub struct DevConfig {
    pub rate_ms: u64,
    pub lines: Option<u64>,
    pub restart_after_secs: u64,
}

#[derive(Clone, Debug)]
pub enum Command {
    Tail(TailConfig),
    List(ListConfig),
}

#[derive(Clone, Debug)]
pub struct Config {
    pub dev: Option<DevConfig>,
    pub command: Command,
}

impl TryFrom<Cli> for Config {
    type Error = AppError;

    fn try_from(cli: Cli) -> AppResult<Self> {
        let dev = cli.dev.then(|| DevConfig {
            rate_ms: cli.dev_rate_ms,
            lines: cli.dev_lines,
            restart_after_secs: 5,
        });

        let command = match cli.command {
            CliCommand::Tail(args) => Command::Tail(TailConfig::try_from(args)?),
            CliCommand::Ls(args) => Command::List(ListConfig::from(args)),
        };

        Ok(Self { dev, command })
    }
}

impl TryFrom<TailArgs> for TailConfig {
    type Error = AppError;

    fn try_from(args: TailArgs) -> AppResult<Self> {
        let since = args.since.as_deref().map(parse_since).transpose()?;

        if args.interval_secs == 0 {
            return Err(AppError::Cli("--interval must be at least 1 second".into()));
        }
        if args.tail_lines.is_some_and(|n| n < 0) {
            return Err(AppError::Cli("--tail must not be negative".into()));
        }

        let mode = if args.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        };

        let color_by = match args.color_by {
            ColorByArg::Stream => ColorBy::Stream,
            ColorByArg::Pod => ColorBy::Pod,
            ColorByArg::Container => ColorBy::Container,
        };

        Ok(Self {
            namespace: args.namespace,
            filters: PodFilter::parse_all(&args.filters),
            log: LogOptions {
                follow: args.follow,
                previous: args.previous,
                timestamps: args.timestamp,
                since,
                tail_lines: args.tail_lines,
            },
            discovery: DiscoveryConfig {
                mode: if args.poll {
                    DiscoveryMode::Poll
                } else {
                    DiscoveryMode::Watch
                },
                interval: Duration::from_secs(args.interval_secs),
                pending_timeout: Duration::from_secs(args.pending_timeout_secs),
                one_shot: !args.follow,
                ..DiscoveryConfig::default()
            },
            output: OutputConfig {
                mode,
                human: HumanFormat {
                    color: enable_color(args.color, args.no_color),
                },
            },
            color_by,
            buffer: args.buffer.max(1),
        })
    }
}

impl From<ListArgs> for ListConfig {
    fn from(args: ListArgs) -> Self {
        Self {
            namespace: args.namespace,
            filters: args.filters,
            color: enable_color(ColorModeArg::Auto, args.no_color),
        }
    }
}

/// Go-style duration (`90s`, `5m`, `1h30m`); negative values are rejected.
fn parse_since(raw: &str) -> AppResult<Duration> {
    let parsed: kube::core::Duration = raw
        .parse()
        .map_err(|e| AppError::Cli(format!("invalid --since {raw:?}: {e}")))?;
    if parsed.is_negative() {
        return Err(AppError::Cli(format!("--since must not be negative: {raw:?}")));
    }
    Ok(parsed.into())
}

// Default: color only when stdout is a terminal and the user didn't disable it.
fn enable_color(mode: ColorModeArg, no_color: bool) -> bool {
    if no_color {
        return false;
    }
    match mode {
        ColorModeArg::Always => true,
        ColorModeArg::Never => false,
        ColorModeArg::Auto => std::io::stdout().is_terminal(),
    }
}

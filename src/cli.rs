use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "kubelog",
    version,
    about = "View the combined logs of every pod matching a filter"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,

    /// Dev mode: simulate pods without a cluster
    #[arg(long = "dev", global = true, default_value_t = false)]
    pub dev: bool,

    /// Dev: milliseconds between lines
    #[arg(long = "dev-rate-ms", global = true, default_value_t = 500)]
    pub dev_rate_ms: u64,

    /// Dev: lines per container before its stream ends
    #[arg(long = "dev-lines", global = true)]
    pub dev_lines: Option<u64>,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Tail the logs of every container of the matching pods
    Tail(TailArgs),

    /// List the matching pods and their labels
    Ls(ListArgs),
}

#[derive(Debug, Args)]
pub struct TailArgs {
    /// Pod-name substrings or label selectors; `*` or `all` for every pod
    #[arg(value_name = "FILTERS")]
    pub filters: Vec<String>,

    /// Namespace
    #[arg(short = 'n', long = "namespace")]
    pub namespace: Option<String>,

    /// Only show logs newer than a duration, e.g. 30s, 5m, 1h30m
    #[arg(short = 's', long = "since")]
    pub since: Option<String>,

    /// Include timestamps in logs
    #[arg(short = 't', long = "timestamp", default_value_t = false)]
    pub timestamp: bool,

    /// Include logs of the previous container instance
    #[arg(short = 'p', long = "previous", default_value_t = false)]
    pub previous: bool,

    /// Follow the logs
    #[arg(
        short = 'f',
        long = "follow",
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_value_t = true,
        default_missing_value = "true"
    )]
    pub follow: bool,

    /// Number of lines from the end of each log to start with
    #[arg(long = "tail")]
    pub tail_lines: Option<i64>,

    /// Discover pods by polling instead of watching
    #[arg(long = "poll", default_value_t = false)]
    pub poll: bool,

    /// Seconds between discovery polls
    #[arg(long = "interval", default_value_t = 10)]
    pub interval_secs: u64,

    /// Seconds to wait for a pending pod to start running
    #[arg(long = "pending-timeout", default_value_t = 20)]
    pub pending_timeout_secs: u64,

    /// Emit NDJSON log events
    #[arg(long = "json", default_value_t = false)]
    pub json: bool,

    /// Color mode: auto (tty only), always, never
    #[arg(long = "color", value_enum, default_value_t = ColorModeArg::Auto)]
    pub color: ColorModeArg,

    /// Color by: stream (pod/container), pod or container
    #[arg(long = "color-by", value_enum, default_value_t = ColorByArg::Stream)]
    pub color_by: ColorByArg,

    /// Disable colors (overrides --color)
    #[arg(long = "no-color", default_value_t = false)]
    pub no_color: bool,

    /// Merged output buffer, in lines
    #[arg(long = "buffer", default_value_t = 1024)]
    pub buffer: usize,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Pod-name substrings
    #[arg(value_name = "FILTERS")]
    pub filters: Vec<String>,

    /// Namespace
    #[arg(short = 'n', long = "namespace")]
    pub namespace: Option<String>,

    /// Disable colors
    #[arg(long = "no-color", default_value_t = false)]
    pub no_color: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum ColorModeArg {
    Auto,
    Always,
    Never,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum ColorByArg {
    Stream,
    Pod,
    Container,
}

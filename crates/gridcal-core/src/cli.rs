use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

fn key_val_parser() -> clap::builder::ValueParser {
    clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>())
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "gridcal",
    version,
    about = "Month and week calendar grids in the terminal",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    /// Config override, KEY=VALUE (e.g. calendar.default_view=week).
    #[arg(long = "rc", value_parser = key_val_parser(), action = ArgAction::Append)]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    /// Pin the current instant (RFC 3339), for reproducible output.
    #[arg(long = "now")]
    pub now: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Render the calendar grid.
    Show(ShowArgs),
    /// Print the viewing date one period later.
    Next(NavArgs),
    /// Print the viewing date one period earlier.
    Prev(NavArgs),
    /// Render from raw query parameters (viewingDate, calendarType, fadePastEvents).
    Query(QueryArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct ShowArgs {
    #[arg(long)]
    pub date: Option<String>,

    /// month or week.
    #[arg(long)]
    pub view: Option<String>,

    /// JSON array of events.
    #[arg(long)]
    pub events: Option<PathBuf>,

    #[arg(long)]
    pub fade_past_events: bool,

    #[arg(long)]
    pub no_color: bool,
}

#[derive(Args, Debug, Clone)]
pub struct NavArgs {
    #[arg(long)]
    pub date: Option<String>,

    #[arg(long)]
    pub view: Option<String>,

    #[arg(long, default_value_t = 1)]
    pub amount: u32,
}

#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    #[arg(long)]
    pub events: Option<PathBuf>,

    #[arg(long)]
    pub no_color: bool,

    #[arg(value_parser = key_val_parser())]
    pub params: Vec<KeyVal>,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

pub mod cli;
pub mod clock;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod event;
pub mod navigation;
pub mod query;
pub mod render;
pub mod state;

use std::ffi::OsString;

use anyhow::Context;
use chrono::{
  DateTime,
  Utc
};
use clap::Parser;
use tracing::{
  debug,
  info
};

pub use crate::clock::{
  Clock,
  FixedClock,
  SystemClock
};
pub use crate::event::{
  CalendarEvent,
  events_on_day
};
pub use crate::navigation::{
  NavigationUnit,
  advance,
  retreat
};
pub use crate::state::{
  CalendarFlags,
  CalendarState,
  DateDetail,
  ViewType,
  compute_calendar_state
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let cli =
    cli::GlobalCli::parse_from(raw_args);

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting gridcal"
  );

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg.apply_overrides(
    cli
      .rc_overrides
      .into_iter()
      .map(|kv| (kv.key, kv.value))
  )?;
  debug!(?cfg.loaded_files, "config resolved");

  let settings =
    cfg.settings().context(
      "failed to resolve calendar \
       settings"
    )?;

  let clock: Box<dyn Clock> =
    match cli.now.as_deref() {
      | Some(raw) => {
        let instant =
          DateTime::parse_from_rfc3339(
            raw.trim()
          )
          .with_context(|| {
            format!(
              "invalid --now value: \
               {raw}"
            )
          })?
          .with_timezone(&Utc);
        Box::new(FixedClock::new(
          instant
        ))
      }
      | None => Box::new(SystemClock)
    };

  commands::dispatch(
    &cfg,
    &settings,
    clock.as_ref(),
    cli.command
  )?;

  info!("done");
  Ok(())
}

use std::io::{
  self,
  Write
};
use std::path::Path;

use tracing::{
  debug,
  info,
  instrument
};

use crate::cli::{
  Command,
  NavArgs,
  QueryArgs,
  ShowArgs
};
use crate::clock::Clock;
use crate::config::Config;
use crate::event::{
  CalendarEvent,
  load_events
};
use crate::navigation::{
  NavigationUnit,
  shift
};
use crate::query::{
  CALENDAR_TYPE_KEY,
  CalendarQuery,
  FADE_PAST_EVENTS_KEY,
  VIEWING_DATE_KEY,
  navigation_params,
  pairs_to_map
};
use crate::render::Renderer;
use crate::state::CalendarSettings;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
enum Direction {
  Forward,
  Backward
}

#[instrument(skip_all)]
pub fn dispatch(
  cfg: &Config,
  settings: &CalendarSettings,
  clock: &dyn Clock,
  command: Option<Command>
) -> anyhow::Result<()> {
  let command = command.unwrap_or_else(
    || {
      debug!(
        "no command given; defaulting \
         to show"
      );
      Command::Show(ShowArgs::default())
    }
  );

  match command {
    | Command::Show(args) => {
      cmd_show(
        cfg, settings, clock, args
      )
    }
    | Command::Next(args) => {
      cmd_navigate(
        settings,
        clock,
        args,
        Direction::Forward
      )
    }
    | Command::Prev(args) => {
      cmd_navigate(
        settings,
        clock,
        args,
        Direction::Backward
      )
    }
    | Command::Query(args) => {
      cmd_query(
        cfg, settings, clock, args
      )
    }
  }
}

fn base_params(
  date: Option<String>,
  view: Option<String>
) -> Vec<(String, String)> {
  let mut params = Vec::new();
  if let Some(date) = date {
    params.push((
      VIEWING_DATE_KEY.to_string(),
      date
    ));
  }
  if let Some(view) = view {
    params.push((
      CALENDAR_TYPE_KEY.to_string(),
      view
    ));
  }
  params
}

fn read_events(
  path: Option<&Path>
) -> anyhow::Result<Vec<CalendarEvent>> {
  match path {
    | Some(path) => load_events(path),
    | None => Ok(vec![])
  }
}

#[instrument(skip(
  cfg, settings, clock
))]
fn cmd_show(
  cfg: &Config,
  settings: &CalendarSettings,
  clock: &dyn Clock,
  args: ShowArgs
) -> anyhow::Result<()> {
  let mut params =
    base_params(args.date, args.view);
  if args.fade_past_events {
    params.push((
      FADE_PAST_EVENTS_KEY.to_string(),
      "true".to_string()
    ));
  }

  let query = CalendarQuery::from_params(
    &pairs_to_map(params),
    settings,
    clock
  );
  let events =
    read_events(args.events.as_deref())?;
  let state =
    query.compute(&events, clock);

  info!(
    view = state.view_type.as_key(),
    cells = state.dates_in_range.len(),
    events = events.len(),
    "rendering calendar"
  );
  Renderer::new(
    cfg.calendar.color && !args.no_color
  )
  .print_calendar(&state, clock)
}

#[instrument(skip(
  settings, clock
))]
fn cmd_navigate(
  settings: &CalendarSettings,
  clock: &dyn Clock,
  args: NavArgs,
  direction: Direction
) -> anyhow::Result<()> {
  let query = CalendarQuery::from_params(
    &pairs_to_map(base_params(
      args.date, args.view
    )),
    settings,
    clock
  );

  let amount = i64::from(args.amount);
  let delta = match direction {
    | Direction::Forward => amount,
    | Direction::Backward => -amount
  };
  let target = shift(
    query.viewing_date,
    delta,
    NavigationUnit::from(
      query.view_type
    )
  );
  debug!(
    from = %query.viewing_date,
    to = %target,
    "computed navigation target"
  );

  let query_string = navigation_params(
    target,
    query.view_type
  )
  .into_iter()
  .map(|(k, v)| format!("{k}={v}"))
  .collect::<Vec<_>>()
  .join("&");

  let mut out = io::stdout().lock();
  writeln!(
    out,
    "{}",
    target.format("%Y-%m-%d")
  )?;
  writeln!(out, "{query_string}")?;
  Ok(())
}

#[instrument(skip(
  cfg, settings, clock
))]
fn cmd_query(
  cfg: &Config,
  settings: &CalendarSettings,
  clock: &dyn Clock,
  args: QueryArgs
) -> anyhow::Result<()> {
  let params = pairs_to_map(
    args
      .params
      .into_iter()
      .map(|kv| (kv.key, kv.value))
  );
  let query = CalendarQuery::from_params(
    &params, settings, clock
  );
  let events =
    read_events(args.events.as_deref())?;
  let state =
    query.compute(&events, clock);

  Renderer::new(
    cfg.calendar.color && !args.no_color
  )
  .print_calendar(&state, clock)
}

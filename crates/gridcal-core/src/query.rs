//! Page-boundary input: decoded query parameters in, calendar state out.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use chrono_tz::Tz;
use regex::Regex;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::datetime::{local_midnight, resolve_local, start_of_day};
use crate::event::CalendarEvent;
use crate::navigation::{NavigationUnit, shift};
use crate::state::{
    CalendarFlags, CalendarSettings, CalendarState, GridBounds, ViewType, compute_calendar_state,
    iso_string,
};

pub const VIEWING_DATE_KEY: &str = "viewingDate";
pub const CALENDAR_TYPE_KEY: &str = "calendarType";
pub const FADE_PAST_EVENTS_KEY: &str = "fadePastEvents";

/// A decoded query parameter; repeated keys collect into `Many`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    Single(String),
    Many(Vec<String>),
}

impl QueryValue {
    pub fn first(&self) -> Option<&str> {
        match self {
            QueryValue::Single(value) => Some(value.as_str()),
            QueryValue::Many(values) => values.first().map(String::as_str),
        }
    }

    fn push(&mut self, value: String) {
        match self {
            QueryValue::Single(existing) => {
                *self = QueryValue::Many(vec![std::mem::take(existing), value]);
            }
            QueryValue::Many(values) => values.push(value),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::Single(value.to_string())
    }
}

/// Folds key/value pairs into a parameter map, keeping repeats.
pub fn pairs_to_map<I, K, V>(pairs: I) -> BTreeMap<String, QueryValue>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let mut map: BTreeMap<String, QueryValue> = BTreeMap::new();
    for (key, value) in pairs {
        let value: String = value.into();
        match map.entry(key.into()) {
            Entry::Occupied(mut existing) => existing.get_mut().push(value),
            Entry::Vacant(slot) => {
                slot.insert(QueryValue::Single(value));
            }
        }
    }
    map
}

fn relative_re() -> Option<&'static Regex> {
    static RELATIVE: OnceLock<Option<Regex>> = OnceLock::new();
    RELATIVE
        .get_or_init(|| {
            Regex::new(r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dwm])$")
                .map_err(|err| warn!(error = %err, "relative date regex failed to compile"))
                .ok()
        })
        .as_ref()
}

/// Parses a viewing date. Returns `None` for anything unrecognized.
///
/// Accepts `now`, `today`, `tomorrow`, `yesterday`, relative offsets such as
/// `+2w` or `-1m`, RFC 3339, `YYYY-MM-DD`, and local `YYYY-MM-DDTHH:MM[:SS]`.
/// Dates too close to the ends of the calendar to draw a padded month grid
/// are rejected as well.
pub fn parse_viewing_date(raw: &str, clock: &dyn Clock, tz: Tz) -> Option<DateTime<Tz>> {
    let date = parse_token(raw, clock, tz)?;
    if GridBounds::for_view(ViewType::Month, date.date_naive()).is_none() {
        debug!(input = %raw, "viewing date has no representable grid");
        return None;
    }
    Some(date)
}

fn parse_token(raw: &str, clock: &dyn Clock, tz: Tz) -> Option<DateTime<Tz>> {
    let token = raw.trim();
    if token.is_empty() {
        return None;
    }

    let now = clock.now_in(tz);
    match token.to_ascii_lowercase().as_str() {
        "now" => return Some(now),
        "today" => return Some(start_of_day(now)),
        "tomorrow" => return Some(shift(start_of_day(now), 1, NavigationUnit::Day)),
        "yesterday" => return Some(shift(start_of_day(now), -1, NavigationUnit::Day)),
        _ => {}
    }

    if let Some(caps) = relative_re().and_then(|re| re.captures(token)) {
        let num: i64 = caps.name("num")?.as_str().parse().ok()?;
        let delta = if caps.name("sign")?.as_str() == "-" { -num } else { num };
        let unit = NavigationUnit::from_key(caps.name("unit")?.as_str())?;
        return Some(shift(now, delta, unit));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(token) {
        return Some(dt.with_timezone(&tz));
    }

    if let Ok(date) = NaiveDate::parse_from_str(token, "%Y-%m-%d") {
        return Some(local_midnight(date, tz));
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(token, fmt) {
            return Some(resolve_local(naive, tz));
        }
    }

    None
}

/// Viewing date from a query value; missing or unparseable input means now.
pub fn resolve_viewing_date(
    input: Option<&QueryValue>,
    clock: &dyn Clock,
    tz: Tz,
) -> DateTime<Tz> {
    let Some(raw) = input.and_then(QueryValue::first) else {
        debug!("no viewing date supplied; using now");
        return clock.now_in(tz);
    };

    match parse_viewing_date(raw, clock, tz) {
        Some(date) => date,
        None => {
            warn!(input = %raw, "unparseable viewing date; using now");
            clock.now_in(tz)
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "y" | "yes" | "on" | "true" => Some(true),
        "0" | "n" | "no" | "off" | "false" => Some(false),
        _ => None,
    }
}

/// Everything a page needs to build its calendar.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarQuery {
    pub view_type: ViewType,
    pub viewing_date: DateTime<Tz>,
    pub flags: CalendarFlags,
}

impl CalendarQuery {
    #[tracing::instrument(skip_all)]
    pub fn from_params(
        params: &BTreeMap<String, QueryValue>,
        settings: &CalendarSettings,
        clock: &dyn Clock,
    ) -> Self {
        let view_type = match params.get(CALENDAR_TYPE_KEY).and_then(QueryValue::first) {
            Some(raw) => ViewType::from_key(raw).unwrap_or_else(|| {
                warn!(input = %raw, "unknown calendar type; using month");
                ViewType::Month
            }),
            None => settings.default_view,
        };

        let viewing_date =
            resolve_viewing_date(params.get(VIEWING_DATE_KEY), clock, settings.timezone);

        let mut flags = settings.flags;
        if let Some(raw) = params.get(FADE_PAST_EVENTS_KEY).and_then(QueryValue::first) {
            match parse_flag(raw) {
                Some(value) => flags.fade_past_events = value,
                None => warn!(input = %raw, "ignoring unrecognized fadePastEvents value"),
            }
        }

        debug!(view = view_type.as_key(), viewing_date = %viewing_date, ?flags, "resolved query");
        Self {
            view_type,
            viewing_date,
            flags,
        }
    }

    pub fn compute(&self, events: &[CalendarEvent], clock: &dyn Clock) -> CalendarState {
        compute_calendar_state(
            self.view_type,
            Some(self.viewing_date),
            events,
            self.flags,
            clock,
            self.viewing_date.timezone(),
        )
    }
}

/// Parameters a page hands back to its own boundary to show `date`.
pub fn navigation_params(date: DateTime<Tz>, view_type: ViewType) -> Vec<(String, String)> {
    vec![
        (VIEWING_DATE_KEY.to_string(), iso_string(date)),
        (CALENDAR_TYPE_KEY.to_string(), view_type.as_key().to_string()),
    ]
}

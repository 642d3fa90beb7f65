use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::datetime::start_of_day;

/// Primitive value allowed in event metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,

    pub title: String,

    pub start: DateTime<Utc>,

    pub end: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, MetadataValue>,
}

impl CalendarEvent {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            start,
            end,
            description: None,
            source: None,
            metadata: BTreeMap::new(),
        }
    }

    /// `start <= end`. Not enforced anywhere; callers own this.
    pub fn has_valid_span(&self) -> bool {
        self.start <= self.end
    }

    /// True when the event starts before local midnight of today.
    pub fn starts_before_today(&self, clock: &dyn Clock, tz: Tz) -> bool {
        self.start < start_of_day(clock.now_in(tz))
    }
}

/// Events whose start falls on `day`'s calendar day, ordered by start.
///
/// Only the start instant is considered, so an event spanning several days
/// lands on its first day alone. Equal starts keep their input order.
pub fn events_on_day(day: DateTime<Tz>, events: &[CalendarEvent]) -> Vec<CalendarEvent> {
    events_on_date(day.date_naive(), day.timezone(), events)
}

/// Same as [`events_on_day`], keyed by the calendar date in `tz`.
pub fn events_on_date(date: NaiveDate, tz: Tz, events: &[CalendarEvent]) -> Vec<CalendarEvent> {
    let mut on_day: Vec<CalendarEvent> = events
        .iter()
        .filter(|event| event.start.with_timezone(&tz).date_naive() == date)
        .cloned()
        .collect();
    on_day.sort_by_key(|event| event.start);
    on_day
}

/// Reads a JSON array of events.
#[tracing::instrument(skip_all, fields(file = %path.display()))]
pub fn load_events(path: &Path) -> anyhow::Result<Vec<CalendarEvent>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read events file {}", path.display()))?;
    let events: Vec<CalendarEvent> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse events file {}", path.display()))?;

    for event in events.iter().filter(|event| !event.has_valid_span()) {
        warn!(id = %event.id, start = %event.start, end = %event.end, "event ends before it starts");
    }
    debug!(count = events.len(), "loaded events");

    Ok(events)
}

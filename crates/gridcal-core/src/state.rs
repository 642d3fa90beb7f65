//! Calendar grid computation.
//!
//! A [`CalendarState`] is rebuilt from scratch for every render: the anchor
//! period (a month or an ISO week), the whole-week grid that covers it, and
//! the events placed on each grid cell.

use chrono::{DateTime, Datelike, NaiveDate, SecondsFormat, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::datetime::{
    WEEK_START, day_range, first_day_of_month, last_day_of_month, local_midnight,
    week_grid_bounds,
};
use crate::event::{CalendarEvent, events_on_date};

/// Short weekday labels indexed by [`DateDetail::day`] (Sunday first).
pub const DAY_KEYS: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

/// Weekday labels in grid column order.
pub fn grid_day_keys() -> [&'static str; 7] {
    let first = WEEK_START.num_days_from_sunday() as usize;
    std::array::from_fn(|column| DAY_KEYS[(first + column) % 7])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewType {
    #[default]
    Month,
    Week,
}

impl ViewType {
    pub fn as_key(self) -> &'static str {
        match self {
            Self::Month => "month",
            Self::Week => "week",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Month => "Month View",
            Self::Week => "Week View",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "month" => Some(Self::Month),
            "week" => Some(Self::Week),
            _ => None,
        }
    }
}

/// Rendering hints carried through the state untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CalendarFlags {
    pub fade_past_events: bool,
}

impl CalendarFlags {
    /// Whether a view should draw `event` faded.
    pub fn should_fade(&self, event: &CalendarEvent, clock: &dyn Clock, tz: Tz) -> bool {
        self.fade_past_events && event.starts_before_today(clock, tz)
    }
}

/// Per-deployment defaults for building a state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalendarSettings {
    pub timezone: Tz,
    pub default_view: ViewType,
    pub flags: CalendarFlags,
}

impl Default for CalendarSettings {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::UTC,
            default_view: ViewType::Month,
            flags: CalendarFlags::default(),
        }
    }
}

/// One grid cell.
#[derive(Debug, Clone, PartialEq)]
pub struct DateDetail {
    /// Local midnight of the cell's day, or the first instant after it when
    /// the timezone skipped that midnight.
    pub date: DateTime<Tz>,
    /// The cell's calendar date. Unlike `date`, never shared by two cells.
    pub calendar_date: NaiveDate,
    /// `date` as RFC 3339 in UTC with millisecond precision.
    pub date_string: String,
    /// 0 = Sunday.
    pub day: u8,
    pub events: Vec<CalendarEvent>,
}

impl DateDetail {
    pub fn new(date: DateTime<Tz>, events: &[CalendarEvent]) -> Self {
        Self::on_date(date.date_naive(), date.timezone(), events)
    }

    /// Cell for `calendar_date` in `tz`, holding the events that start on it.
    pub fn on_date(calendar_date: NaiveDate, tz: Tz, events: &[CalendarEvent]) -> Self {
        let date = local_midnight(calendar_date, tz);
        Self {
            date,
            calendar_date,
            date_string: iso_string(date),
            day: calendar_date.weekday().num_days_from_sunday() as u8,
            events: events_on_date(calendar_date, tz, events),
        }
    }
}

/// Calendar dates a view covers: the anchor period and its padded grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridBounds {
    pub anchor_first: NaiveDate,
    pub anchor_last: NaiveDate,
    pub grid_first: NaiveDate,
    pub grid_last: NaiveDate,
}

impl GridBounds {
    /// `None` when the padded grid around `date` is not representable.
    pub fn for_view(view_type: ViewType, date: NaiveDate) -> Option<Self> {
        let (anchor_first, anchor_last, grid_first, grid_last) = match view_type {
            ViewType::Month => {
                let first = first_day_of_month(date);
                let last = last_day_of_month(date);
                let (grid_first, grid_last) = week_grid_bounds(first, last)?;
                (first, last, grid_first, grid_last)
            }
            ViewType::Week => {
                let (first, last) = week_grid_bounds(date, date)?;
                (first, last, first, last)
            }
        };
        Some(Self {
            anchor_first,
            anchor_last,
            grid_first,
            grid_last,
        })
    }

    fn single_day(date: NaiveDate) -> Self {
        Self {
            anchor_first: date,
            anchor_last: date,
            grid_first: date,
            grid_last: date,
        }
    }
}

pub(crate) fn iso_string(date: DateTime<Tz>) -> String {
    date.with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalendarState {
    pub view_type: ViewType,
    /// Clock reading taken when the state was built.
    pub today: DateTime<Tz>,
    pub viewing_date: DateTime<Tz>,
    /// First day of the anchor period (not the padded grid).
    pub viewing_start_date: DateDetail,
    /// Last day of the anchor period (not the padded grid).
    pub viewing_end_date: DateDetail,
    /// Calendar days from anchor start to anchor end; 30 for a 31-day month.
    pub number_of_days_in_range: i64,
    /// The rendered grid, always whole weeks.
    pub dates_in_range: Vec<DateDetail>,
    pub flags: CalendarFlags,
}

impl CalendarState {
    pub fn timezone(&self) -> Tz {
        self.viewing_date.timezone()
    }

    /// Whether `date` lies inside the anchor period.
    pub fn is_in_anchor(&self, date: DateTime<Tz>) -> bool {
        self.is_anchor_date(date.with_timezone(&self.timezone()).date_naive())
    }

    pub fn is_anchor_date(&self, day: NaiveDate) -> bool {
        self.viewing_start_date.calendar_date <= day && day <= self.viewing_end_date.calendar_date
    }

    /// Reads the clock on every call.
    pub fn is_today(&self, cell: &DateDetail, clock: &dyn Clock) -> bool {
        clock.now_in(self.timezone()).date_naive() == cell.calendar_date
    }

    /// Grid rows, seven cells each.
    pub fn weeks(&self) -> impl Iterator<Item = &[DateDetail]> {
        self.dates_in_range.chunks(7)
    }

    pub fn title(&self) -> String {
        match self.view_type {
            ViewType::Month => self.viewing_date.format("%B %Y").to_string(),
            ViewType::Week => {
                let start = self.viewing_start_date.calendar_date;
                let end = self.viewing_end_date.calendar_date;
                format!("{} - {}", start.format("%b %d"), end.format("%b %d, %Y"))
            }
        }
    }
}

/// Builds the grid for `viewing_date`, or for today when none is given.
#[tracing::instrument(skip(events, clock), fields(events = events.len()))]
pub fn compute_calendar_state(
    view_type: ViewType,
    viewing_date: Option<DateTime<Tz>>,
    events: &[CalendarEvent],
    flags: CalendarFlags,
    clock: &dyn Clock,
    tz: Tz,
) -> CalendarState {
    let today = clock.now_in(tz);
    let mut viewing_date = match viewing_date {
        Some(date) => date.with_timezone(&tz),
        None => {
            debug!("no viewing date given; anchoring on today");
            today
        }
    };

    let bounds = match GridBounds::for_view(view_type, viewing_date.date_naive()) {
        Some(bounds) => bounds,
        None => {
            warn!(viewing_date = %viewing_date, "calendar grid out of range; anchoring on today");
            viewing_date = today;
            GridBounds::for_view(view_type, today.date_naive())
                .unwrap_or_else(|| GridBounds::single_day(today.date_naive()))
        }
    };

    let dates_in_range: Vec<DateDetail> = day_range(bounds.grid_first, bounds.grid_last, tz)
        .dates()
        .map(|day| DateDetail::on_date(day, tz, events))
        .collect();

    debug!(
        view = view_type.as_key(),
        anchor_first = %bounds.anchor_first,
        anchor_last = %bounds.anchor_last,
        cells = dates_in_range.len(),
        "computed calendar state"
    );

    CalendarState {
        view_type,
        today,
        viewing_date,
        viewing_start_date: DateDetail::on_date(bounds.anchor_first, tz, events),
        viewing_end_date: DateDetail::on_date(bounds.anchor_last, tz, events),
        number_of_days_in_range: bounds
            .anchor_last
            .signed_duration_since(bounds.anchor_first)
            .num_days(),
        dates_in_range,
        flags,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, TimeZone};

    use super::*;
    use crate::clock::FixedClock;

    fn clock() -> FixedClock {
        FixedClock::new(
            Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0)
                .single()
                .expect("valid utc"),
        )
    }

    fn local(y: i32, m: u32, d: u32, h: u32) -> DateTime<Tz> {
        chrono_tz::UTC
            .with_ymd_and_hms(y, m, d, h, 0, 0)
            .single()
            .expect("valid local datetime")
    }

    fn event(id: &str, start: DateTime<Tz>) -> CalendarEvent {
        let start = start.with_timezone(&Utc);
        CalendarEvent::new(id, id, start, start + TimeDelta::minutes(30))
    }

    fn ymd(detail: &DateDetail) -> String {
        detail.date.format("%Y-%m-%d").to_string()
    }

    #[test]
    fn grid_header_starts_on_monday() {
        assert_eq!(
            grid_day_keys(),
            ["MON", "TUE", "WED", "THU", "FRI", "SAT", "SUN"]
        );
    }

    #[test]
    fn month_state_pads_to_whole_weeks() {
        let state = compute_calendar_state(
            ViewType::Month,
            Some(local(2024, 3, 1, 0)),
            &[],
            CalendarFlags::default(),
            &clock(),
            chrono_tz::UTC,
        );

        assert_eq!(ymd(&state.viewing_start_date), "2024-03-01");
        assert_eq!(ymd(&state.viewing_end_date), "2024-03-31");
        assert_eq!(state.number_of_days_in_range, 30);
        assert_eq!(state.dates_in_range.len(), 35);
        assert_eq!(state.dates_in_range.first().map(ymd).as_deref(), Some("2024-02-26"));
        assert_eq!(state.dates_in_range.last().map(ymd).as_deref(), Some("2024-03-31"));
        assert_eq!(state.dates_in_range[0].day, 1);
        assert_eq!(state.dates_in_range[0].date_string, "2024-02-26T00:00:00.000Z");
        assert_eq!(state.weeks().count(), 5);
        assert_eq!(state.title(), "March 2024");
    }

    #[test]
    fn week_state_is_a_single_iso_week() {
        let state = compute_calendar_state(
            ViewType::Week,
            Some(local(2024, 3, 1, 15)),
            &[],
            CalendarFlags::default(),
            &clock(),
            chrono_tz::UTC,
        );

        let days: Vec<String> = state.dates_in_range.iter().map(ymd).collect();
        assert_eq!(
            days,
            vec![
                "2024-02-26",
                "2024-02-27",
                "2024-02-28",
                "2024-02-29",
                "2024-03-01",
                "2024-03-02",
                "2024-03-03"
            ]
        );
        assert_eq!(ymd(&state.viewing_start_date), "2024-02-26");
        assert_eq!(ymd(&state.viewing_end_date), "2024-03-03");
        assert_eq!(state.number_of_days_in_range, 6);
        assert_eq!(state.title(), "Feb 26 - Mar 03, 2024");
    }

    #[test]
    fn grid_is_whole_weeks_for_every_month() {
        for year in [2023, 2024, 2026] {
            for month in 1..=12 {
                let state = compute_calendar_state(
                    ViewType::Month,
                    Some(local(year, month, 15, 12)),
                    &[],
                    CalendarFlags::default(),
                    &clock(),
                    chrono_tz::UTC,
                );
                assert_eq!(state.dates_in_range.len() % 7, 0, "{year}-{month}");
                assert!(state.dates_in_range.len() >= 28);
                assert_eq!(state.dates_in_range[0].day, 1);
            }
        }
    }

    #[test]
    fn events_land_only_on_their_start_cell() {
        let events = vec![
            event("second", local(2024, 3, 1, 13)),
            event("first", local(2024, 3, 1, 12)),
            event("padding", local(2024, 2, 27, 9)),
            event("outside", local(2024, 4, 2, 9)),
        ];
        let state = compute_calendar_state(
            ViewType::Month,
            Some(local(2024, 3, 1, 0)),
            &events,
            CalendarFlags::default(),
            &clock(),
            chrono_tz::UTC,
        );

        for cell in &state.dates_in_range {
            let ids: Vec<&str> = cell.events.iter().map(|e| e.id.as_str()).collect();
            match ymd(cell).as_str() {
                "2024-03-01" => assert_eq!(ids, vec!["first", "second"]),
                "2024-02-27" => assert_eq!(ids, vec!["padding"]),
                _ => assert!(ids.is_empty(), "unexpected events on {}", ymd(cell)),
            }
        }
        assert_eq!(state.viewing_start_date.events.len(), 2);
    }

    #[test]
    fn missing_viewing_date_anchors_on_the_clock() {
        let state = compute_calendar_state(
            ViewType::Month,
            None,
            &[],
            CalendarFlags { fade_past_events: true },
            &clock(),
            chrono_tz::UTC,
        );
        assert_eq!(state.viewing_date, clock().now_in(chrono_tz::UTC));
        assert_eq!(state.viewing_date, state.today);
        assert!(state.flags.fade_past_events);
        assert_eq!(state.title(), "March 2024");
    }

    #[test]
    fn anchor_membership_and_today_marker() {
        let state = compute_calendar_state(
            ViewType::Month,
            Some(local(2024, 3, 20, 0)),
            &[],
            CalendarFlags::default(),
            &clock(),
            chrono_tz::UTC,
        );

        let outside = &state.dates_in_range[0];
        assert!(!state.is_in_anchor(outside.date));
        assert!(state.is_in_anchor(local(2024, 3, 31, 23)));

        let todays: Vec<String> = state
            .dates_in_range
            .iter()
            .filter(|cell| state.is_today(cell, &clock()))
            .map(ymd)
            .collect();
        assert_eq!(todays, vec!["2024-03-05"]);
    }

    #[test]
    fn fade_rule_needs_the_flag_and_a_past_start() {
        let old = event("old", local(2024, 3, 4, 9));
        let upcoming = event("upcoming", local(2024, 3, 5, 0));
        let on = CalendarFlags { fade_past_events: true };
        let off = CalendarFlags::default();

        assert!(on.should_fade(&old, &clock(), chrono_tz::UTC));
        assert!(!on.should_fade(&upcoming, &clock(), chrono_tz::UTC));
        assert!(!off.should_fade(&old, &clock(), chrono_tz::UTC));
    }

    #[test]
    fn view_keys_parse_leniently() {
        assert_eq!(ViewType::from_key("WEEK"), Some(ViewType::Week));
        assert_eq!(ViewType::from_key(" month"), Some(ViewType::Month));
        assert_eq!(ViewType::from_key("year"), None);
        assert_eq!(ViewType::default(), ViewType::Month);
    }

    #[test]
    fn skipped_calendar_day_keeps_its_own_empty_cell() {
        let apia: Tz = "Pacific/Apia".parse().expect("known timezone");
        let viewing = apia
            .with_ymd_and_hms(2011, 12, 29, 12, 0, 0)
            .single()
            .expect("valid local datetime");
        let new_year_eve = apia
            .with_ymd_and_hms(2011, 12, 31, 9, 0, 0)
            .single()
            .expect("valid local datetime")
            .with_timezone(&Utc);
        let events = vec![CalendarEvent::new(
            "nye",
            "nye",
            new_year_eve,
            new_year_eve + TimeDelta::hours(1),
        )];

        let state = compute_calendar_state(
            ViewType::Week,
            Some(viewing),
            &events,
            CalendarFlags::default(),
            &clock(),
            apia,
        );

        let dates: Vec<String> = state
            .dates_in_range
            .iter()
            .map(|cell| cell.calendar_date.to_string())
            .collect();
        assert_eq!(
            dates,
            vec![
                "2011-12-26",
                "2011-12-27",
                "2011-12-28",
                "2011-12-29",
                "2011-12-30",
                "2011-12-31",
                "2012-01-01"
            ]
        );
        let with_event: Vec<String> = state
            .dates_in_range
            .iter()
            .filter(|cell| !cell.events.is_empty())
            .map(|cell| cell.calendar_date.to_string())
            .collect();
        assert_eq!(with_event, vec!["2011-12-31"]);
        assert_eq!(state.dates_in_range[4].day, 5);
        assert_eq!(state.dates_in_range[5].day, 6);
        assert_eq!(state.number_of_days_in_range, 6);
    }

    #[test]
    fn unrepresentable_grid_falls_back_to_today() {
        let latest = NaiveDate::MAX;
        let viewing = local_midnight(latest, chrono_tz::UTC);
        let state = compute_calendar_state(
            ViewType::Month,
            Some(viewing),
            &[],
            CalendarFlags::default(),
            &clock(),
            chrono_tz::UTC,
        );
        if latest.weekday() == chrono::Weekday::Sun {
            assert_eq!(state.viewing_end_date.calendar_date, latest);
        } else {
            assert_eq!(state.viewing_date, state.today);
            assert_eq!(state.title(), "March 2024");
        }
        assert_eq!(state.dates_in_range.len() % 7, 0);
    }

    #[test]
    fn grid_bounds_stop_at_the_ends_of_the_calendar() {
        let earliest = NaiveDate::MIN;
        let latest = NaiveDate::MAX;
        assert_eq!(
            GridBounds::for_view(ViewType::Week, earliest).is_some(),
            earliest.weekday() == WEEK_START
        );
        assert_eq!(
            GridBounds::for_view(ViewType::Week, latest).is_some(),
            latest.weekday() == WEEK_START.pred()
        );

        let late_december =
            NaiveDate::from_ymd_opt(latest.year(), 12, 20).expect("valid date");
        assert_eq!(last_day_of_month(late_december), latest);

        let bounds = GridBounds::for_view(
            ViewType::Month,
            NaiveDate::from_ymd_opt(2024, 12, 20).expect("valid date"),
        )
        .expect("representable grid");
        assert_eq!(bounds.anchor_last.to_string(), "2024-12-31");
        assert_eq!(bounds.grid_first.to_string(), "2024-11-25");
        assert_eq!(bounds.grid_last.to_string(), "2025-01-05");
    }
}

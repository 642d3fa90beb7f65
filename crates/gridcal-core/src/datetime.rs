use std::iter::FusedIterator;

use chrono::{
  DateTime,
  Datelike,
  Days,
  LocalResult,
  NaiveDate,
  NaiveDateTime,
  NaiveTime,
  TimeDelta,
  TimeZone,
  Weekday
};
use chrono_tz::Tz;

use crate::clock::Clock;

/// First day of every rendered week.
pub const WEEK_START: Weekday =
  Weekday::Mon;

const DAY_END_MILLIS: i64 = 86_399_999;
const GAP_PROBE_MINUTES: i64 = 15;
const GAP_PROBE_LIMIT: i64 = 4 * 24;

/// Resolves a wall-clock datetime in `tz`.
///
/// Ambiguous times (clocks rolled back) take the earliest instant.
/// Times inside a DST gap move forward to the first instant that exists.
#[must_use]
pub fn resolve_local(
  naive: NaiveDateTime,
  tz: Tz
) -> DateTime<Tz> {
  match tz.from_local_datetime(&naive) {
    | LocalResult::Single(dt) => dt,
    | LocalResult::Ambiguous(
      first,
      second
    ) => {
      if first <= second {
        first
      } else {
        second
      }
    }
    | LocalResult::None => {
      for step in 1..=GAP_PROBE_LIMIT {
        let Some(candidate) = naive
          .checked_add_signed(
            TimeDelta::minutes(
              step * GAP_PROBE_MINUTES
            )
          )
        else {
          break;
        };
        if let Some(dt) = tz
          .from_local_datetime(
            &candidate
          )
          .earliest()
        {
          return dt;
        }
      }
      tracing::warn!(
        local = %naive,
        timezone = %tz,
        "local datetime never exists; reading it as utc"
      );
      tz.from_utc_datetime(&naive)
    }
  }
}

#[must_use]
pub fn local_midnight(
  date: NaiveDate,
  tz: Tz
) -> DateTime<Tz> {
  resolve_local(
    date.and_time(NaiveTime::MIN),
    tz
  )
}

fn local_day_end(
  date: NaiveDate,
  tz: Tz
) -> DateTime<Tz> {
  let midnight =
    date.and_time(NaiveTime::MIN);
  let last = midnight
    .checked_add_signed(
      TimeDelta::milliseconds(
        DAY_END_MILLIS
      )
    )
    .unwrap_or(midnight);
  resolve_local(last, tz)
}

#[must_use]
pub fn start_of_day(
  d: DateTime<Tz>
) -> DateTime<Tz> {
  local_midnight(
    d.date_naive(),
    d.timezone()
  )
}

#[must_use]
pub fn end_of_day(
  d: DateTime<Tz>
) -> DateTime<Tz> {
  local_day_end(
    d.date_naive(),
    d.timezone()
  )
}

pub(crate) fn first_day_of_month(
  date: NaiveDate
) -> NaiveDate {
  date.with_day(1).unwrap_or(date)
}

pub(crate) fn last_day_of_month(
  date: NaiveDate
) -> NaiveDate {
  let last = if date.month() == 12 {
    NaiveDate::from_ymd_opt(
      date.year(),
      12,
      31
    )
  } else {
    NaiveDate::from_ymd_opt(
      date.year(),
      date.month() + 1,
      1
    )
    .and_then(|next| next.pred_opt())
  };
  last.unwrap_or(date)
}

fn days_into_week(
  date: NaiveDate
) -> u64 {
  let day_idx = date
    .weekday()
    .num_days_from_monday();
  let start_idx =
    WEEK_START.num_days_from_monday();
  u64::from((7 + day_idx - start_idx) % 7)
}

fn first_day_of_week(
  date: NaiveDate
) -> NaiveDate {
  date
    .checked_sub_days(Days::new(
      days_into_week(date)
    ))
    .unwrap_or(date)
}

/// First and last day of the whole weeks covering `first..=last`.
///
/// `None` when the padding would leave chrono's representable dates.
pub(crate) fn week_grid_bounds(
  first: NaiveDate,
  last: NaiveDate
) -> Option<(NaiveDate, NaiveDate)> {
  let start = first.checked_sub_days(
    Days::new(days_into_week(first))
  )?;
  let end = last.checked_add_days(
    Days::new(6 - days_into_week(last))
  )?;
  Some((start, end))
}

pub(crate) fn add_days(
  date: NaiveDate,
  days: i64
) -> NaiveDate {
  date
    .checked_add_signed(
      TimeDelta::days(days)
    )
    .unwrap_or(date)
}

/// First day of the month containing `d`, at local midnight.
#[must_use]
pub fn start_of_month(
  d: DateTime<Tz>
) -> DateTime<Tz> {
  local_midnight(
    first_day_of_month(d.date_naive()),
    d.timezone()
  )
}

/// Last day of the month containing `d`, at the last millisecond of the day.
#[must_use]
pub fn end_of_month(
  d: DateTime<Tz>
) -> DateTime<Tz> {
  local_day_end(
    last_day_of_month(d.date_naive()),
    d.timezone()
  )
}

#[must_use]
pub fn start_of_week(
  d: DateTime<Tz>
) -> DateTime<Tz> {
  local_midnight(
    first_day_of_week(d.date_naive()),
    d.timezone()
  )
}

#[must_use]
pub fn end_of_week(
  d: DateTime<Tz>
) -> DateTime<Tz> {
  let last = add_days(
    first_day_of_week(d.date_naive()),
    6
  );
  local_day_end(last, d.timezone())
}

/// Day of week with Sunday as 0.
#[must_use]
pub fn day_of_week(
  d: DateTime<Tz>
) -> u8 {
  d.weekday().num_days_from_sunday()
    as u8
}

#[must_use]
pub fn is_same_day<A, B>(
  a: &DateTime<A>,
  b: &DateTime<B>,
  tz: Tz
) -> bool
where
  A: TimeZone,
  B: TimeZone
{
  a.with_timezone(&tz).date_naive()
    == b.with_timezone(&tz).date_naive()
}

/// Reads the clock on every call.
#[must_use]
pub fn is_today<A>(
  d: &DateTime<A>,
  clock: &dyn Clock,
  tz: Tz
) -> bool
where
  A: TimeZone
{
  is_same_day(d, &clock.now(), tz)
}

/// Calendar days from `start` to `end`, both read in `start`'s timezone.
#[must_use]
pub fn days_between(
  start: DateTime<Tz>,
  end: DateTime<Tz>
) -> i64 {
  let end_date = end
    .with_timezone(&start.timezone())
    .date_naive();
  end_date
    .signed_duration_since(
      start.date_naive()
    )
    .num_days()
}

/// Every calendar day from `start`'s day through `end`'s day, at local
/// midnight in `start`'s timezone.
#[must_use]
pub fn enumerate_days(
  start: DateTime<Tz>,
  end: DateTime<Tz>
) -> DayRange {
  let tz = start.timezone();
  day_range(
    start.date_naive(),
    end.with_timezone(&tz).date_naive(),
    tz
  )
}

/// Every calendar date from `front` through `back` in `tz`.
///
/// Dates that have no midnight in `tz` are still visited; see
/// [`DayRange::dates`].
#[must_use]
pub fn day_range(
  front: NaiveDate,
  back: NaiveDate,
  tz: Tz
) -> DayRange {
  let span = back
    .signed_duration_since(front)
    .num_days();
  let remaining = if span < 0 {
    0
  } else {
    usize::try_from(span + 1)
      .unwrap_or(0)
  };

  DayRange {
    front,
    back,
    remaining,
    tz
  }
}

#[derive(Debug, Clone)]
pub struct DayRange {
  front:     NaiveDate,
  back:      NaiveDate,
  remaining: usize,
  tz:        Tz
}

impl DayRange {
  /// The iterated calendar dates themselves.
  ///
  /// A date skipped entirely by its timezone (Pacific/Apia, 2011-12-30)
  /// resolves to the next day's midnight as an instant, so callers that
  /// need one value per date should read these instead.
  pub fn dates(
    self
  ) -> impl DoubleEndedIterator<Item = NaiveDate>
  + ExactSizeIterator {
    let front = self.front;
    (0..self.remaining).map(move |offset| {
      add_days(front, offset as i64)
    })
  }
}

impl Iterator for DayRange {
  type Item = DateTime<Tz>;

  fn next(
    &mut self
  ) -> Option<Self::Item> {
    if self.remaining == 0 {
      return None;
    }
    let day = self.front;
    self.remaining -= 1;
    self.front = add_days(day, 1);
    Some(local_midnight(day, self.tz))
  }

  fn size_hint(
    &self
  ) -> (usize, Option<usize>) {
    (
      self.remaining,
      Some(self.remaining)
    )
  }
}

impl DoubleEndedIterator for DayRange {
  fn next_back(
    &mut self
  ) -> Option<Self::Item> {
    if self.remaining == 0 {
      return None;
    }
    let day = self.back;
    self.remaining -= 1;
    self.back = add_days(day, -1);
    Some(local_midnight(day, self.tz))
  }
}

impl ExactSizeIterator for DayRange {}

impl FusedIterator for DayRange {}

use chrono::{
  DateTime,
  Days,
  Months,
  NaiveDateTime
};
use chrono_tz::Tz;

use crate::datetime::resolve_local;
use crate::state::ViewType;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum NavigationUnit {
  Day,
  Week,
  Month
}

impl NavigationUnit {
  pub fn as_key(self) -> &'static str {
    match self {
      | Self::Day => "day",
      | Self::Week => "week",
      | Self::Month => "month"
    }
  }

  pub fn from_key(
    key: &str
  ) -> Option<Self> {
    match key
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "day" | "days" | "d" => {
        Some(Self::Day)
      }
      | "week" | "weeks" | "w" => {
        Some(Self::Week)
      }
      | "month" | "months" | "m" => {
        Some(Self::Month)
      }
      | _ => None
    }
  }
}

impl From<ViewType> for NavigationUnit {
  fn from(view: ViewType) -> Self {
    match view {
      | ViewType::Month => Self::Month,
      | ViewType::Week => Self::Week
    }
  }
}

/// Moves `date` by `delta` units, keeping its local wall-clock time.
///
/// Month steps clamp to the last day of the target month. A result that
/// falls outside chrono's range leaves `date` unchanged.
#[must_use]
pub fn shift(
  date: DateTime<Tz>,
  delta: i64,
  unit: NavigationUnit
) -> DateTime<Tz> {
  let naive = date.naive_local();
  let magnitude = delta.unsigned_abs();
  let forward = delta >= 0;

  let shifted = match unit {
    | NavigationUnit::Day => {
      shift_days(naive, magnitude, forward)
    }
    | NavigationUnit::Week => magnitude
      .checked_mul(7)
      .and_then(|days| {
        shift_days(naive, days, forward)
      }),
    | NavigationUnit::Month => {
      u32::try_from(magnitude)
        .ok()
        .and_then(|months| {
          let months =
            Months::new(months);
          if forward {
            naive
              .checked_add_months(months)
          } else {
            naive
              .checked_sub_months(months)
          }
        })
    }
  };

  match shifted {
    | Some(local) => {
      resolve_local(
        local,
        date.timezone()
      )
    }
    | None => {
      tracing::warn!(
        date = %date,
        delta,
        unit = unit.as_key(),
        "navigation target out of range; staying put"
      );
      date
    }
  }
}

fn shift_days(
  naive: NaiveDateTime,
  days: u64,
  forward: bool
) -> Option<NaiveDateTime> {
  let days = Days::new(days);
  if forward {
    naive.checked_add_days(days)
  } else {
    naive.checked_sub_days(days)
  }
}

#[must_use]
pub fn advance(
  date: DateTime<Tz>,
  amount: u32,
  unit: NavigationUnit
) -> DateTime<Tz> {
  shift(date, i64::from(amount), unit)
}

#[must_use]
pub fn retreat(
  date: DateTime<Tz>,
  amount: u32,
  unit: NavigationUnit
) -> DateTime<Tz> {
  shift(
    date,
    -i64::from(amount),
    unit
  )
}

/// One period of `view` after `date`.
#[must_use]
pub fn next_viewing_date(
  date: DateTime<Tz>,
  view: ViewType
) -> DateTime<Tz> {
  advance(date, 1, view.into())
}

#[must_use]
pub fn previous_viewing_date(
  date: DateTime<Tz>,
  view: ViewType
) -> DateTime<Tz> {
  retreat(date, 1, view.into())
}

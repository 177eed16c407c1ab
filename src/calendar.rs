//! Period calendars.
//!
//! A [`RollingCalendar`] is built from a pattern's primary date token. It
//! answers two questions about the configured date format: where the period
//! boundaries fall, and whether two distinct periods could ever render to
//! the same text.

use chrono::format::{Fixed, Item, Numeric, StrftimeItems};
use chrono::{
    DateTime, Datelike, Days, Duration, FixedOffset, Local, LocalResult, Months, NaiveDateTime,
    TimeZone, Timelike,
};
use thiserror::Error;

use crate::pattern::DateToken;

/// The granularity at which a date format advances.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Periodicity {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
}

impl Periodicity {
    /// Human-readable rollover schedule, used in activation diagnostics.
    pub fn describe(self) -> &'static str {
        match self {
            Periodicity::Second => "every second",
            Periodicity::Minute => "every minute",
            Periodicity::Hour => "every hour",
            Periodicity::Day => "every day",
            Periodicity::Week => "every week",
            Periodicity::Month => "every month",
        }
    }
}

/// A date format that cannot drive period boundaries.
#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("date format [{format}] does not vary at any supported period granularity")]
    UnsupportedGranularity { format: String },
}

/// Calendar arithmetic for one date format.
#[derive(Clone, Debug)]
pub struct RollingCalendar {
    periodicity: Periodicity,
    collision_free: bool,
    zone: Option<FixedOffset>,
}

impl RollingCalendar {
    /// Derives the calendar from a date token. Fails when the format holds
    /// no field finer than a year, since no supported period would ever
    /// change its rendering.
    pub fn new(token: &DateToken) -> Result<RollingCalendar, CalendarError> {
        let fields = Fields::scan(&token.date_format);
        let periodicity =
            fields
                .periodicity()
                .ok_or_else(|| CalendarError::UnsupportedGranularity {
                    format: token.date_format.clone(),
                })?;
        Ok(RollingCalendar {
            periodicity,
            collision_free: fields.is_collision_free(periodicity),
            zone: token.zone,
        })
    }

    pub fn periodicity(&self) -> Periodicity {
        self.periodicity
    }

    /// True when no two distinct periods render identically: the format
    /// spells out every coarser field down to its own granularity.
    pub fn is_collision_free(&self) -> bool {
        self.collision_free
    }

    /// The start of the period strictly after `millis`, in epoch
    /// milliseconds, computed in the configured zone (the local zone when
    /// none was given).
    pub fn next_period_start(&self, millis: i64) -> i64 {
        match self.zone {
            Some(offset) => next_start_in(&offset, self.periodicity, millis),
            None => next_start_in(&Local, self.periodicity, millis),
        }
    }
}

#[derive(Default)]
struct Fields {
    year: bool,
    iso_year: bool,
    month: bool,
    day: bool,
    ordinal: bool,
    weekday: bool,
    week: bool,
    iso_week: bool,
    hour: bool,
    hour12: bool,
    am_pm: bool,
    minute: bool,
    second: bool,
    timestamp: bool,
}

impl Fields {
    fn scan(format: &str) -> Fields {
        let mut fields = Fields::default();
        for item in StrftimeItems::new(format) {
            match item {
                Item::Numeric(numeric, _) => match numeric {
                    Numeric::Year | Numeric::YearMod100 => fields.year = true,
                    Numeric::IsoYear | Numeric::IsoYearMod100 => fields.iso_year = true,
                    Numeric::Month => fields.month = true,
                    Numeric::Day => fields.day = true,
                    Numeric::Ordinal => fields.ordinal = true,
                    Numeric::WeekFromSun | Numeric::WeekFromMon => fields.week = true,
                    Numeric::IsoWeek => fields.iso_week = true,
                    Numeric::NumDaysFromSun | Numeric::WeekdayFromMon => fields.weekday = true,
                    Numeric::Hour => fields.hour = true,
                    Numeric::Hour12 => fields.hour12 = true,
                    Numeric::Minute => fields.minute = true,
                    Numeric::Second => fields.second = true,
                    Numeric::Nanosecond => fields.second = true,
                    Numeric::Timestamp => fields.timestamp = true,
                    _ => {}
                },
                Item::Fixed(fixed) => match fixed {
                    Fixed::ShortMonthName | Fixed::LongMonthName => fields.month = true,
                    Fixed::ShortWeekdayName | Fixed::LongWeekdayName => fields.weekday = true,
                    Fixed::LowerAmPm | Fixed::UpperAmPm => fields.am_pm = true,
                    Fixed::Nanosecond
                    | Fixed::Nanosecond3
                    | Fixed::Nanosecond6
                    | Fixed::Nanosecond9 => fields.second = true,
                    Fixed::RFC2822 | Fixed::RFC3339 => fields.timestamp = true,
                    _ => {}
                },
                _ => {}
            }
        }
        fields
    }

    fn periodicity(&self) -> Option<Periodicity> {
        if self.timestamp || self.second {
            Some(Periodicity::Second)
        } else if self.minute {
            Some(Periodicity::Minute)
        } else if self.hour || self.hour12 {
            Some(Periodicity::Hour)
        } else if self.day || self.ordinal || self.weekday {
            Some(Periodicity::Day)
        } else if self.week || self.iso_week {
            Some(Periodicity::Week)
        } else if self.month {
            Some(Periodicity::Month)
        } else {
            None
        }
    }

    fn is_collision_free(&self, periodicity: Periodicity) -> bool {
        if self.timestamp {
            return true;
        }
        let year = self.year;
        let month = year && self.month;
        let day = (month && self.day) || (year && self.ordinal);
        let hour = day && (self.hour || (self.hour12 && self.am_pm));
        let minute = hour && self.minute;
        let second = minute && self.second;
        let week = (year || self.iso_year) && (self.week || self.iso_week);
        match periodicity {
            Periodicity::Second => second,
            Periodicity::Minute => minute,
            Periodicity::Hour => hour,
            Periodicity::Day => day,
            Periodicity::Week => week,
            Periodicity::Month => month,
        }
    }
}

fn next_start_in<Tz: TimeZone>(tz: &Tz, periodicity: Periodicity, millis: i64) -> i64 {
    let local = tz
        .timestamp_millis_opt(millis)
        .single()
        .expect("instant out of range")
        .naive_local();
    let next = advance(truncate(local, periodicity), periodicity);
    resolve_local(tz, next).timestamp_millis()
}

fn truncate(t: NaiveDateTime, periodicity: Periodicity) -> NaiveDateTime {
    let date = t.date();
    match periodicity {
        Periodicity::Second => t.with_nanosecond(0).expect("zero nanosecond is valid"),
        Periodicity::Minute => date
            .and_hms_opt(t.hour(), t.minute(), 0)
            .expect("truncated minute is valid"),
        Periodicity::Hour => date
            .and_hms_opt(t.hour(), 0, 0)
            .expect("truncated hour is valid"),
        Periodicity::Day => date.and_hms_opt(0, 0, 0).expect("midnight is valid"),
        Periodicity::Week => {
            let into_week = u64::from(date.weekday().num_days_from_monday());
            date.checked_sub_days(Days::new(into_week))
                .expect("start of week is representable")
                .and_hms_opt(0, 0, 0)
                .expect("midnight is valid")
        }
        Periodicity::Month => date
            .with_day(1)
            .expect("the first of the month is valid")
            .and_hms_opt(0, 0, 0)
            .expect("midnight is valid"),
    }
}

fn advance(t: NaiveDateTime, periodicity: Periodicity) -> NaiveDateTime {
    match periodicity {
        Periodicity::Second => t + Duration::seconds(1),
        Periodicity::Minute => t + Duration::minutes(1),
        Periodicity::Hour => t + Duration::hours(1),
        Periodicity::Day => t
            .checked_add_days(Days::new(1))
            .expect("There is no tomorrow?"),
        Periodicity::Week => t
            .checked_add_days(Days::new(7))
            .expect("there is no next week"),
        Periodicity::Month => t
            .checked_add_months(Months::new(1))
            .expect("there is no next month"),
    }
}

fn resolve_local<Tz: TimeZone>(tz: &Tz, start: NaiveDateTime) -> DateTime<Tz> {
    let mut candidate = start;
    // a boundary inside a DST gap moves forward to the first valid wall time;
    // a boundary inside a fold resolves to its earlier occurrence
    for _ in 0..8 {
        match tz.from_local_datetime(&candidate) {
            LocalResult::Single(ts) => return ts,
            LocalResult::Ambiguous(first, _) => return first,
            LocalResult::None => candidate += Duration::minutes(30),
        }
    }
    panic!("period boundary is not a valid wall-clock time");
}

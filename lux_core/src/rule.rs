//! Recurrence rules and their evaluation against a concrete year.
//!
//! Every rule is a pure function of the year. Rules are checked for malformed
//! parameters before they are evaluated, so evaluation never panics.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{de, Deserialize, Deserializer};
use thiserror::Error;

/// The first year the Gregorian computus is defined for.
pub const FIRST_GREGORIAN_YEAR: i32 = 1583;

/// Weekdays in index order, `0` being Monday.
static WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// How a template's date is derived for a given year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecurrenceRule {
    /// The same calendar day every year.
    Fixed { month: u32, day: u32 },
    /// A number of days before (negative) or after Easter Sunday.
    EasterOffset { days: i64 },
    /// The `occurrence`-th `weekday` of `month`, e.g. the second Sunday of May.
    NthWeekdayOfMonth {
        month: u32,
        #[serde(deserialize_with = "deserialize_weekday")]
        weekday: Weekday,
        occurrence: u32,
    },
    /// The last `weekday` of `month`, e.g. the last Sunday of October.
    LastWeekdayOfMonth {
        month: u32,
        #[serde(deserialize_with = "deserialize_weekday")]
        weekday: Weekday,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("month {0} is outside of 1..=12")]
    InvalidMonth(u32),
    #[error("day {day} does not exist in month {month}")]
    InvalidDay { month: u32, day: u32 },
    #[error("occurrence {0} is outside of 1..=5")]
    InvalidOccurrence(u32),
    #[error("{year:04}-{month:02}-{day:02} does not exist")]
    NonexistentDate { year: i32, month: u32, day: u32 },
    #[error("there is no occurrence {occurrence} of {weekday} in {year:04}-{month:02}")]
    NoSuchOccurrence {
        year: i32,
        month: u32,
        weekday: Weekday,
        occurrence: u32,
    },
    #[error("year {0} is before 1583, Easter cannot be computed")]
    YearBeforeGregorian(i32),
    #[error("an offset of {days} days from {easter} leaves the supported date range")]
    OffsetOutOfRange { easter: NaiveDate, days: i64 },
}

impl RecurrenceRule {
    /// Check the rule parameters independently of any year.
    ///
    /// 29 February passes this check and only fails when resolved for a
    /// non-leap year.
    pub fn validate(&self) -> Result<(), RuleError> {
        match *self {
            RecurrenceRule::Fixed { month, day } => {
                check_month(month)?;
                // 2000 is a leap year, so every day that exists in some year passes.
                let longest = last_day_of_month(2000, month).map_or(31, |date| date.day());
                if day == 0 || day > longest {
                    return Err(RuleError::InvalidDay { month, day });
                }
                Ok(())
            }
            RecurrenceRule::EasterOffset { .. } => Ok(()),
            RecurrenceRule::NthWeekdayOfMonth {
                month, occurrence, ..
            } => {
                check_month(month)?;
                if !(1..=5).contains(&occurrence) {
                    return Err(RuleError::InvalidOccurrence(occurrence));
                }
                Ok(())
            }
            RecurrenceRule::LastWeekdayOfMonth { month, .. } => check_month(month),
        }
    }

    /// Resolve the rule to the date it falls on in `year`.
    pub fn resolve(&self, year: i32) -> Result<NaiveDate, RuleError> {
        self.validate()?;
        match *self {
            RecurrenceRule::Fixed { month, day } => date(year, month, day),
            RecurrenceRule::EasterOffset { days } => {
                let easter = easter_sunday(year)?;
                let shifted = if days >= 0 {
                    easter.checked_add_days(Days::new(days.unsigned_abs()))
                } else {
                    easter.checked_sub_days(Days::new(days.unsigned_abs()))
                };
                shifted.ok_or(RuleError::OffsetOutOfRange { easter, days })
            }
            RecurrenceRule::NthWeekdayOfMonth {
                month,
                weekday,
                occurrence,
            } => {
                let first = date(year, month, 1)?;
                let last = last_of_month(year, month)?;
                let day = 1 + days_until(first.weekday(), weekday) + (occurrence - 1) * 7;
                if day > last.day() {
                    return Err(RuleError::NoSuchOccurrence {
                        year,
                        month,
                        weekday,
                        occurrence,
                    });
                }
                date(year, month, day)
            }
            RecurrenceRule::LastWeekdayOfMonth { month, weekday } => {
                let last = last_of_month(year, month)?;
                let day = last.day() - days_until(weekday, last.weekday());
                date(year, month, day)
            }
        }
    }
}

/// Easter Sunday of `year` following the anonymous Gregorian algorithm.
pub fn easter_sunday(year: i32) -> Result<NaiveDate, RuleError> {
    if year < FIRST_GREGORIAN_YEAR {
        return Err(RuleError::YearBeforeGregorian(year));
    }
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let n = h + l - 7 * m + 114;
    // n / 31 is 3 or 4 and n % 31 + 1 at most 31, both fit into u32.
    date(year, (n / 31) as u32, (n % 31 + 1) as u32)
}

fn check_month(month: u32) -> Result<(), RuleError> {
    if (1..=12).contains(&month) {
        Ok(())
    } else {
        Err(RuleError::InvalidMonth(month))
    }
}

fn date(year: i32, month: u32, day: u32) -> Result<NaiveDate, RuleError> {
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or(RuleError::NonexistentDate { year, month, day })
}

fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 {
        (year.checked_add(1)?, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}

fn last_of_month(year: i32, month: u32) -> Result<NaiveDate, RuleError> {
    last_day_of_month(year, month).ok_or(RuleError::NonexistentDate {
        year,
        month,
        day: 31,
    })
}

/// Days to walk forward from `from` to reach the next `to`, `0` if equal.
fn days_until(from: Weekday, to: Weekday) -> u32 {
    (to.num_days_from_monday() + 7 - from.num_days_from_monday()) % 7
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WeekdayRepr {
    Index(u8),
    Name(String),
}

fn deserialize_weekday<'de, D>(deserializer: D) -> Result<Weekday, D::Error>
where
    D: Deserializer<'de>,
{
    match WeekdayRepr::deserialize(deserializer)? {
        WeekdayRepr::Index(index) => WEEKDAYS.get(usize::from(index)).copied().ok_or_else(|| {
            de::Error::custom(format!("weekday index {index} is outside of 0..=6"))
        }),
        WeekdayRepr::Name(name) => weekday_from_name(&name)
            .ok_or_else(|| de::Error::custom(format!("unsupported weekday '{name}'"))),
    }
}

fn weekday_from_name(name: &str) -> Option<Weekday> {
    let weekday = match name.trim().to_ascii_uppercase().as_str() {
        "MONDAY" => Weekday::Mon,
        "TUESDAY" => Weekday::Tue,
        "WEDNESDAY" => Weekday::Wed,
        "THURSDAY" => Weekday::Thu,
        "FRIDAY" => Weekday::Fri,
        "SATURDAY" => Weekday::Sat,
        "SUNDAY" => Weekday::Sun,
        _ => return None,
    };
    Some(weekday)
}

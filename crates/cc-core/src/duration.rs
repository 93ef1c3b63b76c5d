//! Run-length expressions and calendar arithmetic.
//!
//! A run length is either a calendar offset `N1yN2m` (either part may be
//! omitted, both may be signed, `N2` may exceed 12) or an exact day count
//! `N3d`.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeDelta};

use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunLength {
    /// Calendar offset; `None` parts were absent from the expression.
    YearsMonths {
        years: Option<i64>,
        months: Option<i64>,
    },
    /// Exact offset in days of 86400 s.
    Days(i64),
}

impl RunLength {
    pub fn years(n: i64) -> Self {
        RunLength::YearsMonths {
            years: Some(n),
            months: None,
        }
    }

    pub fn months(n: i64) -> Self {
        RunLength::YearsMonths {
            years: None,
            months: Some(n),
        }
    }

    pub fn days(n: i64) -> Self {
        RunLength::Days(n)
    }
}

fn signed(text: &str, expr: &str) -> CoreResult<i64> {
    let digits = text.strip_prefix(['+', '-']).unwrap_or(text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CoreError::MalformedDuration {
            expr: expr.to_string(),
        });
    }
    text.parse().map_err(|_| CoreError::MalformedDuration {
        expr: expr.to_string(),
    })
}

impl FromStr for RunLength {
    type Err = CoreError;

    fn from_str(expr: &str) -> Result<Self, Self::Err> {
        let s = expr.trim();
        if s.contains('y') || s.contains('m') {
            let (years, rest) = match s.split_once('y') {
                Some((n, rest)) => (Some(signed(n, expr)?), rest),
                None => (None, s),
            };
            let months = if rest.is_empty() {
                None
            } else {
                let n = rest
                    .strip_suffix('m')
                    .ok_or_else(|| CoreError::MalformedDuration {
                        expr: expr.to_string(),
                    })?;
                Some(signed(n, expr)?)
            };
            return Ok(RunLength::YearsMonths { years, months });
        }

        match s.strip_suffix('d') {
            Some(n) => Ok(RunLength::Days(signed(n, expr)?)),
            None => Err(CoreError::MalformedDuration {
                expr: expr.to_string(),
            }),
        }
    }
}

impl fmt::Display for RunLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunLength::YearsMonths { years, months } => {
                if let Some(y) = years {
                    write!(f, "{}y", y)?;
                }
                if let Some(m) = months {
                    write!(f, "{}m", m)?;
                }
                Ok(())
            }
            RunLength::Days(d) => write!(f, "{}d", d),
        }
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for RunLength {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for RunLength {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

fn last_day_of_month(year: i32, month: u32) -> Option<u32> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?
        .pred_opt()
        .map(|d| d.day())
}

/// Shift `date` by a run length.
///
/// Calendar offsets keep the time of day and clamp the day of month to the
/// length of the target month. Day offsets shift by exact elapsed time.
pub fn add_run_length(date: &NaiveDateTime, length: &RunLength) -> CoreResult<NaiveDateTime> {
    let out_of_range = || CoreError::DateOutOfRange {
        what: format!("{} + {}", date, length),
    };

    match *length {
        RunLength::YearsMonths { years, months } => {
            let years = years.unwrap_or(0);
            let months = months.unwrap_or(0);
            let shifted = months + date.month0() as i64;
            let year = date.year() as i64 + years + shifted.div_euclid(12);
            let month = shifted.rem_euclid(12) as u32 + 1;
            let year = i32::try_from(year).map_err(|_| out_of_range())?;
            let last = last_day_of_month(year, month).ok_or_else(out_of_range)?;
            NaiveDate::from_ymd_opt(year, month, date.day().min(last))
                .map(|d| d.and_time(date.time()))
                .ok_or_else(out_of_range)
        }
        RunLength::Days(days) => {
            let delta = TimeDelta::try_days(days).ok_or_else(out_of_range)?;
            date.checked_add_signed(delta).ok_or_else(out_of_range)
        }
    }
}

/// Parse `expr` and add it to `date`.
pub fn add_duration(date: &NaiveDateTime, expr: &str) -> CoreResult<NaiveDateTime> {
    add_run_length(date, &expr.parse()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn ymdh(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn parses_all_forms() {
        assert_eq!("1y".parse::<RunLength>().unwrap(), RunLength::years(1));
        assert_eq!("14m".parse::<RunLength>().unwrap(), RunLength::months(14));
        assert_eq!(
            "2y-3m".parse::<RunLength>().unwrap(),
            RunLength::YearsMonths {
                years: Some(2),
                months: Some(-3)
            }
        );
        assert_eq!("-5d".parse::<RunLength>().unwrap(), RunLength::days(-5));
        assert_eq!("+1d".parse::<RunLength>().unwrap(), RunLength::days(1));
    }

    #[test]
    fn rejects_malformed() {
        for expr in ["", "d", "y", "3", "1x", "1m2y", "1.5d", "1y2", "m3", "1y2m3d"] {
            assert!(
                matches!(
                    expr.parse::<RunLength>(),
                    Err(CoreError::MalformedDuration { .. })
                ),
                "{expr} should be rejected"
            );
        }
    }

    #[test]
    fn display_is_canonical() {
        for expr in ["1y", "14m", "2y-3m", "-5d"] {
            assert_eq!(expr.parse::<RunLength>().unwrap().to_string(), expr);
        }
    }

    #[test]
    fn month_overflow_rolls_year() {
        let date = ymdh(2020, 6, 15, 12);
        assert_eq!(add_duration(&date, "14m").unwrap(), ymdh(2021, 8, 15, 12));
        assert_eq!(add_duration(&date, "1y2m").unwrap(), ymdh(2021, 8, 15, 12));
    }

    #[test]
    fn negative_months_underflow() {
        let date = ymdh(2020, 2, 10, 0);
        assert_eq!(add_duration(&date, "-3m").unwrap(), ymdh(2019, 11, 10, 0));
        assert_eq!(add_duration(&date, "-1y-14m").unwrap(), ymdh(2017, 12, 10, 0));
    }

    #[test]
    fn day_of_month_is_clamped() {
        let date = ymdh(2020, 1, 31, 6);
        assert_eq!(add_duration(&date, "1m").unwrap(), ymdh(2020, 2, 29, 6));
        assert_eq!(add_duration(&date, "13m").unwrap(), ymdh(2021, 2, 28, 6));
    }

    #[test]
    fn days_shift_exact_time() {
        let date = ymdh(2020, 2, 28, 18);
        let shifted = add_duration(&date, "2d").unwrap();
        assert_eq!(shifted, ymdh(2020, 3, 1, 18));
        assert_eq!(shifted.hour(), 18);
    }
}

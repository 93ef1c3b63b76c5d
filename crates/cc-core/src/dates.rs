//! Calendar date text formats.
//!
//! Each side of the coupled system encodes dates its own way:
//! - case descriptor and command line: `YYYY-MM-DD-HH`
//! - atmosphere namelists (`ydate_ini`, `ydate_end`): `YYYYMMDDHH`
//! - coupler namelists (`start_ymd`): the integer `YYYYMMDD`, with the time of
//!   day carried separately in seconds (`start_tod`)

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

use crate::error::{CoreError, CoreResult};

pub const CASE_DATE_FORMAT: &str = "%Y-%m-%d-%H";
pub const ATMOSPHERE_DATE_FORMAT: &str = "%Y%m%d%H";
pub const COUPLER_DATE_FORMAT: &str = "%Y%m%d";

fn malformed(what: &'static str, text: &str, format: &'static str) -> CoreError {
    CoreError::MalformedDate {
        what,
        text: text.to_string(),
        format,
    }
}

fn number(text: &str, what: &'static str, full: &str, format: &'static str) -> CoreResult<u32> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed(what, full, format));
    }
    text.parse().map_err(|_| malformed(what, full, format))
}

fn build(
    year: u32,
    month: u32,
    day: u32,
    hour: u32,
    what: &'static str,
    full: &str,
    format: &'static str,
) -> CoreResult<NaiveDateTime> {
    NaiveDate::from_ymd_opt(year as i32, month, day)
        .and_then(|date| date.and_hms_opt(hour, 0, 0))
        .ok_or_else(|| malformed(what, full, format))
}

/// Parse a `YYYY-MM-DD-HH` date as used by the case descriptor.
pub fn parse_case_date(text: &str) -> CoreResult<NaiveDateTime> {
    let text = text.trim();
    let parts: Vec<&str> = text.split('-').collect();
    if parts.len() != 4 || parts[0].len() != 4 {
        return Err(malformed("case date", text, CASE_DATE_FORMAT));
    }
    let year = number(parts[0], "case date", text, CASE_DATE_FORMAT)?;
    let month = number(parts[1], "case date", text, CASE_DATE_FORMAT)?;
    let day = number(parts[2], "case date", text, CASE_DATE_FORMAT)?;
    let hour = number(parts[3], "case date", text, CASE_DATE_FORMAT)?;
    build(year, month, day, hour, "case date", text, CASE_DATE_FORMAT)
}

pub fn format_case_date(date: &NaiveDateTime) -> String {
    date.format(CASE_DATE_FORMAT).to_string()
}

/// Parse a `YYYYMMDDHH` date as found in the atmosphere run control block.
pub fn parse_atmosphere_date(text: &str) -> CoreResult<NaiveDateTime> {
    let text = text.trim();
    if text.len() != 10 || !text.is_ascii() {
        return Err(malformed("atmosphere date", text, ATMOSPHERE_DATE_FORMAT));
    }
    let what = "atmosphere date";
    let year = number(&text[0..4], what, text, ATMOSPHERE_DATE_FORMAT)?;
    let month = number(&text[4..6], what, text, ATMOSPHERE_DATE_FORMAT)?;
    let day = number(&text[6..8], what, text, ATMOSPHERE_DATE_FORMAT)?;
    let hour = number(&text[8..10], what, text, ATMOSPHERE_DATE_FORMAT)?;
    build(year, month, day, hour, what, text, ATMOSPHERE_DATE_FORMAT)
}

pub fn format_atmosphere_date(date: &NaiveDateTime) -> String {
    date.format(ATMOSPHERE_DATE_FORMAT).to_string()
}

/// Decode the coupler's integer `YYYYMMDD` date plus seconds of day.
pub fn coupler_date(ymd: i64, tod_seconds: i64) -> CoreResult<NaiveDateTime> {
    let text = ymd.to_string();
    if ymd <= 0 || !(0..86_400).contains(&tod_seconds) {
        return Err(malformed("coupler date", &text, COUPLER_DATE_FORMAT));
    }
    let year = i32::try_from(ymd / 10_000).map_err(|_| malformed("coupler date", &text, COUPLER_DATE_FORMAT))?;
    let month = ((ymd / 100) % 100) as u32;
    let day = (ymd % 100) as u32;
    let tod = tod_seconds as u32;
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(tod / 3600, (tod % 3600) / 60, tod % 60))
        .ok_or_else(|| malformed("coupler date", &text, COUPLER_DATE_FORMAT))
}

/// Encode a date as the coupler's `(start_ymd, start_tod)` pair.
pub fn coupler_fields(date: &NaiveDateTime) -> (i64, i64) {
    let ymd = date.year() as i64 * 10_000 + date.month() as i64 * 100 + date.day() as i64;
    (ymd, date.num_seconds_from_midnight() as i64)
}

/// `YYYYMMDD` stamp used in log file names.
pub fn format_day_stamp(date: &NaiveDateTime) -> String {
    date.format(COUPLER_DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymdh(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn case_date_roundtrip() {
        let date = parse_case_date("2020-01-03-06").unwrap();
        assert_eq!(date, ymdh(2020, 1, 3, 6));
        assert_eq!(format_case_date(&date), "2020-01-03-06");
    }

    #[test]
    fn case_date_rejects_garbage() {
        assert!(parse_case_date("2020-01-03").is_err());
        assert!(parse_case_date("2020-13-01-00").is_err());
        assert!(parse_case_date("20-01-01-00").is_err());
        assert!(parse_case_date("2020-01-01-xx").is_err());
    }

    #[test]
    fn atmosphere_date_parses_hour() {
        assert_eq!(
            parse_atmosphere_date("1999123118").unwrap(),
            ymdh(1999, 12, 31, 18)
        );
        assert!(parse_atmosphere_date("19991231").is_err());
        assert_eq!(format_atmosphere_date(&ymdh(2001, 2, 3, 4)), "2001020304");
    }

    #[test]
    fn coupler_date_uses_time_of_day() {
        assert_eq!(coupler_date(20200101, 0).unwrap(), ymdh(2020, 1, 1, 0));
        assert_eq!(coupler_date(20200101, 3600).unwrap(), ymdh(2020, 1, 1, 1));
        assert!(coupler_date(20200230, 0).is_err());
        assert!(coupler_date(20200101, 86_400).is_err());
    }

    #[test]
    fn coupler_year_beyond_i32_is_malformed() {
        // 2^32 + 2000 would wrap to year 2000 if truncated.
        let err = coupler_date(42_949_692_960_101, 0).unwrap_err();
        assert!(matches!(err, CoreError::MalformedDate { .. }), "{err}");
        assert!(coupler_date(i64::MAX, 0).is_err());
    }

    #[test]
    fn coupler_fields_split_date_and_seconds() {
        assert_eq!(coupler_fields(&ymdh(2020, 3, 14, 6)), (20200314, 21_600));
        assert_eq!(format_day_stamp(&ymdh(2020, 3, 14, 6)), "20200314");
    }
}

//! Date/time functions
//!
//! Dates are serial numbers in the 1900 date system.
//!
//! Notes:
//! - Serial 1 is 1900-01-01 and serial 0 is the day before.
//! - The system includes the historical "1900 leap year" bug, inserting a non-existent
//!   day 1900-02-29 as serial 60.

use super::{finite, Args};
use chrono::{Datelike, NaiveDate};
use tabula_core::{parse_number, ErrorKind, Value};

/// `num_days_from_ce` of 1899-12-31, the day before serial 1
const SERIAL_EPOCH: i32 = 693_595;

/// Text layouts accepted as dates, tried in order after commas are dropped
const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%m/%d/%Y", "%b %d %Y", "%d %b %Y", "%B %d %Y"];

fn is_leap_gregorian(year: i32) -> bool {
    (year % 4 == 0) && ((year % 100 != 0) || (year % 400 == 0))
}

/// Serial number of a calendar date
pub fn serial_from_date(date: NaiveDate) -> i64 {
    let days = i64::from(date.num_days_from_ce() - SERIAL_EPOCH);
    // From 1900-03-01 on, serials count the fictional 1900-02-29
    if days >= 60 {
        days + 1
    } else {
        days
    }
}

fn serial_from_ymd(year: i32, month: u32, day: u32) -> Result<i64, ErrorKind> {
    NaiveDate::from_ymd_opt(year, month, day)
        .map(serial_from_date)
        .ok_or(ErrorKind::Num)
}

/// Calendar (year, month, day) of a serial number
pub fn date_from_serial(serial: i64) -> Option<(i32, u32, u32)> {
    if serial == 60 {
        return Some((1900, 2, 29));
    }
    let adjusted = if serial > 60 { serial - 1 } else { serial };
    let days = i32::try_from(adjusted).ok()?.checked_add(SERIAL_EPOCH)?;
    let date = NaiveDate::from_num_days_from_ce_opt(days)?;
    Some((date.year(), date.month(), date.day()))
}

/// Parse date text such as `2024-01-15`, `1/15/2024`, `Jan 15, 2024` or `15 Jan 2024`
pub fn parse_date_text(text: &str) -> Option<NaiveDate> {
    let normalized = text.replace(',', " ");
    let normalized = normalized.split_whitespace().collect::<Vec<_>>().join(" ");
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(&normalized, format).ok())
}

/// Coerce a date argument to a serial number
///
/// Numbers are taken as serials and blank is serial 0. Text is parsed as a date, or as
/// a number if it is not one. Anything else is `#VALUE!`.
pub fn as_date_serial(value: &Value) -> Result<f64, ErrorKind> {
    match value.first_value()? {
        Value::Number(n) => Ok(*n),
        Value::Blank => Ok(0.0),
        Value::Text(s) => match parse_date_text(s) {
            Some(date) => Ok(serial_from_date(date) as f64),
            None => parse_number(s).ok_or(ErrorKind::Value),
        },
        _ => Err(ErrorKind::Value),
    }
}

/// Fraction of a year between two serials under a day-count basis
///
/// Bases: 0 US (NASD) 30/360, 1 actual/actual, 2 actual/360, 3 actual/365,
/// 4 European 30/360.
pub fn yearfrac(start: f64, end: f64, basis: i32) -> Result<f64, ErrorKind> {
    let (mut start, mut end) = (start.trunc(), end.trunc());
    if start < 0.0 || end < 0.0 {
        return Err(ErrorKind::Num);
    }
    if start > end {
        std::mem::swap(&mut start, &mut end);
    }

    let (sy, sm, mut sd) = date_from_serial(start as i64).ok_or(ErrorKind::Num)?;
    let (ey, em, mut ed) = date_from_serial(end as i64).ok_or(ErrorKind::Num)?;
    let days = end - start;

    let days_360 = |sd: u32, ed: u32| {
        let start = f64::from(sd) + f64::from(sm) * 30.0 + f64::from(sy) * 360.0;
        let end = f64::from(ed) + f64::from(em) * 30.0 + f64::from(ey) * 360.0;
        (end - start) / 360.0
    };

    match basis {
        0 => {
            if sd == 31 && ed == 31 {
                sd = 30;
                ed = 30;
            } else if sd == 31 {
                sd = 30;
            } else if sd == 30 && ed == 31 {
                ed = 30;
            }
            Ok(days_360(sd, ed))
        }
        1 => {
            let within_a_year =
                sy == ey || (sy + 1 == ey && (sm > em || (sm == em && sd >= ed)));
            if within_a_year {
                let leap = (sy == ey && is_leap_gregorian(sy))
                    || spans_feb_29((sy, sm, sd), (ey, em, ed))
                    || (em == 2 && ed == 29);
                let year_length = if leap { 366.0 } else { 365.0 };
                return Ok(days / year_length);
            }

            let years = f64::from(ey - sy + 1);
            let span = serial_from_ymd(ey + 1, 1, 1)? - serial_from_ymd(sy, 1, 1)?;
            finite(days / (span as f64 / years))
        }
        2 => Ok(days / 360.0),
        3 => Ok(days / 365.0),
        4 => Ok(days_360(sd.min(30), ed.min(30))),
        _ => {
            log::debug!("YEARFRAC basis {} is not supported", basis);
            Err(ErrorKind::Num)
        }
    }
}

/// Whether a leap day lies between two dates (start before March 1, end on or after)
fn spans_feb_29(start: (i32, u32, u32), end: (i32, u32, u32)) -> bool {
    let march_1 = |year: i32| (year, 3, 1);
    let (sy, ey) = (start.0, end.0);

    if is_leap_gregorian(sy) && start < march_1(sy) && end >= march_1(sy) {
        return true;
    }
    is_leap_gregorian(ey) && end >= march_1(ey) && start < march_1(ey)
}

/// YEARFRAC(start_date, end_date, [basis])
pub fn fn_yearfrac(args: &Args) -> Value {
    year_fraction(args).into()
}

fn year_fraction(args: &Args) -> Result<f64, ErrorKind> {
    let start = as_date_serial(args.value(0))?;
    let end = as_date_serial(args.value(1))?;
    let basis = args.number_or(2, 0.0)?;
    yearfrac(start, end, basis.trunc() as i32)
}

/// DATEVALUE(date_text)
pub fn fn_datevalue(args: &Args) -> Value {
    let value = match args.value(0).first_value() {
        Ok(v) => v,
        Err(e) => return Value::Error(e),
    };
    match value {
        Value::Text(s) => match parse_date_text(s) {
            Some(date) => Value::Number(serial_from_date(date) as f64),
            None => {
                log::debug!("DATEVALUE could not parse {:?}", s);
                Value::Error(ErrorKind::Value)
            }
        },
        _ => Value::Error(ErrorKind::Value),
    }
}

/// NOW() - Returns the serial number of the current day
///
/// The time of day is dropped, so NOW() and TODAY() agree.
/// This is a volatile function that recalculates on every calculation.
pub fn fn_now(args: &Args) -> Value {
    let now = args.ctx().now();
    Value::Number(serial_from_date(now.date()) as f64)
}

/// TODAY() - Returns current date as a serial number
/// This is a volatile function that recalculates on every calculation.
pub fn fn_today(args: &Args) -> Value {
    let today = args.ctx().now().date();
    Value::Number(serial_from_date(today) as f64)
}

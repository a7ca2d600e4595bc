//! Date built-ins. Dates are numbers: milliseconds since the Unix epoch,
//! interpreted in UTC. Text arguments are parsed as ISO-8601 dates.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use formwire_core::Value;

use super::{Builtins, CallContext, expect_args, is_blank, number_arg, text_arg};
use crate::error::BuiltinError;

const MILLIS_PER_DAY: i64 = 86_400_000;

pub(super) fn register(b: &mut Builtins) {
    b.add("date", "now", "Current time in epoch milliseconds", now);
    b.add("date", "today", "Midnight (UTC) of the current day", today);
    b.add("date", "currentTime", "Current time of day as HH:MM", current_time);
    b.add("date", "parseDate", "Date parsed from text, with an optional strftime format", parse_date);
    b.add("date", "formatDate", "Date rendered with a strftime format (default %Y-%m-%d)", format_date);
    b.add("date", "addDays", "Date shifted by a number of days", add_days);
    b.add("date", "daysBetween", "Whole calendar days from the first date to the second", days_between);
    b.add("date", "year", "Calendar year of a date", year);
    b.add("date", "month", "Month (1-12) of a date", month);
    b.add("date", "day", "Day of month of a date", day);
    b.add("date", "age", "Completed years since a date", age);
}

fn to_datetime(name: &str, position: usize, millis: i64) -> Result<DateTime<Utc>, BuiltinError> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| BuiltinError::invalid_argument(name, position, "is out of the date range"))
}

fn parse_text(text: &str, format: Option<&str>) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Some(format) = format {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt.and_utc());
        }
        return NaiveDate::parse_from_str(text, format)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.and_utc());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Argument `pos` as a date: epoch milliseconds or ISO-8601 text.
fn date_arg(name: &str, args: &[Value], pos: usize) -> Result<DateTime<Utc>, BuiltinError> {
    match args.get(pos) {
        Some(Value::Text(text)) if text.trim().parse::<f64>().is_err() => parse_text(text, None)
            .ok_or_else(|| {
                BuiltinError::invalid_argument(name, pos + 1, format!("'{text}' is not a date"))
            }),
        Some(value) if !is_blank(value) => {
            let millis = number_arg(name, args, pos)?;
            to_datetime(name, pos + 1, millis as i64)
        }
        _ => Err(BuiltinError::invalid_argument(name, pos + 1, "is missing")),
    }
}

fn millis(dt: DateTime<Utc>) -> Value {
    Value::from(dt.timestamp_millis() as f64)
}

fn now(ctx: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("now", args, 0, 0)?;
    Ok(Value::from(ctx.clock.now_millis() as f64))
}

fn today(ctx: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("today", args, 0, 0)?;
    let now = ctx.clock.now_millis();
    Ok(Value::from(now.div_euclid(MILLIS_PER_DAY) as f64 * MILLIS_PER_DAY as f64))
}

fn current_time(ctx: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("currentTime", args, 0, 0)?;
    let now = to_datetime("currentTime", 0, ctx.clock.now_millis())?;
    Ok(Value::Text(now.format("%H:%M").to_string()))
}

fn parse_date(_: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("parseDate", args, 1, 2)?;
    let text = text_arg(args, 0);
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    let format = args.get(1).map(Value::to_text);
    parse_text(&text, format.as_deref())
        .map(millis)
        .ok_or_else(|| BuiltinError::invalid_argument("parseDate", 1, format!("'{text}' is not a date")))
}

fn format_date(_: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("formatDate", args, 1, 2)?;
    if args.first().is_some_and(is_blank) {
        return Ok(Value::Text(String::new()));
    }
    let date = date_arg("formatDate", args, 0)?;
    let format = if args.len() > 1 {
        text_arg(args, 1)
    } else {
        "%Y-%m-%d".to_string()
    };
    let items: Vec<_> = chrono::format::StrftimeItems::new(&format).collect();
    if items.contains(&chrono::format::Item::Error) {
        return Err(BuiltinError::invalid_argument(
            "formatDate",
            2,
            format!("'{format}' is not a valid date format"),
        ));
    }
    Ok(Value::Text(date.format_with_items(items.into_iter()).to_string()))
}

fn add_days(_: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("addDays", args, 2, 2)?;
    let date = date_arg("addDays", args, 0)?;
    let days = number_arg("addDays", args, 1)?;
    let out_of_range =
        || BuiltinError::invalid_argument("addDays", 2, "is out of the date range");
    let offset = days * MILLIS_PER_DAY as f64;
    if !offset.is_finite() || offset.abs() >= i64::MAX as f64 {
        return Err(out_of_range());
    }
    let shifted = date
        .timestamp_millis()
        .checked_add(offset as i64)
        .ok_or_else(out_of_range)?;
    let shifted = to_datetime("addDays", 2, shifted)?;
    Ok(Value::from(shifted.timestamp_millis() as f64))
}

fn days_between(_: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("daysBetween", args, 2, 2)?;
    let from = date_arg("daysBetween", args, 0)?.date_naive();
    let to = date_arg("daysBetween", args, 1)?.date_naive();
    Ok(Value::from((to - from).num_days()))
}

fn year(_: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("year", args, 1, 1)?;
    Ok(Value::from(date_arg("year", args, 0)?.year()))
}

fn month(_: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("month", args, 1, 1)?;
    Ok(Value::from(date_arg("month", args, 0)?.month() as i64))
}

fn day(_: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("day", args, 1, 1)?;
    Ok(Value::from(date_arg("day", args, 0)?.day() as i64))
}

fn age(ctx: &CallContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args("age", args, 1, 1)?;
    let born = date_arg("age", args, 0)?.date_naive();
    let today = to_datetime("age", 0, ctx.clock.now_millis())?.date_naive();
    let mut years = today.year() - born.year();
    if (today.month(), today.day()) < (born.month(), born.day()) {
        years -= 1;
    }
    Ok(Value::from(years.max(0)))
}

#[cfg(test)]
mod tests {
    use super::super::testing::{Harness, NOW};
    use super::*;
    use pretty_assertions::assert_eq;

    fn call(name: &str, args: Vec<Value>) -> Value {
        Harness::new().call(name, args).unwrap()
    }

    #[test]
    fn clock_functions_read_the_clock() {
        assert_eq!(call("now", vec![]), Value::from(NOW as f64));
        assert_eq!(call("today", vec![]), Value::from(1_710_460_800_000_i64 as f64));
        assert_eq!(call("currentTime", vec![]), Value::from("10:30"));
    }

    #[test]
    fn parse_and_format_round_trip() {
        let parsed = call("parseDate", vec!["2024-02-29".into()]);
        assert_eq!(parsed, Value::from(1_709_164_800_000_i64 as f64));
        assert_eq!(call("formatDate", vec![parsed.clone()]), Value::from("2024-02-29"));
        assert_eq!(
            call("formatDate", vec![parsed, "%d.%m.%Y".into()]),
            Value::from("29.02.2024")
        );
        assert_eq!(
            call("parseDate", vec!["31/12/2023".into(), "%d/%m/%Y".into()]),
            Value::from(1_703_980_800_000_i64 as f64)
        );
        assert_eq!(call("parseDate", vec!["".into()]), Value::Null);
    }

    #[test]
    fn invalid_dates_are_argument_errors() {
        let h = Harness::new();
        assert!(h.call("parseDate", vec!["tomorrow".into()]).is_err());
        assert!(h.call("year", vec![Value::Null]).is_err());
        assert!(h.call("formatDate", vec![0.into(), "%Q".into()]).is_err());
    }

    #[test]
    fn add_days_rejects_shifts_outside_the_date_range() {
        let h = Harness::new();
        let out_of_range = BuiltinError::invalid_argument("addDays", 2, "is out of the date range");
        assert_eq!(h.call("addDays", vec![1000.into(), 1e20.into()]), Err(out_of_range.clone()));
        assert_eq!(h.call("addDays", vec![1000.into(), (-1e20).into()]), Err(out_of_range.clone()));
        assert_eq!(h.call("addDays", vec![0.into(), 1e12.into()]), Err(out_of_range));
    }

    #[test]
    fn calendar_arithmetic() {
        assert_eq!(
            call("daysBetween", vec!["2024-02-27".into(), "2024-03-01".into()]),
            Value::from(3)
        );
        let shifted = call("addDays", vec!["2024-02-28".into(), 2.into()]);
        assert_eq!(call("formatDate", vec![shifted]), Value::from("2024-03-01"));
        assert_eq!(call("year", vec!["2024-02-28".into()]), Value::from(2024));
        assert_eq!(call("month", vec!["2024-02-28".into()]), Value::from(2));
        assert_eq!(call("day", vec!["2024-02-28".into()]), Value::from(28));
    }

    #[test]
    fn age_counts_completed_years() {
        assert_eq!(call("age", vec!["2000-03-15".into()]), Value::from(24));
        assert_eq!(call("age", vec!["2000-03-16".into()]), Value::from(23));
    }
}

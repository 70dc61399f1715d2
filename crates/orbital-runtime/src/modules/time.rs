//! time/* operators.
//!
//! Timestamps are epoch milliseconds in UTC. ISO-8601 strings are accepted
//! anywhere a timestamp is. "Now" is the `@now` root when the host supplies
//! one, so evaluation stays reproducible; otherwise the system clock.

use super::arg;
use super::format::Locale;
use crate::dispatch::Handler;
use crate::evaluator::{Call, EvalError};
use crate::value::{number, to_text};
use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use orbital_ir::BindingRoot;
use serde_json::Value;

pub(crate) const HANDLERS: &[(&str, Handler)] = &[
    ("time/now", Handler::Eager(now)),
    ("time/today", Handler::Eager(today)),
    ("time/parse", Handler::Eager(parse)),
    ("time/format", Handler::Eager(format)),
    ("time/add", Handler::Eager(add)),
    ("time/subtract", Handler::Eager(subtract)),
    ("time/diff", Handler::Eager(diff)),
    ("time/isBefore", Handler::Eager(is_before)),
    ("time/isAfter", Handler::Eager(is_after)),
    ("time/isPast", Handler::Eager(is_past)),
    ("time/isFuture", Handler::Eager(is_future)),
    ("time/relative", Handler::Eager(relative)),
    ("time/startOf", Handler::Eager(start_of)),
];

const SECOND: i64 = 1_000;
const MINUTE: i64 = 60 * SECOND;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const WEEK: i64 = 7 * DAY;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Millisecond,
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl Unit {
    fn parse(name: &str) -> Option<Self> {
        let unit = match name {
            "ms" | "millisecond" | "milliseconds" => Unit::Millisecond,
            "s" | "sec" | "second" | "seconds" => Unit::Second,
            "m" | "min" | "minute" | "minutes" => Unit::Minute,
            "h" | "hour" | "hours" => Unit::Hour,
            "d" | "day" | "days" => Unit::Day,
            "w" | "week" | "weeks" => Unit::Week,
            "month" | "months" => Unit::Month,
            "y" | "year" | "years" => Unit::Year,
            _ => return None,
        };
        Some(unit)
    }

    /// Length in milliseconds for units of fixed length.
    fn fixed_ms(self) -> Option<i64> {
        match self {
            Unit::Millisecond => Some(1),
            Unit::Second => Some(SECOND),
            Unit::Minute => Some(MINUTE),
            Unit::Hour => Some(HOUR),
            Unit::Day => Some(DAY),
            Unit::Week => Some(WEEK),
            Unit::Month | Unit::Year => None,
        }
    }
}

fn unit(call: &Call<'_>, value: &Value) -> Result<Unit, EvalError> {
    Unit::parse(&to_text(value)).ok_or_else(|| call.invalid(format!("unknown time unit {value}")))
}

/// Converts a timestamp value. Unparseable input, and numbers outside the
/// representable calendar range, are `None`.
pub(super) fn to_millis(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .filter(|f| f.is_finite())
            .map(|f| f as i64)
            .filter(|ms| to_datetime(*ms).is_some()),
        Value::String(s) => parse_iso(s),
        _ => None,
    }
}

fn parse_iso(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, pattern) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().timestamp_millis())
}

fn to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}

/// The `@now` root when supplied, else the system clock.
pub(crate) fn now_ms(call: &Call<'_>) -> i64 {
    call.scope()
        .context()
        .root(BindingRoot::Now)
        .and_then(to_millis)
        .unwrap_or_else(|| Utc::now().timestamp_millis())
}

fn out_of_range(call: &Call<'_>) -> EvalError {
    call.invalid("result is outside the representable time range")
}

fn millis(ms: i64) -> Value {
    number(ms as f64)
}

fn now(call: &Call<'_>, _: &[Value]) -> Result<Value, EvalError> {
    Ok(millis(now_ms(call)))
}

fn today(call: &Call<'_>, _: &[Value]) -> Result<Value, EvalError> {
    let ms = now_ms(call);
    Ok(millis(ms - ms.rem_euclid(DAY)))
}

fn parse(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(to_millis(arg(args, 0)).map_or(Value::Null, millis))
}

/// Translates `YYYY MM DD HH mm ss` tokens to a chrono pattern. Everything
/// else is copied literally.
fn chrono_pattern(pattern: &str) -> String {
    const TOKENS: &[(&str, &str)] = &[
        ("YYYY", "%Y"),
        ("MM", "%m"),
        ("DD", "%d"),
        ("HH", "%H"),
        ("mm", "%M"),
        ("ss", "%S"),
    ];
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut rest = pattern;
    'scan: while let Some(c) = rest.chars().next() {
        for (token, spec) in TOKENS {
            if let Some(tail) = rest.strip_prefix(token) {
                out.push_str(spec);
                rest = tail;
                continue 'scan;
            }
        }
        if c == '%' {
            out.push_str("%%");
        } else {
            out.push(c);
        }
        rest = &rest[c.len_utf8()..];
    }
    out
}

fn format(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let Some(dt) = to_millis(arg(args, 0)).and_then(to_datetime) else {
        return Ok(Value::Null);
    };
    let pattern = chrono_pattern(&to_text(arg(args, 1)));
    Ok(Value::String(dt.format(&pattern).to_string()))
}

fn shift(call: &Call<'_>, args: &[Value], sign: i64) -> Result<Value, EvalError> {
    let unit = unit(call, arg(args, 2))?;
    let (Some(ms), Some(amount)) = (to_millis(arg(args, 0)), super::int(args, 1)) else {
        return Ok(Value::Null);
    };
    let amount = amount.checked_mul(sign).ok_or_else(|| out_of_range(call))?;
    let shifted = match unit.fixed_ms() {
        Some(size) => amount
            .checked_mul(size)
            .and_then(|delta| ms.checked_add(delta))
            .filter(|ms| to_datetime(*ms).is_some()),
        None => {
            let months = if unit == Unit::Year { amount.checked_mul(12) } else { Some(amount) };
            months
                .zip(to_datetime(ms))
                .and_then(|(months, dt)| add_months(dt, months))
                .map(|dt| dt.timestamp_millis())
        }
    };
    shifted.map(millis).ok_or_else(|| out_of_range(call))
}

fn add_months(dt: DateTime<Utc>, months: i64) -> Option<DateTime<Utc>> {
    let magnitude = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    if months >= 0 {
        dt.checked_add_months(magnitude)
    } else {
        dt.checked_sub_months(magnitude)
    }
}

fn add(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    shift(call, args, 1)
}

fn subtract(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    shift(call, args, -1)
}

/// Whole calendar months from `b` to `a`, truncated toward zero.
fn month_diff(a: DateTime<Utc>, b: DateTime<Utc>) -> i64 {
    let mut months = (a.year() as i64 - b.year() as i64) * 12 + (a.month() as i64 - b.month() as i64);
    let rest = |dt: DateTime<Utc>| (dt.day(), dt.num_seconds_from_midnight(), dt.timestamp_subsec_millis());
    if months > 0 && rest(a) < rest(b) {
        months -= 1;
    } else if months < 0 && rest(a) > rest(b) {
        months += 1;
    }
    months
}

fn diff(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let unit = match arg(args, 2) {
        Value::Null => Unit::Millisecond,
        other => unit(call, other)?,
    };
    let (Some(a), Some(b)) = (to_millis(arg(args, 0)), to_millis(arg(args, 1))) else {
        return Ok(Value::Null);
    };
    let out = match unit.fixed_ms() {
        Some(size) => a.checked_sub(b).ok_or_else(|| out_of_range(call))? / size,
        None => {
            let (Some(a), Some(b)) = (to_datetime(a), to_datetime(b)) else {
                return Ok(Value::Null);
            };
            let months = month_diff(a, b);
            if unit == Unit::Year { months / 12 } else { months }
        }
    };
    Ok(millis(out))
}

fn compare_times(args: &[Value], accept: fn(i64, i64) -> bool) -> Value {
    match (to_millis(arg(args, 0)), to_millis(arg(args, 1))) {
        (Some(a), Some(b)) => Value::Bool(accept(a, b)),
        _ => Value::Bool(false),
    }
}

fn is_before(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(compare_times(args, |a, b| a < b))
}

fn is_after(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(compare_times(args, |a, b| a > b))
}

fn is_past(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let now = now_ms(call);
    Ok(Value::Bool(to_millis(arg(args, 0)).is_some_and(|t| t < now)))
}

fn is_future(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let now = now_ms(call);
    Ok(Value::Bool(to_millis(arg(args, 0)).is_some_and(|t| t > now)))
}

/// "just now", "5m ago", "3h ago", "2d ago", or a locale date after a week.
/// Future times read "in 5m" and so on.
fn relative(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let Some(t) = to_millis(arg(args, 0)) else {
        return Ok(Value::Null);
    };
    let elapsed = now_ms(call).checked_sub(t).ok_or_else(|| out_of_range(call))?;
    let magnitude = elapsed.checked_abs().ok_or_else(|| out_of_range(call))?;
    let amount = match magnitude {
        m if m < MINUTE => return Ok(Value::String("just now".to_string())),
        m if m < HOUR => format!("{}m", m / MINUTE),
        m if m < DAY => format!("{}h", m / HOUR),
        m if m < WEEK => format!("{}d", m / DAY),
        _ => {
            let locale = Locale::resolve(call, &Value::Null);
            return Ok(to_datetime(t).map_or(Value::Null, |dt| {
                Value::String(dt.format(locale.date).to_string())
            }));
        }
    };
    let text = if elapsed >= 0 { format!("{amount} ago") } else { format!("in {amount}") };
    Ok(Value::String(text))
}

fn start_of(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let name = to_text(arg(args, 1));
    let Some(dt) = to_millis(arg(args, 0)).and_then(to_datetime) else {
        return Ok(Value::Null);
    };
    let date = dt.date_naive();
    let start = match name.as_str() {
        "minute" => dt.with_second(0).and_then(|dt| dt.with_nanosecond(0)),
        "hour" => dt
            .with_minute(0)
            .and_then(|dt| dt.with_second(0))
            .and_then(|dt| dt.with_nanosecond(0)),
        "day" => date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc()),
        "week" => {
            let monday = date - Duration::days(date.weekday().num_days_from_monday() as i64);
            monday.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc())
        }
        "month" => Utc.with_ymd_and_hms(dt.year(), dt.month(), 1, 0, 0, 0).single(),
        "year" => Utc.with_ymd_and_hms(dt.year(), 1, 1, 0, 0, 0).single(),
        other => return Err(call.invalid(format!("unknown unit {other}"))),
    };
    Ok(start.map_or(Value::Null, |dt| millis(dt.timestamp_millis())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EvaluationContext, Evaluator, RuntimeConfig};
    use orbital_ir::{OperatorRegistry, SExpr};
    use serde_json::json;

    // 2024-03-15T12:00:00Z
    const NOW: i64 = 1_710_504_000_000;

    fn try_eval(expr: Value) -> Result<Value, EvalError> {
        let ctx = EvaluationContext::new().with_root(BindingRoot::Now, json!(NOW));
        Evaluator::new(&OperatorRegistry::standard()).evaluate_pure(&SExpr::from(expr), &ctx)
    }

    fn eval(expr: Value) -> Value {
        try_eval(expr).unwrap()
    }

    #[test]
    fn test_now_comes_from_context() {
        assert_eq!(eval(json!(["time/now"])), json!(NOW));
        assert_eq!(eval(json!(["time/today"])), json!(NOW - 12 * HOUR));

        let ctx = EvaluationContext::new().with_root(BindingRoot::Now, json!("2024-03-15T12:00:00Z"));
        let out = Evaluator::new(&OperatorRegistry::standard())
            .evaluate_pure(&SExpr::from(json!(["time/now"])), &ctx)
            .unwrap();
        assert_eq!(out, json!(NOW));
    }

    #[test]
    fn test_parse_and_format() {
        assert_eq!(eval(json!(["time/parse", "2024-03-15T12:00:00Z"])), json!(NOW));
        assert_eq!(eval(json!(["time/parse", "2024-03-15"])), json!(NOW - 12 * HOUR));
        assert_eq!(eval(json!(["time/parse", "not a date"])), Value::Null);
        assert_eq!(
            eval(json!(["time/format", NOW, "YYYY-MM-DD HH:mm:ss (100%)"])),
            json!("2024-03-15 12:00:00 (100%)")
        );
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval(json!(["time/add", NOW, 2, "hours"])), json!(NOW + 2 * HOUR));
        assert_eq!(eval(json!(["time/subtract", NOW, 1, "day"])), json!(NOW - DAY));
        let next_month = eval(json!(["time/add", "2024-01-31T00:00:00Z", 1, "month"]));
        assert_eq!(eval(json!(["time/format", next_month, "YYYY-MM-DD"])), json!("2024-02-29"));
        assert_eq!(eval(json!(["time/diff", NOW, NOW - 3 * DAY - HOUR, "days"])), json!(3));
        assert_eq!(eval(json!(["time/diff", "2024-03-15", "2023-04-20", "months"])), json!(10));
        assert_eq!(eval(json!(["time/diff", "2024-03-15", "2022-03-16", "years"])), json!(1));
    }

    #[test]
    fn test_extreme_inputs() {
        // Timestamps beyond the calendar range are not timestamps.
        assert_eq!(eval(json!(["time/diff", 1e300, -1e300, "days"])), Value::Null);
        assert_eq!(eval(json!(["time/relative", -1e300])), Value::Null);
        assert_eq!(eval(json!(["time/parse", 1e300])), Value::Null);
        assert_eq!(eval(json!(["time/isPast", -1e300])), json!(false));

        // Amounts that overflow are rejected.
        for expr in [
            json!(["time/add", 0, -1e300, "years"]),
            json!(["time/add", 0, 1e300, "months"]),
            json!(["time/subtract", 0, -1e300, "ms"]),
            json!(["time/add", NOW, 1e300, "days"]),
            json!(["time/add", NOW, 1e15, "weeks"]),
        ] {
            assert!(matches!(try_eval(expr), Err(EvalError::InvalidArgument { .. })));
        }
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(eval(json!(["time/isBefore", "2024-01-01", "2024-06-01"])), json!(true));
        assert_eq!(eval(json!(["time/isAfter", "2024-01-01", "2024-06-01"])), json!(false));
        assert_eq!(eval(json!(["time/isPast", NOW - 1])), json!(true));
        assert_eq!(eval(json!(["time/isFuture", NOW - 1])), json!(false));
        assert_eq!(eval(json!(["time/isPast", "@entity.missing"])), json!(false));
    }

    #[test]
    fn test_relative_buckets() {
        assert_eq!(eval(json!(["time/relative", NOW - 30 * SECOND])), json!("just now"));
        assert_eq!(eval(json!(["time/relative", NOW - 5 * MINUTE])), json!("5m ago"));
        assert_eq!(eval(json!(["time/relative", NOW - 3 * HOUR])), json!("3h ago"));
        assert_eq!(eval(json!(["time/relative", NOW - 2 * DAY])), json!("2d ago"));
        assert_eq!(eval(json!(["time/relative", NOW + 2 * HOUR])), json!("in 2h"));
        assert_eq!(eval(json!(["time/relative", "2024-01-05T00:00:00Z"])), json!("1/5/2024"));
    }

    #[test]
    fn test_relative_uses_configured_locale() {
        let config = RuntimeConfig {
            locale: "de-DE".to_string(),
            ..RuntimeConfig::default()
        };
        let ctx = EvaluationContext::new().with_root(BindingRoot::Now, json!(NOW));
        let out = Evaluator::new(&OperatorRegistry::standard())
            .with_config(config)
            .evaluate_pure(&SExpr::from(json!(["time/relative", "2024-01-05T00:00:00Z"])), &ctx)
            .unwrap();
        assert_eq!(out, json!("5.1.2024"));
    }

    #[test]
    fn test_start_of() {
        let t = json!("2024-03-15T12:34:56Z");
        let start = |unit: &str| eval(json!(["time/format", ["time/startOf", t, unit], "YYYY-MM-DD HH:mm:ss"]));
        assert_eq!(start("hour"), json!("2024-03-15 12:00:00"));
        assert_eq!(start("day"), json!("2024-03-15 00:00:00"));
        assert_eq!(start("week"), json!("2024-03-11 00:00:00"));
        assert_eq!(start("month"), json!("2024-03-01 00:00:00"));
        assert_eq!(start("year"), json!("2024-01-01 00:00:00"));
    }

    #[test]
    fn test_units() {
        assert_eq!(Unit::parse("ms"), Some(Unit::Millisecond));
        assert_eq!(Unit::parse("minutes"), Some(Unit::Minute));
        assert_eq!(Unit::parse("d"), Some(Unit::Day));
        assert_eq!(Unit::parse("fortnight"), None);
        assert_eq!(chrono_pattern("DD/MM"), "%d/%m");
    }
}

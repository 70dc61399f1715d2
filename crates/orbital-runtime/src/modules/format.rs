//! format/* operators and the locale table they share with time/*.

use super::{arg, int, list, num, text};
use crate::dispatch::Handler;
use crate::evaluator::{Call, EvalError};
use crate::value::to_text;
use serde_json::Value;

pub(crate) const HANDLERS: &[(&str, Handler)] = &[
    ("format/number", Handler::Eager(number)),
    ("format/currency", Handler::Eager(currency)),
    ("format/percent", Handler::Eager(percent)),
    ("format/bytes", Handler::Eager(bytes)),
    ("format/ordinal", Handler::Eager(ordinal)),
    ("format/plural", Handler::Eager(plural)),
    ("format/compact", Handler::Eager(compact)),
    ("format/list", Handler::Eager(list_items)),
];

/// Number and date conventions for one locale.
#[derive(Debug)]
pub(crate) struct Locale {
    pub(crate) tag: &'static str,
    group: &'static str,
    decimal: &'static str,
    /// Currency symbol goes after the amount, separated by a space.
    symbol_after: bool,
    /// chrono pattern for short dates.
    pub(crate) date: &'static str,
}

const LOCALES: &[Locale] = &[
    Locale { tag: "en-US", group: ",", decimal: ".", symbol_after: false, date: "%-m/%-d/%Y" },
    Locale { tag: "en-GB", group: ",", decimal: ".", symbol_after: false, date: "%d/%m/%Y" },
    Locale { tag: "de-DE", group: ".", decimal: ",", symbol_after: true, date: "%-d.%-m.%Y" },
    Locale { tag: "fr-FR", group: " ", decimal: ",", symbol_after: true, date: "%d/%m/%Y" },
    Locale { tag: "ja-JP", group: ",", decimal: ".", symbol_after: false, date: "%Y/%-m/%-d" },
];

impl Locale {
    fn find(tag: &str) -> Option<&'static Locale> {
        LOCALES.iter().find(|locale| locale.tag.eq_ignore_ascii_case(tag))
    }

    /// The requested locale, else the configured one, else en-US.
    pub(crate) fn resolve(call: &Call<'_>, requested: &Value) -> &'static Locale {
        requested
            .as_str()
            .and_then(Locale::find)
            .or_else(|| Locale::find(&call.config().locale))
            .unwrap_or(&LOCALES[0])
    }

    /// Formats with grouping. `None` decimals shows up to three fraction
    /// digits with trailing zeros trimmed.
    pub(crate) fn number(&self, n: f64, decimals: Option<usize>) -> String {
        let digits = match decimals {
            Some(d) => format!("{:.*}", d, n.abs()),
            None => trim_fraction(format!("{:.3}", n.abs())),
        };
        let (whole, fraction) = match digits.split_once('.') {
            Some((whole, fraction)) => (whole.to_string(), Some(fraction.to_string())),
            None => (digits, None),
        };
        let mut out = String::new();
        let is_zero = whole.chars().chain(fraction.iter().flat_map(|f| f.chars())).all(|c| c == '0');
        if n < 0.0 && !is_zero {
            out.push('-');
        }
        out.push_str(&group_digits(&whole, self.group));
        if let Some(fraction) = fraction {
            out.push_str(self.decimal);
            out.push_str(&fraction);
        }
        out
    }
}

fn trim_fraction(s: String) -> String {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s
    }
}

fn group_digits(whole: &str, separator: &str) -> String {
    let len = whole.len();
    let mut out = String::with_capacity(len + len / 3 * separator.len());
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push_str(separator);
        }
        out.push(c);
    }
    out
}

fn decimals(args: &[Value], i: usize) -> Option<usize> {
    int(args, i).map(|d| d.clamp(0, 20) as usize)
}

fn number(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let Some(n) = num(args, 0) else {
        return Ok(Value::Null);
    };
    let locale = Locale::resolve(call, arg(args, 2));
    Ok(Value::String(locale.number(n, decimals(args, 1))))
}

fn currency_symbol(code: &str) -> Option<&'static str> {
    match code {
        "USD" => Some("$"),
        "EUR" => Some("€"),
        "GBP" => Some("£"),
        "JPY" => Some("¥"),
        _ => None,
    }
}

fn currency(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let Some(n) = num(args, 0) else {
        return Ok(Value::Null);
    };
    let code = match arg(args, 1) {
        Value::String(code) => code.to_uppercase(),
        _ => call.config().currency.to_uppercase(),
    };
    let locale = Locale::resolve(call, arg(args, 2));
    let minor_units = if code == "JPY" { 0 } else { 2 };
    let amount = locale.number(n.abs(), Some(minor_units));
    let sign = if n < 0.0 && amount.chars().any(|c| c.is_ascii_digit() && c != '0') { "-" } else { "" };
    let symbol = currency_symbol(&code).map_or_else(|| format!("{code} "), str::to_string);
    let out = if locale.symbol_after {
        format!("{sign}{amount} {}", symbol.trim_end())
    } else {
        format!("{sign}{symbol}{amount}")
    };
    Ok(Value::String(out))
}

fn percent(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let Some(n) = num(args, 0) else {
        return Ok(Value::Null);
    };
    let locale = Locale::resolve(call, &Value::Null);
    let digits = locale.number(n * 100.0, Some(decimals(args, 1).unwrap_or(0)));
    Ok(Value::String(format!("{digits}%")))
}

const BYTE_UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];

fn bytes(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let Some(n) = num(args, 0) else {
        return Ok(Value::Null);
    };
    if n == 0.0 {
        return Ok(Value::String("0 B".to_string()));
    }
    let mut scaled = n;
    let mut unit = 0;
    while scaled.abs() >= 1024.0 && unit < BYTE_UNITS.len() - 1 {
        scaled /= 1024.0;
        unit += 1;
    }
    let digits = trim_fraction(format!("{:.*}", decimals(args, 1).unwrap_or(2), scaled));
    Ok(Value::String(format!("{digits} {}", BYTE_UNITS[unit])))
}

fn ordinal_suffix(n: u64) -> &'static str {
    match (n % 100, n % 10) {
        (11..=13, _) => "th",
        (_, 1) => "st",
        (_, 2) => "nd",
        (_, 3) => "rd",
        _ => "th",
    }
}

fn ordinal(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(int(args, 0).map_or(Value::Null, |n| {
        Value::String(format!("{n}{}", ordinal_suffix(n.unsigned_abs())))
    }))
}

fn plural(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let count = arg(args, 0);
    let singular = text(args, 1);
    let word = if num(args, 0) == Some(1.0) {
        singular
    } else {
        match arg(args, 2) {
            Value::Null => format!("{singular}s"),
            other => to_text(other),
        }
    };
    Ok(Value::String(format!("{} {word}", to_text(count))))
}

const COMPACT_UNITS: &[(f64, &str)] = &[(1e12, "T"), (1e9, "B"), (1e6, "M"), (1e3, "K")];

fn compact(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let Some(n) = num(args, 0) else {
        return Ok(Value::Null);
    };
    let locale = Locale::resolve(call, arg(args, 1));
    let out = match COMPACT_UNITS.iter().find(|(size, _)| n.abs() >= *size) {
        Some((size, suffix)) => {
            let scaled = (n / size * 10.0).round() / 10.0;
            format!("{}{suffix}", locale.number(scaled, None))
        }
        None => locale.number(n, None),
    };
    Ok(Value::String(out))
}

fn list_items(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let items: Vec<String> = list(call, args, 0)?.iter().map(to_text).collect();
    let conjunction = match arg(args, 1) {
        Value::Null => "and".to_string(),
        other => to_text(other),
    };
    let out = match items.as_slice() {
        [] => String::new(),
        [only] => only.clone(),
        [a, b] => format!("{a} {conjunction} {b}"),
        [init @ .., last] => format!("{}, {conjunction} {last}", init.join(", ")),
    };
    Ok(Value::String(out))
}

//! validate/* operators.
//!
//! Every rule is a predicate over a value and its parameters, so the same
//! table serves both the individual operators and `validate/check`.
//! Malformed input never errors: it simply fails the rule.

use super::arg;
use super::time::to_millis;
use crate::dispatch::Handler;
use crate::evaluator::{Call, EvalError};
use crate::value::{equals, get_path, to_number, to_text};
use orbital_ir::{get_function_from_operator, is_binding, is_single_spec};
use regex::Regex;
use serde_json::{Map, Value, json};
use std::sync::LazyLock;

pub(crate) const HANDLERS: &[(&str, Handler)] = &[
    ("validate/required", Handler::Eager(run_rule)),
    ("validate/string", Handler::Eager(run_rule)),
    ("validate/number", Handler::Eager(run_rule)),
    ("validate/boolean", Handler::Eager(run_rule)),
    ("validate/array", Handler::Eager(run_rule)),
    ("validate/object", Handler::Eager(run_rule)),
    ("validate/integer", Handler::Eager(run_rule)),
    ("validate/positive", Handler::Eager(run_rule)),
    ("validate/email", Handler::Eager(run_rule)),
    ("validate/url", Handler::Eager(run_rule)),
    ("validate/phone", Handler::Eager(run_rule)),
    ("validate/date", Handler::Eager(run_rule)),
    ("validate/minLength", Handler::Eager(run_rule)),
    ("validate/maxLength", Handler::Eager(run_rule)),
    ("validate/min", Handler::Eager(run_rule)),
    ("validate/max", Handler::Eager(run_rule)),
    ("validate/range", Handler::Eager(run_rule)),
    ("validate/pattern", Handler::Eager(run_rule)),
    ("validate/oneOf", Handler::Eager(run_rule)),
    ("validate/equals", Handler::Eager(run_rule)),
    ("validate/creditCard", Handler::Eager(run_rule)),
    ("validate/check", Handler::Quoted(check)),
];

type Rule = fn(&Value, &[Value]) -> bool;

const RULES: &[(&str, Rule)] = &[
    ("required", required),
    ("string", |v, _| v.is_string()),
    ("number", |v, _| v.is_number()),
    ("boolean", |v, _| v.is_boolean()),
    ("array", |v, _| v.is_array()),
    ("object", |v, _| v.is_object()),
    ("integer", |v, _| v.as_f64().is_some_and(|n| n.fract() == 0.0)),
    ("positive", |v, _| v.as_f64().is_some_and(|n| n > 0.0)),
    ("email", |v, _| matches_regex(&EMAIL, v)),
    ("url", |v, _| matches_regex(&URL, v)),
    ("phone", phone),
    ("date", |v, _| to_millis(v).is_some()),
    ("minLength", |v, p| length_against(v, p, |len, n| len >= n)),
    ("maxLength", |v, p| length_against(v, p, |len, n| len <= n)),
    ("min", |v, p| bounded(v, p.first(), None)),
    ("max", |v, p| bounded(v, None, p.first())),
    ("range", |v, p| bounded(v, p.first(), p.get(1))),
    ("pattern", pattern),
    ("oneOf", |v, p| {
        p.first()
            .and_then(Value::as_array)
            .is_some_and(|options| options.iter().any(|option| equals(v, option)))
    }),
    ("equals", |v, p| p.first().is_some_and(|other| equals(v, other))),
    ("creditCard", credit_card),
];

fn rule(name: &str) -> Option<Rule> {
    RULES
        .iter()
        .find(|(rule_name, _)| *rule_name == name)
        .map(|(_, rule)| *rule)
}

static EMAIL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok());

static URL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)^https?://[^\s/?#]+\.[^\s/?#]+[^\s]*$").ok());

fn matches_regex(re: &LazyLock<Option<Regex>>, value: &Value) -> bool {
    match (re.as_ref(), value.as_str()) {
        (Some(re), Some(s)) => re.is_match(s),
        _ => false,
    }
}

fn required(value: &Value, _: &[Value]) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}

/// Digits with optional `+`, spaces, dashes, dots and parentheses; 7 to 15
/// digits in total.
fn phone(value: &Value, _: &[Value]) -> bool {
    let Some(s) = value.as_str() else {
        return false;
    };
    let allowed = s
        .chars()
        .enumerate()
        .all(|(i, c)| c.is_ascii_digit() || " -.()".contains(c) || (c == '+' && i == 0));
    let digits = s.chars().filter(char::is_ascii_digit).count();
    allowed && (7..=15).contains(&digits)
}

fn length_against(value: &Value, params: &[Value], accept: fn(usize, usize) -> bool) -> bool {
    let len = match value {
        Value::String(s) => s.chars().count(),
        Value::Array(items) => items.len(),
        _ => return false,
    };
    params
        .first()
        .and_then(Value::as_f64)
        .is_some_and(|n| n >= 0.0 && accept(len, n as usize))
}

fn bounded(value: &Value, min: Option<&Value>, max: Option<&Value>) -> bool {
    let Some(n) = to_number(value) else {
        return false;
    };
    let above = min.map_or(Some(true), |m| to_number(m).map(|m| n >= m));
    let below = max.map_or(Some(true), |m| to_number(m).map(|m| n <= m));
    above == Some(true) && below == Some(true)
}

fn pattern(value: &Value, params: &[Value]) -> bool {
    let source = params.first().map(to_text).unwrap_or_default();
    let text = match value {
        Value::String(_) | Value::Number(_) => to_text(value),
        _ => return false,
    };
    match Regex::new(&source) {
        Ok(re) => re.is_match(&text),
        Err(error) => {
            tracing::warn!(pattern = %source, %error, "invalid validation pattern");
            false
        }
    }
}

/// Luhn checksum over 13 to 19 digits. Spaces and dashes are ignored.
fn credit_card(value: &Value, _: &[Value]) -> bool {
    let raw = to_text(value);
    let cleaned: Vec<char> = raw.chars().filter(|c| !matches!(c, ' ' | '-')).collect();
    if !(13..=19).contains(&cleaned.len()) {
        return false;
    }
    let mut sum = 0;
    for (i, c) in cleaned.iter().rev().enumerate() {
        let Some(mut digit) = c.to_digit(10) else {
            return false;
        };
        if i % 2 == 1 {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
    }
    sum % 10 == 0
}

fn run_rule(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let name = get_function_from_operator(call.name());
    let rule = rule(name).ok_or_else(|| call.invalid("no such validation rule"))?;
    let params = args.get(1..).unwrap_or_default();
    Ok(Value::Bool(rule(arg(args, 0), params)))
}

/// A rule spec from `validate/check`: `"email"` or `["minLength", 2]`.
/// Binding parameters resolve against the current scope.
fn parse_spec(call: &Call<'_>, spec: &Value) -> Result<(String, Rule, Vec<Value>), EvalError> {
    let (name, params) = match spec {
        Value::String(name) => (name.as_str(), &[][..]),
        Value::Array(items) => match items.split_first() {
            Some((Value::String(name), params)) => (name.as_str(), params),
            _ => return Err(call.invalid(format!("malformed rule {spec}"))),
        },
        other => return Err(call.invalid(format!("malformed rule {other}"))),
    };
    let rule = rule(name).ok_or_else(|| call.invalid(format!("unknown rule {name:?}")))?;
    let params = params
        .iter()
        .map(|param| match param.as_str() {
            Some(binding) if is_binding(binding) => call.scope().resolve(binding),
            _ => param.clone(),
        })
        .collect();
    Ok((name.to_string(), rule, params))
}

/// `["required", "email"]` lists rules; `["minLength", 2]` is one rule
/// with a parameter. A list headed by a parameterized rule is always one
/// spec, so `["equals", "required"]` compares against `"required"`.
fn is_rule_list(items: &[Value]) -> bool {
    !is_single_spec(items.first().and_then(Value::as_str))
}

/// Runs every rule of every field; failures are collected, never
/// short-circuited.
fn check(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let value = arg(args, 0);
    let empty = Map::new();
    let rules = match arg(args, 1) {
        Value::Object(rules) => rules,
        Value::Null => &empty,
        other => return Err(call.invalid(format!("rules must be an object, got {other}"))),
    };
    let mut errors = Vec::new();
    for (field, specs) in rules {
        let field_value = get_path(value, field).unwrap_or(&Value::Null);
        let specs = match specs {
            Value::Array(items) if is_rule_list(items) => items.as_slice(),
            single => std::slice::from_ref(single),
        };
        for spec in specs {
            let (name, rule, params) = parse_spec(call, spec)?;
            if !rule(field_value, &params) {
                errors.push(Value::String(format!("{field}: {name} validation failed")));
            }
        }
    }
    tracing::debug!(failures = errors.len(), "validate/check");
    Ok(json!({"valid": errors.is_empty(), "errors": errors}))
}

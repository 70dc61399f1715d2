//! str/* operators.
//!
//! Indices and lengths count characters, not bytes. `null` reads as the
//! empty string.

use super::{arg, generated_len, int, list, text};
use crate::dispatch::Handler;
use crate::evaluator::{Call, EvalError};
use crate::value::{get_path, to_text};
use regex::{NoExpand, Regex};
use serde_json::Value;

pub(crate) const HANDLERS: &[(&str, Handler)] = &[
    ("str/len", Handler::Eager(len)),
    ("str/upper", Handler::Eager(upper)),
    ("str/lower", Handler::Eager(lower)),
    ("str/trim", Handler::Eager(trim)),
    ("str/concat", Handler::Eager(concat)),
    ("str/split", Handler::Eager(split)),
    ("str/join", Handler::Eager(join)),
    ("str/slice", Handler::Eager(slice)),
    ("str/replace", Handler::Eager(replace)),
    ("str/replaceAll", Handler::Eager(replace_all)),
    ("str/includes", Handler::Eager(includes)),
    ("str/startsWith", Handler::Eager(starts_with)),
    ("str/endsWith", Handler::Eager(ends_with)),
    ("str/indexOf", Handler::Eager(index_of)),
    ("str/padStart", Handler::Eager(pad_start)),
    ("str/padEnd", Handler::Eager(pad_end)),
    ("str/repeat", Handler::Eager(repeat)),
    ("str/reverse", Handler::Eager(reverse)),
    ("str/truncate", Handler::Eager(truncate)),
    ("str/capitalize", Handler::Eager(capitalize)),
    ("str/camelCase", Handler::Eager(camel_case)),
    ("str/kebabCase", Handler::Eager(kebab_case)),
    ("str/snakeCase", Handler::Eager(snake_case)),
    ("str/titleCase", Handler::Eager(title_case)),
    ("str/template", Handler::Eager(template)),
    ("str/matches", Handler::Eager(matches)),
    ("str/default", Handler::Eager(default)),
];

const DEFAULT_SUFFIX: &str = "...";

fn len(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::from(text(args, 0).chars().count()))
}

fn upper(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::String(text(args, 0).to_uppercase()))
}

fn lower(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::String(text(args, 0).to_lowercase()))
}

fn trim(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::String(text(args, 0).trim().to_string()))
}

fn concat(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::String(args.iter().map(to_text).collect()))
}

fn split(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let s = text(args, 0);
    let separator = text(args, 1);
    let parts: Vec<Value> = if separator.is_empty() {
        s.chars().map(|c| Value::String(c.to_string())).collect()
    } else {
        s.split(separator.as_str())
            .map(|part| Value::String(part.to_string()))
            .collect()
    };
    Ok(Value::Array(parts))
}

fn join(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let items = list(call, args, 0)?;
    let separator = text(args, 1);
    let parts: Vec<String> = items.iter().map(to_text).collect();
    Ok(Value::String(parts.join(&separator)))
}

/// Resolves a possibly negative character index against `len`.
fn resolve(index: i64, len: usize) -> usize {
    let resolved = if index < 0 { index + len as i64 } else { index };
    resolved.clamp(0, len as i64) as usize
}

fn slice(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let chars: Vec<char> = text(args, 0).chars().collect();
    let start = resolve(int(args, 1).unwrap_or(0), chars.len());
    let end = int(args, 2).map_or(chars.len(), |end| resolve(end, chars.len()));
    let out: String = if start < end {
        chars[start..end].iter().collect()
    } else {
        String::new()
    };
    Ok(Value::String(out))
}

fn replace(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let s = text(args, 0);
    Ok(Value::String(s.replacen(&text(args, 1), &text(args, 2), 1)))
}

fn replace_all(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let s = text(args, 0);
    let search = Regex::new(&regex::escape(&text(args, 1))).map_err(|e| call.invalid(e.to_string()))?;
    let replacement = text(args, 2);
    Ok(Value::String(
        search.replace_all(&s, NoExpand(&replacement)).into_owned(),
    ))
}

fn includes(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::Bool(text(args, 0).contains(text(args, 1).as_str())))
}

fn starts_with(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::Bool(text(args, 0).starts_with(text(args, 1).as_str())))
}

fn ends_with(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::Bool(text(args, 0).ends_with(text(args, 1).as_str())))
}

fn index_of(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let s = text(args, 0);
    let index = s
        .find(text(args, 1).as_str())
        .map_or(-1, |byte| s[..byte].chars().count() as i64);
    Ok(Value::from(index))
}

/// The fill needed to bring `s` up to `target` characters.
fn padding(call: &Call<'_>, s: &str, args: &[Value]) -> Result<String, EvalError> {
    let target = int(args, 1).unwrap_or(0).max(0);
    let target = generated_len(call, usize::try_from(target).ok())?;
    let fill = match arg(args, 2) {
        Value::Null => " ".to_string(),
        other => to_text(other),
    };
    let missing = target.saturating_sub(s.chars().count());
    Ok(fill.chars().cycle().take(missing).collect())
}

fn pad_start(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let s = text(args, 0);
    Ok(Value::String(padding(call, &s, args)? + &s))
}

fn pad_end(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let s = text(args, 0);
    let pad = padding(call, &s, args)?;
    Ok(Value::String(s + &pad))
}

fn repeat(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let count = int(args, 1).unwrap_or(0);
    let count = usize::try_from(count).map_err(|_| call.invalid("count must not be negative"))?;
    let s = text(args, 0);
    generated_len(call, s.len().checked_mul(count))?;
    Ok(Value::String(s.repeat(count)))
}

fn reverse(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::String(text(args, 0).chars().rev().collect()))
}

fn truncate(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let s = text(args, 0);
    let max = int(args, 1).unwrap_or(0).max(0) as usize;
    if s.chars().count() <= max {
        return Ok(Value::String(s));
    }
    let suffix = match arg(args, 2) {
        Value::Null => DEFAULT_SUFFIX.to_string(),
        other => to_text(other),
    };
    let keep = max.saturating_sub(suffix.chars().count());
    let mut out: String = s.chars().take(keep).collect();
    out.push_str(&suffix);
    Ok(Value::String(out))
}

fn capitalize_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn capitalize(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::String(capitalize_word(&text(args, 0))))
}

/// Splits on non-alphanumerics and on lower-to-upper case boundaries.
fn words(s: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for c in s.chars() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase() || c.is_numeric();
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn camel_case(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let out: String = words(&text(args, 0))
        .iter()
        .enumerate()
        .map(|(i, word)| {
            let lower = word.to_lowercase();
            if i == 0 { lower } else { capitalize_word(&lower) }
        })
        .collect();
    Ok(Value::String(out))
}

fn delimited(args: &[Value], separator: &str) -> Value {
    let lowered: Vec<String> = words(&text(args, 0))
        .iter()
        .map(|word| word.to_lowercase())
        .collect();
    Value::String(lowered.join(separator))
}

fn kebab_case(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(delimited(args, "-"))
}

fn snake_case(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(delimited(args, "_"))
}

fn title_case(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let titled: Vec<String> = text(args, 0)
        .split_whitespace()
        .map(|word| capitalize_word(&word.to_lowercase()))
        .collect();
    Ok(Value::String(titled.join(" ")))
}

/// Replaces `{path}` placeholders. Unknown paths are left as written.
fn template(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let source = text(args, 0);
    let values = arg(args, 1);
    let mut out = String::with_capacity(source.len());
    let mut rest = source.as_str();
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find(['{', '}']) {
            Some(close) if after.as_bytes()[close] == b'}' => {
                let key = after[..close].trim();
                match get_path(values, key).filter(|_| !key.is_empty()) {
                    Some(value) => out.push_str(&to_text(value)),
                    None => out.push_str(&rest[open..open + close + 2]),
                }
                rest = &after[close + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    Ok(Value::String(out))
}

fn matches(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let pattern = text(args, 1);
    match Regex::new(&pattern) {
        Ok(re) => Ok(Value::Bool(re.is_match(&text(args, 0)))),
        Err(e) => {
            tracing::warn!(operator = call.name(), %pattern, error = %e, "invalid regular expression");
            Ok(Value::Bool(false))
        }
    }
}

fn default(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let value = arg(args, 0);
    let missing = match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    };
    Ok(if missing { arg(args, 1).clone() } else { value.clone() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EvaluationContext, Evaluator};
    use orbital_ir::{OperatorRegistry, SExpr};
    use serde_json::json;

    fn try_eval(expr: Value) -> Result<Value, EvalError> {
        Evaluator::new(&OperatorRegistry::standard())
            .evaluate_pure(&SExpr::from(expr), &EvaluationContext::new())
    }

    fn eval(expr: Value) -> Value {
        try_eval(expr).unwrap()
    }

    #[test]
    fn test_basics() {
        assert_eq!(eval(json!(["str/len", "héllo"])), json!(5));
        assert_eq!(eval(json!(["str/upper", "abc"])), json!("ABC"));
        assert_eq!(eval(json!(["str/trim", "  x "])), json!("x"));
        assert_eq!(eval(json!(["str/concat", "a", 1, null, true])), json!("a1true"));
        assert_eq!(eval(json!(["str/len", "@entity.missing"])), json!(0));
    }

    #[test]
    fn test_split_join() {
        assert_eq!(eval(json!(["str/split", "a,b,c", ","])), json!(["a", "b", "c"]));
        assert_eq!(eval(json!(["str/split", "ab", ""])), json!(["a", "b"]));
        assert_eq!(eval(json!(["str/join", [1, "a", null], "-"])), json!("1-a-"));
    }

    #[test]
    fn test_slice_and_index() {
        assert_eq!(eval(json!(["str/slice", "hello", 1, 3])), json!("el"));
        assert_eq!(eval(json!(["str/slice", "hello", -3])), json!("llo"));
        assert_eq!(eval(json!(["str/slice", "hello", 4, 2])), json!(""));
        assert_eq!(eval(json!(["str/indexOf", "añb", "b"])), json!(2));
        assert_eq!(eval(json!(["str/indexOf", "abc", "z"])), json!(-1));
    }

    #[test]
    fn test_replace_all_is_literal() {
        assert_eq!(eval(json!(["str/replace", "a.a.a", ".", "-"])), json!("a-a.a"));
        assert_eq!(eval(json!(["str/replaceAll", "a.a.a", ".", "-"])), json!("a-a-a"));
        assert_eq!(eval(json!(["str/replaceAll", "1+1", "+", "$0"])), json!("1$01"));
    }

    #[test]
    fn test_padding() {
        assert_eq!(eval(json!(["str/padStart", "7", 3, "0"])), json!("007"));
        assert_eq!(eval(json!(["str/padEnd", "ab", 5, "xy"])), json!("abxyx"));
        assert_eq!(eval(json!(["str/padStart", "long", 2])), json!("long"));
        assert_eq!(eval(json!(["str/repeat", "ab", 3])), json!("ababab"));
    }

    #[test]
    fn test_oversized_output_is_rejected() {
        for expr in [
            json!(["str/repeat", "ab", 1e19]),
            json!(["str/repeat", "ab", 600_000]),
            json!(["str/padStart", "x", 1e300]),
            json!(["str/padEnd", "x", 2_000_000, "-"]),
        ] {
            assert!(matches!(try_eval(expr), Err(EvalError::InvalidArgument { .. })));
        }
        assert_eq!(eval(json!(["str/repeat", "", 1e19])), json!(""));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(eval(json!(["str/truncate", "Hello world", 8])), json!("Hello..."));
        assert_eq!(eval(json!(["str/truncate", "Hello", 8])), json!("Hello"));
        assert_eq!(eval(json!(["str/truncate", "Hello world", 6, "~"])), json!("Hello~"));
    }

    #[test]
    fn test_case_conversion() {
        assert_eq!(eval(json!(["str/camelCase", "hello big-world"])), json!("helloBigWorld"));
        assert_eq!(eval(json!(["str/kebabCase", "helloBigWorld"])), json!("hello-big-world"));
        assert_eq!(eval(json!(["str/snakeCase", "Hello Big World"])), json!("hello_big_world"));
        assert_eq!(eval(json!(["str/titleCase", "hello WORLD"])), json!("Hello World"));
        assert_eq!(eval(json!(["str/capitalize", "ada"])), json!("Ada"));
    }

    #[test]
    fn test_template() {
        let expr = json!(["str/template", "Hi {name}, {user.role} {missing}", {"name": "Ada", "user": {"role": "admin"}}]);
        assert_eq!(eval(expr), json!("Hi Ada, admin {missing}"));
        assert_eq!(eval(json!(["str/template", "{ unclosed", {}])), json!("{ unclosed"));
    }

    #[test]
    fn test_matches_tolerates_bad_patterns() {
        assert_eq!(eval(json!(["str/matches", "abc123", "^[a-z]+\\d+$"])), json!(true));
        assert_eq!(eval(json!(["str/matches", "abc", "("])), json!(false));
    }

    #[test]
    fn test_default() {
        assert_eq!(eval(json!(["str/default", "", "n/a"])), json!("n/a"));
        assert_eq!(eval(json!(["str/default", "x", "n/a"])), json!("x"));
    }

    #[test]
    fn test_word_splitting() {
        assert_eq!(words("XMLHttp request_id"), vec!["XMLHttp", "request", "id"]);
    }
}

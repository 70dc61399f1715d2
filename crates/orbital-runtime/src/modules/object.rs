//! object/* operators.

use super::{arg, list, text};
use crate::dispatch::Handler;
use crate::evaluator::{Call, EvalError};
use crate::value::{get_path, is_empty, set_path, to_text, type_name};
use serde_json::{Map, Value};

pub(crate) const HANDLERS: &[(&str, Handler)] = &[
    ("object/get", Handler::Eager(get)),
    ("object/set", Handler::Eager(set)),
    ("object/has", Handler::Eager(has)),
    ("object/keys", Handler::Eager(keys)),
    ("object/values", Handler::Eager(values)),
    ("object/entries", Handler::Eager(entries)),
    ("object/fromEntries", Handler::Eager(from_entries)),
    ("object/merge", Handler::Eager(merge)),
    ("object/pick", Handler::Eager(pick)),
    ("object/omit", Handler::Eager(omit)),
    ("object/isEmpty", Handler::Eager(is_empty_object)),
];

static EMPTY: std::sync::LazyLock<Map<String, Value>> = std::sync::LazyLock::new(Map::new);

/// Argument `i` as an object. `null` reads as empty.
fn fields<'v>(call: &Call<'_>, args: &'v [Value], i: usize) -> Result<&'v Map<String, Value>, EvalError> {
    match arg(args, i) {
        Value::Null => Ok(&EMPTY),
        Value::Object(map) => Ok(map),
        other => Err(call.invalid(format!(
            "argument {} must be an object, got {}",
            i + 1,
            type_name(other)
        ))),
    }
}

fn get(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let found = get_path(arg(args, 0), &text(args, 1)).filter(|value| !value.is_null());
    Ok(found.unwrap_or_else(|| arg(args, 2)).clone())
}

fn set(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(set_path(arg(args, 0), &text(args, 1), arg(args, 2).clone()))
}

fn has(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::Bool(get_path(arg(args, 0), &text(args, 1)).is_some()))
}

fn keys(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let map = fields(call, args, 0)?;
    Ok(Value::Array(map.keys().cloned().map(Value::String).collect()))
}

fn values(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::Array(fields(call, args, 0)?.values().cloned().collect()))
}

fn entries(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let pairs = fields(call, args, 0)?
        .iter()
        .map(|(key, value)| Value::Array(vec![Value::String(key.clone()), value.clone()]))
        .collect();
    Ok(Value::Array(pairs))
}

fn from_entries(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let mut out = Map::new();
    for entry in list(call, args, 0)? {
        match entry.as_array().map(Vec::as_slice) {
            Some([key, value]) => {
                out.insert(to_text(key), value.clone());
            }
            _ => return Err(call.invalid(format!("entry {entry} is not a [key, value] pair"))),
        }
    }
    Ok(Value::Object(out))
}

/// Nested objects merge recursively; every other value, arrays included,
/// is replaced by the later one.
fn merge_into(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, value) in source {
        match (target.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => merge_into(existing, incoming),
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

fn merge(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let mut out = Map::new();
    for i in 0..args.len() {
        merge_into(&mut out, fields(call, args, i)?);
    }
    Ok(Value::Object(out))
}

fn key_list(call: &Call<'_>, args: &[Value]) -> Result<Vec<String>, EvalError> {
    Ok(list(call, args, 1)?.iter().map(to_text).collect())
}

fn pick(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let map = fields(call, args, 0)?;
    let out = key_list(call, args)?
        .into_iter()
        .filter_map(|key| map.get(&key).cloned().map(|value| (key, value)))
        .collect();
    Ok(Value::Object(out))
}

fn omit(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let dropped = key_list(call, args)?;
    let out = fields(call, args, 0)?
        .iter()
        .filter(|(key, _)| !dropped.contains(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    Ok(Value::Object(out))
}

fn is_empty_object(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::Bool(is_empty(arg(args, 0))))
}

#[cfg(test)]
mod tests {
    use crate::{EvalError, EvaluationContext, Evaluator};
    use orbital_ir::{BindingRoot, OperatorRegistry, SExpr};
    use serde_json::{Value, json};

    fn eval(expr: Value) -> Value {
        let ctx = EvaluationContext::new().with_root(
            BindingRoot::Entity,
            json!({"address": {"city": "Oslo", "zip": null}, "tags": ["a"]}),
        );
        Evaluator::new(&OperatorRegistry::standard())
            .evaluate_pure(&SExpr::from(expr), &ctx)
            .unwrap()
    }

    #[test]
    fn test_dotted_paths() {
        assert_eq!(eval(json!(["object/get", "@entity", "address.city"])), json!("Oslo"));
        assert_eq!(eval(json!(["object/get", "@entity", "address.zip", "0000"])), json!("0000"));
        assert_eq!(eval(json!(["object/get", "@entity", "nope"])), Value::Null);
        assert_eq!(eval(json!(["object/has", "@entity", "address.zip"])), json!(true));
        assert_eq!(eval(json!(["object/has", "@entity", "address.street"])), json!(false));

        let updated = eval(json!(["object/set", "@entity", "address.city", "Bergen"]));
        assert_eq!(updated["address"]["city"], json!("Bergen"));
        assert_eq!(updated["tags"], json!(["a"]));
    }

    #[test]
    fn test_merge_is_recursive_for_objects_only() {
        let expr = json!(["object/merge",
            {"a": {"x": 1, "y": 2}, "list": [1, 2], "keep": true},
            {"a": {"y": 3}, "list": [3]},
            null
        ]);
        assert_eq!(
            eval(expr),
            json!({"a": {"x": 1, "y": 3}, "list": [3], "keep": true})
        );
    }

    #[test]
    fn test_entries() {
        assert_eq!(eval(json!(["object/keys", {"b": 1, "a": 2}])), json!(["a", "b"]));
        assert_eq!(eval(json!(["object/values", {"a": 1}])), json!([1]));
        assert_eq!(eval(json!(["object/entries", {"a": 1}])), json!([["a", 1]]));
        assert_eq!(
            eval(json!(["object/fromEntries", [[1, "a"], [2, [true]]]])),
            json!({"1": "a", "2": [true]})
        );
        assert_eq!(eval(json!(["object/keys", "@entity.missing"])), json!([]));
    }

    #[test]
    fn test_pick_omit() {
        let obj = json!({"a": 1, "b": 2, "c": 3});
        assert_eq!(eval(json!(["object/pick", obj.clone(), ["str/split", "a,c,z", ","]])), json!({"a": 1, "c": 3}));
        assert_eq!(eval(json!(["object/omit", obj, ["str/split", "a", ","]])), json!({"b": 2, "c": 3}));
    }

    #[test]
    fn test_is_empty() {
        assert_eq!(eval(json!(["object/isEmpty", {}])), json!(true));
        assert_eq!(eval(json!(["object/isEmpty", "@entity.nothing"])), json!(true));
        assert_eq!(eval(json!(["object/isEmpty", {"a": null}])), json!(false));
    }

    #[test]
    fn test_non_object_is_an_error() {
        let err = Evaluator::new(&OperatorRegistry::standard())
            .evaluate_pure(&SExpr::from(json!(["object/keys", 5])), &EvaluationContext::new())
            .unwrap_err();
        assert!(matches!(err, EvalError::InvalidArgument { .. }));
    }
}

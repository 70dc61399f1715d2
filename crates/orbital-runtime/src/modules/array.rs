//! array/* operators.
//!
//! Nothing here mutates its input: every operation that looks like a
//! mutation returns a new list. `null` reads as the empty list.

use super::{MAX_GENERATED_LEN, arg, generated_len, int, list, num_or, number_or_null, text};
use crate::dispatch::Handler;
use crate::evaluator::{Call, Closure, EvalError};
use crate::value::{equals, get_path, number, sort_order, to_text};
use rand::seq::SliceRandom;
use serde_json::Value;
use std::collections::BTreeMap;

pub(crate) const HANDLERS: &[(&str, Handler)] = &[
    ("array/len", Handler::Eager(len)),
    ("array/first", Handler::Eager(first)),
    ("array/last", Handler::Eager(last)),
    ("array/nth", Handler::Eager(nth)),
    ("array/slice", Handler::Eager(slice)),
    ("array/concat", Handler::Eager(concat)),
    ("array/append", Handler::Eager(append)),
    ("array/prepend", Handler::Eager(prepend)),
    ("array/insert", Handler::Eager(insert)),
    ("array/remove", Handler::Eager(remove)),
    ("array/removeItem", Handler::Eager(remove_item)),
    ("array/includes", Handler::Eager(includes)),
    ("array/indexOf", Handler::Eager(index_of)),
    ("array/reverse", Handler::Eager(reverse)),
    ("array/sort", Handler::Eager(sort)),
    ("array/unique", Handler::Eager(unique)),
    ("array/flatten", Handler::Eager(flatten)),
    ("array/range", Handler::Eager(range)),
    ("array/take", Handler::Eager(take)),
    ("array/drop", Handler::Eager(drop_front)),
    ("array/shuffle", Handler::Eager(shuffle)),
    ("array/groupBy", Handler::Eager(group_by)),
    ("array/sum", Handler::Eager(sum)),
    ("array/avg", Handler::Eager(avg)),
    ("array/min", Handler::Eager(min)),
    ("array/max", Handler::Eager(max)),
    ("array/count", Handler::Eager(len)),
    ("array/map", Handler::Lambda(map)),
    ("array/filter", Handler::Lambda(filter)),
    ("array/reject", Handler::Lambda(reject)),
    ("array/reduce", Handler::Lambda(reduce)),
    ("array/find", Handler::Lambda(find)),
    ("array/findIndex", Handler::Lambda(find_index)),
    ("array/every", Handler::Lambda(every)),
    ("array/some", Handler::Lambda(some)),
    ("array/partition", Handler::Lambda(partition)),
    ("array/sortBy", Handler::Lambda(sort_by)),
];

/// Resolves a possibly negative position against `len`, clamped to bounds.
fn position(index: i64, len: usize) -> usize {
    let resolved = if index < 0 { index + len as i64 } else { index };
    resolved.clamp(0, len as i64) as usize
}

fn len(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::from(list(call, args, 0)?.len()))
}

fn first(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(list(call, args, 0)?.first().cloned().unwrap_or(Value::Null))
}

fn last(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(list(call, args, 0)?.last().cloned().unwrap_or(Value::Null))
}

fn nth(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let items = list(call, args, 0)?;
    let item = int(args, 1).and_then(|i| {
        let i = if i < 0 { i + items.len() as i64 } else { i };
        usize::try_from(i).ok().and_then(|i| items.get(i))
    });
    Ok(item.cloned().unwrap_or(Value::Null))
}

fn slice(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let items = list(call, args, 0)?;
    let start = position(int(args, 1).unwrap_or(0), items.len());
    let end = int(args, 2).map_or(items.len(), |end| position(end, items.len()));
    Ok(Value::Array(items[start..end.max(start)].to_vec()))
}

fn concat(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let mut out = Vec::new();
    for (i, value) in args.iter().enumerate() {
        match value {
            Value::Array(_) | Value::Null => out.extend_from_slice(list(call, args, i)?),
            other => out.push(other.clone()),
        }
    }
    Ok(Value::Array(out))
}

fn append(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let mut out = list(call, args, 0)?.to_vec();
    out.push(arg(args, 1).clone());
    Ok(Value::Array(out))
}

fn prepend(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let items = list(call, args, 0)?;
    let mut out = Vec::with_capacity(items.len() + 1);
    out.push(arg(args, 1).clone());
    out.extend_from_slice(items);
    Ok(Value::Array(out))
}

fn insert(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let mut out = list(call, args, 0)?.to_vec();
    let at = position(int(args, 1).unwrap_or(0), out.len());
    out.insert(at, arg(args, 2).clone());
    Ok(Value::Array(out))
}

fn remove(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let mut out = list(call, args, 0)?.to_vec();
    if let Some(i) = int(args, 1) {
        let i = if i < 0 { i + out.len() as i64 } else { i };
        if let Ok(i) = usize::try_from(i) {
            if i < out.len() {
                out.remove(i);
            }
        }
    }
    Ok(Value::Array(out))
}

fn remove_item(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let target = arg(args, 1);
    let out = list(call, args, 0)?
        .iter()
        .filter(|item| !equals(item, target))
        .cloned()
        .collect();
    Ok(Value::Array(out))
}

fn includes(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let target = arg(args, 1);
    Ok(Value::Bool(list(call, args, 0)?.iter().any(|item| equals(item, target))))
}

fn index_of(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let target = arg(args, 1);
    let index = list(call, args, 0)?
        .iter()
        .position(|item| equals(item, target))
        .map_or(-1, |i| i as i64);
    Ok(Value::from(index))
}

fn reverse(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::Array(list(call, args, 0)?.iter().rev().cloned().collect()))
}

fn descending(call: &Call<'_>, order: &Value) -> Result<bool, EvalError> {
    match order {
        Value::Null => Ok(false),
        Value::String(s) if s == "asc" => Ok(false),
        Value::String(s) if s == "desc" => Ok(true),
        other => Err(call.invalid(format!("order must be \"asc\" or \"desc\", got {other}"))),
    }
}

/// Stable sort of `(key, item)` pairs.
fn sorted(mut keyed: Vec<(Value, Value)>, descending: bool) -> Value {
    keyed.sort_by(|(a, _), (b, _)| {
        let ordering = sort_order(a, b);
        if descending { ordering.reverse() } else { ordering }
    });
    Value::Array(keyed.into_iter().map(|(_, item)| item).collect())
}

/// Sorts by the item itself, or by a dotted key path on each item.
fn sort(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let items = list(call, args, 0)?;
    let key = match arg(args, 1) {
        Value::Null => None,
        other => Some(to_text(other)),
    };
    let keyed = items
        .iter()
        .map(|item| {
            let sort_key = match &key {
                Some(path) => get_path(item, path).cloned().unwrap_or(Value::Null),
                None => item.clone(),
            };
            (sort_key, item.clone())
        })
        .collect();
    Ok(sorted(keyed, descending(call, arg(args, 2))?))
}

fn unique(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let mut out: Vec<Value> = Vec::new();
    for item in list(call, args, 0)? {
        if !out.iter().any(|seen| equals(seen, item)) {
            out.push(item.clone());
        }
    }
    Ok(Value::Array(out))
}

fn flatten(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let mut out = Vec::new();
    for item in list(call, args, 0)? {
        match item {
            Value::Array(inner) => out.extend(inner.iter().cloned()),
            other => out.push(other.clone()),
        }
    }
    Ok(Value::Array(out))
}

fn range(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let start = num_or(args, 0, 0.0);
    let end = num_or(args, 1, 0.0);
    let step = num_or(args, 2, 1.0);
    if step == 0.0 || !step.is_finite() {
        return Err(call.invalid("step must be a non-zero number"));
    }
    let count = ((end - start) / step).ceil().max(0.0);
    let count = if count > MAX_GENERATED_LEN as f64 { None } else { Some(count as usize) };
    let out = (0..generated_len(call, count)?)
        .map(|i| number(start + i as f64 * step))
        .collect();
    Ok(Value::Array(out))
}

fn take(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let items = list(call, args, 0)?;
    let n = int(args, 1).unwrap_or(0).clamp(0, items.len() as i64) as usize;
    Ok(Value::Array(items[..n].to_vec()))
}

fn drop_front(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let items = list(call, args, 0)?;
    let n = int(args, 1).unwrap_or(0).clamp(0, items.len() as i64) as usize;
    Ok(Value::Array(items[n..].to_vec()))
}

fn shuffle(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let mut out = list(call, args, 0)?.to_vec();
    out.shuffle(&mut rand::thread_rng());
    Ok(Value::Array(out))
}

fn group_by(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let path = text(args, 1);
    let mut groups: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    for item in list(call, args, 0)? {
        let key = match get_path(item, &path) {
            Some(Value::Null) | None => "null".to_string(),
            Some(value) => to_text(value),
        };
        groups.entry(key).or_default().push(item.clone());
    }
    Ok(Value::Object(
        groups
            .into_iter()
            .map(|(key, group)| (key, Value::Array(group)))
            .collect(),
    ))
}

/// Numeric values of the items, or of a key path on each. Non-numeric
/// values are skipped.
fn numeric(call: &Call<'_>, args: &[Value]) -> Result<Vec<f64>, EvalError> {
    let items = list(call, args, 0)?;
    let key = match arg(args, 1) {
        Value::Null => None,
        other => Some(to_text(other)),
    };
    Ok(items
        .iter()
        .filter_map(|item| match &key {
            Some(path) => get_path(item, path),
            None => Some(item),
        })
        .filter_map(Value::as_f64)
        .collect())
}

fn sum(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(number(numeric(call, args)?.iter().sum()))
}

fn avg(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let values = numeric(call, args)?;
    if values.is_empty() {
        return Ok(Value::Null);
    }
    Ok(number(values.iter().sum::<f64>() / values.len() as f64))
}

fn min(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(number_or_null(numeric(call, args)?.into_iter().reduce(f64::min)))
}

fn max(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(number_or_null(numeric(call, args)?.into_iter().reduce(f64::max)))
}

// Lambdas receive `(item, index)`; `reduce` receives `(acc, item, index)`.

fn map(call: &Call<'_>, args: &[Value], f: &Closure<'_>) -> Result<Value, EvalError> {
    let out = list(call, args, 0)?
        .iter()
        .enumerate()
        .map(|(i, item)| f.call(vec![item.clone(), Value::from(i)]))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::Array(out))
}

fn select(
    call: &Call<'_>,
    args: &[Value],
    f: &Closure<'_>,
    keep: bool,
) -> Result<Value, EvalError> {
    let mut out = Vec::new();
    for (i, item) in list(call, args, 0)?.iter().enumerate() {
        if f.test(vec![item.clone(), Value::from(i)])? == keep {
            out.push(item.clone());
        }
    }
    Ok(Value::Array(out))
}

fn filter(call: &Call<'_>, args: &[Value], f: &Closure<'_>) -> Result<Value, EvalError> {
    select(call, args, f, true)
}

fn reject(call: &Call<'_>, args: &[Value], f: &Closure<'_>) -> Result<Value, EvalError> {
    select(call, args, f, false)
}

fn reduce(call: &Call<'_>, args: &[Value], f: &Closure<'_>) -> Result<Value, EvalError> {
    let mut acc = arg(args, 1).clone();
    for (i, item) in list(call, args, 0)?.iter().enumerate() {
        acc = f.call(vec![acc, item.clone(), Value::from(i)])?;
    }
    Ok(acc)
}

fn position_of(call: &Call<'_>, args: &[Value], f: &Closure<'_>) -> Result<Option<usize>, EvalError> {
    for (i, item) in list(call, args, 0)?.iter().enumerate() {
        if f.test(vec![item.clone(), Value::from(i)])? {
            return Ok(Some(i));
        }
    }
    Ok(None)
}

fn find(call: &Call<'_>, args: &[Value], f: &Closure<'_>) -> Result<Value, EvalError> {
    let items = list(call, args, 0)?;
    Ok(position_of(call, args, f)?
        .map_or(Value::Null, |i| items[i].clone()))
}

fn find_index(call: &Call<'_>, args: &[Value], f: &Closure<'_>) -> Result<Value, EvalError> {
    Ok(Value::from(position_of(call, args, f)?.map_or(-1, |i| i as i64)))
}

fn every(call: &Call<'_>, args: &[Value], f: &Closure<'_>) -> Result<Value, EvalError> {
    for (i, item) in list(call, args, 0)?.iter().enumerate() {
        if !f.test(vec![item.clone(), Value::from(i)])? {
            return Ok(Value::Bool(false));
        }
    }
    Ok(Value::Bool(true))
}

fn some(call: &Call<'_>, args: &[Value], f: &Closure<'_>) -> Result<Value, EvalError> {
    Ok(Value::Bool(position_of(call, args, f)?.is_some()))
}

fn partition(call: &Call<'_>, args: &[Value], f: &Closure<'_>) -> Result<Value, EvalError> {
    let mut matching = Vec::new();
    let mut rest = Vec::new();
    for (i, item) in list(call, args, 0)?.iter().enumerate() {
        if f.test(vec![item.clone(), Value::from(i)])? {
            matching.push(item.clone());
        } else {
            rest.push(item.clone());
        }
    }
    Ok(Value::Array(vec![Value::Array(matching), Value::Array(rest)]))
}

fn sort_by(call: &Call<'_>, args: &[Value], f: &Closure<'_>) -> Result<Value, EvalError> {
    let keyed = list(call, args, 0)?
        .iter()
        .enumerate()
        .map(|(i, item)| Ok((f.call(vec![item.clone(), Value::from(i)])?, item.clone())))
        .collect::<Result<Vec<_>, EvalError>>()?;
    Ok(sorted(keyed, descending(call, arg(args, 1))?))
}

#[cfg(test)]
mod tests {
    use crate::{EvalError, EvaluationContext, Evaluator};
    use orbital_ir::{OperatorRegistry, SExpr};
    use serde_json::{Value, json};

    fn try_eval(expr: Value) -> Result<Value, EvalError> {
        Evaluator::new(&OperatorRegistry::standard())
            .evaluate_pure(&SExpr::from(expr), &EvaluationContext::new())
    }

    fn eval(expr: Value) -> Value {
        try_eval(expr).unwrap()
    }

    #[test]
    fn test_filter_preserves_order() {
        let expr = json!(["array/filter", [1, 2, 3, 4, 5, 6], ["fn", "x", [">", "@x", 3]]]);
        assert_eq!(eval(expr), json!([4, 5, 6]));
        let expr = json!(["array/reject", [1, 2, 3, 4], ["fn", "x", ["=", ["%", "@x", 2], 0]]]);
        assert_eq!(eval(expr), json!([1, 3]));
    }

    #[test]
    fn test_map_passes_index() {
        let expr = json!(["array/map", ["str/split", "a,b", ","], ["fn", ["x", "i"], ["str/concat", "@x", "@i"]]]);
        assert_eq!(eval(expr), json!(["a0", "b1"]));
    }

    #[test]
    fn test_reduce_from_seed() {
        let expr = json!(["array/reduce", [1, 2, 3], ["fn", ["acc", "x"], ["+", "@acc", "@x"]], 10]);
        assert_eq!(eval(expr), json!(16));
        let empty = json!(["array/reduce", [], ["fn", ["acc", "x"], ["+", "@acc", "@x"]], 0]);
        assert_eq!(eval(empty), json!(0));
    }

    #[test]
    fn test_find_short_circuits() {
        // The predicate would fail on the second element.
        let expr = json!(["array/find", [[], "x"], ["fn", "n", ["=", ["array/len", "@n"], 0]]]);
        assert_eq!(eval(expr), json!([]));
        let expr = json!(["array/findIndex", [1, 2, 3], ["fn", "n", [">", "@n", 5]]]);
        assert_eq!(eval(expr), json!(-1));
        let expr = json!(["array/some", [{"r": "user"}, {"r": "admin"}], ["fn", "u", ["=", "@u.r", "admin"]]]);
        assert_eq!(eval(expr), json!(true));
        let expr = json!(["array/every", [], ["fn", "u", false]]);
        assert_eq!(eval(expr), json!(true));
    }

    #[test]
    fn test_partition_keeps_relative_order() {
        let expr = json!(["array/partition", [5, 1, 4, 2, 3], ["fn", "x", [">", "@x", 2]]]);
        assert_eq!(eval(expr), json!([[5, 4, 3], [1, 2]]));
    }

    #[test]
    fn test_sorting() {
        assert_eq!(eval(json!(["array/sort", [3, 1, 2]])), json!([1, 2, 3]));
        assert_eq!(eval(json!(["array/sort", [3, 1, 2], null, "desc"])), json!([3, 2, 1]));
        let people = json!([{"n": "b", "age": 30}, {"n": "a", "age": 20}]);
        assert_eq!(
            eval(json!(["array/sort", people.clone(), "age"])),
            json!([{"n": "a", "age": 20}, {"n": "b", "age": 30}])
        );
        let expr = json!(["array/sortBy", people, ["fn", "p", "@p.n"], "desc"]);
        assert_eq!(eval(expr)[0]["n"], json!("b"));
        assert!(matches!(
            try_eval(json!(["array/sort", [1], null, "sideways"])),
            Err(EvalError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_operations_do_not_mutate_input() {
        let expr = json!(["let", [["xs", [1, 2, 3]]],
            ["do", ["array/append", "@xs", 4], ["array/reverse", "@xs"], ["array/remove", "@xs", 0], "@xs"]
        ]);
        assert_eq!(eval(expr), json!([1, 2, 3]));
    }

    #[test]
    fn test_positional_ops() {
        assert_eq!(eval(json!(["array/nth", [1, 2, 3], -1])), json!(3));
        assert_eq!(eval(json!(["array/nth", [1, 2, 3], 5])), Value::Null);
        assert_eq!(eval(json!(["array/slice", [1, 2, 3, 4], 1, -1])), json!([2, 3]));
        assert_eq!(eval(json!(["array/insert", [1, 3], 1, 2])), json!([1, 2, 3]));
        assert_eq!(eval(json!(["array/prepend", [2], 1])), json!([1, 2]));
        assert_eq!(eval(json!(["array/take", [1, 2, 3], 2])), json!([1, 2]));
        assert_eq!(eval(json!(["array/drop", [1, 2, 3], 2])), json!([3]));
        assert_eq!(eval(json!(["array/first", []])), Value::Null);
    }

    #[test]
    fn test_set_like_ops() {
        assert_eq!(eval(json!(["array/unique", [2, 1, 2, 1.0, 3]])), json!([2, 1, 3]));
        assert_eq!(eval(json!(["array/removeItem", [1, 2, 1], 1])), json!([2]));
        assert_eq!(eval(json!(["array/includes", [{"a": 1}], {"a": 1}])), json!(true));
        assert_eq!(eval(json!(["array/indexOf", ["str/split", "a,b", ","], "b"])), json!(1));
        assert_eq!(eval(json!(["array/flatten", [[1], 2, [3, [4]]]])), json!([1, 2, 3, [4]]));
        assert_eq!(eval(json!(["array/concat", [1], [2, 3], null])), json!([1, 2, 3]));
    }

    #[test]
    fn test_range() {
        assert_eq!(eval(json!(["array/range", 0, 5])), json!([0, 1, 2, 3, 4]));
        assert_eq!(eval(json!(["array/range", 5, 0, -2])), json!([5, 3, 1]));
        assert_eq!(eval(json!(["array/range", 3, 1])), json!([]));
        assert!(try_eval(json!(["array/range", 0, 5, 0])).is_err());
        assert!(try_eval(json!(["array/range", 0, 1e300])).is_err());
    }

    #[test]
    fn test_aggregates_skip_non_numeric() {
        assert_eq!(eval(json!(["array/sum", [1, "x", 2, null]])), json!(3));
        assert_eq!(eval(json!(["array/avg", [{"p": 2}, {"p": 4}, {}], "p"])), json!(3));
        assert_eq!(eval(json!(["array/min", [3, 1, 2]])), json!(1));
        assert_eq!(eval(json!(["array/max", []])), Value::Null);
        assert_eq!(eval(json!(["array/avg", []])), Value::Null);
    }

    #[test]
    fn test_group_by() {
        let expr = json!(["array/groupBy", [{"t": "a", "v": 1}, {"t": "b", "v": 2}, {"t": "a", "v": 3}], "t"]);
        assert_eq!(
            eval(expr),
            json!({"a": [{"t": "a", "v": 1}, {"t": "a", "v": 3}], "b": [{"t": "b", "v": 2}]})
        );
    }

    #[test]
    fn test_shuffle_is_a_permutation() {
        let mut out: Vec<i64> = eval(json!(["array/shuffle", [1, 2, 3, 4]]))
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_i64)
            .collect();
        out.sort_unstable();
        assert_eq!(out, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_non_list_is_an_error() {
        assert!(matches!(
            try_eval(json!(["array/len", "abc"])),
            Err(EvalError::InvalidArgument { .. })
        ));
        assert_eq!(eval(json!(["array/len", "@entity.items"])), json!(0));
    }
}

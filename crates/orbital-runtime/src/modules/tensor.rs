//! tensor/* operators.
//!
//! Arguments arrive as nested JSON arrays and are converted at the boundary.
//! Arithmetic and reductions go through the host [`TensorBackend`]; shape
//! handling and the range contracts are computed here.
//!
//! [`TensorBackend`]: crate::backend::TensorBackend

use super::{MAX_GENERATED_LEN, arg, generated_len, int, num, object, tensor};
use crate::backend::{BinaryOp, Reduction};
use crate::dispatch::Handler;
use crate::evaluator::{Call, EvalError};
use crate::tensor::{BackendError, Tensor, element_count, normalize_index};
use crate::value::number;
use serde_json::{Map, Value, json};
use std::f64::consts::TAU;

pub(crate) const HANDLERS: &[(&str, Handler)] = &[
    ("tensor/from", Handler::Eager(from)),
    ("tensor/zeros", Handler::Eager(zeros)),
    ("tensor/ones", Handler::Eager(ones)),
    ("tensor/rand", Handler::Eager(rand_uniform)),
    ("tensor/randn", Handler::Eager(rand_normal)),
    ("tensor/shape", Handler::Eager(shape)),
    ("tensor/get", Handler::Eager(get)),
    ("tensor/slice", Handler::Eager(slice)),
    ("tensor/reshape", Handler::Eager(reshape)),
    ("tensor/flatten", Handler::Eager(flatten)),
    ("tensor/add", Handler::Eager(add)),
    ("tensor/sub", Handler::Eager(sub)),
    ("tensor/mul", Handler::Eager(mul)),
    ("tensor/div", Handler::Eager(div)),
    ("tensor/matmul", Handler::Eager(matmul)),
    ("tensor/dot", Handler::Eager(dot)),
    ("tensor/sum", Handler::Eager(sum)),
    ("tensor/mean", Handler::Eager(mean)),
    ("tensor/max", Handler::Eager(max)),
    ("tensor/min", Handler::Eager(min)),
    ("tensor/argmax", Handler::Eager(argmax)),
    ("tensor/norm", Handler::Eager(norm)),
    ("tensor/allInRange", Handler::Eager(all_in_range)),
    ("tensor/clamp", Handler::Eager(clamp)),
    ("tensor/clampPerDim", Handler::Eager(clamp_per_dim)),
    ("tensor/outOfRangeDims", Handler::Eager(out_of_range_dims)),
    ("tensor/checkInput", Handler::Eager(check_input)),
    ("tensor/toList", Handler::Eager(to_list)),
];

/// A shape argument: a list of non-negative integers, or a single length.
/// The total element count is bounded.
fn dims(call: &Call<'_>, value: &Value) -> Result<Vec<usize>, EvalError> {
    let dim = |v: &Value| {
        v.as_f64()
            .filter(|d| *d >= 0.0 && d.fract() == 0.0 && *d <= MAX_GENERATED_LEN as f64)
            .map(|d| d as usize)
            .ok_or_else(|| call.invalid(format!("invalid dimension {v}")))
    };
    let shape = match value {
        Value::Array(items) => items.iter().map(dim).collect::<Result<Vec<_>, _>>()?,
        Value::Number(_) => vec![dim(value)?],
        other => return Err(call.invalid(format!("shape must be a list of integers, got {other}"))),
    };
    generated_len(call, element_count(&shape))?;
    Ok(shape)
}

fn from(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(tensor(call, args, 0)?.to_value())
}

fn zeros(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(Tensor::full(&dims(call, arg(args, 0))?, 0.0).to_value())
}

fn ones(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(Tensor::full(&dims(call, arg(args, 0))?, 1.0).to_value())
}

fn rand_uniform(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let shape = dims(call, arg(args, 0))?;
    Ok(Tensor::from_fn(&shape, rand::random::<f64>).to_value())
}

/// Box-Muller transform over two uniform samples.
fn standard_normal() -> f64 {
    let u1 = 1.0 - rand::random::<f64>();
    let u2 = rand::random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
}

fn rand_normal(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let shape = dims(call, arg(args, 0))?;
    Ok(Tensor::from_fn(&shape, standard_normal).to_value())
}

fn shape(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let t = tensor(call, args, 0)?;
    Ok(Value::Array(t.shape().iter().map(|&d| json!(d)).collect()))
}

fn index_arg(call: &Call<'_>, args: &[Value], i: usize) -> Result<i64, EvalError> {
    int(args, i).ok_or_else(|| call.invalid(format!("argument {} must be an integer", i + 1)))
}

fn get(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let t = tensor(call, args, 0)?;
    let row = t.index(index_arg(call, args, 1)?).map_err(|e| call.backend_error(e))?;
    Ok(row.to_value())
}

fn slice(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let t = tensor(call, args, 0)?;
    let (start, end) = (index_arg(call, args, 1)?, index_arg(call, args, 2)?);
    let rows = t.slice_rows(start, end).map_err(|e| call.backend_error(e))?;
    Ok(rows.to_value())
}

fn reshape(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let t = tensor(call, args, 0)?;
    let shape = dims(call, arg(args, 1))?;
    Ok(t.reshape(&shape).map_err(|e| call.backend_error(e))?.to_value())
}

fn flatten(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(tensor(call, args, 0)?.flatten().to_value())
}

fn elementwise(call: &Call<'_>, args: &[Value], op: BinaryOp) -> Result<Value, EvalError> {
    let (a, b) = (tensor(call, args, 0)?, tensor(call, args, 1)?);
    let out = call.backend().elementwise(op, &a, &b).map_err(|e| call.backend_error(e))?;
    Ok(out.to_value())
}

fn add(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    elementwise(call, args, BinaryOp::Add)
}

fn sub(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    elementwise(call, args, BinaryOp::Sub)
}

fn mul(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    elementwise(call, args, BinaryOp::Mul)
}

fn div(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    elementwise(call, args, BinaryOp::Div)
}

fn matmul(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let (a, b) = (tensor(call, args, 0)?, tensor(call, args, 1)?);
    let out = call.backend().matmul(&a, &b).map_err(|e| call.backend_error(e))?;
    Ok(out.to_value())
}

fn dot(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let (a, b) = (tensor(call, args, 0)?, tensor(call, args, 1)?);
    if a.len() != b.len() {
        return Err(call.backend_error(BackendError::ShapeMismatch {
            op: "dot",
            left: a.shape().to_vec(),
            right: b.shape().to_vec(),
        }));
    }
    Ok(number(a.data().iter().zip(b.data()).map(|(x, y)| x * y).sum()))
}

fn reduce(call: &Call<'_>, args: &[Value], op: Reduction) -> Result<Value, EvalError> {
    let t = tensor(call, args, 0)?;
    let axis = match arg(args, 1) {
        Value::Null => None,
        _ => Some(index_arg(call, args, 1)?),
    };
    let out = call.backend().reduce(op, &t, axis).map_err(|e| call.backend_error(e))?;
    Ok(out.to_value())
}

fn sum(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    reduce(call, args, Reduction::Sum)
}

fn mean(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    reduce(call, args, Reduction::Mean)
}

fn max(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    reduce(call, args, Reduction::Max)
}

fn min(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    reduce(call, args, Reduction::Min)
}

fn argmax(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let t = tensor(call, args, 0)?;
    let best = t
        .data()
        .iter()
        .enumerate()
        .fold(None::<(usize, f64)>, |best, (i, &x)| match best {
            Some((_, top)) if top >= x => best,
            _ => Some((i, x)),
        });
    match best {
        Some((i, _)) => Ok(json!(i)),
        None => Err(call.backend_error(BackendError::Empty("argmax"))),
    }
}

fn norm(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let t = tensor(call, args, 0)?;
    Ok(number(t.data().iter().map(|x| x * x).sum::<f64>().sqrt()))
}

/// A `[min, max]` pair.
fn bounds(call: &Call<'_>, value: &Value) -> Result<(f64, f64), EvalError> {
    match value.as_array().map(Vec::as_slice) {
        Some([lo, hi]) => match (lo.as_f64(), hi.as_f64()) {
            (Some(lo), Some(hi)) => Ok((lo, hi)),
            _ => Err(call.invalid(format!("range bounds must be numbers, got {value}"))),
        },
        _ => Err(call.invalid(format!("range must be [min, max], got {value}"))),
    }
}

fn all_in_range(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let t = tensor(call, args, 0)?;
    let (lo, hi) = bounds(call, arg(args, 1))?;
    Ok(Value::Bool(t.data().iter().all(|x| (lo..=hi).contains(x))))
}

fn clamp(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let t = tensor(call, args, 0)?;
    let (Some(lo), Some(hi)) = (num(args, 1), num(args, 2)) else {
        return Err(call.invalid("min and max must be numbers"));
    };
    Ok(t.map(|x| x.max(lo).min(hi)).to_value())
}

/// One entry of a per-dimension range table: `{"0": {min, max, meaning?}}`.
struct DimRange<'v> {
    dim: usize,
    min: &'v Value,
    max: &'v Value,
    meaning: Option<&'v Value>,
}

impl DimRange<'_> {
    fn contains(&self, value: f64) -> bool {
        let lo = self.min.as_f64().unwrap_or(f64::NEG_INFINITY);
        let hi = self.max.as_f64().unwrap_or(f64::INFINITY);
        (lo..=hi).contains(&value)
    }
}

/// Parses the range table, ordered by dimension.
fn dim_ranges<'v>(call: &Call<'_>, table: Option<&'v Map<String, Value>>) -> Result<Vec<DimRange<'v>>, EvalError> {
    let Some(table) = table else {
        return Err(call.invalid("ranges must be an object keyed by dimension"));
    };
    let mut ranges = table
        .iter()
        .map(|(key, bounds)| {
            let dim = key
                .parse::<usize>()
                .map_err(|_| call.invalid(format!("range key {key:?} is not a dimension index")))?;
            let field = |name: &str| bounds.get(name).unwrap_or(&Value::Null);
            Ok(DimRange {
                dim,
                min: field("min"),
                max: field("max"),
                meaning: bounds.get("meaning"),
            })
        })
        .collect::<Result<Vec<_>, EvalError>>()?;
    ranges.sort_by_key(|range| range.dim);
    Ok(ranges)
}

fn clamp_per_dim(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let t = tensor(call, args, 0)?;
    let ranges = dim_ranges(call, object(args, 1))?;
    let Some(&rows) = t.shape().first() else {
        return Err(call.backend_error(BackendError::UnsupportedRank {
            op: "clampPerDim",
            rank: 0,
        }));
    };
    let row_len = t.len() / rows.max(1);
    let shape = t.shape().to_vec();
    let mut data = t.into_data();
    for range in &ranges {
        let row = normalize_index(range.dim as i64, rows).map_err(|e| call.backend_error(e))?;
        let lo = range.min.as_f64().unwrap_or(f64::NEG_INFINITY);
        let hi = range.max.as_f64().unwrap_or(f64::INFINITY);
        for x in &mut data[row * row_len..(row + 1) * row_len] {
            *x = x.max(lo).min(hi);
        }
    }
    let out = Tensor::new(shape, data).map_err(|e| call.backend_error(e))?;
    Ok(out.to_value())
}

fn out_of_range_dims(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let t = tensor(call, args, 0)?;
    let mut violations = Vec::new();
    for range in dim_ranges(call, object(args, 1))? {
        let cell = t.index(range.dim as i64).map_err(|e| call.backend_error(e))?;
        let Some(value) = cell.as_scalar() else {
            return Err(call.invalid(format!("dimension {} is not a scalar", range.dim)));
        };
        if !range.contains(value) {
            let meaning = range
                .meaning
                .cloned()
                .unwrap_or_else(|| Value::String(format!("dim_{}", range.dim)));
            violations.push(json!({
                "dim": range.dim,
                "value": number(value),
                "min": range.min,
                "max": range.max,
                "meaning": meaning,
            }));
        }
    }
    Ok(Value::Array(violations))
}

/// Checks an input against `{shape, range, meaning?}`. Returns the first
/// violation, shape before range, or null.
fn check_input(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let t = tensor(call, args, 0)?;
    let Some(contract) = object(args, 1) else {
        return Err(call.invalid("contract must be an object"));
    };
    if let Some(expected) = contract.get("shape").filter(|s| !s.is_null()) {
        let expected_dims = dims(call, expected)?;
        if expected_dims != t.shape() {
            return Ok(json!({
                "type": "shape_mismatch",
                "expected": expected,
                "received": t.shape(),
            }));
        }
    }
    if let Some(range) = contract.get("range").filter(|r| !r.is_null()) {
        let (lo, hi) = bounds(call, range)?;
        let outside: Vec<usize> = t
            .data()
            .iter()
            .enumerate()
            .filter(|(_, x)| !(lo..=hi).contains(*x))
            .map(|(i, _)| i)
            .collect();
        if !outside.is_empty() {
            tracing::debug!(count = outside.len(), "input outside allowed range");
            return Ok(json!({
                "type": "out_of_range",
                "allowed_range": range,
                "out_of_range_indices": outside,
            }));
        }
    }
    Ok(Value::Null)
}

/// A scalar becomes a one-element list.
fn to_list(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    match arg(args, 0) {
        Value::Number(_) => Ok(Value::Array(vec![arg(args, 0).clone()])),
        _ => Ok(tensor(call, args, 0)?.to_value()),
    }
}

#[cfg(test)]
mod tests {
    use crate::{EvalError, EvaluationContext, Evaluator};
    use orbital_ir::{OperatorRegistry, SExpr};
    use serde_json::{Value, json};

    fn run(expr: Value) -> Result<Value, EvalError> {
        Evaluator::new(&OperatorRegistry::standard()).evaluate_pure(&SExpr::from(expr), &EvaluationContext::new())
    }

    fn eval(expr: Value) -> Value {
        run(expr).unwrap()
    }

    #[test]
    fn test_creation() {
        assert_eq!(eval(json!(["tensor/zeros", [2, 2]])), json!([[0, 0], [0, 0]]));
        assert_eq!(eval(json!(["tensor/ones", 3])), json!([1, 1, 1]));
        let r = eval(json!(["tensor/rand", [4]]));
        assert!(r.as_array().unwrap().iter().all(|x| (0.0..1.0).contains(&x.as_f64().unwrap())));
        assert_eq!(eval(json!(["tensor/shape", ["tensor/randn", [2, 3]]])), json!([2, 3]));
        assert!(matches!(run(json!(["tensor/zeros", [-1]])), Err(EvalError::InvalidArgument { .. })));
    }

    #[test]
    fn test_oversized_shapes_are_rejected() {
        for expr in [
            json!(["tensor/zeros", [1e10, 1e10, 1e10]]),
            json!(["tensor/ones", [1_000_000, 1_000_000, 1_000_000, 1_000_000]]),
            json!(["tensor/rand", [2000, 2000]]),
            json!(["tensor/randn", 1e300]),
            json!(["tensor/reshape", [1, 2], [1e10, 1e10, 1e10]]),
        ] {
            assert!(matches!(run(expr), Err(EvalError::InvalidArgument { .. })));
        }
        assert_eq!(eval(json!(["tensor/zeros", [0, 1e6]])), json!([]));
    }

    #[test]
    fn test_shape_and_indexing() {
        let m = json!([[1, 2], [3, 4], [5, 6]]);
        assert_eq!(eval(json!(["tensor/shape", m.clone()])), json!([3, 2]));
        assert_eq!(eval(json!(["tensor/get", m.clone(), 1])), json!([3, 4]));
        assert_eq!(eval(json!(["tensor/get", [7, 8, 9], -1])), json!(9));
        assert_eq!(eval(json!(["tensor/slice", m.clone(), 0, 2])), json!([[1, 2], [3, 4]]));
        assert_eq!(eval(json!(["tensor/reshape", m.clone(), [2, 3]])), json!([[1, 2, 3], [4, 5, 6]]));
        assert_eq!(eval(json!(["tensor/flatten", m])), json!([1, 2, 3, 4, 5, 6]));
        assert!(matches!(run(json!(["tensor/get", [1], 5])), Err(EvalError::Backend { .. })));
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval(json!(["tensor/add", [1, 2], [10, 20]])), json!([11, 22]));
        assert_eq!(eval(json!(["tensor/mul", [[1, 2], [3, 4]], 2])), json!([[2, 4], [6, 8]]));
        assert_eq!(eval(json!(["tensor/div", [1, 2], [2, 4]])), json!([0.5, 0.5]));
        assert_eq!(eval(json!(["tensor/matmul", [[1, 2], [3, 4]], [[5, 6], [7, 8]]])), json!([[19, 22], [43, 50]]));
        assert_eq!(eval(json!(["tensor/dot", [1, 2, 3], [4, 5, 6]])), json!(32));
        assert!(matches!(run(json!(["tensor/dot", [1, 2], [1]])), Err(EvalError::Backend { .. })));
    }

    #[test]
    fn test_reductions() {
        let m = json!([[1, 2], [3, 4]]);
        assert_eq!(eval(json!(["tensor/sum", m.clone()])), json!(10));
        assert_eq!(eval(json!(["tensor/sum", m.clone(), 0])), json!([4, 6]));
        assert_eq!(eval(json!(["tensor/mean", m.clone()])), json!(2.5));
        assert_eq!(eval(json!(["tensor/max", m.clone(), 1])), json!([2, 4]));
        assert_eq!(eval(json!(["tensor/min", m])), json!(1));
        assert_eq!(eval(json!(["tensor/argmax", [3, 9, 9, 1]])), json!(1));
        assert_eq!(eval(json!(["tensor/norm", [3, 4]])), json!(5));
    }

    #[test]
    fn test_range_contracts() {
        assert_eq!(eval(json!(["tensor/allInRange", [0, 0.5, 1], [0, 1]])), json!(true));
        assert_eq!(eval(json!(["tensor/allInRange", [0, 1.5], [0, 1]])), json!(false));
        assert_eq!(eval(json!(["tensor/clamp", [-2, 0.5, 3], 0, 1])), json!([0, 0.5, 1]));
        assert_eq!(
            eval(json!(["tensor/clampPerDim", [5, -5, 0.5], {"0": {"min": 0, "max": 1}, "1": {"min": -1, "max": 1}}])),
            json!([1, -1, 0.5])
        );
    }

    #[test]
    fn test_out_of_range_dims() {
        let ranges = json!({
            "0": {"min": 0, "max": 1, "meaning": "throttle"},
            "2": {"min": -1, "max": 1}
        });
        assert_eq!(
            eval(json!(["tensor/outOfRangeDims", [2, 0, -3], ranges])),
            json!([
                {"dim": 0, "value": 2, "min": 0, "max": 1, "meaning": "throttle"},
                {"dim": 2, "value": -3, "min": -1, "max": 1, "meaning": "dim_2"}
            ])
        );
        assert_eq!(eval(json!(["tensor/outOfRangeDims", [0.5], {"0": {"min": 0, "max": 1}}])), json!([]));
    }

    #[test]
    fn test_check_input() {
        let contract = json!({"shape": [3], "range": [0, 1]});
        assert_eq!(eval(json!(["tensor/checkInput", [0.1, 0.2, 0.3], contract.clone()])), Value::Null);
        assert_eq!(
            eval(json!(["tensor/checkInput", [0.1, 0.2], contract.clone()])),
            json!({"type": "shape_mismatch", "expected": [3], "received": [2]})
        );
        assert_eq!(
            eval(json!(["tensor/checkInput", [0.1, 7, -1], contract])),
            json!({"type": "out_of_range", "allowed_range": [0, 1], "out_of_range_indices": [1, 2]})
        );
    }

    #[test]
    fn test_to_list() {
        assert_eq!(eval(json!(["tensor/toList", [[1, 2]]])), json!([[1, 2]]));
        assert_eq!(eval(json!(["tensor/toList", 4])), json!([4]));
        assert!(run(json!(["tensor/toList", [1, "x"]])).is_err());
    }
}

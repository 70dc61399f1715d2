//! Operator implementations, one file per library.
//!
//! Every file exports a `HANDLERS` table mapping operator names to their
//! [`Handler`]. Effect operators have no entry: the dispatch table routes
//! them to the host by their metadata alone.

mod array;
mod core;
mod format;
mod math;
mod nn;
mod object;
mod str;
mod tensor;
mod time;
mod train;
mod validate;

use crate::dispatch::Handler;
use crate::evaluator::{Call, EvalError};
use crate::tensor::Tensor;
use crate::value::{to_number, to_text, type_name};
use serde_json::{Map, Value};

pub(crate) const HANDLERS: &[&[(&str, Handler)]] = &[
    core::HANDLERS,
    math::HANDLERS,
    str::HANDLERS,
    array::HANDLERS,
    object::HANDLERS,
    time::HANDLERS,
    validate::HANDLERS,
    format::HANDLERS,
    tensor::HANDLERS,
    nn::HANDLERS,
    train::HANDLERS,
];

static NULL: Value = Value::Null;

/// Upper bound on the length of any generated string, list or tensor.
pub(crate) const MAX_GENERATED_LEN: usize = 1_000_000;

/// Checks a requested output length against [`MAX_GENERATED_LEN`].
pub(crate) fn generated_len(call: &Call<'_>, len: Option<usize>) -> Result<usize, EvalError> {
    match len {
        Some(len) if len <= MAX_GENERATED_LEN => Ok(len),
        _ => Err(call.invalid(format!("output would exceed {MAX_GENERATED_LEN} elements"))),
    }
}

/// Argument `i`, or `null` when it was not supplied.
pub(crate) fn arg(args: &[Value], i: usize) -> &Value {
    args.get(i).unwrap_or(&NULL)
}

/// Argument `i` coerced to a number.
pub(crate) fn num(args: &[Value], i: usize) -> Option<f64> {
    to_number(arg(args, i))
}

/// Argument `i` as a number, or `default` when absent or non-numeric.
pub(crate) fn num_or(args: &[Value], i: usize, default: f64) -> f64 {
    num(args, i).unwrap_or(default)
}

/// The first `N` arguments as numbers, or `None` if any is non-numeric.
pub(crate) fn numbers<const N: usize>(args: &[Value]) -> Option<[f64; N]> {
    let mut out = [0.0; N];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = num(args, i)?;
    }
    Some(out)
}

/// Argument `i` truncated to an integer.
pub(crate) fn int(args: &[Value], i: usize) -> Option<i64> {
    num(args, i).filter(|n| n.is_finite()).map(|n| n.trunc() as i64)
}

/// Argument `i` in string form; `null` is empty.
pub(crate) fn text(args: &[Value], i: usize) -> String {
    to_text(arg(args, i))
}

/// Argument `i` as a list. `null` reads as empty; other types are an error.
pub(crate) fn list<'v>(call: &Call<'_>, args: &'v [Value], i: usize) -> Result<&'v [Value], EvalError> {
    match arg(args, i) {
        Value::Null => Ok(&[]),
        Value::Array(items) => Ok(items),
        other => Err(call.invalid(format!(
            "argument {} must be a list, got {}",
            i + 1,
            type_name(other)
        ))),
    }
}

/// Argument `i` as an object, if it is one.
pub(crate) fn object(args: &[Value], i: usize) -> Option<&Map<String, Value>> {
    arg(args, i).as_object()
}

/// Argument `i` converted to a tensor.
pub(crate) fn tensor(call: &Call<'_>, args: &[Value], i: usize) -> Result<Tensor, EvalError> {
    Tensor::from_value(arg(args, i)).map_err(|e| call.backend_error(e))
}

/// Wraps an optional numeric result; `None` becomes `null`.
pub(crate) fn number_or_null(n: Option<f64>) -> Value {
    n.map_or(Value::Null, crate::value::number)
}

//! train/* operators.
//!
//! Only the pure losses live here. `train/loop` and `train/step` mutate
//! host-held weights and are dispatched as effects.

use super::{arg, list, num_or, tensor};
use crate::backend::{BinaryOp, Reduction};
use crate::dispatch::Handler;
use crate::evaluator::{Call, EvalError};
use crate::tensor::Tensor;
use crate::value::number;
use serde_json::{Value, json};

pub(crate) const HANDLERS: &[(&str, Handler)] = &[
    ("train/mse", Handler::Eager(mse)),
    ("train/forbiddenRegions", Handler::Eager(forbidden_regions)),
    ("train/constraintLoss", Handler::Eager(constraint_loss)),
];

const DEFAULT_PENALTY: f64 = 10.0;

fn mse(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let (prediction, target) = (tensor(call, args, 0)?, tensor(call, args, 1)?);
    let backend = call.backend();
    let loss = backend
        .elementwise(BinaryOp::Sub, &prediction, &target)
        .and_then(|diff| backend.elementwise(BinaryOp::Mul, &diff, &diff))
        .and_then(|squared| backend.reduce(Reduction::Mean, &squared, None))
        .map_err(|e| call.backend_error(e))?;
    Ok(loss.to_value())
}

/// A forbidden region `{dim, min, max, reason?}` matched against an output.
struct Hit<'v> {
    region: &'v Value,
    dim: usize,
    value: f64,
    min: f64,
    max: f64,
}

/// Regions whose `[min, max]` contains the output value at `dim`.
fn hits<'v>(call: &Call<'_>, output: &Tensor, regions: &'v [Value]) -> Result<Vec<Hit<'v>>, EvalError> {
    let mut out = Vec::new();
    for region in regions {
        let field = |name: &str| region.get(name).and_then(Value::as_f64);
        let (Some(dim), Some(min), Some(max)) = (field("dim"), field("min"), field("max")) else {
            return Err(call.invalid(format!("region {region} needs numeric dim, min and max")));
        };
        let cell = output.index(dim as i64).map_err(|e| call.backend_error(e))?;
        let Some(value) = cell.as_scalar() else {
            return Err(call.invalid(format!("output dimension {dim} is not a scalar")));
        };
        if (min..=max).contains(&value) {
            out.push(Hit {
                region,
                dim: dim as usize,
                value,
                min,
                max,
            });
        }
    }
    Ok(out)
}

fn forbidden_regions(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let output = tensor(call, args, 0)?;
    let violations = hits(call, &output, list(call, args, 1)?)?
        .into_iter()
        .map(|hit| {
            let reason = hit
                .region
                .get("reason")
                .cloned()
                .unwrap_or_else(|| json!("forbidden region"));
            json!({
                "dim": hit.dim,
                "value": number(hit.value),
                "min": number(hit.min),
                "max": number(hit.max),
                "reason": reason,
            })
        })
        .collect();
    Ok(Value::Array(violations))
}

/// `penalty` times the distance to the nearest boundary, summed over every
/// region the output falls inside.
fn constraint_loss(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let output = tensor(call, args, 0)?;
    let penalty = match arg(args, 2) {
        Value::Null => DEFAULT_PENALTY,
        _ => num_or(args, 2, DEFAULT_PENALTY),
    };
    let loss: f64 = hits(call, &output, list(call, args, 1)?)?
        .iter()
        .map(|hit| penalty * (hit.value - hit.min).abs().min((hit.max - hit.value).abs()))
        .sum();
    Ok(number(loss))
}

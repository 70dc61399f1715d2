//! math/* operators.

use super::{arg, int, num, number_or_null, numbers};
use crate::dispatch::Handler;
use crate::evaluator::{Call, EvalError};
use crate::value::{number, to_number};
use rand::Rng;
use serde_json::Value;

pub(crate) const HANDLERS: &[(&str, Handler)] = &[
    ("math/abs", Handler::Eager(abs)),
    ("math/min", Handler::Eager(min)),
    ("math/max", Handler::Eager(max)),
    ("math/floor", Handler::Eager(floor)),
    ("math/ceil", Handler::Eager(ceil)),
    ("math/round", Handler::Eager(round)),
    ("math/trunc", Handler::Eager(trunc)),
    ("math/clamp", Handler::Eager(clamp)),
    ("math/mod", Handler::Eager(modulo)),
    ("math/pow", Handler::Eager(pow)),
    ("math/sqrt", Handler::Eager(sqrt)),
    ("math/sign", Handler::Eager(sign)),
    ("math/lerp", Handler::Eager(lerp)),
    ("math/map", Handler::Eager(map_range)),
    ("math/random", Handler::Eager(random)),
    ("math/randomInt", Handler::Eager(random_int)),
    ("math/default", Handler::Eager(default)),
];

fn unary(args: &[Value], f: fn(f64) -> f64) -> Value {
    number_or_null(num(args, 0).map(f))
}

fn abs(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(unary(args, f64::abs))
}

/// Accepts either variadic numbers or a single list of numbers.
fn extreme(args: &[Value], pick: fn(f64, f64) -> f64) -> Value {
    let values = match args {
        [Value::Array(items)] => items.as_slice(),
        _ => args,
    };
    let result = values
        .iter()
        .map(to_number)
        .try_fold(None, |acc: Option<f64>, n| {
            n.map(|n| Some(acc.map_or(n, |acc| pick(acc, n))))
        })
        .flatten();
    number_or_null(result)
}

fn min(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(extreme(args, f64::min))
}

fn max(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(extreme(args, f64::max))
}

/// Applies a rounding function at `decimals` places.
fn rounded(args: &[Value], f: fn(f64) -> f64) -> Value {
    let decimals = int(args, 1).unwrap_or(0).clamp(-15, 15) as i32;
    let factor = 10f64.powi(decimals);
    number_or_null(num(args, 0).map(|v| f(v * factor) / factor))
}

fn floor(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(rounded(args, f64::floor))
}

fn ceil(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(rounded(args, f64::ceil))
}

fn round(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(rounded(args, f64::round))
}

fn trunc(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(unary(args, f64::trunc))
}

fn clamp(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(number_or_null(
        numbers::<3>(args).map(|[v, lo, hi]| v.max(lo).min(hi)),
    ))
}

fn modulo(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(number_or_null(numbers::<2>(args).map(|[a, b]| a % b)))
}

fn pow(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(number_or_null(numbers::<2>(args).map(|[a, b]| a.powf(b))))
}

fn sqrt(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(unary(args, f64::sqrt))
}

fn sign(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(unary(args, |v| if v == 0.0 { 0.0 } else { v.signum() }))
}

fn lerp(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(number_or_null(
        numbers::<3>(args).map(|[a, b, t]| a + (b - a) * t),
    ))
}

fn map_range(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(number_or_null(numbers::<5>(args).map(
        |[v, in_min, in_max, out_min, out_max]| {
            out_min + (v - in_min) * (out_max - out_min) / (in_max - in_min)
        },
    )))
}

fn random(_: &Call<'_>, _: &[Value]) -> Result<Value, EvalError> {
    Ok(number(rand::random::<f64>()))
}

fn random_int(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let (Some(lo), Some(hi)) = (int(args, 0), int(args, 1)) else {
        return Ok(Value::Null);
    };
    if lo > hi {
        return Err(call.invalid(format!("min {lo} is greater than max {hi}")));
    }
    Ok(Value::from(rand::thread_rng().gen_range(lo..=hi)))
}

fn default(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let value = arg(args, 0);
    let missing = value.is_null() || value.as_f64().is_some_and(f64::is_nan);
    Ok(if missing { arg(args, 1).clone() } else { value.clone() })
}

#[cfg(test)]
mod tests {
    use crate::{EvaluationContext, Evaluator};
    use orbital_ir::{OperatorRegistry, SExpr};
    use serde_json::{Value, json};

    fn eval(expr: Value) -> Value {
        Evaluator::new(&OperatorRegistry::standard())
            .evaluate_pure(&SExpr::from(expr), &EvaluationContext::new())
            .unwrap()
    }

    #[test]
    fn test_clamp_is_bounds_inclusive() {
        assert_eq!(eval(json!(["math/clamp", 150, 0, 100])), json!(100));
        assert_eq!(eval(json!(["math/clamp", -10, 0, 100])), json!(0));
        assert_eq!(eval(json!(["math/clamp", 50, 0, 100])), json!(50));
        assert_eq!(eval(json!(["math/clamp", 100, 0, 100])), json!(100));
    }

    #[test]
    fn test_rounding_with_decimals() {
        assert_eq!(eval(json!(["math/round", 3.14159, 2])), json!(3.14));
        assert_eq!(eval(json!(["math/round", 2.5])), json!(3));
        assert_eq!(eval(json!(["math/floor", -1.5])), json!(-2));
        assert_eq!(eval(json!(["math/ceil", 1.21, 1])), json!(1.3));
        assert_eq!(eval(json!(["math/trunc", -1.7])), json!(-1));
    }

    #[test]
    fn test_min_max() {
        assert_eq!(eval(json!(["math/min", 3, 1, 2])), json!(1));
        assert_eq!(eval(json!(["math/max", [3, 9, 2]])), json!(9));
        assert_eq!(eval(json!(["math/max", 3, "@entity.missing"])), Value::Null);
    }

    #[test]
    fn test_mod_follows_dividend() {
        assert_eq!(eval(json!(["math/mod", -7, 3])), json!(-1));
        assert_eq!(eval(json!(["math/mod", 7, -3])), json!(1));
    }

    #[test]
    fn test_interpolation() {
        assert_eq!(eval(json!(["math/lerp", 0, 10, 0.25])), json!(2.5));
        assert_eq!(eval(json!(["math/map", 5, 0, 10, 0, 100])), json!(50));
        assert_eq!(eval(json!(["math/sign", -3])), json!(-1));
        assert_eq!(eval(json!(["math/pow", 2, 10])), json!(1024));
        assert_eq!(eval(json!(["math/sqrt", -1])), Value::Null);
    }

    #[test]
    fn test_random_ranges() {
        for _ in 0..50 {
            let r = eval(json!(["math/random"])).as_f64().unwrap();
            assert!((0.0..1.0).contains(&r));
            let i = eval(json!(["math/randomInt", 1, 3])).as_i64().unwrap();
            assert!((1..=3).contains(&i));
        }
        assert_eq!(eval(json!(["math/randomInt", 4, 4])), json!(4));
    }

    #[test]
    fn test_default() {
        assert_eq!(eval(json!(["math/default", "@entity.hp", 10])), json!(10));
        assert_eq!(eval(json!(["math/default", 0, 10])), json!(0));
    }
}

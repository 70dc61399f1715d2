//! Core operators: arithmetic, comparison, logic and control flow.

use super::{num, number_or_null};
use crate::context::Scope;
use crate::dispatch::Handler;
use crate::evaluator::{Call, EvalError};
use crate::value::{compare, equals, to_number, truthy};
use orbital_ir::SExpr;
use serde_json::Value;
use std::cmp::Ordering;

pub(crate) const HANDLERS: &[(&str, Handler)] = &[
    ("+", Handler::Eager(add)),
    ("-", Handler::Eager(sub)),
    ("*", Handler::Eager(mul)),
    ("/", Handler::Eager(div)),
    ("%", Handler::Eager(rem)),
    ("=", Handler::Eager(eq)),
    ("!=", Handler::Eager(ne)),
    ("<", Handler::Eager(lt)),
    (">", Handler::Eager(gt)),
    ("<=", Handler::Eager(le)),
    (">=", Handler::Eager(ge)),
    ("and", Handler::Lazy(and)),
    ("or", Handler::Lazy(or)),
    ("not", Handler::Eager(not)),
    ("if", Handler::Lazy(if_)),
    ("when", Handler::Lazy(when)),
    ("do", Handler::Lazy(do_)),
    ("let", Handler::Lazy(let_)),
    ("fn", Handler::Lazy(lambda)),
];

// Arithmetic with a non-numeric operand yields null, so absent inputs
// propagate instead of failing.
fn fold(args: &[Value], f: fn(f64, f64) -> f64) -> Value {
    let mut values = args.iter().map(to_number);
    let result = values
        .next()
        .flatten()
        .and_then(|first| values.try_fold(first, |acc, n| n.map(|n| f(acc, n))));
    number_or_null(result)
}

fn add(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(fold(args, |a, b| a + b))
}

fn sub(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    if args.len() == 1 {
        return Ok(number_or_null(num(args, 0).map(|n| -n)));
    }
    Ok(fold(args, |a, b| a - b))
}

fn mul(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(fold(args, |a, b| a * b))
}

fn div(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(fold(args, |a, b| a / b))
}

fn rem(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(fold(args, |a, b| a % b))
}

fn eq(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::Bool(equals(&args[0], &args[1])))
}

fn ne(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::Bool(!equals(&args[0], &args[1])))
}

fn ordered(args: &[Value], accept: fn(Ordering) -> bool) -> Value {
    Value::Bool(compare(&args[0], &args[1]).is_some_and(accept))
}

fn lt(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(ordered(args, Ordering::is_lt))
}

fn gt(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(ordered(args, Ordering::is_gt))
}

fn le(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(ordered(args, Ordering::is_le))
}

fn ge(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(ordered(args, Ordering::is_ge))
}

fn and(call: &Call<'_>, args: &[SExpr]) -> Result<Value, EvalError> {
    for arg in args {
        if !truthy(&call.eval(arg)?) {
            return Ok(Value::Bool(false));
        }
    }
    Ok(Value::Bool(true))
}

fn or(call: &Call<'_>, args: &[SExpr]) -> Result<Value, EvalError> {
    for arg in args {
        if truthy(&call.eval(arg)?) {
            return Ok(Value::Bool(true));
        }
    }
    Ok(Value::Bool(false))
}

fn not(_: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::Bool(!truthy(&args[0])))
}

fn if_(call: &Call<'_>, args: &[SExpr]) -> Result<Value, EvalError> {
    if truthy(&call.eval(&args[0])?) {
        call.eval(&args[1])
    } else {
        args.get(2).map_or(Ok(Value::Null), |branch| call.eval(branch))
    }
}

fn when(call: &Call<'_>, args: &[SExpr]) -> Result<Value, EvalError> {
    if truthy(&call.eval(&args[0])?) {
        call.eval(&args[1])
    } else {
        Ok(Value::Null)
    }
}

fn do_(call: &Call<'_>, args: &[SExpr]) -> Result<Value, EvalError> {
    let mut last = Value::Null;
    for arg in args {
        last = call.eval(arg)?;
    }
    Ok(last)
}

fn let_(call: &Call<'_>, args: &[SExpr]) -> Result<Value, EvalError> {
    let bindings = args[0]
        .as_list()
        .ok_or_else(|| call.invalid("bindings must be a list of [name, value] pairs"))?;
    bind(call, bindings, &args[1], call.scope())
}

/// Binds one pair per frame so each value sees the names before it.
fn bind(
    call: &Call<'_>,
    bindings: &[SExpr],
    body: &SExpr,
    scope: &Scope<'_>,
) -> Result<Value, EvalError> {
    let Some((pair, rest)) = bindings.split_first() else {
        return call.eval_in(body, scope);
    };
    let Some([SExpr::String(name), expr]) = pair.as_list() else {
        return Err(call.invalid("each binding must be a [name, value] pair"));
    };
    let value = call.eval_in(expr, scope)?;
    let name = name.strip_prefix('@').unwrap_or(name);
    let frame = scope.child(vec![(name, value)]);
    bind(call, rest, body, &frame)
}

fn lambda(_: &Call<'_>, _: &[SExpr]) -> Result<Value, EvalError> {
    Err(EvalError::UnexpectedLambda)
}

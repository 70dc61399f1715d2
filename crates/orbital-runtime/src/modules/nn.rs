//! nn/* operators.
//!
//! Layer operators only build descriptors, plain objects tagged with a
//! `"layer"` key. Nothing is computed until `nn/forward` hands a descriptor
//! and an input to the host backend.

use super::{arg, int, num_or};
use crate::dispatch::Handler;
use crate::evaluator::{Call, EvalError};
use crate::tensor::Tensor;
use serde_json::{Value, json};

pub(crate) const HANDLERS: &[(&str, Handler)] = &[
    ("nn/linear", Handler::Eager(linear)),
    ("nn/relu", Handler::Eager(relu)),
    ("nn/tanh", Handler::Eager(tanh)),
    ("nn/sigmoid", Handler::Eager(sigmoid)),
    ("nn/softmax", Handler::Eager(softmax)),
    ("nn/dropout", Handler::Eager(dropout)),
    ("nn/batchnorm", Handler::Eager(batchnorm)),
    ("nn/layernorm", Handler::Eager(layernorm)),
    ("nn/sequential", Handler::Eager(sequential)),
    ("nn/forward", Handler::Eager(forward)),
];

const DEFAULT_DROPOUT: f64 = 0.5;

fn features(call: &Call<'_>, args: &[Value], i: usize) -> Result<i64, EvalError> {
    int(args, i)
        .filter(|n| *n > 0)
        .ok_or_else(|| call.invalid(format!("argument {} must be a positive integer", i + 1)))
}

fn linear(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let in_features = features(call, args, 0)?;
    let out_features = features(call, args, 1)?;
    let (weight, bias) = (arg(args, 2), arg(args, 3));
    if !weight.is_null() {
        let t = Tensor::from_value(weight).map_err(|e| call.backend_error(e))?;
        let expected = [out_features as usize, in_features as usize];
        if t.shape() != expected {
            return Err(call.invalid(format!(
                "weight must have shape {expected:?}, got {:?}",
                t.shape()
            )));
        }
    }
    if !bias.is_null() {
        let t = Tensor::from_value(bias).map_err(|e| call.backend_error(e))?;
        if t.shape() != [out_features as usize] {
            return Err(call.invalid(format!("bias must have length {out_features}")));
        }
    }
    Ok(json!({
        "layer": "linear",
        "inFeatures": in_features,
        "outFeatures": out_features,
        "weight": weight,
        "bias": bias,
    }))
}

fn relu(_: &Call<'_>, _: &[Value]) -> Result<Value, EvalError> {
    Ok(json!({"layer": "relu"}))
}

fn tanh(_: &Call<'_>, _: &[Value]) -> Result<Value, EvalError> {
    Ok(json!({"layer": "tanh"}))
}

fn sigmoid(_: &Call<'_>, _: &[Value]) -> Result<Value, EvalError> {
    Ok(json!({"layer": "sigmoid"}))
}

fn softmax(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let dim = match arg(args, 0) {
        Value::Null => -1,
        _ => int(args, 0).ok_or_else(|| call.invalid("dim must be an integer"))?,
    };
    Ok(json!({"layer": "softmax", "dim": dim}))
}

fn dropout(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let p = num_or(args, 0, DEFAULT_DROPOUT);
    if !(0.0..1.0).contains(&p) {
        return Err(call.invalid(format!("dropout probability must be in [0, 1), got {p}")));
    }
    Ok(json!({"layer": "dropout", "p": p}))
}

fn batchnorm(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(json!({"layer": "batchnorm", "features": features(call, args, 0)?}))
}

fn layernorm(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    Ok(json!({"layer": "layernorm", "features": features(call, args, 0)?}))
}

fn sequential(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    if let Some(bad) = args.iter().find(|layer| layer.get("layer").and_then(Value::as_str).is_none()) {
        return Err(call.invalid(format!("{bad} is not a layer descriptor")));
    }
    Ok(json!({"layer": "sequential", "layers": args}))
}

fn forward(call: &Call<'_>, args: &[Value]) -> Result<Value, EvalError> {
    let input = super::tensor(call, args, 1)?;
    let output = call
        .backend()
        .forward(arg(args, 0), &input)
        .map_err(|e| call.backend_error(e))?;
    Ok(output.to_value())
}

#[cfg(test)]
mod tests {
    use crate::{BackendError, EvalError, EvaluationContext, Evaluator};
    use orbital_ir::{OperatorRegistry, SExpr};
    use serde_json::{Value, json};

    fn run(expr: Value) -> Result<Value, EvalError> {
        Evaluator::new(&OperatorRegistry::standard()).evaluate_pure(&SExpr::from(expr), &EvaluationContext::new())
    }

    #[test]
    fn test_descriptors() {
        assert_eq!(
            run(json!(["nn/linear", 4, 8])).unwrap(),
            json!({"layer": "linear", "inFeatures": 4, "outFeatures": 8, "weight": null, "bias": null})
        );
        assert_eq!(run(json!(["nn/relu"])).unwrap(), json!({"layer": "relu"}));
        assert_eq!(run(json!(["nn/softmax"])).unwrap(), json!({"layer": "softmax", "dim": -1}));
        assert_eq!(run(json!(["nn/dropout"])).unwrap(), json!({"layer": "dropout", "p": 0.5}));
        assert_eq!(run(json!(["nn/layernorm", 3])).unwrap(), json!({"layer": "layernorm", "features": 3}));
    }

    #[test]
    fn test_sequential_collects_layers() {
        let net = run(json!(["nn/sequential", ["nn/linear", 4, 8], ["nn/relu"], ["nn/linear", 8, 2]])).unwrap();
        assert_eq!(net["layer"], json!("sequential"));
        assert_eq!(net["layers"].as_array().map(Vec::len), Some(3));
        assert_eq!(net["layers"][1], json!({"layer": "relu"}));
        assert!(matches!(run(json!(["nn/sequential", 5])), Err(EvalError::InvalidArgument { .. })));
    }

    #[test]
    fn test_invalid_layers() {
        assert!(run(json!(["nn/linear", 0, 2])).is_err());
        assert!(run(json!(["nn/linear", 2, 1, [[1, 2, 3]]])).is_err());
        assert!(run(json!(["nn/dropout", 1])).is_err());
    }

    #[test]
    fn test_forward_through_backend() {
        let expr = json!(["nn/forward",
            ["nn/sequential",
                ["nn/linear", 2, 2, [[1, 0], [0, 1]], [1, 1]],
                ["nn/relu"]
            ],
            [[-3, 2]]
        ]);
        assert_eq!(run(expr).unwrap(), json!([[0, 3]]));
    }

    #[test]
    fn test_forward_without_weights() {
        let err = run(json!(["nn/forward", ["nn/linear", 2, 1], [1, 2]])).unwrap_err();
        assert!(matches!(
            err,
            EvalError::Backend {
                source: BackendError::MissingWeights(_),
                ..
            }
        ));
    }
}

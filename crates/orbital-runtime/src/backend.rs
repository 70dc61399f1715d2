//! Numeric backend for `tensor/*` and `nn/forward`.
//!
//! The evaluator delegates heavy numeric work to a [`TensorBackend`]. The
//! bundled [`CpuBackend`] is a straightforward row-major implementation;
//! hosts with an accelerator plug in their own.

use crate::tensor::{BackendError, Tensor, normalize_axis, strides};
use serde_json::Value;

/// Layer normalization epsilon.
const NORM_EPSILON: f64 = 1e-5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub fn apply(self, x: f64, y: f64) -> f64 {
        match self {
            BinaryOp::Add => x + y,
            BinaryOp::Sub => x - y,
            BinaryOp::Mul => x * y,
            BinaryOp::Div => x / y,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    Sum,
    Mean,
    Max,
    Min,
}

impl Reduction {
    pub fn name(self) -> &'static str {
        match self {
            Reduction::Sum => "sum",
            Reduction::Mean => "mean",
            Reduction::Max => "max",
            Reduction::Min => "min",
        }
    }

    fn apply(self, values: impl Iterator<Item = f64>) -> Result<f64, BackendError> {
        let mut count = 0usize;
        let mut acc = match self {
            Reduction::Sum | Reduction::Mean => 0.0,
            Reduction::Max => f64::NEG_INFINITY,
            Reduction::Min => f64::INFINITY,
        };
        for x in values {
            count += 1;
            acc = match self {
                Reduction::Sum | Reduction::Mean => acc + x,
                Reduction::Max => acc.max(x),
                Reduction::Min => acc.min(x),
            };
        }
        match self {
            Reduction::Sum => Ok(acc),
            _ if count == 0 => Err(BackendError::Empty(self.name())),
            Reduction::Mean => Ok(acc / count as f64),
            Reduction::Max | Reduction::Min => Ok(acc),
        }
    }
}

/// Host numeric execution.
pub trait TensorBackend: Send + Sync {
    /// Elementwise arithmetic with broadcasting.
    fn elementwise(&self, op: BinaryOp, a: &Tensor, b: &Tensor) -> Result<Tensor, BackendError>;

    fn matmul(&self, a: &Tensor, b: &Tensor) -> Result<Tensor, BackendError>;

    /// Reduces everything to a scalar, or along one axis.
    fn reduce(
        &self,
        op: Reduction,
        tensor: &Tensor,
        axis: Option<i64>,
    ) -> Result<Tensor, BackendError>;

    /// Runs inference for an `nn/*` network descriptor.
    fn forward(&self, network: &Value, input: &Tensor) -> Result<Tensor, BackendError>;
}

/// Single-threaded reference backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuBackend;

impl TensorBackend for CpuBackend {
    fn elementwise(&self, op: BinaryOp, a: &Tensor, b: &Tensor) -> Result<Tensor, BackendError> {
        let mismatch = || BackendError::ShapeMismatch {
            op: op.name(),
            left: a.shape().to_vec(),
            right: b.shape().to_vec(),
        };
        if a.shape() == b.shape() {
            let data = a
                .data()
                .iter()
                .zip(b.data())
                .map(|(&x, &y)| op.apply(x, y))
                .collect();
            return Tensor::new(a.shape().to_vec(), data);
        }

        let shape = broadcast_shape(a.shape(), b.shape()).ok_or_else(mismatch)?;
        let out_strides = strides(&shape);
        let a_map = BroadcastMap::new(a.shape(), shape.len());
        let b_map = BroadcastMap::new(b.shape(), shape.len());
        let len: usize = shape.iter().product();
        let mut data = Vec::with_capacity(len);
        for flat in 0..len {
            let x = a.data()[a_map.offset(flat, &out_strides, &shape)];
            let y = b.data()[b_map.offset(flat, &out_strides, &shape)];
            data.push(op.apply(x, y));
        }
        Tensor::new(shape, data)
    }

    fn matmul(&self, a: &Tensor, b: &Tensor) -> Result<Tensor, BackendError> {
        let mismatch = || BackendError::ShapeMismatch {
            op: "matmul",
            left: a.shape().to_vec(),
            right: b.shape().to_vec(),
        };
        match (a.shape(), b.shape()) {
            (&[n], &[m]) => {
                if n != m {
                    return Err(mismatch());
                }
                let dot = a.data().iter().zip(b.data()).map(|(x, y)| x * y).sum();
                Ok(Tensor::scalar(dot))
            }
            (&[n, k], &[k2, m]) => {
                if k != k2 {
                    return Err(mismatch());
                }
                Tensor::new(vec![n, m], matmul_2d(a.data(), b.data(), n, k, m))
            }
            (&[k], &[k2, m]) => {
                if k != k2 {
                    return Err(mismatch());
                }
                Ok(Tensor::vector(matmul_2d(a.data(), b.data(), 1, k, m)))
            }
            (&[n, k], &[k2]) => {
                if k != k2 {
                    return Err(mismatch());
                }
                Ok(Tensor::vector(matmul_2d(a.data(), b.data(), n, k, 1)))
            }
            _ => Err(BackendError::UnsupportedRank {
                op: "matmul",
                rank: a.rank().max(b.rank()),
            }),
        }
    }

    fn reduce(
        &self,
        op: Reduction,
        tensor: &Tensor,
        axis: Option<i64>,
    ) -> Result<Tensor, BackendError> {
        let Some(axis) = axis else {
            return Ok(Tensor::scalar(op.apply(tensor.data().iter().copied())?));
        };
        let shape = tensor.shape();
        let axis = normalize_axis(axis, shape.len())?;
        let outer: usize = shape[..axis].iter().product();
        let n = shape[axis];
        let inner: usize = shape[axis + 1..].iter().product();
        let data = tensor.data();

        let mut out = Vec::with_capacity(outer * inner);
        for o in 0..outer {
            for i in 0..inner {
                let column = (0..n).map(|k| data[o * n * inner + k * inner + i]);
                out.push(op.apply(column)?);
            }
        }
        let mut out_shape = shape.to_vec();
        out_shape.remove(axis);
        Tensor::new(out_shape, out)
    }

    fn forward(&self, network: &Value, input: &Tensor) -> Result<Tensor, BackendError> {
        tracing::debug!(input_shape = ?input.shape(), "cpu forward pass");
        self.apply_layer(network, input.clone())
    }
}

impl CpuBackend {
    fn apply_layer(&self, layer: &Value, x: Tensor) -> Result<Tensor, BackendError> {
        // A bare list of layers is shorthand for a sequential network.
        if let Value::Array(layers) = layer {
            return layers.iter().try_fold(x, |x, l| self.apply_layer(l, x));
        }
        let kind = layer
            .get("layer")
            .and_then(Value::as_str)
            .ok_or_else(|| BackendError::InvalidNetwork(format!("not a layer: {layer}")))?;
        match kind {
            "sequential" => {
                let layers = layer.get("layers").unwrap_or(&Value::Null);
                self.apply_layer(layers, x)
            }
            "linear" => self.linear(layer, &x),
            "relu" => Ok(x.map(|v| v.max(0.0))),
            "tanh" => Ok(x.map(f64::tanh)),
            "sigmoid" => Ok(x.map(|v| 1.0 / (1.0 + (-v).exp()))),
            "softmax" => {
                let dim = layer.get("dim").and_then(Value::as_i64).unwrap_or(-1);
                softmax(&x, dim)
            }
            // Inference mode: dropout is the identity and batch norm uses
            // its initial running statistics (mean 0, variance 1).
            "dropout" => Ok(x),
            "batchnorm" => Ok(x.map(|v| v / (1.0 + NORM_EPSILON).sqrt())),
            "layernorm" => layer_norm(&x),
            other => Err(BackendError::InvalidNetwork(format!("unknown layer {other}"))),
        }
    }

    fn linear(&self, layer: &Value, x: &Tensor) -> Result<Tensor, BackendError> {
        let weight = layer
            .get("weight")
            .filter(|w| !w.is_null())
            .ok_or_else(|| BackendError::MissingWeights("linear".to_string()))?;
        let weight = Tensor::from_value(weight)?;
        let &[out_features, in_features] = weight.shape() else {
            return Err(BackendError::InvalidNetwork(format!(
                "linear weight must be [out, in], got {:?}",
                weight.shape()
            )));
        };
        let transposed = Tensor::new(
            vec![in_features, out_features],
            transpose(weight.data(), out_features, in_features),
        )?;
        let y = self.matmul(x, &transposed)?;
        match layer.get("bias").filter(|b| !b.is_null()) {
            Some(bias) => self.elementwise(BinaryOp::Add, &y, &Tensor::from_value(bias)?),
            None => Ok(y),
        }
    }
}

fn matmul_2d(a: &[f64], b: &[f64], n: usize, k: usize, m: usize) -> Vec<f64> {
    let mut out = vec![0.0; n * m];
    for row in 0..n {
        for col in 0..m {
            out[row * m + col] = (0..k).map(|i| a[row * k + i] * b[i * m + col]).sum();
        }
    }
    out
}

fn transpose(data: &[f64], rows: usize, cols: usize) -> Vec<f64> {
    let mut out = vec![0.0; data.len()];
    for r in 0..rows {
        for c in 0..cols {
            out[c * rows + r] = data[r * cols + c];
        }
    }
    out
}

fn softmax(x: &Tensor, dim: i64) -> Result<Tensor, BackendError> {
    if x.rank() == 0 {
        return Ok(Tensor::scalar(1.0));
    }
    let axis = normalize_axis(dim, x.rank())?;
    let shape = x.shape();
    let outer: usize = shape[..axis].iter().product();
    let n = shape[axis];
    let inner: usize = shape[axis + 1..].iter().product();
    let mut out = x.data().to_vec();
    for o in 0..outer {
        for i in 0..inner {
            let idx = |k: usize| o * n * inner + k * inner + i;
            let max = (0..n).map(|k| out[idx(k)]).fold(f64::NEG_INFINITY, f64::max);
            let mut total = 0.0;
            for k in 0..n {
                out[idx(k)] = (out[idx(k)] - max).exp();
                total += out[idx(k)];
            }
            for k in 0..n {
                out[idx(k)] /= total;
            }
        }
    }
    Tensor::new(shape.to_vec(), out)
}

fn layer_norm(x: &Tensor) -> Result<Tensor, BackendError> {
    let Some(&n) = x.shape().last() else {
        return Ok(Tensor::scalar(0.0));
    };
    if n == 0 {
        return Ok(x.clone());
    }
    let mut out = Vec::with_capacity(x.len());
    for row in x.data().chunks(n) {
        let mean = row.iter().sum::<f64>() / n as f64;
        let var = row.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
        let denom = (var + NORM_EPSILON).sqrt();
        out.extend(row.iter().map(|v| (v - mean) / denom));
    }
    Tensor::new(x.shape().to_vec(), out)
}

fn broadcast_shape(a: &[usize], b: &[usize]) -> Option<Vec<usize>> {
    let rank = a.len().max(b.len());
    (0..rank)
        .map(|axis| {
            let da = dim_at(a, axis, rank);
            let db = dim_at(b, axis, rank);
            match (da, db) {
                _ if da == db => Some(da),
                (1, _) => Some(db),
                (_, 1) => Some(da),
                _ => None,
            }
        })
        .collect()
}

fn dim_at(shape: &[usize], axis: usize, rank: usize) -> usize {
    let offset = rank - shape.len();
    if axis < offset { 1 } else { shape[axis - offset] }
}

/// Maps output positions back to offsets in a broadcast operand.
struct BroadcastMap {
    shape: Vec<usize>,
    strides: Vec<usize>,
}

impl BroadcastMap {
    fn new(shape: &[usize], rank: usize) -> Self {
        let padded: Vec<usize> = (0..rank).map(|axis| dim_at(shape, axis, rank)).collect();
        let strides = strides(&padded);
        Self {
            shape: padded,
            strides,
        }
    }

    fn offset(&self, flat: usize, out_strides: &[usize], out_shape: &[usize]) -> usize {
        let mut offset = 0;
        for axis in 0..out_shape.len() {
            let index = (flat / out_strides[axis]) % out_shape[axis];
            if self.shape[axis] != 1 {
                offset += index * self.strides[axis];
            }
        }
        offset
    }
}

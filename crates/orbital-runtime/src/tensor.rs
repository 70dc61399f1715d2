//! Dense `f64` tensors.
//!
//! Expressions carry tensors as nested JSON arrays. They are converted to a
//! row-major [`Tensor`] at the operator boundary and back again on return.

use crate::value::number;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    #[error("tensor data must be numeric, found {0}")]
    NotNumeric(String),

    #[error("tensor data is ragged: expected {expected} elements along axis {axis}, found {found}")]
    Ragged {
        axis: usize,
        expected: usize,
        found: usize,
    },

    #[error("{op}: incompatible shapes {left:?} and {right:?}")]
    ShapeMismatch {
        op: &'static str,
        left: Vec<usize>,
        right: Vec<usize>,
    },

    #[error("cannot reshape {len} elements into {shape:?}")]
    InvalidReshape { len: usize, shape: Vec<usize> },

    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: i64, len: usize },

    #[error("axis {axis} out of range for a rank {rank} tensor")]
    InvalidAxis { axis: i64, rank: usize },

    #[error("{0} of an empty tensor")]
    Empty(&'static str),

    #[error("{op} is not supported for rank {rank}")]
    UnsupportedRank { op: &'static str, rank: usize },

    #[error("invalid network: {0}")]
    InvalidNetwork(String),

    #[error("layer {0} has no weights; load trained weights before inference")]
    MissingWeights(String),
}

/// Row-major tensor. A rank-0 tensor holds a single scalar.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f64>,
}

/// Number of elements in a tensor of `shape`, or `None` on overflow.
pub fn element_count(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
}

impl Tensor {
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> Result<Self, BackendError> {
        if element_count(&shape) != Some(data.len()) {
            return Err(BackendError::InvalidReshape {
                len: data.len(),
                shape,
            });
        }
        Ok(Self { shape, data })
    }

    pub fn scalar(value: f64) -> Self {
        Self {
            shape: Vec::new(),
            data: vec![value],
        }
    }

    pub fn vector(data: Vec<f64>) -> Self {
        Self {
            shape: vec![data.len()],
            data,
        }
    }

    pub fn full(shape: &[usize], value: f64) -> Self {
        let len = shape.iter().product();
        Self {
            shape: shape.to_vec(),
            data: vec![value; len],
        }
    }

    pub fn from_fn(shape: &[usize], f: impl FnMut() -> f64) -> Self {
        let len = shape.iter().product();
        Self {
            shape: shape.to_vec(),
            data: std::iter::repeat_with(f).take(len).collect(),
        }
    }

    /// Converts a number or a rectangular nested array of numbers.
    pub fn from_value(value: &Value) -> Result<Self, BackendError> {
        let mut shape = Vec::new();
        let mut cursor = value;
        while let Value::Array(items) = cursor {
            shape.push(items.len());
            match items.first() {
                Some(first) => cursor = first,
                None => break,
            }
        }
        let mut data = Vec::with_capacity(shape.iter().product());
        collect(value, &shape, 0, &mut data)?;
        Ok(Self { shape, data })
    }

    /// Converts back to a number (rank 0) or nested arrays.
    pub fn to_value(&self) -> Value {
        if self.shape.is_empty() {
            return number(self.data.first().copied().unwrap_or(f64::NAN));
        }
        build(&self.shape, &self.data)
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn into_data(self) -> Vec<f64> {
        self.data
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The single value of a rank-0 or one-element tensor.
    pub fn as_scalar(&self) -> Option<f64> {
        match self.data.as_slice() {
            [x] => Some(*x),
            _ => None,
        }
    }

    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            shape: self.shape.clone(),
            data: self.data.iter().map(|&x| f(x)).collect(),
        }
    }

    pub fn reshape(&self, shape: &[usize]) -> Result<Self, BackendError> {
        Self::new(shape.to_vec(), self.data.clone())
    }

    pub fn flatten(&self) -> Self {
        Self::vector(self.data.clone())
    }

    /// Sub-tensor at `index` along the first axis. Negative indices count
    /// from the end.
    pub fn index(&self, index: i64) -> Result<Self, BackendError> {
        let Some(&rows) = self.shape.first() else {
            return Err(BackendError::UnsupportedRank {
                op: "index",
                rank: 0,
            });
        };
        let i = normalize_index(index, rows)?;
        let row_len: usize = self.shape[1..].iter().product();
        Ok(Self {
            shape: self.shape[1..].to_vec(),
            data: self.data[i * row_len..(i + 1) * row_len].to_vec(),
        })
    }

    /// Rows `start..end` along the first axis, clamped to bounds.
    pub fn slice_rows(&self, start: i64, end: i64) -> Result<Self, BackendError> {
        let Some(&rows) = self.shape.first() else {
            return Err(BackendError::UnsupportedRank {
                op: "slice",
                rank: 0,
            });
        };
        let start = clamp_bound(start, rows);
        let end = clamp_bound(end, rows).max(start);
        let row_len: usize = self.shape[1..].iter().product();
        let mut shape = self.shape.clone();
        shape[0] = end - start;
        Ok(Self {
            shape,
            data: self.data[start * row_len..end * row_len].to_vec(),
        })
    }
}

pub(crate) fn strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; shape.len()];
    for axis in (0..shape.len().saturating_sub(1)).rev() {
        strides[axis] = strides[axis + 1] * shape[axis + 1];
    }
    strides
}

/// Resolves a possibly negative index.
pub(crate) fn normalize_index(index: i64, len: usize) -> Result<usize, BackendError> {
    let resolved = if index < 0 { index + len as i64 } else { index };
    if resolved < 0 || resolved >= len as i64 {
        return Err(BackendError::IndexOutOfBounds { index, len });
    }
    Ok(resolved as usize)
}

/// Resolves a possibly negative axis.
pub(crate) fn normalize_axis(axis: i64, rank: usize) -> Result<usize, BackendError> {
    let resolved = if axis < 0 { axis + rank as i64 } else { axis };
    if resolved < 0 || resolved >= rank as i64 {
        return Err(BackendError::InvalidAxis { axis, rank });
    }
    Ok(resolved as usize)
}

fn clamp_bound(bound: i64, len: usize) -> usize {
    let resolved = if bound < 0 { bound + len as i64 } else { bound };
    resolved.clamp(0, len as i64) as usize
}

fn collect(
    value: &Value,
    shape: &[usize],
    axis: usize,
    data: &mut Vec<f64>,
) -> Result<(), BackendError> {
    match value {
        Value::Number(n) if axis == shape.len() => {
            data.push(n.as_f64().unwrap_or(f64::NAN));
            Ok(())
        }
        Value::Array(items) if axis < shape.len() => {
            if items.len() != shape[axis] {
                return Err(BackendError::Ragged {
                    axis,
                    expected: shape[axis],
                    found: items.len(),
                });
            }
            items
                .iter()
                .try_for_each(|item| collect(item, shape, axis + 1, data))
        }
        Value::Number(_) | Value::Array(_) => Err(BackendError::Ragged {
            axis,
            expected: shape.get(axis).copied().unwrap_or(0),
            found: 0,
        }),
        other => Err(BackendError::NotNumeric(other.to_string())),
    }
}

fn build(shape: &[usize], data: &[f64]) -> Value {
    match shape.split_first() {
        None => number(data.first().copied().unwrap_or(f64::NAN)),
        Some((_, [])) => Value::Array(data.iter().map(|&x| number(x)).collect()),
        Some((&rows, rest)) => {
            let row_len: usize = rest.iter().product();
            Value::Array(
                (0..rows)
                    .map(|r| build(rest, &data[r * row_len..(r + 1) * row_len]))
                    .collect(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_element_count_overflow() {
        assert_eq!(element_count(&[]), Some(1));
        assert_eq!(element_count(&[2, 3, 4]), Some(24));
        assert_eq!(element_count(&[usize::MAX, 2]), None);
        assert!(matches!(
            Tensor::new(vec![usize::MAX, 2], vec![0.0]),
            Err(BackendError::InvalidReshape { .. })
        ));
    }

    #[test]
    fn test_from_nested_arrays() {
        let t = Tensor::from_value(&json!([[1, 2, 3], [4, 5, 6]])).unwrap();
        assert_eq!(t.shape(), &[2, 3]);
        assert_eq!(t.data(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(t.to_value(), json!([[1, 2, 3], [4, 5, 6]]));
    }

    #[test]
    fn test_scalar_and_empty() {
        let s = Tensor::from_value(&json!(2.5)).unwrap();
        assert_eq!(s.rank(), 0);
        assert_eq!(s.to_value(), json!(2.5));

        let e = Tensor::from_value(&json!([])).unwrap();
        assert_eq!(e.shape(), &[0]);
        assert_eq!(e.to_value(), json!([]));
    }

    #[test]
    fn test_ragged_and_non_numeric() {
        assert!(matches!(
            Tensor::from_value(&json!([[1, 2], [3]])),
            Err(BackendError::Ragged { .. })
        ));
        assert!(matches!(
            Tensor::from_value(&json!([1, [2]])),
            Err(BackendError::Ragged { .. })
        ));
        assert!(matches!(
            Tensor::from_value(&json!([1, "2"])),
            Err(BackendError::NotNumeric(_))
        ));
    }

    #[test]
    fn test_index_and_slice() {
        let t = Tensor::from_value(&json!([[1, 2], [3, 4], [5, 6]])).unwrap();
        assert_eq!(t.index(1).unwrap().to_value(), json!([3, 4]));
        assert_eq!(t.index(-1).unwrap().to_value(), json!([5, 6]));
        assert!(t.index(3).is_err());
        assert_eq!(t.slice_rows(1, 10).unwrap().to_value(), json!([[3, 4], [5, 6]]));
        assert_eq!(t.slice_rows(2, 1).unwrap().shape(), &[0, 2]);
    }

    #[test]
    fn test_reshape() {
        let t = Tensor::vector(vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(t.reshape(&[2, 2]).unwrap().to_value(), json!([[1, 2], [3, 4]]));
        assert!(matches!(
            t.reshape(&[3]),
            Err(BackendError::InvalidReshape { len: 4, .. })
        ));
    }

    #[test]
    fn test_strides() {
        assert_eq!(strides(&[2, 3, 4]), vec![12, 4, 1]);
        assert_eq!(strides(&[]), Vec::<usize>::new());
    }
}

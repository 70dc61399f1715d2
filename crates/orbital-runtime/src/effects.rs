//! The effect boundary.
//!
//! The evaluator never performs side effects itself. When it reaches an
//! effectful operator it builds an [`EffectRequest`] and hands it to the
//! host's [`EffectHandler`]. Timers, persistence, network and training all
//! live on the other side of this trait.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EffectError {
    #[error("effect {0} is not allowed here")]
    Rejected(String),

    #[error("effect {0} is not supported by this host")]
    Unsupported(String),

    #[error("effect {operator} failed: {message}")]
    Failed { operator: String, message: String },

    #[error("effect {operator} timed out after {ms}ms")]
    TimedOut { operator: String, ms: u64 },

    #[error("malformed effect description: {0}")]
    Malformed(String),
}

/// A resolved effect: the operator and its evaluated arguments.
///
/// Arguments that were themselves effect calls appear as nested
/// descriptions (`[op, ...args]`) rather than results, so the host decides
/// when and whether to run them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectRequest {
    pub operator: String,
    pub args: Vec<Value>,
}

impl EffectRequest {
    pub fn new(operator: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            operator: operator.into(),
            args,
        }
    }

    /// The `[op, ...args]` description form.
    pub fn to_value(&self) -> Value {
        let mut items = Vec::with_capacity(self.args.len() + 1);
        items.push(Value::String(self.operator.clone()));
        items.extend(self.args.iter().cloned());
        Value::Array(items)
    }

    /// Parses a `[op, ...args]` description.
    pub fn from_value(value: &Value) -> Result<Self, EffectError> {
        match value.as_array().and_then(|items| items.split_first()) {
            Some((Value::String(operator), args)) => Ok(Self::new(operator.clone(), args.to_vec())),
            _ => Err(EffectError::Malformed(value.to_string())),
        }
    }

    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }
}

/// Host side of effect operators. Implementations must return promptly;
/// anything long-running is scheduled and reported through the result.
pub trait EffectHandler: Send + Sync {
    fn dispatch(&self, request: EffectRequest) -> Result<Value, EffectError>;
}

/// Rejects every effect. Guard evaluation always runs against this.
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectEffects;

impl EffectHandler for RejectEffects {
    fn dispatch(&self, request: EffectRequest) -> Result<Value, EffectError> {
        Err(EffectError::Rejected(request.operator))
    }
}

/// Records every request in order and answers `null`.
#[derive(Debug, Default)]
pub struct EffectQueue {
    requests: Mutex<Vec<EffectRequest>>,
}

impl EffectQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Removes and returns everything queued so far.
    pub fn drain(&self) -> Vec<EffectRequest> {
        std::mem::take(&mut *self.lock())
    }

    pub fn into_requests(self) -> Vec<EffectRequest> {
        self.requests
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<EffectRequest>> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EffectHandler for EffectQueue {
    fn dispatch(&self, request: EffectRequest) -> Result<Value, EffectError> {
        tracing::debug!(operator = %request.operator, args = request.args.len(), "queued effect");
        self.lock().push(request);
        Ok(Value::Null)
    }
}

impl<T: EffectHandler + ?Sized> EffectHandler for &T {
    fn dispatch(&self, request: EffectRequest) -> Result<Value, EffectError> {
        (**self).dispatch(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_description_round_trip() {
        let request = EffectRequest::new("emit", vec![json!("SAVED"), json!({"id": 1})]);
        let value = request.to_value();
        assert_eq!(value, json!(["emit", "SAVED", {"id": 1}]));
        assert_eq!(EffectRequest::from_value(&value).unwrap(), request);
    }

    #[test]
    fn test_malformed_description() {
        assert!(matches!(
            EffectRequest::from_value(&json!([1, 2])),
            Err(EffectError::Malformed(_))
        ));
        assert!(EffectRequest::from_value(&json!([])).is_err());
        assert!(EffectRequest::from_value(&json!("emit")).is_err());
    }

    #[test]
    fn test_queue_preserves_order() {
        let queue = EffectQueue::new();
        queue.dispatch(EffectRequest::new("emit", vec![json!("A")])).unwrap();
        queue.dispatch(EffectRequest::new("notify", vec![json!("B")])).unwrap();
        assert_eq!(queue.len(), 2);

        let drained = queue.drain();
        assert_eq!(drained[0].operator, "emit");
        assert_eq!(drained[1].operator, "notify");
        assert!(queue.is_empty());
    }

    #[test]
    fn test_reject_effects() {
        let err = RejectEffects
            .dispatch(EffectRequest::new("async/delay", vec![json!(10)]))
            .unwrap_err();
        assert_eq!(err, EffectError::Rejected("async/delay".to_string()));
    }
}

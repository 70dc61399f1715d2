//! Evaluator and standard operator library for Orbital expressions.
//!
//! The [`Evaluator`] walks an [`SExpr`](orbital_ir::SExpr) against an
//! [`EvaluationContext`]. Pure operators run in-process; effectful ones are
//! described as [`EffectRequest`]s and handed to the host's
//! [`EffectHandler`]. Numeric work for `tensor/*` and `nn/forward` goes
//! through a [`TensorBackend`].
//!
//! ```
//! use orbital_ir::{BindingRoot, OperatorRegistry, SExpr};
//! use orbital_runtime::{EvaluationContext, Evaluator};
//! use serde_json::json;
//!
//! let evaluator = Evaluator::new(&OperatorRegistry::standard());
//! let ctx = EvaluationContext::new().with_root(BindingRoot::Entity, json!({"hp": 140}));
//! let expr: SExpr = serde_json::from_value(json!(["math/clamp", "@entity.hp", 0, 100])).unwrap();
//! assert_eq!(evaluator.evaluate_pure(&expr, &ctx).unwrap(), json!(100));
//! ```

mod backend;
mod config;
mod context;
mod dispatch;
mod effects;
mod evaluator;
mod modules;
mod tensor;
pub mod value;

pub use backend::{BinaryOp, CpuBackend, Reduction, TensorBackend};
pub use config::{ConfigError, DEFAULT_MAX_DEPTH, RuntimeConfig};
pub use context::{EvaluationContext, Scope, resolve_binding};
pub use effects::{EffectError, EffectHandler, EffectQueue, EffectRequest, RejectEffects};
pub use evaluator::{EvalError, Evaluator};
pub use tensor::{BackendError, Tensor};

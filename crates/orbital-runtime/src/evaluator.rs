//! The tree-walking evaluator.
//!
//! Evaluation is a pure function of `(expression, context)` apart from the
//! requests it hands to the [`EffectHandler`]. Nothing is retained between
//! calls, so one [`Evaluator`] can be shared across threads.

use crate::backend::{CpuBackend, TensorBackend};
use crate::config::RuntimeConfig;
use crate::context::{EvaluationContext, Scope, resolve_binding};
use crate::dispatch::{DispatchTable, Handler};
use crate::effects::{EffectError, EffectHandler, EffectRequest, RejectEffects};
use crate::tensor::BackendError;
use crate::value::truthy;
use orbital_ir::validation::TARGET_OPERATORS;
use orbital_ir::{ArityError, Node, OperatorMeta, OperatorRegistry, SExpr};
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("unknown operator: {0}")]
    UnknownOperator(String),

    #[error(transparent)]
    ArityMismatch(#[from] ArityError),

    #[error("{operator}: {message}")]
    InvalidArgument { operator: String, message: String },

    #[error("lambda literal outside a lambda argument position")]
    UnexpectedLambda,

    #[error("evaluation exceeded the maximum depth of {0}")]
    DepthExceeded(usize),

    #[error(transparent)]
    Effect(#[from] EffectError),

    #[error("{operator}: {source}")]
    Backend {
        operator: String,
        #[source]
        source: BackendError,
    },

    #[error("operator {0} has no implementation")]
    Unsupported(String),
}

/// Evaluates expressions against a registry's operators.
pub struct Evaluator {
    table: DispatchTable,
    config: RuntimeConfig,
    backend: Arc<dyn TensorBackend>,
}

impl Evaluator {
    pub fn new(registry: &OperatorRegistry) -> Self {
        Self {
            table: DispatchTable::new(registry),
            config: RuntimeConfig::default(),
            backend: Arc::new(CpuBackend),
        }
    }

    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_backend(mut self, backend: Arc<dyn TensorBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Evaluates an expression, forwarding effects to `effects`.
    pub fn evaluate(
        &self,
        expr: &SExpr,
        context: &EvaluationContext,
        effects: &dyn EffectHandler,
    ) -> Result<Value, EvalError> {
        let run = Run {
            evaluator: self,
            effects,
        };
        run.eval(expr, &Scope::new(context), 0)
    }

    /// Evaluates an expression that must not perform effects.
    pub fn evaluate_pure(
        &self,
        expr: &SExpr,
        context: &EvaluationContext,
    ) -> Result<Value, EvalError> {
        self.evaluate(expr, context, &RejectEffects)
    }

    /// Evaluates a guard and coerces the result to a boolean.
    pub fn evaluate_guard(
        &self,
        expr: &SExpr,
        context: &EvaluationContext,
    ) -> Result<bool, EvalError> {
        self.evaluate_pure(expr, context).map(|value| truthy(&value))
    }
}

/// State of one top-level evaluation.
pub(crate) struct Run<'a> {
    evaluator: &'a Evaluator,
    effects: &'a dyn EffectHandler,
}

impl Run<'_> {
    fn eval(&self, expr: &SExpr, scope: &Scope<'_>, depth: usize) -> Result<Value, EvalError> {
        let max_depth = self.evaluator.config.max_depth;
        if depth > max_depth {
            return Err(EvalError::DepthExceeded(max_depth));
        }
        match expr.node() {
            Node::Literal(literal) => Ok(literal.to_value()),
            Node::Binding(binding) => Ok(resolve_binding(binding, scope)),
            Node::List(items) => items
                .iter()
                .map(|item| self.eval(item, scope, depth + 1))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Node::Object(map) => {
                let mut object = Map::new();
                for (key, value) in map {
                    object.insert(key.clone(), self.eval(value, scope, depth + 1)?);
                }
                Ok(Value::Object(object))
            }
            Node::Call { operator, args } => self.call(operator, args, scope, depth),
        }
    }

    fn call(
        &self,
        operator: &str,
        args: &[SExpr],
        scope: &Scope<'_>,
        depth: usize,
    ) -> Result<Value, EvalError> {
        let entry = self
            .evaluator
            .table
            .get(operator)
            .ok_or_else(|| EvalError::UnknownOperator(operator.to_string()))?;
        entry.meta.check_arity(args.len())?;
        tracing::trace!(operator, argc = args.len(), "dispatch");

        let call = Call {
            meta: &entry.meta,
            run: self,
            scope,
            depth,
        };
        match entry.handler {
            Handler::Eager(invoke) => {
                let values = call.eval_args(args)?;
                invoke(&call, &values)
            }
            Handler::Quoted(invoke) => {
                let position = entry.meta.quoted_position();
                let values = args
                    .iter()
                    .enumerate()
                    .map(|(i, arg)| {
                        if position == Some(i) {
                            Ok(arg.to_value())
                        } else {
                            call.eval(arg)
                        }
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                invoke(&call, &values)
            }
            Handler::Lazy(invoke) => invoke(&call, args),
            Handler::Lambda(invoke) => {
                let position = entry.meta.lambda_position();
                let mut values = Vec::with_capacity(args.len());
                let mut closure = None;
                for (i, arg) in args.iter().enumerate() {
                    if position == Some(i) {
                        closure = Some(call.closure(arg)?);
                    } else {
                        values.push(call.eval(arg)?);
                    }
                }
                let closure = closure.ok_or_else(|| call.invalid("missing lambda argument"))?;
                invoke(&call, &values, &closure)
            }
            Handler::Effect => {
                let request = self.effect_request(&entry.meta, args, scope, depth)?;
                tracing::debug!(operator = %request.operator, "dispatching effect");
                Ok(self.effects.dispatch(request)?)
            }
            Handler::Missing => Err(EvalError::Unsupported(operator.to_string())),
        }
    }

    /// Resolves an effect call's arguments. Nested effect calls become
    /// descriptions and write targets stay as binding strings.
    fn effect_request(
        &self,
        meta: &OperatorMeta,
        args: &[SExpr],
        scope: &Scope<'_>,
        depth: usize,
    ) -> Result<EffectRequest, EvalError> {
        let max_depth = self.evaluator.config.max_depth;
        if depth > max_depth {
            return Err(EvalError::DepthExceeded(max_depth));
        }
        let takes_target = TARGET_OPERATORS.contains(&meta.name);
        let mut values = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let value = match arg.node() {
                Node::Binding(target) if i == 0 && takes_target => Value::String(target.to_string()),
                Node::Call {
                    operator,
                    args: inner,
                } => match self.evaluator.table.get(operator) {
                    Some(entry) if entry.meta.side_effects => {
                        entry.meta.check_arity(inner.len())?;
                        self.effect_request(&entry.meta, inner, scope, depth + 1)?
                            .to_value()
                    }
                    _ => self.eval(arg, scope, depth + 1)?,
                },
                _ => self.eval(arg, scope, depth + 1)?,
            };
            values.push(value);
        }
        Ok(EffectRequest::new(meta.name, values))
    }
}

/// One operator invocation, as seen by an operator implementation.
pub(crate) struct Call<'a> {
    meta: &'a OperatorMeta,
    run: &'a Run<'a>,
    scope: &'a Scope<'a>,
    depth: usize,
}

impl<'a> Call<'a> {
    pub(crate) fn name(&self) -> &'static str {
        self.meta.name
    }

    /// Evaluates an argument in the caller's scope.
    pub(crate) fn eval(&self, expr: &SExpr) -> Result<Value, EvalError> {
        self.run.eval(expr, self.scope, self.depth + 1)
    }

    /// Evaluates an expression in a scope derived from the caller's.
    pub(crate) fn eval_in(&self, expr: &SExpr, scope: &Scope<'_>) -> Result<Value, EvalError> {
        self.run.eval(expr, scope, self.depth + 1)
    }

    pub(crate) fn eval_args(&self, args: &[SExpr]) -> Result<Vec<Value>, EvalError> {
        args.iter().map(|arg| self.eval(arg)).collect()
    }

    pub(crate) fn scope(&self) -> &'a Scope<'a> {
        self.scope
    }

    pub(crate) fn config(&self) -> &RuntimeConfig {
        &self.run.evaluator.config
    }

    pub(crate) fn backend(&self) -> &dyn TensorBackend {
        self.run.evaluator.backend.as_ref()
    }

    pub(crate) fn invalid(&self, message: impl Into<String>) -> EvalError {
        EvalError::InvalidArgument {
            operator: self.name().to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn backend_error(&self, source: BackendError) -> EvalError {
        EvalError::Backend {
            operator: self.name().to_string(),
            source,
        }
    }

    fn closure(&self, arg: &'a SExpr) -> Result<Closure<'a>, EvalError> {
        match arg.as_lambda() {
            Some(Ok(lambda)) => Ok(Closure {
                run: self.run,
                params: lambda.params,
                body: lambda.body,
                scope: self.scope,
                depth: self.depth + 1,
            }),
            Some(Err(err)) => Err(self.invalid(err.to_string())),
            None => Err(self.invalid(format!(
                "argument {} must be a lambda literal",
                self.meta.lambda_position().map_or(0, |p| p + 1)
            ))),
        }
    }
}

/// A lambda bound to its definition scope.
pub(crate) struct Closure<'a> {
    run: &'a Run<'a>,
    params: Vec<&'a str>,
    body: &'a SExpr,
    scope: &'a Scope<'a>,
    depth: usize,
}

impl Closure<'_> {
    /// Binds parameters positionally in a fresh frame and evaluates the
    /// body. Missing arguments bind to `null`; extras are ignored.
    pub(crate) fn call(&self, args: Vec<Value>) -> Result<Value, EvalError> {
        let mut args = args.into_iter();
        let locals = self
            .params
            .iter()
            .map(|&name| (name, args.next().unwrap_or(Value::Null)))
            .collect();
        let frame = self.scope.child(locals);
        self.run.eval(self.body, &frame, self.depth)
    }

    /// Calls the lambda and coerces the result to a boolean.
    pub(crate) fn test(&self, args: Vec<Value>) -> Result<bool, EvalError> {
        self.call(args).map(|value| truthy(&value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::EffectQueue;
    use orbital_ir::BindingRoot;
    use serde_json::json;

    fn eval(expr: Value) -> Result<Value, EvalError> {
        eval_with(expr, &EvaluationContext::new())
    }

    fn eval_with(expr: Value, context: &EvaluationContext) -> Result<Value, EvalError> {
        let registry = OperatorRegistry::standard();
        Evaluator::new(&registry).evaluate_pure(&SExpr::from(expr), context)
    }

    #[test]
    fn test_literals_and_collections() {
        assert_eq!(eval(json!(42)).unwrap(), json!(42));
        assert_eq!(eval(json!("hello")).unwrap(), json!("hello"));
        assert_eq!(eval(json!([1, ["+", 1, 1]])).unwrap(), json!([1, 2]));
        assert_eq!(eval(json!({"a": ["*", 2, 3]})).unwrap(), json!({"a": 6}));
        assert_eq!(eval(json!([])).unwrap(), json!([]));
    }

    #[test]
    fn test_unknown_operator_is_an_error() {
        assert_eq!(
            eval(json!(["nope", 1])),
            Err(EvalError::UnknownOperator("nope".to_string()))
        );
    }

    #[test]
    fn test_arity_is_checked() {
        assert!(matches!(
            eval(json!(["math/clamp", 50, 0])),
            Err(EvalError::ArityMismatch(ArityError { got: 2, .. }))
        ));
    }

    #[test]
    fn test_bindings() {
        let ctx = EvaluationContext::new()
            .with_root(BindingRoot::Entity, json!({"age": 21, "roles": ["admin"]}));
        let guard = json!(["and",
            [">", "@entity.age", 18],
            ["array/some", "@entity.roles", ["fn", "r", ["=", "@r", "admin"]]]
        ]);
        assert_eq!(eval_with(guard, &ctx).unwrap(), json!(true));
        assert_eq!(eval_with(json!("@entity.missing"), &ctx).unwrap(), Value::Null);
    }

    #[test]
    fn test_lambda_sees_definition_scope() {
        let expr = json!(["let", [["factor", 3]],
            ["array/map", [1, 2], ["fn", "x", ["*", "@x", "@factor"]]]
        ]);
        assert_eq!(eval(expr).unwrap(), json!([3, 6]));
    }

    #[test]
    fn test_lambda_outside_lambda_position() {
        assert_eq!(
            eval(json!(["not", ["fn", "x", true]])),
            Err(EvalError::UnexpectedLambda)
        );
        assert!(matches!(
            eval(json!(["array/map", [1], "@entity.f"])),
            Err(EvalError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_depth_limit() {
        let registry = OperatorRegistry::standard();
        let config = RuntimeConfig {
            max_depth: 8,
            ..RuntimeConfig::default()
        };
        let evaluator = Evaluator::new(&registry).with_config(config);
        let mut expr = json!(1);
        for _ in 0..20 {
            expr = json!(["+", expr, 1]);
        }
        let result = evaluator.evaluate_pure(&SExpr::from(expr), &EvaluationContext::new());
        assert_eq!(result, Err(EvalError::DepthExceeded(8)));
    }

    #[test]
    fn test_effects_are_dispatched() {
        let registry = OperatorRegistry::standard();
        let evaluator = Evaluator::new(&registry);
        let ctx = EvaluationContext::new().with_root(BindingRoot::Payload, json!({"hp": 40}));
        let queue = EffectQueue::new();
        let expr = SExpr::from(json!(["do",
            ["set", "@entity.hp", ["math/clamp", "@payload.hp", 0, 30]],
            ["async/delay", 500, ["emit", "HEALED", {"hp": "@payload.hp"}]]
        ]));
        evaluator.evaluate(&expr, &ctx, &queue).unwrap();

        let requests = queue.into_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0], EffectRequest::new("set", vec![json!("@entity.hp"), json!(30)]));
        assert_eq!(requests[1].operator, "async/delay");
        assert_eq!(requests[1].args, vec![json!(500), json!(["emit", "HEALED", {"hp": 40}])]);
    }

    #[test]
    fn test_guard_rejects_effects() {
        let registry = OperatorRegistry::standard();
        let evaluator = Evaluator::new(&registry);
        let err = evaluator
            .evaluate_guard(&SExpr::from(json!(["async/delay", 1000])), &EvaluationContext::new())
            .unwrap_err();
        assert_eq!(err, EvalError::Effect(EffectError::Rejected("async/delay".to_string())));
    }

    #[test]
    fn test_guard_coerces_to_bool() {
        let registry = OperatorRegistry::standard();
        let evaluator = Evaluator::new(&registry);
        let ctx = EvaluationContext::new();
        assert!(!evaluator.evaluate_guard(&SExpr::from(json!("@entity.x")), &ctx).unwrap());
        assert!(evaluator.evaluate_guard(&SExpr::from(json!(["str/len", "abc"])), &ctx).unwrap());
    }
}

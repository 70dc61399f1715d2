//! Operator dispatch table.
//!
//! Built once per [`Evaluator`](crate::Evaluator) from the registry: every
//! operator name maps to its metadata and a closed handler record, so a
//! call is a single hash lookup.

use crate::evaluator::{Call, Closure, EvalError};
use crate::modules;
use orbital_ir::{OperatorMeta, OperatorRegistry, SExpr};
use serde_json::Value;
use std::collections::HashMap;

/// Receives evaluated arguments.
pub(crate) type EagerFn = fn(&Call<'_>, &[Value]) -> Result<Value, EvalError>;
/// Receives unevaluated arguments and evaluates them itself.
pub(crate) type LazyFn = fn(&Call<'_>, &[SExpr]) -> Result<Value, EvalError>;
/// Receives the evaluated non-lambda arguments and the bound lambda.
pub(crate) type LambdaFn = fn(&Call<'_>, &[Value], &Closure<'_>) -> Result<Value, EvalError>;

#[derive(Clone, Copy)]
pub(crate) enum Handler {
    Eager(EagerFn),
    /// Like `Eager`, but the quoted argument arrives as written.
    Quoted(EagerFn),
    Lazy(LazyFn),
    Lambda(LambdaFn),
    /// Forwarded to the host effect handler.
    Effect,
    /// Registered but not implemented.
    Missing,
}

pub(crate) struct Entry {
    pub(crate) meta: OperatorMeta,
    pub(crate) handler: Handler,
}

pub(crate) struct DispatchTable {
    entries: HashMap<&'static str, Entry>,
}

impl DispatchTable {
    pub(crate) fn new(registry: &OperatorRegistry) -> Self {
        let handlers: HashMap<&str, Handler> = modules::HANDLERS
            .iter()
            .flat_map(|table| table.iter().copied())
            .collect();

        let entries = registry
            .iter()
            .map(|meta| {
                let handler = if meta.side_effects {
                    Handler::Effect
                } else {
                    handlers.get(meta.name).copied().unwrap_or(Handler::Missing)
                };
                (meta.name, Entry { meta: *meta, handler })
            })
            .collect();
        Self { entries }
    }

    pub(crate) fn get(&self, name: &str) -> Option<&Entry> {
        self.entries.get(name)
    }

    #[cfg(test)]
    fn missing(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self
            .entries
            .values()
            .filter(|entry| matches!(entry.handler, Handler::Missing))
            .map(|entry| entry.meta.name)
            .collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_pure_operator_has_a_handler() {
        let table = DispatchTable::new(&OperatorRegistry::standard());
        assert_eq!(table.missing(), Vec::<&str>::new());
    }

    #[test]
    fn test_handlers_only_cover_registered_operators() {
        let registry = OperatorRegistry::standard();
        for (name, _) in modules::HANDLERS.iter().flat_map(|table| table.iter()) {
            let meta = registry.get(name);
            assert!(meta.is_some(), "{name} is implemented but not registered");
            assert!(!meta.is_some_and(|m| m.side_effects), "{name} is an effect");
        }
    }

    #[test]
    fn test_handler_shapes_match_metadata() {
        let registry = OperatorRegistry::standard();
        let table = DispatchTable::new(&registry);
        for meta in registry.iter() {
            let entry = table.get(meta.name).unwrap();
            match entry.handler {
                Handler::Lambda(_) => assert!(meta.accepts_lambda(), "{}", meta.name),
                Handler::Quoted(_) => assert!(meta.quoted_position().is_some(), "{}", meta.name),
                Handler::Effect => assert!(meta.side_effects, "{}", meta.name),
                _ => {
                    assert!(!meta.accepts_lambda(), "{} needs a lambda handler", meta.name);
                    assert!(meta.quoted_position().is_none(), "{}", meta.name);
                }
            }
        }
    }
}

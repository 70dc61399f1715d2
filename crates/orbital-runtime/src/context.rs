//! Evaluation context and lexical scopes.
//!
//! An [`EvaluationContext`] holds the binding roots supplied by the host for
//! one call. A [`Scope`] is an immutable frame of locals chained to its
//! parent by reference; lambda invocations and `let` bodies get a fresh
//! child frame that is dropped when they return.

use crate::value::get_segments;
use orbital_ir::{BindingPath, BindingRoot};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Read-only snapshot of the binding roots for one evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvaluationContext {
    roots: BTreeMap<BindingRoot, Value>,
}

impl EvaluationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`EvaluationContext::set_root`].
    pub fn with_root(mut self, root: BindingRoot, value: Value) -> Self {
        self.set_root(root, value);
        self
    }

    pub fn set_root(&mut self, root: BindingRoot, value: Value) {
        self.roots.insert(root, value);
    }

    pub fn root(&self, root: BindingRoot) -> Option<&Value> {
        self.roots.get(&root)
    }

    pub fn entity(&self) -> Option<&Value> {
        self.root(BindingRoot::Entity)
    }

    pub fn payload(&self) -> Option<&Value> {
        self.root(BindingRoot::Payload)
    }
}

/// One frame of lexical locals.
#[derive(Debug, Clone)]
pub struct Scope<'a> {
    context: &'a EvaluationContext,
    locals: Vec<(&'a str, Value)>,
    parent: Option<&'a Scope<'a>>,
}

impl<'a> Scope<'a> {
    /// The outermost scope: no locals, only binding roots.
    pub fn new(context: &'a EvaluationContext) -> Self {
        Self {
            context,
            locals: Vec::new(),
            parent: None,
        }
    }

    /// A child frame whose lookups fall back to `self`.
    pub fn child<'b>(&'b self, locals: Vec<(&'b str, Value)>) -> Scope<'b>
    where
        'a: 'b,
    {
        Scope {
            context: self.context,
            locals,
            parent: Some(self),
        }
    }

    pub fn context(&self) -> &'a EvaluationContext {
        self.context
    }

    /// Innermost local with this name.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        let mut frame = Some(self);
        while let Some(scope) = frame {
            if let Some((_, value)) = scope.locals.iter().rev().find(|(n, _)| *n == name) {
                return Some(value);
            }
            frame = scope.parent;
        }
        None
    }

    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut frame = self.parent;
        while let Some(scope) = frame {
            depth += 1;
            frame = scope.parent;
        }
        depth
    }

    /// Resolves a binding string against this scope.
    pub fn resolve(&self, binding: &str) -> Value {
        resolve_binding(binding, self)
    }
}

/// Resolves `@head.path.to.field`.
///
/// Locals shadow binding roots, innermost first. Anything missing along the
/// way, including a malformed binding, resolves to `null`.
pub fn resolve_binding(binding: &str, scope: &Scope<'_>) -> Value {
    let Ok(path) = BindingPath::parse(binding) else {
        return Value::Null;
    };
    let base = scope.lookup(path.head).or_else(|| {
        path.root()
            .and_then(|root| scope.context().root(root))
    });
    base.and_then(|value| get_segments(value, &path.segments))
        .cloned()
        .unwrap_or(Value::Null)
}

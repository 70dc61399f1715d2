//! Operator registry.
//!
//! A flat name → metadata map built once from the catalog and passed by
//! reference to the validator and the evaluator.

use crate::catalog;
use crate::operator::{ArityError, OperatorMeta, StdModule};
use std::collections::HashMap;
use thiserror::Error;

/// Errors from registry queries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("unknown operator: {0}")]
    UnknownOperator(String),

    #[error(transparent)]
    Arity(#[from] ArityError),
}

/// Catalog of every operator an expression may call.
#[derive(Debug, Clone)]
pub struct OperatorRegistry {
    operators: HashMap<&'static str, OperatorMeta>,
}

impl OperatorRegistry {
    /// Builds the registry of core and standard library operators.
    pub fn standard() -> Self {
        let operators = catalog::operators().map(|op| (op.name, *op)).collect();
        Self { operators }
    }

    pub fn get(&self, name: &str) -> Option<&OperatorMeta> {
        self.operators.get(name)
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.operators.contains_key(name)
    }

    /// Checks an argument count for a named operator.
    pub fn validate_arity(&self, name: &str, argc: usize) -> Result<(), RegistryError> {
        let meta = self
            .get(name)
            .ok_or_else(|| RegistryError::UnknownOperator(name.to_string()))?;
        meta.check_arity(argc)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    /// All operators, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = &OperatorMeta> {
        let mut ops: Vec<_> = self.operators.values().collect();
        ops.sort_by_key(|op| op.name);
        ops.into_iter()
    }

    /// Operators declared `side_effects = true`.
    pub fn effect_operators(&self) -> Vec<&OperatorMeta> {
        self.filtered(|op| op.side_effects)
    }

    /// Operators without side effects.
    pub fn pure_operators(&self) -> Vec<&OperatorMeta> {
        self.filtered(|op| !op.side_effects)
    }

    /// Operators that take a lambda argument.
    pub fn lambda_operators(&self) -> Vec<&OperatorMeta> {
        self.filtered(OperatorMeta::accepts_lambda)
    }

    /// Operators without a module prefix.
    pub fn core_operators(&self) -> Vec<&OperatorMeta> {
        self.filtered(OperatorMeta::is_core)
    }

    pub fn operators_by_module(&self, module: StdModule) -> Vec<&OperatorMeta> {
        self.filtered(|op| op.module() == Some(module))
    }

    fn filtered(&self, predicate: impl Fn(&OperatorMeta) -> bool) -> Vec<&OperatorMeta> {
        self.iter().filter(|op| predicate(op)).collect()
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

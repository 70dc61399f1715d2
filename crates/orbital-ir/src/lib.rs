//! S-expression IR, operator registry and static validation for Orbital.
//!
//! This crate defines the expression language shared by schema guards and
//! effects, together with the catalog of every operator an expression may
//! call and the validator that checks an expression before it is registered.
//!
//! # S-expression format
//!
//! An S-expression is either:
//! - A literal value (null, bool, number, string, list, object)
//! - A binding reference: `"@entity.formValues.D1"`
//! - An operator call: `[operator_name, ...args]`
//! - A lambda literal: `["fn", "x", body]` or `["fn", ["acc", "x"], body]`
//!
//! Example:
//! ```json
//! ["and",
//!   [">", "@entity.age", 18],
//!   ["array/some", "@entity.roles", ["fn", "r", ["=", "@r", "admin"]]]
//! ]
//! ```

pub mod binding;
mod catalog;
pub mod operator;
mod registry;
pub mod rules;
mod sexpr;
pub mod validation;

pub use binding::{BindingError, BindingPath, BindingRoot, is_binding};
pub use operator::{
    ArityError, Category, OperatorKind, OperatorMeta, StdModule, get_function_from_operator,
    get_module_from_operator, make_std_operator,
};
pub use registry::{OperatorRegistry, RegistryError};
pub use rules::{CHECK_RULES, is_single_spec, rule_params};
pub use sexpr::{Lambda, LambdaError, Node, SExpr, json_number};
pub use validation::{
    ErrorCode, ValidationIssue, ValidationMode, ValidationResult, Validator,
    format_validation_errors, validate_effect, validate_guard, validate_sexpr,
};

#[cfg(test)]
mod tests;

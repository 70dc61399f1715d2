//! S-expression validation.
//!
//! Validation runs before an expression is registered as a guard or effect.
//! It never fails fast: every problem found is collected, in tree order,
//! into a [`ValidationResult`].

use crate::binding::{BindingPath, BindingRoot};
use crate::registry::OperatorRegistry;
use crate::rules::{is_single_spec, rule_params};
use crate::sexpr::{LAMBDA_OPERATOR, Lambda, Node, SExpr};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};

/// Operators whose first argument names a binding to write rather than read.
pub const TARGET_OPERATORS: &[&str] = &["set", "increment", "decrement"];

const LET_OPERATOR: &str = "let";
const CHECK_OPERATOR: &str = "validate/check";
const MAX_CONTEXT_LEN: usize = 80;

/// Which rules apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Pure predicates: any operator with side effects is rejected.
    Guard,
    /// Actions: side effects are permitted.
    Effect,
}

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    UnknownOperator,
    ArityMismatch,
    EffectInGuard,
    InvalidBinding,
    UnknownBindingRoot,
    InvalidLambda,
    ExpectedLambda,
    UnexpectedLambda,
    InvalidLet,
    InvalidTarget,
    UnknownRule,
    InvalidRule,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A single validation failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("[{code}] at {path}: {message}")]
pub struct ValidationIssue {
    pub code: ErrorCode,
    pub message: String,
    /// Location in the expression, e.g. `$[2][1]`
    pub path: String,
    /// Compact JSON of the offending node
    pub context: Option<String>,
}

/// Outcome of validating one expression. `valid` is true exactly when
/// `errors` is empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    valid: bool,
    errors: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn from_errors(errors: Vec<ValidationIssue>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn errors(&self) -> &[ValidationIssue] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<ValidationIssue> {
        self.errors
    }

    pub fn has_code(&self, code: ErrorCode) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }
}

/// Checks expressions against an operator registry.
#[derive(Debug, Clone, Copy)]
pub struct Validator<'r> {
    registry: &'r OperatorRegistry,
    mode: ValidationMode,
}

impl<'r> Validator<'r> {
    pub fn new(registry: &'r OperatorRegistry, mode: ValidationMode) -> Self {
        Self { registry, mode }
    }

    pub fn guard(registry: &'r OperatorRegistry) -> Self {
        Self::new(registry, ValidationMode::Guard)
    }

    pub fn effect(registry: &'r OperatorRegistry) -> Self {
        Self::new(registry, ValidationMode::Effect)
    }

    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    pub fn validate(&self, expr: &SExpr) -> ValidationResult {
        let mut walk = Walk {
            validator: self,
            errors: Vec::new(),
        };
        walk.visit(expr, "$", &[]);
        ValidationResult::from_errors(walk.errors)
    }
}

/// Validates known operators, arity and binding syntax, allowing effects.
pub fn validate_sexpr(expr: &SExpr, registry: &OperatorRegistry) -> ValidationResult {
    Validator::effect(registry).validate(expr)
}

/// Validates an expression for use as a guard.
pub fn validate_guard(expr: &SExpr, registry: &OperatorRegistry) -> ValidationResult {
    Validator::guard(registry).validate(expr)
}

/// Validates an expression for use as an effect.
pub fn validate_effect(expr: &SExpr, registry: &OperatorRegistry) -> ValidationResult {
    Validator::effect(registry).validate(expr)
}

/// Renders every error as one human-readable block.
pub fn format_validation_errors(result: &ValidationResult) -> String {
    if result.is_valid() {
        return "No validation errors".to_string();
    }
    let mut out = format!("{} validation error(s):", result.errors.len());
    for (i, issue) in result.errors.iter().enumerate() {
        let _ = write!(
            out,
            "\n  {}. [{}] {}: {}",
            i + 1,
            issue.code,
            issue.path,
            issue.message
        );
        if let Some(context) = &issue.context {
            let _ = write!(out, "\n     in: {context}");
        }
    }
    out
}

struct Walk<'v, 'r> {
    validator: &'v Validator<'r>,
    errors: Vec<ValidationIssue>,
}

impl Walk<'_, '_> {
    fn report(&mut self, code: ErrorCode, message: String, path: &str, node: &SExpr) {
        self.errors.push(ValidationIssue {
            code,
            message,
            path: path.to_string(),
            context: context_of(node),
        });
    }

    fn visit(&mut self, expr: &SExpr, path: &str, locals: &[&str]) {
        match expr.node() {
            Node::Literal(_) => {}
            Node::Binding(binding) => self.visit_binding(binding, expr, path, locals),
            Node::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    self.visit(item, &format!("{path}[{i}]"), locals);
                }
            }
            Node::Object(map) => {
                for (key, value) in map {
                    self.visit(value, &format!("{path}.{key}"), locals);
                }
            }
            Node::Call { operator, args } => self.visit_call(operator, args, expr, path, locals),
        }
    }

    fn visit_binding(&mut self, binding: &str, node: &SExpr, path: &str, locals: &[&str]) {
        match BindingPath::parse(binding) {
            Err(err) => self.report(ErrorCode::InvalidBinding, err.to_string(), path, node),
            Ok(parsed) => {
                if parsed.root().is_none() && !locals.contains(&parsed.head) {
                    let roots: Vec<_> = BindingRoot::ALL.iter().map(|r| r.as_str()).collect();
                    self.report(
                        ErrorCode::UnknownBindingRoot,
                        format!(
                            "binding root {:?} is not one of [{}] or a local in scope",
                            parsed.head,
                            roots.join(", ")
                        ),
                        path,
                        node,
                    );
                }
            }
        }
    }

    fn visit_call(
        &mut self,
        operator: &str,
        args: &[SExpr],
        node: &SExpr,
        path: &str,
        locals: &[&str],
    ) {
        let registry = self.validator.registry;
        let Some(meta) = registry.get(operator) else {
            self.report(
                ErrorCode::UnknownOperator,
                format!("unknown operator {operator:?}"),
                path,
                node,
            );
            return;
        };
        if let Err(err) = meta.check_arity(args.len()) {
            self.report(ErrorCode::ArityMismatch, err.to_string(), path, node);
            return;
        }
        if meta.side_effects && self.validator.mode == ValidationMode::Guard {
            self.report(
                ErrorCode::EffectInGuard,
                format!("operator {operator:?} has side effects and cannot be used in a guard"),
                path,
                node,
            );
        }

        match operator {
            LAMBDA_OPERATOR => {
                self.report(
                    ErrorCode::UnexpectedLambda,
                    "lambda is only allowed as the lambda argument of an operator that accepts one"
                        .to_string(),
                    path,
                    node,
                );
                self.visit_lambda(node, path, locals);
            }
            LET_OPERATOR => self.visit_let(args, node, path, locals),
            _ => {
                let lambda_position = meta.lambda_position();
                let quoted_position = meta.quoted_position();
                for (i, arg) in args.iter().enumerate() {
                    let arg_path = format!("{path}[{}]", i + 1);
                    if quoted_position == Some(i) {
                        if operator == CHECK_OPERATOR {
                            self.visit_rules(arg, &arg_path);
                        }
                        continue;
                    }
                    if lambda_position == Some(i) {
                        if arg.is_lambda() {
                            self.visit_lambda(arg, &arg_path, locals);
                        } else {
                            self.report(
                                ErrorCode::ExpectedLambda,
                                format!("{operator} expects a lambda literal at argument {}", i + 1),
                                &arg_path,
                                arg,
                            );
                            self.visit(arg, &arg_path, locals);
                        }
                    } else if i == 0 && TARGET_OPERATORS.contains(&operator) {
                        self.visit_target(operator, arg, &arg_path, locals);
                    } else {
                        self.visit(arg, &arg_path, locals);
                    }
                }
            }
        }
    }

    fn visit_lambda(&mut self, node: &SExpr, path: &str, locals: &[&str]) {
        let Some(parsed) = node.as_lambda() else {
            return;
        };
        match parsed {
            Err(err) => self.report(ErrorCode::InvalidLambda, err.to_string(), path, node),
            Ok(Lambda { params, body }) => {
                let mut scope = locals.to_vec();
                scope.extend(params);
                self.visit(body, &format!("{path}[2]"), &scope);
            }
        }
    }

    fn visit_let(&mut self, args: &[SExpr], node: &SExpr, path: &str, locals: &[&str]) {
        let [bindings, body] = args else {
            return;
        };
        let Some(pairs) = bindings.as_list() else {
            self.report(
                ErrorCode::InvalidLet,
                "let bindings must be a list of [name, value] pairs".to_string(),
                &format!("{path}[1]"),
                node,
            );
            return;
        };
        let mut scope = locals.to_vec();
        for (i, pair) in pairs.iter().enumerate() {
            let pair_path = format!("{path}[1][{i}]");
            match pair.as_list() {
                Some([SExpr::String(name), value]) if !name.is_empty() => {
                    self.visit(value, &format!("{pair_path}[1]"), &scope);
                    scope.push(name.strip_prefix('@').unwrap_or(name));
                }
                _ => self.report(
                    ErrorCode::InvalidLet,
                    "each let binding must be a [name, value] pair".to_string(),
                    &pair_path,
                    pair,
                ),
            }
        }
        self.visit(body, &format!("{path}[2]"), &scope);
    }

    fn visit_target(&mut self, operator: &str, target: &SExpr, path: &str, locals: &[&str]) {
        match target.node() {
            Node::Binding(binding) => self.visit_binding(binding, target, path, locals),
            _ => self.report(
                ErrorCode::InvalidTarget,
                format!("{operator} target must be a binding such as \"@entity.field\""),
                path,
                target,
            ),
        }
    }
}

impl Walk<'_, '_> {
    /// Checks the rule names of a literal `validate/check` rules object.
    /// Rules supplied through a binding or a call are only known at run time.
    fn visit_rules(&mut self, rules: &SExpr, path: &str) {
        let fields = match rules {
            SExpr::Object(fields) => fields,
            SExpr::Null => return,
            other => match other.node() {
                Node::Binding(_) | Node::Call { .. } => return,
                _ => {
                    self.report(
                        ErrorCode::InvalidRule,
                        "validate/check rules must be an object of field to rules".to_string(),
                        path,
                        other,
                    );
                    return;
                }
            },
        };
        for (field, specs) in fields {
            let field_path = format!("{path}.{field}");
            match specs {
                SExpr::List(items) if !is_single_spec(items.first().and_then(SExpr::as_str)) => {
                    for (i, spec) in items.iter().enumerate() {
                        self.visit_rule_spec(spec, &format!("{field_path}[{i}]"));
                    }
                }
                single => self.visit_rule_spec(single, &field_path),
            }
        }
    }

    fn visit_rule_spec(&mut self, spec: &SExpr, path: &str) {
        let name = match spec {
            SExpr::String(name) => name,
            SExpr::List(items) => match items.first() {
                Some(SExpr::String(name)) => name,
                _ => return self.report_bad_rule(spec, path),
            },
            _ => return self.report_bad_rule(spec, path),
        };
        if rule_params(name).is_none() {
            self.report(
                ErrorCode::UnknownRule,
                format!("unknown validation rule {name:?}"),
                path,
                spec,
            );
        }
    }

    fn report_bad_rule(&mut self, spec: &SExpr, path: &str) {
        self.report(
            ErrorCode::InvalidRule,
            "a rule is a name or a [name, ...params] list".to_string(),
            path,
            spec,
        );
    }
}

fn context_of(node: &SExpr) -> Option<String> {
    let mut text = serde_json::to_string(node).ok()?;
    if text.chars().count() > MAX_CONTEXT_LEN {
        text = text.chars().take(MAX_CONTEXT_LEN).collect::<String>() + "...";
    }
    Some(text)
}

//! S-expression types.

use crate::binding::is_binding;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Operator name of a lambda literal.
pub const LAMBDA_OPERATOR: &str = "fn";

/// An S-expression node.
///
/// This is the authored form of every guard and effect. It mirrors JSON
/// exactly so schemas can carry expressions verbatim:
///
/// ```
/// use orbital_ir::SExpr;
///
/// let expr: SExpr = serde_json::from_str(r#"["math/clamp", "@entity.hp", 0, 100]"#).unwrap();
/// assert_eq!(expr.operator(), Some("math/clamp"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SExpr {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<SExpr>),
    Object(BTreeMap<String, SExpr>),
}

/// Structural view of an expression, as the evaluator and validator see it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Node<'a> {
    /// null, bool, number, or a plain string.
    Literal(&'a SExpr),
    /// A string starting with `@`.
    Binding(&'a str),
    /// A list whose head is an operator name.
    Call {
        operator: &'a str,
        args: &'a [SExpr],
    },
    /// Any other list; its elements are expressions.
    List(&'a [SExpr]),
    /// An object literal; its values are expressions.
    Object(&'a BTreeMap<String, SExpr>),
}

/// A parsed lambda literal.
#[derive(Debug, Clone, PartialEq)]
pub struct Lambda<'a> {
    pub params: Vec<&'a str>,
    pub body: &'a SExpr,
}

/// Errors produced when a `fn` form is malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LambdaError {
    #[error("lambda must have exactly a parameter list and a body, got {0} argument(s)")]
    Shape(usize),

    #[error("lambda parameters must be a name or a list of names")]
    Params,

    #[error("lambda parameter names must not be empty")]
    EmptyParam,
}

impl SExpr {
    /// Creates an operator call.
    pub fn call(operator: impl Into<String>, args: Vec<SExpr>) -> SExpr {
        let mut list = Vec::with_capacity(args.len() + 1);
        list.push(SExpr::String(operator.into()));
        list.extend(args);
        SExpr::List(list)
    }

    /// Creates a lambda literal with the given parameter names.
    pub fn lambda(params: &[&str], body: SExpr) -> SExpr {
        let params = match params {
            [single] => SExpr::str(*single),
            many => SExpr::List(many.iter().map(|p| SExpr::str(*p)).collect()),
        };
        SExpr::call(LAMBDA_OPERATOR, vec![params, body])
    }

    /// Creates a string value.
    pub fn str(value: impl Into<String>) -> SExpr {
        SExpr::String(value.into())
    }

    /// Creates a number value.
    pub fn num(value: impl Into<f64>) -> SExpr {
        SExpr::Number(value.into())
    }

    /// Classifies this expression.
    pub fn node(&self) -> Node<'_> {
        match self {
            SExpr::String(s) if is_binding(s) => Node::Binding(s),
            SExpr::List(items) => match items.split_first() {
                Some((SExpr::String(head), args)) if !is_binding(head) => Node::Call {
                    operator: head,
                    args,
                },
                _ => Node::List(items),
            },
            SExpr::Object(map) => Node::Object(map),
            other => Node::Literal(other),
        }
    }

    /// Returns true if this is a null value.
    pub fn is_null(&self) -> bool {
        matches!(self, SExpr::Null)
    }

    /// Returns true if this is an operator call.
    pub fn is_call(&self) -> bool {
        matches!(self.node(), Node::Call { .. })
    }

    /// Returns true if this is a `["fn", ...]` form.
    pub fn is_lambda(&self) -> bool {
        self.operator() == Some(LAMBDA_OPERATOR)
    }

    /// Returns the operator name if this is an operator call.
    pub fn operator(&self) -> Option<&str> {
        match self.node() {
            Node::Call { operator, .. } => Some(operator),
            _ => None,
        }
    }

    /// Returns the arguments if this is an operator call.
    pub fn args(&self) -> Option<&[SExpr]> {
        match self.node() {
            Node::Call { args, .. } => Some(args),
            _ => None,
        }
    }

    /// Parses this expression as a lambda literal.
    ///
    /// Returns `None` when the expression is not a `fn` form at all.
    pub fn as_lambda(&self) -> Option<Result<Lambda<'_>, LambdaError>> {
        if !self.is_lambda() {
            return None;
        }
        self.args().map(Lambda::parse)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SExpr::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            SExpr::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SExpr::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[SExpr]> {
        match self {
            SExpr::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, SExpr>> {
        match self {
            SExpr::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Converts this expression to its JSON value without evaluating it.
    pub fn to_value(&self) -> Value {
        match self {
            SExpr::Null => Value::Null,
            SExpr::Bool(b) => Value::Bool(*b),
            SExpr::Number(n) => json_number(*n),
            SExpr::String(s) => Value::String(s.clone()),
            SExpr::List(items) => Value::Array(items.iter().map(SExpr::to_value).collect()),
            SExpr::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.to_value()))
                    .collect(),
            ),
        }
    }
}

impl<'a> Lambda<'a> {
    /// Parses the arguments of a `fn` form: a parameter name (or list of
    /// names) followed by the body.
    pub fn parse(args: &'a [SExpr]) -> Result<Self, LambdaError> {
        let [params, body] = args else {
            return Err(LambdaError::Shape(args.len()));
        };
        let params = match params {
            SExpr::String(name) => vec![param_name(name)?],
            SExpr::List(names) => names
                .iter()
                .map(|name| name.as_str().ok_or(LambdaError::Params).and_then(param_name))
                .collect::<Result<Vec<_>, _>>()?,
            _ => return Err(LambdaError::Params),
        };
        Ok(Lambda { params, body })
    }
}

// Parameters may be written with or without the binding prefix.
fn param_name(name: &str) -> Result<&str, LambdaError> {
    let name = name.strip_prefix('@').unwrap_or(name);
    if name.is_empty() {
        Err(LambdaError::EmptyParam)
    } else {
        Ok(name)
    }
}

/// Converts an `f64` to a JSON value, using an integer representation when
/// the value is integral. Non-finite values become `null`.
pub fn json_number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

impl Default for SExpr {
    fn default() -> Self {
        SExpr::Null
    }
}

impl From<Value> for SExpr {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => SExpr::Null,
            Value::Bool(b) => SExpr::Bool(b),
            Value::Number(n) => SExpr::Number(n.as_f64().unwrap_or_default()),
            Value::String(s) => SExpr::String(s),
            Value::Array(items) => SExpr::List(items.into_iter().map(SExpr::from).collect()),
            Value::Object(map) => {
                SExpr::Object(map.into_iter().map(|(k, v)| (k, SExpr::from(v))).collect())
            }
        }
    }
}

impl From<&SExpr> for Value {
    fn from(expr: &SExpr) -> Self {
        expr.to_value()
    }
}

impl From<bool> for SExpr {
    fn from(value: bool) -> Self {
        SExpr::Bool(value)
    }
}

impl From<i32> for SExpr {
    fn from(value: i32) -> Self {
        SExpr::Number(value.into())
    }
}

impl From<i64> for SExpr {
    fn from(value: i64) -> Self {
        SExpr::Number(value as f64)
    }
}

impl From<f64> for SExpr {
    fn from(value: f64) -> Self {
        SExpr::Number(value)
    }
}

impl From<&str> for SExpr {
    fn from(value: &str) -> Self {
        SExpr::String(value.to_string())
    }
}

impl From<String> for SExpr {
    fn from(value: String) -> Self {
        SExpr::String(value)
    }
}

impl From<Vec<SExpr>> for SExpr {
    fn from(value: Vec<SExpr>) -> Self {
        SExpr::List(value)
    }
}

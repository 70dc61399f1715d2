//! Operator metadata.
//!
//! Core operators (`if`, `+`, `set`, ...) have bare names. Standard library
//! operators are always namespaced as `module/function`.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Separator between a standard module name and its function name.
pub const MODULE_SEPARATOR: char = '/';

/// Standard library modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StdModule {
    Math,
    Str,
    Array,
    Object,
    Time,
    Validate,
    Format,
    Async,
    Tensor,
    Nn,
    Train,
}

impl StdModule {
    pub const ALL: [StdModule; 11] = [
        StdModule::Math,
        StdModule::Str,
        StdModule::Array,
        StdModule::Object,
        StdModule::Time,
        StdModule::Validate,
        StdModule::Format,
        StdModule::Async,
        StdModule::Tensor,
        StdModule::Nn,
        StdModule::Train,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StdModule::Math => "math",
            StdModule::Str => "str",
            StdModule::Array => "array",
            StdModule::Object => "object",
            StdModule::Time => "time",
            StdModule::Validate => "validate",
            StdModule::Format => "format",
            StdModule::Async => "async",
            StdModule::Tensor => "tensor",
            StdModule::Nn => "nn",
            StdModule::Train => "train",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == name)
    }
}

impl fmt::Display for StdModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operator category, used for grouping in listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Arithmetic,
    Comparison,
    Logic,
    Control,
    Effect,
    Module(StdModule),
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Arithmetic => f.write_str("arithmetic"),
            Category::Comparison => f.write_str("comparison"),
            Category::Logic => f.write_str("logic"),
            Category::Control => f.write_str("control"),
            Category::Effect => f.write_str("effect"),
            Category::Module(module) => write!(f, "{module}"),
        }
    }
}

/// Core operators carry no extra data; standard operators carry their
/// module, documented parameters, usage example, lambda position, and the
/// position of an argument taken as quoted data rather than evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OperatorKind {
    Core,
    Std {
        module: StdModule,
        params: &'static [&'static str],
        example: &'static str,
        lambda_position: Option<usize>,
        quoted_position: Option<usize>,
    },
}

/// Complete operator definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OperatorMeta {
    /// Operator name (e.g. `"if"`, `"math/clamp"`)
    pub name: &'static str,
    pub category: Category,
    pub min_arity: usize,
    /// `None` means unbounded
    pub max_arity: Option<usize>,
    pub side_effects: bool,
    pub description: &'static str,
    pub kind: OperatorKind,
}

impl OperatorMeta {
    pub(crate) const fn core(
        name: &'static str,
        category: Category,
        min_arity: usize,
        max_arity: Option<usize>,
        description: &'static str,
    ) -> Self {
        OperatorMeta {
            name,
            category,
            min_arity,
            max_arity,
            side_effects: matches!(category, Category::Effect),
            description,
            kind: OperatorKind::Core,
        }
    }

    pub(crate) const fn std(
        module: StdModule,
        name: &'static str,
        params: &'static [&'static str],
        min_arity: usize,
        max_arity: Option<usize>,
        description: &'static str,
    ) -> Self {
        OperatorMeta {
            name,
            category: Category::Module(module),
            min_arity,
            max_arity,
            side_effects: false,
            description,
            kind: OperatorKind::Std {
                module,
                params,
                example: "",
                lambda_position: None,
                quoted_position: None,
            },
        }
    }

    pub(crate) const fn with_lambda(self, position: usize) -> Self {
        let kind = match self.kind {
            OperatorKind::Std {
                module,
                params,
                example,
                quoted_position,
                ..
            } => OperatorKind::Std {
                module,
                params,
                example,
                lambda_position: Some(position),
                quoted_position,
            },
            OperatorKind::Core => OperatorKind::Core,
        };
        OperatorMeta { kind, ..self }
    }

    pub(crate) const fn with_example(self, example: &'static str) -> Self {
        let kind = match self.kind {
            OperatorKind::Std {
                module,
                params,
                lambda_position,
                quoted_position,
                ..
            } => OperatorKind::Std {
                module,
                params,
                example,
                lambda_position,
                quoted_position,
            },
            OperatorKind::Core => OperatorKind::Core,
        };
        OperatorMeta { kind, ..self }
    }

    /// Marks an argument as data: it is passed through as written.
    pub(crate) const fn with_quoted(self, position: usize) -> Self {
        let kind = match self.kind {
            OperatorKind::Std {
                module,
                params,
                example,
                lambda_position,
                ..
            } => OperatorKind::Std {
                module,
                params,
                example,
                lambda_position,
                quoted_position: Some(position),
            },
            OperatorKind::Core => OperatorKind::Core,
        };
        OperatorMeta { kind, ..self }
    }

    pub(crate) const fn effectful(self) -> Self {
        OperatorMeta {
            side_effects: true,
            ..self
        }
    }

    /// The standard module, or `None` for core operators.
    pub fn module(&self) -> Option<StdModule> {
        match self.kind {
            OperatorKind::Std { module, .. } => Some(module),
            OperatorKind::Core => None,
        }
    }

    pub fn is_core(&self) -> bool {
        matches!(self.kind, OperatorKind::Core)
    }

    pub fn accepts_lambda(&self) -> bool {
        self.lambda_position().is_some()
    }

    pub fn lambda_position(&self) -> Option<usize> {
        match self.kind {
            OperatorKind::Std {
                lambda_position, ..
            } => lambda_position,
            OperatorKind::Core => None,
        }
    }

    pub fn quoted_position(&self) -> Option<usize> {
        match self.kind {
            OperatorKind::Std {
                quoted_position, ..
            } => quoted_position,
            OperatorKind::Core => None,
        }
    }

    pub fn params(&self) -> &'static [&'static str] {
        match self.kind {
            OperatorKind::Std { params, .. } => params,
            OperatorKind::Core => &[],
        }
    }

    pub fn example(&self) -> Option<&'static str> {
        match self.kind {
            OperatorKind::Std { example, .. } if !example.is_empty() => Some(example),
            _ => None,
        }
    }

    /// Returns the function name (suffix after the module separator).
    pub fn function_name(&self) -> &'static str {
        get_function_from_operator(self.name)
    }

    /// Checks an argument count against `[min_arity, max_arity]`.
    pub fn check_arity(&self, argc: usize) -> Result<(), ArityError> {
        let too_many = self.max_arity.is_some_and(|max| argc > max);
        if argc < self.min_arity || too_many {
            return Err(ArityError {
                operator: self.name.to_string(),
                min: self.min_arity,
                max: self.max_arity,
                got: argc,
            });
        }
        Ok(())
    }
}

/// An argument count outside an operator's permitted range.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operator} expects {} argument(s), got {got}", expected_arity(.min, .max))]
pub struct ArityError {
    pub operator: String,
    pub min: usize,
    pub max: Option<usize>,
    pub got: usize,
}

fn expected_arity(min: &usize, max: &Option<usize>) -> String {
    match *max {
        Some(max) if max == *min => format!("{min}"),
        Some(max) => format!("{min} to {max}"),
        None => format!("at least {min}"),
    }
}

/// Builds a namespaced standard operator name.
pub fn make_std_operator(module: StdModule, function: &str) -> String {
    format!("{}{MODULE_SEPARATOR}{function}", module.as_str())
}

/// Returns the standard module an operator name belongs to.
pub fn get_module_from_operator(name: &str) -> Option<StdModule> {
    let (module, _) = name.split_once(MODULE_SEPARATOR)?;
    StdModule::from_name(module)
}

/// Returns the function part of an operator name (the whole name for core operators).
pub fn get_function_from_operator(name: &str) -> &str {
    name.split_once(MODULE_SEPARATOR)
        .map_or(name, |(_, function)| function)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_round_trip() {
        for module in StdModule::ALL {
            for function in ["clamp", "x", "nested/name", ""] {
                let name = make_std_operator(module, function);
                assert_eq!(get_module_from_operator(&name), Some(module));
            }
        }
    }

    #[test]
    fn test_core_names_have_no_module() {
        assert_eq!(get_module_from_operator("if"), None);
        assert_eq!(get_module_from_operator("+"), None);
        assert_eq!(get_module_from_operator("bogus/fn"), None);
        assert_eq!(get_function_from_operator("if"), "if");
        assert_eq!(get_function_from_operator("math/clamp"), "clamp");
    }

    #[test]
    fn test_arity_error_messages() {
        let exact = OperatorMeta::std(StdModule::Math, "math/clamp", &[], 3, Some(3), "");
        let err = exact.check_arity(2).unwrap_err();
        assert_eq!(err.to_string(), "math/clamp expects 3 argument(s), got 2");

        let ranged = OperatorMeta::std(StdModule::Math, "math/round", &[], 1, Some(2), "");
        assert_eq!(
            ranged.check_arity(3).unwrap_err().to_string(),
            "math/round expects 1 to 2 argument(s), got 3"
        );

        let open = OperatorMeta::core("and", Category::Logic, 2, None, "");
        assert!(open.check_arity(50).is_ok());
        assert_eq!(
            open.check_arity(1).unwrap_err().to_string(),
            "and expects at least 2 argument(s), got 1"
        );
    }

    #[test]
    fn test_builder_flags() {
        let op = OperatorMeta::std(StdModule::Array, "array/map", &["items", "fn"], 2, Some(2), "")
            .with_lambda(1)
            .with_example(r#"["array/map", [1, 2], ["fn", "x", ["*", "@x", 2]]]"#);
        assert!(op.accepts_lambda());
        assert_eq!(op.lambda_position(), Some(1));
        assert!(op.example().is_some());
        assert!(!op.side_effects);
        assert!(op.effectful().side_effects);

        let effect = OperatorMeta::core("emit", Category::Effect, 1, Some(2), "");
        assert!(effect.side_effects);
        assert!(effect.is_core());
    }
}

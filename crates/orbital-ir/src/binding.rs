//! Binding reference syntax.
//!
//! A binding is a string of the form `@root.path.to.field`. The root is
//! either one of the fixed [`BindingRoot`]s supplied by the embedding runtime
//! or a lexical local introduced by `let` or a lambda parameter.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Prefix that marks a string as a binding reference.
pub const BINDING_PREFIX: char = '@';

/// Returns true if the string is a binding reference.
pub fn is_binding(s: &str) -> bool {
    s.starts_with(BINDING_PREFIX)
}

/// The fixed set of data sources an expression can address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingRoot {
    Entity,
    Payload,
    State,
    Config,
    Now,
    User,
}

impl BindingRoot {
    pub const ALL: [BindingRoot; 6] = [
        BindingRoot::Entity,
        BindingRoot::Payload,
        BindingRoot::State,
        BindingRoot::Config,
        BindingRoot::Now,
        BindingRoot::User,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BindingRoot::Entity => "entity",
            BindingRoot::Payload => "payload",
            BindingRoot::State => "state",
            BindingRoot::Config => "config",
            BindingRoot::Now => "now",
            BindingRoot::User => "user",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|root| root.as_str() == name)
    }
}

impl fmt::Display for BindingRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Syntax errors in a binding string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    #[error("binding {0:?} must start with '@'")]
    MissingPrefix(String),

    #[error("binding {0:?} has no root name")]
    EmptyRoot(String),

    #[error("binding {0:?} contains an empty path segment")]
    EmptySegment(String),
}

/// A parsed binding: the head name followed by field segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingPath<'a> {
    pub head: &'a str,
    pub segments: Vec<&'a str>,
}

impl<'a> BindingPath<'a> {
    /// Parses `@head.seg1.seg2`.
    pub fn parse(binding: &'a str) -> Result<Self, BindingError> {
        let Some(path) = binding.strip_prefix(BINDING_PREFIX) else {
            return Err(BindingError::MissingPrefix(binding.to_string()));
        };
        let mut parts = path.split('.');
        let head = parts.next().unwrap_or_default();
        if head.is_empty() {
            return Err(BindingError::EmptyRoot(binding.to_string()));
        }
        let segments: Vec<&str> = parts.collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(BindingError::EmptySegment(binding.to_string()));
        }
        Ok(BindingPath { head, segments })
    }

    /// The fixed root this path addresses, if the head names one.
    pub fn root(&self) -> Option<BindingRoot> {
        BindingRoot::from_name(self.head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_path() {
        let path = BindingPath::parse("@entity.formValues.D1").unwrap();
        assert_eq!(path.head, "entity");
        assert_eq!(path.segments, vec!["formValues", "D1"]);
        assert_eq!(path.root(), Some(BindingRoot::Entity));
    }

    #[test]
    fn test_parse_local_head() {
        let path = BindingPath::parse("@item.price").unwrap();
        assert_eq!(path.head, "item");
        assert_eq!(path.root(), None);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            BindingPath::parse("entity.x"),
            Err(BindingError::MissingPrefix(_))
        ));
        assert!(matches!(
            BindingPath::parse("@"),
            Err(BindingError::EmptyRoot(_))
        ));
        assert!(matches!(
            BindingPath::parse("@.x"),
            Err(BindingError::EmptyRoot(_))
        ));
        assert!(matches!(
            BindingPath::parse("@entity..x"),
            Err(BindingError::EmptySegment(_))
        ));
    }

    #[test]
    fn test_root_names_round_trip() {
        for root in BindingRoot::ALL {
            assert_eq!(BindingRoot::from_name(root.as_str()), Some(root));
        }
        assert_eq!(BindingRoot::from_name("session"), None);
    }
}

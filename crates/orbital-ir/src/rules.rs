//! Rule names accepted inside a `validate/check` rules object.
//!
//! A field maps to either one rule spec or a list of specs. A spec is a
//! rule name (`"email"`) or a name followed by its parameters
//! (`["minLength", 2]`).

/// Every rule with the number of parameters it takes after the value.
/// Each one is also callable directly as `validate/<name>`.
pub const CHECK_RULES: &[(&str, usize)] = &[
    ("required", 0),
    ("string", 0),
    ("number", 0),
    ("boolean", 0),
    ("array", 0),
    ("object", 0),
    ("integer", 0),
    ("positive", 0),
    ("email", 0),
    ("url", 0),
    ("phone", 0),
    ("date", 0),
    ("minLength", 1),
    ("maxLength", 1),
    ("min", 1),
    ("max", 1),
    ("range", 2),
    ("pattern", 1),
    ("oneOf", 1),
    ("equals", 1),
    ("creditCard", 0),
];

/// Parameter count of a rule, or `None` for an unknown name.
pub fn rule_params(name: &str) -> Option<usize> {
    CHECK_RULES
        .iter()
        .find(|(rule, _)| *rule == name)
        .map(|(_, params)| *params)
}

/// Whether a field's list of rules is itself a single spec.
///
/// A list headed by a rule that takes parameters is one spec, so
/// `["equals", "required"]` compares against the string `"required"` and
/// `["min", 18]` is one bound. Any other list is a list of specs:
/// `["required", "email"]` or `[["minLength", 2], "string"]`.
pub fn is_single_spec(head: Option<&str>) -> bool {
    head.and_then(rule_params).is_some_and(|params| params > 0)
}

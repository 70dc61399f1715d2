//! Tests for orbital-ir.

use crate::{Lambda, LambdaError, Node, OperatorRegistry, SExpr, json_number};
use serde_json::{Value, json};

#[test]
fn test_sexpr_constructors() {
    assert!(SExpr::default().is_null());
    assert_eq!(SExpr::from(true).as_bool(), Some(true));
    assert_eq!(SExpr::num(42).as_number(), Some(42.0));
    assert_eq!(SExpr::str("hello").as_str(), Some("hello"));

    // Wrong type returns None
    assert_eq!(SExpr::from(true).as_number(), None);
    assert_eq!(SExpr::num(42.0).as_str(), None);
}

#[test]
fn test_sexpr_call() {
    let expr = SExpr::call("math/clamp", vec!["@entity.hp".into(), 0.into(), 100.into()]);

    assert!(expr.is_call());
    assert_eq!(expr.operator(), Some("math/clamp"));

    let args = expr.args().unwrap();
    assert_eq!(args.len(), 3);
    assert_eq!(args[0].as_str(), Some("@entity.hp"));
    assert_eq!(args[2].as_number(), Some(100.0));
}

#[test]
fn test_sexpr_from_json() {
    let expr: SExpr = serde_json::from_value(json!([
        "if",
        [">", "@entity.age", 18],
        {"label": "adult"},
        null
    ]))
    .unwrap();

    assert_eq!(expr.operator(), Some("if"));
    let args = expr.args().unwrap();
    assert!(args[1].as_object().is_some());
    assert!(args[2].is_null());
    assert_eq!(Value::from(&expr), expr.to_value());
}

#[test]
fn test_node_classification() {
    let binding = SExpr::str("@entity.name");
    assert_eq!(binding.node(), Node::Binding("@entity.name"));

    let plain = SExpr::str("hello");
    assert!(matches!(plain.node(), Node::Literal(_)));

    // A list whose head is a binding or a number is a literal list.
    let bound_head = SExpr::from(json!(["@entity.a", 1]));
    assert!(matches!(bound_head.node(), Node::List(items) if items.len() == 2));
    let numbers = SExpr::from(json!([1, 2, 3]));
    assert!(matches!(numbers.node(), Node::List(_)));
    let empty = SExpr::from(json!([]));
    assert!(matches!(empty.node(), Node::List(items) if items.is_empty()));

    let object = SExpr::from(json!({"a": 1}));
    assert!(matches!(object.node(), Node::Object(map) if map.len() == 1));
}

#[test]
fn test_lambda_parse() {
    let single = SExpr::lambda(&["x"], SExpr::from(json!(["*", "@x", 2])));
    assert!(single.is_lambda());
    let lambda = single.as_lambda().unwrap().unwrap();
    assert_eq!(lambda.params, vec!["x"]);
    assert_eq!(lambda.body.operator(), Some("*"));

    let pair = SExpr::from(json!(["fn", ["@acc", "item"], ["+", "@acc", "@item"]]));
    let lambda = pair.as_lambda().unwrap().unwrap();
    assert_eq!(lambda.params, vec!["acc", "item"]);

    assert_eq!(SExpr::str("fn").as_lambda(), None);
}

#[test]
fn test_lambda_errors() {
    let args = [SExpr::str("x")];
    assert_eq!(Lambda::parse(&args), Err(LambdaError::Shape(1)));

    let args = [SExpr::num(1), SExpr::Null];
    assert_eq!(Lambda::parse(&args), Err(LambdaError::Params));

    let args = [SExpr::from(json!(["a", 2])), SExpr::Null];
    assert_eq!(Lambda::parse(&args), Err(LambdaError::Params));

    let args = [SExpr::str("@"), SExpr::Null];
    assert_eq!(Lambda::parse(&args), Err(LambdaError::EmptyParam));
}

#[test]
fn test_json_number() {
    assert_eq!(json_number(100.0), json!(100));
    assert_eq!(json_number(-3.0), json!(-3));
    assert_eq!(json_number(2.5), json!(2.5));
    assert_eq!(json_number(f64::NAN), json!(null));
    assert_eq!(json_number(f64::INFINITY), json!(null));
}

#[test]
fn test_integral_literals_survive_round_trip() {
    let expr = SExpr::from(json!(["math/clamp", 150, 0, 100]));
    assert_eq!(expr.to_value(), json!(["math/clamp", 150, 0, 100]));
}

#[test]
fn test_catalog_examples_validate() {
    let registry = OperatorRegistry::standard();
    for op in registry.iter() {
        let Some(example) = op.example() else {
            continue;
        };
        let expr: SExpr = serde_json::from_str(example)
            .unwrap_or_else(|e| panic!("{} example does not parse: {e}", op.name));
        assert_eq!(expr.operator(), Some(op.name), "{} example calls another operator", op.name);
        let result = crate::validate_sexpr(&expr, &registry);
        assert!(
            result.is_valid(),
            "{} example is invalid: {}",
            op.name,
            crate::format_validation_errors(&result)
        );
    }
}

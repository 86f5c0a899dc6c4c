//! Property tests: printing a well-formed tree and reparsing it yields
//! the same tree, and number literals survive exactly.

use proptest::prelude::*;

use gridform_common::Value;
use gridform_parse::ast::{ArithOp, CmpOp, Expr, LogicOp};
use gridform_parse::traits::{Function, FunctionProvider};
use gridform_parse::{canonical_formula, parse_with};
use std::sync::Arc;

struct EmptyProvider;

impl FunctionProvider for EmptyProvider {
    fn lookup(&self, _name: &str) -> Option<Arc<dyn Function>> {
        None
    }
    fn names(&self) -> Vec<&'static str> {
        Vec::new()
    }
}

/// Non-negative numeric literals with two decimals; negative numbers
/// would print as unary minus and reparse as `Sub(0, n)`.
fn num_lit() -> impl Strategy<Value = Expr> {
    (0u32..=99_999).prop_map(|i| Expr::Lit(Value::Number(f64::from(i) / 100.0)))
}

fn bool_lit() -> impl Strategy<Value = Expr> {
    any::<bool>().prop_map(|b| Expr::Lit(Value::Bool(b)))
}

fn text_lit() -> impl Strategy<Value = Expr> {
    "[a-zA-Z0-9 ]{0,12}".prop_map(|s| Expr::Lit(Value::Text(s)))
}

/// Numeric-category expressions.
fn numeric_expr() -> impl Strategy<Value = Expr> {
    num_lit().prop_recursive(4, 32, 4, |inner| {
        (
            prop_oneof![
                Just(ArithOp::Add),
                Just(ArithOp::Sub),
                Just(ArithOp::Mul),
                Just(ArithOp::Div),
            ],
            inner.clone(),
            inner,
        )
            .prop_map(|(op, lhs, rhs)| Expr::Arith {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            })
    })
}

/// Boolean-category expressions.
fn bool_expr() -> impl Strategy<Value = Expr> {
    let cmp = (
        prop_oneof![
            Just(CmpOp::Lt),
            Just(CmpOp::Le),
            Just(CmpOp::Gt),
            Just(CmpOp::Ge),
        ],
        numeric_expr(),
        numeric_expr(),
    )
        .prop_map(|(op, lhs, rhs)| Expr::Cmp {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        });
    let eq = (prop_oneof![Just(CmpOp::Eq), Just(CmpOp::Ne)], text_lit(), text_lit())
        .prop_map(|(op, lhs, rhs)| Expr::Cmp {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        });

    prop_oneof![bool_lit(), cmp, eq].prop_recursive(3, 24, 3, |inner| {
        prop_oneof![
            inner.clone().prop_map(|e| Expr::Not(Box::new(e))),
            (
                prop_oneof![Just(LogicOp::And), Just(LogicOp::Or)],
                inner.clone(),
                inner,
            )
                .prop_map(|(op, lhs, rhs)| Expr::Logic {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                }),
        ]
    })
}

fn well_formed_expr() -> impl Strategy<Value = Expr> {
    prop_oneof![
        numeric_expr(),
        bool_expr(),
        (bool_expr(), numeric_expr(), numeric_expr()).prop_map(|(c, t, f)| Expr::If {
            cond: Box::new(c),
            then: Box::new(t),
            otherwise: Box::new(f),
        }),
    ]
}

proptest! {
    #[test]
    fn print_then_parse_is_identity(expr in well_formed_expr()) {
        let printed = canonical_formula(&expr);
        let reparsed = parse_with(&printed, &EmptyProvider)
            .unwrap_or_else(|e| panic!("'{printed}' failed to parse: {e}"));
        prop_assert_eq!(&reparsed, &expr, "printed as {}", printed);
    }

    #[test]
    fn number_literals_round_trip_exactly(n in 0u64..=10_000_000) {
        let value = n as f64 / 1000.0;
        let expr = Expr::Lit(Value::Number(value));
        let printed = canonical_formula(&expr);
        let reparsed = parse_with(&printed, &EmptyProvider).unwrap();
        prop_assert_eq!(reparsed, expr);
    }
}

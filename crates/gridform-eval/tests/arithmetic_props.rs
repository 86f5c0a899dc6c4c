//! Property tests for the arithmetic laws on reference-free expressions.

use proptest::prelude::*;

use gridform_common::{FixedClock, Value};
use gridform_eval::{Interpreter, Workbook, parse_formula};

fn eval_num(formula: &str) -> f64 {
    let wb = Workbook::new().with_sheet("Sheet1");
    let clock = FixedClock::at_ymd(2024, 1, 1);
    let expr = parse_formula(formula).unwrap();
    match Interpreter::new(&wb, "Sheet1", &clock).evaluate(&expr).unwrap() {
        Value::Number(n) => n,
        other => panic!("expected number, got {other:?}"),
    }
}

/// Small integers keep every product exact in f64, so the laws hold to
/// equality rather than within an epsilon.
fn small() -> impl Strategy<Value = i32> {
    0..=1000i32
}

proptest! {
    #[test]
    fn addition_commutes(a in small(), b in small()) {
        prop_assert_eq!(eval_num(&format!("={a}+{b}")), eval_num(&format!("={b}+{a}")));
    }

    #[test]
    fn multiplication_commutes(a in small(), b in small()) {
        prop_assert_eq!(eval_num(&format!("={a}*{b}")), eval_num(&format!("={b}*{a}")));
    }

    #[test]
    fn addition_associates(a in small(), b in small(), c in small()) {
        prop_assert_eq!(
            eval_num(&format!("=({a}+{b})+{c}")),
            eval_num(&format!("={a}+({b}+{c})"))
        );
    }

    #[test]
    fn multiplication_associates(a in small(), b in small(), c in small()) {
        prop_assert_eq!(
            eval_num(&format!("=({a}*{b})*{c}")),
            eval_num(&format!("={a}*({b}*{c})"))
        );
    }

    #[test]
    fn additive_and_multiplicative_identities(a in small()) {
        prop_assert_eq!(eval_num(&format!("={a}+0")), a as f64);
        prop_assert_eq!(eval_num(&format!("={a}*1")), a as f64);
    }

    #[test]
    fn multiplication_distributes(a in small(), b in small(), c in small()) {
        prop_assert_eq!(
            eval_num(&format!("={a}*({b}+{c})")),
            eval_num(&format!("={a}*{b}+{a}*{c}"))
        );
    }
}

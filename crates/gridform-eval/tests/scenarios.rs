//! End-to-end scenarios: parse with the default registry, evaluate
//! against a small workbook, recalculate whole sheets.

use gridform_common::{
    ARef, CellValue, ErrorKind, EvalError, FixedClock, Value, parse_a1_anchored,
};
use gridform_eval::{
    Interpreter, Workbook, canonical_formula, default_registry, evaluate_formula, parse_formula,
    recalculate_sheet,
};

fn addr(a1: &str) -> ARef {
    parse_a1_anchored(a1).unwrap().0
}

/// A1=10, A2=20, A3=30, B1="Apple", B2="Banana", C1=2, C2=3.
fn sample() -> Workbook {
    Workbook::new()
        .with_cell("Sheet1", "A1", CellValue::Number(10.0))
        .with_cell("Sheet1", "A2", CellValue::Number(20.0))
        .with_cell("Sheet1", "A3", CellValue::Number(30.0))
        .with_cell("Sheet1", "B1", CellValue::Text("Apple".into()))
        .with_cell("Sheet1", "B2", CellValue::Text("Banana".into()))
        .with_cell("Sheet1", "C1", CellValue::Number(2.0))
        .with_cell("Sheet1", "C2", CellValue::Number(3.0))
}

fn clock() -> FixedClock {
    FixedClock::at_ymd(2024, 6, 15)
}

fn eval(wb: &Workbook, formula: &str) -> Result<Value, EvalError> {
    let expr = parse_formula(formula).expect("parses");
    Interpreter::new(wb, "Sheet1", &clock()).evaluate(&expr)
}

#[test]
fn the_reference_scenarios() {
    let wb = sample();
    assert_eq!(eval(&wb, "=SUM(A1:A3)").unwrap(), Value::Number(60.0));
    assert_eq!(eval(&wb, "=AVERAGE(A1:A3)").unwrap(), Value::Number(20.0));
    assert_eq!(
        eval(&wb, "=IF(A1>A2, \"up\", \"down\")").unwrap(),
        Value::Text("down".into())
    );
    assert_eq!(
        eval(&wb, "=VLOOKUP(\"Apple\", B1:C2, 2, FALSE)").unwrap(),
        Value::Number(2.0)
    );
    assert_eq!(
        eval(&wb, "=XLOOKUP(\"Cherry\", B1:B2, C1:C2, \"missing\")").unwrap(),
        Value::Text("missing".into())
    );
}

#[test]
fn division_by_zero_names_both_operands() {
    let wb = sample();
    match eval(&wb, "=10/(A1-A1)").unwrap_err() {
        EvalError::DivByZero {
            numerator,
            denominator,
        } => {
            assert_eq!(numerator, "10");
            assert_eq!(denominator, "A1-A1");
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn rate_scenarios() {
    let wb = sample();
    match eval(&wb, "=RATE(10, -100, 1000)").unwrap() {
        Value::Number(rate) => assert!(rate.abs() < 1e-6, "rate was {rate}"),
        other => panic!("unexpected: {other:?}"),
    }
    let err = eval(&wb, "=RATE(10, 0, 1000)").unwrap_err();
    assert!(err.to_string().contains("RATE did not converge"));
}

#[test]
fn precedence_evaluates_correctly() {
    let wb = sample();
    assert_eq!(eval(&wb, "=1+2*3").unwrap(), Value::Number(7.0));
    assert_eq!(eval(&wb, "=(1+2)*3").unwrap(), Value::Number(9.0));
    assert_eq!(eval(&wb, "=NOT TRUE AND FALSE").unwrap(), Value::Bool(false));
}

#[test]
fn arithmetic_ring_laws_hold_on_literals() {
    let wb = Workbook::new().with_sheet("Sheet1");
    let pairs = [
        ("=2+3", "=3+2"),
        ("=2*3", "=3*2"),
        ("=(1+2)+3", "=1+(2+3)"),
        ("=(2*3)*4", "=2*(3*4)"),
        ("=5+0", "=5"),
        ("=5*1", "=5"),
        ("=2*(3+4)", "=2*3+2*4"),
    ];
    for (left, right) in pairs {
        assert_eq!(
            eval(&wb, left).unwrap(),
            eval(&wb, right).unwrap(),
            "{left} vs {right}"
        );
    }
}

#[test]
fn short_circuit_never_touches_the_skipped_side() {
    let wb = sample();
    // Z9 is empty: a strict boolean decode there would be a RefError.
    assert_eq!(eval(&wb, "=FALSE AND Z9").unwrap(), Value::Bool(false));
    assert_eq!(eval(&wb, "=TRUE OR Z9").unwrap(), Value::Bool(true));
    assert!(eval(&wb, "=TRUE AND Z9").is_err());
}

#[test]
fn cross_sheet_references() {
    let mut wb = sample();
    wb.set_a1("Rates", "A1", CellValue::Number(0.05));
    assert_eq!(eval(&wb, "=Rates!A1*100").unwrap(), Value::Number(5.0));
    assert_eq!(eval(&wb, "=SUM(Rates!A1:A2)").unwrap(), Value::Number(0.05));

    let err = eval(&wb, "=Missing!A1").unwrap_err();
    assert!(matches!(err, EvalError::RefError { .. }));
}

#[test]
fn bare_range_folds_like_sum() {
    let wb = sample();
    assert_eq!(eval(&wb, "=A1:A3").unwrap(), Value::Number(60.0));
}

#[test]
fn formula_cells_decode_through_their_cache() {
    let mut wb = sample();
    wb.set_a1(
        "Sheet1",
        "D1",
        CellValue::formula("=A1+A2", Some(CellValue::Number(30.0))),
    );
    assert_eq!(eval(&wb, "=D1*2").unwrap(), Value::Number(60.0));

    // Uncached formula in a numeric context fails to decode.
    wb.set_a1("Sheet1", "D2", CellValue::formula("=A1", None));
    assert!(matches!(
        eval(&wb, "=D2*2").unwrap_err(),
        EvalError::CodecFailed { .. }
    ));
}

#[test]
fn evaluate_formula_surfaces_xlerror_with_the_source() {
    let wb = sample();
    let err = evaluate_formula(&wb, "Sheet1", "=10/0", &clock()).unwrap_err();
    assert!(err.to_string().contains("division by zero"));
    assert_eq!(err.formula.as_deref(), Some("=10/0"));

    let err = evaluate_formula(&wb, "Sheet1", "=NOSUCH(1)", &clock()).unwrap_err();
    assert!(err.message.contains("unknown function"));
}

#[test]
fn reference_formulas_round_trip_through_the_printer() {
    for formula in [
        "=SUM(A1:A3)",
        "=VLOOKUP(\"Apple\",B1:C2,2,FALSE)",
        "=IF(A1>A2,\"up\",\"down\")",
        "=SUMIF(A1:A3,\">15\")",
        "=Rates!A1*100",
        "=XLOOKUP(\"x\",B1:B2,C1:C2,\"missing\")",
    ] {
        let first = parse_formula(formula).unwrap();
        let printed = canonical_formula(&first);
        let second = parse_formula(&printed).unwrap();
        assert_eq!(first, second, "{formula} -> {printed}");
    }
}

/* ───────────────────────── recalculation ───────────────────────── */

#[test]
fn recalculation_orders_by_dependency() {
    let mut wb = Workbook::new();
    wb.set_a1("Sheet1", "A1", CellValue::Number(5.0));
    // Declared out of dependency order on purpose.
    wb.set_a1("Sheet1", "B1", CellValue::formula("=C1+1", None));
    wb.set_a1("Sheet1", "C1", CellValue::formula("=A1*2", None));

    let result = recalculate_sheet(&wb, "Sheet1", &clock(), default_registry()).unwrap();
    assert!(result.issues.is_empty(), "{:?}", result.issues);

    match result.sheet.get(addr("C1")).unwrap() {
        CellValue::Formula { cached, .. } => {
            assert_eq!(cached.as_deref(), Some(&CellValue::Number(10.0)));
        }
        other => panic!("unexpected: {other:?}"),
    }
    match result.sheet.get(addr("B1")).unwrap() {
        CellValue::Formula { cached, .. } => {
            assert_eq!(cached.as_deref(), Some(&CellValue::Number(11.0)));
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn recalculation_sees_through_ranges() {
    let mut wb = Workbook::new();
    wb.set_a1("Sheet1", "A1", CellValue::Number(1.0));
    wb.set_a1("Sheet1", "A2", CellValue::formula("=A1+1", None));
    wb.set_a1("Sheet1", "A3", CellValue::formula("=SUM(A1:A2)", None));

    let result = recalculate_sheet(&wb, "Sheet1", &clock(), default_registry()).unwrap();
    assert!(result.issues.is_empty());
    match result.sheet.get(addr("A3")).unwrap() {
        CellValue::Formula { cached, .. } => {
            assert_eq!(cached.as_deref(), Some(&CellValue::Number(3.0)));
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn recalculated_sheets_feed_back_into_the_workbook() {
    let mut wb = Workbook::new();
    wb.set_a1("Sheet1", "A1", CellValue::Number(21.0));
    wb.set_a1("Sheet1", "B1", CellValue::formula("=A1*2", None));

    let result = recalculate_sheet(&wb, "Sheet1", &clock(), default_registry()).unwrap();
    wb.replace_sheet("Sheet1", result.sheet);

    // Downstream consumers read the refreshed cache through the decoder.
    assert_eq!(eval(&wb, "=B1+1").unwrap(), Value::Number(43.0));
}

#[test]
fn cycles_keep_stale_caches_and_do_not_abort_the_rest() {
    let mut wb = Workbook::new();
    wb.set_a1(
        "Sheet1",
        "A1",
        CellValue::formula("=B1", Some(CellValue::Number(99.0))),
    );
    wb.set_a1("Sheet1", "B1", CellValue::formula("=C1", None));
    wb.set_a1("Sheet1", "C1", CellValue::formula("=A1", None));
    // An innocent bystander still recalculates.
    wb.set_a1("Sheet1", "D1", CellValue::formula("=1+1", None));

    let result = recalculate_sheet(&wb, "Sheet1", &clock(), default_registry()).unwrap();

    let cyclic: Vec<_> = result
        .issues
        .iter()
        .filter(|i| i.error.message.contains("circular reference"))
        .collect();
    assert_eq!(cyclic.len(), 3, "{:?}", result.issues);
    for issue in &cyclic {
        assert!(issue.error.message.contains("A1"));
    }

    // The stale cache survives untouched.
    match result.sheet.get(addr("A1")).unwrap() {
        CellValue::Formula { cached, .. } => {
            assert_eq!(cached.as_deref(), Some(&CellValue::Number(99.0)));
        }
        other => panic!("unexpected: {other:?}"),
    }

    // D1 still computed.
    match result.sheet.get(addr("D1")).unwrap() {
        CellValue::Formula { cached, .. } => {
            assert_eq!(cached.as_deref(), Some(&CellValue::Number(2.0)));
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn self_loops_are_cycles() {
    let mut wb = Workbook::new();
    wb.set_a1("Sheet1", "A1", CellValue::formula("=A1+1", None));
    let result = recalculate_sheet(&wb, "Sheet1", &clock(), default_registry()).unwrap();
    assert_eq!(result.issues.len(), 1);
    assert!(result.issues[0].error.message.contains("circular reference"));
}

#[test]
fn failing_cells_drop_their_cache_but_others_proceed() {
    let mut wb = Workbook::new();
    wb.set_a1(
        "Sheet1",
        "A1",
        CellValue::formula("=1/0", Some(CellValue::Number(123.0))),
    );
    wb.set_a1("Sheet1", "B1", CellValue::formula("=2+2", None));

    let result = recalculate_sheet(&wb, "Sheet1", &clock(), default_registry()).unwrap();
    assert_eq!(result.issues.len(), 1);
    assert_eq!(result.issues[0].addr, addr("A1"));

    match result.sheet.get(addr("A1")).unwrap() {
        CellValue::Formula { cached, .. } => assert!(cached.is_none()),
        other => panic!("unexpected: {other:?}"),
    }
    match result.sheet.get(addr("B1")).unwrap() {
        CellValue::Formula { cached, .. } => {
            assert_eq!(cached.as_deref(), Some(&CellValue::Number(4.0)));
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn unparsable_formulas_are_reported_per_cell() {
    let mut wb = Workbook::new();
    wb.set_a1(
        "Sheet1",
        "A1",
        CellValue::formula("=NOSUCHFN(", Some(CellValue::Number(1.0))),
    );
    wb.set_a1("Sheet1", "B1", CellValue::formula("=41+1", None));

    let result = recalculate_sheet(&wb, "Sheet1", &clock(), default_registry()).unwrap();
    assert_eq!(result.issues.len(), 1);
    match result.sheet.get(addr("A1")).unwrap() {
        CellValue::Formula { cached, .. } => assert!(cached.is_none()),
        other => panic!("unexpected: {other:?}"),
    }
    match result.sheet.get(addr("B1")).unwrap() {
        CellValue::Formula { cached, .. } => {
            assert_eq!(cached.as_deref(), Some(&CellValue::Number(42.0)));
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn error_values_cache_as_error_cells() {
    let mut wb = Workbook::new();
    wb.set_a1("Sheet1", "A1", CellValue::formula("=SQRT(-1)", None));
    let result = recalculate_sheet(&wb, "Sheet1", &clock(), default_registry()).unwrap();
    assert!(result.issues.is_empty());
    match result.sheet.get(addr("A1")).unwrap() {
        CellValue::Formula { cached, .. } => {
            assert_eq!(cached.as_deref(), Some(&CellValue::Error(ErrorKind::Num)));
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn volatile_cells_follow_the_injected_clock() {
    let mut wb = Workbook::new();
    wb.set_a1("Sheet1", "A1", CellValue::formula("=YEAR(TODAY())", None));
    let result =
        recalculate_sheet(&wb, "Sheet1", &FixedClock::at_ymd(1999, 12, 31), default_registry())
            .unwrap();
    match result.sheet.get(addr("A1")).unwrap() {
        CellValue::Formula { cached, .. } => {
            assert_eq!(cached.as_deref(), Some(&CellValue::Number(1999.0)));
        }
        other => panic!("unexpected: {other:?}"),
    }
}

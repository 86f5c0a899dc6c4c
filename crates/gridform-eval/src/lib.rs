pub mod builtins;
pub mod coercion;
pub mod engine;
pub mod interpreter;
pub mod registry;
pub mod workbook;

pub use engine::{CellIssue, RecalcResult, recalculate_sheet};
pub use interpreter::{DIV_EPSILON, Interpreter, compare};
pub use registry::{FunctionRegistry, default_registry, parse_formula};
pub use workbook::{Sheet, Workbook};

// Re-export the parse and common surface the engine is used with.
pub use gridform_common::{
    ARef, Anchor, ArgKind, Arity, CellRange, CellValue, Clock, CodecError, ErrorKind, EvalError,
    FixedClock, FnFlags, Value, XLError,
};
pub use gridform_parse::{
    ArgumentHandle, Decoder, EvalContext, Expr, Function, FunctionProvider, ParseError,
    ParseErrorKind, canonical_formula, parse_with, shift_expr,
};

#[cfg(feature = "system-clock")]
pub use gridform_common::SystemClock;

/// Parse and evaluate a formula in one step, collapsing both error
/// taxonomies into the user-visible form.
pub fn evaluate_formula(
    workbook: &Workbook,
    sheet: &str,
    formula: &str,
    clock: &dyn Clock,
) -> Result<Value, XLError> {
    let expr =
        parse_formula(formula).map_err(|e| XLError::from(e).with_formula(formula))?;
    Interpreter::new(workbook, sheet, clock)
        .evaluate(&expr)
        .map_err(|e| XLError::from(e).with_formula(formula))
}

#[cfg(test)]
pub(crate) mod test_support {
    use gridform_common::{CellValue, EvalError, FixedClock, Value};

    use crate::interpreter::Interpreter;
    use crate::registry::parse_formula;
    use crate::workbook::Workbook;

    /// The reference sheet used across tests:
    /// A1=10, A2=20, A3=30, B1="Apple", B2="Banana", C1=2, C2=3.
    pub fn sample_workbook() -> Workbook {
        Workbook::new()
            .with_cell("Sheet1", "A1", CellValue::Number(10.0))
            .with_cell("Sheet1", "A2", CellValue::Number(20.0))
            .with_cell("Sheet1", "A3", CellValue::Number(30.0))
            .with_cell("Sheet1", "B1", CellValue::Text("Apple".into()))
            .with_cell("Sheet1", "B2", CellValue::Text("Banana".into()))
            .with_cell("Sheet1", "C1", CellValue::Number(2.0))
            .with_cell("Sheet1", "C2", CellValue::Number(3.0))
    }

    pub fn fixed_clock() -> FixedClock {
        FixedClock::at_ymd(2024, 6, 15)
    }

    pub fn try_eval_on(wb: &Workbook, formula: &str) -> Result<Value, EvalError> {
        let expr = parse_formula(formula).expect("formula parses");
        Interpreter::new(wb, "Sheet1", &fixed_clock()).evaluate(&expr)
    }

    pub fn eval_str(formula: &str) -> Value {
        let wb = sample_workbook();
        match try_eval_on(&wb, formula) {
            Ok(v) => v,
            Err(e) => panic!("'{formula}' failed: {e}"),
        }
    }
}

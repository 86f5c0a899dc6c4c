//! Range aggregations: SUM, AVERAGE, MIN, MAX, COUNT, COUNTA,
//! COUNTBLANK, MEDIAN.
//!
//! Numeric folds skip text and blank cells and propagate stored error
//! values; the COUNT family decodes leniently and never errors on type.

use std::sync::Arc;

use gridform_common::{ArgKind, Arity, CellValue, EvalError, Value};
use gridform_parse::{ArgumentHandle, EvalContext, Function, Range};

use super::support::{for_each_cell, for_each_number};
use crate::coercion::cell_number;
use crate::registry::FunctionRegistry;

const ANY_TAIL: &[ArgKind] = &[ArgKind::Any];
const ONE_RANGE: &[ArgKind] = &[ArgKind::Range];

/* ─────────────────────────── SUM() ──────────────────────────── */

#[derive(Debug)]
struct SumFn;

impl Function for SumFn {
    fn name(&self) -> &'static str {
        "SUM"
    }
    fn arity(&self) -> Arity {
        Arity::AtLeast(1)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        ANY_TAIL
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let mut total = 0.0;
        for_each_number(args, |n| total += n)?;
        Ok(Value::Number(total))
    }
}

/* ─────────────────────────── AVERAGE() ──────────────────────── */

#[derive(Debug)]
struct AverageFn;

impl Function for AverageFn {
    fn name(&self) -> &'static str {
        "AVERAGE"
    }
    fn arity(&self) -> Arity {
        Arity::AtLeast(1)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        ANY_TAIL
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let mut total = 0.0;
        let mut count = 0usize;
        for_each_number(args, |n| {
            total += n;
            count += 1;
        })?;
        if count == 0 {
            return Err(EvalError::DivByZero {
                numerator: "AVERAGE".to_string(),
                denominator: "0".to_string(),
            });
        }
        Ok(Value::Number(total / count as f64))
    }
}

/* ─────────────────────────── MIN() / MAX() ──────────────────── */

#[derive(Debug)]
struct MinFn;

impl Function for MinFn {
    fn name(&self) -> &'static str {
        "MIN"
    }
    fn arity(&self) -> Arity {
        Arity::AtLeast(1)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        ANY_TAIL
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let mut best: Option<f64> = None;
        for_each_number(args, |n| {
            best = Some(best.map_or(n, |b| b.min(n)));
        })?;
        Ok(Value::Number(best.unwrap_or(0.0)))
    }
}

#[derive(Debug)]
struct MaxFn;

impl Function for MaxFn {
    fn name(&self) -> &'static str {
        "MAX"
    }
    fn arity(&self) -> Arity {
        Arity::AtLeast(1)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        ANY_TAIL
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let mut best: Option<f64> = None;
        for_each_number(args, |n| {
            best = Some(best.map_or(n, |b| b.max(n)));
        })?;
        Ok(Value::Number(best.unwrap_or(0.0)))
    }
}

/* ─────────────────── COUNT() / COUNTA() / COUNTBLANK() ──────── */

#[derive(Debug)]
struct CountFn;

impl Function for CountFn {
    fn name(&self) -> &'static str {
        "COUNT"
    }
    fn arity(&self) -> Arity {
        Arity::AtLeast(1)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        ANY_TAIL
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let mut count = 0i64;
        for_each_cell(args, |cell| {
            if matches!(cell_number(cell), Ok(Some(_))) {
                count += 1;
            }
        })?;
        Ok(Value::Int(count))
    }
}

#[derive(Debug)]
struct CountAFn;

impl Function for CountAFn {
    fn name(&self) -> &'static str {
        "COUNTA"
    }
    fn arity(&self) -> Arity {
        Arity::AtLeast(1)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        ANY_TAIL
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let mut count = 0i64;
        for_each_cell(args, |cell| {
            if !cell.is_empty() {
                count += 1;
            }
        })?;
        Ok(Value::Int(count))
    }
}

#[derive(Debug)]
struct CountBlankFn;

impl Function for CountBlankFn {
    fn name(&self) -> &'static str {
        "COUNTBLANK"
    }
    fn arity(&self) -> Arity {
        Arity::Exact(1)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        ONE_RANGE
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let range = args[0].range()?;
        let mut count = 0i64;
        for cell in range.iter_cells() {
            let blank = match &cell {
                CellValue::Empty => true,
                CellValue::Text(s) => s.is_empty(),
                _ => false,
            };
            if blank {
                count += 1;
            }
        }
        Ok(Value::Int(count))
    }
}

/* ─────────────────────────── MEDIAN() ───────────────────────── */

#[derive(Debug)]
struct MedianFn;

impl Function for MedianFn {
    fn name(&self) -> &'static str {
        "MEDIAN"
    }
    fn arity(&self) -> Arity {
        Arity::AtLeast(1)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        ANY_TAIL
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let mut numbers = Vec::new();
        for_each_number(args, |n| numbers.push(n))?;
        if numbers.is_empty() {
            return Ok(Value::Error(gridform_common::ErrorKind::Num));
        }
        numbers.sort_by(f64::total_cmp);
        let mid = numbers.len() / 2;
        let median = if numbers.len() % 2 == 1 {
            numbers[mid]
        } else {
            (numbers[mid - 1] + numbers[mid]) / 2.0
        };
        Ok(Value::Number(median))
    }
}

pub fn register(reg: &mut FunctionRegistry) {
    reg.register(Arc::new(SumFn));
    reg.register(Arc::new(AverageFn));
    reg.register(Arc::new(MinFn));
    reg.register(Arc::new(MaxFn));
    reg.register(Arc::new(CountFn));
    reg.register(Arc::new(CountAFn));
    reg.register(Arc::new(CountBlankFn));
    reg.register(Arc::new(MedianFn));
}

#[cfg(test)]
mod tests {
    use crate::test_support::{sample_workbook, try_eval_on};
    use gridform_common::{EvalError, Value};

    fn eval(formula: &str) -> Value {
        try_eval_on(&sample_workbook(), formula).unwrap()
    }

    #[test]
    fn sum_over_range_and_scalars() {
        assert_eq!(eval("=SUM(A1:A3)"), Value::Number(60.0));
        assert_eq!(eval("=SUM(A1:A3,5)"), Value::Number(65.0));
        assert_eq!(eval("=SUM(1,2,3)"), Value::Number(6.0));
    }

    #[test]
    fn sum_skips_text_cells() {
        // B1/B2 hold text; only the numbers in C survive the fold.
        assert_eq!(eval("=SUM(B1:C2)"), Value::Number(5.0));
    }

    #[test]
    fn average_of_range() {
        assert_eq!(eval("=AVERAGE(A1:A3)"), Value::Number(20.0));
    }

    #[test]
    fn average_of_no_numerics_is_div_by_zero() {
        let err = try_eval_on(&sample_workbook(), "=AVERAGE(B1:B2)").unwrap_err();
        assert!(matches!(err, EvalError::DivByZero { .. }));
    }

    #[test]
    fn count_family() {
        assert_eq!(eval("=COUNT(A1:B3)"), Value::Int(3));
        assert_eq!(eval("=COUNTA(A1:B3)"), Value::Int(5));
        assert_eq!(eval("=COUNTBLANK(A1:B3)"), Value::Int(1));
    }

    #[test]
    fn min_max_median() {
        assert_eq!(eval("=MIN(A1:A3)"), Value::Number(10.0));
        assert_eq!(eval("=MAX(A1:A3)"), Value::Number(30.0));
        assert_eq!(eval("=MEDIAN(A1:A3)"), Value::Number(20.0));
        assert_eq!(eval("=MEDIAN(1,2,3,4)"), Value::Number(2.5));
    }
}

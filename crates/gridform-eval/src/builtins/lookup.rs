//! Lookup functions.
//!
//! Exact matching compares text case-insensitively and numbers across
//! int/float; approximate modes scan for the closest key on the relevant
//! side. Errors stored in non-selected cells never matter.

use std::sync::Arc;

use gridform_common::{ArgKind, Arity, CellValue, ErrorKind, EvalError, Value};
use gridform_parse::{ArgumentHandle, CmpOp, EvalContext, Function, Range};

use super::criteria::wildcard_match;
use super::support::{opt_bool, opt_int};
use crate::coercion::{cell_to_value, to_int, to_number};
use crate::interpreter::compare;
use crate::registry::FunctionRegistry;

fn lookup_eq(a: &Value, b: &Value) -> bool {
    compare(CmpOp::Eq, a, b).unwrap_or(false)
}

/// Flatten a vector-shaped range (1×N or N×1) into cells; `None` when the
/// range is a full rectangle.
fn as_vector(range: &dyn Range) -> Option<Vec<CellValue>> {
    let (rows, cols) = range.dimensions();
    if rows != 1 && cols != 1 {
        return None;
    }
    Some(range.iter_cells().collect())
}

/* ─────────────────────────── VLOOKUP() / HLOOKUP() ──────────── */

#[derive(Debug)]
struct VLookupFn;

impl Function for VLookupFn {
    fn name(&self) -> &'static str {
        "VLOOKUP"
    }
    fn arity(&self) -> Arity {
        Arity::Range(3, 4)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[ArgKind::Any, ArgKind::Range, ArgKind::Int, ArgKind::Logical]
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let key = args[0].value()?;
        let table = args[1].range()?;
        let (rows, cols) = table.dimensions();
        let col = to_int(&args[2].value()?)?;
        if col < 1 || col as usize > cols {
            return Err(EvalError::failed(format!(
                "VLOOKUP: column index {col} outside 1..={cols}"
            )));
        }
        let approximate = opt_bool(args, 3, false)?;
        let col = (col - 1) as usize;

        if approximate {
            let key_n = to_number(&key).map_err(|_| {
                EvalError::failed("VLOOKUP: approximate match requires a numeric key")
            })?;
            let mut best: Option<(usize, f64)> = None;
            for r in 0..rows {
                if let Ok(Some(n)) = crate::coercion::cell_number(&table.get(r, 0)) {
                    if n <= key_n && best.is_none_or(|(_, b)| n >= b) {
                        best = Some((r, n));
                    }
                }
            }
            if let Some((r, _)) = best {
                return Ok(cell_to_value(&table.get(r, col)));
            }
        } else {
            for r in 0..rows {
                if lookup_eq(&cell_to_value(&table.get(r, 0)), &key) {
                    return Ok(cell_to_value(&table.get(r, col)));
                }
            }
        }
        Err(EvalError::failed(format!("VLOOKUP: '{key}' not found")))
    }
}

#[derive(Debug)]
struct HLookupFn;

impl Function for HLookupFn {
    fn name(&self) -> &'static str {
        "HLOOKUP"
    }
    fn arity(&self) -> Arity {
        Arity::Range(3, 4)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[ArgKind::Any, ArgKind::Range, ArgKind::Int, ArgKind::Logical]
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let key = args[0].value()?;
        let table = args[1].range()?;
        let (rows, cols) = table.dimensions();
        let row = to_int(&args[2].value()?)?;
        if row < 1 || row as usize > rows {
            return Err(EvalError::failed(format!(
                "HLOOKUP: row index {row} outside 1..={rows}"
            )));
        }
        let approximate = opt_bool(args, 3, false)?;
        let row = (row - 1) as usize;

        if approximate {
            let key_n = to_number(&key).map_err(|_| {
                EvalError::failed("HLOOKUP: approximate match requires a numeric key")
            })?;
            let mut best: Option<(usize, f64)> = None;
            for c in 0..cols {
                if let Ok(Some(n)) = crate::coercion::cell_number(&table.get(0, c)) {
                    if n <= key_n && best.is_none_or(|(_, b)| n >= b) {
                        best = Some((c, n));
                    }
                }
            }
            if let Some((c, _)) = best {
                return Ok(cell_to_value(&table.get(row, c)));
            }
        } else {
            for c in 0..cols {
                if lookup_eq(&cell_to_value(&table.get(0, c)), &key) {
                    return Ok(cell_to_value(&table.get(row, c)));
                }
            }
        }
        Err(EvalError::failed(format!("HLOOKUP: '{key}' not found")))
    }
}

/* ─────────────────────────── XLOOKUP() ──────────────────────── */

#[derive(Debug)]
struct XLookupFn;

impl Function for XLookupFn {
    fn name(&self) -> &'static str {
        "XLOOKUP"
    }
    fn arity(&self) -> Arity {
        Arity::Range(3, 6)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[
            ArgKind::Any,
            ArgKind::Range,
            ArgKind::Range,
            ArgKind::Any,
            ArgKind::Int,
            ArgKind::Int,
        ]
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let key = args[0].value()?;
        let lookup_range = args[1].range()?;
        let return_range = args[2].range()?;

        let lookup = as_vector(lookup_range.as_ref())
            .ok_or_else(|| EvalError::failed("XLOOKUP: lookup range must be a single row or column"))?;
        let returns = as_vector(return_range.as_ref())
            .ok_or_else(|| EvalError::failed("XLOOKUP: return range must be a single row or column"))?;
        if lookup.len() != returns.len() {
            return Err(EvalError::failed(format!(
                "XLOOKUP: lookup has {} cells but return has {}",
                lookup.len(),
                returns.len()
            )));
        }

        let match_mode = opt_int(args, 4, 0)?;
        let search_mode = opt_int(args, 5, 1)?;
        let indices: Vec<usize> = match search_mode {
            1 => (0..lookup.len()).collect(),
            -1 => (0..lookup.len()).rev().collect(),
            other => {
                return Err(EvalError::failed(format!(
                    "XLOOKUP: unsupported search mode {other}"
                )));
            }
        };

        let found = match match_mode {
            // Exact.
            0 => indices
                .iter()
                .copied()
                .find(|&i| lookup_eq(&cell_to_value(&lookup[i]), &key)),
            // Exact or next smaller.
            -1 => {
                let key_n = to_number(&key).ok();
                let mut best: Option<(usize, f64)> = None;
                for &i in &indices {
                    let candidate = cell_to_value(&lookup[i]);
                    if lookup_eq(&candidate, &key) {
                        best = Some((i, f64::INFINITY));
                        break;
                    }
                    if let (Some(k), Ok(n)) = (key_n, to_number(&candidate)) {
                        if n <= k && best.is_none_or(|(_, b)| n > b) {
                            best = Some((i, n));
                        }
                    }
                }
                best.map(|(i, _)| i)
            }
            // Exact or next larger.
            1 => {
                let key_n = to_number(&key).ok();
                let mut best: Option<(usize, f64)> = None;
                for &i in &indices {
                    let candidate = cell_to_value(&lookup[i]);
                    if lookup_eq(&candidate, &key) {
                        best = Some((i, f64::NEG_INFINITY));
                        break;
                    }
                    if let (Some(k), Ok(n)) = (key_n, to_number(&candidate)) {
                        if n >= k && best.is_none_or(|(_, b)| n < b) {
                            best = Some((i, n));
                        }
                    }
                }
                best.map(|(i, _)| i)
            }
            // Wildcard.
            2 => {
                let pattern = match &key {
                    Value::Text(s) => s.clone(),
                    other => other.to_string(),
                };
                indices.iter().copied().find(|&i| match &lookup[i] {
                    CellValue::Text(s) => wildcard_match(&pattern, s),
                    CellValue::Rich(rt) => wildcard_match(&pattern, &rt.plain()),
                    _ => false,
                })
            }
            other => {
                return Err(EvalError::failed(format!(
                    "XLOOKUP: unsupported match mode {other}"
                )));
            }
        };

        match found {
            Some(i) => Ok(cell_to_value(&returns[i])),
            None => {
                if let Some(fallback) = args.get(3) {
                    if !fallback.is_missing() {
                        return fallback.value();
                    }
                }
                Ok(Value::Error(ErrorKind::Na))
            }
        }
    }
}

/* ─────────────────────────── MATCH() ────────────────────────── */

#[derive(Debug)]
struct MatchFn;

impl Function for MatchFn {
    fn name(&self) -> &'static str {
        "MATCH"
    }
    fn arity(&self) -> Arity {
        Arity::Range(2, 3)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[ArgKind::Any, ArgKind::Range, ArgKind::Int]
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let key = args[0].value()?;
        let range = args[1].range()?;
        let cells = as_vector(range.as_ref())
            .ok_or_else(|| EvalError::failed("MATCH: range must be a single row or column"))?;
        let mode = opt_int(args, 2, 1)?;

        let found = match mode.signum() {
            0 => cells
                .iter()
                .position(|c| lookup_eq(&cell_to_value(c), &key)),
            // Largest value <= key; assumes ascending data.
            1 => {
                let mut best = None;
                for (i, cell) in cells.iter().enumerate() {
                    let v = cell_to_value(cell);
                    if matches!(v, Value::Empty) {
                        continue;
                    }
                    match compare(CmpOp::Le, &v, &key) {
                        Ok(true) => best = Some(i),
                        _ => {}
                    }
                }
                best
            }
            // Smallest value >= key; assumes descending data.
            _ => {
                let mut best = None;
                for (i, cell) in cells.iter().enumerate() {
                    let v = cell_to_value(cell);
                    if matches!(v, Value::Empty) {
                        continue;
                    }
                    if compare(CmpOp::Ge, &v, &key).unwrap_or(false) {
                        best = Some(i);
                    }
                }
                best
            }
        };

        match found {
            Some(i) => Ok(Value::Int((i + 1) as i64)),
            None => Ok(Value::Error(ErrorKind::Na)),
        }
    }
}

/* ─────────────────────────── INDEX() ────────────────────────── */

#[derive(Debug)]
struct IndexFn;

impl Function for IndexFn {
    fn name(&self) -> &'static str {
        "INDEX"
    }
    fn arity(&self) -> Arity {
        Arity::Range(2, 3)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[ArgKind::Range, ArgKind::Int, ArgKind::Int]
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let range = args[0].range()?;
        let (rows, cols) = range.dimensions();
        let first = to_int(&args[1].value()?)?;

        let (row, col) = if args.len() > 2 && !args[2].is_missing() {
            (first, to_int(&args[2].value()?)?)
        } else if rows == 1 {
            // A single-row range indexes along its columns.
            (1, first)
        } else {
            (first, 1)
        };

        if row < 1 || col < 1 || row as usize > rows || col as usize > cols {
            return Ok(Value::Error(ErrorKind::Ref));
        }
        Ok(cell_to_value(&range.get((row - 1) as usize, (col - 1) as usize)))
    }
}

/* ─────────────────────────── CHOOSE() ───────────────────────── */

#[derive(Debug)]
struct ChooseFn;

impl Function for ChooseFn {
    fn name(&self) -> &'static str {
        "CHOOSE"
    }
    fn arity(&self) -> Arity {
        Arity::AtLeast(2)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[ArgKind::Int, ArgKind::Any]
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let index = to_int(&args[0].value()?)?;
        if index < 1 || index as usize >= args.len() {
            return Ok(Value::Error(ErrorKind::Value));
        }
        args[index as usize].value()
    }
}

pub fn register(reg: &mut FunctionRegistry) {
    reg.register(Arc::new(VLookupFn));
    reg.register(Arc::new(HLookupFn));
    reg.register(Arc::new(XLookupFn));
    reg.register(Arc::new(MatchFn));
    reg.register(Arc::new(IndexFn));
    reg.register(Arc::new(ChooseFn));
}

#[cfg(test)]
mod tests {
    use crate::test_support::{sample_workbook, try_eval_on};
    use gridform_common::{ErrorKind, Value};

    fn eval(formula: &str) -> Value {
        try_eval_on(&sample_workbook(), formula).unwrap()
    }

    #[test]
    fn vlookup_exact() {
        assert_eq!(
            eval("=VLOOKUP(\"Apple\",B1:C2,2,FALSE)"),
            Value::Number(2.0)
        );
        // Case-insensitive key compare.
        assert_eq!(
            eval("=VLOOKUP(\"banana\",B1:C2,2,FALSE)"),
            Value::Number(3.0)
        );
    }

    #[test]
    fn vlookup_misses_and_bad_column() {
        let err = try_eval_on(&sample_workbook(), "=VLOOKUP(\"Cherry\",B1:C2,2,FALSE)")
            .unwrap_err();
        assert!(err.to_string().contains("not found"));

        let err = try_eval_on(&sample_workbook(), "=VLOOKUP(\"Apple\",B1:C2,3,FALSE)")
            .unwrap_err();
        assert!(err.to_string().contains("outside"));
    }

    #[test]
    fn vlookup_approximate_takes_greatest_leq() {
        assert_eq!(eval("=VLOOKUP(25,A1:A3,1,TRUE)"), Value::Number(20.0));
        assert_eq!(eval("=VLOOKUP(10,A1:A3,1,TRUE)"), Value::Number(10.0));
    }

    #[test]
    fn xlookup_fallback_and_match() {
        assert_eq!(
            eval("=XLOOKUP(\"Cherry\",B1:B2,C1:C2,\"missing\")"),
            Value::Text("missing".into())
        );
        assert_eq!(
            eval("=XLOOKUP(\"Banana\",B1:B2,C1:C2)"),
            Value::Number(3.0)
        );
        assert_eq!(
            eval("=XLOOKUP(\"Cherry\",B1:B2,C1:C2)"),
            Value::Error(ErrorKind::Na)
        );
        assert_eq!(
            eval("=XLOOKUP(\"B*\",B1:B2,C1:C2,,2)"),
            Value::Number(3.0)
        );
    }

    #[test]
    fn xlookup_next_smaller_reverse() {
        assert_eq!(
            eval("=XLOOKUP(25,A1:A3,A1:A3,,-1,-1)"),
            Value::Number(20.0)
        );
    }

    #[test]
    fn match_modes() {
        assert_eq!(eval("=MATCH(\"Banana\",B1:B2,0)"), Value::Int(2));
        assert_eq!(eval("=MATCH(25,A1:A3,1)"), Value::Int(2));
        assert_eq!(
            eval("=MATCH(\"Cherry\",B1:B2,0)"),
            Value::Error(ErrorKind::Na)
        );
    }

    #[test]
    fn index_bounds() {
        assert_eq!(eval("=INDEX(A1:A3,2)"), Value::Number(20.0));
        assert_eq!(eval("=INDEX(B1:C2,1,2)"), Value::Number(2.0));
        assert_eq!(eval("=INDEX(A1:A3,4)"), Value::Error(ErrorKind::Ref));
        assert_eq!(eval("=INDEX(A1:A3,0)"), Value::Error(ErrorKind::Ref));
    }

    #[test]
    fn choose_picks_lazily() {
        assert_eq!(eval("=CHOOSE(2,\"a\",\"b\",\"c\")"), Value::Text("b".into()));
        assert_eq!(eval("=CHOOSE(2,1/0,5)"), Value::Number(5.0));
        assert_eq!(eval("=CHOOSE(9,1,2)"), Value::Error(ErrorKind::Value));
    }
}

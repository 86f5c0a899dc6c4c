//! Argument helpers shared across the builtin modules.

use chrono::NaiveDate;
use gridform_common::{CellValue, EvalError, Value};
use gridform_parse::{ArgumentHandle, Expr, Range};

use crate::coercion::{
    cell_number, to_bool, to_date, to_int, to_number, to_text, value_to_cell,
};

pub fn num_at(args: &[ArgumentHandle<'_>], i: usize) -> Result<f64, EvalError> {
    to_number(&args[i].value()?)
}

pub fn opt_num(args: &[ArgumentHandle<'_>], i: usize, default: f64) -> Result<f64, EvalError> {
    match args.get(i) {
        Some(h) if !h.is_missing() => to_number(&h.value()?),
        _ => Ok(default),
    }
}

pub fn int_at(args: &[ArgumentHandle<'_>], i: usize) -> Result<i64, EvalError> {
    to_int(&args[i].value()?)
}

pub fn opt_int(args: &[ArgumentHandle<'_>], i: usize, default: i64) -> Result<i64, EvalError> {
    match args.get(i) {
        Some(h) if !h.is_missing() => to_int(&h.value()?),
        _ => Ok(default),
    }
}

pub fn text_at(args: &[ArgumentHandle<'_>], i: usize) -> Result<String, EvalError> {
    to_text(&args[i].value()?)
}

pub fn opt_bool(args: &[ArgumentHandle<'_>], i: usize, default: bool) -> Result<bool, EvalError> {
    match args.get(i) {
        Some(h) if !h.is_missing() => to_bool(&h.value()?),
        _ => Ok(default),
    }
}

pub fn date_at(args: &[ArgumentHandle<'_>], i: usize) -> Result<NaiveDate, EvalError> {
    to_date(&args[i].value()?)
}

fn is_range_like(arg: &ArgumentHandle<'_>) -> bool {
    matches!(arg.expr(), Expr::Range(_) | Expr::Ref { .. })
}

/// Strict numeric fold across mixed scalar/range arguments: range cells
/// decode leniently (text and blanks skipped, stored errors propagate),
/// direct scalars coerce strictly.
pub fn for_each_number(
    args: &[ArgumentHandle<'_>],
    mut f: impl FnMut(f64),
) -> Result<(), EvalError> {
    for arg in args {
        if arg.is_missing() {
            continue;
        }
        if is_range_like(arg) {
            let range = arg.range()?;
            for cell in range.iter_cells() {
                if let Some(n) = cell_number(&cell)? {
                    f(n);
                }
            }
        } else {
            match arg.value()? {
                Value::Empty => {}
                other => f(to_number(&other)?),
            }
        }
    }
    Ok(())
}

/// Lenient raw-cell visitor (COUNT-family shape): nothing errors on type,
/// direct scalars are projected into cells.
pub fn for_each_cell(
    args: &[ArgumentHandle<'_>],
    mut f: impl FnMut(&CellValue),
) -> Result<(), EvalError> {
    for arg in args {
        if arg.is_missing() {
            continue;
        }
        if is_range_like(arg) {
            let range = arg.range()?;
            for cell in range.iter_cells() {
                f(&cell);
            }
        } else {
            f(&value_to_cell(arg.value()?));
        }
    }
    Ok(())
}

/// Flatten a range argument's numeric cells in row-major order, keeping
/// blanks out; used by the cashflow functions.
pub fn numbers_of_range(arg: &ArgumentHandle<'_>) -> Result<Vec<f64>, EvalError> {
    let mut out = Vec::new();
    if is_range_like(arg) {
        let range = arg.range()?;
        for cell in range.iter_cells() {
            if let Some(n) = cell_number(&cell)? {
                out.push(n);
            }
        }
    } else {
        out.push(to_number(&arg.value()?)?);
    }
    Ok(out)
}

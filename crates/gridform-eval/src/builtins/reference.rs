//! Reference-shape functions: coordinates and dimensions of references,
//! plus ADDRESS formatting. These read the argument's reference node, not
//! its contents.

use std::sync::Arc;

use gridform_common::{ArgKind, Arity, ErrorKind, EvalError, Value, column_label};
use gridform_parse::{ArgumentHandle, EvalContext, Function, RangeRef};

use super::support::{int_at, opt_int};
use crate::registry::FunctionRegistry;

fn reference_of<'a>(arg: &ArgumentHandle<'a>, fname: &str) -> Result<&'a RangeRef, EvalError> {
    arg.range_ref()
        .ok_or_else(|| EvalError::failed(format!("{fname} requires a cell reference argument")))
}

/* ─────────────────────────── ROW() / COLUMN() ───────────────── */

#[derive(Debug)]
struct RowFn;

impl Function for RowFn {
    fn name(&self) -> &'static str {
        "ROW"
    }
    fn arity(&self) -> Arity {
        Arity::Exact(1)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[ArgKind::Range]
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let r = reference_of(&args[0], "ROW")?;
        Ok(Value::Int(r.range.start_row as i64 + 1))
    }
}

#[derive(Debug)]
struct ColumnFn;

impl Function for ColumnFn {
    fn name(&self) -> &'static str {
        "COLUMN"
    }
    fn arity(&self) -> Arity {
        Arity::Exact(1)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[ArgKind::Range]
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let r = reference_of(&args[0], "COLUMN")?;
        Ok(Value::Int(r.range.start_col as i64 + 1))
    }
}

/* ─────────────────────────── ROWS() / COLUMNS() ─────────────── */

#[derive(Debug)]
struct RowsFn;

impl Function for RowsFn {
    fn name(&self) -> &'static str {
        "ROWS"
    }
    fn arity(&self) -> Arity {
        Arity::Exact(1)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[ArgKind::Range]
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let r = reference_of(&args[0], "ROWS")?;
        Ok(Value::Int(r.range.height() as i64))
    }
}

#[derive(Debug)]
struct ColumnsFn;

impl Function for ColumnsFn {
    fn name(&self) -> &'static str {
        "COLUMNS"
    }
    fn arity(&self) -> Arity {
        Arity::Exact(1)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[ArgKind::Range]
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let r = reference_of(&args[0], "COLUMNS")?;
        Ok(Value::Int(r.range.width() as i64))
    }
}

/* ─────────────────────────── ADDRESS() ──────────────────────── */

#[derive(Debug)]
struct AddressFn;

impl Function for AddressFn {
    fn name(&self) -> &'static str {
        "ADDRESS"
    }
    fn arity(&self) -> Arity {
        Arity::Range(2, 4)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[ArgKind::Int, ArgKind::Int, ArgKind::Int, ArgKind::Text]
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let row = int_at(args, 0)?;
        let col = int_at(args, 1)?;
        // 1 = fully absolute, 2 = row absolute, 3 = column absolute,
        // 4 = fully relative.
        let abs = opt_int(args, 2, 1)?;
        if row < 1 || col < 1 || !(1..=4).contains(&abs) {
            return Ok(Value::Error(ErrorKind::Value));
        }

        let col_label = column_label((col - 1) as u32);
        let (col_dollar, row_dollar) = match abs {
            1 => ("$", "$"),
            2 => ("", "$"),
            3 => ("$", ""),
            _ => ("", ""),
        };
        let mut out = format!("{col_dollar}{col_label}{row_dollar}{row}");

        if let Some(sheet_arg) = args.get(3) {
            if !sheet_arg.is_missing() {
                let sheet = super::support::text_at(args, 3)?;
                out = format!("{sheet}!{out}");
            }
        }
        Ok(Value::Text(out))
    }
}

pub fn register(reg: &mut FunctionRegistry) {
    reg.register(Arc::new(RowFn));
    reg.register(Arc::new(ColumnFn));
    reg.register(Arc::new(RowsFn));
    reg.register(Arc::new(ColumnsFn));
    reg.register(Arc::new(AddressFn));
}

#[cfg(test)]
mod tests {
    use crate::test_support::eval_str;
    use gridform_common::Value;

    #[test]
    fn coordinates_are_one_based() {
        assert_eq!(eval_str("=ROW(B3)"), Value::Int(3));
        assert_eq!(eval_str("=COLUMN(B3)"), Value::Int(2));
    }

    #[test]
    fn range_dimensions() {
        assert_eq!(eval_str("=ROWS(A1:B10)"), Value::Int(10));
        assert_eq!(eval_str("=COLUMNS(A1:B10)"), Value::Int(2));
    }

    #[test]
    fn address_abs_modes() {
        assert_eq!(eval_str("=ADDRESS(1,1)"), Value::Text("$A$1".into()));
        assert_eq!(eval_str("=ADDRESS(2,3,2)"), Value::Text("C$2".into()));
        assert_eq!(eval_str("=ADDRESS(2,3,3)"), Value::Text("$C2".into()));
        assert_eq!(eval_str("=ADDRESS(2,3,4)"), Value::Text("C2".into()));
        assert_eq!(
            eval_str("=ADDRESS(1,2,1,\"Data\")"),
            Value::Text("Data!$B$1".into())
        );
        assert_eq!(
            eval_str("=ADDRESS(0,1)"),
            Value::Error(gridform_common::ErrorKind::Value)
        );
    }
}

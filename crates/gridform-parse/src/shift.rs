//! Reference relocation for copy/paste.
//!
//! Relative components move by the delta; anchored components stay put. A
//! reference pushed off the top or left edge of the grid collapses to a
//! `#REF!` literal, which is how spreadsheets surface a broken paste.

use gridform_common::{ARef, CellRange, ErrorKind, Value};

use crate::ast::{CellRef, Expr, RangeRef};

/// Relocate an expression by `(delta_rows, delta_cols)`.
pub fn shift_expr(expr: &Expr, delta_rows: i64, delta_cols: i64) -> Expr {
    match expr {
        Expr::Lit(_) => expr.clone(),
        Expr::PolyRef(c) => match shift_cell(c, delta_rows, delta_cols) {
            Some(moved) => Expr::PolyRef(moved),
            None => ref_error(),
        },
        Expr::Ref { target, decoder } => match shift_cell(target, delta_rows, delta_cols) {
            Some(moved) => Expr::Ref {
                target: moved,
                decoder: *decoder,
            },
            None => ref_error(),
        },
        Expr::Range(r) => match shift_range(r, delta_rows, delta_cols) {
            Some(moved) => Expr::Range(moved),
            None => ref_error(),
        },
        Expr::If {
            cond,
            then,
            otherwise,
        } => Expr::If {
            cond: Box::new(shift_expr(cond, delta_rows, delta_cols)),
            then: Box::new(shift_expr(then, delta_rows, delta_cols)),
            otherwise: Box::new(shift_expr(otherwise, delta_rows, delta_cols)),
        },
        Expr::Arith { op, lhs, rhs } => Expr::Arith {
            op: *op,
            lhs: Box::new(shift_expr(lhs, delta_rows, delta_cols)),
            rhs: Box::new(shift_expr(rhs, delta_rows, delta_cols)),
        },
        Expr::Logic { op, lhs, rhs } => Expr::Logic {
            op: *op,
            lhs: Box::new(shift_expr(lhs, delta_rows, delta_cols)),
            rhs: Box::new(shift_expr(rhs, delta_rows, delta_cols)),
        },
        Expr::Not(e) => Expr::Not(Box::new(shift_expr(e, delta_rows, delta_cols))),
        Expr::Cmp { op, lhs, rhs } => Expr::Cmp {
            op: *op,
            lhs: Box::new(shift_expr(lhs, delta_rows, delta_cols)),
            rhs: Box::new(shift_expr(rhs, delta_rows, delta_cols)),
        },
        Expr::Call { func, args } => Expr::Call {
            func: func.clone(),
            args: args
                .iter()
                .map(|a| shift_expr(a, delta_rows, delta_cols))
                .collect(),
        },
        Expr::ToInt(e) => Expr::ToInt(Box::new(shift_expr(e, delta_rows, delta_cols))),
        Expr::DateToSerial(e) => {
            Expr::DateToSerial(Box::new(shift_expr(e, delta_rows, delta_cols)))
        }
        Expr::DateTimeToSerial(e) => {
            Expr::DateTimeToSerial(Box::new(shift_expr(e, delta_rows, delta_cols)))
        }
    }
}

fn ref_error() -> Expr {
    Expr::Lit(Value::Error(ErrorKind::Ref))
}

fn shift_coord(coord: u32, delta: i64, pinned: bool) -> Option<u32> {
    if pinned {
        return Some(coord);
    }
    let moved = coord as i64 + delta;
    u32::try_from(moved).ok()
}

fn shift_cell(cell: &CellRef, delta_rows: i64, delta_cols: i64) -> Option<CellRef> {
    let col = shift_coord(cell.addr.col, delta_cols, cell.anchor.col_abs())?;
    let row = shift_coord(cell.addr.row, delta_rows, cell.anchor.row_abs())?;
    Some(CellRef {
        sheet: cell.sheet.clone(),
        addr: ARef::new(col, row),
        anchor: cell.anchor,
    })
}

fn shift_range(range: &RangeRef, delta_rows: i64, delta_cols: i64) -> Option<RangeRef> {
    let (start_anchor, end_anchor) = range.anchors;
    let start_col = shift_coord(range.range.start_col, delta_cols, start_anchor.col_abs())?;
    let start_row = shift_coord(range.range.start_row, delta_rows, start_anchor.row_abs())?;
    let end_col = shift_coord(range.range.end_col, delta_cols, end_anchor.col_abs())?;
    let end_row = shift_coord(range.range.end_row, delta_rows, end_anchor.row_abs())?;
    Some(RangeRef {
        sheet: range.sheet.clone(),
        range: CellRange::new(ARef::new(start_col, start_row), ARef::new(end_col, end_row)),
        anchors: range.anchors,
    })
}

//! Canonical formula rendering.
//!
//! `Display` on [`Expr`] delegates here. The output round-trips: parsing
//! the rendered text reproduces the tree, up to whitespace and equivalent
//! reference notation. Coercion wrappers print transparently, since the
//! context that inserted them re-inserts them on reparse.

use std::fmt::{self, Write as _};

use gridform_common::{Anchor, Value, column_label, datetime_to_serial};

use crate::ast::{ArithOp, CellRef, CmpOp, Expr, RangeRef};

/// Render with the leading `=` marker.
pub fn canonical_formula(expr: &Expr) -> String {
    format!("={expr}")
}

fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Logic { op, .. } => match op {
            crate::ast::LogicOp::Or => 1,
            crate::ast::LogicOp::And => 2,
        },
        Expr::Cmp { .. } => 3,
        Expr::Arith { op, .. } => match op {
            ArithOp::Add | ArithOp::Sub => 5,
            ArithOp::Mul | ArithOp::Div => 6,
        },
        Expr::Not(_) => 7,
        Expr::ToInt(e) | Expr::DateToSerial(e) | Expr::DateTimeToSerial(e) => precedence(e),
        _ => 10,
    }
}

fn is_unary_minus(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Arith {
            op: ArithOp::Sub,
            lhs,
            ..
        } if matches!(**lhs, Expr::Lit(Value::Number(n)) if n == 0.0)
    )
}

pub(crate) fn write_expr(f: &mut fmt::Formatter<'_>, expr: &Expr, parent_prec: u8) -> fmt::Result {
    let prec = if is_unary_minus(expr) { 7 } else { precedence(expr) };
    let needs_parens = prec < parent_prec;
    if needs_parens {
        f.write_char('(')?;
    }
    write_bare(f, expr)?;
    if needs_parens {
        f.write_char(')')?;
    }
    Ok(())
}

fn write_bare(f: &mut fmt::Formatter<'_>, expr: &Expr) -> fmt::Result {
    match expr {
        Expr::Lit(v) => write_literal(f, v),
        Expr::PolyRef(c) => write_cell_ref(f, c),
        Expr::Ref { target, .. } => write_cell_ref(f, target),
        Expr::Range(r) => write_range_ref(f, r),
        Expr::If {
            cond,
            then,
            otherwise,
        } => {
            f.write_str("IF(")?;
            write_expr(f, cond, 0)?;
            f.write_char(',')?;
            write_expr(f, then, 0)?;
            f.write_char(',')?;
            write_expr(f, otherwise, 0)?;
            f.write_char(')')
        }
        // Sub(0, x) is how the parser desugars unary minus.
        Expr::Arith { rhs, .. } if is_unary_minus(expr) => {
            f.write_char('-')?;
            write_expr(f, rhs, 7)
        }
        Expr::Arith { op, lhs, rhs } => {
            let prec = precedence(expr);
            write_expr(f, lhs, prec)?;
            f.write_str(op.symbol())?;
            write_expr(f, rhs, prec + 1)
        }
        Expr::Logic { op, lhs, rhs } => {
            let prec = precedence(expr);
            write_expr(f, lhs, prec + 1)?;
            write!(f, " {} ", op.symbol())?;
            write_expr(f, rhs, prec)
        }
        Expr::Not(e) => {
            f.write_str("NOT ")?;
            write_expr(f, e, 7)
        }
        Expr::Cmp { op, lhs, rhs } => {
            write_expr(f, lhs, 3)?;
            f.write_str(op.symbol())?;
            write_expr(f, rhs, 4)
        }
        Expr::Call { func, args } => {
            f.write_str(func.name())?;
            f.write_char('(')?;
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    f.write_char(',')?;
                }
                write_expr(f, arg, 0)?;
            }
            f.write_char(')')
        }
        Expr::ToInt(e) | Expr::DateToSerial(e) | Expr::DateTimeToSerial(e) => write_bare(f, e),
    }
}

fn write_literal(f: &mut fmt::Formatter<'_>, v: &Value) -> fmt::Result {
    match v {
        Value::Number(n) => write!(f, "{n}"),
        Value::Int(i) => write!(f, "{i}"),
        Value::Text(s) => write!(f, "\"{}\"", s.replace('"', "\"\"")),
        Value::Bool(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
        Value::Empty => Ok(()),
        Value::Error(e) => write!(f, "{e}"),
        Value::Date(d) => write!(
            f,
            "DATE({},{},{})",
            chrono::Datelike::year(d),
            chrono::Datelike::month(d),
            chrono::Datelike::day(d)
        ),
        Value::DateTime(dt) => write!(f, "{}", datetime_to_serial(dt)),
    }
}

fn write_anchored(f: &mut fmt::Formatter<'_>, col: u32, row: u32, anchor: Anchor) -> fmt::Result {
    if anchor.col_abs() {
        f.write_char('$')?;
    }
    f.write_str(&column_label(col))?;
    if anchor.row_abs() {
        f.write_char('$')?;
    }
    write!(f, "{}", row + 1)
}

fn write_sheet_prefix(f: &mut fmt::Formatter<'_>, sheet: &Option<String>) -> fmt::Result {
    if let Some(name) = sheet {
        if sheet_name_needs_quoting(name) {
            write!(f, "'{}'!", name.replace('\'', "''"))?;
        } else {
            write!(f, "{name}!")?;
        }
    }
    Ok(())
}

fn write_cell_ref(f: &mut fmt::Formatter<'_>, c: &CellRef) -> fmt::Result {
    write_sheet_prefix(f, &c.sheet)?;
    write_anchored(f, c.addr.col, c.addr.row, c.anchor)
}

fn write_range_ref(f: &mut fmt::Formatter<'_>, r: &RangeRef) -> fmt::Result {
    write_sheet_prefix(f, &r.sheet)?;
    write_anchored(f, r.range.start_col, r.range.start_row, r.anchors.0)?;
    f.write_char(':')?;
    write_anchored(f, r.range.end_col, r.range.end_row, r.anchors.1)
}

fn sheet_name_needs_quoting(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return true,
    }
    !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

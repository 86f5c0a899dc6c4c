//! Coercion constructors.
//!
//! These consume the parser's transient `PolyRef` nodes and re-emit typed
//! `Ref` nodes carrying the decoder the surrounding context demands. On
//! nodes that already carry a type they are the identity, except where a
//! numeric context consumes a date-valued call (a serial wrapper is
//! inserted) or an integer is required (a `ToInt` wrapper is inserted).

use gridform_common::{ArgKind, FnFlags, Value};

use crate::ast::{Expr, RangeRef};
use crate::codec::Decoder;
use crate::error::{ParseError, ParseErrorKind};

pub fn number(expr: Expr) -> Expr {
    match expr {
        Expr::PolyRef(c) => Expr::Ref {
            target: c,
            decoder: Decoder::Number,
        },
        Expr::Call { func, args } => {
            let flags = func.flags();
            let call = Expr::Call { func, args };
            if flags.contains(FnFlags::RETURNS_DATE) {
                Expr::DateToSerial(Box::new(call))
            } else if flags.intersects(FnFlags::RETURNS_DATETIME | FnFlags::RETURNS_TIME) {
                Expr::DateTimeToSerial(Box::new(call))
            } else {
                call
            }
        }
        other => other,
    }
}

pub fn int(expr: Expr) -> Expr {
    match expr {
        Expr::PolyRef(c) => Expr::Ref {
            target: c,
            decoder: Decoder::Int,
        },
        Expr::Lit(Value::Int(_)) => expr,
        Expr::Lit(Value::Empty) => expr,
        other => Expr::ToInt(Box::new(number(other))),
    }
}

pub fn logical(expr: Expr) -> Expr {
    match expr {
        Expr::PolyRef(c) => Expr::Ref {
            target: c,
            decoder: Decoder::Bool,
        },
        other => other,
    }
}

pub fn text(expr: Expr) -> Expr {
    match expr {
        Expr::PolyRef(c) => Expr::Ref {
            target: c,
            decoder: Decoder::Str,
        },
        other => other,
    }
}

pub fn date(expr: Expr) -> Expr {
    match expr {
        Expr::PolyRef(c) => Expr::Ref {
            target: c,
            decoder: Decoder::Date,
        },
        other => other,
    }
}

pub fn any(expr: Expr) -> Expr {
    match expr {
        Expr::PolyRef(c) => Expr::Ref {
            target: c,
            decoder: Decoder::Resolved,
        },
        other => other,
    }
}

/// Range-shaped argument: a range literal, or a single cell collapsed to a
/// 1×1 rectangle. An omitted argument placeholder passes through so the
/// function can treat it as missing.
pub fn range_arg(expr: Expr, fname: &str, pos: usize) -> Result<Expr, ParseError> {
    match expr {
        Expr::Range(_) => Ok(expr),
        Expr::PolyRef(ref c) => Ok(Expr::Range(RangeRef::from_cell(c))),
        Expr::Lit(Value::Empty) => Ok(expr),
        other => Err(ParseError::at(
            ParseErrorKind::InvalidArguments {
                name: fname.to_string(),
                detail: format!("expected a cell range, got '{other}'"),
            },
            pos,
        )),
    }
}

/// Apply the coercion a declared argument kind implies.
pub fn by_kind(kind: ArgKind, expr: Expr, fname: &str, pos: usize) -> Result<Expr, ParseError> {
    Ok(match kind {
        ArgKind::Number => number(expr),
        ArgKind::Int => int(expr),
        ArgKind::Text => text(expr),
        ArgKind::Logical => logical(expr),
        ArgKind::Date => date(expr),
        ArgKind::Range => return range_arg(expr, fname, pos),
        ArgKind::Any => any(expr),
    })
}

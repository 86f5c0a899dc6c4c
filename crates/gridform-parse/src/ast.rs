//! The typed expression tree.
//!
//! Every variant fixes its result category at construction. `PolyRef` is
//! the one exception: the parser emits it for bare references whose target
//! type is still unknown, and the coercion constructors in [`crate::coerce`]
//! eliminate it before an expression ever reaches the evaluator.

use std::fmt;
use std::sync::Arc;

use gridform_common::{ARef, Anchor, CellRange, Value};
use smallvec::SmallVec;

use crate::codec::Decoder;
use crate::traits::Function;

/// A possibly sheet-qualified cell reference with its anchor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellRef {
    pub sheet: Option<String>,
    pub addr: ARef,
    pub anchor: Anchor,
}

/// A possibly sheet-qualified rectangular range; anchors are kept per
/// endpoint for the shifter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RangeRef {
    pub sheet: Option<String>,
    pub range: CellRange,
    pub anchors: (Anchor, Anchor),
}

impl RangeRef {
    /// Collapse a single-cell reference into a 1×1 range.
    pub fn from_cell(cell: &CellRef) -> Self {
        RangeRef {
            sheet: cell.sheet.clone(),
            range: CellRange::single(cell.addr),
            anchors: (cell.anchor, cell.anchor),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicOp {
    And,
    Or,
}

impl LogicOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            LogicOp::And => "AND",
            LogicOp::Or => "OR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "<>",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }
}

/// A typed formula expression.
#[derive(Debug, Clone)]
pub enum Expr {
    /// Constant.
    Lit(Value),
    /// Reference whose target type is not yet known. Transient: exists
    /// only between parsing and argument assembly.
    PolyRef(CellRef),
    /// Reference carrying the decoder its context demands.
    Ref { target: CellRef, decoder: Decoder },
    /// Range literal. Function adapters consume it directly; in scalar
    /// position the evaluator folds it with SUM-over-numeric semantics.
    Range(RangeRef),
    If {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Arith {
        op: ArithOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Logic {
        op: LogicOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Not(Box<Expr>),
    Cmp {
        op: CmpOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Function call bound to its specification at parse time; dispatch is
    /// by spec identity, never by name.
    Call {
        func: Arc<dyn Function>,
        args: Vec<Expr>,
    },
    /// Numeric-context coercions inserted by the parser.
    ToInt(Box<Expr>),
    DateToSerial(Box<Expr>),
    DateTimeToSerial(Box<Expr>),
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        use Expr::*;
        match (self, other) {
            (Lit(a), Lit(b)) => a == b,
            (PolyRef(a), PolyRef(b)) => a == b,
            (
                Ref {
                    target: ta,
                    decoder: da,
                },
                Ref {
                    target: tb,
                    decoder: db,
                },
            ) => ta == tb && da == db,
            (Range(a), Range(b)) => a == b,
            (
                If {
                    cond: ca,
                    then: ta,
                    otherwise: oa,
                },
                If {
                    cond: cb,
                    then: tb,
                    otherwise: ob,
                },
            ) => ca == cb && ta == tb && oa == ob,
            (
                Arith {
                    op: oa,
                    lhs: la,
                    rhs: ra,
                },
                Arith {
                    op: ob,
                    lhs: lb,
                    rhs: rb,
                },
            ) => oa == ob && la == lb && ra == rb,
            (
                Logic {
                    op: oa,
                    lhs: la,
                    rhs: ra,
                },
                Logic {
                    op: ob,
                    lhs: lb,
                    rhs: rb,
                },
            ) => oa == ob && la == lb && ra == rb,
            (Not(a), Not(b)) => a == b,
            (
                Cmp {
                    op: oa,
                    lhs: la,
                    rhs: ra,
                },
                Cmp {
                    op: ob,
                    lhs: lb,
                    rhs: rb,
                },
            ) => oa == ob && la == lb && ra == rb,
            (
                Call {
                    func: fa,
                    args: aa,
                },
                Call {
                    func: fb,
                    args: ab,
                },
            ) => fa.name() == fb.name() && aa == ab,
            (ToInt(a), ToInt(b)) => a == b,
            (DateToSerial(a), DateToSerial(b)) => a == b,
            (DateTimeToSerial(a), DateTimeToSerial(b)) => a == b,
            _ => false,
        }
    }
}

/// Borrowed view of a reference met during traversal.
#[derive(Debug, Clone, Copy)]
pub enum RefSite<'a> {
    Cell(&'a CellRef),
    Range(&'a RangeRef),
}

impl Expr {
    /// Visit every reference in the tree, left to right, without
    /// allocating intermediates.
    pub fn visit_refs<V: FnMut(RefSite<'_>)>(&self, mut visitor: V) {
        let mut stack: SmallVec<[&Expr; 8]> = SmallVec::new();
        stack.push(self);
        while let Some(node) = stack.pop() {
            match node {
                Expr::PolyRef(c) => visitor(RefSite::Cell(c)),
                Expr::Ref { target, .. } => visitor(RefSite::Cell(target)),
                Expr::Range(r) => visitor(RefSite::Range(r)),
                Expr::If {
                    cond,
                    then,
                    otherwise,
                } => {
                    stack.push(otherwise);
                    stack.push(then);
                    stack.push(cond);
                }
                Expr::Arith { lhs, rhs, .. }
                | Expr::Logic { lhs, rhs, .. }
                | Expr::Cmp { lhs, rhs, .. } => {
                    stack.push(rhs);
                    stack.push(lhs);
                }
                Expr::Not(e)
                | Expr::ToInt(e)
                | Expr::DateToSerial(e)
                | Expr::DateTimeToSerial(e) => stack.push(e),
                Expr::Call { args, .. } => {
                    for a in args.iter().rev() {
                        stack.push(a);
                    }
                }
                Expr::Lit(_) => {}
            }
        }
    }

    /// Whether any call in the tree is clock-dependent.
    pub fn contains_volatile(&self) -> bool {
        let mut stack: SmallVec<[&Expr; 8]> = SmallVec::new();
        stack.push(self);
        while let Some(node) = stack.pop() {
            match node {
                Expr::Call { func, args } => {
                    if func.volatile() {
                        return true;
                    }
                    for a in args {
                        stack.push(a);
                    }
                }
                Expr::If {
                    cond,
                    then,
                    otherwise,
                } => {
                    stack.push(cond);
                    stack.push(then);
                    stack.push(otherwise);
                }
                Expr::Arith { lhs, rhs, .. }
                | Expr::Logic { lhs, rhs, .. }
                | Expr::Cmp { lhs, rhs, .. } => {
                    stack.push(lhs);
                    stack.push(rhs);
                }
                Expr::Not(e)
                | Expr::ToInt(e)
                | Expr::DateToSerial(e)
                | Expr::DateTimeToSerial(e) => stack.push(e),
                _ => {}
            }
        }
        false
    }

    /// True once no `PolyRef` remains anywhere in the tree.
    pub fn is_fully_typed(&self) -> bool {
        let mut stack: SmallVec<[&Expr; 8]> = SmallVec::new();
        stack.push(self);
        while let Some(node) = stack.pop() {
            match node {
                Expr::PolyRef(_) => return false,
                Expr::If {
                    cond,
                    then,
                    otherwise,
                } => {
                    stack.push(cond);
                    stack.push(then);
                    stack.push(otherwise);
                }
                Expr::Arith { lhs, rhs, .. }
                | Expr::Logic { lhs, rhs, .. }
                | Expr::Cmp { lhs, rhs, .. } => {
                    stack.push(lhs);
                    stack.push(rhs);
                }
                Expr::Not(e)
                | Expr::ToInt(e)
                | Expr::DateToSerial(e)
                | Expr::DateTimeToSerial(e) => stack.push(e),
                Expr::Call { args, .. } => {
                    for a in args {
                        stack.push(a);
                    }
                }
                _ => {}
            }
        }
        true
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::pretty::write_expr(f, self, 0)
    }
}

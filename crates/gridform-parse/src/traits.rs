//! Object-safe traits at the parse/eval seam.
//!
//! The parser binds function names to specifications while it builds the
//! tree, so the callable surface lives here, next to the AST. The engine
//! crate supplies the implementations: an interpreter implements
//! [`EvalContext`], builtins implement [`Function`], and the registry
//! implements [`FunctionProvider`].

use std::fmt::Debug;
use std::sync::Arc;

use gridform_common::{
    ARef, ArgKind, Arity, CellRange, CellValue, Clock, EvalError, FnFlags, Value,
};

use crate::ast::{Expr, RangeRef};

/* ───────────────────────────── Range ───────────────────────────── */

/// A materialized rectangle of cells, addressed 0-based within itself,
/// row-major.
pub trait Range: Debug {
    fn get(&self, row: usize, col: usize) -> CellValue;
    /// `(rows, cols)`
    fn dimensions(&self) -> (usize, usize);

    fn iter_cells<'a>(&'a self) -> Box<dyn Iterator<Item = CellValue> + 'a> {
        let (rows, cols) = self.dimensions();
        Box::new((0..rows).flat_map(move |r| (0..cols).map(move |c| self.get(r, c))))
    }
}

/// Simple Vec-backed range.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRange {
    data: Vec<Vec<CellValue>>,
}

impl InMemoryRange {
    pub fn new(data: Vec<Vec<CellValue>>) -> Self {
        InMemoryRange { data }
    }
}

impl Range for InMemoryRange {
    fn get(&self, row: usize, col: usize) -> CellValue {
        self.data
            .get(row)
            .and_then(|r| r.get(col))
            .cloned()
            .unwrap_or(CellValue::Empty)
    }

    fn dimensions(&self) -> (usize, usize) {
        (self.data.len(), self.data.first().map_or(0, |r| r.len()))
    }
}

/* ─────────────────────── evaluation context ─────────────────────── */

/// Read-only view the evaluator exposes to function implementations:
/// the current sheet, the workbook behind it, the clock, and recursive
/// expression evaluation.
pub trait EvalContext {
    fn eval_expr(&self, expr: &Expr) -> Result<Value, EvalError>;

    fn resolve_cell(&self, sheet: Option<&str>, addr: ARef) -> Result<CellValue, EvalError>;

    fn resolve_range(
        &self,
        sheet: Option<&str>,
        range: &CellRange,
    ) -> Result<Box<dyn Range>, EvalError>;

    fn clock(&self) -> &dyn Clock;
}

/* ─────────────────────── argument handles ───────────────────────── */

/// A lazily evaluated function argument. Nothing is computed until a
/// function asks, which is what makes AND/OR/IF/IFERROR short-circuit
/// observable.
pub struct ArgumentHandle<'a> {
    node: &'a Expr,
    ctx: &'a dyn EvalContext,
}

impl<'a> ArgumentHandle<'a> {
    pub fn new(node: &'a Expr, ctx: &'a dyn EvalContext) -> Self {
        ArgumentHandle { node, ctx }
    }

    pub fn value(&self) -> Result<Value, EvalError> {
        self.ctx.eval_expr(self.node)
    }

    pub fn range(&self) -> Result<Box<dyn Range>, EvalError> {
        match self.node {
            Expr::Range(r) => self.ctx.resolve_range(r.sheet.as_deref(), &r.range),
            Expr::Ref { target, .. } => self
                .ctx
                .resolve_cell(target.sheet.as_deref(), target.addr)
                .map(|cell| Box::new(InMemoryRange::new(vec![vec![cell]])) as Box<dyn Range>),
            _ => Err(EvalError::failed(format!(
                "expected a range argument, got '{}'",
                self.node
            ))),
        }
    }

    pub fn expr(&self) -> &'a Expr {
        self.node
    }

    /// The range node itself, for functions that care about shape or
    /// coordinates rather than contents (ROW, COLUMN, ROWS, COLUMNS).
    pub fn range_ref(&self) -> Option<&'a RangeRef> {
        match self.node {
            Expr::Range(r) => Some(r),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self.node, Expr::Lit(Value::Empty))
    }
}

/* ───────────────────────────── functions ────────────────────────── */

/// A function specification: static metadata plus the evaluator. Stored
/// behind `Arc` in the registry and inside `Call` nodes.
pub trait Function: Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn arity(&self) -> Arity;

    /// Per-position argument shapes; for variadic functions the last kind
    /// repeats. Drives the parser's coercion of each argument.
    fn arg_kinds(&self) -> &'static [ArgKind];

    fn flags(&self) -> FnFlags {
        FnFlags::empty()
    }

    fn volatile(&self) -> bool {
        self.flags().contains(FnFlags::VOLATILE)
    }

    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError>;
}

/// Name resolution used by the parser: case-insensitive lookup plus the
/// candidate list that feeds "did you mean" suggestions.
pub trait FunctionProvider {
    fn lookup(&self, name: &str) -> Option<Arc<dyn Function>>;
    fn names(&self) -> Vec<&'static str>;
}

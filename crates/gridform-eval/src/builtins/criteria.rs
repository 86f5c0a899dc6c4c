//! Criteria matching and the conditional aggregates (SUMIF/COUNTIF/
//! AVERAGEIF and their multi-condition IFS variants).

use std::sync::Arc;

use gridform_common::{ArgKind, Arity, CellValue, EvalError, Value};
use gridform_parse::{ArgumentHandle, CmpOp, EvalContext, Function, Range};

use crate::coercion::{cell_number, cell_to_value};
use crate::interpreter::compare;
use crate::registry::FunctionRegistry;

/* ─────────────────────── criteria matching ──────────────────────── */

/// A parsed criteria expression, e.g. `">=10"`, `"Apple"`, `"A*"`.
#[derive(Debug, Clone, PartialEq)]
pub enum CriteriaMatcher {
    Equals(Value),
    NotEquals(Value),
    Compare(CmpOp, f64),
    Wildcard(String),
    IsBlank,
}

impl CriteriaMatcher {
    /// Build a matcher from a criteria value. Text criteria may lead with
    /// a comparison operator; `?`/`*` make a glob; anything else is an
    /// equality test.
    pub fn parse(criteria: &Value) -> Result<Self, EvalError> {
        match criteria {
            Value::Text(s) => {
                let trimmed = s.trim();
                for (prefix, op) in [
                    (">=", CmpOp::Ge),
                    ("<=", CmpOp::Le),
                    ("<>", CmpOp::Ne),
                    (">", CmpOp::Gt),
                    ("<", CmpOp::Lt),
                    ("=", CmpOp::Eq),
                ] {
                    if let Some(rhs) = trimmed.strip_prefix(prefix) {
                        let rhs = rhs.trim();
                        if let Ok(n) = rhs.parse::<f64>() {
                            return Ok(match op {
                                CmpOp::Eq => CriteriaMatcher::Equals(Value::Number(n)),
                                CmpOp::Ne => CriteriaMatcher::NotEquals(Value::Number(n)),
                                other => CriteriaMatcher::Compare(other, n),
                            });
                        }
                        return Ok(match op {
                            CmpOp::Ne => {
                                CriteriaMatcher::NotEquals(Value::Text(rhs.to_string()))
                            }
                            _ => CriteriaMatcher::Equals(Value::Text(rhs.to_string())),
                        });
                    }
                }
                if trimmed.contains('*') || trimmed.contains('?') {
                    return Ok(CriteriaMatcher::Wildcard(trimmed.to_string()));
                }
                Ok(CriteriaMatcher::Equals(Value::Text(trimmed.to_string())))
            }
            Value::Empty => Ok(CriteriaMatcher::IsBlank),
            Value::Error(k) => Err(crate::coercion::error_value(*k)),
            other => Ok(CriteriaMatcher::Equals(other.clone())),
        }
    }

    pub fn matches(&self, cell: &CellValue) -> bool {
        match self {
            CriteriaMatcher::IsBlank => cell.is_empty(),
            CriteriaMatcher::Equals(expected) => {
                let actual = cell_to_value(cell);
                if matches!(actual, Value::Error(_)) {
                    return false;
                }
                // An empty cell only matches an explicit empty criteria.
                if cell.is_empty() {
                    return false;
                }
                compare(CmpOp::Eq, &actual, expected).unwrap_or(false)
            }
            CriteriaMatcher::NotEquals(expected) => {
                let actual = cell_to_value(cell);
                if matches!(actual, Value::Error(_)) {
                    return false;
                }
                compare(CmpOp::Ne, &actual, expected).unwrap_or(false)
            }
            CriteriaMatcher::Compare(op, n) => match cell_number(cell) {
                Ok(Some(actual)) => {
                    compare(*op, &Value::Number(actual), &Value::Number(*n)).unwrap_or(false)
                }
                _ => false,
            },
            CriteriaMatcher::Wildcard(pattern) => match cell {
                CellValue::Text(s) => wildcard_match(pattern, s),
                CellValue::Rich(rt) => wildcard_match(pattern, &rt.plain()),
                _ => false,
            },
        }
    }
}

/// Case-insensitive glob with `?` (one char) and `*` (any run). No
/// regular expressions involved.
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.to_lowercase().chars().collect();
    let t: Vec<char> = text.to_lowercase().chars().collect();

    let (mut pi, mut ti) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

/* ───────────────────── single-condition family ──────────────────── */

fn matcher_from(arg: &ArgumentHandle<'_>) -> Result<CriteriaMatcher, EvalError> {
    CriteriaMatcher::parse(&arg.value()?)
}

fn paired_dims(
    name: &str,
    a: &dyn Range,
    b: &dyn Range,
) -> Result<(usize, usize), EvalError> {
    if a.dimensions() != b.dimensions() {
        return Err(EvalError::failed(format!(
            "{name}: condition range {}x{} does not match target range {}x{}",
            a.dimensions().0,
            a.dimensions().1,
            b.dimensions().0,
            b.dimensions().1,
        )));
    }
    Ok(a.dimensions())
}

#[derive(Debug)]
struct SumIfFn;

impl Function for SumIfFn {
    fn name(&self) -> &'static str {
        "SUMIF"
    }
    fn arity(&self) -> Arity {
        Arity::Range(2, 3)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[ArgKind::Range, ArgKind::Any, ArgKind::Range]
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let criteria_range = args[0].range()?;
        let matcher = matcher_from(&args[1])?;
        let mut total = 0.0;
        if args.len() > 2 && !args[2].is_missing() {
            let sum_range = args[2].range()?;
            let (rows, cols) = paired_dims("SUMIF", criteria_range.as_ref(), sum_range.as_ref())?;
            for r in 0..rows {
                for c in 0..cols {
                    if matcher.matches(&criteria_range.get(r, c)) {
                        if let Some(n) = cell_number(&sum_range.get(r, c))? {
                            total += n;
                        }
                    }
                }
            }
        } else {
            for cell in criteria_range.iter_cells() {
                if matcher.matches(&cell) {
                    if let Some(n) = cell_number(&cell)? {
                        total += n;
                    }
                }
            }
        }
        Ok(Value::Number(total))
    }
}

#[derive(Debug)]
struct CountIfFn;

impl Function for CountIfFn {
    fn name(&self) -> &'static str {
        "COUNTIF"
    }
    fn arity(&self) -> Arity {
        Arity::Exact(2)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[ArgKind::Range, ArgKind::Any]
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let range = args[0].range()?;
        let matcher = matcher_from(&args[1])?;
        let count = range.iter_cells().filter(|c| matcher.matches(c)).count();
        Ok(Value::Int(count as i64))
    }
}

#[derive(Debug)]
struct AverageIfFn;

impl Function for AverageIfFn {
    fn name(&self) -> &'static str {
        "AVERAGEIF"
    }
    fn arity(&self) -> Arity {
        Arity::Range(2, 3)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[ArgKind::Range, ArgKind::Any, ArgKind::Range]
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let criteria_range = args[0].range()?;
        let matcher = matcher_from(&args[1])?;
        let mut total = 0.0;
        let mut count = 0usize;

        let mut add = |cell: &CellValue| -> Result<(), EvalError> {
            if let Some(n) = cell_number(cell)? {
                total += n;
                count += 1;
            }
            Ok(())
        };

        if args.len() > 2 && !args[2].is_missing() {
            let avg_range = args[2].range()?;
            let (rows, cols) =
                paired_dims("AVERAGEIF", criteria_range.as_ref(), avg_range.as_ref())?;
            for r in 0..rows {
                for c in 0..cols {
                    if matcher.matches(&criteria_range.get(r, c)) {
                        add(&avg_range.get(r, c))?;
                    }
                }
            }
        } else {
            for cell in criteria_range.iter_cells() {
                if matcher.matches(&cell) {
                    add(&cell)?;
                }
            }
        }

        if count == 0 {
            return Err(EvalError::DivByZero {
                numerator: "AVERAGEIF".to_string(),
                denominator: "0".to_string(),
            });
        }
        Ok(Value::Number(total / count as f64))
    }
}

/* ─────────────────────── multi-condition family ─────────────────── */

/// Collect the `(range, matcher)` pairs of an IFS argument tail and check
/// every range shares `dims`.
fn condition_pairs(
    name: &str,
    args: &[ArgumentHandle<'_>],
    dims: (usize, usize),
) -> Result<Vec<(Box<dyn Range>, CriteriaMatcher)>, EvalError> {
    if args.len() % 2 != 0 {
        return Err(EvalError::failed(format!(
            "{name}: conditions come in range/criteria pairs"
        )));
    }
    let mut pairs = Vec::with_capacity(args.len() / 2);
    for pair in args.chunks(2) {
        let range = pair[0].range()?;
        if range.dimensions() != dims {
            return Err(EvalError::failed(format!(
                "{name}: all condition ranges must be {}x{}",
                dims.0, dims.1
            )));
        }
        let matcher = matcher_from(&pair[1])?;
        pairs.push((range, matcher));
    }
    Ok(pairs)
}

fn all_match(pairs: &[(Box<dyn Range>, CriteriaMatcher)], r: usize, c: usize) -> bool {
    pairs
        .iter()
        .all(|(range, matcher)| matcher.matches(&range.get(r, c)))
}

#[derive(Debug)]
struct SumIfsFn;

impl Function for SumIfsFn {
    fn name(&self) -> &'static str {
        "SUMIFS"
    }
    fn arity(&self) -> Arity {
        Arity::AtLeast(3)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[ArgKind::Range, ArgKind::Range, ArgKind::Any]
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let sum_range = args[0].range()?;
        let dims = sum_range.dimensions();
        let pairs = condition_pairs("SUMIFS", &args[1..], dims)?;
        let mut total = 0.0;
        for r in 0..dims.0 {
            for c in 0..dims.1 {
                if all_match(&pairs, r, c) {
                    if let Some(n) = cell_number(&sum_range.get(r, c))? {
                        total += n;
                    }
                }
            }
        }
        Ok(Value::Number(total))
    }
}

#[derive(Debug)]
struct CountIfsFn;

impl Function for CountIfsFn {
    fn name(&self) -> &'static str {
        "COUNTIFS"
    }
    fn arity(&self) -> Arity {
        Arity::AtLeast(2)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[ArgKind::Range, ArgKind::Any]
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let first = args[0].range()?;
        let dims = first.dimensions();
        let pairs = condition_pairs("COUNTIFS", args, dims)?;
        let mut count = 0i64;
        for r in 0..dims.0 {
            for c in 0..dims.1 {
                if all_match(&pairs, r, c) {
                    count += 1;
                }
            }
        }
        Ok(Value::Int(count))
    }
}

#[derive(Debug)]
struct AverageIfsFn;

impl Function for AverageIfsFn {
    fn name(&self) -> &'static str {
        "AVERAGEIFS"
    }
    fn arity(&self) -> Arity {
        Arity::AtLeast(3)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[ArgKind::Range, ArgKind::Range, ArgKind::Any]
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let avg_range = args[0].range()?;
        let dims = avg_range.dimensions();
        let pairs = condition_pairs("AVERAGEIFS", &args[1..], dims)?;
        let mut total = 0.0;
        let mut count = 0usize;
        for r in 0..dims.0 {
            for c in 0..dims.1 {
                if all_match(&pairs, r, c) {
                    if let Some(n) = cell_number(&avg_range.get(r, c))? {
                        total += n;
                        count += 1;
                    }
                }
            }
        }
        if count == 0 {
            return Err(EvalError::DivByZero {
                numerator: "AVERAGEIFS".to_string(),
                denominator: "0".to_string(),
            });
        }
        Ok(Value::Number(total / count as f64))
    }
}

pub fn register(reg: &mut FunctionRegistry) {
    reg.register(Arc::new(SumIfFn));
    reg.register(Arc::new(CountIfFn));
    reg.register(Arc::new(AverageIfFn));
    reg.register(Arc::new(SumIfsFn));
    reg.register(Arc::new(CountIfsFn));
    reg.register(Arc::new(AverageIfsFn));
}

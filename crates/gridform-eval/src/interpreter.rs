//! Structural recursion over the typed expression tree.
//!
//! The interpreter is a read-only view: it never mutates the workbook.
//! Conditionals and logical operators evaluate lazily, so the skipped
//! branch of an `IF` and the right side of a short-circuited `AND`/`OR`
//! are never touched.

use gridform_common::{ARef, CellRange, CellValue, Clock, EvalError, Value};
use gridform_parse::codec::Decoder;
use gridform_parse::{ArgumentHandle, CmpOp, EvalContext, Expr, InMemoryRange, LogicOp, Range};

use crate::coercion::{cell_number, error_value, to_bool, to_number};
use crate::workbook::Workbook;

/// Denominators within this band of zero divide-fail.
pub const DIV_EPSILON: f64 = 1e-10;

pub struct Interpreter<'a> {
    workbook: &'a Workbook,
    sheet: &'a str,
    clock: &'a dyn Clock,
}

impl<'a> Interpreter<'a> {
    pub fn new(workbook: &'a Workbook, sheet: &'a str, clock: &'a dyn Clock) -> Self {
        Interpreter {
            workbook,
            sheet,
            clock,
        }
    }

    pub fn evaluate(&self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Lit(v) => Ok(v.clone()),
            Expr::PolyRef(c) => Err(EvalError::failed(format!(
                "polymorphic reference {} reached evaluation",
                c.addr.to_a1()
            ))),
            Expr::Ref { target, decoder } => {
                let cell = self.resolve_cell(target.sheet.as_deref(), target.addr)?;
                if cell.is_empty()
                    && matches!(
                        decoder,
                        Decoder::Number | Decoder::Int | Decoder::Bool | Decoder::Date
                    )
                {
                    return Err(EvalError::RefError {
                        addr: target.addr,
                        reason: format!("empty cell used as {}", decoder.name()),
                    });
                }
                decoder.decode(&cell).map_err(|source| EvalError::CodecFailed {
                    addr: target.addr,
                    source,
                })
            }
            // A bare range in scalar position folds like SUM.
            Expr::Range(r) => {
                let range = self.resolve_range(r.sheet.as_deref(), &r.range)?;
                let mut total = 0.0;
                for cell in range.iter_cells() {
                    if let Some(n) = cell_number(&cell)? {
                        total += n;
                    }
                }
                Ok(Value::Number(total))
            }
            Expr::If {
                cond,
                then,
                otherwise,
            } => {
                if to_bool(&self.evaluate(cond)?)? {
                    self.evaluate(then)
                } else {
                    self.evaluate(otherwise)
                }
            }
            Expr::Arith { op, lhs, rhs } => {
                let a = to_number(&self.evaluate(lhs)?)?;
                let b = to_number(&self.evaluate(rhs)?)?;
                use gridform_parse::ArithOp::*;
                match op {
                    Add => Ok(Value::Number(a + b)),
                    Sub => Ok(Value::Number(a - b)),
                    Mul => Ok(Value::Number(a * b)),
                    Div => {
                        if b.abs() < DIV_EPSILON {
                            Err(EvalError::DivByZero {
                                numerator: lhs.to_string(),
                                denominator: rhs.to_string(),
                            })
                        } else {
                            Ok(Value::Number(a / b))
                        }
                    }
                }
            }
            Expr::Logic { op, lhs, rhs } => {
                let left = to_bool(&self.evaluate(lhs)?)?;
                match op {
                    LogicOp::And if !left => Ok(Value::Bool(false)),
                    LogicOp::Or if left => Ok(Value::Bool(true)),
                    _ => Ok(Value::Bool(to_bool(&self.evaluate(rhs)?)?)),
                }
            }
            Expr::Not(e) => Ok(Value::Bool(!to_bool(&self.evaluate(e)?)?)),
            Expr::Cmp { op, lhs, rhs } => {
                let a = self.evaluate(lhs)?;
                let b = self.evaluate(rhs)?;
                compare(*op, &a, &b).map(Value::Bool)
            }
            Expr::Call { func, args } => {
                let handles: Vec<ArgumentHandle<'_>> =
                    args.iter().map(|n| ArgumentHandle::new(n, self)).collect();
                func.eval(&handles, self)
            }
            Expr::ToInt(e) => {
                let n = to_number(&self.evaluate(e)?)?;
                let t = n.trunc();
                if t < i32::MIN as f64 || t > i32::MAX as f64 {
                    return Err(EvalError::TypeMismatch {
                        op: "integer",
                        expected: "32-bit integer",
                        actual: n.to_string(),
                    });
                }
                Ok(Value::Int(t as i64))
            }
            Expr::DateToSerial(e) => {
                let v = self.evaluate(e)?;
                match v {
                    Value::Date(d) => Ok(Value::Number(gridform_common::date_to_serial(&d))),
                    Value::DateTime(dt) => {
                        Ok(Value::Number(gridform_common::date_to_serial(&dt.date())))
                    }
                    Value::Number(_) | Value::Int(_) => Ok(v),
                    other => Err(EvalError::TypeMismatch {
                        op: "date serial",
                        expected: "date",
                        actual: other.kind_name().to_string(),
                    }),
                }
            }
            Expr::DateTimeToSerial(e) => {
                let v = self.evaluate(e)?;
                match v {
                    Value::Date(d) => Ok(Value::Number(gridform_common::date_to_serial(&d))),
                    Value::DateTime(dt) => {
                        Ok(Value::Number(gridform_common::datetime_to_serial(&dt)))
                    }
                    Value::Number(_) | Value::Int(_) => Ok(v),
                    other => Err(EvalError::TypeMismatch {
                        op: "datetime serial",
                        expected: "datetime",
                        actual: other.kind_name().to_string(),
                    }),
                }
            }
        }
    }
}

impl EvalContext for Interpreter<'_> {
    fn eval_expr(&self, expr: &Expr) -> Result<Value, EvalError> {
        self.evaluate(expr)
    }

    fn resolve_cell(&self, sheet: Option<&str>, addr: ARef) -> Result<CellValue, EvalError> {
        let name = sheet.unwrap_or(self.sheet);
        let sheet = self
            .workbook
            .sheet_by_name(name)
            .ok_or_else(|| EvalError::RefError {
                addr,
                reason: format!("unknown sheet '{name}'"),
            })?;
        Ok(sheet.get(addr).cloned().unwrap_or(CellValue::Empty))
    }

    fn resolve_range(
        &self,
        sheet: Option<&str>,
        range: &CellRange,
    ) -> Result<Box<dyn Range>, EvalError> {
        let name = sheet.unwrap_or(self.sheet);
        let sheet = self
            .workbook
            .sheet_by_name(name)
            .ok_or_else(|| EvalError::RefError {
                addr: range.top_left(),
                reason: format!("unknown sheet '{name}'"),
            })?;

        let mut data = Vec::with_capacity(range.height() as usize);
        for row in range.start_row..=range.end_row {
            let mut cells = Vec::with_capacity(range.width() as usize);
            for col in range.start_col..=range.end_col {
                cells.push(
                    sheet
                        .get(ARef::new(col, row))
                        .cloned()
                        .unwrap_or(CellValue::Empty),
                );
            }
            data.push(cells);
        }
        Ok(Box::new(InMemoryRange::new(data)))
    }

    fn clock(&self) -> &dyn Clock {
        self.clock
    }
}

/// Comparison across runtime values. Same-kind values compare directly
/// (text case-insensitively); mixed kinds go through numeric coercion,
/// then fall back to text form.
pub fn compare(op: CmpOp, a: &Value, b: &Value) -> Result<bool, EvalError> {
    if let Value::Error(k) = a {
        return Err(error_value(*k));
    }
    if let Value::Error(k) = b {
        return Err(error_value(*k));
    }

    let ordering = match (a, b) {
        (Value::Text(x), Value::Text(y)) => x.to_lowercase().cmp(&y.to_lowercase()),
        _ => {
            let an = a.as_serial_number();
            let bn = b.as_serial_number();
            match (an, bn) {
                (Some(x), Some(y)) => match x.partial_cmp(&y) {
                    Some(o) => o,
                    None => {
                        return Err(EvalError::TypeMismatch {
                            op: "compare",
                            expected: "ordered values",
                            actual: "NaN".to_string(),
                        });
                    }
                },
                _ => {
                    // Numeric text against a number, empty against text, …
                    let ax = a.to_string().to_lowercase();
                    let bx = b.to_string().to_lowercase();
                    match (ax.parse::<f64>(), bx.parse::<f64>()) {
                        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
                        _ => ax.cmp(&bx),
                    }
                }
            }
        }
    };

    Ok(match op {
        CmpOp::Eq => ordering.is_eq(),
        CmpOp::Ne => !ordering.is_eq(),
        CmpOp::Lt => ordering.is_lt(),
        CmpOp::Le => ordering.is_le(),
        CmpOp::Gt => ordering.is_gt(),
        CmpOp::Ge => ordering.is_ge(),
    })
}

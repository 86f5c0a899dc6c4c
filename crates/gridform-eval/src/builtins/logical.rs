//! Logical functions. AND and OR stop evaluating arguments as soon as the
//! outcome is decided, which the arithmetic in a skipped argument can
//! observe (a division by zero there never fires).

use std::sync::Arc;

use gridform_common::{ArgKind, Arity, EvalError, Value};
use gridform_parse::{ArgumentHandle, EvalContext, Function, Range};

use crate::coercion::to_bool;
use crate::registry::FunctionRegistry;

const ANY_TAIL: &[ArgKind] = &[ArgKind::Any];

/* ─────────────────────────── TRUE() / FALSE() ───────────────── */

#[derive(Debug)]
struct TrueFn;

impl Function for TrueFn {
    fn name(&self) -> &'static str {
        "TRUE"
    }
    fn arity(&self) -> Arity {
        Arity::Exact(0)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[]
    }
    fn eval(
        &self,
        _args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        Ok(Value::Bool(true))
    }
}

#[derive(Debug)]
struct FalseFn;

impl Function for FalseFn {
    fn name(&self) -> &'static str {
        "FALSE"
    }
    fn arity(&self) -> Arity {
        Arity::Exact(0)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[]
    }
    fn eval(
        &self,
        _args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        Ok(Value::Bool(false))
    }
}

/* ─────────────────────────── NOT() ──────────────────────────── */

#[derive(Debug)]
struct NotFn;

impl Function for NotFn {
    fn name(&self) -> &'static str {
        "NOT"
    }
    fn arity(&self) -> Arity {
        Arity::Exact(1)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[ArgKind::Logical]
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        Ok(Value::Bool(!to_bool(&args[0].value()?)?))
    }
}

/* ─────────────────────────── AND() / OR() / XOR() ───────────── */

#[derive(Debug)]
struct AndFn;

impl Function for AndFn {
    fn name(&self) -> &'static str {
        "AND"
    }
    fn arity(&self) -> Arity {
        Arity::AtLeast(1)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        ANY_TAIL
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        for arg in args {
            if !to_bool(&arg.value()?)? {
                return Ok(Value::Bool(false));
            }
        }
        Ok(Value::Bool(true))
    }
}

#[derive(Debug)]
struct OrFn;

impl Function for OrFn {
    fn name(&self) -> &'static str {
        "OR"
    }
    fn arity(&self) -> Arity {
        Arity::AtLeast(1)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        ANY_TAIL
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        for arg in args {
            if to_bool(&arg.value()?)? {
                return Ok(Value::Bool(true));
            }
        }
        Ok(Value::Bool(false))
    }
}

#[derive(Debug)]
struct XorFn;

impl Function for XorFn {
    fn name(&self) -> &'static str {
        "XOR"
    }
    fn arity(&self) -> Arity {
        Arity::AtLeast(1)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        ANY_TAIL
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let mut parity = false;
        for arg in args {
            if to_bool(&arg.value()?)? {
                parity = !parity;
            }
        }
        Ok(Value::Bool(parity))
    }
}

/* ─────────────────────────── IFERROR() ──────────────────────── */

#[derive(Debug)]
struct IfErrorFn;

impl Function for IfErrorFn {
    fn name(&self) -> &'static str {
        "IFERROR"
    }
    fn arity(&self) -> Arity {
        Arity::Exact(2)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[ArgKind::Any, ArgKind::Any]
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        match args[0].value() {
            Ok(Value::Error(_)) | Err(_) => args[1].value(),
            Ok(v) => Ok(v),
        }
    }
}

/* ─────────────────────────── ISBLANK() / ISNUMBER() ─────────── */

#[derive(Debug)]
struct IsBlankFn;

impl Function for IsBlankFn {
    fn name(&self) -> &'static str {
        "ISBLANK"
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
        let range = args[0].range()?;
        let blank = range.iter_cells().all(|c| c.is_empty());
        Ok(Value::Bool(blank))
    }
}

#[derive(Debug)]
struct IsNumberFn;

impl Function for IsNumberFn {
    fn name(&self) -> &'static str {
        "ISNUMBER"
    }
    fn arity(&self) -> Arity {
        Arity::Exact(1)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        ANY_TAIL
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let is_num = matches!(args[0].value()?, Value::Number(_) | Value::Int(_));
        Ok(Value::Bool(is_num))
    }
}

#[derive(Debug)]
struct IsErrorFn;

impl Function for IsErrorFn {
    fn name(&self) -> &'static str {
        "ISERROR"
    }
    fn arity(&self) -> Arity {
        Arity::Exact(1)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        ANY_TAIL
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        match args[0].value() {
            Ok(Value::Error(_)) | Err(_) => Ok(Value::Bool(true)),
            Ok(_) => Ok(Value::Bool(false)),
        }
    }
}

pub fn register(reg: &mut FunctionRegistry) {
    reg.register(Arc::new(TrueFn));
    reg.register(Arc::new(FalseFn));
    reg.register(Arc::new(NotFn));
    reg.register(Arc::new(AndFn));
    reg.register(Arc::new(OrFn));
    reg.register(Arc::new(XorFn));
    reg.register(Arc::new(IfErrorFn));
    reg.register(Arc::new(IsBlankFn));
    reg.register(Arc::new(IsNumberFn));
    reg.register(Arc::new(IsErrorFn));
}

#[cfg(test)]
mod tests {
    use crate::test_support::eval_str;
    use gridform_common::Value;

    #[test]
    fn and_or_xor() {
        assert_eq!(eval_str("=AND(TRUE,1)"), Value::Bool(true));
        assert_eq!(eval_str("=AND(TRUE,0)"), Value::Bool(false));
        assert_eq!(eval_str("=OR(FALSE,0)"), Value::Bool(false));
        assert_eq!(eval_str("=OR(FALSE,1)"), Value::Bool(true));
        assert_eq!(eval_str("=XOR(TRUE,TRUE)"), Value::Bool(false));
        assert_eq!(eval_str("=XOR(TRUE,FALSE,FALSE)"), Value::Bool(true));
    }

    #[test]
    fn and_short_circuits_past_poison() {
        // 1/0 would be a DivByZero if it were ever evaluated.
        assert_eq!(eval_str("=AND(FALSE,1/0)"), Value::Bool(false));
        assert_eq!(eval_str("=OR(TRUE,1/0)"), Value::Bool(true));
    }

    #[test]
    fn word_operators_short_circuit_too() {
        assert_eq!(eval_str("=FALSE AND 1/0"), Value::Bool(false));
        assert_eq!(eval_str("=TRUE OR 1/0"), Value::Bool(true));
        assert_eq!(eval_str("=NOT TRUE AND FALSE"), Value::Bool(false));
    }

    #[test]
    fn iferror_catches_both_error_forms() {
        assert_eq!(eval_str("=IFERROR(1/0,42)"), Value::Number(42.0));
        assert_eq!(eval_str("=IFERROR(SQRT(-1),7)"), Value::Number(7.0));
        assert_eq!(eval_str("=IFERROR(5,42)"), Value::Number(5.0));
    }

    #[test]
    fn if_special_form_is_lazy() {
        assert_eq!(eval_str("=IF(TRUE,1,1/0)"), Value::Number(1.0));
        assert_eq!(eval_str("=IF(FALSE,1/0,2)"), Value::Number(2.0));
        assert_eq!(eval_str("=IF(FALSE,1)"), Value::Bool(false));
    }
}

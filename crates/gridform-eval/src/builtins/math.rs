//! Scalar math functions.

use std::sync::Arc;

use gridform_common::{ArgKind, Arity, ErrorKind, EvalError, Value};
use gridform_parse::{ArgumentHandle, EvalContext, Function};

use super::support::{for_each_number, num_at, opt_int, opt_num};
use crate::registry::FunctionRegistry;

const ONE_NUM: &[ArgKind] = &[ArgKind::Number];
const TWO_NUM: &[ArgKind] = &[ArgKind::Number, ArgKind::Number];
const ANY_TAIL: &[ArgKind] = &[ArgKind::Any];

fn num_error() -> Result<Value, EvalError> {
    Ok(Value::Error(ErrorKind::Num))
}

/// Excel-style rounding: half away from zero at a digit offset.
fn round_to_digits(n: f64, digits: i64) -> f64 {
    let factor = 10f64.powi(digits as i32);
    (n * factor).round() / factor
}

/* ─────────────────────────── ABS() ──────────────────────────── */

#[derive(Debug)]
struct AbsFn;

impl Function for AbsFn {
    fn name(&self) -> &'static str {
        "ABS"
    }
    fn arity(&self) -> Arity {
        Arity::Exact(1)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        ONE_NUM
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        Ok(Value::Number(num_at(args, 0)?.abs()))
    }
}

/* ─────────────────────────── SIGN() ─────────────────────────── */

#[derive(Debug)]
struct SignFn;

impl Function for SignFn {
    fn name(&self) -> &'static str {
        "SIGN"
    }
    fn arity(&self) -> Arity {
        Arity::Exact(1)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        ONE_NUM
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let n = num_at(args, 0)?;
        let sign = if n > 0.0 {
            1
        } else if n < 0.0 {
            -1
        } else {
            0
        };
        Ok(Value::Int(sign))
    }
}

/* ─────────────────────────── INT() ──────────────────────────── */

#[derive(Debug)]
struct IntFn;

impl Function for IntFn {
    fn name(&self) -> &'static str {
        "INT"
    }
    fn arity(&self) -> Arity {
        Arity::Exact(1)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        ONE_NUM
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        // Rounds down, not toward zero: INT(-1.5) = -2.
        Ok(Value::Number(num_at(args, 0)?.floor()))
    }
}

/* ─────────────────────────── MOD() ──────────────────────────── */

#[derive(Debug)]
struct ModFn;

impl Function for ModFn {
    fn name(&self) -> &'static str {
        "MOD"
    }
    fn arity(&self) -> Arity {
        Arity::Exact(2)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        TWO_NUM
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let n = num_at(args, 0)?;
        let d = num_at(args, 1)?;
        if d == 0.0 {
            return Err(EvalError::DivByZero {
                numerator: n.to_string(),
                denominator: "0".to_string(),
            });
        }
        // Result takes the sign of the divisor.
        Ok(Value::Number(n - d * (n / d).floor()))
    }
}

/* ─────────────────────────── SQRT() ─────────────────────────── */

#[derive(Debug)]
struct SqrtFn;

impl Function for SqrtFn {
    fn name(&self) -> &'static str {
        "SQRT"
    }
    fn arity(&self) -> Arity {
        Arity::Exact(1)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        ONE_NUM
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let n = num_at(args, 0)?;
        if n < 0.0 {
            return num_error();
        }
        Ok(Value::Number(n.sqrt()))
    }
}

/* ─────────────────────────── POWER() ────────────────────────── */

#[derive(Debug)]
struct PowerFn;

impl Function for PowerFn {
    fn name(&self) -> &'static str {
        "POWER"
    }
    fn arity(&self) -> Arity {
        Arity::Exact(2)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        TWO_NUM
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let base = num_at(args, 0)?;
        let exp = num_at(args, 1)?;
        let out = base.powf(exp);
        if out.is_nan() || out.is_infinite() {
            return num_error();
        }
        Ok(Value::Number(out))
    }
}

/* ─────────────────────────── EXP() / LN() / LOG() ───────────── */

#[derive(Debug)]
struct ExpFn;

impl Function for ExpFn {
    fn name(&self) -> &'static str {
        "EXP"
    }
    fn arity(&self) -> Arity {
        Arity::Exact(1)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        ONE_NUM
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        Ok(Value::Number(num_at(args, 0)?.exp()))
    }
}

#[derive(Debug)]
struct LnFn;

impl Function for LnFn {
    fn name(&self) -> &'static str {
        "LN"
    }
    fn arity(&self) -> Arity {
        Arity::Exact(1)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        ONE_NUM
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let n = num_at(args, 0)?;
        if n <= 0.0 {
            return num_error();
        }
        Ok(Value::Number(n.ln()))
    }
}

#[derive(Debug)]
struct LogFn;

impl Function for LogFn {
    fn name(&self) -> &'static str {
        "LOG"
    }
    fn arity(&self) -> Arity {
        Arity::Range(1, 2)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        TWO_NUM
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let n = num_at(args, 0)?;
        let base = opt_num(args, 1, 10.0)?;
        if n <= 0.0 || base <= 0.0 || base == 1.0 {
            return num_error();
        }
        Ok(Value::Number(n.log(base)))
    }
}

#[derive(Debug)]
struct Log10Fn;

impl Function for Log10Fn {
    fn name(&self) -> &'static str {
        "LOG10"
    }
    fn arity(&self) -> Arity {
        Arity::Exact(1)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        ONE_NUM
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let n = num_at(args, 0)?;
        if n <= 0.0 {
            return num_error();
        }
        Ok(Value::Number(n.log10()))
    }
}

/* ─────────────────────────── PI() ───────────────────────────── */

#[derive(Debug)]
struct PiFn;

impl Function for PiFn {
    fn name(&self) -> &'static str {
        "PI"
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
        Ok(Value::Number(std::f64::consts::PI))
    }
}

/* ─────────────── ROUND() / ROUNDUP() / ROUNDDOWN() / TRUNC() ── */

#[derive(Debug)]
struct RoundFn;

impl Function for RoundFn {
    fn name(&self) -> &'static str {
        "ROUND"
    }
    fn arity(&self) -> Arity {
        Arity::Range(1, 2)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[ArgKind::Number, ArgKind::Int]
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let n = num_at(args, 0)?;
        let digits = opt_int(args, 1, 0)?;
        Ok(Value::Number(round_to_digits(n, digits)))
    }
}

#[derive(Debug)]
struct RoundUpFn;

impl Function for RoundUpFn {
    fn name(&self) -> &'static str {
        "ROUNDUP"
    }
    fn arity(&self) -> Arity {
        Arity::Range(1, 2)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[ArgKind::Number, ArgKind::Int]
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let n = num_at(args, 0)?;
        let digits = opt_int(args, 1, 0)?;
        let factor = 10f64.powi(digits as i32);
        let scaled = n * factor;
        let rounded = if scaled >= 0.0 {
            scaled.ceil()
        } else {
            scaled.floor()
        };
        Ok(Value::Number(rounded / factor))
    }
}

#[derive(Debug)]
struct RoundDownFn;

impl Function for RoundDownFn {
    fn name(&self) -> &'static str {
        "ROUNDDOWN"
    }
    fn arity(&self) -> Arity {
        Arity::Range(1, 2)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[ArgKind::Number, ArgKind::Int]
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let n = num_at(args, 0)?;
        let digits = opt_int(args, 1, 0)?;
        let factor = 10f64.powi(digits as i32);
        Ok(Value::Number((n * factor).trunc() / factor))
    }
}

#[derive(Debug)]
struct TruncFn;

impl Function for TruncFn {
    fn name(&self) -> &'static str {
        "TRUNC"
    }
    fn arity(&self) -> Arity {
        Arity::Range(1, 2)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[ArgKind::Number, ArgKind::Int]
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let n = num_at(args, 0)?;
        let digits = opt_int(args, 1, 0)?;
        let factor = 10f64.powi(digits as i32);
        Ok(Value::Number((n * factor).trunc() / factor))
    }
}

/* ─────────────────────────── CEILING() / FLOOR() ────────────── */

#[derive(Debug)]
struct CeilingFn;

impl Function for CeilingFn {
    fn name(&self) -> &'static str {
        "CEILING"
    }
    fn arity(&self) -> Arity {
        Arity::Range(1, 2)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        TWO_NUM
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let n = num_at(args, 0)?;
        let sig = opt_num(args, 1, 1.0)?;
        if sig == 0.0 {
            return Ok(Value::Number(0.0));
        }
        if n > 0.0 && sig < 0.0 {
            return num_error();
        }
        Ok(Value::Number((n / sig).ceil() * sig))
    }
}

#[derive(Debug)]
struct FloorFn;

impl Function for FloorFn {
    fn name(&self) -> &'static str {
        "FLOOR"
    }
    fn arity(&self) -> Arity {
        Arity::Range(1, 2)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        TWO_NUM
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let n = num_at(args, 0)?;
        let sig = opt_num(args, 1, 1.0)?;
        if sig == 0.0 {
            return Err(EvalError::DivByZero {
                numerator: n.to_string(),
                denominator: "0".to_string(),
            });
        }
        if n > 0.0 && sig < 0.0 {
            return num_error();
        }
        Ok(Value::Number((n / sig).floor() * sig))
    }
}

/* ─────────────────────────── PRODUCT() ──────────────────────── */

#[derive(Debug)]
struct ProductFn;

impl Function for ProductFn {
    fn name(&self) -> &'static str {
        "PRODUCT"
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
        let mut product = 1.0;
        let mut seen = false;
        for_each_number(args, |n| {
            product *= n;
            seen = true;
        })?;
        Ok(Value::Number(if seen { product } else { 0.0 }))
    }
}

pub fn register(reg: &mut FunctionRegistry) {
    reg.register(Arc::new(AbsFn));
    reg.register(Arc::new(SignFn));
    reg.register(Arc::new(IntFn));
    reg.register(Arc::new(ModFn));
    reg.register(Arc::new(SqrtFn));
    reg.register(Arc::new(PowerFn));
    reg.register(Arc::new(ExpFn));
    reg.register(Arc::new(LnFn));
    reg.register(Arc::new(LogFn));
    reg.register(Arc::new(Log10Fn));
    reg.register(Arc::new(PiFn));
    reg.register(Arc::new(RoundFn));
    reg.register(Arc::new(RoundUpFn));
    reg.register(Arc::new(RoundDownFn));
    reg.register(Arc::new(TruncFn));
    reg.register(Arc::new(CeilingFn));
    reg.register(Arc::new(FloorFn));
    reg.register(Arc::new(ProductFn));
}

#[cfg(test)]
mod tests {
    use crate::registry::parse_formula;
    use crate::test_support::eval_str;
    use gridform_common::Value;

    #[test]
    fn rounding_family() {
        assert_eq!(eval_str("=ROUND(2.5)"), Value::Number(3.0));
        assert_eq!(eval_str("=ROUND(-2.5)"), Value::Number(-3.0));
        assert_eq!(eval_str("=ROUND(1.2345,2)"), Value::Number(1.23));
        assert_eq!(eval_str("=ROUNDUP(1.21,1)"), Value::Number(1.3));
        assert_eq!(eval_str("=ROUNDDOWN(-1.29,1)"), Value::Number(-1.2));
        assert_eq!(eval_str("=TRUNC(8.9)"), Value::Number(8.0));
        assert_eq!(eval_str("=INT(-1.5)"), Value::Number(-2.0));
    }

    #[test]
    fn mod_takes_the_divisor_sign() {
        assert_eq!(eval_str("=MOD(3,2)"), Value::Number(1.0));
        assert_eq!(eval_str("=MOD(-3,2)"), Value::Number(1.0));
        assert_eq!(eval_str("=MOD(3,-2)"), Value::Number(-1.0));
    }

    #[test]
    fn domain_errors_surface_as_num() {
        assert_eq!(
            eval_str("=SQRT(-1)"),
            Value::Error(gridform_common::ErrorKind::Num)
        );
        assert_eq!(
            eval_str("=LN(0)"),
            Value::Error(gridform_common::ErrorKind::Num)
        );
    }

    #[test]
    fn ceiling_floor_significance() {
        assert_eq!(eval_str("=CEILING(2.5,1)"), Value::Number(3.0));
        assert_eq!(eval_str("=CEILING(1.3,0.5)"), Value::Number(1.5));
        assert_eq!(eval_str("=FLOOR(2.7,1)"), Value::Number(2.0));
    }

    #[test]
    fn parse_rejects_wrong_arity() {
        assert!(parse_formula("=ABS(1,2)").is_err());
        assert!(parse_formula("=PI(1)").is_err());
    }
}

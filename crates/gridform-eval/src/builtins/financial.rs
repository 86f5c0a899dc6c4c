//! Time-value-of-money functions.
//!
//! PMT/PV/FV/NPER are closed forms with a small-rate guard that switches
//! to the linear formulas. RATE, IRR and XIRR share one Newton-Raphson
//! scheme with fixed iteration and tolerance constants so convergence
//! behavior is deterministic and testable.

use std::sync::Arc;

use gridform_common::{ArgKind, Arity, ErrorKind, EvalError, Value};
use gridform_parse::{ArgumentHandle, EvalContext, Function, Range};

use super::support::{num_at, numbers_of_range, opt_num};
use crate::coercion::{cell_to_value, to_date};
use crate::registry::FunctionRegistry;

/// Rates closer to zero than this use the linear (zero-rate) formulas.
pub const SMALL_RATE: f64 = 1e-10;
/// Newton-Raphson iteration cap.
pub const MAX_ITERATIONS: usize = 100;
/// Newton-Raphson convergence tolerance.
pub const TOLERANCE: f64 = 1e-7;
/// Derivatives smaller than this abort the iteration.
pub const DERIVATIVE_EPSILON: f64 = 1e-14;

const NUM_TAIL: &[ArgKind] = &[ArgKind::Number];

fn type_adjustment(rate: f64, pay_at_start: bool) -> f64 {
    if pay_at_start { 1.0 + rate } else { 1.0 }
}

/* ─────────────────────────── PMT() / PV() / FV() ────────────── */

#[derive(Debug)]
struct PmtFn;

impl Function for PmtFn {
    fn name(&self) -> &'static str {
        "PMT"
    }
    fn arity(&self) -> Arity {
        Arity::Range(3, 5)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        NUM_TAIL
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let rate = num_at(args, 0)?;
        let nper = num_at(args, 1)?;
        let pv = num_at(args, 2)?;
        let fv = opt_num(args, 3, 0.0)?;
        let pay_at_start = opt_num(args, 4, 0.0)? != 0.0;

        if nper == 0.0 {
            return Ok(Value::Error(ErrorKind::Num));
        }
        let pmt = if rate.abs() < SMALL_RATE {
            -(pv + fv) / nper
        } else {
            let factor = (1.0 + rate).powf(nper);
            let adj = type_adjustment(rate, pay_at_start);
            -(rate * (pv * factor + fv)) / ((factor - 1.0) * adj)
        };
        Ok(Value::Number(pmt))
    }
}

#[derive(Debug)]
struct PvFn;

impl Function for PvFn {
    fn name(&self) -> &'static str {
        "PV"
    }
    fn arity(&self) -> Arity {
        Arity::Range(3, 5)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        NUM_TAIL
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let rate = num_at(args, 0)?;
        let nper = num_at(args, 1)?;
        let pmt = num_at(args, 2)?;
        let fv = opt_num(args, 3, 0.0)?;
        let pay_at_start = opt_num(args, 4, 0.0)? != 0.0;

        let pv = if rate.abs() < SMALL_RATE {
            -fv - pmt * nper
        } else {
            let factor = (1.0 + rate).powf(nper);
            let adj = type_adjustment(rate, pay_at_start);
            (-fv - pmt * adj * (factor - 1.0) / rate) / factor
        };
        Ok(Value::Number(pv))
    }
}

#[derive(Debug)]
struct FvFn;

impl Function for FvFn {
    fn name(&self) -> &'static str {
        "FV"
    }
    fn arity(&self) -> Arity {
        Arity::Range(3, 5)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        NUM_TAIL
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let rate = num_at(args, 0)?;
        let nper = num_at(args, 1)?;
        let pmt = num_at(args, 2)?;
        let pv = opt_num(args, 3, 0.0)?;
        let pay_at_start = opt_num(args, 4, 0.0)? != 0.0;

        let fv = if rate.abs() < SMALL_RATE {
            -pv - pmt * nper
        } else {
            let factor = (1.0 + rate).powf(nper);
            let adj = type_adjustment(rate, pay_at_start);
            -pv * factor - pmt * adj * (factor - 1.0) / rate
        };
        Ok(Value::Number(fv))
    }
}

/* ─────────────────────────── NPER() ─────────────────────────── */

#[derive(Debug)]
struct NperFn;

impl Function for NperFn {
    fn name(&self) -> &'static str {
        "NPER"
    }
    fn arity(&self) -> Arity {
        Arity::Range(3, 5)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        NUM_TAIL
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let rate = num_at(args, 0)?;
        let pmt = num_at(args, 1)?;
        let pv = num_at(args, 2)?;
        let fv = opt_num(args, 3, 0.0)?;
        let pay_at_start = opt_num(args, 4, 0.0)? != 0.0;

        if rate.abs() < SMALL_RATE {
            if pmt == 0.0 {
                return Ok(Value::Error(ErrorKind::Num));
            }
            return Ok(Value::Number(-(pv + fv) / pmt));
        }

        let adj = type_adjustment(rate, pay_at_start);
        if pmt == 0.0 {
            // Pure compounding: pv grows into -fv.
            let ratio = -fv / pv;
            if ratio <= 0.0 {
                return Ok(Value::Error(ErrorKind::Num));
            }
            return Ok(Value::Number(ratio.ln() / (1.0 + rate).ln()));
        }

        let term = pmt * adj / rate;
        let ratio = (term - fv) / (term + pv);
        if ratio <= 0.0 {
            return Ok(Value::Error(ErrorKind::Num));
        }
        Ok(Value::Number(ratio.ln() / (1.0 + rate).ln()))
    }
}

/* ─────────────────────────── RATE() ─────────────────────────── */

#[derive(Debug)]
struct RateFn;

impl Function for RateFn {
    fn name(&self) -> &'static str {
        "RATE"
    }
    fn arity(&self) -> Arity {
        Arity::Range(3, 6)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        NUM_TAIL
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let nper = num_at(args, 0)?;
        let pmt = num_at(args, 1)?;
        let pv = num_at(args, 2)?;
        let fv = opt_num(args, 3, 0.0)?;
        let pay_at_start = opt_num(args, 4, 0.0)? != 0.0;
        let guess = opt_num(args, 5, 0.1)?;

        let mut rate = guess;
        for _ in 0..MAX_ITERATIONS {
            if rate.abs() < SMALL_RATE {
                let f = pv + pmt * nper + fv;
                if f.abs() < TOLERANCE {
                    return Ok(Value::Number(rate));
                }
                rate = 0.01;
                continue;
            }

            let adj = type_adjustment(rate, pay_at_start);
            let factor = (1.0 + rate).powf(nper);
            let f = pv * factor + pmt * adj * (factor - 1.0) / rate + fv;

            let factor_prime = nper * (1.0 + rate).powf(nper - 1.0);
            let df = pv * factor_prime
                + pmt * adj * (factor_prime / rate - (factor - 1.0) / (rate * rate));

            if df.abs() < DERIVATIVE_EPSILON {
                break;
            }

            let next = rate - f / df;
            if (next - rate).abs() < TOLERANCE {
                return Ok(Value::Number(next));
            }
            rate = next.max(-0.99);
        }

        Err(EvalError::failed_with(
            "RATE did not converge",
            format!("nper={nper}, pmt={pmt}, pv={pv}, guess={guess}"),
        ))
    }
}

/* ─────────────────────────── NPV() / IRR() ──────────────────── */

#[derive(Debug)]
struct NpvFn;

impl Function for NpvFn {
    fn name(&self) -> &'static str {
        "NPV"
    }
    fn arity(&self) -> Arity {
        Arity::AtLeast(2)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[ArgKind::Number, ArgKind::Any]
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let rate = num_at(args, 0)?;
        if rate <= -1.0 {
            return Ok(Value::Error(ErrorKind::Num));
        }
        let mut total = 0.0;
        let mut period = 1i32;
        for arg in &args[1..] {
            for v in numbers_of_range(arg)? {
                total += v / (1.0 + rate).powi(period);
                period += 1;
            }
        }
        Ok(Value::Number(total))
    }
}

fn npv_at(rate: f64, cashflows: &[f64]) -> f64 {
    cashflows
        .iter()
        .enumerate()
        .map(|(i, v)| v / (1.0 + rate).powi(i as i32))
        .sum()
}

fn npv_derivative_at(rate: f64, cashflows: &[f64]) -> f64 {
    cashflows
        .iter()
        .enumerate()
        .skip(1)
        .map(|(i, v)| -(i as f64) * v / (1.0 + rate).powi(i as i32 + 1))
        .sum()
}

#[derive(Debug)]
struct IrrFn;

impl Function for IrrFn {
    fn name(&self) -> &'static str {
        "IRR"
    }
    fn arity(&self) -> Arity {
        Arity::Range(1, 2)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[ArgKind::Range, ArgKind::Number]
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let cashflows = numbers_of_range(&args[0])?;
        let guess = opt_num(args, 1, 0.1)?;

        if !cashflows.iter().any(|&v| v > 0.0) || !cashflows.iter().any(|&v| v < 0.0) {
            return Err(EvalError::failed(
                "IRR requires at least one positive and one negative cashflow",
            ));
        }

        let mut rate = guess;
        for _ in 0..MAX_ITERATIONS {
            let f = npv_at(rate, &cashflows);
            let df = npv_derivative_at(rate, &cashflows);
            if df.abs() < DERIVATIVE_EPSILON {
                break;
            }
            let next = rate - f / df;
            if (next - rate).abs() < TOLERANCE {
                return Ok(Value::Number(next));
            }
            rate = next.max(-0.99);
        }
        Err(EvalError::failed("IRR did not converge"))
    }
}

/* ─────────────────────────── XNPV() / XIRR() ────────────────── */

fn dates_of_range(arg: &ArgumentHandle<'_>) -> Result<Vec<f64>, EvalError> {
    let mut out = Vec::new();
    match arg.range() {
        Ok(range) => {
            for cell in range.iter_cells() {
                if cell.is_empty() {
                    continue;
                }
                let date = to_date(&cell_to_value(&cell))?;
                out.push(gridform_common::date_to_serial(&date));
            }
        }
        Err(_) => {
            let date = to_date(&arg.value()?)?;
            out.push(gridform_common::date_to_serial(&date));
        }
    }
    Ok(out)
}

fn xnpv_at(rate: f64, values: &[f64], day_offsets: &[f64]) -> f64 {
    values
        .iter()
        .zip(day_offsets)
        .map(|(v, t)| v / (1.0 + rate).powf(t / 365.0))
        .sum()
}

fn xnpv_derivative_at(rate: f64, values: &[f64], day_offsets: &[f64]) -> f64 {
    values
        .iter()
        .zip(day_offsets)
        .map(|(v, t)| {
            let exp = t / 365.0;
            -exp * v / (1.0 + rate).powf(exp + 1.0)
        })
        .sum()
}

fn cashflow_series(
    name: &str,
    values_arg: &ArgumentHandle<'_>,
    dates_arg: &ArgumentHandle<'_>,
) -> Result<(Vec<f64>, Vec<f64>), EvalError> {
    let values = numbers_of_range(values_arg)?;
    let dates = dates_of_range(dates_arg)?;
    if values.len() != dates.len() || values.is_empty() {
        return Err(EvalError::failed(format!(
            "{name}: values and dates must pair up ({} values, {} dates)",
            values.len(),
            dates.len()
        )));
    }
    let origin = dates[0];
    let offsets = dates.iter().map(|d| d - origin).collect();
    Ok((values, offsets))
}

#[derive(Debug)]
struct XnpvFn;

impl Function for XnpvFn {
    fn name(&self) -> &'static str {
        "XNPV"
    }
    fn arity(&self) -> Arity {
        Arity::Exact(3)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[ArgKind::Number, ArgKind::Range, ArgKind::Range]
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let rate = num_at(args, 0)?;
        if rate <= -1.0 {
            return Ok(Value::Error(ErrorKind::Num));
        }
        let (values, offsets) = cashflow_series("XNPV", &args[1], &args[2])?;
        Ok(Value::Number(xnpv_at(rate, &values, &offsets)))
    }
}

#[derive(Debug)]
struct XirrFn;

impl Function for XirrFn {
    fn name(&self) -> &'static str {
        "XIRR"
    }
    fn arity(&self) -> Arity {
        Arity::Range(2, 3)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[ArgKind::Range, ArgKind::Range, ArgKind::Number]
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let (values, offsets) = cashflow_series("XIRR", &args[0], &args[1])?;
        let guess = opt_num(args, 2, 0.1)?;

        if !values.iter().any(|&v| v > 0.0) || !values.iter().any(|&v| v < 0.0) {
            return Err(EvalError::failed(
                "XIRR requires at least one positive and one negative cashflow",
            ));
        }

        let mut rate = guess;
        for _ in 0..MAX_ITERATIONS {
            let f = xnpv_at(rate, &values, &offsets);
            let df = xnpv_derivative_at(rate, &values, &offsets);
            if df.abs() < DERIVATIVE_EPSILON {
                break;
            }
            let next = rate - f / df;
            if (next - rate).abs() < TOLERANCE {
                return Ok(Value::Number(next));
            }
            rate = next.max(-0.99);
        }
        Err(EvalError::failed("XIRR did not converge"))
    }
}

pub fn register(reg: &mut FunctionRegistry) {
    reg.register(Arc::new(PmtFn));
    reg.register(Arc::new(PvFn));
    reg.register(Arc::new(FvFn));
    reg.register(Arc::new(NperFn));
    reg.register(Arc::new(RateFn));
    reg.register(Arc::new(NpvFn));
    reg.register(Arc::new(IrrFn));
    reg.register(Arc::new(XnpvFn));
    reg.register(Arc::new(XirrFn));
}

#[cfg(test)]
mod tests {
    use crate::test_support::{eval_str, try_eval_on};
    use crate::workbook::Workbook;
    use gridform_common::{CellValue, Value};

    fn num(v: &Value) -> f64 {
        match v {
            Value::Number(n) => *n,
            other => panic!("expected number, got {other:?}"),
        }
    }

    #[test]
    fn pmt_matches_the_closed_form() {
        let pmt = num(&eval_str("=PMT(0.06/12,360,300000)"));
        assert!((pmt - -1798.6515754582708).abs() < 1e-6);
        // Zero rate degenerates to linear amortization.
        assert_eq!(eval_str("=PMT(0,12,1200)"), Value::Number(-100.0));
    }

    #[test]
    fn pv_fv_round_trip() {
        let fv = num(&eval_str("=FV(0.05,10,0,-1000)"));
        assert!((fv - 1628.894626777442).abs() < 1e-6);
        let pv = num(&eval_str("=PV(0.05,10,0,1628.894626777442)"));
        assert!((pv - -1000.0).abs() < 1e-6);
    }

    #[test]
    fn nper_solves_for_term() {
        let nper = num(&eval_str("=NPER(0.06/12,-1798.6515754582708,300000)"));
        assert!((nper - 360.0).abs() < 1e-6);
        assert_eq!(eval_str("=NPER(0,-100,1200)"), Value::Number(12.0));
    }

    #[test]
    fn rate_recovers_the_payment_rate() {
        // The classic annuity: rate should be ~0.5% monthly.
        let rate = num(&eval_str("=RATE(360,-1798.6515754582708,300000)"));
        assert!((rate - 0.005).abs() < 1e-6);
        // Degenerate cashflows converge to zero.
        let rate = num(&eval_str("=RATE(10,-100,1000)"));
        assert!(rate.abs() < 1e-6);
    }

    #[test]
    fn rate_without_a_root_fails_to_converge() {
        let err = try_eval_on(&Workbook::new().with_sheet("Sheet1"), "=RATE(10,0,1000)")
            .unwrap_err();
        assert!(err.to_string().contains("RATE did not converge"));
    }

    #[test]
    fn npv_discounts_from_period_one() {
        let npv = num(&eval_str("=NPV(0.08,4000,5000,6000)"));
        assert!((npv - 12753.391251333636).abs() < 1e-6);
    }

    #[test]
    fn irr_finds_the_breakeven_rate() {
        let mut wb = Workbook::new();
        wb.set_a1("Sheet1", "A1", CellValue::Number(-1000.0));
        wb.set_a1("Sheet1", "A2", CellValue::Number(500.0));
        wb.set_a1("Sheet1", "A3", CellValue::Number(500.0));
        wb.set_a1("Sheet1", "A4", CellValue::Number(500.0));
        let rate = num(&try_eval_on(&wb, "=IRR(A1:A4)").unwrap());
        // NPV at the returned rate should be ~0.
        let npv = (0..4)
            .map(|i| [-1000.0, 500.0, 500.0, 500.0][i] / (1.0 + rate).powi(i as i32))
            .sum::<f64>();
        assert!(npv.abs() < 1e-4);
    }

    #[test]
    fn irr_requires_mixed_signs() {
        let mut wb = Workbook::new();
        wb.set_a1("Sheet1", "A1", CellValue::Number(100.0));
        wb.set_a1("Sheet1", "A2", CellValue::Number(200.0));
        let err = try_eval_on(&wb, "=IRR(A1:A2)").unwrap_err();
        assert!(err.to_string().contains("positive and one negative"));
    }

    #[test]
    fn xnpv_weights_by_day_fraction() {
        let mut wb = Workbook::new();
        wb.set_a1("Sheet1", "A1", CellValue::Number(-1000.0));
        wb.set_a1("Sheet1", "A2", CellValue::Number(1100.0));
        wb.set_a1(
            "Sheet1",
            "B1",
            CellValue::DateTime(
                chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
            ),
        );
        wb.set_a1(
            "Sheet1",
            "B2",
            CellValue::DateTime(
                chrono::NaiveDate::from_ymd_opt(2024, 12, 31)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
            ),
        );
        let xnpv = num(&try_eval_on(&wb, "=XNPV(0.1,A1:A2,B1:B2)").unwrap());
        let expected = -1000.0 + 1100.0 / (1.1f64).powf(365.0 / 365.0);
        assert!((xnpv - expected).abs() < 1e-6);

        let xirr = num(&try_eval_on(&wb, "=XIRR(A1:A2,B1:B2)").unwrap());
        assert!((xirr - 0.1).abs() < 1e-3);
    }
}

//! Date and time functions. TODAY and NOW read the injected clock;
//! everything else is pure calendar arithmetic on `NaiveDate`.

use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate};
use gridform_common::{ArgKind, Arity, ErrorKind, EvalError, FnFlags, Value};
use gridform_parse::{ArgumentHandle, EvalContext, Function, Range};

use super::support::{date_at, int_at, opt_int, text_at};
use crate::coercion::to_date;
use crate::registry::FunctionRegistry;

fn is_leap(year: i32) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        _ => {
            if is_leap(year) {
                29
            } else {
                28
            }
        }
    }
}

/// Month arithmetic with end-of-month clamping.
fn add_months(date: NaiveDate, delta: i64) -> Option<NaiveDate> {
    let total = date.year() as i64 * 12 + date.month0() as i64 + delta;
    let year = i32::try_from(total.div_euclid(12)).ok()?;
    let month = (total.rem_euclid(12) + 1) as u32;
    let day = date.day().min(days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day)
}

fn is_weekend(date: &NaiveDate) -> bool {
    matches!(
        date.weekday(),
        chrono::Weekday::Sat | chrono::Weekday::Sun
    )
}

/// Optional holiday argument: a range of date cells or a single scalar
/// date/serial.
fn holidays_of(args: &[ArgumentHandle<'_>], i: usize) -> Result<Vec<NaiveDate>, EvalError> {
    let Some(arg) = args.get(i) else {
        return Ok(Vec::new());
    };
    if arg.is_missing() {
        return Ok(Vec::new());
    }
    if let Ok(range) = arg.range() {
        let mut out = Vec::new();
        for cell in range.iter_cells() {
            if cell.is_empty() {
                continue;
            }
            if let Ok(d) = to_date(&crate::coercion::cell_to_value(&cell)) {
                out.push(d);
            }
        }
        return Ok(out);
    }
    Ok(vec![to_date(&arg.value()?)?])
}

/* ─────────────────────────── TODAY() / NOW() ────────────────── */

#[derive(Debug)]
struct TodayFn;

impl Function for TodayFn {
    fn name(&self) -> &'static str {
        "TODAY"
    }
    fn arity(&self) -> Arity {
        Arity::Exact(0)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[]
    }
    fn flags(&self) -> FnFlags {
        FnFlags::VOLATILE | FnFlags::RETURNS_DATE
    }
    fn eval(
        &self,
        _args: &[ArgumentHandle<'_>],
        ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        Ok(Value::Date(ctx.clock().today()))
    }
}

#[derive(Debug)]
struct NowFn;

impl Function for NowFn {
    fn name(&self) -> &'static str {
        "NOW"
    }
    fn arity(&self) -> Arity {
        Arity::Exact(0)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[]
    }
    fn flags(&self) -> FnFlags {
        FnFlags::VOLATILE | FnFlags::RETURNS_DATETIME
    }
    fn eval(
        &self,
        _args: &[ArgumentHandle<'_>],
        ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        Ok(Value::DateTime(ctx.clock().now()))
    }
}

/* ─────────────────────────── DATE() ─────────────────────────── */

#[derive(Debug)]
struct DateFn;

impl Function for DateFn {
    fn name(&self) -> &'static str {
        "DATE"
    }
    fn arity(&self) -> Arity {
        Arity::Exact(3)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[ArgKind::Int, ArgKind::Int, ArgKind::Int]
    }
    fn flags(&self) -> FnFlags {
        FnFlags::RETURNS_DATE
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let year = int_at(args, 0)?;
        let month = int_at(args, 1)?;
        let day = int_at(args, 2)?;

        // Out-of-range months and days roll over, like DATE(2024,13,1).
        let total = year * 12 + (month - 1);
        let Ok(norm_year) = i32::try_from(total.div_euclid(12)) else {
            return Ok(Value::Error(ErrorKind::Num));
        };
        let norm_month = (total.rem_euclid(12) + 1) as u32;
        let Some(first) = NaiveDate::from_ymd_opt(norm_year, norm_month, 1) else {
            return Ok(Value::Error(ErrorKind::Num));
        };
        match first.checked_add_signed(Duration::days(day - 1)) {
            Some(date) => Ok(Value::Date(date)),
            None => Ok(Value::Error(ErrorKind::Num)),
        }
    }
}

/* ─────────────────────────── YEAR() / MONTH() / DAY() ───────── */

#[derive(Debug)]
struct YearFn;

impl Function for YearFn {
    fn name(&self) -> &'static str {
        "YEAR"
    }
    fn arity(&self) -> Arity {
        Arity::Exact(1)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[ArgKind::Date]
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        Ok(Value::Int(date_at(args, 0)?.year() as i64))
    }
}

#[derive(Debug)]
struct MonthFn;

impl Function for MonthFn {
    fn name(&self) -> &'static str {
        "MONTH"
    }
    fn arity(&self) -> Arity {
        Arity::Exact(1)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[ArgKind::Date]
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        Ok(Value::Int(date_at(args, 0)?.month() as i64))
    }
}

#[derive(Debug)]
struct DayFn;

impl Function for DayFn {
    fn name(&self) -> &'static str {
        "DAY"
    }
    fn arity(&self) -> Arity {
        Arity::Exact(1)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[ArgKind::Date]
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        Ok(Value::Int(date_at(args, 0)?.day() as i64))
    }
}

/* ─────────────────────────── WEEKDAY() ──────────────────────── */

#[derive(Debug)]
struct WeekdayFn;

impl Function for WeekdayFn {
    fn name(&self) -> &'static str {
        "WEEKDAY"
    }
    fn arity(&self) -> Arity {
        Arity::Range(1, 2)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[ArgKind::Date, ArgKind::Int]
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let date = date_at(args, 0)?;
        let mode = opt_int(args, 1, 1)?;
        let from_monday = date.weekday().num_days_from_monday() as i64;
        let out = match mode {
            1 => (from_monday + 1) % 7 + 1, // Sunday = 1 .. Saturday = 7
            2 => from_monday + 1,           // Monday = 1 .. Sunday = 7
            3 => from_monday,               // Monday = 0 .. Sunday = 6
            _ => return Ok(Value::Error(ErrorKind::Num)),
        };
        Ok(Value::Int(out))
    }
}

/* ─────────────────────────── EDATE() / EOMONTH() ────────────── */

#[derive(Debug)]
struct EdateFn;

impl Function for EdateFn {
    fn name(&self) -> &'static str {
        "EDATE"
    }
    fn arity(&self) -> Arity {
        Arity::Exact(2)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[ArgKind::Date, ArgKind::Int]
    }
    fn flags(&self) -> FnFlags {
        FnFlags::RETURNS_DATE
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let start = date_at(args, 0)?;
        let months = int_at(args, 1)?;
        match add_months(start, months) {
            Some(d) => Ok(Value::Date(d)),
            None => Ok(Value::Error(ErrorKind::Num)),
        }
    }
}

#[derive(Debug)]
struct EomonthFn;

impl Function for EomonthFn {
    fn name(&self) -> &'static str {
        "EOMONTH"
    }
    fn arity(&self) -> Arity {
        Arity::Exact(2)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[ArgKind::Date, ArgKind::Int]
    }
    fn flags(&self) -> FnFlags {
        FnFlags::RETURNS_DATE
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let start = date_at(args, 0)?;
        let months = int_at(args, 1)?;
        match add_months(start, months) {
            Some(d) => {
                let last = days_in_month(d.year(), d.month());
                Ok(Value::Date(
                    NaiveDate::from_ymd_opt(d.year(), d.month(), last).expect("valid month end"),
                ))
            }
            None => Ok(Value::Error(ErrorKind::Num)),
        }
    }
}

/* ─────────────────────────── DATEDIF() ──────────────────────── */

#[derive(Debug)]
struct DatedifFn;

impl Function for DatedifFn {
    fn name(&self) -> &'static str {
        "DATEDIF"
    }
    fn arity(&self) -> Arity {
        Arity::Exact(3)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[ArgKind::Date, ArgKind::Date, ArgKind::Text]
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let start = date_at(args, 0)?;
        let end = date_at(args, 1)?;
        if end < start {
            return Ok(Value::Error(ErrorKind::Num));
        }
        let unit = text_at(args, 2)?.to_uppercase();

        let (y1, m1, d1) = (start.year() as i64, start.month() as i64, start.day() as i64);
        let (y2, m2, d2) = (end.year() as i64, end.month() as i64, end.day() as i64);

        let out = match unit.as_str() {
            "D" => (end - start).num_days(),
            "M" => {
                let mut months = (y2 - y1) * 12 + (m2 - m1);
                if d2 < d1 {
                    months -= 1;
                }
                months
            }
            "Y" => {
                let mut years = y2 - y1;
                if (m2, d2) < (m1, d1) {
                    years -= 1;
                }
                years
            }
            "YM" => {
                let mut months = m2 - m1;
                if d2 < d1 {
                    months -= 1;
                }
                months.rem_euclid(12)
            }
            "MD" => {
                if d2 >= d1 {
                    d2 - d1
                } else {
                    let prev = add_months(end.with_day(1).expect("day 1"), -1)
                        .expect("previous month");
                    d2 + days_in_month(prev.year(), prev.month()) as i64 - d1
                }
            }
            "YD" => {
                // Days between, with the start year moved next to the end.
                let mut anchor = clamped_ymd(y2 as i32, start.month(), start.day());
                if anchor > end {
                    anchor = clamped_ymd(y2 as i32 - 1, start.month(), start.day());
                }
                (end - anchor).num_days()
            }
            _ => return Err(EvalError::failed(format!("DATEDIF: unknown unit '{unit}'"))),
        };
        Ok(Value::Int(out))
    }
}

fn clamped_ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    let day = day.min(days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day).expect("clamped date")
}

/* ─────────────────────────── NETWORKDAYS() / WORKDAY() ──────── */

#[derive(Debug)]
struct NetworkdaysFn;

impl Function for NetworkdaysFn {
    fn name(&self) -> &'static str {
        "NETWORKDAYS"
    }
    fn arity(&self) -> Arity {
        Arity::Range(2, 3)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[ArgKind::Date, ArgKind::Date, ArgKind::Any]
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let start = date_at(args, 0)?;
        let end = date_at(args, 1)?;
        let holidays = holidays_of(args, 2)?;

        let (lo, hi, sign) = if start <= end {
            (start, end, 1)
        } else {
            (end, start, -1)
        };
        let mut count = 0i64;
        let mut day = lo;
        while day <= hi {
            if !is_weekend(&day) && !holidays.contains(&day) {
                count += 1;
            }
            day += Duration::days(1);
        }
        Ok(Value::Int(count * sign))
    }
}

#[derive(Debug)]
struct WorkdayFn;

impl Function for WorkdayFn {
    fn name(&self) -> &'static str {
        "WORKDAY"
    }
    fn arity(&self) -> Arity {
        Arity::Range(2, 3)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[ArgKind::Date, ArgKind::Int, ArgKind::Any]
    }
    fn flags(&self) -> FnFlags {
        FnFlags::RETURNS_DATE
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let start = date_at(args, 0)?;
        let days = int_at(args, 1)?;
        let holidays = holidays_of(args, 2)?;

        let step = if days >= 0 { 1 } else { -1 };
        let mut remaining = days.abs();
        let mut day = start;
        while remaining > 0 {
            day += Duration::days(step);
            if !is_weekend(&day) && !holidays.contains(&day) {
                remaining -= 1;
            }
        }
        Ok(Value::Date(day))
    }
}

/* ─────────────────────────── YEARFRAC() ─────────────────────── */

#[derive(Debug)]
struct YearfracFn;

impl Function for YearfracFn {
    fn name(&self) -> &'static str {
        "YEARFRAC"
    }
    fn arity(&self) -> Arity {
        Arity::Range(2, 3)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[ArgKind::Date, ArgKind::Date, ArgKind::Int]
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let mut start = date_at(args, 0)?;
        let mut end = date_at(args, 1)?;
        if start > end {
            std::mem::swap(&mut start, &mut end);
        }
        let basis = opt_int(args, 2, 0)?;

        let actual_days = (end - start).num_days() as f64;
        let frac = match basis {
            // US (NASD) 30/360.
            0 => {
                let mut d1 = start.day() as i64;
                let mut d2 = end.day() as i64;
                if d1 == 31 {
                    d1 = 30;
                }
                if d2 == 31 && d1 >= 30 {
                    d2 = 30;
                }
                let days = 360 * (end.year() - start.year()) as i64
                    + 30 * (end.month() as i64 - start.month() as i64)
                    + (d2 - d1);
                days as f64 / 360.0
            }
            // Actual/actual.
            1 => {
                let denom = if start.year() == end.year() {
                    if is_leap(start.year()) { 366.0 } else { 365.0 }
                } else {
                    let y1 = start.year();
                    let y2 = end.year();
                    let total: i64 = (y1..=y2)
                        .map(|y| if is_leap(y) { 366i64 } else { 365 })
                        .sum();
                    total as f64 / (y2 - y1 + 1) as f64
                };
                actual_days / denom
            }
            2 => actual_days / 360.0,
            3 => actual_days / 365.0,
            // European 30/360.
            4 => {
                let d1 = (start.day() as i64).min(30);
                let d2 = (end.day() as i64).min(30);
                let days = 360 * (end.year() - start.year()) as i64
                    + 30 * (end.month() as i64 - start.month() as i64)
                    + (d2 - d1);
                days as f64 / 360.0
            }
            _ => return Ok(Value::Error(ErrorKind::Num)),
        };
        Ok(Value::Number(frac))
    }
}

pub fn register(reg: &mut FunctionRegistry) {
    reg.register(Arc::new(TodayFn));
    reg.register(Arc::new(NowFn));
    reg.register(Arc::new(DateFn));
    reg.register(Arc::new(YearFn));
    reg.register(Arc::new(MonthFn));
    reg.register(Arc::new(DayFn));
    reg.register(Arc::new(WeekdayFn));
    reg.register(Arc::new(EdateFn));
    reg.register(Arc::new(EomonthFn));
    reg.register(Arc::new(DatedifFn));
    reg.register(Arc::new(NetworkdaysFn));
    reg.register(Arc::new(WorkdayFn));
    reg.register(Arc::new(YearfracFn));
}

#[cfg(test)]
mod tests {
    use crate::test_support::eval_str;
    use chrono::NaiveDate;
    use gridform_common::Value;

    fn date(y: i32, m: u32, d: u32) -> Value {
        Value::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    #[test]
    fn today_reads_the_fixed_clock() {
        assert_eq!(eval_str("=TODAY()"), date(2024, 6, 15));
        assert_eq!(eval_str("=YEAR(TODAY())"), Value::Int(2024));
    }

    #[test]
    fn date_normalizes_overflow() {
        assert_eq!(eval_str("=DATE(2024,1,15)"), date(2024, 1, 15));
        assert_eq!(eval_str("=DATE(2024,13,1)"), date(2025, 1, 1));
        assert_eq!(eval_str("=DATE(2024,2,30)"), date(2024, 3, 1));
    }

    #[test]
    fn date_parts() {
        assert_eq!(eval_str("=MONTH(DATE(2024,2,29))"), Value::Int(2));
        assert_eq!(eval_str("=DAY(DATE(2024,2,29))"), Value::Int(29));
        // 2024-06-15 is a Saturday.
        assert_eq!(eval_str("=WEEKDAY(DATE(2024,6,15))"), Value::Int(7));
        assert_eq!(eval_str("=WEEKDAY(DATE(2024,6,15),2)"), Value::Int(6));
    }

    #[test]
    fn edate_eomonth_clamp() {
        assert_eq!(eval_str("=EDATE(DATE(2024,1,31),1)"), date(2024, 2, 29));
        assert_eq!(eval_str("=EOMONTH(DATE(2024,1,15),1)"), date(2024, 2, 29));
        assert_eq!(eval_str("=EOMONTH(DATE(2023,1,15),1)"), date(2023, 2, 28));
    }

    #[test]
    fn datedif_units() {
        assert_eq!(
            eval_str("=DATEDIF(DATE(2021,1,1),DATE(2021,7,1),\"D\")"),
            Value::Int(181)
        );
        assert_eq!(
            eval_str("=DATEDIF(DATE(2021,1,15),DATE(2023,3,10),\"Y\")"),
            Value::Int(2)
        );
        assert_eq!(
            eval_str("=DATEDIF(DATE(2021,1,15),DATE(2021,3,10),\"M\")"),
            Value::Int(1)
        );
        assert_eq!(
            eval_str("=DATEDIF(DATE(2021,1,15),DATE(2021,3,10),\"YM\")"),
            Value::Int(1)
        );
        assert_eq!(
            eval_str("=DATEDIF(DATE(2021,3,1),DATE(2021,1,1),\"D\")"),
            Value::Error(gridform_common::ErrorKind::Num)
        );
    }

    #[test]
    fn networkdays_excludes_weekends_and_holidays() {
        // 2024-01-01 (Mon) .. 2024-01-08 (Mon): six weekdays.
        assert_eq!(
            eval_str("=NETWORKDAYS(DATE(2024,1,1),DATE(2024,1,8))"),
            Value::Int(6)
        );
        assert_eq!(
            eval_str("=NETWORKDAYS(DATE(2024,1,1),DATE(2024,1,8),DATE(2024,1,2))"),
            Value::Int(5)
        );
        // Reversed order counts negative.
        assert_eq!(
            eval_str("=NETWORKDAYS(DATE(2024,1,8),DATE(2024,1,1))"),
            Value::Int(-6)
        );
    }

    #[test]
    fn workday_steps_over_weekends() {
        // Friday + 1 workday = Monday.
        assert_eq!(eval_str("=WORKDAY(DATE(2024,6,14),1)"), date(2024, 6, 17));
        assert_eq!(eval_str("=WORKDAY(DATE(2024,6,14),5)"), date(2024, 6, 21));
        assert_eq!(eval_str("=WORKDAY(DATE(2024,6,17),-1)"), date(2024, 6, 14));
    }

    #[test]
    fn yearfrac_bases() {
        assert_eq!(
            eval_str("=YEARFRAC(DATE(2024,1,1),DATE(2024,7,1),0)"),
            Value::Number(0.5)
        );
        assert_eq!(
            eval_str("=YEARFRAC(DATE(2023,1,1),DATE(2023,12,31),2)"),
            Value::Number(364.0 / 360.0)
        );
        assert_eq!(
            eval_str("=YEARFRAC(DATE(2023,1,1),DATE(2023,12,31),3)"),
            Value::Number(364.0 / 365.0)
        );
        assert_eq!(
            eval_str("=YEARFRAC(DATE(2024,1,1),DATE(2024,12,31),1)"),
            Value::Number(365.0 / 366.0)
        );
    }
}

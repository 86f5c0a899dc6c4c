//! Text functions. Positions and lengths are in characters, not bytes.

use std::sync::Arc;

use gridform_common::{ArgKind, Arity, ErrorKind, EvalError, Value};
use gridform_parse::{ArgumentHandle, EvalContext, Function};

use super::support::{opt_int, text_at};
use crate::registry::FunctionRegistry;

const TEXT_TAIL: &[ArgKind] = &[ArgKind::Text];

fn value_error() -> Result<Value, EvalError> {
    Ok(Value::Error(ErrorKind::Value))
}

/* ─────────────────────────── CONCATENATE() ──────────────────── */

#[derive(Debug)]
struct ConcatenateFn;

impl Function for ConcatenateFn {
    fn name(&self) -> &'static str {
        "CONCATENATE"
    }
    fn arity(&self) -> Arity {
        Arity::AtLeast(1)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        TEXT_TAIL
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let mut out = String::new();
        for i in 0..args.len() {
            out.push_str(&text_at(args, i)?);
        }
        Ok(Value::Text(out))
    }
}

/* ─────────────────────────── LEFT() / RIGHT() / MID() ───────── */

#[derive(Debug)]
struct LeftFn;

impl Function for LeftFn {
    fn name(&self) -> &'static str {
        "LEFT"
    }
    fn arity(&self) -> Arity {
        Arity::Range(1, 2)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[ArgKind::Text, ArgKind::Int]
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let text = text_at(args, 0)?;
        let n = opt_int(args, 1, 1)?;
        if n < 0 {
            return value_error();
        }
        Ok(Value::Text(text.chars().take(n as usize).collect()))
    }
}

#[derive(Debug)]
struct RightFn;

impl Function for RightFn {
    fn name(&self) -> &'static str {
        "RIGHT"
    }
    fn arity(&self) -> Arity {
        Arity::Range(1, 2)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[ArgKind::Text, ArgKind::Int]
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let text = text_at(args, 0)?;
        let n = opt_int(args, 1, 1)?;
        if n < 0 {
            return value_error();
        }
        let len = text.chars().count();
        let skip = len.saturating_sub(n as usize);
        Ok(Value::Text(text.chars().skip(skip).collect()))
    }
}

#[derive(Debug)]
struct MidFn;

impl Function for MidFn {
    fn name(&self) -> &'static str {
        "MID"
    }
    fn arity(&self) -> Arity {
        Arity::Exact(3)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[ArgKind::Text, ArgKind::Int, ArgKind::Int]
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let text = text_at(args, 0)?;
        let start = super::support::int_at(args, 1)?;
        let len = super::support::int_at(args, 2)?;
        if start < 1 || len < 0 {
            return value_error();
        }
        Ok(Value::Text(
            text.chars()
                .skip((start - 1) as usize)
                .take(len as usize)
                .collect(),
        ))
    }
}

/* ─────────────────────────── LEN() / case / TRIM() ──────────── */

#[derive(Debug)]
struct LenFn;

impl Function for LenFn {
    fn name(&self) -> &'static str {
        "LEN"
    }
    fn arity(&self) -> Arity {
        Arity::Exact(1)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        TEXT_TAIL
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        Ok(Value::Int(text_at(args, 0)?.chars().count() as i64))
    }
}

#[derive(Debug)]
struct LowerFn;

impl Function for LowerFn {
    fn name(&self) -> &'static str {
        "LOWER"
    }
    fn arity(&self) -> Arity {
        Arity::Exact(1)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        TEXT_TAIL
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        Ok(Value::Text(text_at(args, 0)?.to_lowercase()))
    }
}

#[derive(Debug)]
struct UpperFn;

impl Function for UpperFn {
    fn name(&self) -> &'static str {
        "UPPER"
    }
    fn arity(&self) -> Arity {
        Arity::Exact(1)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        TEXT_TAIL
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        Ok(Value::Text(text_at(args, 0)?.to_uppercase()))
    }
}

#[derive(Debug)]
struct TrimFn;

impl Function for TrimFn {
    fn name(&self) -> &'static str {
        "TRIM"
    }
    fn arity(&self) -> Arity {
        Arity::Exact(1)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        TEXT_TAIL
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        // Collapses interior runs of spaces too, like the spreadsheet TRIM.
        let text = text_at(args, 0)?;
        Ok(Value::Text(
            text.split_whitespace().collect::<Vec<_>>().join(" "),
        ))
    }
}

#[derive(Debug)]
struct ReptFn;

impl Function for ReptFn {
    fn name(&self) -> &'static str {
        "REPT"
    }
    fn arity(&self) -> Arity {
        Arity::Exact(2)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[ArgKind::Text, ArgKind::Int]
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let text = text_at(args, 0)?;
        let n = super::support::int_at(args, 1)?;
        if n < 0 {
            return value_error();
        }
        Ok(Value::Text(text.repeat(n as usize)))
    }
}

/* ─────────────────────────── EXACT() / FIND() / SEARCH() ────── */

#[derive(Debug)]
struct ExactFn;

impl Function for ExactFn {
    fn name(&self) -> &'static str {
        "EXACT"
    }
    fn arity(&self) -> Arity {
        Arity::Exact(2)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[ArgKind::Text, ArgKind::Text]
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        Ok(Value::Bool(text_at(args, 0)? == text_at(args, 1)?))
    }
}

/// 1-based character position of `needle` in `hay`, scanning from
/// `start` (1-based).
fn char_find(needle: &str, hay: &str, start: i64) -> Option<usize> {
    if start < 1 {
        return None;
    }
    let hay_chars: Vec<char> = hay.chars().collect();
    let needle_chars: Vec<char> = needle.chars().collect();
    let from = (start - 1) as usize;
    if from > hay_chars.len() {
        return None;
    }
    if needle_chars.is_empty() {
        return Some(from + 1);
    }
    for i in from..=hay_chars.len().saturating_sub(needle_chars.len()) {
        if hay_chars[i..i + needle_chars.len()] == needle_chars[..] {
            return Some(i + 1);
        }
    }
    None
}

#[derive(Debug)]
struct FindFn;

impl Function for FindFn {
    fn name(&self) -> &'static str {
        "FIND"
    }
    fn arity(&self) -> Arity {
        Arity::Range(2, 3)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[ArgKind::Text, ArgKind::Text, ArgKind::Int]
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let needle = text_at(args, 0)?;
        let hay = text_at(args, 1)?;
        let start = opt_int(args, 2, 1)?;
        match char_find(&needle, &hay, start) {
            Some(pos) => Ok(Value::Int(pos as i64)),
            None => value_error(),
        }
    }
}

#[derive(Debug)]
struct SearchFn;

impl Function for SearchFn {
    fn name(&self) -> &'static str {
        "SEARCH"
    }
    fn arity(&self) -> Arity {
        Arity::Range(2, 3)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[ArgKind::Text, ArgKind::Text, ArgKind::Int]
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        // Like FIND but case-insensitive.
        let needle = text_at(args, 0)?.to_lowercase();
        let hay = text_at(args, 1)?.to_lowercase();
        let start = opt_int(args, 2, 1)?;
        match char_find(&needle, &hay, start) {
            Some(pos) => Ok(Value::Int(pos as i64)),
            None => value_error(),
        }
    }
}

/* ─────────────────────────── SUBSTITUTE() / VALUE() ─────────── */

#[derive(Debug)]
struct SubstituteFn;

impl Function for SubstituteFn {
    fn name(&self) -> &'static str {
        "SUBSTITUTE"
    }
    fn arity(&self) -> Arity {
        Arity::Range(3, 4)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        &[ArgKind::Text, ArgKind::Text, ArgKind::Text, ArgKind::Int]
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let text = text_at(args, 0)?;
        let old = text_at(args, 1)?;
        let new = text_at(args, 2)?;
        if old.is_empty() {
            return Ok(Value::Text(text));
        }
        if args.len() > 3 && !args[3].is_missing() {
            let instance = super::support::int_at(args, 3)?;
            if instance < 1 {
                return value_error();
            }
            let mut seen = 0i64;
            let mut from = 0usize;
            while let Some(found) = text[from..].find(&old) {
                let at = from + found;
                seen += 1;
                if seen == instance {
                    let mut out = String::with_capacity(text.len());
                    out.push_str(&text[..at]);
                    out.push_str(&new);
                    out.push_str(&text[at + old.len()..]);
                    return Ok(Value::Text(out));
                }
                from = at + old.len();
            }
            Ok(Value::Text(text))
        } else {
            Ok(Value::Text(text.replace(&old, &new)))
        }
    }
}

#[derive(Debug)]
struct ValueFn;

impl Function for ValueFn {
    fn name(&self) -> &'static str {
        "VALUE"
    }
    fn arity(&self) -> Arity {
        Arity::Exact(1)
    }
    fn arg_kinds(&self) -> &'static [ArgKind] {
        TEXT_TAIL
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_>],
        _ctx: &dyn EvalContext,
    ) -> Result<Value, EvalError> {
        let text = text_at(args, 0)?;
        match text.trim().parse::<f64>() {
            Ok(n) => Ok(Value::Number(n)),
            Err(_) => value_error(),
        }
    }
}

pub fn register(reg: &mut FunctionRegistry) {
    reg.register(Arc::new(ConcatenateFn));
    reg.register(Arc::new(LeftFn));
    reg.register(Arc::new(RightFn));
    reg.register(Arc::new(MidFn));
    reg.register(Arc::new(LenFn));
    reg.register(Arc::new(LowerFn));
    reg.register(Arc::new(UpperFn));
    reg.register(Arc::new(TrimFn));
    reg.register(Arc::new(ReptFn));
    reg.register(Arc::new(ExactFn));
    reg.register(Arc::new(FindFn));
    reg.register(Arc::new(SearchFn));
    reg.register(Arc::new(SubstituteFn));
    reg.register(Arc::new(ValueFn));
}

#[cfg(test)]
mod tests {
    use crate::test_support::{eval_str, sample_workbook, try_eval_on};
    use gridform_common::{ErrorKind, Value};

    #[test]
    fn slicing() {
        assert_eq!(eval_str("=LEFT(\"Apple\",3)"), Value::Text("App".into()));
        assert_eq!(eval_str("=RIGHT(\"Apple\",3)"), Value::Text("ple".into()));
        assert_eq!(eval_str("=MID(\"Apple\",2,3)"), Value::Text("ppl".into()));
        assert_eq!(eval_str("=LEN(\"Apple\")"), Value::Int(5));
    }

    #[test]
    fn concatenate_coerces() {
        assert_eq!(
            eval_str("=CONCATENATE(\"a=\",1,\"/\",TRUE)"),
            Value::Text("a=1/TRUE".into())
        );
        // A referenced text cell passes through the coercive string decoder.
        assert_eq!(
            try_eval_on(&sample_workbook(), "=CONCATENATE(B1,\"-\",C1)").unwrap(),
            Value::Text("Apple-2".into())
        );
    }

    #[test]
    fn trim_collapses_interior_runs() {
        assert_eq!(
            eval_str("=TRIM(\"  a   b  \")"),
            Value::Text("a b".into())
        );
    }

    #[test]
    fn find_vs_search_case() {
        assert_eq!(eval_str("=FIND(\"p\",\"Apple\")"), Value::Int(2));
        assert_eq!(
            eval_str("=FIND(\"P\",\"apple\")"),
            Value::Error(ErrorKind::Value)
        );
        assert_eq!(eval_str("=SEARCH(\"P\",\"apple\")"), Value::Int(2));
        assert_eq!(eval_str("=FIND(\"p\",\"Apple\",4)"), Value::Int(4));
    }

    #[test]
    fn substitute_nth_instance() {
        assert_eq!(
            eval_str("=SUBSTITUTE(\"a-b-c\",\"-\",\"+\")"),
            Value::Text("a+b+c".into())
        );
        assert_eq!(
            eval_str("=SUBSTITUTE(\"a-b-c\",\"-\",\"+\",2)"),
            Value::Text("a-b+c".into())
        );
    }

    #[test]
    fn value_parses_numbers() {
        assert_eq!(eval_str("=VALUE(\" 12.5 \")"), Value::Number(12.5));
        assert_eq!(
            eval_str("=VALUE(\"abc\")"),
            Value::Error(ErrorKind::Value)
        );
    }
}

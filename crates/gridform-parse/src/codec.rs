//! Per-target-type decoders from stored cell values to runtime values.
//!
//! A decoder is total: every input produces either a typed [`Value`] or a
//! [`CodecError`]. Cached formula results are trusted: a formula cell
//! whose cache holds a number decodes as that number.

use gridform_common::{CellValue, CodecError, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decoder {
    /// Numbers, booleans as 1/0, cached numeric formula results.
    Number,
    /// Numbers representable as a 32-bit integer; booleans as 1/0.
    Int,
    /// Booleans only (plus cached boolean formula results).
    Bool,
    /// The date component of a datetime cell.
    Date,
    /// Coercive text: everything has a string form.
    Str,
    /// The cell as stored, projected onto runtime values.
    Cell,
    /// What a consumer of the *result* sees: cached formula values,
    /// empties as zero, rich text as plain text.
    Resolved,
}

impl Decoder {
    pub fn name(&self) -> &'static str {
        match self {
            Decoder::Number => "number",
            Decoder::Int => "integer",
            Decoder::Bool => "boolean",
            Decoder::Date => "date",
            Decoder::Str => "text",
            Decoder::Cell => "cell",
            Decoder::Resolved => "value",
        }
    }

    pub fn decode(&self, cell: &CellValue) -> Result<Value, CodecError> {
        match self {
            Decoder::Number => decode_number(cell),
            Decoder::Int => decode_int(cell),
            Decoder::Bool => decode_bool(cell),
            Decoder::Date => decode_date(cell),
            Decoder::Str => Ok(Value::Text(decode_text(cell))),
            Decoder::Cell => Ok(decode_cell(cell)),
            Decoder::Resolved => Ok(decode_resolved(cell)),
        }
    }
}

fn mismatch(expected: &'static str, cell: &CellValue) -> CodecError {
    CodecError::TypeMismatch {
        expected,
        actual: cell.kind_name(),
    }
}

fn cached(cell: &CellValue) -> Option<&CellValue> {
    match cell {
        CellValue::Formula {
            cached: Some(v), ..
        } => Some(v),
        _ => None,
    }
}

fn decode_number(cell: &CellValue) -> Result<Value, CodecError> {
    match cell {
        CellValue::Number(n) => Ok(Value::Number(*n)),
        CellValue::Bool(b) => Ok(Value::Number(if *b { 1.0 } else { 0.0 })),
        CellValue::Formula { .. } => match cached(cell) {
            Some(CellValue::Number(n)) => Ok(Value::Number(*n)),
            Some(CellValue::Bool(b)) => Ok(Value::Number(if *b { 1.0 } else { 0.0 })),
            _ => Err(mismatch("number", cell)),
        },
        _ => Err(mismatch("number", cell)),
    }
}

fn decode_int(cell: &CellValue) -> Result<Value, CodecError> {
    let narrow = |n: f64, cell: &CellValue| {
        if n.fract() == 0.0 && n >= i32::MIN as f64 && n <= i32::MAX as f64 {
            Ok(Value::Int(n as i64))
        } else {
            Err(CodecError::Parse {
                value: n.to_string(),
                target: "integer",
                detail: format!("{} is not a 32-bit integer", cell.kind_name()),
            })
        }
    };
    match cell {
        CellValue::Number(n) => narrow(*n, cell),
        CellValue::Bool(b) => Ok(Value::Int(if *b { 1 } else { 0 })),
        CellValue::Formula { .. } => match cached(cell) {
            Some(CellValue::Number(n)) => narrow(*n, cell),
            Some(CellValue::Bool(b)) => Ok(Value::Int(if *b { 1 } else { 0 })),
            _ => Err(mismatch("integer", cell)),
        },
        _ => Err(mismatch("integer", cell)),
    }
}

fn decode_bool(cell: &CellValue) -> Result<Value, CodecError> {
    match cell {
        CellValue::Bool(b) => Ok(Value::Bool(*b)),
        CellValue::Formula { .. } => match cached(cell) {
            Some(CellValue::Bool(b)) => Ok(Value::Bool(*b)),
            _ => Err(mismatch("boolean", cell)),
        },
        _ => Err(mismatch("boolean", cell)),
    }
}

fn decode_date(cell: &CellValue) -> Result<Value, CodecError> {
    match cell {
        CellValue::DateTime(dt) => Ok(Value::Date(dt.date())),
        CellValue::Formula { .. } => match cached(cell) {
            Some(CellValue::DateTime(dt)) => Ok(Value::Date(dt.date())),
            _ => Err(mismatch("date", cell)),
        },
        _ => Err(mismatch("date", cell)),
    }
}

fn decode_text(cell: &CellValue) -> String {
    match cell {
        CellValue::Empty => String::new(),
        CellValue::Number(n) => n.to_string(),
        CellValue::Text(s) => s.clone(),
        CellValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        CellValue::DateTime(dt) => dt.format("%Y-%m-%dT%H:%M:%S").to_string(),
        CellValue::Rich(rt) => rt.plain(),
        CellValue::Error(e) => e.to_string(),
        CellValue::Formula { src, .. } => src.clone(),
    }
}

fn decode_cell(cell: &CellValue) -> Value {
    match cell {
        CellValue::Number(n) => Value::Number(*n),
        CellValue::Text(s) => Value::Text(s.clone()),
        CellValue::Bool(b) => Value::Bool(*b),
        CellValue::DateTime(dt) => Value::DateTime(*dt),
        CellValue::Rich(rt) => Value::Text(rt.plain()),
        CellValue::Error(e) => Value::Error(*e),
        CellValue::Empty => Value::Empty,
        CellValue::Formula { src, .. } => Value::Text(src.clone()),
    }
}

fn decode_resolved(cell: &CellValue) -> Value {
    match cell {
        CellValue::Formula { .. } => match cached(cell) {
            Some(v) => decode_cell(v),
            None => Value::Number(0.0),
        },
        CellValue::Empty => Value::Number(0.0),
        CellValue::Rich(rt) => Value::Text(rt.plain()),
        other => decode_cell(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridform_common::ErrorKind;

    #[test]
    fn numeric_decoder_trusts_the_cache() {
        let cell = CellValue::formula("=1+2", Some(CellValue::Number(3.0)));
        assert_eq!(Decoder::Number.decode(&cell), Ok(Value::Number(3.0)));

        let uncached = CellValue::formula("=1+2", None);
        assert!(Decoder::Number.decode(&uncached).is_err());
    }

    #[test]
    fn numeric_decoder_rejects_text() {
        let err = Decoder::Number.decode(&CellValue::Text("abc".into())).unwrap_err();
        assert_eq!(
            err,
            CodecError::TypeMismatch {
                expected: "number",
                actual: "text"
            }
        );
    }

    #[test]
    fn int_decoder_requires_32_bit_integers() {
        assert_eq!(
            Decoder::Int.decode(&CellValue::Number(7.0)),
            Ok(Value::Int(7))
        );
        assert!(Decoder::Int.decode(&CellValue::Number(7.5)).is_err());
        assert!(Decoder::Int.decode(&CellValue::Number(1e12)).is_err());
        assert_eq!(Decoder::Int.decode(&CellValue::Bool(true)), Ok(Value::Int(1)));
    }

    #[test]
    fn string_decoder_is_coercive() {
        assert_eq!(
            Decoder::Str.decode(&CellValue::Empty),
            Ok(Value::Text(String::new()))
        );
        assert_eq!(
            Decoder::Str.decode(&CellValue::Bool(true)),
            Ok(Value::Text("TRUE".into()))
        );
        assert_eq!(
            Decoder::Str.decode(&CellValue::formula("=A1", None)),
            Ok(Value::Text("=A1".into()))
        );
    }

    #[test]
    fn cell_decoder_is_total() {
        use gridform_common::RichText;
        assert_eq!(
            Decoder::Cell.decode(&CellValue::Number(2.5)),
            Ok(Value::Number(2.5))
        );
        assert_eq!(Decoder::Cell.decode(&CellValue::Empty), Ok(Value::Empty));
        assert_eq!(
            Decoder::Cell.decode(&CellValue::Error(ErrorKind::Div0)),
            Ok(Value::Error(ErrorKind::Div0))
        );
        assert_eq!(
            Decoder::Cell.decode(&CellValue::Rich(RichText::from("styled"))),
            Ok(Value::Text("styled".into()))
        );
        assert_eq!(
            Decoder::Cell.decode(&CellValue::formula("=A1", None)),
            Ok(Value::Text("=A1".into()))
        );
    }

    #[test]
    fn resolved_decoder_defaults_missing_caches_to_zero() {
        assert_eq!(
            Decoder::Resolved.decode(&CellValue::formula("=A1", None)),
            Ok(Value::Number(0.0))
        );
        assert_eq!(
            Decoder::Resolved.decode(&CellValue::Empty),
            Ok(Value::Number(0.0))
        );
        assert_eq!(
            Decoder::Resolved.decode(&CellValue::Error(ErrorKind::Na)),
            Ok(Value::Error(ErrorKind::Na))
        );
    }
}

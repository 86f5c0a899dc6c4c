//! Runtime value coercions shared by the interpreter and the builtins.

use chrono::NaiveDate;
use gridform_common::{
    CellValue, ErrorKind, EvalError, Value, date_to_serial, datetime_to_serial, serial_to_date,
};
use gridform_parse::Decoder;

/// An error *value* encountered where a typed value was needed becomes a
/// pipeline failure carrying the Excel code.
pub fn error_value(kind: ErrorKind) -> EvalError {
    EvalError::failed(kind.to_string())
}

pub fn to_number(v: &Value) -> Result<f64, EvalError> {
    match v {
        Value::Number(n) => Ok(*n),
        Value::Int(i) => Ok(*i as f64),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Date(d) => Ok(date_to_serial(d)),
        Value::DateTime(dt) => Ok(datetime_to_serial(dt)),
        Value::Text(s) => s.trim().parse::<f64>().map_err(|_| EvalError::TypeMismatch {
            op: "number",
            expected: "number",
            actual: format!("'{s}'"),
        }),
        Value::Empty => Ok(0.0),
        Value::Error(k) => Err(error_value(*k)),
    }
}

pub fn to_bool(v: &Value) -> Result<bool, EvalError> {
    match v {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(*n != 0.0),
        Value::Int(i) => Ok(*i != 0),
        Value::Empty => Ok(false),
        Value::Text(s) if s.eq_ignore_ascii_case("TRUE") => Ok(true),
        Value::Text(s) if s.eq_ignore_ascii_case("FALSE") => Ok(false),
        Value::Error(k) => Err(error_value(*k)),
        other => Err(EvalError::TypeMismatch {
            op: "boolean",
            expected: "boolean",
            actual: other.kind_name().to_string(),
        }),
    }
}

pub fn to_int(v: &Value) -> Result<i64, EvalError> {
    match v {
        Value::Int(i) => Ok(*i),
        Value::Empty => Ok(0),
        Value::Error(k) => Err(error_value(*k)),
        other => {
            let n = to_number(other)?;
            Ok(n.trunc() as i64)
        }
    }
}

pub fn to_text(v: &Value) -> Result<String, EvalError> {
    match v {
        Value::Error(k) => Err(error_value(*k)),
        other => Ok(other.to_string()),
    }
}

pub fn to_date(v: &Value) -> Result<NaiveDate, EvalError> {
    match v {
        Value::Date(d) => Ok(*d),
        Value::DateTime(dt) => Ok(dt.date()),
        Value::Number(n) => Ok(serial_to_date(*n)),
        Value::Int(i) => Ok(serial_to_date(*i as f64)),
        Value::Error(k) => Err(error_value(*k)),
        other => Err(EvalError::TypeMismatch {
            op: "date",
            expected: "date",
            actual: other.kind_name().to_string(),
        }),
    }
}

/// Numeric view of a stored cell for range folds: `Some` for numbers,
/// booleans, and cached numeric formula results; `None` for anything an
/// aggregation skips; `Err` for stored error values, which strict
/// aggregations propagate.
pub fn cell_number(cell: &CellValue) -> Result<Option<f64>, EvalError> {
    match cell {
        CellValue::Number(n) => Ok(Some(*n)),
        CellValue::Bool(b) => Ok(Some(if *b { 1.0 } else { 0.0 })),
        CellValue::Error(k) => Err(error_value(*k)),
        CellValue::Formula {
            cached: Some(v), ..
        } => match v.as_ref() {
            CellValue::Number(n) => Ok(Some(*n)),
            CellValue::Bool(b) => Ok(Some(if *b { 1.0 } else { 0.0 })),
            CellValue::Error(k) => Err(error_value(*k)),
            _ => Ok(None),
        },
        _ => Ok(None),
    }
}

/// What a consumer of a cell's *result* sees (cached formula values,
/// rich text flattened); used by lookup and criteria matching.
pub fn cell_to_value(cell: &CellValue) -> Value {
    Decoder::Resolved
        .decode(cell)
        .unwrap_or(Value::Empty)
}

/// Store an evaluation result back into a cell.
pub fn value_to_cell(v: Value) -> CellValue {
    match v {
        Value::Number(n) => CellValue::Number(n),
        Value::Int(i) => CellValue::Number(i as f64),
        Value::Text(s) => CellValue::Text(s),
        Value::Bool(b) => CellValue::Bool(b),
        Value::Date(d) => CellValue::DateTime(d.and_hms_opt(0, 0, 0).expect("midnight")),
        Value::DateTime(dt) => CellValue::DateTime(dt),
        Value::Empty => CellValue::Empty,
        Value::Error(k) => CellValue::Error(k),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_coerce_leniently() {
        assert_eq!(to_number(&Value::Number(2.5)).unwrap(), 2.5);
        assert_eq!(to_number(&Value::Bool(true)).unwrap(), 1.0);
        assert_eq!(to_number(&Value::Text(" 42 ".into())).unwrap(), 42.0);
        assert_eq!(to_number(&Value::Empty).unwrap(), 0.0);
        assert!(to_number(&Value::Text("abc".into())).is_err());
        assert!(to_number(&Value::Error(ErrorKind::Na)).is_err());
    }

    #[test]
    fn cell_numbers_skip_text_and_propagate_errors() {
        assert_eq!(cell_number(&CellValue::Number(3.0)).unwrap(), Some(3.0));
        assert_eq!(cell_number(&CellValue::Text("x".into())).unwrap(), None);
        assert_eq!(cell_number(&CellValue::Empty).unwrap(), None);
        assert_eq!(
            cell_number(&CellValue::formula("=1+2", Some(CellValue::Number(3.0)))).unwrap(),
            Some(3.0)
        );
        assert!(cell_number(&CellValue::Error(ErrorKind::Div0)).is_err());
    }

    #[test]
    fn values_round_trip_into_cells() {
        assert_eq!(value_to_cell(Value::Int(4)), CellValue::Number(4.0));
        assert_eq!(
            value_to_cell(Value::Error(ErrorKind::Na)),
            CellValue::Error(ErrorKind::Na)
        );
    }
}

use chrono::{Duration as ChronoDur, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use std::fmt::{self, Display};

use crate::error::ErrorKind;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/* ───────────────────── Excel date-serial utilities ───────────────────
The 1900 date system:
  Serial 1  = 1900-01-01
  Serial 59 = 1900-02-28
  Serial 60 = 1900-02-29  (phantom – doesn't exist, but Excel thinks it does)
  Serial 61 = 1900-03-01
Base date = 1899-12-31 so that serial 1 = base + 1 day = 1900-01-01.
Time is stored as fractional days (no timezone).
------------------------------------------------------------------- */

const EPOCH_1900: NaiveDate = NaiveDate::from_ymd_opt(1899, 12, 31).unwrap();

const POST_LEAP: NaiveDate = NaiveDate::from_ymd_opt(1900, 3, 1).unwrap();

pub fn date_to_serial(date: &NaiveDate) -> f64 {
    let days = (*date - EPOCH_1900).num_days();
    // Dates on or after 1900-03-01 get +1 to account for phantom Feb 29
    let serial_days = if *date >= POST_LEAP { days + 1 } else { days };
    serial_days as f64
}

pub fn datetime_to_serial(dt: &NaiveDateTime) -> f64 {
    let secs_in_day = dt.time().num_seconds_from_midnight() as f64;
    date_to_serial(&dt.date()) + secs_in_day / 86_400.0
}

pub fn serial_to_datetime(serial: f64) -> NaiveDateTime {
    let days = serial.trunc() as i64;
    let frac_secs = (serial.fract() * 86_400.0).round() as i64;

    // Serial 60 is phantom 1900-02-29; map to 1900-02-28
    let date = if days == 60 {
        NaiveDate::from_ymd_opt(1900, 2, 28).unwrap()
    } else {
        // serial < 60: offset = serial (no phantom day yet)
        // serial > 60: offset = serial - 1 (skip phantom day)
        let offset = if days < 60 { days } else { days - 1 };
        EPOCH_1900 + ChronoDur::days(offset)
    };

    let time =
        NaiveTime::from_num_seconds_from_midnight_opt((frac_secs.rem_euclid(86_400)) as u32, 0)
            .unwrap();
    date.and_time(time)
}

pub fn serial_to_date(serial: f64) -> NaiveDate {
    serial_to_datetime(serial).date()
}

/* ───────────────────────────── rich text ───────────────────────────── */

/// One styled run inside a rich-text cell.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RichRun {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
}

/// Ordered styled runs. The engine only ever reads the plain projection.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RichText {
    pub runs: Vec<RichRun>,
}

impl RichText {
    pub fn plain(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

impl From<&str> for RichText {
    fn from(s: &str) -> Self {
        RichText {
            runs: vec![RichRun {
                text: s.to_string(),
                ..RichRun::default()
            }],
        }
    }
}

/* ───────────────────────────── cell values ───────────────────────────── */

/// What a cell *stores*. Distinct from [`Value`], which is what the
/// interpreter produces.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Bool(bool),
    DateTime(NaiveDateTime),
    Rich(RichText),
    Error(ErrorKind),
    Empty,
    /// A formula cell: the source text plus the most recently computed
    /// result, if any. The cached value is never itself a `Formula`.
    Formula {
        src: String,
        cached: Option<Box<CellValue>>,
    },
}

impl CellValue {
    pub fn formula<S: Into<String>>(src: S, cached: Option<CellValue>) -> Self {
        let cached = cached.map(|v| {
            debug_assert!(!matches!(v, CellValue::Formula { .. }));
            Box::new(v)
        });
        CellValue::Formula {
            src: src.into(),
            cached,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            CellValue::Number(_) => "number",
            CellValue::Text(_) => "text",
            CellValue::Bool(_) => "boolean",
            CellValue::DateTime(_) => "datetime",
            CellValue::Rich(_) => "rich text",
            CellValue::Error(_) => "error",
            CellValue::Empty => "empty",
            CellValue::Formula { .. } => "formula",
        }
    }
}

/* ───────────────────────────── runtime values ───────────────────────── */

/// What evaluation produces. Error *values* (a cell holding `#N/A`, a
/// lookup miss) flow through here; pipeline failures travel as
/// `Err(EvalError)` instead.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Int(i64),
    Text(String),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Empty,
    Error(ErrorKind),
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Int(_) => "integer",
            Value::Text(_) => "text",
            Value::Bool(_) => "boolean",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
            Value::Empty => "empty",
            Value::Error(_) => "error",
        }
    }

    /// Serial-number view for anything date- or number-like.
    pub fn as_serial_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Int(i) => Some(*i as f64),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Date(d) => Some(date_to_serial(d)),
            Value::DateTime(dt) => Some(datetime_to_serial(dt)),
            _ => None,
        }
    }

    /// Build a date or datetime value back from a serial number.
    pub fn from_serial_number(serial: f64) -> Self {
        let dt = serial_to_datetime(serial);
        if dt.time() == NaiveTime::from_hms_opt(0, 0, 0).unwrap() {
            Value::Date(dt.date())
        } else {
            Value::DateTime(dt)
        }
    }

}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Value::Date(d) => write!(f, "{d}"),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S")),
            Value::Empty => Ok(()),
            Value::Error(e) => write!(f, "{e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_handles_the_phantom_leap_day() {
        let jan1 = NaiveDate::from_ymd_opt(1900, 1, 1).unwrap();
        assert_eq!(date_to_serial(&jan1), 1.0);
        let feb28 = NaiveDate::from_ymd_opt(1900, 2, 28).unwrap();
        assert_eq!(date_to_serial(&feb28), 59.0);
        let mar1 = NaiveDate::from_ymd_opt(1900, 3, 1).unwrap();
        assert_eq!(date_to_serial(&mar1), 61.0);
        assert_eq!(serial_to_date(60.0), feb28);
    }

    #[test]
    fn serial_round_trips_modern_dates() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let dt = d.and_hms_opt(12, 0, 0).unwrap();
        let serial = datetime_to_serial(&dt);
        assert_eq!(serial_to_datetime(serial), dt);
        assert_eq!(serial.fract(), 0.5);
        assert_eq!(Value::from_serial_number(serial), Value::DateTime(dt));
        assert_eq!(
            Value::from_serial_number(serial.trunc()),
            Value::Date(d)
        );
    }

    #[test]
    fn formula_cells_cache_non_formula_values() {
        let cell = CellValue::formula("=A1+1", Some(CellValue::Number(3.0)));
        match cell {
            CellValue::Formula { src, cached } => {
                assert_eq!(src, "=A1+1");
                assert_eq!(*cached.unwrap(), CellValue::Number(3.0));
            }
            _ => unreachable!(),
        }
    }

    #[cfg(feature = "serde")]
    #[test]
    fn cell_values_round_trip_through_json() {
        let cells = vec![
            CellValue::Number(1.5),
            CellValue::Text("hi".into()),
            CellValue::Bool(true),
            CellValue::Error(ErrorKind::Na),
            CellValue::Empty,
            CellValue::formula("=A1+1", Some(CellValue::Number(2.0))),
        ];
        for cell in cells {
            let json = serde_json::to_string(&cell).unwrap();
            let back: CellValue = serde_json::from_str(&json).unwrap();
            assert_eq!(back, cell);
        }
    }

    #[test]
    fn rich_text_plain_projection() {
        let rt = RichText {
            runs: vec![
                RichRun {
                    text: "Hello ".into(),
                    bold: true,
                    italic: false,
                },
                RichRun {
                    text: "world".into(),
                    ..RichRun::default()
                },
            ],
        };
        assert_eq!(rt.plain(), "Hello world");
    }
}

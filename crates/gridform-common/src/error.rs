//! Error taxonomies shared by the parser and the evaluator.
//!
//! - [`ErrorKind`]   : the closed set of Excel-style error codes a cell can hold
//! - [`CodecError`]  : a cell value failed to decode to the requested type
//! - [`EvalError`]   : evaluation failures (reference, codec, arithmetic, cycles)
//! - [`XLError`]     : single-line, user-visible rendering of any of the above
//!
//! All of these are plain data. Nothing here panics; converters exist so
//! callers can collapse everything into an [`XLError`] at the boundary.

use std::{error::Error, fmt};

use crate::addr::ARef;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The error codes a cell can store.
///
/// Names are CamelCase; `Display` renders them exactly as a spreadsheet
/// shows them (`#DIV/0!`, …).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Na,
    Div0,
    Ref,
    Value,
    Name,
    Num,
    Null,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Na => "#N/A",
            Self::Div0 => "#DIV/0!",
            Self::Ref => "#REF!",
            Self::Value => "#VALUE!",
            Self::Name => "#NAME?",
            Self::Num => "#NUM!",
            Self::Null => "#NULL!",
        })
    }
}

impl ErrorKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "#n/a" => Some(Self::Na),
            "#div/0!" => Some(Self::Div0),
            "#ref!" => Some(Self::Ref),
            "#value!" => Some(Self::Value),
            "#name?" => Some(Self::Name),
            "#num!" => Some(Self::Num),
            "#null!" => Some(Self::Null),
            _ => None,
        }
    }
}

/// A cell value could not be decoded to the type a context demanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },
    Parse {
        value: String,
        target: &'static str,
        detail: String,
    },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::TypeMismatch { expected, actual } => {
                write!(f, "expected {expected}, found {actual}")
            }
            CodecError::Parse {
                value,
                target,
                detail,
            } => write!(f, "cannot read '{value}' as {target}: {detail}"),
        }
    }
}

impl Error for CodecError {}

/// Evaluation failures. These bubble through arithmetic, comparisons and
/// function calls without masking; only the explicit IFERROR function may
/// swallow them.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    /// A reference could not be satisfied (unknown sheet, empty cell in a
    /// strict context, …).
    RefError { addr: ARef, reason: String },
    /// A referenced cell decoded to the wrong type.
    CodecFailed { addr: ARef, source: CodecError },
    /// Division with a (near-)zero denominator; both operands are carried
    /// as canonical formula text for diagnostics.
    DivByZero {
        numerator: String,
        denominator: String,
    },
    /// A dependency cycle through these addresses.
    CircularRef(Vec<ARef>),
    /// An operator received a value of the wrong type.
    TypeMismatch {
        op: &'static str,
        expected: &'static str,
        actual: String,
    },
    /// Anything a function reports about its own semantics.
    EvalFailed {
        reason: String,
        context: Option<String>,
    },
}

impl EvalError {
    pub fn failed<S: Into<String>>(reason: S) -> Self {
        EvalError::EvalFailed {
            reason: reason.into(),
            context: None,
        }
    }

    pub fn failed_with<S: Into<String>, C: Into<String>>(reason: S, context: C) -> Self {
        EvalError::EvalFailed {
            reason: reason.into(),
            context: Some(context.into()),
        }
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::RefError { addr, reason } => {
                write!(f, "reference {} failed: {reason}", addr.to_a1())
            }
            EvalError::CodecFailed { addr, source } => {
                write!(f, "cell {} could not be decoded: {source}", addr.to_a1())
            }
            EvalError::DivByZero {
                numerator,
                denominator,
            } => write!(f, "division by zero: {numerator} / {denominator}"),
            EvalError::CircularRef(cycle) => {
                write!(f, "circular reference: ")?;
                for (i, a) in cycle.iter().enumerate() {
                    if i > 0 {
                        write!(f, " -> ")?;
                    }
                    write!(f, "{}", a.to_a1())?;
                }
                Ok(())
            }
            EvalError::TypeMismatch {
                op,
                expected,
                actual,
            } => write!(f, "{op}: expected {expected}, got {actual}"),
            EvalError::EvalFailed { reason, context } => {
                write!(f, "{reason}")?;
                if let Some(ctx) = context {
                    write!(f, " ({ctx})")?;
                }
                Ok(())
            }
        }
    }
}

impl Error for EvalError {}

/// The single user-visible error form. Both taxonomies convert into it;
/// the formula text is attached when the caller knows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XLError {
    pub message: String,
    pub formula: Option<String>,
}

impl XLError {
    pub fn new<S: Into<String>>(message: S) -> Self {
        XLError {
            message: message.into(),
            formula: None,
        }
    }

    pub fn with_formula<S: Into<String>>(mut self, formula: S) -> Self {
        self.formula = Some(formula.into());
        self
    }
}

impl fmt::Display for XLError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.formula {
            Some(src) => write!(f, "{} in '{}'", self.message, src),
            None => write!(f, "{}", self.message),
        }
    }
}

impl Error for XLError {}

impl From<EvalError> for XLError {
    fn from(err: EvalError) -> Self {
        XLError::new(err.to_string())
    }
}

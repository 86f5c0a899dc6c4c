//! Parse failures. Every variant that can point somewhere carries a
//! 0-based character offset into the source so the renderer can draw a
//! caret under the offending character.

use std::{error::Error, fmt};

use gridform_common::XLError;

/// Hard cap on formula source length.
pub const MAX_FORMULA_LEN: usize = 8192;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    UnexpectedChar(char),
    UnexpectedEof,
    InvalidCellRef(String),
    InvalidNumber(String),
    UnbalancedDelimiter(char),
    UnknownFunction {
        name: String,
        suggestions: Vec<String>,
    },
    InvalidArguments {
        name: String,
        detail: String,
    },
    InvalidOperator(String),
    EmptyFormula,
    FormulaTooLong(usize, usize),
    Generic(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub pos: Option<usize>,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind) -> Self {
        ParseError { kind, pos: None }
    }

    pub fn at(kind: ParseErrorKind, pos: usize) -> Self {
        ParseError {
            kind,
            pos: Some(pos),
        }
    }

    pub fn message(&self) -> String {
        match &self.kind {
            ParseErrorKind::UnexpectedChar(c) => format!("unexpected character '{c}'"),
            ParseErrorKind::UnexpectedEof => "unexpected end of formula".to_string(),
            ParseErrorKind::InvalidCellRef(s) => format!("invalid cell reference '{s}'"),
            ParseErrorKind::InvalidNumber(s) => format!("invalid number '{s}'"),
            ParseErrorKind::UnbalancedDelimiter(c) => format!("unbalanced '{c}'"),
            ParseErrorKind::UnknownFunction { name, suggestions } => {
                if suggestions.is_empty() {
                    format!("unknown function '{name}'")
                } else {
                    format!(
                        "unknown function '{name}' (did you mean {}?)",
                        suggestions.join(", ")
                    )
                }
            }
            ParseErrorKind::InvalidArguments { name, detail } => {
                format!("invalid arguments to {name}: {detail}")
            }
            ParseErrorKind::InvalidOperator(s) => s.clone(),
            ParseErrorKind::EmptyFormula => "empty formula".to_string(),
            ParseErrorKind::FormulaTooLong(len, max) => {
                format!("formula is {len} characters, maximum is {max}")
            }
            ParseErrorKind::Generic(s) => s.clone(),
        }
    }

    /// Three-line diagnostic: the source, a caret line, the message.
    pub fn render(&self, formula: &str) -> String {
        let mut out = String::with_capacity(formula.len() * 2 + 64);
        out.push_str(formula);
        out.push('\n');
        if let Some(pos) = self.pos {
            let col = formula
                .char_indices()
                .take_while(|(i, _)| *i < pos)
                .count();
            for _ in 0..col {
                out.push(' ');
            }
            out.push('^');
            out.push('\n');
        }
        out.push_str(&self.message());
        out
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pos {
            Some(pos) => write!(f, "{} at offset {pos}", self.message()),
            None => write!(f, "{}", self.message()),
        }
    }
}

impl Error for ParseError {}

impl From<ParseError> for XLError {
    fn from(err: ParseError) -> Self {
        XLError::new(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_points_at_the_offset() {
        let err = ParseError::at(ParseErrorKind::UnexpectedChar('@'), 4);
        let rendered = err.render("=1+2@");
        assert_eq!(rendered, "=1+2@\n    ^\nunexpected character '@'");
    }

    #[test]
    fn render_without_position_omits_the_caret_line() {
        let err = ParseError::new(ParseErrorKind::EmptyFormula);
        assert_eq!(err.render(""), "\nempty formula");
    }

    #[test]
    fn unknown_function_lists_suggestions() {
        let err = ParseError::at(
            ParseErrorKind::UnknownFunction {
                name: "SUMM".into(),
                suggestions: vec!["SUM".into(), "SUMIF".into()],
            },
            1,
        );
        assert!(err.message().contains("did you mean SUM, SUMIF?"));
    }
}

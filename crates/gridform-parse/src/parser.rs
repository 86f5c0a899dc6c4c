//! Precedence-climbing parser from tokens to the typed expression tree.
//!
//! Function names are resolved against a [`FunctionProvider`] *while
//! parsing*: unknown names fail with suggestions, arity is checked on the
//! spot, and every argument is coerced per the function's declared kinds,
//! so the finished tree carries no `PolyRef` and every `Call` is bound to
//! its specification.

use gridform_common::{CellRange, Value, parse_a1_anchored};

use crate::ast::{ArithOp, CellRef, CmpOp, Expr, LogicOp, RangeRef};
use crate::coerce;
use crate::error::{MAX_FORMULA_LEN, ParseError, ParseErrorKind};
use crate::tokenizer::{Token, TokenSubType, TokenType, Tokenizer};
use crate::traits::FunctionProvider;

/// Parse a formula (with or without the leading `=`) against a function
/// provider.
pub fn parse_with(formula: &str, provider: &dyn FunctionProvider) -> Result<Expr, ParseError> {
    let trimmed = formula.trim();
    if trimmed.is_empty() {
        return Err(ParseError::new(ParseErrorKind::EmptyFormula));
    }
    let len = trimmed.chars().count();
    if len > MAX_FORMULA_LEN {
        return Err(ParseError::new(ParseErrorKind::FormulaTooLong(
            len,
            MAX_FORMULA_LEN,
        )));
    }

    let tokens: Vec<Token> = Tokenizer::new(formula)?
        .items
        .into_iter()
        .filter(|t| t.token_type != TokenType::Whitespace)
        .collect();

    let mut parser = Parser {
        tokens,
        pos: 0,
        provider,
    };
    let expr = parser.parse_expression()?;

    if parser.pos < parser.tokens.len() {
        let token = &parser.tokens[parser.pos];
        let ch = token.value.chars().next().unwrap_or(' ');
        return Err(ParseError::at(ParseErrorKind::UnexpectedChar(ch), token.start));
    }

    // A bare reference formula resolves to the cell's computed value.
    Ok(coerce::any(expr))
}

struct Parser<'p> {
    tokens: Vec<Token>,
    pos: usize,
    provider: &'p dyn FunctionProvider,
}

enum Infix {
    Arith(ArithOp),
    Cmp(CmpOp),
    Logic(LogicOp),
}

impl<'p> Parser<'p> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary(0)
    }

    /// `(operator, precedence, right-associative)` for the token at the
    /// cursor, if it can act as an infix operator here.
    fn peek_infix(&self) -> Result<Option<(Infix, u8, bool)>, ParseError> {
        let Some(token) = self.peek() else {
            return Ok(None);
        };
        match token.token_type {
            TokenType::OpInfix => {
                let op = match token.value.as_str() {
                    "=" => (Infix::Cmp(CmpOp::Eq), 3, false),
                    "<>" => (Infix::Cmp(CmpOp::Ne), 3, false),
                    "<" => (Infix::Cmp(CmpOp::Lt), 3, false),
                    "<=" => (Infix::Cmp(CmpOp::Le), 3, false),
                    ">" => (Infix::Cmp(CmpOp::Gt), 3, false),
                    ">=" => (Infix::Cmp(CmpOp::Ge), 3, false),
                    "+" => (Infix::Arith(ArithOp::Add), 5, false),
                    "-" => (Infix::Arith(ArithOp::Sub), 5, false),
                    "*" => (Infix::Arith(ArithOp::Mul), 6, false),
                    "/" => (Infix::Arith(ArithOp::Div), 6, false),
                    "&" => {
                        return Err(ParseError::at(
                            ParseErrorKind::InvalidOperator(
                                "the '&' concatenation operator is not yet supported".into(),
                            ),
                            token.start,
                        ));
                    }
                    "^" => {
                        return Err(ParseError::at(
                            ParseErrorKind::InvalidOperator(
                                "the '^' exponentiation operator is not yet supported".into(),
                            ),
                            token.start,
                        ));
                    }
                    other => {
                        let ch = other.chars().next().unwrap_or(' ');
                        return Err(ParseError::at(
                            ParseErrorKind::UnexpectedChar(ch),
                            token.start,
                        ));
                    }
                };
                Ok(Some(op))
            }
            TokenType::Operand if token.subtype == TokenSubType::Range => {
                if token.value.eq_ignore_ascii_case("AND") {
                    Ok(Some((Infix::Logic(LogicOp::And), 2, true)))
                } else if token.value.eq_ignore_ascii_case("OR") {
                    Ok(Some((Infix::Logic(LogicOp::Or), 1, true)))
                } else {
                    Ok(None)
                }
            }
            _ => Ok(None),
        }
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;

        while let Some((op, prec, right_assoc)) = self.peek_infix()? {
            if prec < min_prec {
                break;
            }
            self.pos += 1;

            let next_min = if right_assoc { prec } else { prec + 1 };
            let right = self.parse_binary(next_min)?;

            left = match op {
                Infix::Arith(op) => Expr::Arith {
                    op,
                    lhs: Box::new(coerce::number(left)),
                    rhs: Box::new(coerce::number(right)),
                },
                // `=` and `<>` compare across types; orderings are numeric.
                Infix::Cmp(op @ (CmpOp::Eq | CmpOp::Ne)) => Expr::Cmp {
                    op,
                    lhs: Box::new(coerce::any(left)),
                    rhs: Box::new(coerce::any(right)),
                },
                Infix::Cmp(op) => Expr::Cmp {
                    op,
                    lhs: Box::new(coerce::number(left)),
                    rhs: Box::new(coerce::number(right)),
                },
                Infix::Logic(op) => Expr::Logic {
                    op,
                    lhs: Box::new(coerce::logical(left)),
                    rhs: Box::new(coerce::logical(right)),
                },
            };
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if let Some(token) = self.peek() {
            if token.token_type == TokenType::OpPrefix {
                let negate = token.value == "-";
                self.pos += 1;
                let expr = self.parse_unary()?;
                return Ok(if negate {
                    Expr::Arith {
                        op: ArithOp::Sub,
                        lhs: Box::new(Expr::Lit(Value::Number(0.0))),
                        rhs: Box::new(coerce::number(expr)),
                    }
                } else {
                    coerce::number(expr)
                });
            }
            if token.token_type == TokenType::Operand
                && token.subtype == TokenSubType::Range
                && token.value.eq_ignore_ascii_case("NOT")
            {
                self.pos += 1;
                let expr = self.parse_unary()?;
                return Ok(Expr::Not(Box::new(coerce::logical(expr))));
            }
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let Some(token) = self.peek().cloned() else {
            let end = self.tokens.last().map(|t| t.end).unwrap_or(0);
            return Err(ParseError::at(ParseErrorKind::UnexpectedEof, end));
        };

        match token.token_type {
            TokenType::Operand => {
                self.pos += 1;
                self.parse_operand(token)
            }
            TokenType::Func if token.subtype == TokenSubType::Open => {
                self.pos += 1;
                self.parse_call(token)
            }
            TokenType::Paren if token.subtype == TokenSubType::Open => {
                self.pos += 1;
                let expr = self.parse_expression()?;
                match self.peek() {
                    Some(t)
                        if t.token_type == TokenType::Paren
                            && t.subtype == TokenSubType::Close =>
                    {
                        self.pos += 1;
                        Ok(expr)
                    }
                    Some(t) => {
                        let ch = t.value.chars().next().unwrap_or(' ');
                        Err(ParseError::at(ParseErrorKind::UnexpectedChar(ch), t.start))
                    }
                    None => Err(ParseError::at(ParseErrorKind::UnexpectedEof, token.start)),
                }
            }
            _ => {
                let ch = token.value.chars().next().unwrap_or(' ');
                Err(ParseError::at(ParseErrorKind::UnexpectedChar(ch), token.start))
            }
        }
    }

    fn parse_operand(&mut self, token: Token) -> Result<Expr, ParseError> {
        match token.subtype {
            TokenSubType::Number => token
                .value
                .parse::<f64>()
                .map(|n| Expr::Lit(Value::Number(n)))
                .map_err(|_| {
                    ParseError::at(ParseErrorKind::InvalidNumber(token.value.clone()), token.start)
                }),
            TokenSubType::Text => {
                let mut text = token.value.clone();
                if text.starts_with('"') && text.ends_with('"') && text.len() >= 2 {
                    text = text[1..text.len() - 1].replace("\"\"", "\"");
                }
                Ok(Expr::Lit(Value::Text(text)))
            }
            TokenSubType::Logical => Ok(Expr::Lit(Value::Bool(
                token.value.eq_ignore_ascii_case("TRUE"),
            ))),
            TokenSubType::Error => match gridform_common::ErrorKind::parse(&token.value) {
                Some(kind) => Ok(Expr::Lit(Value::Error(kind))),
                None => Err(ParseError::at(
                    ParseErrorKind::Generic(format!("unknown error literal '{}'", token.value)),
                    token.start,
                )),
            },
            TokenSubType::Range => self.parse_reference(token),
            _ => {
                let ch = token.value.chars().next().unwrap_or(' ');
                Err(ParseError::at(ParseErrorKind::UnexpectedChar(ch), token.start))
            }
        }
    }

    fn parse_reference(&mut self, token: Token) -> Result<Expr, ParseError> {
        let raw = token.value.as_str();
        let pos = token.start;

        let (sheet, rest) = split_sheet_qualifier(raw)
            .ok_or_else(|| ParseError::at(ParseErrorKind::InvalidCellRef(raw.to_string()), pos))?;

        let bad_ref = |part: &str| {
            // A token that leads with a digit or dot was meant as a number.
            let kind = if part
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_digit() || c == '.')
            {
                ParseErrorKind::InvalidNumber(raw.to_string())
            } else {
                ParseErrorKind::InvalidCellRef(raw.to_string())
            };
            ParseError::at(kind, pos)
        };

        if let Some((start_text, end_text)) = rest.split_once(':') {
            let (start, start_anchor) =
                parse_a1_anchored(start_text).ok_or_else(|| bad_ref(start_text))?;
            let (end, end_anchor) = parse_a1_anchored(end_text).ok_or_else(|| bad_ref(end_text))?;
            Ok(Expr::Range(RangeRef {
                sheet,
                range: CellRange::new(start, end),
                anchors: (start_anchor, end_anchor),
            }))
        } else {
            let (addr, anchor) = parse_a1_anchored(rest).ok_or_else(|| bad_ref(rest))?;
            Ok(Expr::PolyRef(CellRef { sheet, addr, anchor }))
        }
    }

    fn parse_call(&mut self, func_token: Token) -> Result<Expr, ParseError> {
        let name = func_token.value[..func_token.value.len() - 1].to_string();
        let pos = func_token.start;
        let args = self.parse_arguments(pos)?;

        // IF is a special form so that only the selected branch is ever
        // evaluated; a missing else-branch yields FALSE.
        if name.eq_ignore_ascii_case("IF") {
            if !(args.len() == 2 || args.len() == 3) {
                return Err(ParseError::at(
                    ParseErrorKind::InvalidArguments {
                        name: "IF".into(),
                        detail: format!(
                            "expected between 2 and 3 arguments, got {}",
                            args.len()
                        ),
                    },
                    pos,
                ));
            }
            let mut it = args.into_iter();
            let cond = coerce::logical(it.next().unwrap());
            let then = coerce::any(it.next().unwrap());
            let otherwise = it
                .next()
                .map(coerce::any)
                .unwrap_or(Expr::Lit(Value::Bool(false)));
            return Ok(Expr::If {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            });
        }

        let Some(func) = self.provider.lookup(&name) else {
            return Err(ParseError::at(
                ParseErrorKind::UnknownFunction {
                    name: name.to_uppercase(),
                    suggestions: suggestions(&name, self.provider),
                },
                pos,
            ));
        };

        let arity = func.arity();
        if !arity.accepts(args.len()) {
            return Err(ParseError::at(
                ParseErrorKind::InvalidArguments {
                    name: func.name().to_string(),
                    detail: format!("expected {arity}, got {}", args.len()),
                },
                pos,
            ));
        }

        let kinds = func.arg_kinds();
        let mut coerced = Vec::with_capacity(args.len());
        for (i, arg) in args.into_iter().enumerate() {
            let kind = kinds
                .get(i)
                .or(kinds.last())
                .copied()
                .unwrap_or(gridform_common::ArgKind::Any);
            coerced.push(coerce::by_kind(kind, arg, func.name(), pos)?);
        }

        Ok(Expr::Call {
            func,
            args: coerced,
        })
    }

    fn parse_arguments(&mut self, open_pos: usize) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();

        let closes = |t: &Token| t.token_type == TokenType::Func && t.subtype == TokenSubType::Close;
        let separates =
            |t: &Token| t.token_type == TokenType::Sep && t.subtype == TokenSubType::Arg;

        match self.peek() {
            Some(t) if closes(t) => {
                self.pos += 1;
                return Ok(args);
            }
            Some(t) if separates(t) => {
                args.push(Expr::Lit(Value::Empty));
                self.pos += 1;
            }
            Some(_) => args.push(self.parse_expression()?),
            None => return Err(ParseError::at(ParseErrorKind::UnexpectedEof, open_pos)),
        }

        loop {
            let Some(token) = self.peek() else {
                return Err(ParseError::at(ParseErrorKind::UnexpectedEof, open_pos));
            };
            if separates(token) {
                self.pos += 1;
                match self.peek() {
                    Some(t) if separates(t) => args.push(Expr::Lit(Value::Empty)),
                    Some(t) if closes(t) => {
                        args.push(Expr::Lit(Value::Empty));
                        self.pos += 1;
                        break;
                    }
                    Some(_) => args.push(self.parse_expression()?),
                    None => {
                        return Err(ParseError::at(ParseErrorKind::UnexpectedEof, open_pos));
                    }
                }
            } else if closes(token) {
                self.pos += 1;
                break;
            } else {
                let ch = token.value.chars().next().unwrap_or(' ');
                return Err(ParseError::at(
                    ParseErrorKind::UnexpectedChar(ch),
                    token.start,
                ));
            }
        }

        Ok(args)
    }
}

/// Split `Sheet!A1` / `'My Sheet'!A1` into a validated sheet name and the
/// local part. No qualifier returns `(None, raw)`.
fn split_sheet_qualifier(raw: &str) -> Option<(Option<String>, &str)> {
    if let Some(inner) = raw.strip_prefix('\'') {
        // Quoted: find the closing quote that precedes '!', honoring ''
        let bytes = inner.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'\'' {
                if bytes.get(i + 1) == Some(&b'\'') {
                    i += 2;
                    continue;
                }
                if bytes.get(i + 1) == Some(&b'!') {
                    let name = inner[..i].replace("''", "'");
                    if name.is_empty() {
                        return None;
                    }
                    return Some((Some(name), &inner[i + 2..]));
                }
                return None;
            }
            i += 1;
        }
        return None;
    }

    match raw.split_once('!') {
        Some((sheet, rest)) => {
            if !is_valid_sheet_name(sheet) {
                return None;
            }
            Some((Some(sheet.to_string()), rest))
        }
        None => Some((None, raw)),
    }
}

fn is_valid_sheet_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Up to three registry names within Levenshtein distance 3, closest
/// first.
fn suggestions(name: &str, provider: &dyn FunctionProvider) -> Vec<String> {
    let upper = name.to_uppercase();
    let mut candidates: Vec<(usize, &str)> = provider
        .names()
        .into_iter()
        .chain(std::iter::once("IF"))
        .filter_map(|candidate| {
            let dist = levenshtein(&upper, candidate);
            (dist <= 3).then_some((dist, candidate))
        })
        .collect();
    candidates.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));
    candidates.dedup_by(|a, b| a.1 == b.1);
    candidates
        .into_iter()
        .take(3)
        .map(|(_, n)| n.to_string())
        .collect()
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, &ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

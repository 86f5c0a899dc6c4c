pub mod ast;
pub mod codec;
pub mod coerce;
pub mod error;
pub mod parser;
pub mod pretty;
pub mod shift;
pub mod tokenizer;
pub mod traits;

pub use ast::{ArithOp, CellRef, CmpOp, Expr, LogicOp, RangeRef, RefSite};
pub use codec::Decoder;
pub use error::{MAX_FORMULA_LEN, ParseError, ParseErrorKind};
pub use parser::parse_with;
pub use pretty::canonical_formula;
pub use shift::shift_expr;
pub use tokenizer::{Token, TokenSubType, TokenType, Tokenizer};
pub use traits::{
    ArgumentHandle, EvalContext, Function, FunctionProvider, InMemoryRange, Range,
};

// Re-export common types
pub use gridform_common::{
    ARef, Anchor, ArgKind, Arity, CellRange, CellValue, Clock, CodecError, ErrorKind, EvalError,
    FnFlags, Value, XLError,
};

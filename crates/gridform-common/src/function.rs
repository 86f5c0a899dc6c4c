//! Static metadata describing a callable function specification.

use std::fmt;

/// How many arguments a function accepts.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Arity {
    Exact(usize),
    Range(usize, usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(&self, n: usize) -> bool {
        match *self {
            Arity::Exact(k) => n == k,
            Arity::Range(lo, hi) => n >= lo && n <= hi,
            Arity::AtLeast(lo) => n >= lo,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Arity::Exact(1) => write!(f, "exactly 1 argument"),
            Arity::Exact(k) => write!(f, "exactly {k} arguments"),
            Arity::Range(lo, hi) => write!(f, "between {lo} and {hi} arguments"),
            Arity::AtLeast(1) => write!(f, "at least 1 argument"),
            Arity::AtLeast(lo) => write!(f, "at least {lo} arguments"),
        }
    }
}

/// The shape a function declares for each positional argument. For
/// variadic functions the last kind repeats.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ArgKind {
    Number,
    Int,
    Text,
    Logical,
    Date,
    Range,
    Any,
}

bitflags::bitflags! {
    /// Behavioural flags on a function specification. RETURNS_* drive the
    /// serial coercions the parser inserts when a numeric context consumes
    /// a date-valued call.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct FnFlags: u8 {
        const VOLATILE         = 0b0001;
        const RETURNS_DATE     = 0b0010;
        const RETURNS_TIME     = 0b0100;
        const RETURNS_DATETIME = 0b1000;
    }
}

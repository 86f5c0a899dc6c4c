//! Cell addresses, anchors and rectangular ranges.
//!
//! Addresses are 0-indexed `(col, row)` pairs; A1 notation is the textual
//! form (`col` rendered as letters, `row` rendered 1-based). Whether a
//! reference is absolute is a property of the *reference*, not the address,
//! so [`Anchor`] lives beside [`ARef`] rather than inside it.

use once_cell::sync::Lazy;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// Precomputed names for the common columns (A..ZZ = 702 entries).
static COLUMN_LOOKUP: Lazy<Vec<String>> = Lazy::new(|| {
    let mut cols = Vec::with_capacity(702);
    for c in b'A'..=b'Z' {
        cols.push(String::from(c as char));
    }
    for c1 in b'A'..=b'Z' {
        for c2 in b'A'..=b'Z' {
            cols.push(format!("{}{}", c1 as char, c2 as char));
        }
    }
    cols
});

/// Render a 0-based column index as letters (`0 -> "A"`, `27 -> "AB"`).
pub fn column_label(col: u32) -> String {
    if col < 702 {
        return COLUMN_LOOKUP[col as usize].clone();
    }
    let mut num = col + 1;
    let mut out = String::with_capacity(3);
    while num > 0 {
        num -= 1;
        out.insert(0, ((num % 26) as u8 + b'A') as char);
        num /= 26;
    }
    out
}

/// Parse column letters into a 0-based index. Rejects empty input, anything
/// longer than three letters, and non-alphabetic bytes.
pub fn column_index(column: &str) -> Option<u32> {
    let bytes = column.as_bytes();
    if bytes.is_empty() || bytes.len() > 3 {
        return None;
    }
    let mut result = 0u32;
    for &b in bytes {
        if !b.is_ascii_alphabetic() {
            return None;
        }
        result = result
            .checked_mul(26)?
            .checked_add((b.to_ascii_uppercase() - b'A' + 1) as u32)?;
    }
    Some(result - 1)
}

/// A cell address: 0-indexed column and row.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ARef {
    pub col: u32,
    pub row: u32,
}

impl ARef {
    pub fn new(col: u32, row: u32) -> Self {
        ARef { col, row }
    }

    /// A1 rendering without anchors.
    pub fn to_a1(&self) -> String {
        format!("{}{}", column_label(self.col), self.row + 1)
    }

    /// Parse plain A1 text (no `$`, no sheet qualifier).
    pub fn parse_a1(s: &str) -> Option<Self> {
        let (addr, anchor) = parse_a1_anchored(s)?;
        if anchor == Anchor::Relative {
            Some(addr)
        } else {
            None
        }
    }
}

impl fmt::Display for ARef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_a1())
    }
}

/// Which components of a reference are pinned.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum Anchor {
    #[default]
    Relative,
    ColAbsolute,
    RowAbsolute,
    Absolute,
}

impl Anchor {
    pub fn from_flags(col_abs: bool, row_abs: bool) -> Self {
        match (col_abs, row_abs) {
            (false, false) => Anchor::Relative,
            (true, false) => Anchor::ColAbsolute,
            (false, true) => Anchor::RowAbsolute,
            (true, true) => Anchor::Absolute,
        }
    }

    pub fn col_abs(&self) -> bool {
        matches!(self, Anchor::ColAbsolute | Anchor::Absolute)
    }

    pub fn row_abs(&self) -> bool {
        matches!(self, Anchor::RowAbsolute | Anchor::Absolute)
    }
}

/// Parse A1 text with optional `$` anchors, e.g. `$AB$12`.
///
/// Byte-based: optional `$`, letters, optional `$`, digits, nothing else.
pub fn parse_a1_anchored(reference: &str) -> Option<(ARef, Anchor)> {
    let bytes = reference.as_bytes();
    let mut i = 0;

    let col_abs = bytes.first() == Some(&b'$');
    if col_abs {
        i += 1;
    }

    let col_start = i;
    while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
        i += 1;
    }
    if i == col_start {
        return None;
    }
    let col = column_index(&reference[col_start..i])?;

    let row_abs = bytes.get(i) == Some(&b'$');
    if row_abs {
        i += 1;
    }

    let row_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i == row_start || i != bytes.len() {
        return None;
    }
    let row: u32 = reference[row_start..i].parse().ok()?;
    if row == 0 {
        return None;
    }

    Some((
        ARef::new(col, row - 1),
        Anchor::from_flags(col_abs, row_abs),
    ))
}

/// An inclusive rectangle of cells. Constructor-normalized so that
/// `start_col <= end_col` and `start_row <= end_row` always hold.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct CellRange {
    pub start_col: u32,
    pub start_row: u32,
    pub end_col: u32,
    pub end_row: u32,
}

impl CellRange {
    pub fn new(a: ARef, b: ARef) -> Self {
        CellRange {
            start_col: a.col.min(b.col),
            start_row: a.row.min(b.row),
            end_col: a.col.max(b.col),
            end_row: a.row.max(b.row),
        }
    }

    pub fn single(addr: ARef) -> Self {
        Self::new(addr, addr)
    }

    pub fn width(&self) -> u32 {
        self.end_col - self.start_col + 1
    }

    pub fn height(&self) -> u32 {
        self.end_row - self.start_row + 1
    }

    pub fn top_left(&self) -> ARef {
        ARef::new(self.start_col, self.start_row)
    }

    pub fn bottom_right(&self) -> ARef {
        ARef::new(self.end_col, self.end_row)
    }

    pub fn contains(&self, addr: ARef) -> bool {
        addr.col >= self.start_col
            && addr.col <= self.end_col
            && addr.row >= self.start_row
            && addr.row <= self.end_row
    }

    /// Row-major enumeration of member addresses.
    pub fn cells(&self) -> impl Iterator<Item = ARef> + '_ {
        let r = *self;
        (r.start_row..=r.end_row)
            .flat_map(move |row| (r.start_col..=r.end_col).map(move |col| ARef::new(col, row)))
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.top_left().to_a1(), self.bottom_right().to_a1())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_label_round_trip() {
        for col in [0u32, 1, 25, 26, 27, 701, 702, 16383] {
            assert_eq!(column_index(&column_label(col)), Some(col));
        }
    }

    #[test]
    fn a1_rendering_is_one_based() {
        assert_eq!(ARef::new(0, 0).to_a1(), "A1");
        assert_eq!(ARef::new(2, 9).to_a1(), "C10");
        assert_eq!(ARef::new(27, 0).to_a1(), "AB1");
        assert_eq!(ARef::parse_a1("C10"), Some(ARef::new(2, 9)));
        assert_eq!(ARef::parse_a1("$C$10"), None);
    }

    #[test]
    fn anchored_parse_extracts_all_four_forms() {
        let cases = [
            ("A1", Anchor::Relative),
            ("$A1", Anchor::ColAbsolute),
            ("A$1", Anchor::RowAbsolute),
            ("$A$1", Anchor::Absolute),
        ];
        for (text, anchor) in cases {
            let (addr, got) = parse_a1_anchored(text).unwrap();
            assert_eq!(addr, ARef::new(0, 0));
            assert_eq!(got, anchor, "{text}");
        }
        assert!(parse_a1_anchored("A0").is_none());
        assert!(parse_a1_anchored("1A").is_none());
        assert!(parse_a1_anchored("A1B").is_none());
    }

    #[test]
    fn range_normalizes_and_enumerates_row_major() {
        let range = CellRange::new(ARef::new(1, 1), ARef::new(0, 0));
        assert_eq!(range.top_left(), ARef::new(0, 0));
        assert_eq!((range.width(), range.height()), (2, 2));
        let cells: Vec<String> = range.cells().map(|a| a.to_a1()).collect();
        assert_eq!(cells, ["A1", "B1", "A2", "B2"]);
    }
}

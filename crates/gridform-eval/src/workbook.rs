//! In-memory sheet and workbook containers.
//!
//! The engine treats storage as a collaborator: all it needs is keyed cell
//! lookup per sheet and name-keyed sheet lookup per workbook, plus `put`
//! for the cache write-back pass. Sheet names compare case-insensitively.

use gridform_common::{ARef, CellValue, parse_a1_anchored};
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Default)]
pub struct Sheet {
    cells: FxHashMap<ARef, CellValue>,
}

impl Sheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, addr: ARef) -> Option<&CellValue> {
        self.cells.get(&addr)
    }

    pub fn put(&mut self, addr: ARef, value: CellValue) {
        if value.is_empty() {
            self.cells.remove(&addr);
        } else {
            self.cells.insert(addr, value);
        }
    }

    pub fn cells(&self) -> impl Iterator<Item = (ARef, &CellValue)> {
        self.cells.iter().map(|(a, v)| (*a, v))
    }

    /// The formula-bearing cells: `(address, source, cached)`.
    pub fn formulas(&self) -> impl Iterator<Item = (ARef, &str, Option<&CellValue>)> {
        self.cells.iter().filter_map(|(addr, cell)| match cell {
            CellValue::Formula { src, cached } => {
                Some((*addr, src.as_str(), cached.as_deref()))
            }
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Workbook {
    sheets: Vec<(String, Sheet)>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sheet<S: Into<String>>(&mut self, name: S) -> &mut Sheet {
        let name = name.into();
        if let Some(idx) = self.sheet_index(&name) {
            return &mut self.sheets[idx].1;
        }
        self.sheets.push((name, Sheet::new()));
        &mut self.sheets.last_mut().expect("just pushed").1
    }

    fn sheet_index(&self, name: &str) -> Option<usize> {
        self.sheets
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    pub fn sheet_by_name(&self, name: &str) -> Option<&Sheet> {
        self.sheet_index(name).map(|i| &self.sheets[i].1)
    }

    pub fn sheet_by_name_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheet_index(name).map(|i| &mut self.sheets[i].1)
    }

    pub fn replace_sheet(&mut self, name: &str, sheet: Sheet) {
        match self.sheet_index(name) {
            Some(i) => self.sheets[i].1 = sheet,
            None => self.sheets.push((name.to_string(), sheet)),
        }
    }

    pub fn sheet_names(&self) -> impl Iterator<Item = &str> {
        self.sheets.iter().map(|(n, _)| n.as_str())
    }

    /* builder-style helpers, mostly for tests and examples */

    pub fn with_sheet<S: Into<String>>(mut self, name: S) -> Self {
        self.add_sheet(name);
        self
    }

    pub fn with_cell<S: Into<String>>(mut self, sheet: S, a1: &str, value: CellValue) -> Self {
        self.set_a1(sheet, a1, value);
        self
    }

    pub fn set_a1<S: Into<String>>(&mut self, sheet: S, a1: &str, value: CellValue) {
        let (addr, _) = parse_a1_anchored(a1).expect("valid A1 address");
        self.add_sheet(sheet).put(addr, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sheet_names_are_case_insensitive() {
        let wb = Workbook::new().with_cell("Data", "A1", CellValue::Number(1.0));
        assert!(wb.sheet_by_name("data").is_some());
        assert!(wb.sheet_by_name("DATA").is_some());
        assert!(wb.sheet_by_name("Other").is_none());
        assert_eq!(wb.sheet_names().collect::<Vec<_>>(), vec!["Data"]);
    }

    #[test]
    fn putting_empty_clears_the_cell() {
        let mut sheet = Sheet::new();
        let addr = ARef::new(0, 0);
        sheet.put(addr, CellValue::Number(1.0));
        assert_eq!(sheet.len(), 1);
        sheet.put(addr, CellValue::Empty);
        assert!(sheet.get(addr).is_none());
    }

    #[test]
    fn formulas_iterator_yields_only_formula_cells() {
        let mut sheet = Sheet::new();
        sheet.put(ARef::new(0, 0), CellValue::Number(1.0));
        sheet.put(
            ARef::new(1, 0),
            CellValue::formula("=A1+1", Some(CellValue::Number(2.0))),
        );
        let formulas: Vec<_> = sheet.formulas().collect();
        assert_eq!(formulas.len(), 1);
        assert_eq!(formulas[0].1, "=A1+1");
    }
}

//! Build-once function registry.
//!
//! Keys are uppercase names, so lookup is case-insensitive. The registry
//! is assembled once (either explicitly or through the shared default
//! instance) and immutable afterwards; `Call` nodes hold the spec itself,
//! so evaluation never touches the map again.

use std::sync::Arc;

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

use gridform_parse::{Expr, Function, FunctionProvider, ParseError, parse_with};

use crate::builtins;

#[derive(Default)]
pub struct FunctionRegistry {
    fns: FxHashMap<String, Arc<dyn Function>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All ~60 builtin specifications.
    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        builtins::register_builtins(&mut reg);
        reg
    }

    pub fn register(&mut self, f: Arc<dyn Function>) {
        self.fns.insert(f.name().to_uppercase(), f);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Function>> {
        self.fns.get(&name.to_uppercase()).cloned()
    }

    pub fn len(&self) -> usize {
        self.fns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fns.is_empty()
    }
}

impl FunctionProvider for FunctionRegistry {
    fn lookup(&self, name: &str) -> Option<Arc<dyn Function>> {
        self.get(name)
    }

    fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.fns.values().map(|f| f.name()).collect();
        names.sort_unstable();
        names
    }
}

static DEFAULT: Lazy<FunctionRegistry> = Lazy::new(FunctionRegistry::with_builtins);

/// The shared builtin registry.
pub fn default_registry() -> &'static FunctionRegistry {
    &DEFAULT
}

/// Parse a formula against the default registry.
pub fn parse_formula(formula: &str) -> Result<Expr, ParseError> {
    parse_with(formula, default_registry())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let reg = default_registry();
        assert!(reg.get("sum").is_some());
        assert!(reg.get("SUM").is_some());
        assert!(reg.get("Sum").is_some());
        assert!(reg.get("NO_SUCH_FN").is_none());
    }

    #[test]
    fn registry_carries_the_full_roster() {
        let reg = default_registry();
        for name in [
            "SUM", "AVERAGE", "VLOOKUP", "XLOOKUP", "MATCH", "INDEX", "PMT", "RATE", "TODAY",
            "NETWORKDAYS", "SUMIFS", "SUBSTITUTE",
        ] {
            assert!(reg.get(name).is_some(), "{name} missing");
        }
        assert!(reg.len() >= 60, "expected >= 60 builtins, got {}", reg.len());
    }

    #[test]
    fn suggestions_come_from_the_registry() {
        let err = parse_formula("=SUMM(A1)").unwrap_err();
        match err.kind {
            gridform_parse::ParseErrorKind::UnknownFunction { suggestions, .. } => {
                assert!(suggestions.contains(&"SUM".to_string()), "{suggestions:?}");
                assert!(suggestions.contains(&"SUMIF".to_string()), "{suggestions:?}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn volatility_is_visible_on_the_tree() {
        assert!(parse_formula("=TODAY()+1").unwrap().contains_volatile());
        assert!(!parse_formula("=SUM(A1:A2)").unwrap().contains_volatile());
    }

    #[test]
    fn equivalent_asts_regardless_of_case() {
        let a = parse_formula("=sum(A1:A2)").unwrap();
        let b = parse_formula("=SUM(A1:A2)").unwrap();
        let c = parse_formula("=Sum(A1:A2)").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
    }
}

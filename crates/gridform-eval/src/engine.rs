//! Whole-sheet recalculation over the dependency graph.
//!
//! Formula cells become graph nodes; an edge `u -> v` means "u depends on
//! v". Strongly-connected components of size > 1 (or self-loops) are
//! cycles: their cells keep whatever cache they had and surface a
//! `CircularRef` issue. Everything else evaluates dependencies-first, and
//! results are written back as the `cached` field of the formula cell in a
//! rebuilt sheet. One failing cell never aborts the pass.

use gridform_common::{ARef, CellValue, Clock, EvalError, XLError};
use gridform_parse::{Expr, FunctionProvider, RefSite, parse_with};
use rustc_hash::FxHashMap;

use crate::coercion::value_to_cell;
use crate::interpreter::Interpreter;
use crate::workbook::{Sheet, Workbook};

/// A per-cell problem found during recalculation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellIssue {
    pub addr: ARef,
    pub error: XLError,
}

#[derive(Debug)]
pub struct RecalcResult {
    /// The rebuilt sheet with refreshed caches.
    pub sheet: Sheet,
    /// Per-cell failures, cycle members included.
    pub issues: Vec<CellIssue>,
}

pub fn recalculate_sheet(
    workbook: &Workbook,
    sheet_name: &str,
    clock: &dyn Clock,
    provider: &dyn FunctionProvider,
) -> Result<RecalcResult, XLError> {
    let source = workbook
        .sheet_by_name(sheet_name)
        .ok_or_else(|| XLError::new(format!("unknown sheet '{sheet_name}'")))?;

    // Deterministic node order.
    let mut formulas: Vec<(ARef, String)> = source
        .formulas()
        .map(|(addr, src, _)| (addr, src.to_string()))
        .collect();
    formulas.sort_by_key(|(addr, _)| (addr.row, addr.col));

    #[cfg(feature = "tracing")]
    tracing::debug!(sheet = sheet_name, cells = formulas.len(), "recalculate");

    let mut issues = Vec::new();
    let mut new_sheet = source.clone();

    // Parse every formula up front; cells that fail to parse lose their
    // cache and are excluded from the graph.
    let mut parsed: Vec<Option<Expr>> = Vec::with_capacity(formulas.len());
    for (addr, src) in &formulas {
        match parse_with(src, provider) {
            Ok(expr) => parsed.push(Some(expr)),
            Err(err) => {
                issues.push(CellIssue {
                    addr: *addr,
                    error: XLError::from(err).with_formula(src.clone()),
                });
                new_sheet.put(*addr, CellValue::formula(src.clone(), None));
                parsed.push(None);
            }
        }
    }

    let index: FxHashMap<ARef, usize> = formulas
        .iter()
        .enumerate()
        .map(|(i, (addr, _))| (*addr, i))
        .collect();

    // adjacency[i] = indices this formula depends on (same-sheet only; a
    // per-sheet pass treats cross-sheet references as leaves).
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); formulas.len()];
    for (i, expr) in parsed.iter().enumerate() {
        let Some(expr) = expr else { continue };
        let deps = &mut adjacency[i];
        expr.visit_refs(|site| match site {
            RefSite::Cell(cell) => {
                let local = cell
                    .sheet
                    .as_deref()
                    .is_none_or(|s| s.eq_ignore_ascii_case(sheet_name));
                if local {
                    if let Some(&j) = index.get(&cell.addr) {
                        deps.push(j);
                    }
                }
            }
            RefSite::Range(range) => {
                let local = range
                    .sheet
                    .as_deref()
                    .is_none_or(|s| s.eq_ignore_ascii_case(sheet_name));
                if local {
                    for (addr, &j) in &index {
                        if range.range.contains(*addr) {
                            deps.push(j);
                        }
                    }
                }
            }
        });
        deps.sort_unstable();
        deps.dedup();
    }

    // Dependencies-first component order.
    let components = tarjan_scc(&adjacency);

    let mut scratch = workbook.clone();
    for component in components {
        let cyclic =
            component.len() > 1 || component.iter().any(|&v| adjacency[v].contains(&v));
        if cyclic {
            let mut cycle: Vec<ARef> = component.iter().map(|&v| formulas[v].0).collect();
            cycle.sort_by_key(|a| (a.row, a.col));
            if let Some(first) = cycle.first().copied() {
                cycle.push(first);
            }
            // Cycle members keep their stale cache untouched.
            for &v in &component {
                issues.push(CellIssue {
                    addr: formulas[v].0,
                    error: XLError::from(EvalError::CircularRef(cycle.clone()))
                        .with_formula(formulas[v].1.clone()),
                });
            }
            continue;
        }

        let v = component[0];
        let Some(expr) = &parsed[v] else { continue };
        let (addr, src) = &formulas[v];

        let outcome = {
            let interp = Interpreter::new(&scratch, sheet_name, clock);
            interp.evaluate(expr)
        };
        let cell = match outcome {
            Ok(value) => CellValue::formula(src.clone(), Some(value_to_cell(value))),
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(cell = %addr.to_a1(), error = %err, "cell failed");
                issues.push(CellIssue {
                    addr: *addr,
                    error: XLError::from(err).with_formula(src.clone()),
                });
                CellValue::formula(src.clone(), None)
            }
        };
        new_sheet.put(*addr, cell.clone());
        if let Some(sheet) = scratch.sheet_by_name_mut(sheet_name) {
            sheet.put(*addr, cell);
        }
    }

    Ok(RecalcResult {
        sheet: new_sheet,
        issues,
    })
}

/// Iterative Tarjan. Components come out dependencies-first: for an edge
/// `u -> v` across components, v's component is emitted before u's.
fn tarjan_scc(adjacency: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let n = adjacency.len();
    const UNSET: usize = usize::MAX;

    let mut index = vec![UNSET; n];
    let mut low = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut next_index = 0usize;
    let mut components = Vec::new();
    let mut frames: Vec<(usize, usize)> = Vec::new();

    for root in 0..n {
        if index[root] != UNSET {
            continue;
        }
        index[root] = next_index;
        low[root] = next_index;
        next_index += 1;
        stack.push(root);
        on_stack[root] = true;
        frames.push((root, 0));

        while let Some(frame) = frames.last_mut() {
            let v = frame.0;
            if frame.1 < adjacency[v].len() {
                let w = adjacency[v][frame.1];
                frame.1 += 1;
                if index[w] == UNSET {
                    index[w] = next_index;
                    low[w] = next_index;
                    next_index += 1;
                    stack.push(w);
                    on_stack[w] = true;
                    frames.push((w, 0));
                } else if on_stack[w] {
                    low[v] = low[v].min(index[w]);
                }
            } else {
                frames.pop();
                if let Some(parent) = frames.last() {
                    let p = parent.0;
                    low[p] = low[p].min(low[v]);
                }
                if low[v] == index[v] {
                    let mut component = Vec::new();
                    loop {
                        let w = stack.pop().expect("tarjan stack underflow");
                        on_stack[w] = false;
                        component.push(w);
                        if w == v {
                            break;
                        }
                    }
                    components.push(component);
                }
            }
        }
    }

    components
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tarjan_orders_dependencies_first() {
        // 0 -> 1 -> 2 (0 depends on 1 depends on 2)
        let adj = vec![vec![1], vec![2], vec![]];
        let sccs = tarjan_scc(&adj);
        assert_eq!(sccs, vec![vec![2], vec![1], vec![0]]);
    }

    #[test]
    fn tarjan_groups_cycles() {
        // 0 <-> 1, 2 depends on both
        let adj = vec![vec![1], vec![0], vec![0, 1]];
        let sccs = tarjan_scc(&adj);
        assert_eq!(sccs.len(), 2);
        let mut cycle = sccs[0].clone();
        cycle.sort_unstable();
        assert_eq!(cycle, vec![0, 1]);
        assert_eq!(sccs[1], vec![2]);
    }

    #[test]
    fn tarjan_flags_self_loops_via_adjacency() {
        let adj = vec![vec![0]];
        let sccs = tarjan_scc(&adj);
        assert_eq!(sccs, vec![vec![0]]);
        assert!(adj[0].contains(&0));
    }
}

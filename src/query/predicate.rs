//! Boolean predicate trees
//!
//! Field-equality tests combined with conjunction and disjunction, plus
//! boolean constants. Trees are immutable once built and safe to share
//! across concurrent queries; [`Predicate::optimize`] is a pure, idempotent
//! normalization pass run before evaluation.

use serde::{Deserialize, Serialize};

use crate::data::Value;

/// A boolean expression over one table's fields.
///
/// Evaluation lowers the tree to bitset algebra against the table's
/// secondary indexes (see [`crate::Table::evaluate`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    /// Always true / always false.
    Const(bool),
    /// The field at `field` equals `value`.
    Eq { field: usize, value: Value },
    /// Every child matches.
    And(Vec<Predicate>),
    /// At least one child matches.
    Or(Vec<Predicate>),
}

impl Predicate {
    pub fn constant(value: bool) -> Predicate {
        Predicate::Const(value)
    }

    pub fn eq(field: usize, value: impl Into<Value>) -> Predicate {
        Predicate::Eq {
            field,
            value: value.into(),
        }
    }

    pub fn and(children: Vec<Predicate>) -> Predicate {
        Predicate::And(children)
    }

    pub fn or(children: Vec<Predicate>) -> Predicate {
        Predicate::Or(children)
    }

    /// Normalize the tree: splice nested same-kind children into their
    /// parent, drop identity constants, collapse on annihilators, unwrap
    /// singletons. Purely syntactic; no index-cost reordering. Idempotent,
    /// safe to call zero or many times before evaluation.
    pub fn optimize(&self) -> Predicate {
        match self {
            Predicate::Const(_) | Predicate::Eq { .. } => self.clone(),
            Predicate::And(children) => {
                let mut flat = Vec::with_capacity(children.len());
                flatten_and(children, &mut flat);
                let mut kept = Vec::with_capacity(flat.len());
                for child in flat {
                    match child {
                        Predicate::Const(false) => return Predicate::Const(false),
                        Predicate::Const(true) => {}
                        other => kept.push(other),
                    }
                }
                match kept.len() {
                    0 => Predicate::Const(true),
                    1 => kept.remove(0),
                    _ => Predicate::And(kept),
                }
            }
            Predicate::Or(children) => {
                let mut flat = Vec::with_capacity(children.len());
                flatten_or(children, &mut flat);
                let mut kept = Vec::with_capacity(flat.len());
                for child in flat {
                    match child {
                        Predicate::Const(true) => return Predicate::Const(true),
                        Predicate::Const(false) => {}
                        other => kept.push(other),
                    }
                }
                match kept.len() {
                    0 => Predicate::Const(false),
                    1 => kept.remove(0),
                    _ => Predicate::Or(kept),
                }
            }
        }
    }
}

/// Splice nested `And` children in before simplification, so
/// `And(And(a, b), c)` normalizes identically to `And(a, b, c)`.
fn flatten_and(children: &[Predicate], out: &mut Vec<Predicate>) {
    for child in children {
        match child {
            Predicate::And(nested) => flatten_and(nested, out),
            other => out.push(other.optimize()),
        }
    }
}

fn flatten_or(children: &[Predicate], out: &mut Vec<Predicate>) {
    for child in children {
        match child {
            Predicate::Or(nested) => flatten_or(nested, out),
            other => out.push(other.optimize()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lcg(state: &mut u64) -> u64 {
        *state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        *state >> 33
    }

    fn gen_tree(state: &mut u64, depth: u32) -> Predicate {
        match lcg(state) % if depth == 0 { 3 } else { 5 } {
            0 => Predicate::constant(lcg(state) % 2 == 0),
            1 => Predicate::eq((lcg(state) % 4) as usize, lcg(state) as i64),
            2 => Predicate::eq((lcg(state) % 4) as usize, format!("v{}", lcg(state) % 8)),
            3 => {
                let n = lcg(state) % 4;
                Predicate::and((0..n).map(|_| gen_tree(state, depth - 1)).collect())
            }
            _ => {
                let n = lcg(state) % 4;
                Predicate::or((0..n).map(|_| gen_tree(state, depth - 1)).collect())
            }
        }
    }

    #[test]
    fn test_empty_combinators() {
        assert_eq!(Predicate::and(vec![]).optimize(), Predicate::Const(true));
        assert_eq!(Predicate::or(vec![]).optimize(), Predicate::Const(false));
    }

    #[test]
    fn test_annihilators() {
        let p = Predicate::and(vec![Predicate::eq(0, "x"), Predicate::constant(false)]);
        assert_eq!(p.optimize(), Predicate::Const(false));

        let p = Predicate::or(vec![Predicate::eq(0, "x"), Predicate::constant(true)]);
        assert_eq!(p.optimize(), Predicate::Const(true));
    }

    #[test]
    fn test_identity_constants_dropped() {
        let p = Predicate::and(vec![
            Predicate::constant(true),
            Predicate::eq(1, 5i64),
            Predicate::constant(true),
        ]);
        assert_eq!(p.optimize(), Predicate::eq(1, 5i64));

        let p = Predicate::or(vec![Predicate::constant(false), Predicate::eq(2, 7i64)]);
        assert_eq!(p.optimize(), Predicate::eq(2, 7i64));
    }

    #[test]
    fn test_flattening() {
        let nested = Predicate::and(vec![
            Predicate::and(vec![Predicate::eq(0, "a"), Predicate::eq(1, "b")]),
            Predicate::eq(2, "c"),
        ]);
        let flat = Predicate::and(vec![
            Predicate::eq(0, "a"),
            Predicate::eq(1, "b"),
            Predicate::eq(2, "c"),
        ]);
        assert_eq!(nested.optimize(), flat.optimize());
        assert_eq!(
            nested.optimize(),
            Predicate::And(vec![
                Predicate::eq(0, "a"),
                Predicate::eq(1, "b"),
                Predicate::eq(2, "c"),
            ])
        );
    }

    #[test]
    fn test_deep_collapse() {
        // an annihilator buried in nested structure collapses the root
        let p = Predicate::and(vec![
            Predicate::eq(0, "a"),
            Predicate::and(vec![
                Predicate::eq(1, "b"),
                Predicate::and(vec![Predicate::constant(false)]),
            ]),
        ]);
        assert_eq!(p.optimize(), Predicate::Const(false));
    }

    #[test]
    fn test_mixed_kinds_not_flattened() {
        let p = Predicate::and(vec![
            Predicate::or(vec![Predicate::eq(0, "a"), Predicate::eq(0, "b")]),
            Predicate::eq(1, "c"),
        ]);
        match p.optimize() {
            Predicate::And(children) => {
                assert_eq!(children.len(), 2);
                assert!(matches!(children[0], Predicate::Or(_)));
            }
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn test_optimize_idempotent() {
        let mut state = 0xb17_7ab;
        for _ in 0..200 {
            let tree = gen_tree(&mut state, 4);
            let once = tree.optimize();
            assert_eq!(once.optimize(), once, "not idempotent for {tree:?}");
        }
    }
}

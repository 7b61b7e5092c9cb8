//! Query predicate model
//!
//! Predicates are built by callers, optionally normalized with
//! [`Predicate::optimize`], and lowered to bitset algebra by
//! [`crate::Table::evaluate`].

mod predicate;

pub use predicate::Predicate;

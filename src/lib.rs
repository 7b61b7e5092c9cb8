//! bittab: embeddable in-memory columnar table store
//!
//! Rows are decomposed into per-column typed arrays, and equality queries
//! are accelerated by per-column bitmap indexes combined through a boolean
//! predicate evaluator.
//!
//! The moving parts:
//! - [`data`]: the tagged [`Value`] carrier, permissive coercion, and the
//!   typed column arrays.
//! - [`index`]: secondary indexes mapping a column value to the bitset of
//!   row ids holding it, including the space-bounded [`SketchIndex`].
//! - [`query`]: the [`Predicate`] tree with its normalization pass.
//! - [`table`]: the [`Table`] engine tying columns, indexes, and the
//!   row-existence/tombstone bitsets together under concurrent access.

pub mod data;
pub mod index;
pub mod query;
pub mod table;

// Re-export main types
pub use data::{ColumnData, DataType, Value};
pub use index::{ColumnIndex, IndexKind, SketchIndex};
pub use query::Predicate;
pub use table::{ColumnDef, Schema, Table};

/// Row identifier: a dense slot number shared by every column of a table.
///
/// Ids are recycled after deletion (smallest free id first), so they stay
/// dense. The bitset domain bounds a table to `u32::MAX` slots.
pub type RowId = u32;

/// Storage engine error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cannot coerce {from} value into {to}")]
    Coerce { from: &'static str, to: &'static str },

    #[error("row {0} is out of range")]
    RowOutOfRange(RowId),

    #[error("row {0} is not live")]
    RowNotLive(RowId),

    #[error("column not found: {0}")]
    ColumnNotFound(String),

    #[error("field index {0} out of range")]
    FieldOutOfRange(usize),

    #[error("expected {expected} values, got {got}")]
    ValueCount { expected: usize, got: usize },

    #[error("duplicate column name: {0}")]
    DuplicateColumn(String),

    #[error("{kind:?} index cannot serve {data_type:?} column '{column}'")]
    IndexMismatch {
        column: String,
        data_type: DataType,
        kind: IndexKind,
    },

    #[error("boolean index requires bitmap-backed boolean column storage")]
    BoolIndexStorage,
}

pub type Result<T> = std::result::Result<T, Error>;

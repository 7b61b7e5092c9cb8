//! Secondary index subsystem
//!
//! One index per declared field, answering "which rows hold value V?"
//! without scanning column storage. Lookups return independent bitset
//! clones; nothing crossing this boundary aliases index internals.
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                ColumnIndex                  │
//! │   closed dispatch, fixed at schema time     │
//! ├──────────┬──────────────┬───────────────────┤
//! │ NullIndex│  BoolIndex   │   SketchIndex     │
//! │ pass-    │  false-set   │   1024 buckets,   │
//! │ through  │  only        │   6 probes/key    │
//! └──────────┴──────────────┴───────────────────┘
//! ```

pub mod sketch;

pub use sketch::{KeyCodec, SketchIndex, BUCKETS, PROBES};

use parking_lot::RwLock;
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};

use crate::data::{ColumnData, DataType, Value};
use crate::{Error, Result, RowId};

/// Which secondary index a column carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexKind {
    /// No discrimination; lookups fall back to the caller's default set.
    None,
    /// Boolean columns: the column's own true-set plus a tracked false-set.
    Bool,
    /// Approximate bucket index for 64-bit-keyed types.
    Sketch,
}

impl IndexKind {
    /// The natural index for a data type: `Bool` for booleans, `Sketch`
    /// for everything with a 64-bit key form, `None` for generic storage.
    pub fn default_for(dtype: DataType) -> IndexKind {
        match dtype {
            DataType::Bool => IndexKind::Bool,
            DataType::Generic => IndexKind::None,
            _ => IndexKind::Sketch,
        }
    }
}

/// Pass-through index for unindexed or low-selectivity columns.
///
/// Zero memory, O(1) everywhere; lookups only narrow via the default set
/// (typically the table's existence set).
#[derive(Debug, Default)]
pub struct NullIndex;

/// Index for boolean columns.
///
/// The column's bitmap storage already holds the true-set, so only the
/// false-set is tracked here; this halves index memory for the type.
#[derive(Debug, Default)]
pub struct BoolIndex {
    zeros: RwLock<RoaringBitmap>,
}

impl BoolIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn set(&self, rid: RowId, value: &Value) -> Result<()> {
        let v = value.to_bool()?;
        let mut zeros = self.zeros.write();
        if v {
            zeros.remove(rid);
        } else {
            zeros.insert(rid);
        }
        Ok(())
    }

    fn clear(&self, rid: RowId) {
        self.zeros.write().remove(rid);
    }

    fn lookup(
        &self,
        column: &ColumnData,
        value: &Value,
        default: &RoaringBitmap,
    ) -> Result<RoaringBitmap> {
        if value.to_bool()? {
            // the column keeps stale bits for tombstoned slots; the default
            // set (the caller's existence set) masks them out
            match column {
                ColumnData::Bool(arr) => Ok(arr.true_set() & default),
                _ => Err(Error::BoolIndexStorage),
            }
        } else {
            Ok(self.zeros.read().clone())
        }
    }

    fn compact(&self) {
        self.zeros.write().optimize();
    }
}

/// Runtime index instance for one column.
#[derive(Debug)]
pub enum ColumnIndex {
    None(NullIndex),
    Bool(BoolIndex),
    Sketch(SketchIndex),
}

impl ColumnIndex {
    /// Build the index declared for a column; the index/type pairing is
    /// validated here, at schema definition time.
    pub fn for_column(name: &str, dtype: DataType, kind: IndexKind) -> Result<ColumnIndex> {
        let mismatch = || Error::IndexMismatch {
            column: name.to_string(),
            data_type: dtype,
            kind,
        };
        match kind {
            IndexKind::None => Ok(ColumnIndex::None(NullIndex)),
            IndexKind::Bool => {
                if dtype == DataType::Bool {
                    Ok(ColumnIndex::Bool(BoolIndex::new()))
                } else {
                    Err(mismatch())
                }
            }
            IndexKind::Sketch => KeyCodec::for_type(dtype)
                .map(|codec| ColumnIndex::Sketch(SketchIndex::new(codec)))
                .ok_or_else(mismatch),
        }
    }

    pub fn kind(&self) -> IndexKind {
        match self {
            ColumnIndex::None(_) => IndexKind::None,
            ColumnIndex::Bool(_) => IndexKind::Bool,
            ColumnIndex::Sketch(_) => IndexKind::Sketch,
        }
    }

    /// Record that `rid` now holds `value`.
    pub fn set(&self, rid: RowId, value: &Value) -> Result<()> {
        match self {
            ColumnIndex::None(_) => Ok(()),
            ColumnIndex::Bool(ix) => ix.set(rid, value),
            ColumnIndex::Sketch(ix) => ix.set(rid, value),
        }
    }

    /// Remove all associations for a deleted row.
    pub fn clear(&self, rid: RowId) {
        match self {
            ColumnIndex::None(_) => {}
            ColumnIndex::Bool(ix) => ix.clear(rid),
            ColumnIndex::Sketch(ix) => ix.clear(rid),
        }
    }

    /// The bitset of rows equal to `value`, or a clone of `default` when
    /// this index does not discriminate.
    pub fn lookup(
        &self,
        column: &ColumnData,
        value: &Value,
        default: &RoaringBitmap,
    ) -> Result<RoaringBitmap> {
        match self {
            ColumnIndex::None(_) => Ok(default.clone()),
            ColumnIndex::Bool(ix) => ix.lookup(column, value, default),
            ColumnIndex::Sketch(ix) => ix.lookup(value),
        }
    }

    /// Reorganize internal bitsets; lookup results are unchanged.
    pub fn compact(&self) {
        match self {
            ColumnIndex::None(_) => {}
            ColumnIndex::Bool(ix) => ix.compact(),
            ColumnIndex::Sketch(ix) => ix.compact(),
        }
    }
}

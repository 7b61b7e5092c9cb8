//! Columnar table engine
//!
//! Owns the row-existence and free/tombstone bitsets, one typed array and
//! one secondary index per column, and the per-column dirty flags, and
//! keeps them mutually consistent under concurrent readers and writers.
//!
//! Locking is two-tier: a structural read/write lock guards the logical
//! shape of the table (insert and delete hold it exclusively, everything
//! else shared), and a meta mutex guards the existence/tombstone pair and
//! the length counter for the brief critical sections that mutate them.
//! Each column array and index additionally carries its own lock, so
//! writes to different columns never contend.

use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, trace};
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use roaring::RoaringBitmap;

use super::Schema;
use crate::data::{ColumnData, Value};
use crate::index::ColumnIndex;
use crate::query::Predicate;
use crate::{Error, Result, RowId};

/// Row-existence and tombstone state.
///
/// `exist` and `free` are disjoint by construction: a row id is a member
/// of at most one of the two at any observable point.
struct RowSets {
    /// High-water mark; every column array has exactly this many slots.
    length: RowId,
    /// Rows currently holding live data.
    exist: RoaringBitmap,
    /// Previously used, now-deleted rows eligible for reuse.
    free: RoaringBitmap,
}

/// An in-memory columnar table with per-column secondary indexes.
///
/// All operations take `&self`; the table is shared across threads behind
/// an `Arc` without external locking.
pub struct Table {
    schema: Schema,
    /// Structural lock over the table's shape (length, free/exist split).
    shape: RwLock<()>,
    /// Meta lock over the row bitsets and length counter.
    rows: Mutex<RowSets>,
    columns: Vec<ColumnData>,
    indexes: Vec<ColumnIndex>,
    dirty: Vec<AtomicBool>,
}

impl Table {
    /// Create an empty table for `schema`; index/type pairings are
    /// validated here.
    pub fn new(schema: Schema) -> Result<Table> {
        let mut columns = Vec::with_capacity(schema.width());
        let mut indexes = Vec::with_capacity(schema.width());
        for def in schema.defs() {
            columns.push(ColumnData::new(def.data_type));
            indexes.push(ColumnIndex::for_column(&def.name, def.data_type, def.index)?);
        }
        let dirty = (0..schema.width()).map(|_| AtomicBool::new(false)).collect();
        Ok(Table {
            schema,
            shape: RwLock::new(()),
            rows: Mutex::new(RowSets {
                length: 0,
                exist: RoaringBitmap::new(),
                free: RoaringBitmap::new(),
            }),
            columns,
            indexes,
            dirty,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Number of live rows
    pub fn row_count(&self) -> u64 {
        self.rows.lock().exist.len()
    }

    /// High-water mark: slots allocated across every column, live or not
    pub fn len(&self) -> usize {
        self.rows.lock().length as usize
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    /// Whether `rid` currently holds live data
    pub fn contains(&self, rid: RowId) -> bool {
        self.rows.lock().exist.contains(rid)
    }

    /// Clone of the row-existence set
    pub fn live_rows(&self) -> RoaringBitmap {
        self.rows.lock().exist.clone()
    }

    /// Clone of the free/tombstone set
    pub fn free_rows(&self) -> RoaringBitmap {
        self.rows.lock().free.clone()
    }

    /// Insert a full row (one value per column, in schema order) and
    /// return its id.
    ///
    /// The smallest tombstoned id is reused when one exists; otherwise the
    /// table grows by one slot. Every value's coercibility is checked
    /// before any column is touched, so a bad value surfaces as an error
    /// with nothing written.
    pub fn insert(&self, values: &[Value]) -> Result<RowId> {
        if values.len() != self.schema.width() {
            return Err(Error::ValueCount {
                expected: self.schema.width(),
                got: values.len(),
            });
        }
        for (def, value) in self.schema.defs().iter().zip(values) {
            value.check(def.data_type)?;
        }

        let _shape = self.shape.write();
        let (rid, append) = {
            let mut rows = self.rows.lock();
            match rows.free.min() {
                Some(min) => {
                    rows.free.remove(min);
                    (min, false)
                }
                None => {
                    let rid = rows.length;
                    rows.length += 1;
                    (rid, true)
                }
            }
        };

        let written = self.write_row(rid, append, values);
        let mut rows = self.rows.lock();
        match written {
            Ok(()) => {
                rows.exist.insert(rid);
                trace!("inserted row {rid}");
                Ok(rid)
            }
            Err(e) => {
                // hand the slot back rather than leaking the id
                rows.free.insert(rid);
                Err(e)
            }
        }
    }

    fn write_row(&self, rid: RowId, append: bool, values: &[Value]) -> Result<()> {
        for (i, value) in values.iter().enumerate() {
            if append {
                self.columns[i].push(value)?;
            } else {
                self.columns[i].set(rid, value)?;
            }
            self.indexes[i].set(rid, value)?;
            self.dirty[i].store(true, Ordering::Release);
        }
        Ok(())
    }

    /// Delete a live row: its id moves to the tombstone set and every
    /// index drops its associations. Column values stay in place until the
    /// slot is reused.
    pub fn delete(&self, rid: RowId) -> Result<()> {
        let _shape = self.shape.write();
        {
            let mut rows = self.rows.lock();
            if rid >= rows.length {
                return Err(Error::RowOutOfRange(rid));
            }
            if !rows.exist.remove(rid) {
                return Err(Error::RowNotLive(rid));
            }
            rows.free.insert(rid);
        }
        for index in &self.indexes {
            index.clear(rid);
        }
        trace!("deleted row {rid}");
        Ok(())
    }

    /// Write through a subset of fields on a live row. Field indices and
    /// coercibility are validated before any column is touched; unnamed
    /// fields are untouched.
    pub fn update(&self, rid: RowId, fields: &[usize], values: &[Value]) -> Result<()> {
        if fields.len() != values.len() {
            return Err(Error::ValueCount {
                expected: fields.len(),
                got: values.len(),
            });
        }
        let _shape = self.shape.read();
        self.check_live(rid)?;
        for (&field, value) in fields.iter().zip(values) {
            let def = self.schema.def(field)?;
            value.check(def.data_type)?;
        }
        for (&field, value) in fields.iter().zip(values) {
            self.columns[field].set(rid, value)?;
            self.indexes[field].set(rid, value)?;
            self.dirty[field].store(true, Ordering::Release);
        }
        Ok(())
    }

    /// Read a subset of fields straight from column storage; indices are
    /// never consulted.
    pub fn read(&self, rid: RowId, fields: &[usize]) -> Result<Vec<Value>> {
        let _shape = self.shape.read();
        self.check_live(rid)?;
        fields
            .iter()
            .map(|&field| {
                self.schema.def(field)?;
                self.columns[field].get(rid)
            })
            .collect()
    }

    /// Read every field of a live row, in schema order.
    pub fn read_row(&self, rid: RowId) -> Result<Vec<Value>> {
        let _shape = self.shape.read();
        self.check_live(rid)?;
        self.columns.iter().map(|column| column.get(rid)).collect()
    }

    fn check_live(&self, rid: RowId) -> Result<()> {
        let rows = self.rows.lock();
        if rid >= rows.length {
            Err(Error::RowOutOfRange(rid))
        } else if !rows.exist.contains(rid) {
            Err(Error::RowNotLive(rid))
        } else {
            Ok(())
        }
    }

    /// Lower a predicate tree to the bitset of matching row ids.
    ///
    /// `Eq` leaves resolve through the column's secondary index with the
    /// existence set as the default, so results never include tombstoned
    /// ids. Sketch-indexed leaves are superset-producing (see
    /// [`crate::SketchIndex`]); callers needing exactness re-check the
    /// candidates via [`Table::read`]. The result is always a fresh
    /// bitset, safe to retain or mutate.
    pub fn evaluate(&self, predicate: &Predicate) -> Result<RoaringBitmap> {
        let _shape = self.shape.read();
        let live = self.rows.lock().exist.clone();
        self.eval(predicate, &live)
    }

    fn eval(&self, predicate: &Predicate, live: &RoaringBitmap) -> Result<RoaringBitmap> {
        match predicate {
            Predicate::Const(true) => Ok(live.clone()),
            Predicate::Const(false) => Ok(RoaringBitmap::new()),
            Predicate::Eq { field, value } => {
                let index = self
                    .indexes
                    .get(*field)
                    .ok_or(Error::FieldOutOfRange(*field))?;
                index.lookup(&self.columns[*field], value, live)
            }
            Predicate::And(children) => {
                let results = self.eval_children(children, live)?;
                Ok(results
                    .into_par_iter()
                    .reduce_with(|a, b| a & b)
                    .unwrap_or_else(|| live.clone()))
            }
            Predicate::Or(children) => {
                let results = self.eval_children(children, live)?;
                Ok(results
                    .into_par_iter()
                    .reduce_with(|a, b| a | b)
                    .unwrap_or_else(RoaringBitmap::new))
            }
        }
    }

    fn eval_children(
        &self,
        children: &[Predicate],
        live: &RoaringBitmap,
    ) -> Result<Vec<RoaringBitmap>> {
        children
            .par_iter()
            .map(|child| self.eval(child, live))
            .collect()
    }

    /// Run-length compress the row bitsets, then every index and column in
    /// parallel. Maintenance only; lookup results are unchanged.
    pub fn compact(&self) {
        let _shape = self.shape.read();
        {
            let mut rows = self.rows.lock();
            let RowSets { exist, free, .. } = &mut *rows;
            exist.optimize();
            free.optimize();
        }
        rayon::join(
            || self.indexes.par_iter().for_each(|index| index.compact()),
            || self.columns.par_iter().for_each(|column| column.compact()),
        );
        debug!(
            "compacted table: {} live rows across {} columns",
            self.row_count(),
            self.schema.width()
        );
    }

    /// Whether a column changed since its flag was last cleared. Advisory,
    /// for outer change-tracking layers; the engine sets flags on every
    /// write and never clears them itself.
    pub fn is_dirty(&self, field: usize) -> Result<bool> {
        self.dirty
            .get(field)
            .map(|flag| flag.load(Ordering::Acquire))
            .ok_or(Error::FieldOutOfRange(field))
    }

    /// Clear a column's change flag (outer layers only).
    pub fn clear_dirty(&self, field: usize) -> Result<()> {
        self.dirty
            .get(field)
            .map(|flag| flag.store(false, Ordering::Release))
            .ok_or(Error::FieldOutOfRange(field))
    }
}

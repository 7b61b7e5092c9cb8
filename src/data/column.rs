//! Typed column arrays
//!
//! One array per declared field, holding one slot per row id. Length is the
//! table's high-water mark: tombstoned slots keep their stale value until
//! the id is reused. Each array carries its own read/write lock, so writes
//! to different columns never contend.

use parking_lot::RwLock;
use roaring::RoaringBitmap;

use super::{DataType, Value};
use crate::{Error, Result, RowId};

/// Bitmap-backed boolean column.
///
/// Stores only the set of rows holding `true`; everything below the length
/// high-water mark that is not a member reads as `false`. The boolean
/// secondary index reuses the true-set directly.
#[derive(Debug, Default)]
pub struct BoolArray {
    inner: RwLock<BoolBits>,
}

#[derive(Debug, Default)]
struct BoolBits {
    ones: RoaringBitmap,
    len: RowId,
}

impl BoolArray {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clone of the set of rows currently holding `true`.
    pub fn true_set(&self) -> RoaringBitmap {
        self.inner.read().ones.clone()
    }

    fn get(&self, rid: RowId) -> Result<Value> {
        let bits = self.inner.read();
        if rid >= bits.len {
            return Err(Error::RowOutOfRange(rid));
        }
        Ok(Value::Bool(bits.ones.contains(rid)))
    }

    fn set(&self, rid: RowId, value: &Value) -> Result<()> {
        let v = value.to_bool()?;
        let mut bits = self.inner.write();
        if rid >= bits.len {
            return Err(Error::RowOutOfRange(rid));
        }
        if v {
            bits.ones.insert(rid);
        } else {
            bits.ones.remove(rid);
        }
        Ok(())
    }

    fn push(&self, value: &Value) -> Result<()> {
        let v = value.to_bool()?;
        let mut bits = self.inner.write();
        let rid = bits.len;
        if v {
            bits.ones.insert(rid);
        }
        bits.len += 1;
        Ok(())
    }

    fn compact(&self) {
        self.inner.write().ones.optimize();
    }
}

/// Fetch a mutable slot, failing fast on an out-of-range row id.
fn slot<T>(vec: &mut Vec<T>, rid: RowId) -> Result<&mut T> {
    vec.get_mut(rid as usize).ok_or(Error::RowOutOfRange(rid))
}

/// Typed storage for one column.
///
/// A closed enumeration, one variant per [`DataType`]; the variant is fixed
/// at schema definition time. All accessors coerce through [`Value`] before
/// taking the column's write lock, keeping critical sections short.
#[derive(Debug)]
pub enum ColumnData {
    Bool(BoolArray),
    Int32(RwLock<Vec<i32>>),
    Int64(RwLock<Vec<i64>>),
    UInt32(RwLock<Vec<u32>>),
    UInt64(RwLock<Vec<u64>>),
    Float32(RwLock<Vec<f32>>),
    Float64(RwLock<Vec<f64>>),
    String(RwLock<Vec<String>>),
    Bytes(RwLock<Vec<Vec<u8>>>),
    Timestamp(RwLock<Vec<i64>>),
    Date(RwLock<Vec<i64>>),
    Generic(RwLock<Vec<Value>>),
}

impl ColumnData {
    /// Create empty storage for the given native type.
    pub fn new(dtype: DataType) -> Self {
        match dtype {
            DataType::Bool => ColumnData::Bool(BoolArray::new()),
            DataType::Int32 => ColumnData::Int32(RwLock::new(Vec::new())),
            DataType::Int64 => ColumnData::Int64(RwLock::new(Vec::new())),
            DataType::UInt32 => ColumnData::UInt32(RwLock::new(Vec::new())),
            DataType::UInt64 => ColumnData::UInt64(RwLock::new(Vec::new())),
            DataType::Float32 => ColumnData::Float32(RwLock::new(Vec::new())),
            DataType::Float64 => ColumnData::Float64(RwLock::new(Vec::new())),
            DataType::String => ColumnData::String(RwLock::new(Vec::new())),
            DataType::Bytes => ColumnData::Bytes(RwLock::new(Vec::new())),
            DataType::Timestamp => ColumnData::Timestamp(RwLock::new(Vec::new())),
            DataType::Date => ColumnData::Date(RwLock::new(Vec::new())),
            DataType::Generic => ColumnData::Generic(RwLock::new(Vec::new())),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            ColumnData::Bool(_) => DataType::Bool,
            ColumnData::Int32(_) => DataType::Int32,
            ColumnData::Int64(_) => DataType::Int64,
            ColumnData::UInt32(_) => DataType::UInt32,
            ColumnData::UInt64(_) => DataType::UInt64,
            ColumnData::Float32(_) => DataType::Float32,
            ColumnData::Float64(_) => DataType::Float64,
            ColumnData::String(_) => DataType::String,
            ColumnData::Bytes(_) => DataType::Bytes,
            ColumnData::Timestamp(_) => DataType::Timestamp,
            ColumnData::Date(_) => DataType::Date,
            ColumnData::Generic(_) => DataType::Generic,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnData::Bool(arr) => arr.len(),
            ColumnData::Int32(cell) => cell.read().len(),
            ColumnData::Int64(cell) => cell.read().len(),
            ColumnData::UInt32(cell) => cell.read().len(),
            ColumnData::UInt64(cell) => cell.read().len(),
            ColumnData::Float32(cell) => cell.read().len(),
            ColumnData::Float64(cell) => cell.read().len(),
            ColumnData::String(cell) => cell.read().len(),
            ColumnData::Bytes(cell) => cell.read().len(),
            ColumnData::Timestamp(cell) => cell.read().len(),
            ColumnData::Date(cell) => cell.read().len(),
            ColumnData::Generic(cell) => cell.read().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read the value in a slot. Out-of-range ids fail fast.
    pub fn get(&self, rid: RowId) -> Result<Value> {
        let i = rid as usize;
        match self {
            ColumnData::Bool(arr) => arr.get(rid),
            ColumnData::Int32(cell) => cell
                .read()
                .get(i)
                .map(|v| Value::Int(*v as i64))
                .ok_or(Error::RowOutOfRange(rid)),
            ColumnData::Int64(cell) => cell
                .read()
                .get(i)
                .map(|v| Value::Int(*v))
                .ok_or(Error::RowOutOfRange(rid)),
            ColumnData::UInt32(cell) => cell
                .read()
                .get(i)
                .map(|v| Value::UInt(*v as u64))
                .ok_or(Error::RowOutOfRange(rid)),
            ColumnData::UInt64(cell) => cell
                .read()
                .get(i)
                .map(|v| Value::UInt(*v))
                .ok_or(Error::RowOutOfRange(rid)),
            ColumnData::Float32(cell) => cell
                .read()
                .get(i)
                .map(|v| Value::Float(*v as f64))
                .ok_or(Error::RowOutOfRange(rid)),
            ColumnData::Float64(cell) => cell
                .read()
                .get(i)
                .map(|v| Value::Float(*v))
                .ok_or(Error::RowOutOfRange(rid)),
            ColumnData::String(cell) => cell
                .read()
                .get(i)
                .map(|v| Value::Str(v.clone()))
                .ok_or(Error::RowOutOfRange(rid)),
            ColumnData::Bytes(cell) => cell
                .read()
                .get(i)
                .map(|v| Value::Bytes(v.clone()))
                .ok_or(Error::RowOutOfRange(rid)),
            ColumnData::Timestamp(cell) => cell
                .read()
                .get(i)
                .map(|v| Value::Timestamp(*v))
                .ok_or(Error::RowOutOfRange(rid)),
            ColumnData::Date(cell) => cell
                .read()
                .get(i)
                .map(|v| Value::Date(*v))
                .ok_or(Error::RowOutOfRange(rid)),
            ColumnData::Generic(cell) => cell
                .read()
                .get(i)
                .cloned()
                .ok_or(Error::RowOutOfRange(rid)),
        }
    }

    /// Overwrite a slot, coercing to the native type first.
    pub fn set(&self, rid: RowId, value: &Value) -> Result<()> {
        match self {
            ColumnData::Bool(arr) => arr.set(rid, value),
            ColumnData::Int32(cell) => {
                let v = value.to_i64()? as i32;
                *slot(&mut cell.write(), rid)? = v;
                Ok(())
            }
            ColumnData::Int64(cell) => {
                let v = value.to_i64()?;
                *slot(&mut cell.write(), rid)? = v;
                Ok(())
            }
            ColumnData::UInt32(cell) => {
                let v = value.to_u64()? as u32;
                *slot(&mut cell.write(), rid)? = v;
                Ok(())
            }
            ColumnData::UInt64(cell) => {
                let v = value.to_u64()?;
                *slot(&mut cell.write(), rid)? = v;
                Ok(())
            }
            ColumnData::Float32(cell) => {
                let v = value.to_f32()?;
                *slot(&mut cell.write(), rid)? = v;
                Ok(())
            }
            ColumnData::Float64(cell) => {
                let v = value.to_f64()?;
                *slot(&mut cell.write(), rid)? = v;
                Ok(())
            }
            ColumnData::String(cell) => {
                let v = value.to_text()?;
                *slot(&mut cell.write(), rid)? = v;
                Ok(())
            }
            ColumnData::Bytes(cell) => {
                let v = value.to_byte_vec()?;
                *slot(&mut cell.write(), rid)? = v;
                Ok(())
            }
            ColumnData::Timestamp(cell) => {
                let v = value.to_timestamp()?;
                *slot(&mut cell.write(), rid)? = v;
                Ok(())
            }
            ColumnData::Date(cell) => {
                let v = value.to_date_days()?;
                *slot(&mut cell.write(), rid)? = v;
                Ok(())
            }
            ColumnData::Generic(cell) => {
                *slot(&mut cell.write(), rid)? = value.clone();
                Ok(())
            }
        }
    }

    /// Append a slot, coercing to the native type first.
    pub fn push(&self, value: &Value) -> Result<()> {
        match self {
            ColumnData::Bool(arr) => arr.push(value),
            ColumnData::Int32(cell) => {
                let v = value.to_i64()? as i32;
                cell.write().push(v);
                Ok(())
            }
            ColumnData::Int64(cell) => {
                let v = value.to_i64()?;
                cell.write().push(v);
                Ok(())
            }
            ColumnData::UInt32(cell) => {
                let v = value.to_u64()? as u32;
                cell.write().push(v);
                Ok(())
            }
            ColumnData::UInt64(cell) => {
                let v = value.to_u64()?;
                cell.write().push(v);
                Ok(())
            }
            ColumnData::Float32(cell) => {
                let v = value.to_f32()?;
                cell.write().push(v);
                Ok(())
            }
            ColumnData::Float64(cell) => {
                let v = value.to_f64()?;
                cell.write().push(v);
                Ok(())
            }
            ColumnData::String(cell) => {
                let v = value.to_text()?;
                cell.write().push(v);
                Ok(())
            }
            ColumnData::Bytes(cell) => {
                let v = value.to_byte_vec()?;
                cell.write().push(v);
                Ok(())
            }
            ColumnData::Timestamp(cell) => {
                let v = value.to_timestamp()?;
                cell.write().push(v);
                Ok(())
            }
            ColumnData::Date(cell) => {
                let v = value.to_date_days()?;
                cell.write().push(v);
                Ok(())
            }
            ColumnData::Generic(cell) => {
                cell.write().push(value.clone());
                Ok(())
            }
        }
    }

    /// Reorganize internal storage; only the bitmap-backed variant has
    /// anything to do.
    pub fn compact(&self) {
        if let ColumnData::Bool(arr) = self {
            arr.compact();
        }
    }
}

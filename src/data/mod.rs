//! Value carrier and permissive coercion
//!
//! Every write enters the engine as a [`Value`] and is coerced to the
//! target column's native representation. Coercion is deterministic and
//! total-or-error: a value that cannot be converted surfaces as
//! [`Error::Coerce`], it is never silently defaulted.

mod column;

pub use column::{BoolArray, ColumnData};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Seconds in one calendar day; `Date` columns store whole days since epoch.
pub const SECONDS_PER_DAY: i64 = 60 * 60 * 24;

/// Native storage type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Bool,
    Int32,
    Int64,
    UInt32,
    UInt64,
    Float32,
    Float64,
    String,
    Bytes,
    /// Seconds since the Unix epoch
    Timestamp,
    /// Whole days since the Unix epoch
    Date,
    /// Values stored as-is, no native representation
    Generic,
}

/// A dynamically typed value moving through insert/update/lookup.
///
/// Closed set of variants; every coercion is exhaustive over them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    /// Seconds since the Unix epoch
    Timestamp(i64),
    /// Whole days since the Unix epoch
    Date(i64),
}

impl Value {
    /// Variant name, used in coercion errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::UInt(_) => "uint",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Timestamp(_) => "timestamp",
            Value::Date(_) => "date",
        }
    }

    fn coerce_err(&self, to: &'static str) -> Error {
        Error::Coerce {
            from: self.type_name(),
            to,
        }
    }

    /// Coerce to a boolean: numbers are true when non-zero, strings accept
    /// `true/t/1` and `false/f/0` (case-insensitive).
    pub fn to_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            Value::Int(i) => Ok(*i != 0),
            Value::UInt(u) => Ok(*u != 0),
            Value::Float(f) => Ok(*f != 0.0),
            Value::Str(s) => match s.to_ascii_lowercase().as_str() {
                "true" | "t" | "1" => Ok(true),
                "false" | "f" | "0" => Ok(false),
                _ => Err(self.coerce_err("bool")),
            },
            _ => Err(self.coerce_err("bool")),
        }
    }

    /// Coerce to a signed 64-bit integer. Unsigned values reinterpret the
    /// bit pattern, floats truncate, strings parse (integer, then float).
    pub fn to_i64(&self) -> Result<i64> {
        match self {
            Value::Int(i) => Ok(*i),
            Value::UInt(u) => Ok(*u as i64),
            Value::Float(f) => Ok(*f as i64),
            Value::Bool(b) => Ok(i64::from(*b)),
            Value::Str(s) => s
                .parse::<i64>()
                .or_else(|_| s.parse::<f64>().map(|f| f as i64))
                .map_err(|_| self.coerce_err("int")),
            Value::Timestamp(t) => Ok(*t),
            Value::Date(d) => Ok(*d),
            Value::Bytes(_) => Err(self.coerce_err("int")),
        }
    }

    /// Coerce to an unsigned 64-bit integer; signed values reinterpret the
    /// bit pattern (matching the index key normalization).
    pub fn to_u64(&self) -> Result<u64> {
        match self {
            Value::UInt(u) => Ok(*u),
            Value::Int(i) => Ok(*i as u64),
            Value::Float(f) => Ok(*f as u64),
            Value::Bool(b) => Ok(u64::from(*b)),
            Value::Str(s) => s
                .parse::<u64>()
                .or_else(|_| s.parse::<f64>().map(|f| f as u64))
                .map_err(|_| self.coerce_err("uint")),
            Value::Timestamp(t) => Ok(*t as u64),
            Value::Date(d) => Ok(*d as u64),
            Value::Bytes(_) => Err(self.coerce_err("uint")),
        }
    }

    /// Coerce to a 64-bit float.
    pub fn to_f64(&self) -> Result<f64> {
        match self {
            Value::Float(f) => Ok(*f),
            Value::Int(i) => Ok(*i as f64),
            Value::UInt(u) => Ok(*u as f64),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Str(s) => s.parse::<f64>().map_err(|_| self.coerce_err("float")),
            Value::Timestamp(t) => Ok(*t as f64),
            Value::Date(d) => Ok(*d as f64),
            Value::Bytes(_) => Err(self.coerce_err("float")),
        }
    }

    /// Coerce to a 32-bit float (through [`Value::to_f64`]).
    pub fn to_f32(&self) -> Result<f32> {
        Ok(self.to_f64()? as f32)
    }

    /// Coerce to text; scalars format, bytes decode lossily.
    pub fn to_text(&self) -> Result<String> {
        match self {
            Value::Str(s) => Ok(s.clone()),
            Value::Int(i) => Ok(i.to_string()),
            Value::UInt(u) => Ok(u.to_string()),
            Value::Float(f) => Ok(f.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Bytes(b) => Ok(String::from_utf8_lossy(b).into_owned()),
            Value::Timestamp(t) => Ok(t.to_string()),
            Value::Date(d) => Ok(d.to_string()),
        }
    }

    /// Coerce to raw bytes; only strings and bytes qualify.
    pub fn to_byte_vec(&self) -> Result<Vec<u8>> {
        match self {
            Value::Bytes(b) => Ok(b.clone()),
            Value::Str(s) => Ok(s.clone().into_bytes()),
            _ => Err(self.coerce_err("bytes")),
        }
    }

    /// Coerce to seconds since the Unix epoch. Integers are taken as
    /// seconds, dates expand to midnight, strings parse as RFC 3339,
    /// `%Y-%m-%d %H:%M:%S`, or `%Y-%m-%d`.
    pub fn to_timestamp(&self) -> Result<i64> {
        match self {
            Value::Timestamp(t) => Ok(*t),
            Value::Date(d) => Ok(*d * SECONDS_PER_DAY),
            Value::Int(i) => Ok(*i),
            Value::UInt(u) => Ok(*u as i64),
            Value::Float(f) => Ok(*f as i64),
            Value::Str(s) => parse_time(s).ok_or_else(|| self.coerce_err("timestamp")),
            _ => Err(self.coerce_err("timestamp")),
        }
    }

    /// Coerce to whole days since the Unix epoch (truncating division of
    /// the timestamp form).
    pub fn to_date_days(&self) -> Result<i64> {
        match self {
            Value::Date(d) => Ok(*d),
            other => Ok(other.to_timestamp()? / SECONDS_PER_DAY),
        }
    }

    /// Verify this value coerces into `dtype` without storing anything.
    ///
    /// Insert and update run this over the whole row before mutating any
    /// column, so a coercion failure surfaces before the row is touched.
    pub fn check(&self, dtype: DataType) -> Result<()> {
        match dtype {
            DataType::Bool => self.to_bool().map(drop),
            DataType::Int32 | DataType::Int64 => self.to_i64().map(drop),
            DataType::UInt32 | DataType::UInt64 => self.to_u64().map(drop),
            DataType::Float32 | DataType::Float64 => self.to_f64().map(drop),
            DataType::String => self.to_text().map(drop),
            DataType::Bytes => self.to_byte_vec().map(drop),
            DataType::Timestamp => self.to_timestamp().map(drop),
            DataType::Date => self.to_date_days().map(drop),
            DataType::Generic => Ok(()),
        }
    }
}

fn parse_time(s: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc().timestamp());
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d.and_hms_opt(0, 0, 0)?.and_utc().timestamp());
    }
    None
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::UInt(v as u64)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(Value::Str("42".into()).to_i64().unwrap(), 42);
        assert_eq!(Value::Str("2.5".into()).to_i64().unwrap(), 2);
        assert_eq!(Value::Float(3.9).to_i64().unwrap(), 3);
        assert_eq!(Value::Int(-1).to_u64().unwrap(), u64::MAX);
        assert_eq!(Value::Bool(true).to_f64().unwrap(), 1.0);
        assert!(Value::Bytes(vec![1]).to_i64().is_err());
    }

    #[test]
    fn test_bool_coercion() {
        assert!(Value::Str("True".into()).to_bool().unwrap());
        assert!(!Value::Str("0".into()).to_bool().unwrap());
        assert!(Value::Int(7).to_bool().unwrap());
        assert!(Value::Str("yes".into()).to_bool().is_err());
    }

    #[test]
    fn test_text_and_bytes() {
        assert_eq!(Value::Int(5).to_text().unwrap(), "5");
        assert_eq!(Value::Str("ab".into()).to_byte_vec().unwrap(), b"ab");
        assert!(Value::Int(5).to_byte_vec().is_err());
    }

    #[test]
    fn test_time_coercion() {
        assert_eq!(
            Value::Str("1970-01-02".into()).to_timestamp().unwrap(),
            SECONDS_PER_DAY
        );
        assert_eq!(
            Value::Str("1970-01-01 00:01:00".into()).to_timestamp().unwrap(),
            60
        );
        assert_eq!(Value::Timestamp(SECONDS_PER_DAY + 7).to_date_days().unwrap(), 1);
        assert_eq!(Value::Date(3).to_timestamp().unwrap(), 3 * SECONDS_PER_DAY);
        assert!(Value::Str("not a time".into()).to_timestamp().is_err());
    }

    #[test]
    fn test_check_reports_without_storing() {
        assert!(Value::Str("12".into()).check(DataType::Int64).is_ok());
        assert!(Value::Bytes(vec![0]).check(DataType::Float64).is_err());
        assert!(Value::Bytes(vec![0]).check(DataType::Generic).is_ok());
    }
}

//! Table schema definition

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::data::DataType;
use crate::index::IndexKind;
use crate::{Error, Result};

/// Column definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name (unique within a table)
    pub name: String,
    /// Native storage type
    pub data_type: DataType,
    /// Secondary index the column carries
    pub index: IndexKind,
}

impl ColumnDef {
    /// Create an unindexed column definition
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            index: IndexKind::None,
        }
    }

    /// Give the column the default index for its type
    pub fn indexed(mut self) -> Self {
        self.index = IndexKind::default_for(self.data_type);
        self
    }

    /// Pick the index kind explicitly; the pairing is validated when the
    /// table is created.
    pub fn with_index(mut self, kind: IndexKind) -> Self {
        self.index = kind;
        self
    }
}

/// An ordered set of column definitions with by-name lookup.
#[derive(Debug, Clone)]
pub struct Schema {
    defs: Vec<ColumnDef>,
    by_name: AHashMap<String, usize>,
}

impl Schema {
    pub fn new(defs: Vec<ColumnDef>) -> Result<Schema> {
        let mut by_name = AHashMap::with_capacity(defs.len());
        for (i, def) in defs.iter().enumerate() {
            if by_name.insert(def.name.clone(), i).is_some() {
                return Err(Error::DuplicateColumn(def.name.clone()));
            }
        }
        Ok(Schema { defs, by_name })
    }

    pub fn defs(&self) -> &[ColumnDef] {
        &self.defs
    }

    /// Number of columns
    pub fn width(&self) -> usize {
        self.defs.len()
    }

    /// Definition of the field at `field`
    pub fn def(&self, field: usize) -> Result<&ColumnDef> {
        self.defs.get(field).ok_or(Error::FieldOutOfRange(field))
    }

    /// Resolve a column name to its field index
    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| Error::ColumnNotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_lookup() {
        let schema = Schema::new(vec![
            ColumnDef::new("id", DataType::Int64).indexed(),
            ColumnDef::new("name", DataType::String),
        ])
        .unwrap();

        assert_eq!(schema.width(), 2);
        assert_eq!(schema.index_of("name").unwrap(), 1);
        assert!(matches!(
            schema.index_of("missing"),
            Err(Error::ColumnNotFound(_))
        ));
        assert!(matches!(schema.def(9), Err(Error::FieldOutOfRange(9))));
        assert_eq!(schema.def(0).unwrap().index, IndexKind::Sketch);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = Schema::new(vec![
            ColumnDef::new("x", DataType::Int64),
            ColumnDef::new("x", DataType::String),
        ]);
        assert!(matches!(result, Err(Error::DuplicateColumn(_))));
    }
}

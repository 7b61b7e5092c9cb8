//! Table engine
//!
//! Schema definition plus the concurrent columnar [`Table`].

mod schema;
mod table;

pub use schema::{ColumnDef, Schema};
pub use table::Table;

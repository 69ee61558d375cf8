//! `tabula-model` defines the core in-memory configuration-table data
//! structures.
//!
//! The crate is intentionally self-contained so it can be reused by:
//! - the durable store (JSON table files)
//! - the sheet reconciliation engine
//! - the binary export codec
//!
//! A table is an ordered sequence of column definitions plus an ordered
//! sequence of rows; the first column is always the integer primary key.

mod column;
mod error;
mod scope;
mod table;
mod value;

pub use column::{ColumnDef, ColumnType};
pub use error::{CoercionError, SchemaError};
pub use scope::KeyScope;
pub use table::{ConfigTable, Row, RowInsertError};
pub use value::Value;

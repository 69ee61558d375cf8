use thiserror::Error;

use crate::column::ColumnType;

/// Errors raised when a table's column definitions are missing or invalid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("table '{table}' has no column definitions")]
    NoColumns { table: String },
    #[error("table '{table}': primary key column '{column}' must be 'int', got '{ty}'")]
    PrimaryKeyNotInt {
        table: String,
        column: String,
        ty: ColumnType,
    },
    #[error("table '{table}': duplicate column name '{column}'")]
    DuplicateColumn { table: String, column: String },
    #[error("unknown column type '{token}'")]
    UnknownType { token: String },
    #[error("unknown key scope '{token}' (expected 'group' or 'global')")]
    UnknownScope { token: String },
}

/// A cell value that could not be converted to its column's declared type.
///
/// Carries enough context (column name, offending value, target type) to be
/// shown to the user directly.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("column '{column}': cannot convert {value} to {ty}")]
pub struct CoercionError {
    pub column: String,
    /// JSON rendering of the rejected input.
    pub value: String,
    pub ty: ColumnType,
}

impl CoercionError {
    pub(crate) fn new(column: &str, raw: &serde_json::Value, ty: &ColumnType) -> Self {
        Self {
            column: column.to_string(),
            value: raw.to_string(),
            ty: ty.clone(),
        }
    }
}

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value as Json;
use thiserror::Error;

use crate::column::{ColumnDef, ColumnType};
use crate::error::{CoercionError, SchemaError};
use crate::scope::KeyScope;
use crate::value::Value;

/// One data row, keyed by column name. Every schema column is present;
/// absent cells hold [`Value::Null`].
pub type Row = BTreeMap<String, Value>;

/// Errors raised when appending a row directly to a table.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RowInsertError {
    #[error(transparent)]
    Coercion(#[from] CoercionError),
    #[error("primary key {value} already exists in table '{table}'")]
    DuplicateKey { table: String, value: i64 },
}

/// A configuration table: ordered column definitions plus ordered data rows.
///
/// Row order is semantically meaningful and preserved verbatim through
/// load/save and reconciliation. The first column is always the integer
/// primary key; uniqueness within the table is an invariant here, while the
/// group/global breadth of the constraint is enforced by the occupancy index.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConfigTable {
    pub table_name: String,
    pub group_name: String,
    pub key_scope: KeyScope,
    pub columns: Vec<ColumnDef>,
    pub rows: Vec<Row>,
}

impl ConfigTable {
    pub fn new(
        table_name: impl Into<String>,
        group_name: impl Into<String>,
        key_scope: KeyScope,
        columns: Vec<ColumnDef>,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            group_name: group_name.into(),
            key_scope,
            columns,
            rows: Vec::new(),
        }
    }

    /// Check the structural invariants of the column definitions.
    pub fn validate_schema(&self) -> Result<(), SchemaError> {
        let Some(first) = self.columns.first() else {
            return Err(SchemaError::NoColumns {
                table: self.table_name.clone(),
            });
        };
        if first.ty != ColumnType::Int {
            return Err(SchemaError::PrimaryKeyNotInt {
                table: self.table_name.clone(),
                column: first.name.clone(),
                ty: first.ty.clone(),
            });
        }
        let mut seen = std::collections::HashSet::new();
        for col in &self.columns {
            if !seen.insert(col.name.as_str()) {
                return Err(SchemaError::DuplicateColumn {
                    table: self.table_name.clone(),
                    column: col.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// The primary key column (always the first column, when present).
    pub fn primary_key_column(&self) -> Option<&ColumnDef> {
        self.columns.first()
    }

    /// The primary key of `row`, when it holds an integer value.
    pub fn primary_key_of(&self, row: &Row) -> Option<i64> {
        let pk_name = &self.primary_key_column()?.name;
        match row.get(pk_name) {
            Some(Value::Int(value)) => Some(*value),
            _ => None,
        }
    }

    /// All primary keys currently held by rows, in row order.
    pub fn primary_keys(&self) -> impl Iterator<Item = i64> + '_ {
        self.rows.iter().filter_map(|row| self.primary_key_of(row))
    }

    /// The next free primary key value: one past the current maximum, or 1
    /// for an empty table.
    pub fn next_primary_key(&self) -> i64 {
        self.primary_keys().max().map_or(1, |max| max + 1)
    }

    /// Coerce and append one raw row.
    ///
    /// The row is validated cell-by-cell against the column definitions and
    /// checked for a table-local primary key collision before anything is
    /// mutated. Scope-wide uniqueness is the occupancy index's concern.
    pub fn add_row(&mut self, raw: &serde_json::Map<String, Json>) -> Result<(), RowInsertError> {
        let mut row = Row::new();
        for col in &self.columns {
            let cell = raw.get(&col.name).unwrap_or(&Json::Null);
            row.insert(col.name.clone(), col.coerce(cell)?);
        }
        if let Some(pk) = self.primary_key_of(&row) {
            if self.primary_keys().any(|existing| existing == pk) {
                return Err(RowInsertError::DuplicateKey {
                    table: self.table_name.clone(),
                    value: pk,
                });
            }
        }
        self.rows.push(row);
        Ok(())
    }
}

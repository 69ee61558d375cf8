use thiserror::Error;

use tabula_keys::KeyConflict;
use tabula_model::{CoercionError, SchemaError};
use tabula_store::StoreError;

/// Everything that can stop a reconciliation.
///
/// All validation happens before any persistence write, so every variant
/// here leaves the authoritative store untouched; a [`KeyConflict`] also
/// leaves the occupancy index unchanged (diff application is atomic).
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("table '{table}': {source}")]
    Coercion {
        table: String,
        #[source]
        source: CoercionError,
    },
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("table '{table}': primary key {value} appears {count} times in the edited sheet")]
    DuplicateKey {
        table: String,
        value: i64,
        count: usize,
    },
    #[error(transparent)]
    Conflict(#[from] KeyConflict),
    #[error(transparent)]
    Store(#[from] StoreError),
}

//! Reconciliation of externally edited sheet rows back into the
//! authoritative table store.
//!
//! The editing surface is modeled as a plain grid of JSON-shaped cells
//! ([`Sheet`]): a header row of column names, a type row, a key-scope tag
//! row, then data rows. The engine ([`reconcile_sheet`]) validates and
//! coerces the edited rows, auto-fills missing primary keys, diffs the key
//! set against the stored table, applies the diff to the occupancy index,
//! and persists the edited row order verbatim.

mod engine;
mod error;
mod sheet;

pub use engine::{reconcile_sheet, reconcile_workbook};
pub use error::SyncError;
pub use sheet::{
    format_key_tag, parse_key_tag, Sheet, Workbook, DATA_START_ROW, HEADER_ROW, KEY_ROW, TYPE_ROW,
};

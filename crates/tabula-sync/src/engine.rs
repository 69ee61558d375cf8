use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use serde_json::Value as Json;

use tabula_keys::KeyIndex;
use tabula_model::{ConfigTable, Row, SchemaError, Value};
use tabula_store as store;

use crate::error::SyncError;
use crate::sheet::{Sheet, Workbook, DATA_START_ROW};

/// Merge the edited rows of `sheet` into the table stored at `table_path`.
///
/// The edited ordering is authoritative: after validation the stored rows
/// are replaced with the sheet's rows exactly as provided. Primary keys
/// left empty in the sheet are auto-filled (previous accepted row's key
/// plus one, starting at 1) and written back into the sheet so the editor
/// shows the assigned value. All validation happens before the store is
/// touched; a key conflict also leaves `index` unchanged.
///
/// Returns the updated table as persisted.
pub fn reconcile_sheet(
    sheet: &mut Sheet,
    table_path: &Path,
    index: &mut KeyIndex,
) -> Result<ConfigTable, SyncError> {
    let mut table = store::load_table(table_path)?;
    let pk_name = table
        .primary_key_column()
        .map(|col| col.name.clone())
        .ok_or_else(|| SchemaError::NoColumns {
            table: table.table_name.clone(),
        })?;

    // Surface columns are matched to schema columns by name; the first
    // header cell with a given name wins, unknown names are ignored.
    let mut col_of: HashMap<String, usize> = HashMap::new();
    for (idx, name) in sheet.header() {
        col_of.entry(name).or_insert(idx);
    }

    let mut new_rows: Vec<Row> = Vec::new();
    let mut new_pks: Vec<i64> = Vec::new();
    for row_idx in DATA_START_ROW..sheet.row_count() {
        let empty = table.columns.iter().all(|col| {
            col_of
                .get(&col.name)
                .map_or(true, |&c| cell_is_empty(sheet.cell(row_idx, c)))
        });
        if empty {
            continue;
        }

        let absent = Json::Null;
        let mut row = Row::new();
        for col in &table.columns {
            let raw = col_of
                .get(&col.name)
                .map_or(&absent, |&c| sheet.cell(row_idx, c));
            let value = col.coerce(raw).map_err(|source| SyncError::Coercion {
                table: table.table_name.clone(),
                source,
            })?;
            row.insert(col.name.clone(), value);
        }

        let pk = match row.get(&pk_name) {
            Some(Value::Int(value)) => *value,
            _ => {
                let filled = new_pks.last().map_or(1, |last| last + 1);
                row.insert(pk_name.clone(), Value::Int(filled));
                if let Some(&c) = col_of.get(&pk_name) {
                    sheet.set_cell(row_idx, c, Json::from(filled));
                }
                filled
            }
        };
        new_pks.push(pk);
        new_rows.push(row);
    }

    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for &pk in &new_pks {
        *counts.entry(pk).or_insert(0) += 1;
    }
    if let Some((&value, &count)) = counts.iter().find(|(_, &count)| count > 1) {
        return Err(SyncError::DuplicateKey {
            table: table.table_name.clone(),
            value,
            count,
        });
    }

    let old_pks: BTreeSet<i64> = table.primary_keys().collect();
    let new_pks: BTreeSet<i64> = new_pks.into_iter().collect();
    let removed: BTreeSet<i64> = old_pks.difference(&new_pks).copied().collect();
    let added: BTreeSet<i64> = new_pks.difference(&old_pks).copied().collect();
    index.apply_diff(
        &table.group_name,
        &table.table_name,
        &removed,
        &added,
        table.key_scope,
    )?;

    table.rows = new_rows;
    store::save_table(&table, table_path)?;
    Ok(table)
}

/// Reconcile every sheet of a workbook against the tables of one group.
///
/// Sheets are matched to table files by name; a sheet with no backing table
/// file is skipped with a warning, matching the behavior expected when a
/// surface carries scratch sheets.
pub fn reconcile_workbook(
    book: &mut Workbook,
    root: &Path,
    group: &str,
    index: &mut KeyIndex,
) -> Result<Vec<ConfigTable>, SyncError> {
    let mut updated = Vec::new();
    for sheet in &mut book.sheets {
        let path = store::table_path(root, group, &sheet.name);
        if !path.exists() {
            log::warn!(
                "no table file for sheet '{}' in group '{group}', skipping",
                sheet.name
            );
            continue;
        }
        updated.push(reconcile_sheet(sheet, &path, index)?);
    }
    Ok(updated)
}

fn cell_is_empty(cell: &Json) -> bool {
    match cell {
        Json::Null => true,
        Json::String(s) => s.is_empty(),
        _ => false,
    }
}

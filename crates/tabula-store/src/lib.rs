//! Durable storage for configuration tables.
//!
//! Tables live as JSON files, one per table, in per-group directories under
//! a config root:
//!
//! ```text
//! <root>/<group>/<table>.json
//! ```
//!
//! Saves are atomic: content is written to a temp file in the destination
//! directory, flushed, and renamed into place, so a crash mid-save never
//! leaves a truncated table behind. Loading coerces every stored cell
//! through the column definitions, so rows handed to callers are always
//! typed.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value as Json;
use tempfile::NamedTempFile;
use thiserror::Error;
use walkdir::WalkDir;

use tabula_keys::{KeyConflict, KeyIndex};
use tabula_model::{CoercionError, ColumnDef, ConfigTable, KeyScope, Row, SchemaError};

/// File extension for durable table files.
pub const TABLE_EXT: &str = "json";

/// Directory name reserved for derived artifacts; skipped when scanning.
const CACHE_DIR: &str = ".cache";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("table file not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("failed to parse table file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("table file {}: {source}", path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: CoercionError,
    },
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Raw on-disk shape of a table file; rows stay JSON until coerced.
#[derive(Deserialize)]
struct TableFile {
    table_name: String,
    group_name: String,
    #[serde(default)]
    key_scope: KeyScope,
    #[serde(default)]
    columns: Vec<ColumnDef>,
    #[serde(default)]
    rows: Vec<serde_json::Map<String, Json>>,
}

/// Path of the table file for `group`/`table` under `root`.
pub fn table_path(root: &Path, group: &str, table: &str) -> PathBuf {
    root.join(group).join(format!("{table}.{TABLE_EXT}"))
}

/// Load one table from its JSON file.
///
/// Schema invariants are checked and every stored cell is coerced through
/// its column definition, so the returned rows are typed.
pub fn load_table(path: &Path) -> Result<ConfigTable, StoreError> {
    let raw = fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            StoreError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            StoreError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    let file: TableFile = serde_json::from_str(&raw).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let mut table = ConfigTable::new(
        file.table_name,
        file.group_name,
        file.key_scope,
        file.columns,
    );
    table.validate_schema()?;
    for raw_row in &file.rows {
        let mut row = Row::new();
        for col in &table.columns {
            let cell = raw_row.get(&col.name).unwrap_or(&Json::Null);
            let value = col.coerce(cell).map_err(|source| StoreError::Invalid {
                path: path.to_path_buf(),
                source,
            })?;
            row.insert(col.name.clone(), value);
        }
        table.rows.push(row);
    }
    Ok(table)
}

/// Save a table to `path`, atomically replacing any previous content.
pub fn save_table(table: &ConfigTable, path: &Path) -> Result<(), StoreError> {
    table.validate_schema()?;
    let bytes = serde_json::to_vec_pretty(table).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    atomic_write_bytes(path, &bytes).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Create a new empty table and persist it.
pub fn create_table(
    path: &Path,
    table_name: &str,
    group_name: &str,
    columns: Vec<ColumnDef>,
    key_scope: KeyScope,
) -> Result<ConfigTable, StoreError> {
    let table = ConfigTable::new(table_name, group_name, key_scope, columns);
    save_table(&table, path)?;
    Ok(table)
}

/// Table files of one group, sorted by path. Missing group directories are
/// simply empty.
pub fn group_tables(root: &Path, group: &str) -> Vec<PathBuf> {
    let dir = root.join(group);
    let Ok(entries) = fs::read_dir(&dir) else {
        return Vec::new();
    };
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == TABLE_EXT))
        .collect();
    paths.sort();
    paths
}

/// Every group under `root` with its table files, sorted. The parent
/// directory name is the group; `.cache` directories are skipped.
pub fn all_tables(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut groups: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for entry in WalkDir::new(root).into_iter().filter_map(|entry| entry.ok()) {
        let path = entry.path();
        if !entry.file_type().is_file()
            || !path.extension().is_some_and(|ext| ext == TABLE_EXT)
            || path.components().any(|c| c.as_os_str() == CACHE_DIR)
        {
            continue;
        }
        let Some(group) = path
            .parent()
            .and_then(Path::file_name)
            .and_then(|name| name.to_str())
        else {
            continue;
        };
        groups.entry(group.to_string()).or_default().push(path.to_path_buf());
    }
    for paths in groups.values_mut() {
        paths.sort();
    }
    groups
}

/// Rebuild the occupancy index from every table under `root`.
///
/// Unreadable table files are warned about and skipped; key conflicts found
/// during the rebuild are returned as diagnostics (the scan continues past
/// them, best effort).
pub fn rebuild_index(root: &Path, index: &mut KeyIndex) -> Vec<KeyConflict> {
    let mut tables = Vec::new();
    for (_, paths) in all_tables(root) {
        for path in paths {
            match load_table(&path) {
                Ok(table) => tables.push(table),
                Err(err) => log::warn!("skipping table during index rebuild: {err}"),
            }
        }
    }
    index.rebuild_from(&tables)
}

/// Atomic write: temp file in the destination directory, flush + sync,
/// rename into place with replace semantics.
fn atomic_write_bytes(dest: &Path, bytes: &[u8]) -> io::Result<()> {
    // `Path::parent` returns `Some("")` for bare relative file names; treat
    // that as the current directory.
    let dir = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file_mut().flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|err| err.error)?;
    Ok(())
}

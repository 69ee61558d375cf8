use std::fs;

use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;

use tabula_keys::KeyIndex;
use tabula_model::{ColumnDef, ColumnType, ConfigTable, KeyScope, Value};
use tabula_store::{
    all_tables, create_table, group_tables, load_table, rebuild_index, save_table, table_path,
    StoreError,
};

fn columns() -> Vec<ColumnDef> {
    vec![
        ColumnDef::new("id", ColumnType::Int),
        ColumnDef::new("label", ColumnType::String),
        ColumnDef::new("tags", "List<string>".parse().expect("type")),
        ColumnDef::new("weights", "Dictionary<int, float>".parse().expect("type")),
    ]
}

fn sample_table() -> ConfigTable {
    let mut table = ConfigTable::new("items", "core", KeyScope::Group, columns());
    table
        .add_row(
            json!({"id": 1, "label": "sword", "tags": ["melee", "iron"], "weights": {"1": 0.5}})
                .as_object()
                .expect("object"),
        )
        .expect("row 1");
    table
        .add_row(json!({"id": 2, "label": null}).as_object().expect("object"))
        .expect("row 2");
    table
}

#[test]
fn save_then_load_preserves_rows_and_order() {
    let dir = TempDir::new().expect("tempdir");
    let path = table_path(dir.path(), "core", "items");

    let table = sample_table();
    save_table(&table, &path).expect("save");
    let loaded = load_table(&path).expect("load");

    assert_eq!(loaded, table);
    assert_eq!(
        loaded.rows[0]["weights"],
        Value::Map(vec![(Value::Int(1), Value::Float(0.5))])
    );
    assert_eq!(loaded.rows[1]["label"], Value::Null);
}

#[test]
fn load_missing_file_is_not_found() {
    let dir = TempDir::new().expect("tempdir");
    let err = load_table(&dir.path().join("nope.json")).expect_err("missing");
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[test]
fn load_rejects_malformed_json() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("broken.json");
    fs::write(&path, b"{ not json").expect("write");

    let err = load_table(&path).expect_err("malformed");
    assert!(matches!(err, StoreError::Parse { .. }));
}

#[test]
fn load_rejects_non_int_primary_key() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("bad.json");
    fs::write(
        &path,
        serde_json::to_vec(&json!({
            "table_name": "bad",
            "group_name": "core",
            "key_scope": "group",
            "columns": [{"name": "id", "type": "string"}],
            "rows": []
        }))
        .expect("json"),
    )
    .expect("write");

    let err = load_table(&path).expect_err("bad schema");
    assert!(matches!(err, StoreError::Schema(_)));
}

#[test]
fn load_rejects_uncoercible_cells() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("bad.json");
    fs::write(
        &path,
        serde_json::to_vec(&json!({
            "table_name": "bad",
            "group_name": "core",
            "key_scope": "group",
            "columns": [{"name": "id", "type": "int"}],
            "rows": [{"id": "not-a-number"}]
        }))
        .expect("json"),
    )
    .expect("write");

    let err = load_table(&path).expect_err("bad cell");
    assert!(matches!(err, StoreError::Invalid { .. }));
}

#[test]
fn save_replaces_existing_content_atomically() {
    let dir = TempDir::new().expect("tempdir");
    let path = table_path(dir.path(), "core", "items");

    let mut table = sample_table();
    save_table(&table, &path).expect("first save");

    table.rows.remove(0);
    save_table(&table, &path).expect("second save");

    let loaded = load_table(&path).expect("reload");
    assert_eq!(loaded.rows.len(), 1);
    assert_eq!(loaded.primary_keys().collect::<Vec<_>>(), vec![2]);
}

#[test]
fn create_table_writes_an_empty_table() {
    let dir = TempDir::new().expect("tempdir");
    let path = table_path(dir.path(), "core", "fresh");

    let created = create_table(&path, "fresh", "core", columns(), KeyScope::Global)
        .expect("create");
    assert!(created.rows.is_empty());

    let loaded = load_table(&path).expect("load");
    assert_eq!(loaded.key_scope, KeyScope::Global);
    assert_eq!(loaded.table_name, "fresh");
}

#[test]
fn enumeration_groups_by_directory_and_skips_cache() {
    let dir = TempDir::new().expect("tempdir");
    let root = dir.path();

    create_table(
        &table_path(root, "core", "b_items"),
        "b_items",
        "core",
        columns(),
        KeyScope::Group,
    )
    .expect("create");
    create_table(
        &table_path(root, "core", "a_items"),
        "a_items",
        "core",
        columns(),
        KeyScope::Group,
    )
    .expect("create");
    create_table(
        &table_path(root, "extra", "misc"),
        "misc",
        "extra",
        columns(),
        KeyScope::Group,
    )
    .expect("create");
    // Derived artifacts must not show up as tables.
    fs::create_dir_all(root.join(".cache")).expect("mkdir");
    fs::write(root.join(".cache/ignored.json"), b"{}").expect("write");

    let groups = all_tables(root);
    assert_eq!(groups.keys().collect::<Vec<_>>(), vec!["core", "extra"]);
    assert_eq!(groups["core"].len(), 2);
    // Sorted within a group.
    assert!(groups["core"][0].ends_with("a_items.json"));

    assert_eq!(group_tables(root, "extra").len(), 1);
    assert!(group_tables(root, "absent").is_empty());
}

#[test]
fn rebuild_index_reports_cross_group_conflicts() {
    let dir = TempDir::new().expect("tempdir");
    let root = dir.path();

    let mut global = ConfigTable::new("g_table", "g1", KeyScope::Global, columns());
    global
        .add_row(json!({"id": 5}).as_object().expect("object"))
        .expect("row");
    save_table(&global, &table_path(root, "g1", "g_table")).expect("save");

    let mut other = ConfigTable::new("o_table", "g2", KeyScope::Group, columns());
    other
        .add_row(json!({"id": 5}).as_object().expect("object"))
        .expect("row");
    other
        .add_row(json!({"id": 6}).as_object().expect("object"))
        .expect("row");
    save_table(&other, &table_path(root, "g2", "o_table")).expect("save");

    let mut index = KeyIndex::new();
    let conflicts = rebuild_index(root, &mut index);

    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].value, 5);
    // The non-conflicting key still registered.
    assert_eq!(index.group_owner("g2", 6), Some("o_table"));
}

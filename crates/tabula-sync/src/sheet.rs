use serde_json::Value as Json;

use tabula_model::{ConfigTable, KeyScope, Value};

/// Row holding the column names.
pub const HEADER_ROW: usize = 0;
/// Row holding the column type names.
pub const TYPE_ROW: usize = 1;
/// Row holding the `KEY(<SCOPE>)` tag in the primary-key column.
pub const KEY_ROW: usize = 2;
/// First data row.
pub const DATA_START_ROW: usize = 3;

static JSON_NULL: Json = Json::Null;

/// A plain grid of JSON-shaped cells, the unstyled face of one edited
/// sheet. Out-of-range reads are `null`; writes grow the grid as needed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Sheet {
    pub name: String,
    cells: Vec<Vec<Json>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: Vec::new(),
        }
    }

    /// Build the grid representation of a table: header, types, key tag,
    /// then data rows. List and dictionary cells render as JSON text, the
    /// form the editing surface displays and hands back.
    pub fn from_table(table: &ConfigTable) -> Self {
        let mut sheet = Sheet::new(table.table_name.clone());
        for (col_idx, col) in table.columns.iter().enumerate() {
            sheet.set_cell(HEADER_ROW, col_idx, Json::String(col.name.clone()));
            sheet.set_cell(TYPE_ROW, col_idx, Json::String(col.ty.to_string()));
            let tag = if col_idx == 0 {
                format_key_tag(table.key_scope)
            } else {
                String::new()
            };
            sheet.set_cell(KEY_ROW, col_idx, Json::String(tag));
        }
        for (row_idx, row) in table.rows.iter().enumerate() {
            for (col_idx, col) in table.columns.iter().enumerate() {
                let cell = row.get(&col.name).map_or(Json::Null, value_to_cell);
                sheet.set_cell(DATA_START_ROW + row_idx, col_idx, cell);
            }
        }
        sheet
    }

    /// Cell at `(row, col)`; absent cells read as `null`.
    pub fn cell(&self, row: usize, col: usize) -> &Json {
        self.cells
            .get(row)
            .and_then(|cells| cells.get(col))
            .unwrap_or(&JSON_NULL)
    }

    pub fn set_cell(&mut self, row: usize, col: usize, value: Json) {
        if self.cells.len() <= row {
            self.cells.resize(row + 1, Vec::new());
        }
        let cells = &mut self.cells[row];
        if cells.len() <= col {
            cells.resize(col + 1, Json::Null);
        }
        cells[col] = value;
    }

    /// Number of rows, including the three layout rows.
    pub fn row_count(&self) -> usize {
        self.cells.len()
    }

    /// `(column index, name)` of every non-empty header cell.
    pub fn header(&self) -> Vec<(usize, String)> {
        let Some(cells) = self.cells.get(HEADER_ROW) else {
            return Vec::new();
        };
        cells
            .iter()
            .enumerate()
            .filter_map(|(idx, cell)| match cell {
                Json::String(name) if !name.is_empty() => Some((idx, name.clone())),
                _ => None,
            })
            .collect()
    }

    /// The key scope declared in the sheet's tag row, if present and valid.
    pub fn key_scope_tag(&self) -> Option<KeyScope> {
        match self.cell(KEY_ROW, 0) {
            Json::String(tag) => parse_key_tag(tag),
            _ => None,
        }
    }
}

/// An ordered collection of sheets, one per table.
#[derive(Clone, Debug, Default)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sheet(&mut self, sheet: Sheet) {
        self.sheets.push(sheet);
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|sheet| sheet.name == name)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|sheet| sheet.name == name)
    }
}

/// Format the key-scope tag shown in the sheet's metadata row.
pub fn format_key_tag(scope: KeyScope) -> String {
    format!("KEY({})", scope.to_string().to_uppercase())
}

/// Parse a `KEY(<GROUP|GLOBAL>)` tag back into a scope.
pub fn parse_key_tag(tag: &str) -> Option<KeyScope> {
    let inner = tag.trim().strip_prefix("KEY(")?.strip_suffix(')')?;
    inner.parse().ok()
}

/// Render a typed value as a sheet cell.
fn value_to_cell(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Int(v) => Json::from(*v),
        Value::Float(v) => serde_json::Number::from_f64(*v).map_or(Json::Null, Json::Number),
        Value::Text(s) => Json::String(s.clone()),
        Value::Bool(v) => Json::Bool(*v),
        // Structured values travel as JSON text in the surface.
        structured => Json::String(structured.to_string()),
    }
}

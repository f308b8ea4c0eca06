//! Core table types for representing specimen data

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// A table loaded from one file, or the concatenation of several
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    /// Column definitions, names case-folded
    pub columns: Vec<Column>,
    /// Row data
    pub rows: Vec<Row>,
    /// Files the rows came from; `Row::origin` indexes into this
    pub sources: Vec<PathBuf>,
    /// Whether invalid UTF-8 had to be replaced while decoding
    pub lossy_decode: bool,
}

impl Table {
    /// Create a new empty table read from `source_path`
    pub fn new(source_path: PathBuf) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            sources: vec![source_path],
            lossy_decode: false,
        }
    }

    /// Get the number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Get the number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Find a column by its normalized name
    pub fn find_column(&self, name: &str) -> Option<&Column> {
        let name = normalize_column_name(name);
        self.columns.iter().find(|c| c.name == name)
    }

    /// Column names in order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Path of the file a row came from
    pub fn source_of(&self, row: &Row) -> Option<&PathBuf> {
        self.sources.get(row.origin)
    }

    /// Remove a column and its cells. Returns false if there was no such column.
    pub fn drop_column(&mut self, name: &str) -> bool {
        let Some(index) = self.find_column(name).map(|c| c.index) else {
            return false;
        };

        self.columns.remove(index);
        for (i, col) in self.columns.iter_mut().enumerate() {
            col.index = i;
        }
        for row in &mut self.rows {
            if index < row.cells.len() {
                row.cells.remove(index);
            }
        }
        true
    }
}

/// Case-fold a column name the way headers are normalized on load
pub fn normalize_column_name(name: &str) -> String {
    caseless::default_case_fold_str(name)
}

/// Concatenate tables with column-union semantics.
///
/// Columns appear in order of first appearance across `tables`. Rows of a
/// table lacking some column get an empty cell there. Each row's `origin`
/// is rewritten to index the combined `sources`.
pub fn concat_tables(tables: Vec<Table>) -> Table {
    let mut columns: Vec<Column> = Vec::new();
    let mut col_index: HashMap<String, usize> = HashMap::new();

    for table in &tables {
        for col in &table.columns {
            if !col_index.contains_key(&col.name) {
                col_index.insert(col.name.clone(), columns.len());
                columns.push(Column::new(col.name.clone(), columns.len()));
            }
        }
    }

    let mut rows = Vec::with_capacity(tables.iter().map(Table::row_count).sum());
    let mut sources = Vec::new();
    let mut lossy_decode = false;

    for table in tables {
        lossy_decode |= table.lossy_decode;

        // Position of each of this table's columns in the unified layout
        let mapping: Vec<usize> = table.columns.iter().map(|c| col_index[&c.name]).collect();
        let offset = sources.len();

        for row in table.rows {
            let mut cells = vec![CellValue::Empty; columns.len()];
            for (cell, &target) in row.cells.into_iter().zip(&mapping) {
                cells[target] = cell;
            }
            rows.push(Row {
                cells,
                origin: offset + row.origin,
            });
        }

        sources.extend(table.sources);
    }

    Table {
        columns,
        rows,
        sources,
        lossy_decode,
    }
}

/// A column definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name, case-folded (e.g. "specimenid")
    pub name: String,
    /// Column index (0-based)
    pub index: usize,
}

impl Column {
    /// Create a new column
    pub fn new(name: String, index: usize) -> Self {
        Self { name, index }
    }
}

/// A row of data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Cell values for each column
    pub cells: Vec<CellValue>,
    /// Index into the owning table's `sources`
    pub origin: usize,
}

impl Row {
    /// Create a new row coming from the table's first source
    pub fn new(cells: Vec<CellValue>) -> Self {
        Self { cells, origin: 0 }
    }

    /// Get a cell value by column index
    pub fn get(&self, index: usize) -> Option<&CellValue> {
        self.cells.get(index)
    }
}

/// A cell: some text, or nothing at all
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellValue {
    /// Text value, kept verbatim
    Text(String),
    /// Empty/null cell
    Empty,
}

impl CellValue {
    /// Parse a raw field. Only a zero-length field is null.
    pub fn parse(s: &str) -> Self {
        if s.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(s.to_string())
        }
    }

    /// Check if the cell is empty
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// The text, if any
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            CellValue::Empty => None,
        }
    }

    /// Convert to a display string
    pub fn to_string_value(&self) -> String {
        self.as_str().unwrap_or_default().to_string()
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str().unwrap_or_default())
    }
}

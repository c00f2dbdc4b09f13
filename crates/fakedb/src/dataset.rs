//! In-memory tables that fake connections answer from.

use fakedb_core::error::{Error, Result};
use fakedb_core::Value;
use std::collections::BTreeMap;

/// One row as ordered `(column, value)` pairs.
pub type Record = Vec<(String, Value)>;

/// A table: ordered column names plus rows laid out by column position.
///
/// Every row is exactly as wide as the column list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub(crate) fn rows_mut(&mut self) -> &mut Vec<Vec<Value>> {
        &mut self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column. Identifiers match case-insensitively.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Position of a column, adding it (NULL in existing rows) if missing.
    pub fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(idx) = self.column_index(name) {
            return idx;
        }
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(Value::Null);
        }
        self.columns.len() - 1
    }

    /// Append a record. Missing columns are NULL, unknown ones are added.
    ///
    /// Returns the index of the new row.
    pub fn insert_record(&mut self, record: &[(String, Value)]) -> usize {
        let positions: Vec<usize> = record
            .iter()
            .map(|(name, _)| self.ensure_column(name))
            .collect();
        let mut row = vec![Value::Null; self.columns.len()];
        for (pos, (_, value)) in positions.into_iter().zip(record) {
            row[pos] = value.clone();
        }
        self.rows.push(row);
        self.rows.len() - 1
    }

    /// Rows rendered as records, in table order.
    pub fn records(&self) -> impl Iterator<Item = Record> + '_ {
        self.rows.iter().map(|row| {
            self.columns
                .iter()
                .cloned()
                .zip(row.iter().cloned())
                .collect()
        })
    }
}

/// A named collection of tables.
///
/// Table names are stored lowercased so lookups ignore case.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    tables: BTreeMap<String, Table>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(&name.to_ascii_lowercase())
    }

    pub fn table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.get_mut(&name.to_ascii_lowercase())
    }

    /// The named table, created empty if absent.
    pub fn table_or_create(&mut self, name: &str) -> &mut Table {
        self.tables.entry(name.to_ascii_lowercase()).or_default()
    }

    /// Add or replace a table.
    pub fn put_table(&mut self, name: &str, table: Table) {
        self.tables.insert(name.to_ascii_lowercase(), table);
    }

    /// Append a record to a table, creating the table if needed.
    pub fn insert(&mut self, table: &str, record: Record) {
        self.table_or_create(table).insert_record(&record);
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Build a dataset from a JSON fixture.
    ///
    /// The root is an object keyed by table name. Each table is either an
    /// array of row objects, or `{"columns": [...], "rows": [[...], ...]}`
    /// when column order matters (row objects come out in key order).
    pub fn from_json(json: &serde_json::Value) -> Result<Self> {
        let root = json.as_object().ok_or_else(|| {
            Error::Serde("dataset fixture must be a JSON object keyed by table name".to_string())
        })?;

        let mut dataset = Dataset::new();
        for (name, body) in root {
            dataset.put_table(name, table_from_json(name, body)?);
        }
        Ok(dataset)
    }

    /// Parse a JSON fixture string. See [`Dataset::from_json`].
    pub fn from_json_str(text: &str) -> Result<Self> {
        let json: serde_json::Value = serde_json::from_str(text)?;
        Self::from_json(&json)
    }
}

fn table_from_json(name: &str, body: &serde_json::Value) -> Result<Table> {
    match body {
        serde_json::Value::Array(items) => {
            let mut table = Table::default();
            for item in items {
                let obj = item.as_object().ok_or_else(|| {
                    Error::Serde(format!("table '{}': rows must be JSON objects", name))
                })?;
                let record: Record = obj
                    .iter()
                    .map(|(col, v)| (col.clone(), Value::from_json_scalar(v)))
                    .collect();
                table.insert_record(&record);
            }
            Ok(table)
        }
        serde_json::Value::Object(obj) => {
            let columns: Vec<String> = obj
                .get("columns")
                .and_then(serde_json::Value::as_array)
                .ok_or_else(|| {
                    Error::Serde(format!("table '{}': missing \"columns\" array", name))
                })?
                .iter()
                .map(|c| {
                    c.as_str().map(str::to_string).ok_or_else(|| {
                        Error::Serde(format!("table '{}': column names must be strings", name))
                    })
                })
                .collect::<Result<_>>()?;

            let mut table = Table::new(columns);
            let rows = obj
                .get("rows")
                .and_then(serde_json::Value::as_array)
                .map_or(&[][..], Vec::as_slice);
            for (i, row) in rows.iter().enumerate() {
                let cells = row.as_array().ok_or_else(|| {
                    Error::Serde(format!("table '{}': row {} must be an array", name, i))
                })?;
                if cells.len() != table.columns().len() {
                    return Err(Error::Serde(format!(
                        "table '{}': row {} has {} values for {} columns",
                        name,
                        i,
                        cells.len(),
                        table.columns().len()
                    )));
                }
                table
                    .rows_mut()
                    .push(cells.iter().map(Value::from_json_scalar).collect());
            }
            Ok(table)
        }
        _ => Err(Error::Serde(format!(
            "table '{}': expected an array of rows or a columns/rows object",
            name
        ))),
    }
}

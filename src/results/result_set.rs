use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use super::row::{CustomDbRow, index_columns, value_to_json};
use crate::driver::DriverOutput;
use crate::executor::OutputFormat;
use crate::types::SqlValue;

/// The result of one executed statement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    /// The rows returned by the query
    pub results: Vec<CustomDbRow>,
    /// Rows returned for queries, rows changed for DML
    pub rows_affected: usize,
    /// How callers asked to see rows; see [`ResultSet::to_json`].
    pub format: OutputFormat,
    column_names: Option<Arc<Vec<String>>>,
    column_index: Option<Arc<HashMap<String, usize>>>,
}

impl ResultSet {
    /// Create a new result set with a known capacity
    #[must_use]
    pub fn with_capacity(capacity: usize) -> ResultSet {
        ResultSet {
            results: Vec::with_capacity(capacity),
            ..ResultSet::default()
        }
    }

    /// Set the column names shared by all rows added afterwards
    pub fn set_column_names(&mut self, column_names: Arc<Vec<String>>) {
        self.column_index = Some(Arc::new(index_columns(&column_names)));
        self.column_names = Some(column_names);
    }

    /// Get the column names for this result set
    #[must_use]
    pub fn get_column_names(&self) -> Option<&Arc<Vec<String>>> {
        self.column_names.as_ref()
    }

    /// Add a row to the result set; ignored until column names are set.
    pub fn add_row_values(&mut self, row_values: Vec<SqlValue>) {
        if let (Some(column_names), Some(column_index)) = (&self.column_names, &self.column_index) {
            self.results.push(CustomDbRow {
                column_names: Arc::clone(column_names),
                rows: row_values,
                column_index: Arc::clone(column_index),
            });
            self.rows_affected += 1;
        }
    }

    /// Add a prebuilt row
    pub fn add_row(&mut self, row: CustomDbRow) {
        if self.column_names.is_none() {
            self.column_names = Some(Arc::clone(&row.column_names));
            self.column_index = Some(Arc::clone(&row.column_index));
        }
        self.results.push(row);
        self.rows_affected += 1;
    }

    /// Map raw driver output, keeping at most `max_rows` rows (0 keeps all).
    #[must_use]
    pub fn from_driver(output: DriverOutput, format: OutputFormat, max_rows: usize) -> Self {
        let DriverOutput {
            columns,
            mut rows,
            rows_affected,
        } = output;
        if max_rows > 0 {
            rows.truncate(max_rows);
        }
        let mut set = ResultSet::with_capacity(rows.len());
        set.format = format;
        set.set_column_names(Arc::new(columns));
        for row in rows {
            set.add_row_values(row);
        }
        if set.results.is_empty() {
            set.rows_affected = rows_affected;
        }
        set
    }

    /// Rows rendered in the requested [`OutputFormat`]: objects keyed by
    /// column name, or positional arrays.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        let rows = self.results.iter().map(|row| match self.format {
            OutputFormat::Object => row.to_json(),
            OutputFormat::Array => JsonValue::Array(row.rows.iter().map(value_to_json).collect()),
        });
        JsonValue::Array(rows.collect())
    }
}

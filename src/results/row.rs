use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value as JsonValue};

use crate::types::SqlValue;

/// A row from a query result
///
/// Column names and the name-to-index lookup are shared by every row of one
/// result set.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomDbRow {
    /// The column names for this row
    pub column_names: Arc<Vec<String>>,
    /// The values for this row, in column order
    pub rows: Vec<SqlValue>,
    pub(crate) column_index: Arc<HashMap<String, usize>>,
}

impl CustomDbRow {
    /// Create a row, building its own column lookup.
    #[must_use]
    pub fn new(column_names: Arc<Vec<String>>, rows: Vec<SqlValue>) -> Self {
        let column_index = Arc::new(index_columns(&column_names));
        Self {
            column_names,
            rows,
            column_index,
        }
    }

    /// Get the index of a column by name
    #[must_use]
    pub fn get_column_index(&self, column_name: &str) -> Option<usize> {
        self.column_index.get(column_name).copied()
    }

    /// Get a value from the row by column name
    ///
    /// Eager-loaded columns are addressed by their dotted alias, e.g.
    /// `row.get("posts.title")`.
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&SqlValue> {
        self.get_column_index(column_name)
            .and_then(|idx| self.rows.get(idx))
    }

    /// Get a value from the row by column index
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&SqlValue> {
        self.rows.get(index)
    }

    /// The row as a JSON object keyed by column name.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        let object: Map<String, JsonValue> = self
            .column_names
            .iter()
            .zip(&self.rows)
            .map(|(name, value)| (name.clone(), value_to_json(value)))
            .collect();
        JsonValue::Object(object)
    }
}

/// Duplicate names keep their first position, matching how drivers resolve
/// a name lookup.
pub(crate) fn index_columns(column_names: &[String]) -> HashMap<String, usize> {
    let mut index = HashMap::with_capacity(column_names.len());
    for (i, name) in column_names.iter().enumerate() {
        index.entry(name.clone()).or_insert(i);
    }
    index
}

pub(crate) fn value_to_json(value: &SqlValue) -> JsonValue {
    match value {
        SqlValue::Null => JsonValue::Null,
        SqlValue::Bool(flag) => JsonValue::Bool(*flag),
        SqlValue::Int(n) => JsonValue::from(*n),
        SqlValue::Float(f) => JsonValue::from(*f),
        SqlValue::Text(text) => JsonValue::String(text.clone()),
        SqlValue::Timestamp(ts) => JsonValue::String(ts.to_rfc3339()),
        SqlValue::Blob(bytes) => JsonValue::String(crate::format::hex_encode(bytes)),
        SqlValue::Json(json) => json.clone(),
        SqlValue::Array(items) => JsonValue::Array(items.iter().map(value_to_json).collect()),
        SqlValue::Object(pairs) => JsonValue::Object(
            pairs
                .iter()
                .map(|(key, value)| (key.clone(), value_to_json(value)))
                .collect(),
        ),
    }
}

use chrono::{DateTime, FixedOffset};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Scalar and collection values that can be rendered as SQL literals or returned in result rows.
///
/// ```rust
/// use sql_loom::prelude::*;
///
/// let values = vec![
///     SqlValue::Int(1),
///     SqlValue::Text("alice".into()),
///     SqlValue::Bool(true),
/// ];
/// # let _ = values;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL (or an absent value)
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Timestamp with its original offset
    Timestamp(DateTime<FixedOffset>),
    /// Binary data
    Blob(Vec<u8>),
    /// JSON document, rendered as its serialized text
    Json(JsonValue),
    /// Ordered collection; nested arrays are allowed
    Array(Vec<SqlValue>),
    /// Structured key/value pairs, rendered as an assignment list
    Object(Vec<(String, SqlValue)>),
}

impl SqlValue {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let SqlValue::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let SqlValue::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<&bool> {
        if let SqlValue::Bool(value) = self {
            return Some(value);
        } else if let Some(i) = self.as_int() {
            if *i == 1 {
                return Some(&true);
            } else if *i == 0 {
                return Some(&false);
            }
        }
        None
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<DateTime<FixedOffset>> {
        if let SqlValue::Timestamp(value) = self {
            return Some(*value);
        } else if let Some(s) = self.as_text() {
            if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.3f %:z") {
                return Some(dt);
            }
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt);
            }
        }
        None
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            SqlValue::Float(value) => Some(*value),
            #[allow(clippy::cast_precision_loss)]
            SqlValue::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let SqlValue::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Int(i64::from(value))
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Float(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(SqlValue::Null, Into::into)
    }
}

impl From<DateTime<FixedOffset>> for SqlValue {
    fn from(value: DateTime<FixedOffset>) -> Self {
        SqlValue::Timestamp(value)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(value: Vec<u8>) -> Self {
        SqlValue::Blob(value)
    }
}

/// The SQL dialects the generator can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// `PostgreSQL`
    Postgres,
    /// `SQLite`
    Sqlite,
    /// `MySQL` / `MariaDB`
    Mysql,
    /// Oracle Database (no native LIMIT/OFFSET)
    Oracle,
}

impl Dialect {
    /// Human-readable backend name used in surfaced connection errors.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Dialect::Postgres => "POSTGRES",
            Dialect::Sqlite => "SQLITE",
            Dialect::Mysql => "MYSQL",
            Dialect::Oracle => "ORACLE",
        }
    }

    #[must_use]
    pub fn default_port(self) -> u16 {
        match self {
            Dialect::Postgres => 5432,
            Dialect::Sqlite => 0,
            Dialect::Mysql => 3306,
            Dialect::Oracle => 1521,
        }
    }
}

/// Which side of a replicated backend a connection or statement belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionRole {
    Read,
    Write,
}

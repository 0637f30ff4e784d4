use serde::{Deserialize, Serialize};

use crate::types::ConnectionRole;

/// Row shape handed back to callers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Objects keyed by column name
    #[default]
    Object,
    /// Positional arrays
    Array,
}

/// Per-statement execution settings. None of these affect compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecuteOptions {
    /// Rows kept from a result; 0 keeps everything.
    pub max_rows: usize,
    pub auto_commit: bool,
    pub output_format: OutputFormat,
    /// Advisory only: recorded with the job, admission stays FIFO.
    pub priority: i32,
    /// Overrides the role inferred from the statement.
    pub role: Option<ConnectionRole>,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            max_rows: 100,
            auto_commit: true,
            output_format: OutputFormat::Object,
            priority: 0,
            role: None,
        }
    }
}

impl ExecuteOptions {
    #[must_use]
    pub fn max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    #[must_use]
    pub fn auto_commit(mut self, auto_commit: bool) -> Self {
        self.auto_commit = auto_commit;
        self
    }

    #[must_use]
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    #[must_use]
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn role(mut self, role: ConnectionRole) -> Self {
        self.role = Some(role);
        self
    }

    /// The explicit role, or `Read` for `SELECT` statements and `Write` otherwise.
    #[must_use]
    pub fn role_for(&self, sql: &str) -> ConnectionRole {
        self.role.unwrap_or_else(|| infer_role(sql))
    }
}

fn infer_role(sql: &str) -> ConnectionRole {
    let head = sql.trim_start();
    let is_select = head
        .get(..6)
        .is_some_and(|keyword| keyword.eq_ignore_ascii_case("SELECT"));
    if is_select {
        ConnectionRole::Read
    } else {
        ConnectionRole::Write
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selects_route_to_readers() {
        let options = ExecuteOptions::default();
        assert_eq!(options.role_for("  select 1 from dual"), ConnectionRole::Read);
        assert_eq!(options.role_for("UPDATE t SET a = 1"), ConnectionRole::Write);
        assert_eq!(options.role_for("BEGIN NULL; END;"), ConnectionRole::Write);
        assert_eq!(
            options.role(ConnectionRole::Write).role_for("SELECT 1"),
            ConnectionRole::Write
        );
    }

    #[test]
    fn defaults() {
        let options = ExecuteOptions::default();
        assert_eq!(options.max_rows, 100);
        assert!(options.auto_commit);
        assert_eq!(options.output_format, OutputFormat::Object);
    }
}

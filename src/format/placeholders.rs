use std::collections::HashMap;

use super::ValueFormatter;
use super::scanner::{Placeholder, PlaceholderSyntax, substitute};
use crate::error::SqlLoomError;
use crate::types::SqlValue;

impl ValueFormatter {
    /// Replace `?` placeholders outside literals and comments with formatted
    /// values, in order. Placeholders beyond `values.len()` are left as they are.
    #[must_use]
    pub fn format_positional(&self, sql: &str, values: &[SqlValue]) -> String {
        let mut remaining = values.iter();
        let result: Result<String, std::convert::Infallible> =
            substitute(sql, PlaceholderSyntax::Positional, |_| {
                Ok(remaining.next().map(|value| self.format(value)))
            });
        match result {
            Ok(sql) => sql,
            Err(never) => match never {},
        }
    }

    /// Replace `:name` placeholders with the matching formatted value.
    ///
    /// Postgres casts (`::type`) are not placeholders.
    ///
    /// # Errors
    /// Returns `SqlLoomError::ConfigError` naming the first placeholder that has
    /// no entry in `params`.
    pub fn format_named(
        &self,
        sql: &str,
        params: &HashMap<String, SqlValue>,
    ) -> Result<String, SqlLoomError> {
        substitute(sql, PlaceholderSyntax::Named, |placeholder| match placeholder {
            Placeholder::Named(name) => params
                .get(name)
                .map(|value| Some(self.format(value)))
                .ok_or_else(|| {
                    SqlLoomError::config(format!(
                        "Named parameter \"{name}\" has no value in the given object."
                    ))
                }),
            Placeholder::Positional => Ok(None),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Dialect;

    #[test]
    fn positional_skips_quoted_question_marks() {
        let f = ValueFormatter::new(Dialect::Postgres);
        let sql = f.format_positional(
            "SELECT '?' AS q, \"?\" FROM t WHERE a = ? AND b = ? -- ?\n AND c = ?",
            &[SqlValue::Int(1), "x'y".into()],
        );
        assert_eq!(
            sql,
            "SELECT '?' AS q, \"?\" FROM t WHERE a = 1 AND b = 'x''y' -- ?\n AND c = ?"
        );
    }

    #[test]
    fn positional_keeps_multibyte_text_intact() {
        let f = ValueFormatter::new(Dialect::Sqlite);
        let sql = f.format_positional("SELECT 'héllo', ? /* ünï ? */", &[SqlValue::Int(7)]);
        assert_eq!(sql, "SELECT 'héllo', 7 /* ünï ? */");
    }

    #[test]
    fn named_placeholders_ignore_casts() {
        let f = ValueFormatter::new(Dialect::Postgres);
        let params = HashMap::from([
            ("id".to_string(), SqlValue::Int(5)),
            ("name".to_string(), SqlValue::from("bob")),
        ]);
        let sql = f
            .format_named("SELECT :id::int, ':id', $$ :name $$, :name", &params)
            .unwrap();
        assert_eq!(sql, "SELECT 5::int, ':id', $$ :name $$, 'bob'");
    }

    #[test]
    fn missing_named_parameter_is_a_config_error() {
        let f = ValueFormatter::new(Dialect::Oracle);
        let err = f
            .format_named("SELECT * FROM t WHERE id = :id", &HashMap::new())
            .unwrap_err();
        assert!(matches!(err, SqlLoomError::ConfigError(msg) if msg.contains("\"id\"")));
    }
}

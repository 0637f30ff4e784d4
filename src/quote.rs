//! Identifier quoting.
//!
//! Every table, column and alias that reaches generated SQL passes through
//! [`Quoter`]. The wildcard `*` is never quoted, and an embedded quote
//! character is doubled so identifiers cannot terminate early.

use crate::model::TableRef;
use crate::types::Dialect;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quoter {
    dialect: Dialect,
    quote_identifiers: bool,
}

impl Quoter {
    #[must_use]
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            quote_identifiers: true,
        }
    }

    /// Disable quoting so identifiers fold to the backend's default case.
    /// `force` on [`Quoter::quote_identifier`] still quotes.
    #[must_use]
    pub fn with_quote_identifiers(mut self, quote_identifiers: bool) -> Self {
        self.quote_identifiers = quote_identifiers;
        self
    }

    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    #[must_use]
    pub fn quote_identifier(&self, identifier: &str, force: bool) -> String {
        if identifier == "*" {
            return identifier.to_string();
        }
        let quote = self.dialect.supports().quote_char;
        if !force && !self.quote_identifiers {
            return remove_ticks(identifier, quote);
        }
        add_ticks(identifier, quote)
    }

    /// Quote a possibly-qualified name (`table.column`) part by part.
    #[must_use]
    pub fn quote_identifiers(&self, identifiers: &str) -> String {
        if identifiers.contains('.') {
            identifiers
                .split('.')
                .map(|part| self.quote_identifier(part, false))
                .collect::<Vec<_>>()
                .join(".")
        } else {
            self.quote_identifier(identifiers, false)
        }
    }

    /// Quote a table reference, prefixing its schema and appending an alias when given.
    #[must_use]
    pub fn quote_table(&self, table: &TableRef, alias: Option<&str>) -> String {
        let mut quoted = match &table.schema {
            Some(schema) if self.dialect.supports().schemas => format!(
                "{}.{}",
                self.quote_identifier(schema, false),
                self.quote_identifier(&table.name, false)
            ),
            Some(schema) => {
                let delimiter = table.delimiter.as_deref().unwrap_or(".");
                self.quote_identifier(&format!("{schema}{delimiter}{}", table.name), false)
            }
            None => self.quote_identifier(&table.name, false),
        };
        if let Some(alias) = alias {
            quoted.push(' ');
            quoted.push_str(&self.quote_identifier(alias, false));
        }
        quoted
    }

    /// Shorthand for quoting a bare table or alias name.
    #[must_use]
    pub fn quote_name(&self, name: &str) -> String {
        self.quote_identifier(name, false)
    }
}

fn remove_ticks(identifier: &str, quote: char) -> String {
    identifier.chars().filter(|c| *c != quote).collect()
}

fn add_ticks(identifier: &str, quote: char) -> String {
    let mut out = String::with_capacity(identifier.len() + 2);
    out.push(quote);
    for c in identifier.chars() {
        if c == quote {
            out.push(quote);
        }
        out.push(c);
    }
    out.push(quote);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_embedded_quotes() {
        let q = Quoter::new(Dialect::Oracle);
        assert_eq!(q.quote_identifier("we\"ird", false), "\"we\"\"ird\"");
        let mysql = Quoter::new(Dialect::Mysql);
        assert_eq!(mysql.quote_identifier("a`b", false), "`a``b`");
    }

    #[test]
    fn wildcard_passes_through() {
        assert_eq!(Quoter::new(Dialect::Postgres).quote_identifier("*", true), "*");
    }

    #[test]
    fn unquoted_mode_strips_and_force_overrides() {
        let q = Quoter::new(Dialect::Oracle).with_quote_identifiers(false);
        assert_eq!(q.quote_identifier("\"Users\"", false), "Users");
        assert_eq!(q.quote_identifier("Users", true), "\"Users\"");
    }

    #[test]
    fn tables_with_schema_and_alias() {
        let table = TableRef::new("users").with_schema("app");
        assert_eq!(
            Quoter::new(Dialect::Postgres).quote_table(&table, Some("u")),
            "\"app\".\"users\" \"u\""
        );
        assert_eq!(
            Quoter::new(Dialect::Sqlite).quote_table(&table, None),
            "\"app.users\""
        );
    }

    #[test]
    fn dotted_names_quote_each_part() {
        assert_eq!(
            Quoter::new(Dialect::Postgres).quote_identifiers("posts.title"),
            "\"posts\".\"title\""
        );
    }
}

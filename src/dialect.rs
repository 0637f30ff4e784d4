use crate::types::Dialect;

/// How string literals escape embedded quotes and control characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringEscape {
    /// `'` becomes `''`
    DoubledQuote,
    /// Control and quote characters become backslash escapes
    Backslash,
}

/// How boolean literals are spelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolStyle {
    /// `true` / `false`
    Keyword,
    /// `1` / `0`
    Numeric,
}

/// Capability table consulted by the formatter and the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialectSupports {
    pub native_limit: bool,
    pub schemas: bool,
    pub lock: bool,
    pub lock_key: bool,
    pub lock_of: bool,
    /// Clause appended for a share-mode lock request.
    pub for_share: &'static str,
    pub quote_char: char,
    pub string_escape: StringEscape,
    pub bool_style: BoolStyle,
    pub native_arrays: bool,
    /// Whether NULL literals need an explicit type.
    pub typed_null: bool,
    /// INSERT form used when no column values are supplied.
    pub default_values: &'static str,
}

impl Dialect {
    #[must_use]
    pub fn supports(self) -> DialectSupports {
        match self {
            Dialect::Postgres => DialectSupports {
                native_limit: true,
                schemas: true,
                lock: true,
                lock_key: true,
                lock_of: true,
                for_share: "FOR SHARE",
                quote_char: '"',
                string_escape: StringEscape::DoubledQuote,
                bool_style: BoolStyle::Keyword,
                native_arrays: true,
                typed_null: false,
                default_values: "DEFAULT VALUES",
            },
            Dialect::Sqlite => DialectSupports {
                native_limit: true,
                schemas: false,
                lock: false,
                lock_key: false,
                lock_of: false,
                for_share: "",
                quote_char: '"',
                string_escape: StringEscape::DoubledQuote,
                bool_style: BoolStyle::Numeric,
                native_arrays: false,
                typed_null: false,
                default_values: "DEFAULT VALUES",
            },
            Dialect::Mysql => DialectSupports {
                native_limit: true,
                schemas: false,
                lock: true,
                lock_key: false,
                lock_of: false,
                for_share: "LOCK IN SHARE MODE",
                quote_char: '`',
                string_escape: StringEscape::Backslash,
                bool_style: BoolStyle::Keyword,
                native_arrays: false,
                typed_null: false,
                default_values: "VALUES ()",
            },
            Dialect::Oracle => DialectSupports {
                native_limit: false,
                schemas: true,
                lock: true,
                lock_key: false,
                lock_of: true,
                for_share: "FOR UPDATE",
                quote_char: '"',
                string_escape: StringEscape::DoubledQuote,
                bool_style: BoolStyle::Numeric,
                native_arrays: false,
                typed_null: true,
                default_values: "VALUES (DEFAULT)",
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_oracle_emulates_pagination() {
        for dialect in [Dialect::Postgres, Dialect::Sqlite, Dialect::Mysql] {
            assert!(dialect.supports().native_limit, "{dialect:?}");
        }
        assert!(!Dialect::Oracle.supports().native_limit);
    }
}

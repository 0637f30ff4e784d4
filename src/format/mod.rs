//! SQL literal formatting.
//!
//! [`ValueFormatter`] turns [`SqlValue`]s and [`Expr`]s into literal text for one
//! dialect. Strings are always escaped before being wrapped in quotes; the only
//! way to emit unescaped text is an explicit [`Expr::Literal`] or [`Expr::Raw`].

mod escape;
mod placeholders;
mod scanner;

use chrono::{DateTime, FixedOffset};

use crate::dialect::{BoolStyle, StringEscape};
use crate::expr::{ColumnRef, Expr};
use crate::quote::Quoter;
use crate::types::{Dialect, SqlValue};

pub use escape::{escape_backslash, escape_doubled, hex_encode};

const ORACLE_TIMESTAMP_MASK: &str = "YYYY-MM-DD HH24:MI:SS.FF3 TZH:TZM";
const ORACLE_UNTYPED_NULL: &str = "VARCHAR2(1)";

#[derive(Debug, Clone, Copy)]
pub struct ValueFormatter {
    dialect: Dialect,
    time_zone: FixedOffset,
    quoter: Quoter,
}

impl ValueFormatter {
    #[must_use]
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            time_zone: utc(),
            quoter: Quoter::new(dialect),
        }
    }

    /// Session time zone that timestamps are converted into before formatting.
    #[must_use]
    pub fn with_time_zone(mut self, time_zone: FixedOffset) -> Self {
        self.time_zone = time_zone;
        self
    }

    #[must_use]
    pub fn with_quoter(mut self, quoter: Quoter) -> Self {
        self.quoter = quoter;
        self
    }

    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    #[must_use]
    pub fn quoter(&self) -> &Quoter {
        &self.quoter
    }

    #[must_use]
    pub fn format(&self, value: &SqlValue) -> String {
        self.format_typed(value, None)
    }

    /// Format `value`, using `type_hint` (a column type such as `VARCHAR(20)`)
    /// where the dialect needs one.
    #[must_use]
    pub fn format_typed(&self, value: &SqlValue, type_hint: Option<&str>) -> String {
        let supports = self.dialect.supports();
        match value {
            SqlValue::Null if supports.typed_null => {
                format!("CAST(NULL AS {})", type_hint.unwrap_or(ORACLE_UNTYPED_NULL))
            }
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Bool(flag) => match supports.bool_style {
                BoolStyle::Keyword => flag.to_string(),
                BoolStyle::Numeric => u8::from(*flag).to_string(),
            },
            SqlValue::Int(n) => n.to_string(),
            SqlValue::Float(f) if f.is_finite() => f.to_string(),
            SqlValue::Float(_) => self.format_typed(&SqlValue::Null, type_hint),
            SqlValue::Text(text) => self.escape_string(text),
            SqlValue::Json(json) => self.escape_string(&json.to_string()),
            SqlValue::Timestamp(date) => self.format_date(date),
            SqlValue::Blob(bytes) => self.format_blob(bytes),
            SqlValue::Array(items) => self.array_to_list(items, type_hint),
            SqlValue::Object(pairs) => self.object_to_values(pairs),
        }
    }

    /// Escape and quote a string literal.
    #[must_use]
    pub fn escape_string(&self, text: &str) -> String {
        let escaped = match self.dialect.supports().string_escape {
            StringEscape::DoubledQuote => escape_doubled(text),
            StringEscape::Backslash => escape_backslash(text),
        };
        format!("'{escaped}'")
    }

    /// Timestamp text in the session time zone, without quoting.
    #[must_use]
    pub fn date_to_string(&self, date: &DateTime<FixedOffset>) -> String {
        let local = date.with_timezone(&self.time_zone);
        match self.dialect {
            Dialect::Mysql => local.format("%Y-%m-%d %H:%M:%S").to_string(),
            _ => local.format("%Y-%m-%d %H:%M:%S%.3f %:z").to_string(),
        }
    }

    fn format_date(&self, date: &DateTime<FixedOffset>) -> String {
        let literal = self.escape_string(&self.date_to_string(date));
        if self.dialect == Dialect::Oracle {
            format!("TO_TIMESTAMP_TZ({literal},'{ORACLE_TIMESTAMP_MASK}')")
        } else {
            literal
        }
    }

    fn format_blob(&self, bytes: &[u8]) -> String {
        let hex = hex_encode(bytes);
        if self.dialect == Dialect::Postgres {
            format!("E'\\\\x{hex}'")
        } else {
            format!("X'{hex}'")
        }
    }

    fn array_to_list(&self, items: &[SqlValue], type_hint: Option<&str>) -> String {
        if self.dialect.supports().native_arrays {
            let inner = items
                .iter()
                .map(|item| self.format(item))
                .collect::<Vec<_>>()
                .join(",");
            let mut out = format!("ARRAY[{inner}]");
            if let Some(hint) = type_hint {
                out.push_str("::");
                out.push_str(&strip_length_modifiers(hint));
            }
            return out;
        }
        items
            .iter()
            .map(|item| match item {
                SqlValue::Array(nested) => format!("({})", self.array_to_list(nested, None)),
                other => self.format(other),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn object_to_values(&self, pairs: &[(String, SqlValue)]) -> String {
        pairs
            .iter()
            .map(|(key, value)| {
                format!(
                    "{} = {}",
                    self.quoter.quote_identifier(key, false),
                    self.format(value)
                )
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Render any expression. Literal and raw fragments are trusted verbatim.
    #[must_use]
    pub fn format_expr(&self, expr: &Expr) -> String {
        match expr {
            Expr::Literal(sql) | Expr::Raw(sql) => sql.clone(),
            Expr::Column(column) => self.format_column(column),
            Expr::Function { name, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.format_expr(arg))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{name}({args})")
            }
            Expr::Cast { expr, type_name } => {
                format!("CAST({} AS {})", self.format_expr(expr), type_name.to_uppercase())
            }
            Expr::Value(value) => self.format(value),
        }
    }

    #[must_use]
    pub fn format_column(&self, column: &ColumnRef) -> String {
        let name = self.quoter.quote_identifier(&column.column, false);
        match &column.table {
            Some(table) => format!("{}.{name}", self.quoter.quote_identifier(table, false)),
            None => name,
        }
    }
}

fn utc() -> FixedOffset {
    FixedOffset::east_opt(0).unwrap_or_else(|| unreachable!("zero offset is always valid"))
}

/// `VARCHAR(255)[]` → `VARCHAR[]`
fn strip_length_modifiers(type_name: &str) -> String {
    let mut out = String::with_capacity(type_name.len());
    let mut chars = type_name.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '(' {
            let mut digits = String::new();
            while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                digits.push(d);
                chars.next();
            }
            if !digits.is_empty() && chars.peek() == Some(&')') {
                chars.next();
                continue;
            }
            out.push('(');
            out.push_str(&digits);
            continue;
        }
        out.push(c);
    }
    out
}

use crate::types::SqlValue;

/// A column, optionally qualified by the table or alias it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRef {
    pub table: Option<String>,
    pub column: String,
}

impl ColumnRef {
    #[must_use]
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            table: None,
            column: column.into(),
        }
    }

    #[must_use]
    pub fn qualified(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            column: column.into(),
        }
    }
}

/// Every value position in a query description holds one of these.
///
/// `Literal` and `Raw` are emitted verbatim; callers vouch for their safety.
/// `Literal` is user-written SQL, `Raw` is text produced by the generator
/// itself (for example a correlated subquery).
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(String),
    Column(ColumnRef),
    Function { name: String, args: Vec<Expr> },
    Cast { expr: Box<Expr>, type_name: String },
    Value(SqlValue),
    Raw(String),
}

impl Expr {
    #[must_use]
    pub fn literal(sql: impl Into<String>) -> Self {
        Expr::Literal(sql.into())
    }

    #[must_use]
    pub fn col(column: impl Into<String>) -> Self {
        Expr::Column(ColumnRef::new(column))
    }

    #[must_use]
    pub fn qualified(table: impl Into<String>, column: impl Into<String>) -> Self {
        Expr::Column(ColumnRef::qualified(table, column))
    }

    #[must_use]
    pub fn func(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Function {
            name: name.into(),
            args,
        }
    }

    #[must_use]
    pub fn cast(expr: Expr, type_name: impl Into<String>) -> Self {
        Expr::Cast {
            expr: Box::new(expr),
            type_name: type_name.into(),
        }
    }

    #[must_use]
    pub fn value(value: impl Into<SqlValue>) -> Self {
        Expr::Value(value.into())
    }

    /// Function calls and casts compute a value that has no model attribute name.
    #[must_use]
    pub fn is_computed(&self) -> bool {
        matches!(self, Expr::Function { .. } | Expr::Cast { .. })
    }
}

impl From<SqlValue> for Expr {
    fn from(value: SqlValue) -> Self {
        Expr::Value(value)
    }
}

use crate::error::SqlLoomError;
use crate::expr::Expr;

const DIRECTIONS: [&str; 8] = [
    "ASC",
    "DESC",
    "ASC NULLS LAST",
    "DESC NULLS LAST",
    "ASC NULLS FIRST",
    "DESC NULLS FIRST",
    "NULLS FIRST",
    "NULLS LAST",
];

/// One ORDER BY term.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderItem {
    /// An attribute of the main model (empty `path`) or of the include reached
    /// through the alias `path`.
    Column {
        path: Vec<String>,
        name: String,
        direction: Option<String>,
    },
    Expr {
        expr: Expr,
        direction: Option<String>,
    },
    /// Emitted verbatim in the outer query.
    Raw(String),
}

impl OrderItem {
    #[must_use]
    pub fn column(name: impl Into<String>) -> Self {
        OrderItem::Column {
            path: Vec::new(),
            name: name.into(),
            direction: None,
        }
    }

    /// Order by an attribute of an included association, e.g. `(["posts"], "title")`.
    #[must_use]
    pub fn include_column<P: Into<String>>(
        path: impl IntoIterator<Item = P>,
        name: impl Into<String>,
    ) -> Self {
        OrderItem::Column {
            path: path.into_iter().map(Into::into).collect(),
            name: name.into(),
            direction: None,
        }
    }

    #[must_use]
    pub fn expr(expr: Expr) -> Self {
        OrderItem::Expr {
            expr,
            direction: None,
        }
    }

    #[must_use]
    pub fn raw(sql: impl Into<String>) -> Self {
        OrderItem::Raw(sql.into())
    }

    /// Set the direction text; it is validated at compile time.
    #[must_use]
    pub fn direction(mut self, value: impl Into<String>) -> Self {
        match &mut self {
            OrderItem::Column { direction, .. } | OrderItem::Expr { direction, .. } => {
                *direction = Some(value.into());
            }
            OrderItem::Raw(_) => {}
        }
        self
    }

    #[must_use]
    pub fn asc(self) -> Self {
        self.direction("ASC")
    }

    #[must_use]
    pub fn desc(self) -> Self {
        self.direction("DESC")
    }

    pub(crate) fn direction_text(&self) -> Option<&str> {
        match self {
            OrderItem::Column { direction, .. } | OrderItem::Expr { direction, .. } => {
                direction.as_deref()
            }
            OrderItem::Raw(_) => None,
        }
    }
}

/// Normalize an ORDER BY direction to upper case.
///
/// # Errors
/// Returns `SqlLoomError::ConfigError` for anything but `ASC`, `DESC` and their
/// `NULLS FIRST`/`NULLS LAST` forms.
pub fn validate_direction(direction: &str) -> Result<String, SqlLoomError> {
    let upper = direction.trim().to_uppercase();
    if DIRECTIONS.contains(&upper.as_str()) {
        Ok(upper)
    } else {
        Err(SqlLoomError::config(format!(
            "Order must be 'ASC' or 'DESC', '{direction}' given"
        )))
    }
}

use super::QueryGenerator;
use crate::expr::Expr;
use crate::model::ModelMeta;
use crate::types::SqlValue;

/// Comparison applied to one attribute in a [`Predicate::Attrs`] map.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `=`; a NULL value renders `IS NULL` and an array renders `IN (...)`.
    Eq(Expr),
    /// `!=`; a NULL value renders `IS NOT NULL` and an array renders `NOT IN (...)`.
    Ne(Expr),
    Gt(Expr),
    Gte(Expr),
    Lt(Expr),
    Lte(Expr),
    In(Vec<SqlValue>),
    NotIn(Vec<SqlValue>),
    Like(String),
    NotLike(String),
    Between(SqlValue, SqlValue),
    IsNull,
    IsNotNull,
}

impl Condition {
    /// Equality against a plain value.
    #[must_use]
    pub fn eq(value: impl Into<SqlValue>) -> Self {
        Condition::Eq(Expr::Value(value.into()))
    }

    #[must_use]
    pub fn ne(value: impl Into<SqlValue>) -> Self {
        Condition::Ne(Expr::Value(value.into()))
    }
}

/// Filter tree used for WHERE and HAVING.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Emitted verbatim.
    Raw(String),
    /// Conjunction of per-attribute conditions. Keys are attribute names, or
    /// `alias.column` to address a joined table directly.
    Attrs(Vec<(String, Condition)>),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    #[must_use]
    pub fn raw(sql: impl Into<String>) -> Self {
        Predicate::Raw(sql.into())
    }

    /// Single `key = value` condition.
    #[must_use]
    pub fn eq(key: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Predicate::Attrs(vec![(key.into(), Condition::eq(value))])
    }

    #[must_use]
    pub fn attr(key: impl Into<String>, condition: Condition) -> Self {
        Predicate::Attrs(vec![(key.into(), condition)])
    }

    #[must_use]
    pub fn attrs<K: Into<String>>(pairs: impl IntoIterator<Item = (K, Condition)>) -> Self {
        Predicate::Attrs(pairs.into_iter().map(|(k, c)| (k.into(), c)).collect())
    }

    #[must_use]
    pub fn and(items: Vec<Predicate>) -> Self {
        Predicate::And(items)
    }

    #[must_use]
    pub fn or(items: Vec<Predicate>) -> Self {
        Predicate::Or(items)
    }

    #[allow(clippy::should_implement_trait)]
    #[must_use]
    pub fn not(inner: Predicate) -> Self {
        Predicate::Not(Box::new(inner))
    }
}

/// Where attribute keys resolve: the alias to qualify with and the model
/// mapping attribute names to columns.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct WhereScope<'a> {
    pub table: Option<&'a str>,
    pub model: Option<&'a ModelMeta>,
}

struct Fragment {
    sql: String,
    compound: bool,
}

impl Fragment {
    fn atom(sql: String) -> Self {
        Self {
            sql,
            compound: false,
        }
    }

    fn grouped(self) -> String {
        if self.compound {
            format!("({})", self.sql)
        } else {
            self.sql
        }
    }
}

impl QueryGenerator {
    /// Render a predicate, or `None` when it places no restriction.
    pub(crate) fn where_conditions(
        &self,
        predicate: &Predicate,
        scope: WhereScope<'_>,
    ) -> Option<String> {
        self.render_predicate(predicate, scope).map(|f| f.sql)
    }

    /// Like [`Self::where_conditions`], parenthesized when it will be ANDed
    /// with other terms and has more than one.
    pub(crate) fn where_term(&self, predicate: &Predicate, scope: WhereScope<'_>) -> Option<String> {
        self.render_predicate(predicate, scope).map(Fragment::grouped)
    }

    fn render_predicate(&self, predicate: &Predicate, scope: WhereScope<'_>) -> Option<Fragment> {
        match predicate {
            Predicate::Raw(sql) if sql.trim().is_empty() => None,
            Predicate::Raw(sql) => Some(Fragment::atom(sql.clone())),
            Predicate::Attrs(pairs) => {
                let parts: Vec<Fragment> = pairs
                    .iter()
                    .map(|(key, condition)| Fragment::atom(self.render_condition(key, condition, scope)))
                    .collect();
                join_fragments(parts, " AND ")
            }
            Predicate::And(items) => join_fragments(
                items
                    .iter()
                    .filter_map(|item| self.render_predicate(item, scope))
                    .collect(),
                " AND ",
            ),
            Predicate::Or(items) => {
                let parts: Vec<Fragment> = items
                    .iter()
                    .filter_map(|item| self.render_predicate(item, scope))
                    .collect();
                if parts.is_empty() {
                    return Some(Fragment::atom("0 = 1".to_string()));
                }
                join_fragments(parts, " OR ")
            }
            Predicate::Not(inner) => self
                .render_predicate(inner, scope)
                .map(|f| Fragment::atom(format!("NOT ({})", f.sql))),
        }
    }

    fn render_key(&self, key: &str, scope: WhereScope<'_>) -> String {
        if key.contains('.') {
            return self.quoter.quote_identifiers(key);
        }
        let column = scope.model.map_or(key, |model| model.column_of(key));
        match scope.table {
            Some(table) => self.qualified(table, column),
            None => self.quote(column),
        }
    }

    fn render_condition(&self, key: &str, condition: &Condition, scope: WhereScope<'_>) -> String {
        let column = self.render_key(key, scope);
        let binary = |op: &str, expr: &Expr| format!("{column} {op} {}", self.formatter.format_expr(expr));
        match condition {
            Condition::Eq(Expr::Value(SqlValue::Null)) | Condition::IsNull => {
                format!("{column} IS NULL")
            }
            Condition::Ne(Expr::Value(SqlValue::Null)) | Condition::IsNotNull => {
                format!("{column} IS NOT NULL")
            }
            Condition::Eq(Expr::Value(SqlValue::Array(items))) => self.in_list(&column, "IN", items),
            Condition::Ne(Expr::Value(SqlValue::Array(items))) => {
                self.in_list(&column, "NOT IN", items)
            }
            Condition::Eq(expr) => binary("=", expr),
            Condition::Ne(expr) => binary("!=", expr),
            Condition::Gt(expr) => binary(">", expr),
            Condition::Gte(expr) => binary(">=", expr),
            Condition::Lt(expr) => binary("<", expr),
            Condition::Lte(expr) => binary("<=", expr),
            Condition::In(items) => self.in_list(&column, "IN", items),
            Condition::NotIn(items) => self.in_list(&column, "NOT IN", items),
            Condition::Like(pattern) => {
                format!("{column} LIKE {}", self.formatter.escape_string(pattern))
            }
            Condition::NotLike(pattern) => {
                format!("{column} NOT LIKE {}", self.formatter.escape_string(pattern))
            }
            Condition::Between(low, high) => format!(
                "{column} BETWEEN {} AND {}",
                self.formatter.format(low),
                self.formatter.format(high)
            ),
        }
    }

    fn in_list(&self, column: &str, op: &str, items: &[SqlValue]) -> String {
        if items.is_empty() {
            // `x IN ()` is a syntax error; NULL never matches.
            return if op == "IN" {
                format!("{column} IN (NULL)")
            } else {
                "1 = 1".to_string()
            };
        }
        let values = items
            .iter()
            .map(|item| self.formatter.format(item))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{column} {op} ({values})")
    }
}

fn join_fragments(parts: Vec<Fragment>, separator: &str) -> Option<Fragment> {
    match parts.len() {
        0 => None,
        1 => parts.into_iter().next(),
        _ => Some(Fragment {
            sql: parts
                .into_iter()
                .map(Fragment::grouped)
                .collect::<Vec<_>>()
                .join(separator),
            compound: true,
        }),
    }
}

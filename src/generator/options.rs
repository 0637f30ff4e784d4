use crate::expr::Expr;

use super::include::Include;
use super::lock::Lock;
use super::order::OrderItem;
use super::predicate::Predicate;

/// One selected attribute: a model attribute name, a qualified column or a
/// computed expression, optionally aliased.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl Attribute {
    /// A model attribute by name; the generator maps it to its column.
    #[must_use]
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            expr: Expr::col(name),
            alias: None,
        }
    }

    #[must_use]
    pub fn expr(expr: Expr) -> Self {
        Self { expr, alias: None }
    }

    #[must_use]
    pub fn aliased(expr: Expr, alias: impl Into<String>) -> Self {
        Self {
            expr,
            alias: Some(alias.into()),
        }
    }

    /// The attribute name this selection is reported under, if it has one.
    pub(crate) fn exposed_name(&self) -> Option<&str> {
        if let Some(alias) = &self.alias {
            return Some(alias);
        }
        match &self.expr {
            Expr::Column(column) => Some(&column.column),
            _ => None,
        }
    }
}

impl From<&str> for Attribute {
    fn from(name: &str) -> Self {
        Attribute::name(name)
    }
}

/// Everything a SELECT can ask for.
///
/// ```rust
/// use sql_loom::prelude::*;
///
/// let options = SelectOptions::new()
///     .attributes(["id", "name"])
///     .filter(Predicate::eq("name", "ann"))
///     .order(OrderItem::column("id").desc())
///     .limit(10);
/// # let _ = options;
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectOptions {
    /// `None` selects every column.
    pub attributes: Option<Vec<Attribute>>,
    pub filter: Option<Predicate>,
    pub include: Vec<Include>,
    pub group: Vec<Expr>,
    pub having: Option<Predicate>,
    pub order: Vec<OrderItem>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub lock: Option<Lock>,
    /// Force subquery mode on or off; by default it is on when a limit is
    /// combined with a one-to-many include.
    pub sub_query: Option<bool>,
    /// Alias for the main table; defaults to the model name.
    pub table_as: Option<String>,
}

impl SelectOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn attributes<A: Into<Attribute>>(mut self, attributes: impl IntoIterator<Item = A>) -> Self {
        self.attributes = Some(attributes.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.get_or_insert_with(Vec::new).push(attribute);
        self
    }

    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(predicate);
        self
    }

    #[must_use]
    pub fn include(mut self, include: Include) -> Self {
        self.include.push(include);
        self
    }

    #[must_use]
    pub fn group(mut self, expr: Expr) -> Self {
        self.group.push(expr);
        self
    }

    #[must_use]
    pub fn having(mut self, predicate: Predicate) -> Self {
        self.having = Some(predicate);
        self
    }

    #[must_use]
    pub fn order(mut self, item: OrderItem) -> Self {
        self.order.push(item);
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    #[must_use]
    pub fn lock(mut self, lock: Lock) -> Self {
        self.lock = Some(lock);
        self
    }

    #[must_use]
    pub fn sub_query(mut self, sub_query: bool) -> Self {
        self.sub_query = Some(sub_query);
        self
    }

    #[must_use]
    pub fn table_as(mut self, alias: impl Into<String>) -> Self {
        self.table_as = Some(alias.into());
        self
    }

    /// Whether any include in the tree can multiply parent rows.
    #[must_use]
    pub fn has_multi_association(&self) -> bool {
        self.include.iter().any(Include::has_multi_association)
    }
}

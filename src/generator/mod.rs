//! Statement compiler.
//!
//! [`QueryGenerator`] turns a table, a [`SelectOptions`] tree and model metadata
//! into one SQL string. Compilation is pure: it never touches a connection and
//! the same input always yields the same text.

mod ddl;
mod dml;
mod include;
mod joins;
mod lock;
mod options;
mod order;
mod pagination;
mod predicate;
mod select;

use chrono::FixedOffset;

use crate::format::ValueFormatter;
use crate::quote::Quoter;
use crate::types::Dialect;

pub use ddl::{CreateTableOptions, UniqueKey};
pub use include::{Include, ThroughOptions};
pub use lock::{Lock, LockLevel};
pub use options::{Attribute, SelectOptions};
pub use order::{OrderItem, validate_direction};
pub use pagination::Pagination;
pub use predicate::{Condition, Predicate};

#[derive(Debug, Clone, Copy)]
pub struct QueryGenerator {
    dialect: Dialect,
    quoter: Quoter,
    formatter: ValueFormatter,
}

impl QueryGenerator {
    #[must_use]
    pub fn new(dialect: Dialect) -> Self {
        let quoter = Quoter::new(dialect);
        Self {
            dialect,
            quoter,
            formatter: ValueFormatter::new(dialect).with_quoter(quoter),
        }
    }

    /// Emit unquoted identifiers so the backend folds their case.
    #[must_use]
    pub fn with_quote_identifiers(mut self, quote_identifiers: bool) -> Self {
        self.quoter = self.quoter.with_quote_identifiers(quote_identifiers);
        self.formatter = self.formatter.with_quoter(self.quoter);
        self
    }

    #[must_use]
    pub fn with_time_zone(mut self, time_zone: FixedOffset) -> Self {
        self.formatter = self.formatter.with_time_zone(time_zone);
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
    pub fn formatter(&self) -> &ValueFormatter {
        &self.formatter
    }

    fn quote(&self, identifier: &str) -> String {
        self.quoter.quote_identifier(identifier, false)
    }

    /// `"table"."column"`
    fn qualified(&self, table: &str, column: &str) -> String {
        format!("{}.{}", self.quote(table), self.quote(column))
    }
}

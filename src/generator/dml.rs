use tracing::debug;

use super::QueryGenerator;
use super::predicate::{Predicate, WhereScope};
use crate::error::SqlLoomError;
use crate::model::{ModelMeta, TableRef};
use crate::types::{Dialect, SqlValue};

impl QueryGenerator {
    /// `INSERT INTO t (cols) VALUES (...)`.
    ///
    /// NULL values for auto-increment columns are left out so the backend
    /// assigns them. With nothing left, the dialect's default-row form is used.
    #[must_use]
    pub fn insert_query(
        &self,
        table: &TableRef,
        values: &[(String, SqlValue)],
        model: Option<&ModelMeta>,
    ) -> String {
        let mut columns = Vec::with_capacity(values.len());
        let mut literals = Vec::with_capacity(values.len());
        for (name, value) in values {
            let attribute = model.and_then(|m| m.get(name));
            if value.is_null() && attribute.is_some_and(|attr| attr.auto_increment) {
                continue;
            }
            columns.push(self.quote(attribute.map_or(name.as_str(), |attr| attr.column())));
            literals.push(self.typed_value(value, model, name));
        }

        let table = self.quoter.quote_table(table, None);
        let sql = if columns.is_empty() {
            format!("INSERT INTO {table} {}", self.dialect.supports().default_values)
        } else {
            format!(
                "INSERT INTO {table} ({}) VALUES ({})",
                columns.join(", "),
                literals.join(", ")
            )
        };
        debug!(sql = %sql, "compiled insert");
        sql
    }

    /// `UPDATE t SET a = v, ... [WHERE ...]`.
    ///
    /// # Errors
    /// Returns `SqlLoomError::ConfigError` when `values` is empty.
    pub fn update_query(
        &self,
        table: &TableRef,
        values: &[(String, SqlValue)],
        filter: Option<&Predicate>,
        model: Option<&ModelMeta>,
    ) -> Result<String, SqlLoomError> {
        if values.is_empty() {
            return Err(SqlLoomError::config("UPDATE needs at least one value to set"));
        }
        let assignments = values
            .iter()
            .map(|(name, value)| {
                let column = model.map_or(name.as_str(), |m| m.column_of(name));
                format!("{} = {}", self.quote(column), self.typed_value(value, model, name))
            })
            .collect::<Vec<_>>()
            .join(", ");

        let mut sql = format!(
            "UPDATE {} SET {assignments}",
            self.quoter.quote_table(table, None)
        );
        if let Some(filter) = filter.and_then(|f| self.where_conditions(f, unqualified(model))) {
            sql.push_str(" WHERE ");
            sql.push_str(&filter);
        }
        debug!(sql = %sql, "compiled update");
        Ok(sql)
    }

    /// `DELETE FROM t [WHERE ...]`, optionally capped at `limit` rows.
    ///
    /// # Errors
    /// Returns `SqlLoomError::ConfigError` when a limit is requested on a
    /// dialect that needs the primary key to express it and no model is given.
    pub fn delete_query(
        &self,
        table: &TableRef,
        filter: Option<&Predicate>,
        limit: Option<u64>,
        model: Option<&ModelMeta>,
    ) -> Result<String, SqlLoomError> {
        let quoted = self.quoter.quote_table(table, None);
        let condition = filter.and_then(|f| self.where_conditions(f, unqualified(model)));
        let where_clause = |condition: Option<String>| {
            condition.map_or_else(String::new, |c| format!(" WHERE {c}"))
        };

        let sql = match (limit, self.dialect) {
            (None, _) => format!("DELETE FROM {quoted}{}", where_clause(condition)),
            (Some(limit), Dialect::Mysql) => {
                format!("DELETE FROM {quoted}{} LIMIT {limit}", where_clause(condition))
            }
            (Some(limit), Dialect::Oracle) => {
                let rownum = format!("ROWNUM <= {limit}");
                let condition = match filter.and_then(|f| self.where_term(f, unqualified(model))) {
                    Some(c) => format!("{c} AND {rownum}"),
                    None => rownum,
                };
                format!("DELETE FROM {quoted} WHERE {condition}")
            }
            (Some(limit), Dialect::Postgres | Dialect::Sqlite) => {
                let model = model.ok_or_else(|| {
                    SqlLoomError::config("DELETE with a limit needs model metadata for the primary key")
                })?;
                let pk = self.quote(model.primary_key_column());
                format!(
                    "DELETE FROM {quoted} WHERE {pk} IN (SELECT {pk} FROM {quoted}{} LIMIT {limit})",
                    where_clause(condition)
                )
            }
        };
        debug!(sql = %sql, "compiled delete");
        Ok(sql)
    }

    fn typed_value(&self, value: &SqlValue, model: Option<&ModelMeta>, name: &str) -> String {
        let hint = model
            .and_then(|m| m.get(name))
            .map(|attr| attr.data_type.to_sql(self.dialect));
        self.formatter.format_typed(value, hint.as_deref())
    }
}

fn unqualified(model: Option<&ModelMeta>) -> WhereScope<'_> {
    WhereScope { table: None, model }
}

use tracing::debug;

use super::QueryGenerator;
use crate::error::SqlLoomError;
use crate::format::escape_doubled;
use crate::model::{AttributeMeta, DataType, ModelMeta, TableRef};
use crate::types::Dialect;

/// A multi-column unique constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UniqueKey {
    /// Constraint name; defaults to `uniq_<table>_<fields>`.
    pub name: Option<String>,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateTableOptions {
    pub comment: Option<String>,
    pub unique_keys: Vec<UniqueKey>,
}

/// A rendered column with the parts some dialects move out of line.
struct ColumnDefinition {
    column: String,
    body: String,
    primary_key: bool,
    auto_increment: bool,
    references: Option<String>,
}

impl QueryGenerator {
    /// Column definition for one attribute: type, constraints and foreign key.
    ///
    /// # Errors
    /// Returns `SqlLoomError::ConfigError` for an ENUM without values.
    pub fn attribute_to_sql(&self, attribute: &AttributeMeta) -> Result<String, SqlLoomError> {
        let def = self.column_definition(attribute)?;
        let mut sql = def.body;
        if def.primary_key {
            sql.push_str(" PRIMARY KEY");
            if def.auto_increment && self.dialect == Dialect::Sqlite {
                sql.push_str(" AUTOINCREMENT");
            }
        }
        if let Some(references) = def.references {
            sql.push(' ');
            sql.push_str(&references);
        }
        Ok(sql)
    }

    fn column_definition(&self, attribute: &AttributeMeta) -> Result<ColumnDefinition, SqlLoomError> {
        let column = attribute.column();
        let mut body = match &attribute.data_type {
            DataType::Enum(values) if values.is_empty() => {
                return Err(SqlLoomError::config("Values for ENUM haven't been defined."));
            }
            DataType::Enum(values) => {
                let list = values
                    .iter()
                    .map(|value| self.formatter.escape_string(value))
                    .collect::<Vec<_>>()
                    .join(", ");
                if self.dialect == Dialect::Mysql {
                    format!("ENUM({list})")
                } else {
                    let len = values.iter().map(|v| v.chars().count()).max().unwrap_or(1).max(1);
                    let len = u32::try_from(len).unwrap_or(u32::MAX);
                    format!(
                        "{} CHECK ({} IN ({list}))",
                        DataType::String(Some(len)).to_sql(self.dialect),
                        self.quote(column)
                    )
                }
            }
            DataType::Integer if attribute.auto_increment && self.dialect == Dialect::Postgres => {
                "SERIAL".to_string()
            }
            DataType::BigInt if attribute.auto_increment && self.dialect == Dialect::Postgres => {
                "BIGSERIAL".to_string()
            }
            other => other.to_sql(self.dialect),
        };

        if !attribute.allow_null {
            body.push_str(" NOT NULL");
        }
        if attribute.auto_increment && self.dialect == Dialect::Mysql {
            body.push_str(" AUTO_INCREMENT");
        }
        if let Some(default) = &attribute.default_value
            && !attribute.data_type.is_lob()
        {
            let hint = attribute.data_type.to_sql(self.dialect);
            body.push_str(" DEFAULT ");
            body.push_str(&self.formatter.format_typed(default, Some(&hint)));
        }
        if attribute.unique {
            body.push_str(" UNIQUE");
        }
        if let Some(comment) = &attribute.comment
            && self.dialect == Dialect::Mysql
        {
            body.push_str(" COMMENT ");
            body.push_str(&self.formatter.escape_string(comment));
        }

        let references = attribute.references.as_ref().map(|reference| {
            let mut sql = format!(
                "REFERENCES {} ({})",
                self.quoter.quote_table(&reference.table, None),
                self.quote(reference.key.as_deref().unwrap_or("id"))
            );
            if let Some(on_delete) = &reference.on_delete {
                sql.push_str(" ON DELETE ");
                sql.push_str(&on_delete.to_uppercase());
            }
            sql
        });

        Ok(ColumnDefinition {
            column: column.to_string(),
            body,
            primary_key: attribute.primary_key,
            auto_increment: attribute.auto_increment,
            references,
        })
    }

    /// Create `table` from `model`.
    ///
    /// Oracle gets an anonymous PL/SQL block that drops any existing table and
    /// backs every auto-increment column with a sequence and trigger.
    ///
    /// # Errors
    /// Returns `SqlLoomError::ConfigError` when a column cannot be rendered.
    pub fn create_table_query(
        &self,
        table: &TableRef,
        model: &ModelMeta,
        options: &CreateTableOptions,
    ) -> Result<String, SqlLoomError> {
        let defs = model
            .attributes
            .iter()
            .map(|attr| self.column_definition(attr))
            .collect::<Result<Vec<_>, _>>()?;
        let sql = if self.dialect == Dialect::Oracle {
            self.oracle_create_table(table, &defs, options)
        } else {
            self.plain_create_table(table, &defs, options)
        };
        debug!(sql = %sql, "compiled create table");
        Ok(sql)
    }

    fn unique_constraints(&self, table: &TableRef, options: &CreateTableOptions) -> Vec<String> {
        options
            .unique_keys
            .iter()
            .map(|key| {
                let name = key
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("uniq_{}_{}", table.name, key.fields.join("_")));
                let fields = key
                    .fields
                    .iter()
                    .map(|f| self.quote(f))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("CONSTRAINT {} UNIQUE ({fields})", self.quote(&name))
            })
            .collect()
    }

    fn plain_create_table(
        &self,
        table: &TableRef,
        defs: &[ColumnDefinition],
        options: &CreateTableOptions,
    ) -> String {
        let composite_key = defs.iter().filter(|d| d.primary_key).count() > 1;
        let mut parts: Vec<String> = defs
            .iter()
            .map(|def| {
                let mut sql = format!("{} {}", self.quote(&def.column), def.body);
                if def.primary_key && !composite_key {
                    sql.push_str(" PRIMARY KEY");
                    if def.auto_increment && self.dialect == Dialect::Sqlite {
                        sql.push_str(" AUTOINCREMENT");
                    }
                }
                if let Some(references) = &def.references {
                    sql.push(' ');
                    sql.push_str(references);
                }
                sql
            })
            .collect();
        parts.extend(self.unique_constraints(table, options));
        if composite_key {
            parts.push(format!("PRIMARY KEY ({})", self.primary_key_list(defs)));
        }

        let mut sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.quoter.quote_table(table, None),
            parts.join(", ")
        );
        if let Some(comment) = &options.comment
            && self.dialect == Dialect::Mysql
        {
            sql.push_str(" COMMENT ");
            sql.push_str(&self.formatter.escape_string(comment));
        }
        sql
    }

    fn primary_key_list(&self, defs: &[ColumnDefinition]) -> String {
        defs.iter()
            .filter(|d| d.primary_key)
            .map(|d| self.quote(&d.column))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn oracle_create_table(
        &self,
        table: &TableRef,
        defs: &[ColumnDefinition],
        options: &CreateTableOptions,
    ) -> String {
        let quoted_table = self.quoter.quote_table(table, None);
        let mut parts: Vec<String> = defs
            .iter()
            .map(|def| format!("{} {}", self.quote(&def.column), def.body))
            .collect();
        parts.extend(self.unique_constraints(table, options));
        if defs.iter().any(|d| d.primary_key) {
            parts.push(format!(
                "CONSTRAINT {} PRIMARY KEY ({})",
                self.quote(&format!("{}_PK", table.name)),
                self.primary_key_list(defs)
            ));
        }
        for def in defs {
            if let Some(references) = &def.references {
                parts.push(format!("FOREIGN KEY ({}) {references}", self.quote(&def.column)));
            }
        }
        let create = format!("CREATE TABLE {quoted_table} ({})", parts.join(", "));

        let mut lines = vec![
            "BEGIN".to_string(),
            "  DECLARE".to_string(),
            "    e_table_non_exists EXCEPTION;".to_string(),
            "    PRAGMA EXCEPTION_INIT(e_table_non_exists, -00942);".to_string(),
            "  BEGIN".to_string(),
            execute_immediate(&format!("DROP TABLE {quoted_table} CASCADE CONSTRAINTS"), 4),
            "  EXCEPTION".to_string(),
            "    WHEN e_table_non_exists THEN NULL;".to_string(),
            "  END;".to_string(),
            execute_immediate(&create, 2),
        ];
        if let Some(comment) = &options.comment {
            lines.push(execute_immediate(
                &format!(
                    "COMMENT ON TABLE {quoted_table} IS {}",
                    self.formatter.escape_string(comment)
                ),
                2,
            ));
        }

        let auto_columns: Vec<&ColumnDefinition> = defs.iter().filter(|d| d.auto_increment).collect();
        for def in &auto_columns {
            let sequence = self.quote(&format!("{}_{}_SEQ", table.name, def.column));
            lines.extend([
                "  DECLARE".to_string(),
                "    e_sequence_non_exists EXCEPTION;".to_string(),
                "    PRAGMA EXCEPTION_INIT(e_sequence_non_exists, -02289);".to_string(),
                "  BEGIN".to_string(),
                execute_immediate(&format!("DROP SEQUENCE {sequence}"), 4),
                "  EXCEPTION".to_string(),
                "    WHEN e_sequence_non_exists THEN NULL;".to_string(),
                "  END;".to_string(),
                execute_immediate(
                    &format!("CREATE SEQUENCE {sequence} START WITH 1 INCREMENT BY 1 NOCACHE NOCYCLE"),
                    2,
                ),
            ]);
        }
        for def in &auto_columns {
            let sequence = self.quote(&format!("{}_{}_SEQ", table.name, def.column));
            let trigger = self.quote(&format!("{}_{}_TRG", table.name, def.column));
            lines.push(execute_immediate(
                &format!(
                    "CREATE OR REPLACE TRIGGER {trigger} BEFORE INSERT ON {quoted_table} FOR EACH ROW \
                     BEGIN :new.{} := {sequence}.NEXTVAL; END;",
                    self.quote(&def.column)
                ),
                2,
            ));
        }
        lines.push("END;".to_string());
        lines.join("\n")
    }

    /// `ALTER TABLE t DROP COLUMN c`
    #[must_use]
    pub fn remove_column_query(&self, table: &TableRef, column: &str) -> String {
        format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.quoter.quote_table(table, None),
            self.quote(column)
        )
    }

    /// Catalog query listing the indexes of `table`.
    #[must_use]
    pub fn show_indexes_query(&self, table: &TableRef) -> String {
        let name = self.formatter.escape_string(&table.name);
        match self.dialect {
            Dialect::Oracle => format!("SELECT index_name FROM user_indexes WHERE table_name = {name}"),
            Dialect::Postgres => format!("SELECT indexname FROM pg_indexes WHERE tablename = {name}"),
            Dialect::Sqlite => format!("PRAGMA INDEX_LIST({})", self.quoter.quote_table(table, None)),
            Dialect::Mysql => format!("SHOW INDEX FROM {}", self.quoter.quote_table(table, None)),
        }
    }
}

/// `EXECUTE IMMEDIATE ('<sql>');` with the statement quoted as a PL/SQL literal.
fn execute_immediate(sql: &str, indent: usize) -> String {
    format!("{:indent$}EXECUTE IMMEDIATE ('{}');", "", escape_doubled(sql))
}

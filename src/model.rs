//! Model and association metadata consumed by the generator.
//!
//! These types are supplied by the surrounding ORM; the generator only reads
//! them.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::{Dialect, SqlValue};

/// A table name, optionally schema-qualified.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub name: String,
    pub schema: Option<String>,
    /// Joins schema and name on dialects without schema support (default `.`).
    pub delimiter: Option<String>,
}

impl TableRef {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: None,
            delimiter: None,
        }
    }

    #[must_use]
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }
}

impl From<&str> for TableRef {
    fn from(name: &str) -> Self {
        TableRef::new(name)
    }
}

/// Semantic column types.
#[derive(Debug, Clone, PartialEq)]
pub enum DataType {
    Integer,
    BigInt,
    Float,
    Double,
    Decimal { precision: u32, scale: u32 },
    String(Option<u32>),
    Char(u32),
    Text,
    Boolean,
    /// Timestamp with time zone
    Date,
    DateOnly,
    Time,
    Blob,
    Uuid,
    Json,
    Enum(Vec<String>),
}

impl DataType {
    /// Column type text for `dialect`. ENUM is handled by the DDL builder.
    #[must_use]
    pub fn to_sql(&self, dialect: Dialect) -> String {
        let oracle = dialect == Dialect::Oracle;
        match self {
            DataType::Integer if oracle => "NUMBER(10)".into(),
            DataType::Integer => "INTEGER".into(),
            DataType::BigInt if oracle => "NUMBER(19)".into(),
            DataType::BigInt => "BIGINT".into(),
            DataType::Float if oracle => "BINARY_FLOAT".into(),
            DataType::Float => "FLOAT".into(),
            DataType::Double if oracle => "BINARY_DOUBLE".into(),
            DataType::Double if dialect == Dialect::Postgres => "DOUBLE PRECISION".into(),
            DataType::Double => "DOUBLE".into(),
            DataType::Decimal { precision, scale } if oracle => {
                format!("NUMBER({precision},{scale})")
            }
            DataType::Decimal { precision, scale } => format!("DECIMAL({precision},{scale})"),
            DataType::String(len) => {
                let len = len.unwrap_or(255);
                if oracle {
                    format!("VARCHAR2({len})")
                } else {
                    format!("VARCHAR({len})")
                }
            }
            DataType::Char(len) => format!("CHAR({len})"),
            DataType::Text if oracle => "CLOB".into(),
            DataType::Text => "TEXT".into(),
            DataType::Boolean if oracle => "NUMBER(1)".into(),
            DataType::Boolean if dialect == Dialect::Mysql => "TINYINT(1)".into(),
            DataType::Boolean => "BOOLEAN".into(),
            DataType::Date if oracle => "TIMESTAMP WITH TIME ZONE".into(),
            DataType::Date if dialect == Dialect::Postgres => "TIMESTAMP WITH TIME ZONE".into(),
            DataType::Date => "DATETIME".into(),
            DataType::DateOnly => "DATE".into(),
            DataType::Time if oracle => "TIMESTAMP".into(),
            DataType::Time => "TIME".into(),
            DataType::Blob if dialect == Dialect::Postgres => "BYTEA".into(),
            DataType::Blob => "BLOB".into(),
            DataType::Uuid if oracle => "VARCHAR2(36)".into(),
            DataType::Uuid if dialect == Dialect::Postgres => "UUID".into(),
            DataType::Uuid => "CHAR(36)".into(),
            DataType::Json if oracle => "CLOB".into(),
            DataType::Json if dialect == Dialect::Postgres => "JSONB".into(),
            DataType::Json => "JSON".into(),
            DataType::Enum(_) => "ENUM".into(),
        }
    }

    /// Large-object types cannot carry a DEFAULT clause.
    #[must_use]
    pub fn is_lob(&self) -> bool {
        matches!(self, DataType::Text | DataType::Blob | DataType::Json)
    }
}

/// Foreign key target of a column.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub table: TableRef,
    pub key: Option<String>,
    pub on_delete: Option<String>,
}

/// Per-attribute metadata: semantic type plus flags.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeMeta {
    pub name: String,
    /// Column name when it differs from the attribute name.
    pub field: Option<String>,
    pub data_type: DataType,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub unique: bool,
    pub allow_null: bool,
    pub references: Option<Reference>,
    pub default_value: Option<SqlValue>,
    pub comment: Option<String>,
}

impl AttributeMeta {
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            field: None,
            data_type,
            primary_key: false,
            auto_increment: false,
            unique: false,
            allow_null: true,
            references: None,
            default_value: None,
            comment: None,
        }
    }

    /// Shorthand for an auto-incrementing integer primary key.
    #[must_use]
    pub fn id(name: impl Into<String>) -> Self {
        Self::new(name, DataType::Integer)
            .primary_key()
            .auto_increment()
    }

    #[must_use]
    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.allow_null = false;
        self
    }

    #[must_use]
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.allow_null = false;
        self
    }

    #[must_use]
    pub fn references(mut self, reference: Reference) -> Self {
        self.references = Some(reference);
        self
    }

    #[must_use]
    pub fn default_value(mut self, value: impl Into<SqlValue>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    #[must_use]
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// The column this attribute is stored in.
    #[must_use]
    pub fn column(&self) -> &str {
        self.field.as_deref().unwrap_or(&self.name)
    }
}

/// A model: its name (used as the statement's table alias), table and attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelMeta {
    pub name: String,
    pub table: TableRef,
    pub attributes: Vec<AttributeMeta>,
}

impl ModelMeta {
    #[must_use]
    pub fn new(name: impl Into<String>, table: impl Into<TableRef>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            attributes: Vec::new(),
        }
    }

    #[must_use]
    pub fn attribute(mut self, attribute: AttributeMeta) -> Self {
        self.attributes.push(attribute);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AttributeMeta> {
        self.attributes.iter().find(|attr| attr.name == name)
    }

    /// Column for an attribute name, falling back to the name itself.
    #[must_use]
    pub fn column_of<'a>(&'a self, name: &'a str) -> &'a str {
        self.get(name).map_or(name, AttributeMeta::column)
    }

    #[must_use]
    pub fn primary_keys(&self) -> Vec<&AttributeMeta> {
        self.attributes.iter().filter(|attr| attr.primary_key).collect()
    }

    /// First primary key attribute name, defaulting to `id`.
    #[must_use]
    pub fn primary_key_name(&self) -> &str {
        self.attributes
            .iter()
            .find(|attr| attr.primary_key)
            .map_or("id", |attr| attr.name.as_str())
    }

    #[must_use]
    pub fn primary_key_column(&self) -> &str {
        self.column_of(self.primary_key_name())
    }

    #[must_use]
    pub fn into_shared(self) -> Arc<ModelMeta> {
        Arc::new(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationKind {
    /// Foreign key lives on the source model.
    BelongsTo,
    /// Foreign key lives on the target model; at most one target row.
    HasOne,
    /// Foreign key lives on the target model; many target rows.
    HasMany,
    /// Many-to-many through an intermediate table.
    BelongsToMany,
}

impl AssociationKind {
    /// Whether joining this association can multiply parent rows.
    #[must_use]
    pub fn is_multi(self) -> bool {
        matches!(self, AssociationKind::HasMany | AssociationKind::BelongsToMany)
    }
}

/// A resolved association between two models.
#[derive(Debug, Clone, PartialEq)]
pub struct Association {
    pub kind: AssociationKind,
    pub source: Arc<ModelMeta>,
    pub target: Arc<ModelMeta>,
    /// Foreign key attribute: on the source for `BelongsTo`, on the target for
    /// `HasOne`/`HasMany`, on the through model (pointing at the source) for
    /// `BelongsToMany`.
    pub identifier: String,
    /// Through-model key pointing at the target (`BelongsToMany` only).
    pub foreign_identifier: Option<String>,
    pub through: Option<Arc<ModelMeta>>,
}

impl Association {
    #[must_use]
    pub fn belongs_to(
        source: Arc<ModelMeta>,
        target: Arc<ModelMeta>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self::direct(AssociationKind::BelongsTo, source, target, foreign_key)
    }

    #[must_use]
    pub fn has_one(
        source: Arc<ModelMeta>,
        target: Arc<ModelMeta>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self::direct(AssociationKind::HasOne, source, target, foreign_key)
    }

    #[must_use]
    pub fn has_many(
        source: Arc<ModelMeta>,
        target: Arc<ModelMeta>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self::direct(AssociationKind::HasMany, source, target, foreign_key)
    }

    #[must_use]
    pub fn belongs_to_many(
        source: Arc<ModelMeta>,
        target: Arc<ModelMeta>,
        through: Arc<ModelMeta>,
        source_key: impl Into<String>,
        target_key: impl Into<String>,
    ) -> Self {
        Self {
            kind: AssociationKind::BelongsToMany,
            source,
            target,
            identifier: source_key.into(),
            foreign_identifier: Some(target_key.into()),
            through: Some(through),
        }
    }

    fn direct(
        kind: AssociationKind,
        source: Arc<ModelMeta>,
        target: Arc<ModelMeta>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            source,
            target,
            identifier: foreign_key.into(),
            foreign_identifier: None,
            through: None,
        }
    }

    /// Column holding the foreign key, resolved through the owning model.
    #[must_use]
    pub fn identifier_field(&self) -> &str {
        let owner = match self.kind {
            AssociationKind::BelongsTo => &self.source,
            AssociationKind::HasOne | AssociationKind::HasMany => &self.target,
            AssociationKind::BelongsToMany => match &self.through {
                Some(through) => through,
                None => return &self.identifier,
            },
        };
        owner.column_of(&self.identifier)
    }

    #[must_use]
    pub fn foreign_identifier_field(&self) -> Option<&str> {
        let key = self.foreign_identifier.as_deref()?;
        Some(match &self.through {
            Some(through) => through.column_of(key),
            None => key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> Arc<ModelMeta> {
        ModelMeta::new("users", "users")
            .attribute(AttributeMeta::id("id"))
            .attribute(AttributeMeta::new("name", DataType::String(None)))
            .into_shared()
    }

    #[test]
    fn primary_key_defaults_to_id_without_metadata() {
        let bare = ModelMeta::new("tags", "tags");
        assert_eq!(bare.primary_key_name(), "id");
        assert_eq!(users().primary_keys().len(), 1);
    }

    #[test]
    fn identifier_field_follows_field_mapping() {
        let posts = ModelMeta::new("posts", "posts")
            .attribute(AttributeMeta::id("id"))
            .attribute(AttributeMeta::new("userId", DataType::Integer).field("user_id"))
            .into_shared();
        let assoc = Association::has_many(users(), posts, "userId");
        assert_eq!(assoc.identifier_field(), "user_id");
        assert!(assoc.kind.is_multi());
    }

    #[test]
    fn oracle_types() {
        assert_eq!(DataType::String(Some(40)).to_sql(Dialect::Oracle), "VARCHAR2(40)");
        assert_eq!(DataType::Boolean.to_sql(Dialect::Oracle), "NUMBER(1)");
        assert_eq!(DataType::Integer.to_sql(Dialect::Sqlite), "INTEGER");
    }
}

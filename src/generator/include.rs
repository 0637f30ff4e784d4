use crate::model::Association;

use super::options::Attribute;
use super::predicate::Predicate;

/// Options for the intermediate row of a many-to-many include.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThroughOptions {
    /// Alias segment appended to the include alias; defaults to the through model name.
    pub alias: Option<String>,
    /// `None` selects every attribute of the through model.
    pub attributes: Option<Vec<Attribute>>,
    pub filter: Option<Predicate>,
}

/// One eager-loaded association.
#[derive(Debug, Clone, PartialEq)]
pub struct Include {
    pub association: Association,
    /// Alias segment for this include; nested includes are reported as
    /// `parent.child`.
    pub alias: String,
    /// `None` selects every attribute of the target model.
    pub attributes: Option<Vec<Attribute>>,
    /// INNER JOIN when set, LEFT OUTER JOIN otherwise.
    pub required: bool,
    pub filter: Option<Predicate>,
    pub through: ThroughOptions,
    pub include: Vec<Include>,
    /// Join inside the paginated inner query. Defaults to true for
    /// single-row associations whose parent is inside it.
    pub sub_query: Option<bool>,
}

impl Include {
    #[must_use]
    pub fn new(association: Association) -> Self {
        let alias = association.target.name.clone();
        Self {
            association,
            alias,
            attributes: None,
            required: false,
            filter: None,
            through: ThroughOptions::default(),
            include: Vec::new(),
            sub_query: None,
        }
    }

    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    #[must_use]
    pub fn attributes<A: Into<Attribute>>(mut self, attributes: impl IntoIterator<Item = A>) -> Self {
        self.attributes = Some(attributes.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(predicate);
        self
    }

    #[must_use]
    pub fn through(mut self, through: ThroughOptions) -> Self {
        self.through = through;
        self
    }

    #[must_use]
    pub fn include(mut self, include: Include) -> Self {
        self.include.push(include);
        self
    }

    #[must_use]
    pub fn sub_query(mut self, sub_query: bool) -> Self {
        self.sub_query = Some(sub_query);
        self
    }

    pub(crate) fn has_multi_association(&self) -> bool {
        self.association.kind.is_multi() || self.include.iter().any(Include::has_multi_association)
    }

    /// Alias segment of the through row.
    pub(crate) fn through_alias(&self) -> &str {
        match (&self.through.alias, &self.association.through) {
            (Some(alias), _) => alias,
            (None, Some(through)) => &through.name,
            (None, None) => "through",
        }
    }
}

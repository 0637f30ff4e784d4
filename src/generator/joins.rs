use std::sync::Arc;

use super::include::Include;
use super::options::Attribute;
use super::predicate::WhereScope;
use super::select::SelectCompiler;
use crate::error::SqlLoomError;
use crate::expr::Expr;
use crate::model::{AssociationKind, ModelMeta};

/// The table a join hangs off.
#[derive(Debug, Clone)]
pub(super) struct ParentRef {
    pub alias: String,
    pub is_main: bool,
    /// Whether the parent is selected inside the paginated inner query.
    pub in_sub: bool,
}

/// Immutable per-level state handed down the include recursion.
#[derive(Debug, Clone)]
pub(super) struct JoinContext<'a> {
    pub parent: ParentRef,
    /// Includes from the top level down to the parent.
    pub chain: Vec<&'a Include>,
}

/// An include after alias and placement have been decided.
#[derive(Debug, Clone)]
pub(super) struct ResolvedInclude {
    pub alias: String,
    pub in_sub: bool,
    pub target: Arc<ModelMeta>,
}

/// Joins, selections and WHERE injections produced by one include subtree.
#[derive(Debug, Default)]
pub(super) struct JoinPlan {
    pub main_joins: Vec<String>,
    pub sub_joins: Vec<String>,
    pub main_attributes: Vec<String>,
    pub sub_attributes: Vec<String>,
    /// Correlated EXISTS filters for the main WHERE.
    pub existence: Vec<String>,
    /// Every alias introduced, in join order.
    pub aliases: Vec<String>,
    pub resolved: Vec<ResolvedInclude>,
}

impl JoinPlan {
    pub fn merge(&mut self, other: JoinPlan) {
        self.main_joins.extend(other.main_joins);
        self.sub_joins.extend(other.sub_joins);
        self.main_attributes.extend(other.main_attributes);
        self.sub_attributes.extend(other.sub_attributes);
        self.existence.extend(other.existence);
        self.aliases.extend(other.aliases);
        self.resolved.extend(other.resolved);
    }
}

fn join_keyword(required: bool) -> &'static str {
    if required {
        "INNER JOIN"
    } else {
        "LEFT OUTER JOIN"
    }
}

impl SelectCompiler<'_> {
    pub(super) fn plan_include<'a>(
        &self,
        include: &'a Include,
        ctx: JoinContext<'a>,
    ) -> Result<JoinPlan, SqlLoomError> {
        let alias = if ctx.parent.is_main {
            include.alias.clone()
        } else {
            format!("{}.{}", ctx.parent.alias, include.alias)
        };
        let in_sub = self.sub_query
            && ctx.parent.in_sub
            && include
                .sub_query
                .unwrap_or(!include.association.kind.is_multi());
        let target = &include.association.target;

        let mut plan = JoinPlan::default();
        plan.aliases.push(alias.clone());
        plan.resolved.push(ResolvedInclude {
            alias: alias.clone(),
            in_sub,
            target: Arc::clone(target),
        });

        let mut attributes = self.include_attributes(include.attributes.as_deref(), target, &alias)?;
        if in_sub {
            // Children joined outside the inner query read this include's keys
            // from the inner query's column list.
            let selected = selected_names(include.attributes.as_deref(), target);
            for child in &include.include {
                let child_in_sub = child.sub_query.unwrap_or(!child.association.kind.is_multi());
                let key = parent_key(child);
                if !child_in_sub && !selected.iter().any(|name| name == key) {
                    attributes.push(self.include_column(&alias, target, key, None));
                }
            }
        }

        let join = match &include.association.through {
            Some(through) => {
                let through_alias = format!("{alias}.{}", include.through_alias());
                plan.aliases.push(through_alias.clone());
                let through_attributes =
                    self.include_attributes(include.through.attributes.as_deref(), through, &through_alias)?;
                attributes.extend(through_attributes);
                self.through_join(include, &alias, &through_alias, &ctx.parent, in_sub, join_keyword(include.required))?
            }
            None => self.direct_join(include, &alias, &ctx.parent, in_sub, join_keyword(include.required)),
        };

        if in_sub {
            plan.sub_attributes.extend(attributes);
            plan.sub_joins.push(join);
        } else {
            plan.main_attributes.extend(attributes);
            plan.main_joins.push(join);
        }

        let mut chain = ctx.chain;
        chain.push(include);

        if self.sub_query && include.required && include.association.kind.is_multi() && !in_sub {
            plan.existence.push(self.existence_subquery(&chain)?);
        }

        for child in &include.include {
            let child_ctx = JoinContext {
                parent: ParentRef {
                    alias: alias.clone(),
                    is_main: false,
                    in_sub,
                },
                chain: chain.clone(),
            };
            plan.merge(self.plan_include(child, child_ctx)?);
        }
        Ok(plan)
    }

    fn include_attributes(
        &self,
        requested: Option<&[Attribute]>,
        model: &ModelMeta,
        alias: &str,
    ) -> Result<Vec<String>, SqlLoomError> {
        let Some(requested) = requested else {
            return Ok(model
                .attributes
                .iter()
                .map(|attr| self.include_column(alias, model, &attr.name, None))
                .collect());
        };
        requested
            .iter()
            .map(|attr| self.include_attribute(attr, model, alias))
            .collect()
    }

    fn include_attribute(
        &self,
        attr: &Attribute,
        model: &ModelMeta,
        alias: &str,
    ) -> Result<String, SqlLoomError> {
        let generator = self.generator;
        let report_as = |name: &str| generator.quote(&format!("{alias}.{name}"));
        match (&attr.expr, &attr.alias) {
            (Expr::Column(column), alias_override) if column.table.is_none() => Ok(
                self.include_column(alias, model, &column.column, alias_override.as_deref()),
            ),
            (Expr::Column(column), alias_override) => Ok(format!(
                "{} {}",
                generator.formatter.format_column(column),
                report_as(alias_override.as_deref().unwrap_or(&column.column))
            )),
            (Expr::Raw(sql), None) => Ok(sql.clone()),
            (expr, Some(name)) => Ok(format!(
                "{} {}",
                generator.formatter.format_expr(expr),
                report_as(name)
            )),
            (_, None) => Err(SqlLoomError::config(
                "Tried to select attributes using a literal, function or cast without specifying an alias \
                 for the result, during eager loading. This means the attribute will not be added \
                 to the returned instance",
            )),
        }
    }

    /// `"alias"."field" "alias.name"`
    fn include_column(
        &self,
        alias: &str,
        model: &ModelMeta,
        name: &str,
        report_as: Option<&str>,
    ) -> String {
        format!(
            "{} {}",
            self.generator.qualified(alias, model.column_of(name)),
            self.generator
                .quote(&format!("{alias}.{}", report_as.unwrap_or(name)))
        )
    }

    /// Reference to a parent attribute as seen from a join at `in_sub`.
    fn parent_column(&self, parent: &ParentRef, model: &ModelMeta, attr: &str, in_sub: bool) -> String {
        let via_inner_query = parent.in_sub && !in_sub;
        if parent.is_main {
            let column = if via_inner_query && self.exposes_names {
                attr
            } else {
                model.column_of(attr)
            };
            self.generator.qualified(&parent.alias, column)
        } else if via_inner_query {
            self.generator
                .qualified(&self.main_alias, &format!("{}.{attr}", parent.alias))
        } else {
            self.generator.qualified(&parent.alias, model.column_of(attr))
        }
    }

    fn target_filter(&self, include: &Include, alias: &str) -> Option<String> {
        let filter = include.filter.as_ref()?;
        self.generator.where_term(
            filter,
            WhereScope {
                table: Some(alias),
                model: Some(&include.association.target),
            },
        )
    }

    fn direct_join(
        &self,
        include: &Include,
        alias: &str,
        parent: &ParentRef,
        in_sub: bool,
        keyword: &str,
    ) -> String {
        let association = &include.association;
        let target = &association.target;
        let right_column = match association.kind {
            AssociationKind::BelongsTo => target.primary_key_column(),
            _ => association.identifier_field(),
        };
        let mut on = format!(
            "{} = {}",
            self.parent_column(parent, &association.source, parent_key(include), in_sub),
            self.generator.qualified(alias, right_column)
        );
        if let Some(filter) = self.target_filter(include, alias) {
            on.push_str(" AND ");
            on.push_str(&filter);
        }
        format!(
            " {keyword} {} ON {on}",
            self.generator.quoter.quote_table(&target.table, Some(alias))
        )
    }

    fn through_join(
        &self,
        include: &Include,
        alias: &str,
        through_alias: &str,
        parent: &ParentRef,
        in_sub: bool,
        keyword: &str,
    ) -> Result<String, SqlLoomError> {
        let association = &include.association;
        let through = association
            .through
            .as_ref()
            .ok_or_else(|| SqlLoomError::config("many-to-many include without a through model"))?;
        let source_on = format!(
            "{} = {}",
            self.parent_column(parent, &association.source, association.source.primary_key_name(), in_sub),
            self.generator
                .qualified(through_alias, association.identifier_field())
        );
        let target_on = self.through_target_on(include, alias, through_alias)?;
        let quoter = &self.generator.quoter;
        Ok(format!(
            " {keyword} {} ON {source_on} {keyword} {} ON {target_on}",
            quoter.quote_table(&through.table, Some(through_alias)),
            quoter.quote_table(&association.target.table, Some(alias)),
        ))
    }

    /// ON clause joining the target to its through row, with both filters.
    fn through_target_on(
        &self,
        include: &Include,
        alias: &str,
        through_alias: &str,
    ) -> Result<String, SqlLoomError> {
        let association = &include.association;
        let foreign = association.foreign_identifier_field().ok_or_else(|| {
            SqlLoomError::config("many-to-many include without a target key on the through model")
        })?;
        let mut on = format!(
            "{} = {}",
            self.generator
                .qualified(alias, association.target.primary_key_column()),
            self.generator.qualified(through_alias, foreign)
        );
        if let (Some(filter), Some(through)) = (&include.through.filter, &association.through)
            && let Some(sql) = self.generator.where_term(
                filter,
                WhereScope {
                    table: Some(through_alias),
                    model: Some(through),
                },
            )
        {
            on.push_str(" AND ");
            on.push_str(&sql);
        }
        if let Some(filter) = self.target_filter(include, alias) {
            on.push_str(" AND ");
            on.push_str(&filter);
        }
        Ok(on)
    }

    /// `EXISTS (...)` filter requiring a matching row for the last include of
    /// `chain`, correlated with the main table.
    fn existence_subquery(&self, chain: &[&Include]) -> Result<String, SqlLoomError> {
        let Some((top, rest)) = chain.split_first() else {
            return Err(SqlLoomError::config("empty include chain"));
        };
        let generator = self.generator;
        let quoter = &generator.quoter;
        let association = &top.association;
        let source = &association.source;
        let target = &association.target;
        let top_alias = top.alias.clone();

        let mut conditions = Vec::new();
        let (select, from, mut joins) = match &association.through {
            Some(through) => {
                let through_alias = format!("{top_alias}.{}", top.through_alias());
                conditions.push(format!(
                    "{} = {}",
                    generator.qualified(&self.main_alias, source.primary_key_column()),
                    generator.qualified(&through_alias, association.identifier_field())
                ));
                let join = format!(
                    " INNER JOIN {} ON {}",
                    quoter.quote_table(&target.table, Some(&top_alias)),
                    self.through_target_on(top, &top_alias, &through_alias)?
                );
                (
                    generator.qualified(&through_alias, through.primary_key_column()),
                    quoter.quote_table(&through.table, Some(&through_alias)),
                    vec![join],
                )
            }
            None => {
                let (main_column, top_column) = match association.kind {
                    AssociationKind::BelongsTo => {
                        (association.identifier_field(), target.primary_key_column())
                    }
                    _ => (source.primary_key_column(), association.identifier_field()),
                };
                conditions.push(format!(
                    "{} = {}",
                    generator.qualified(&self.main_alias, main_column),
                    generator.qualified(&top_alias, top_column)
                ));
                if let Some(filter) = self.target_filter(top, &top_alias) {
                    conditions.push(filter);
                }
                (
                    generator.qualified(&top_alias, target.primary_key_column()),
                    quoter.quote_table(&target.table, Some(&top_alias)),
                    Vec::new(),
                )
            }
        };

        let mut parent_alias = top_alias;
        for link in rest {
            let alias = format!("{parent_alias}.{}", link.alias);
            let parent = ParentRef {
                alias: parent_alias.clone(),
                is_main: false,
                in_sub: false,
            };
            let join = match &link.association.through {
                Some(_) => {
                    let through_alias = format!("{alias}.{}", link.through_alias());
                    self.through_join(link, &alias, &through_alias, &parent, false, "INNER JOIN")?
                }
                None => self.direct_join(link, &alias, &parent, false, "INNER JOIN"),
            };
            joins.push(join);
            parent_alias = alias;
        }

        Ok(format!(
            "EXISTS (SELECT {select} FROM {from}{} WHERE {})",
            joins.concat(),
            conditions.join(" AND ")
        ))
    }
}

/// Attribute of the parent model a child include joins on.
fn parent_key(child: &Include) -> &str {
    let association = &child.association;
    match association.kind {
        AssociationKind::BelongsTo => &association.identifier,
        _ => association.source.primary_key_name(),
    }
}

/// Attribute names an include reports, for checking whether a key is present.
fn selected_names(requested: Option<&[Attribute]>, model: &ModelMeta) -> Vec<String> {
    match requested {
        Some(attributes) => attributes
            .iter()
            .filter_map(|attr| attr.exposed_name().map(str::to_string))
            .collect(),
        None => model.attributes.iter().map(|attr| attr.name.clone()).collect(),
    }
}

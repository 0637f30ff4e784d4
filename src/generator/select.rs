use std::collections::HashSet;

use tracing::debug;

use super::QueryGenerator;
use super::joins::{JoinContext, JoinPlan, ParentRef, ResolvedInclude};
use super::options::{Attribute, SelectOptions};
use super::order::{OrderItem, validate_direction};
use super::pagination::Pagination;
use super::predicate::WhereScope;
use crate::error::SqlLoomError;
use crate::expr::{ColumnRef, Expr};
use crate::model::{ModelMeta, TableRef};

/// State shared by one SELECT compilation. Built per call and dropped with it.
pub(super) struct SelectCompiler<'a> {
    pub generator: &'a QueryGenerator,
    pub model: Option<&'a ModelMeta>,
    /// Alias that qualifies main-table columns (also the inner query's alias).
    pub main_alias: String,
    /// Paginate an inner scan of the main table and join multi-row includes outside it.
    pub sub_query: bool,
    /// The inner query reports main columns under attribute names rather than fields.
    pub exposes_names: bool,
}

impl QueryGenerator {
    /// Compile a SELECT for `table`.
    ///
    /// # Errors
    /// Returns `SqlLoomError::ConfigError` for malformed input: an invalid
    /// ORDER BY direction, an unaliased computed include attribute, a duplicate
    /// alias, or an ORDER BY path naming no include.
    pub fn select_query(
        &self,
        table: &TableRef,
        options: &SelectOptions,
        model: Option<&ModelMeta>,
    ) -> Result<String, SqlLoomError> {
        // Includes carry the main model as their association source.
        let model = model.or_else(|| {
            options
                .include
                .first()
                .map(|include| include.association.source.as_ref())
        });
        let has_alias = options.table_as.is_some() || model.is_some();
        let main_alias = options
            .table_as
            .clone()
            .or_else(|| model.map(|m| m.name.clone()))
            .unwrap_or_else(|| table.name.clone());
        let sub_query = !options.include.is_empty()
            && options
                .sub_query
                .unwrap_or(options.limit.is_some() && options.has_multi_association());

        let compiler = SelectCompiler {
            generator: self,
            model,
            main_alias,
            sub_query,
            exposes_names: sub_query && options.attributes.is_some(),
        };
        let sql = compiler.compile(table, options, has_alias)?;
        debug!(sql = %sql, sub_query, "compiled select");
        Ok(sql)
    }
}

impl SelectCompiler<'_> {
    fn compile(
        &self,
        table: &TableRef,
        options: &SelectOptions,
        has_alias: bool,
    ) -> Result<String, SqlLoomError> {
        let generator = self.generator;
        let quoted_alias = generator.quote(&self.main_alias);

        let mut main_attributes = self.main_attributes(options)?;
        let mut sub_attributes = Vec::new();
        if self.sub_query {
            sub_attributes = std::mem::replace(&mut main_attributes, vec![format!("{quoted_alias}.*")]);
        }

        let mut plan = JoinPlan::default();
        for include in &options.include {
            let ctx = JoinContext {
                parent: ParentRef {
                    alias: self.main_alias.clone(),
                    is_main: true,
                    in_sub: self.sub_query,
                },
                chain: Vec::new(),
            };
            plan.merge(self.plan_include(include, ctx)?);
        }
        self.check_aliases(&plan.aliases)?;
        main_attributes.extend(plan.main_attributes.drain(..));
        sub_attributes.extend(plan.sub_attributes.drain(..));

        let mut clauses = String::new();
        if let Some(filter) = self.main_filter(options, &plan.existence) {
            clauses.push_str(" WHERE ");
            clauses.push_str(&filter);
        }
        if !options.group.is_empty() {
            let group = options
                .group
                .iter()
                .map(|expr| self.main_expr(expr))
                .collect::<Vec<_>>()
                .join(", ");
            clauses.push_str(" GROUP BY ");
            clauses.push_str(&group);
        }
        if let Some(having) = options.having.as_ref().and_then(|having| {
            generator.where_conditions(having, self.main_scope())
        }) {
            clauses.push_str(" HAVING ");
            clauses.push_str(&having);
        }

        let (main_order, sub_order) = self.order_terms(&options.order, &plan.resolved)?;
        let from = generator
            .quoter
            .quote_table(table, has_alias.then_some(self.main_alias.as_str()));
        let pagination = Pagination::new(options.limit, options.offset);

        let mut sql = if self.sub_query {
            let mut inner = format!(
                "SELECT {} FROM {from}{}{clauses}",
                sub_attributes.join(", "),
                plan.sub_joins.concat()
            );
            push_order(&mut inner, &sub_order);
            let inner = pagination.apply(generator.dialect, &inner);
            let mut outer = format!(
                "SELECT {} FROM ({inner}) {quoted_alias}{}",
                main_attributes.join(", "),
                plan.main_joins.concat()
            );
            push_order(&mut outer, &main_order);
            outer
        } else {
            let mut query = format!(
                "SELECT {} FROM {from}{}{clauses}",
                main_attributes.join(", "),
                plan.main_joins.concat()
            );
            push_order(&mut query, &main_order);
            pagination.apply(generator.dialect, &query)
        };

        if let Some(lock) = &options.lock {
            sql.push_str(&generator.lock_clause(lock));
        }
        Ok(sql)
    }

    fn main_scope(&self) -> WhereScope<'_> {
        WhereScope {
            table: Some(&self.main_alias),
            model: self.model,
        }
    }

    fn main_attributes(&self, options: &SelectOptions) -> Result<Vec<String>, SqlLoomError> {
        let qualify = !options.include.is_empty();
        let Some(requested) = &options.attributes else {
            return Ok(vec![if qualify {
                format!("{}.*", self.generator.quote(&self.main_alias))
            } else {
                "*".to_string()
            }]);
        };

        let mut requested = requested.clone();
        if self.sub_query
            && let Some(model) = self.model
        {
            for key in model.primary_keys() {
                if !requested
                    .iter()
                    .any(|attr| attr.exposed_name() == Some(key.name.as_str()))
                {
                    requested.push(Attribute::name(key.name.clone()));
                }
            }
        }
        Ok(requested
            .iter()
            .map(|attr| self.main_attribute(attr, qualify))
            .collect())
    }

    fn main_attribute(&self, attr: &Attribute, qualify: bool) -> String {
        let generator = self.generator;
        let mut sql = match &attr.expr {
            Expr::Column(ColumnRef {
                table: None,
                column,
            }) => {
                let field = self.model.map_or(column.as_str(), |m| m.column_of(column));
                let mut sql = generator.quote(field);
                if qualify {
                    sql = format!("{}.{sql}", generator.quote(&self.main_alias));
                }
                if attr.alias.is_none() && field != column {
                    sql.push(' ');
                    sql.push_str(&generator.quote(column));
                }
                sql
            }
            expr => generator.formatter.format_expr(expr),
        };
        if let Some(alias) = &attr.alias {
            sql.push(' ');
            sql.push_str(&generator.quote(alias));
        }
        sql
    }

    /// Bare main-table columns are mapped to fields and qualified.
    fn main_expr(&self, expr: &Expr) -> String {
        match expr {
            Expr::Column(ColumnRef {
                table: None,
                column,
            }) => {
                let field = self.model.map_or(column.as_str(), |m| m.column_of(column));
                self.generator.qualified(&self.main_alias, field)
            }
            other => self.generator.formatter.format_expr(other),
        }
    }

    /// Like [`Self::main_expr`], but against the columns the inner subquery
    /// exposes, which are attribute names when attributes were listed.
    fn outer_expr(&self, expr: &Expr) -> String {
        match expr {
            Expr::Column(ColumnRef {
                table: None,
                column,
            }) if self.exposes_names => self.generator.qualified(&self.main_alias, column),
            other => self.main_expr(other),
        }
    }

    fn main_filter(&self, options: &SelectOptions, existence: &[String]) -> Option<String> {
        let generator = self.generator;
        let Some(filter) = &options.filter else {
            return (!existence.is_empty()).then(|| existence.join(" AND "));
        };
        if existence.is_empty() {
            return generator.where_conditions(filter, self.main_scope());
        }
        let mut terms: Vec<String> = generator
            .where_term(filter, self.main_scope())
            .into_iter()
            .collect();
        terms.extend(existence.iter().cloned());
        Some(terms.join(" AND "))
    }

    fn check_aliases(&self, aliases: &[String]) -> Result<(), SqlLoomError> {
        let mut seen = HashSet::from([self.main_alias.as_str()]);
        for alias in aliases {
            if !seen.insert(alias.as_str()) {
                return Err(SqlLoomError::config(format!(
                    "Alias \"{alias}\" is used more than once in the same query"
                )));
            }
        }
        Ok(())
    }

    /// ORDER BY terms for the outer query and, in subquery mode, the inner one.
    fn order_terms(
        &self,
        order: &[OrderItem],
        resolved: &[ResolvedInclude],
    ) -> Result<(Vec<String>, Vec<String>), SqlLoomError> {
        let generator = self.generator;
        let mut main = Vec::new();
        let mut sub = Vec::new();
        for item in order {
            let direction = match item.direction_text() {
                Some(direction) => format!(" {}", validate_direction(direction)?),
                None => String::new(),
            };
            match item {
                OrderItem::Raw(sql) => main.push(sql.clone()),
                OrderItem::Column { path, name, .. } if path.is_empty() => {
                    let field = self.model.map_or(name.as_str(), |m| m.column_of(name));
                    if self.sub_query {
                        sub.push(format!("{}{direction}", generator.qualified(&self.main_alias, field)));
                        let exposed = if self.exposes_names { name.as_str() } else { field };
                        main.push(format!("{}{direction}", generator.qualified(&self.main_alias, exposed)));
                    } else {
                        main.push(format!("{}{direction}", generator.qualified(&self.main_alias, field)));
                    }
                }
                OrderItem::Column { path, name, .. } => {
                    let alias = path.join(".");
                    let include = resolved.iter().find(|r| r.alias == alias).ok_or_else(|| {
                        SqlLoomError::config(format!("Unable to find include \"{alias}\" for ORDER BY"))
                    })?;
                    let column = if self.sub_query && include.in_sub {
                        generator.qualified(&self.main_alias, &format!("{alias}.{name}"))
                    } else {
                        generator.qualified(&alias, include.target.column_of(name))
                    };
                    main.push(format!("{column}{direction}"));
                }
                OrderItem::Expr { expr, .. } => {
                    let term = format!("{}{direction}", self.main_expr(expr));
                    if self.sub_query {
                        main.push(format!("{}{direction}", self.outer_expr(expr)));
                        sub.push(term);
                    } else {
                        main.push(term);
                    }
                }
            }
        }
        Ok((main, sub))
    }
}

fn push_order(sql: &mut String, terms: &[String]) {
    if !terms.is_empty() {
        sql.push_str(" ORDER BY ");
        sql.push_str(&terms.join(", "));
    }
}

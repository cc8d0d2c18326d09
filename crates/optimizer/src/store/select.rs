//! SELECT query handle backed by the model registry

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use serde_json::Value;
use tracing::trace;

use super::types::*;
use super::QueryHandle;
use crate::entity::EntityType;
use crate::error::{OptimizerError, OptimizerResult};
use crate::expression::Expression;
use crate::node::{PageWindow, PATH_SEPARATOR};
use crate::plan::FollowUp;
use crate::registry::{ModelRegistry, RelationshipType};

/// Computed expression together with its rendered SQL
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedColumn {
    pub expression: Expression,
    pub sql: String,
}

/// Query builder for one entity's table plus its joins and follow-ups
#[derive(Debug, Clone)]
pub struct SelectQuery {
    pub(crate) registry: Arc<ModelRegistry>,
    pub(crate) entity: EntityType,
    pub(crate) table: String,
    pub(crate) primary_key: String,
    pub(crate) select_fields: IndexSet<String>,
    pub(crate) where_conditions: Vec<WhereCondition>,
    pub(crate) joins: Vec<JoinClause>,
    pub(crate) join_paths: IndexSet<String>,
    pub(crate) computed: IndexMap<String, ComputedColumn>,
    pub(crate) follow_ups: Vec<FollowUp<SelectQuery>>,
    pub(crate) order_by: Vec<(String, OrderDirection)>,
    pub(crate) limit_count: Option<i64>,
    pub(crate) window: Option<PageWindow>,
    pub(crate) optimized: bool,
}

impl SelectQuery {
    /// Unrestricted query over every row of `entity`
    pub fn for_entity(registry: Arc<ModelRegistry>, entity: &EntityType) -> OptimizerResult<Self> {
        let meta = registry.entity(entity)?;
        let table = meta.table.clone();
        let primary_key = meta.primary_key.clone();

        Ok(Self {
            registry,
            entity: entity.clone(),
            table,
            primary_key,
            select_fields: IndexSet::new(),
            where_conditions: Vec::new(),
            joins: Vec::new(),
            join_paths: IndexSet::new(),
            computed: IndexMap::new(),
            follow_ups: Vec::new(),
            order_by: Vec::new(),
            limit_count: None,
            window: None,
            optimized: false,
        })
    }

    pub fn entity(&self) -> &EntityType {
        &self.entity
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &IndexSet<String> {
        &self.select_fields
    }

    pub fn join_paths(&self) -> &IndexSet<String> {
        &self.join_paths
    }

    pub fn joins(&self) -> &[JoinClause] {
        &self.joins
    }

    pub fn follow_ups(&self) -> &[FollowUp<SelectQuery>] {
        &self.follow_ups
    }

    pub fn computed(&self) -> &IndexMap<String, ComputedColumn> {
        &self.computed
    }

    pub fn page_window(&self) -> Option<&PageWindow> {
        self.window.as_ref()
    }

    pub fn where_conditions(&self) -> &[WhereCondition] {
        &self.where_conditions
    }

    /// Number of queries executing this handle costs, follow-ups included
    pub fn round_trips(&self) -> usize {
        1 + self
            .follow_ups
            .iter()
            .map(|follow_up| follow_up.query.round_trips())
            .sum::<usize>()
    }

    /// Add WHERE condition with equality
    pub fn where_eq<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.push_condition(column, QueryOperator::Equal, Some(value.into()))
    }

    /// Add WHERE IS NULL condition
    pub fn where_null(self, column: &str) -> Self {
        self.push_condition(column, QueryOperator::IsNull, None)
    }

    /// Add WHERE IN condition
    pub fn where_in<T: Into<Value>>(mut self, column: &str, values: Vec<T>) -> Self {
        self.where_conditions.push(WhereCondition {
            column: column.to_string(),
            operator: QueryOperator::In,
            value: None,
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    fn push_condition(
        mut self,
        column: &str,
        operator: QueryOperator,
        value: Option<Value>,
    ) -> Self {
        self.where_conditions.push(WhereCondition {
            column: column.to_string(),
            operator,
            value,
            values: Vec::new(),
        });
        self
    }

    /// Add ORDER BY clause (ascending)
    pub fn order_by(mut self, column: &str) -> Self {
        self.order_by.push((column.to_string(), OrderDirection::Asc));
        self
    }

    /// Add LIMIT clause
    pub fn limit(mut self, count: i64) -> Self {
        self.limit_count = Some(count);
        self
    }

    /// Render a computed expression against this query's table
    fn render_expression(&self, expression: &Expression) -> OptimizerResult<String> {
        Ok(match expression {
            Expression::Column { path } => self.qualify(path),
            Expression::Literal { value } => format_value(value),
            Expression::Function { name, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.render_expression(arg))
                    .collect::<OptimizerResult<Vec<_>>>()?;
                format!("{}({})", name, args.join(", "))
            }
            Expression::Count { relation, distinct } => {
                let meta = self.registry.relation(&self.entity, relation)?;
                let related = self.registry.entity(&meta.related_entity)?;
                let counted = if *distinct {
                    format!("COUNT(DISTINCT \"_related\".{})", quote(&related.primary_key))
                } else {
                    "COUNT(*)".to_string()
                };
                format!(
                    "(SELECT {} FROM {} AS \"_related\" WHERE \"_related\".{} = {}.{})",
                    counted,
                    quote(&related.table),
                    quote(meta.child_key_column()),
                    quote(&self.table),
                    quote(meta.parent_key_column()),
                )
            }
            Expression::WindowCount { partition_by } => {
                format!("COUNT(*) OVER (PARTITION BY {})", self.qualify(partition_by))
            }
            Expression::Raw { sql } => sql.clone(),
        })
    }

    /// Column reference, qualified by its relation alias or the base table
    pub(crate) fn qualify(&self, path: &str) -> String {
        match path.rsplit_once(PATH_SEPARATOR) {
            Some((alias, column)) => format!("{}.{}", quote(alias), quote(column)),
            None => format!("{}.{}", quote(&self.table), quote(path)),
        }
    }
}

impl QueryHandle for SelectQuery {
    fn restrict_to_key(self, key: &Value) -> OptimizerResult<Self> {
        let primary_key = self.primary_key.clone();
        Ok(self.where_eq(&primary_key, key.clone()))
    }

    fn restrict_columns(mut self, columns: &[String]) -> OptimizerResult<Self> {
        self.select_fields = columns.iter().cloned().collect();
        Ok(self)
    }

    fn add_join_path(mut self, path: &str) -> OptimizerResult<Self> {
        if self.join_paths.contains(path) {
            return Ok(self);
        }

        let hops = self.registry.resolve_path(&self.entity, path)?;
        let mut joins = Vec::new();
        let mut parent_alias = self.table.clone();
        let mut alias = String::new();

        for hop in hops {
            if !alias.is_empty() {
                alias.push_str(PATH_SEPARATOR);
            }
            alias.push_str(&hop.name);

            if !self.join_paths.contains(&alias) {
                let table = self.registry.entity(&hop.related_entity)?.table.clone();
                let (left, right) = match hop.relationship_type {
                    RelationshipType::BelongsTo => (&hop.foreign_key, &hop.local_key),
                    RelationshipType::HasOne | RelationshipType::HasMany => {
                        (&hop.local_key, &hop.foreign_key)
                    }
                };
                joins.push((
                    alias.clone(),
                    JoinClause {
                        table,
                        alias: alias.clone(),
                        on_condition: (
                            format!("{}.{}", quote(&parent_alias), quote(left)),
                            format!("{}.{}", quote(&alias), quote(right)),
                        ),
                    },
                ));
            }
            parent_alias = alias.clone();
        }

        for (alias, join) in joins {
            trace!(table = %self.table, alias = %alias, "adding join");
            self.join_paths.insert(alias);
            self.joins.push(join);
        }
        Ok(self)
    }

    fn add_follow_up(mut self, path: String, query: Self) -> OptimizerResult<Self> {
        if path.is_empty() {
            return Err(OptimizerError::InvalidPath(path));
        }
        self.follow_ups.push(FollowUp::new(path, query));
        Ok(self)
    }

    fn add_computed(mut self, name: &str, expression: Expression) -> OptimizerResult<Self> {
        let sql = self.render_expression(&expression)?;
        self.computed
            .insert(name.to_string(), ComputedColumn { expression, sql });
        Ok(self)
    }

    fn window(mut self, window: &PageWindow) -> OptimizerResult<Self> {
        self.window = Some(window.clone());
        Ok(self)
    }

    fn mark_optimized(mut self) -> Self {
        self.optimized = true;
        self
    }

    fn is_optimized(&self) -> bool {
        self.optimized
    }
}

/// Quote an identifier
pub(crate) fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Format a value for SQL
pub(crate) fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s.replace('\'', "''")), // Escape single quotes
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "NULL".to_string(),
        _ => "NULL".to_string(), // Arrays and objects not supported
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{EntityMeta, RelationMeta};

    fn registry() -> Arc<ModelRegistry> {
        let registry = ModelRegistry::new()
            .with_entity(
                EntityMeta::new("Apartment", "example_apartment")
                    .with_relation(RelationMeta::belongs_to("building", "Building", "building_id"))
                    .with_relation(RelationMeta::has_many("sales", "Sale", "apartment_id")),
            )
            .unwrap()
            .with_entity(
                EntityMeta::new("Building", "example_building").with_relation(
                    RelationMeta::belongs_to("real_estate", "RealEstate", "real_estate_id"),
                ),
            )
            .unwrap()
            .with_entity(EntityMeta::new("RealEstate", "example_realestate"))
            .unwrap()
            .with_entity(EntityMeta::new("Sale", "example_sale"))
            .unwrap();
        Arc::new(registry)
    }

    fn apartments() -> SelectQuery {
        SelectQuery::for_entity(registry(), &EntityType::new("Apartment")).unwrap()
    }

    #[test]
    fn test_nested_join_path_adds_intermediate_joins() {
        let query = apartments()
            .add_join_path("building__real_estate")
            .unwrap()
            .add_join_path("building")
            .unwrap();

        assert_eq!(
            query.join_paths().iter().collect::<Vec<_>>(),
            vec!["building", "building__real_estate"]
        );
        assert_eq!(query.joins().len(), 2);
        assert_eq!(
            query.joins()[1].on_condition,
            (
                "\"building\".\"real_estate_id\"".to_string(),
                "\"building__real_estate\".\"id\"".to_string()
            )
        );
    }

    #[test]
    fn test_unknown_join_path_is_a_store_error() {
        let err = apartments().add_join_path("owner").unwrap_err();
        assert_eq!(
            err,
            OptimizerError::UnknownRelation {
                entity: EntityType::new("Apartment"),
                relation: "owner".to_string(),
            }
        );
    }

    #[test]
    fn test_count_expression_renders_correlated_subquery() {
        let query = apartments()
            .add_computed("sales_count", Expression::count("sales"))
            .unwrap();
        assert_eq!(
            query.computed()["sales_count"].sql,
            "(SELECT COUNT(*) FROM \"example_sale\" AS \"_related\" \
             WHERE \"_related\".\"apartment_id\" = \"example_apartment\".\"id\")"
        );
    }

    #[test]
    fn test_round_trips_count_nested_follow_ups() {
        let registry = registry();
        let sales =
            SelectQuery::for_entity(Arc::clone(&registry), &EntityType::new("Sale")).unwrap();
        let buildings = SelectQuery::for_entity(Arc::clone(&registry), &EntityType::new("Building"))
            .unwrap()
            .add_follow_up(
                "apartments".to_string(),
                apartments()
                    .add_follow_up("sales".to_string(), sales)
                    .unwrap(),
            )
            .unwrap();

        assert_eq!(buildings.round_trips(), 3);
    }

    #[test]
    fn test_mark_optimized() {
        let query = apartments();
        assert!(!query.is_optimized());
        assert!(query.mark_optimized().is_optimized());
    }
}

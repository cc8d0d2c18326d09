//! Store collaborator - query handles the planner writes instructions to
//!
//! The planner treats a query as an opaque, chainable handle. [`SelectQuery`]
//! is the SQL implementation backed by the [`ModelRegistry`].

pub mod select;
pub mod sql;
pub mod types;

use std::sync::Arc;

use serde_json::Value;

use crate::entity::EntityType;
use crate::error::OptimizerResult;
use crate::expression::Expression;
use crate::node::PageWindow;
use crate::registry::ModelRegistry;

pub use select::SelectQuery;
pub use types::{JoinClause, OrderDirection, QueryOperator, WhereCondition};

/// Chainable query object that fetch instructions are applied to
pub trait QueryHandle: Sized {
    /// Restrict to the row with this primary key
    fn restrict_to_key(self, key: &Value) -> OptimizerResult<Self>;

    /// Only fetch these columns (dotted paths for joined relations)
    fn restrict_columns(self, columns: &[String]) -> OptimizerResult<Self>;

    /// Join a dotted relation path into this query
    fn add_join_path(self, path: &str) -> OptimizerResult<Self>;

    /// Fetch a relation by a separate, already optimized query
    fn add_follow_up(self, path: String, query: Self) -> OptimizerResult<Self>;

    /// Attach a computed expression under `name`
    fn add_computed(self, name: &str, expression: Expression) -> OptimizerResult<Self>;

    /// Keep at most one page of rows per parent key
    fn window(self, window: &PageWindow) -> OptimizerResult<Self>;

    fn mark_optimized(self) -> Self;

    fn is_optimized(&self) -> bool;
}

/// Entity/relation registry as seen by the planner
pub trait QueryStore {
    type Query: QueryHandle;

    /// Fresh, unrestricted query for every row of `entity`
    fn query_for(&self, entity: &EntityType) -> OptimizerResult<Self::Query>;

    /// Entity type on the other end of `relation`
    fn related_entity(&self, entity: &EntityType, relation: &str) -> OptimizerResult<EntityType>;
}

/// SQL store over a shared model registry
#[derive(Debug, Clone)]
pub struct SqlStore {
    registry: Arc<ModelRegistry>,
}

impl SqlStore {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }
}

impl QueryStore for SqlStore {
    type Query = SelectQuery;

    fn query_for(&self, entity: &EntityType) -> OptimizerResult<SelectQuery> {
        SelectQuery::for_entity(Arc::clone(&self.registry), entity)
    }

    fn related_entity(&self, entity: &EntityType, relation: &str) -> OptimizerResult<EntityType> {
        Ok(self.registry.relation(entity, relation)?.related_entity.clone())
    }
}

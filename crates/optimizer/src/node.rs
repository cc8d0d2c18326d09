//! Optimization nodes - per-position accumulators of fetch intent
//!
//! One node exists for every entity type at every position of a requested
//! graph. While the walker visits a selection it records on the node which
//! columns are needed, which computed expressions must be attached and which
//! relations are fetched with the parent (join) or separately (follow-up).

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::entity::{EntityType, RequestContext};
use crate::error::{OptimizerError, OptimizerResult};
use crate::expression::Expression;
use crate::store::OrderDirection;

/// Separator between relation names in dotted paths (`postal_code__code`)
pub const PATH_SEPARATOR: &str = "__";

/// Qualify `path` with a relation prefix
pub fn join_path(prefix: &str, path: &str) -> String {
    format!("{}{}{}", prefix, PATH_SEPARATOR, path)
}

/// How a child relation is fetched relative to its parent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchStrategy {
    /// Joined into the parent's query
    Join,
    /// Fetched by a separate query, associated back by key
    FollowUp,
}

/// Per-parent pagination of a follow-up relation.
///
/// Child rows are numbered inside each partition (one partition per parent
/// key) and only rows with `offset < row_number <= offset + limit + 1` are
/// kept. The extra row tells the caller whether a next page exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageWindow {
    /// Child column holding the parent key
    pub partition_by: String,
    /// Ordering inside a partition; empty means the primary key
    pub order_by: Vec<(String, OrderDirection)>,
    pub offset: usize,
    pub limit: usize,
}

impl PageWindow {
    pub fn new(partition_by: impl Into<String>, limit: usize) -> Self {
        Self {
            partition_by: partition_by.into(),
            order_by: Vec::new(),
            offset: 0,
            limit,
        }
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: OrderDirection) -> Self {
        self.order_by.push((column.into(), direction));
        self
    }

    /// Exclusive lower row number
    pub fn lower_bound(&self) -> usize {
        self.offset
    }

    /// Inclusive upper row number, including the has-next-page sentinel.
    ///
    /// Saturates at `usize::MAX` for client-supplied page sizes that would
    /// overflow.
    pub fn upper_bound(&self) -> usize {
        self.offset.saturating_add(self.limit).saturating_add(1)
    }

    /// Smallest window holding the rows of both `self` and `other`.
    ///
    /// Windows are only combinable when they number rows the same way.
    pub fn union(&self, other: &PageWindow) -> OptimizerResult<PageWindow> {
        if self.partition_by != other.partition_by {
            return Err(OptimizerError::WindowConflict(format!(
                "partitioned by '{}' and '{}'",
                self.partition_by, other.partition_by
            )));
        }
        if self.order_by != other.order_by {
            return Err(OptimizerError::WindowConflict(format!(
                "different orderings within '{}'",
                self.partition_by
            )));
        }

        let offset = self.offset.min(other.offset);
        let upper = self.upper_bound().max(other.upper_bound());
        Ok(PageWindow {
            partition_by: self.partition_by.clone(),
            order_by: self.order_by.clone(),
            offset,
            limit: upper.saturating_sub(offset).saturating_sub(1),
        })
    }
}

/// Accumulated fetch intent for one entity at one position of the graph
#[derive(Debug, Clone)]
pub struct OptimizationNode {
    entity: EntityType,
    context: RequestContext,
    direct_columns: IndexSet<String>,
    support_columns: IndexSet<String>,
    annotations: IndexMap<String, Expression>,
    join_children: IndexMap<String, OptimizationNode>,
    follow_up_children: IndexMap<String, OptimizationNode>,
    window: Option<PageWindow>,
}

impl OptimizationNode {
    /// Create an empty node for `entity`
    pub fn new(entity: EntityType, context: RequestContext) -> Self {
        Self {
            entity,
            context,
            direct_columns: IndexSet::new(),
            support_columns: IndexSet::new(),
            annotations: IndexMap::new(),
            join_children: IndexMap::new(),
            follow_up_children: IndexMap::new(),
            window: None,
        }
    }

    pub fn entity(&self) -> &EntityType {
        &self.entity
    }

    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    pub fn direct_columns(&self) -> &IndexSet<String> {
        &self.direct_columns
    }

    pub fn support_columns(&self) -> &IndexSet<String> {
        &self.support_columns
    }

    pub fn annotations(&self) -> &IndexMap<String, Expression> {
        &self.annotations
    }

    pub fn join_children(&self) -> &IndexMap<String, OptimizationNode> {
        &self.join_children
    }

    pub fn follow_up_children(&self) -> &IndexMap<String, OptimizationNode> {
        &self.follow_up_children
    }

    pub fn window(&self) -> Option<&PageWindow> {
        self.window.as_ref()
    }

    /// Request a column of this entity's own row
    pub fn add_column(&mut self, name: impl Into<String>) -> &mut Self {
        self.direct_columns.insert(name.into());
        self
    }

    /// Request a column needed to resolve a child relation (usually a key)
    pub fn add_support_column(&mut self, name: impl Into<String>) -> &mut Self {
        self.support_columns.insert(name.into());
        self
    }

    /// Attach a computed expression; a repeated name replaces the expression
    pub fn add_annotation(&mut self, name: impl Into<String>, expression: Expression) -> &mut Self {
        self.annotations.insert(name.into(), expression);
        self
    }

    /// Paginate this node's rows per parent key
    pub fn set_window(&mut self, window: PageWindow) -> &mut Self {
        self.window = Some(window);
        self
    }

    /// Whether compiling this node under a join would lose information.
    ///
    /// Annotations change the row cardinality semantics of the query they are
    /// attached to, and a window needs its own query to number rows in.
    pub fn requires_separate_query(&self) -> bool {
        !self.annotations.is_empty() || self.window.is_some()
    }

    /// Bucket the relation currently lives in
    pub fn strategy_of(&self, relation: &str) -> Option<FetchStrategy> {
        if self.join_children.contains_key(relation) {
            Some(FetchStrategy::Join)
        } else if self.follow_up_children.contains_key(relation) {
            Some(FetchStrategy::FollowUp)
        } else {
            None
        }
    }

    /// Child node for a relation, from either bucket
    pub fn child(&self, relation: &str) -> Option<&OptimizationNode> {
        self.join_children
            .get(relation)
            .or_else(|| self.follow_up_children.get(relation))
    }

    /// Child node for `relation`, created in the `strategy` bucket when absent.
    ///
    /// An existing child is returned from whichever bucket holds it; the
    /// requested strategy only decides where a new child goes.
    pub fn child_mut(
        &mut self,
        relation: &str,
        entity: EntityType,
        strategy: FetchStrategy,
    ) -> OptimizerResult<&mut OptimizationNode> {
        let context = self.context.clone();
        let bucket = match self.strategy_of(relation).unwrap_or(strategy) {
            FetchStrategy::Join => &mut self.join_children,
            FetchStrategy::FollowUp => &mut self.follow_up_children,
        };

        let child = bucket
            .entry(relation.to_string())
            .or_insert_with(|| OptimizationNode::new(entity.clone(), context));

        if child.entity != entity {
            return Err(OptimizerError::EntityMismatch {
                expected: child.entity.clone(),
                found: entity,
            });
        }
        Ok(child)
    }

    pub fn child_for_join(
        &mut self,
        relation: &str,
        entity: EntityType,
    ) -> OptimizerResult<&mut OptimizationNode> {
        self.child_mut(relation, entity, FetchStrategy::Join)
    }

    pub fn child_for_follow_up(
        &mut self,
        relation: &str,
        entity: EntityType,
    ) -> OptimizerResult<&mut OptimizationNode> {
        self.child_mut(relation, entity, FetchStrategy::FollowUp)
    }

    /// Insert a fully built child subtree, merging into an existing child of
    /// the same relation.
    ///
    /// A relation that either side wants as a follow-up ends up as one.
    pub fn insert_child(
        &mut self,
        relation: &str,
        child: OptimizationNode,
        strategy: FetchStrategy,
    ) -> OptimizerResult<()> {
        match self.strategy_of(relation) {
            None => {
                let bucket = match strategy {
                    FetchStrategy::Join => &mut self.join_children,
                    FetchStrategy::FollowUp => &mut self.follow_up_children,
                };
                bucket.insert(relation.to_string(), child);
            }
            Some(existing) => {
                let target = match existing {
                    FetchStrategy::Join => self.join_children.get_mut(relation),
                    FetchStrategy::FollowUp => self.follow_up_children.get_mut(relation),
                };
                if let Some(target) = target {
                    target.merge(child)?;
                }
                if existing == FetchStrategy::Join && strategy == FetchStrategy::FollowUp {
                    self.promote(relation);
                }
            }
        }
        Ok(())
    }

    /// Move a relation from the join bucket to the follow-up bucket.
    ///
    /// Returns false when the relation is not a join child.
    pub fn promote(&mut self, relation: &str) -> bool {
        match self.join_children.shift_remove(relation) {
            Some(child) => {
                trace!(entity = %self.entity, relation, "promoting join to follow-up");
                self.follow_up_children.insert(relation.to_string(), child);
                true
            }
            None => false,
        }
    }

    /// Combine the requirements of `other`, which describes the same
    /// position of the graph (an aliased or repeated selection).
    ///
    /// Columns are unioned, a repeated annotation name takes `other`'s
    /// expression, and children present on both sides merge recursively.
    /// Two windows merge into one covering both pages; a side without a
    /// window fetches every row, so the merged node has none.
    pub fn merge(&mut self, other: OptimizationNode) -> OptimizerResult<&mut Self> {
        if self.entity != other.entity {
            return Err(OptimizerError::EntityMismatch {
                expected: self.entity.clone(),
                found: other.entity,
            });
        }

        self.direct_columns.extend(other.direct_columns);
        self.support_columns.extend(other.support_columns);
        self.annotations.extend(other.annotations);
        self.window = match (self.window.take(), other.window) {
            (Some(window), Some(other_window)) => Some(window.union(&other_window)?),
            _ => None,
        };

        for (relation, child) in other.join_children {
            self.insert_child(&relation, child, FetchStrategy::Join)?;
        }
        for (relation, child) in other.follow_up_children {
            self.insert_child(&relation, child, FetchStrategy::FollowUp)?;
        }

        Ok(self)
    }

    /// Rough cost of this subtree: one point per child relation, recursively.
    ///
    /// Support columns and annotations do not count.
    pub fn complexity(&self) -> usize {
        self.join_children
            .values()
            .chain(self.follow_up_children.values())
            .map(|child| 1 + child.complexity())
            .sum()
    }
}

//! Selection walker - builds an optimization node tree from a parsed selection
//!
//! Scalar fields become columns, declared computed fields become annotations,
//! to-one relations are joined and to-many relations are fetched by a
//! follow-up query. Connection-shaped selections (`edges { node { .. } }`)
//! are unwrapped and paginated per parent row.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::config::OptimizerConfig;
use crate::entity::{EntityType, RequestContext};
use crate::error::{OptimizerError, OptimizerResult};
use crate::expression::Expression;
use crate::guard::ensure_within_complexity;
use crate::node::{FetchStrategy, OptimizationNode, PageWindow};
use crate::registry::{ModelRegistry, RelationMeta, RelationshipType};
use crate::store::OrderDirection;

const TYPENAME_FIELD: &str = "__typename";
const EDGES_FIELD: &str = "edges";
const NODE_FIELD: &str = "node";
const PAGE_INFO_FIELD: &str = "pageInfo";
const TOTAL_COUNT_FIELD: &str = "totalCount";

/// Annotation holding the size of each parent's related collection
pub const TOTAL_COUNT_ANNOTATION: &str = "_total_count";

/// One requested field with its arguments and nested fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub name: String,
    pub alias: Option<String>,
    pub arguments: HashMap<String, Value>,
    pub selections: Vec<Selection>,
}

impl Selection {
    pub fn field(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_argument(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.insert(name.into(), value.into());
        self
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selections.push(selection);
        self
    }

    /// Add plain nested fields
    pub fn with_fields(mut self, names: &[&str]) -> Self {
        self.selections
            .extend(names.iter().map(|name| Selection::field(*name)));
        self
    }

    /// Key the field appears under in the response
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    fn is_connection(&self) -> bool {
        self.selections.iter().any(|selection| {
            matches!(
                selection.name.as_str(),
                EDGES_FIELD | PAGE_INFO_FIELD | TOTAL_COUNT_FIELD
            )
        })
    }

    /// Fields requested under `edges { node { .. } }`
    fn connection_nodes(&self) -> impl Iterator<Item = &Selection> {
        self.selections
            .iter()
            .filter(|selection| selection.name == EDGES_FIELD)
            .flat_map(|edges| edges.selections.iter())
            .filter(|selection| selection.name == NODE_FIELD)
            .flat_map(|node| node.selections.iter())
    }

    fn requests_total_count(&self) -> bool {
        self.selections
            .iter()
            .any(|selection| selection.name == TOTAL_COUNT_FIELD)
    }
}

/// Walks selections against the model registry
pub struct SelectionWalker<'a> {
    registry: &'a ModelRegistry,
    config: &'a OptimizerConfig,
}

impl<'a> SelectionWalker<'a> {
    pub fn new(registry: &'a ModelRegistry, config: &'a OptimizerConfig) -> Self {
        Self { registry, config }
    }

    /// Build the node tree for `selections` requested on `entity`.
    ///
    /// Fails when the tree is over the configured complexity limit.
    pub fn walk(
        &self,
        entity: &EntityType,
        context: &RequestContext,
        selections: &[Selection],
    ) -> OptimizerResult<OptimizationNode> {
        let mut node = OptimizationNode::new(entity.clone(), context.clone());
        self.visit(&mut node, selections)?;

        let complexity = ensure_within_complexity(&node, self.config)?;
        debug!(entity = %entity, complexity, "walked selection");
        Ok(node)
    }

    fn visit<'s>(
        &self,
        node: &mut OptimizationNode,
        selections: impl IntoIterator<Item = &'s Selection>,
    ) -> OptimizerResult<()> {
        let meta = self.registry.entity(node.entity())?;

        for selection in selections {
            if selection.name == TYPENAME_FIELD {
                continue;
            }
            if let Some(expression) = meta.computed_field(&selection.name) {
                node.add_annotation(selection.name.clone(), expression.clone());
            } else if let Some(relation) = meta.relation(&selection.name) {
                self.visit_relation(node, relation, selection)?;
            } else {
                node.add_column(selection.name.clone());
            }
        }
        Ok(())
    }

    fn visit_relation(
        &self,
        node: &mut OptimizationNode,
        relation: &RelationMeta,
        selection: &Selection,
    ) -> OptimizerResult<()> {
        node.add_support_column(relation.parent_key_column());

        let mut child =
            OptimizationNode::new(relation.related_entity.clone(), node.context().clone());

        if !relation.relationship_type.is_collection() {
            if relation.relationship_type == RelationshipType::HasOne {
                child.add_support_column(relation.child_key_column());
            }
            self.visit(&mut child, &selection.selections)?;
            return node.insert_child(&relation.name, child, FetchStrategy::Join);
        }

        // Follow-up rows are matched to parents through the foreign key
        let partition_by = relation.child_key_column();
        child.add_support_column(partition_by);

        if selection.is_connection() {
            self.visit(&mut child, selection.connection_nodes())?;
            if selection.requests_total_count() {
                child.add_annotation(
                    TOTAL_COUNT_ANNOTATION,
                    Expression::window_count(partition_by),
                );
            }
        } else {
            self.visit(&mut child, &selection.selections)?;
        }

        let paginated = selection.is_connection();
        if let Some(window) = self.page_window(selection, partition_by, paginated)? {
            child.set_window(window);
        }

        node.insert_child(&relation.name, child, FetchStrategy::FollowUp)
    }

    /// Window for the `first`/`offset`/`orderBy` arguments of a to-many field.
    ///
    /// Connections are always paginated; plain lists without pagination
    /// arguments are fetched whole.
    fn page_window(
        &self,
        selection: &Selection,
        partition_by: &str,
        paginated: bool,
    ) -> OptimizerResult<Option<PageWindow>> {
        let first = usize_argument(selection, "first")?;
        let offset = usize_argument(selection, "offset")?;
        if !paginated && first.is_none() && offset.is_none() {
            return Ok(None);
        }

        let limit = first.unwrap_or(self.config.default_page_size);
        let mut window = PageWindow::new(partition_by, limit).with_offset(offset.unwrap_or(0));

        if let Some(order_by) = selection.arguments.get("orderBy") {
            for (column, direction) in ordering_argument(selection, order_by)? {
                window = window.order_by(column, direction);
            }
        }
        Ok(Some(window))
    }
}

fn usize_argument(selection: &Selection, argument: &str) -> OptimizerResult<Option<usize>> {
    match selection.arguments.get(argument) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|number| usize::try_from(number).ok())
            .map(Some)
            .ok_or_else(|| OptimizerError::InvalidArgument {
                field: selection.name.clone(),
                argument: argument.to_string(),
                value: value.to_string(),
            }),
    }
}

/// `"name"`, `"-name"` or `"-surface_area,name"`
fn ordering_argument(
    selection: &Selection,
    value: &Value,
) -> OptimizerResult<Vec<(String, OrderDirection)>> {
    let invalid = || OptimizerError::InvalidArgument {
        field: selection.name.clone(),
        argument: "orderBy".to_string(),
        value: value.to_string(),
    };

    let ordering = value.as_str().ok_or_else(invalid)?;
    ordering
        .split(',')
        .map(str::trim)
        .map(|column| {
            let (name, direction) = match column.strip_prefix('-') {
                Some(name) => (name, OrderDirection::Desc),
                None => (column, OrderDirection::Asc),
            };
            if name.is_empty() {
                return Err(invalid());
            }
            Ok((name.to_string(), direction))
        })
        .collect()
}

//! Plan compiler - turns an optimization node tree into store instructions
//!
//! Join children are flattened into the parent plan with their columns and
//! join paths qualified by the relation name. Follow-up children (and join
//! children that need a query of their own) become separately optimized
//! queries. The compiler is synchronous and never executes anything.

use serde_json::Value;
use tracing::{debug, trace};

use crate::config::OptimizerConfig;
use crate::error::{OptimizerError, OptimizerResult};
use crate::filters::FilterTable;
use crate::node::{join_path, OptimizationNode};
use crate::plan::{CompiledPlan, FollowUp};
use crate::store::{QueryHandle, QueryStore};

/// Compiles node trees against a store, filter table and configuration
pub struct PlanCompiler<'a, S: QueryStore> {
    store: &'a S,
    filters: &'a FilterTable<S::Query>,
    config: &'a OptimizerConfig,
}

impl<'a, S: QueryStore> PlanCompiler<'a, S> {
    pub fn new(
        store: &'a S,
        filters: &'a FilterTable<S::Query>,
        config: &'a OptimizerConfig,
    ) -> Self {
        Self {
            store,
            filters,
            config,
        }
    }

    pub fn config(&self) -> &OptimizerConfig {
        self.config
    }

    /// Compile `node` into a flat plan.
    ///
    /// Follow-up queries are built and optimized here; the node must not be
    /// mutated after its plan is compiled.
    pub fn compile(&self, node: &OptimizationNode) -> OptimizerResult<CompiledPlan<S::Query>> {
        let mut plan = CompiledPlan::default();
        plan.columns.extend(node.direct_columns().iter().cloned());

        for (relation, child) in node.join_children() {
            self.check_relation(node, relation, child)?;
            if child.requires_separate_query() {
                debug!(
                    entity = %node.entity(),
                    relation = %relation,
                    "join needs its own query, fetching as follow-up"
                );
                self.compile_follow_up(relation, child, &mut plan)?;
            } else {
                self.compile_join(relation, child, &mut plan)?;
            }
        }

        for (relation, child) in node.follow_up_children() {
            self.check_relation(node, relation, child)?;
            self.compile_follow_up(relation, child, &mut plan)?;
        }

        trace!(entity = %node.entity(), plan = %plan, "compiled plan");
        Ok(plan)
    }

    /// Compile `node` and apply the plan to `query`.
    ///
    /// A query already marked optimized is returned untouched. Errors from
    /// the filter hook or the store propagate as they are; instructions
    /// applied before the failure are not undone.
    pub fn optimize_query(
        &self,
        node: &OptimizationNode,
        query: S::Query,
        primary_key: Option<&Value>,
    ) -> OptimizerResult<S::Query> {
        if query.is_optimized() {
            trace!(entity = %node.entity(), "query already optimized");
            return Ok(query);
        }

        let plan = self.compile(node)?;
        let mut query = query;

        if let Some(key) = primary_key {
            query = query.restrict_to_key(key)?;
        }

        // Filters may reference relations, so they run before joins and
        // column restriction narrow the query
        query = self.filters.apply(node.entity(), query, node.context())?;

        if let Some(window) = node.window() {
            query = query.window(window)?;
        }

        let join_count = plan.join_paths.len();
        let follow_up_count = plan.follow_ups.len();

        for follow_up in plan.follow_ups {
            query = query.add_follow_up(follow_up.path, follow_up.query)?;
        }

        for path in &plan.join_paths {
            query = query.add_join_path(path)?;
        }

        if !self.config.disable_column_restriction {
            let mut columns = plan.columns;
            columns.extend(node.support_columns().iter().cloned());
            if !columns.is_empty() {
                let columns: Vec<String> = columns.into_iter().collect();
                query = query.restrict_columns(&columns)?;
            }
        }

        for (name, expression) in node.annotations() {
            query = query.add_computed(name, expression.clone())?;
        }

        debug!(
            entity = %node.entity(),
            joins = join_count,
            follow_ups = follow_up_count,
            annotations = node.annotations().len(),
            "optimized query"
        );
        Ok(query.mark_optimized())
    }

    fn compile_join(
        &self,
        relation: &str,
        child: &OptimizationNode,
        plan: &mut CompiledPlan<S::Query>,
    ) -> OptimizerResult<()> {
        plan.join_paths.insert(relation.to_string());

        let nested = self.compile(child)?;
        for column in nested.columns.iter().chain(child.support_columns()) {
            plan.columns.insert(join_path(relation, column));
        }
        for path in &nested.join_paths {
            plan.join_paths.insert(join_path(relation, path));
        }
        for mut follow_up in nested.follow_ups {
            follow_up.add_prefix(relation);
            plan.follow_ups.push(follow_up);
        }
        Ok(())
    }

    fn compile_follow_up(
        &self,
        relation: &str,
        child: &OptimizationNode,
        plan: &mut CompiledPlan<S::Query>,
    ) -> OptimizerResult<()> {
        let query = self.store.query_for(child.entity())?;
        let query = self.optimize_query(child, query, None)?;
        plan.follow_ups.push(FollowUp::new(relation, query));
        Ok(())
    }

    /// The registry must agree with the tree the walker built
    fn check_relation(
        &self,
        node: &OptimizationNode,
        relation: &str,
        child: &OptimizationNode,
    ) -> OptimizerResult<()> {
        let related = self.store.related_entity(node.entity(), relation)?;
        if &related != child.entity() {
            return Err(OptimizerError::EntityMismatch {
                expected: related,
                found: child.entity().clone(),
            });
        }
        Ok(())
    }
}

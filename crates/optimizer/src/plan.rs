//! Compiled fetch plans

use std::fmt;

use indexmap::IndexSet;

use crate::node::join_path;

/// A relation fetched by its own query, addressed by its dotted path from
/// the query it is attached to
#[derive(Debug, Clone)]
pub struct FollowUp<Q> {
    pub path: String,
    pub query: Q,
}

impl<Q> FollowUp<Q> {
    pub fn new(path: impl Into<String>, query: Q) -> Self {
        Self {
            path: path.into(),
            query,
        }
    }

    /// Re-address the follow-up from one relation further up
    pub fn add_prefix(&mut self, prefix: &str) {
        self.path = join_path(prefix, &self.path);
    }
}

/// Flat result of compiling an optimization node
#[derive(Debug, Clone)]
pub struct CompiledPlan<Q> {
    /// Columns to restrict the query to, joined columns qualified by path
    pub columns: IndexSet<String>,
    /// Relation paths to join into the query
    pub join_paths: IndexSet<String>,
    /// Relations fetched by separate queries
    pub follow_ups: Vec<FollowUp<Q>>,
}

impl<Q> Default for CompiledPlan<Q> {
    fn default() -> Self {
        Self {
            columns: IndexSet::new(),
            join_paths: IndexSet::new(),
            follow_ups: Vec::new(),
        }
    }
}

impl<Q> CompiledPlan<Q> {
    pub fn follow_up_paths(&self) -> Vec<&str> {
        self.follow_ups
            .iter()
            .map(|follow_up| follow_up.path.as_str())
            .collect()
    }
}

impl<Q> fmt::Display for CompiledPlan<Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let columns: Vec<&str> = self.columns.iter().map(String::as_str).collect();
        let joins: Vec<&str> = self.join_paths.iter().map(String::as_str).collect();
        write!(
            f,
            "columns=[{}]|joins=[{}]|follow_ups=[{}]",
            columns.join(","),
            joins.join(","),
            self.follow_up_paths().join(",")
        )
    }
}

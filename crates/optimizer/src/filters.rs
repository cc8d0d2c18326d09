//! Per-entity filter hooks
//!
//! Hooks apply request-scoped filtering and ordering to a query before the
//! planner restricts its columns. The table is built by the caller and handed
//! to the compiler; an entity without a hook passes through unchanged.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::entity::{EntityType, RequestContext};
use crate::error::OptimizerResult;

/// Filter function for one entity type
pub type FilterHook<Q> = Arc<dyn Fn(Q, &RequestContext) -> OptimizerResult<Q> + Send + Sync>;

/// Capability table mapping entity types to their optional filter hook
pub struct FilterTable<Q> {
    hooks: HashMap<EntityType, FilterHook<Q>>,
}

impl<Q> Default for FilterTable<Q> {
    fn default() -> Self {
        Self {
            hooks: HashMap::new(),
        }
    }
}

impl<Q> Clone for FilterTable<Q> {
    fn clone(&self) -> Self {
        Self {
            hooks: self.hooks.clone(),
        }
    }
}

impl<Q> fmt::Debug for FilterTable<Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterTable")
            .field("entities", &self.hooks.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<Q> FilterTable<Q> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the hook for `entity`, replacing an earlier one
    pub fn register<F>(&mut self, entity: impl Into<EntityType>, hook: F)
    where
        F: Fn(Q, &RequestContext) -> OptimizerResult<Q> + Send + Sync + 'static,
    {
        self.hooks.insert(entity.into(), Arc::new(hook));
    }

    /// Builder form of [`FilterTable::register`]
    pub fn with_hook<F>(mut self, entity: impl Into<EntityType>, hook: F) -> Self
    where
        F: Fn(Q, &RequestContext) -> OptimizerResult<Q> + Send + Sync + 'static,
    {
        self.register(entity, hook);
        self
    }

    pub fn has_hook(&self, entity: &EntityType) -> bool {
        self.hooks.contains_key(entity)
    }

    /// Run the hook for `entity`, if any
    pub fn apply(
        &self,
        entity: &EntityType,
        query: Q,
        context: &RequestContext,
    ) -> OptimizerResult<Q> {
        match self.hooks.get(entity) {
            Some(hook) => {
                trace!(entity = %entity, "applying filter hook");
                hook(query, context)
            }
            None => Ok(query),
        }
    }
}

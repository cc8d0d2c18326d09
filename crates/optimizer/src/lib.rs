//! # elif-graph-optimizer: Query planning for nested object-graph requests
//!
//! Translates the shape of a requested object graph into an efficient fetch
//! plan for a relational store: only the requested columns, to-one relations
//! joined into the parent query, to-many relations fetched through a single
//! follow-up query each (windowed per parent row when paginated).
//!
//! The walker builds an [`OptimizationNode`] tree while visiting a selection,
//! then a [`PlanCompiler`] turns that tree into a [`CompiledPlan`] and applies
//! it to a [`QueryHandle`].

pub mod compiler;
pub mod config;
pub mod entity;
pub mod error;
pub mod expression;
pub mod filters;
pub mod guard;
pub mod logging;
pub mod node;
pub mod plan;
pub mod registry;
pub mod store;
pub mod walker;

// Re-export the types a walker needs to build and apply plans
pub use compiler::PlanCompiler;
pub use config::{ConfigSource, ConfigTrait, LoggingConfig, OptimizerConfig};
pub use entity::{EntityType, RequestContext};
pub use error::{ConfigError, OptimizerError, OptimizerResult};
pub use expression::Expression;
pub use filters::{FilterHook, FilterTable};
pub use guard::ensure_within_complexity;
pub use node::{join_path, FetchStrategy, OptimizationNode, PageWindow, PATH_SEPARATOR};
pub use plan::{CompiledPlan, FollowUp};
pub use registry::{EntityMeta, ModelRegistry, RelationMeta, RelationshipType};
pub use store::{OrderDirection, QueryHandle, QueryStore, SelectQuery, SqlStore};
pub use walker::{Selection, SelectionWalker};

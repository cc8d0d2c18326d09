//! Error types for the query optimizer
//!
//! The planner itself only fails on structural misuse (a node tree that
//! disagrees with the model registry). Errors raised by filter hooks, the
//! registry or a store handle travel through the same type unchanged.

use thiserror::Error;

use crate::entity::EntityType;

/// Result type alias for optimizer operations
pub type OptimizerResult<T> = Result<T, OptimizerError>;

/// Error types for planning and applying fetch plans
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimizerError {
    /// Two nodes for different entity types were combined
    #[error("Cannot combine a node for '{found}' with a node for '{expected}'")]
    EntityMismatch {
        expected: EntityType,
        found: EntityType,
    },

    /// Relation name not known for the entity
    #[error("Entity '{entity}' has no relation named '{relation}'")]
    UnknownRelation { entity: EntityType, relation: String },

    /// Entity type missing from the registry
    #[error("Entity '{0}' is not registered")]
    UnknownEntity(EntityType),

    /// Malformed dotted relation path
    #[error("Invalid relation path '{0}'")]
    InvalidPath(String),

    /// Request shape is too expensive to plan
    #[error("Query complexity {complexity} exceeds the maximum of {max}")]
    ComplexityExceeded { complexity: usize, max: usize },

    /// Selection argument with an unusable value
    #[error("Invalid value for argument '{argument}' on '{field}': {value}")]
    InvalidArgument {
        field: String,
        argument: String,
        value: String,
    },

    /// Two page windows for the same relation that cannot be combined
    #[error("Cannot combine page windows: {0}")]
    WindowConflict(String),

    /// Raised by a per-entity filter hook
    #[error("Filter error: {0}")]
    Filter(String),

    /// Raised by the store's query builder
    #[error("Store error: {0}")]
    Store(String),

    /// Invalid optimizer configuration
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Configuration loading and validation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Invalid value for {field}: '{value}', expected {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },

    #[error("Validation failed for {field}: {reason}")]
    ValidationFailed { field: String, reason: String },
}

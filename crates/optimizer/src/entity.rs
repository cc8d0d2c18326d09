//! Entity identifiers and the opaque per-request context

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Identifies an entity kind in the model registry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityType(String);

impl EntityType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Handle to the in-flight request.
///
/// The planner never reads it; it is cloned into every node and handed to
/// filter hooks so they can apply request-scoped filtering and ordering.
#[derive(Debug, Clone)]
pub struct RequestContext {
    inner: Arc<RequestData>,
}

#[derive(Debug, Clone)]
struct RequestData {
    request_id: Uuid,
    variables: HashMap<String, Value>,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestContext {
    /// Create a context for a new request
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RequestData {
                request_id: Uuid::new_v4(),
                variables: HashMap::new(),
            }),
        }
    }

    /// Attach a request variable
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        Arc::make_mut(&mut self.inner)
            .variables
            .insert(name.into(), value.into());
        self
    }

    pub fn request_id(&self) -> Uuid {
        self.inner.request_id
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.inner.variables.get(name)
    }

    /// Whether two handles refer to the same request
    pub fn same_request(&self, other: &RequestContext) -> bool {
        self.inner.request_id == other.inner.request_id
    }
}

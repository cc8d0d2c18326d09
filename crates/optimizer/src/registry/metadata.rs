//! Entity and relationship metadata

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::entity::EntityType;
use crate::error::{OptimizerError, OptimizerResult};
use crate::expression::Expression;

/// Defines the type of relationship between entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationshipType {
    /// One-to-one, foreign key on the related table
    HasOne,
    /// One-to-many, foreign key on the related table
    HasMany,
    /// Many-to-one, foreign key on this table
    BelongsTo,
}

impl RelationshipType {
    /// Returns true if this relationship returns a collection
    pub fn is_collection(self) -> bool {
        matches!(self, Self::HasMany)
    }
}

/// Relationship metadata between an entity and a related entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationMeta {
    /// The type of relationship
    pub relationship_type: RelationshipType,

    /// Name of the relationship (field name on the entity)
    pub name: String,

    /// Entity on the other end
    pub related_entity: EntityType,

    /// Foreign key column
    pub foreign_key: String,

    /// Key the foreign key references (defaults to "id")
    pub local_key: String,
}

impl RelationMeta {
    pub fn new(
        relationship_type: RelationshipType,
        name: impl Into<String>,
        related_entity: impl Into<EntityType>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            relationship_type,
            name: name.into(),
            related_entity: related_entity.into(),
            foreign_key: foreign_key.into(),
            local_key: "id".to_string(),
        }
    }

    pub fn has_one(
        name: impl Into<String>,
        related_entity: impl Into<EntityType>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self::new(RelationshipType::HasOne, name, related_entity, foreign_key)
    }

    pub fn has_many(
        name: impl Into<String>,
        related_entity: impl Into<EntityType>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self::new(RelationshipType::HasMany, name, related_entity, foreign_key)
    }

    pub fn belongs_to(
        name: impl Into<String>,
        related_entity: impl Into<EntityType>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self::new(RelationshipType::BelongsTo, name, related_entity, foreign_key)
    }

    /// Set the referenced key
    pub fn with_local_key(mut self, local_key: impl Into<String>) -> Self {
        self.local_key = local_key.into();
        self
    }

    /// Column on the owning entity's row needed to resolve this relation
    pub fn parent_key_column(&self) -> &str {
        match self.relationship_type {
            RelationshipType::BelongsTo => &self.foreign_key,
            RelationshipType::HasOne | RelationshipType::HasMany => &self.local_key,
        }
    }

    /// Column on the related row that matches `parent_key_column`
    pub fn child_key_column(&self) -> &str {
        match self.relationship_type {
            RelationshipType::BelongsTo => &self.local_key,
            RelationshipType::HasOne | RelationshipType::HasMany => &self.foreign_key,
        }
    }

    /// Validate the relationship metadata for consistency
    pub fn validate(&self) -> OptimizerResult<()> {
        if self.name.is_empty() {
            return Err(OptimizerError::Store(
                "Relationship name cannot be empty".to_string(),
            ));
        }
        if self.name.contains(crate::node::PATH_SEPARATOR) {
            return Err(OptimizerError::InvalidPath(self.name.clone()));
        }
        if self.foreign_key.is_empty() || self.local_key.is_empty() {
            return Err(OptimizerError::Store(format!(
                "Relationship '{}' must name both key columns",
                self.name
            )));
        }
        Ok(())
    }
}

/// Table mapping, relations and computed fields of an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMeta {
    pub entity: EntityType,
    pub table: String,
    pub primary_key: String,
    pub relations: IndexMap<String, RelationMeta>,
    /// Fields backed by a computed expression instead of a column
    pub computed: IndexMap<String, Expression>,
}

impl EntityMeta {
    pub fn new(entity: impl Into<EntityType>, table: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            table: table.into(),
            primary_key: "id".to_string(),
            relations: IndexMap::new(),
            computed: IndexMap::new(),
        }
    }

    pub fn with_primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = primary_key.into();
        self
    }

    pub fn with_relation(mut self, relation: RelationMeta) -> Self {
        self.relations.insert(relation.name.clone(), relation);
        self
    }

    pub fn with_computed(mut self, name: impl Into<String>, expression: Expression) -> Self {
        self.computed.insert(name.into(), expression);
        self
    }

    pub fn relation(&self, name: &str) -> Option<&RelationMeta> {
        self.relations.get(name)
    }

    pub fn computed_field(&self, name: &str) -> Option<&Expression> {
        self.computed.get(name)
    }
}

//! Model registry - entity metadata lookup for walkers and the SQL store
//!
//! Built once at startup and shared read-only between requests.

pub mod metadata;

use std::collections::HashMap;

use tracing::debug;

use crate::entity::EntityType;
use crate::error::{OptimizerError, OptimizerResult};
use crate::node::PATH_SEPARATOR;

pub use metadata::{EntityMeta, RelationMeta, RelationshipType};

/// Registry of entity metadata keyed by entity type
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    entities: HashMap<EntityType, EntityMeta>,
}

impl ModelRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity, replacing earlier metadata for the same type
    pub fn register(&mut self, meta: EntityMeta) -> OptimizerResult<()> {
        for relation in meta.relations.values() {
            relation.validate()?;
        }
        debug!(
            entity = %meta.entity,
            table = %meta.table,
            relations = meta.relations.len(),
            "registering entity"
        );
        self.entities.insert(meta.entity.clone(), meta);
        Ok(())
    }

    /// Builder form of [`ModelRegistry::register`]
    pub fn with_entity(mut self, meta: EntityMeta) -> OptimizerResult<Self> {
        self.register(meta)?;
        Ok(self)
    }

    pub fn entity(&self, entity: &EntityType) -> OptimizerResult<&EntityMeta> {
        self.entities
            .get(entity)
            .ok_or_else(|| OptimizerError::UnknownEntity(entity.clone()))
    }

    pub fn relation(&self, entity: &EntityType, name: &str) -> OptimizerResult<&RelationMeta> {
        self.entity(entity)?
            .relation(name)
            .ok_or_else(|| OptimizerError::UnknownRelation {
                entity: entity.clone(),
                relation: name.to_string(),
            })
    }

    /// Resolve every hop of a dotted relation path starting at `entity`
    pub fn resolve_path(
        &self,
        entity: &EntityType,
        path: &str,
    ) -> OptimizerResult<Vec<&RelationMeta>> {
        if path.is_empty() {
            return Err(OptimizerError::InvalidPath(path.to_string()));
        }

        let mut current = entity;
        let mut hops = Vec::new();
        for segment in path.split(PATH_SEPARATOR) {
            if segment.is_empty() {
                return Err(OptimizerError::InvalidPath(path.to_string()));
            }
            let relation = self.relation(current, segment)?;
            current = &relation.related_entity;
            hops.push(relation);
        }
        Ok(hops)
    }

    pub fn contains(&self, entity: &EntityType) -> bool {
        self.entities.contains_key(entity)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ModelRegistry {
        ModelRegistry::new()
            .with_entity(
                EntityMeta::new("Apartment", "example_apartment")
                    .with_relation(RelationMeta::belongs_to("building", "Building", "building_id")),
            )
            .unwrap()
            .with_entity(
                EntityMeta::new("Building", "example_building").with_relation(
                    RelationMeta::belongs_to("real_estate", "RealEstate", "real_estate_id"),
                ),
            )
            .unwrap()
            .with_entity(EntityMeta::new("RealEstate", "example_realestate"))
            .unwrap()
    }

    #[test]
    fn test_resolve_path_walks_every_hop() {
        let registry = registry();
        let hops = registry
            .resolve_path(&EntityType::new("Apartment"), "building__real_estate")
            .unwrap();
        let tables: Vec<_> = hops
            .iter()
            .map(|hop| registry.entity(&hop.related_entity).unwrap().table.as_str())
            .collect();
        assert_eq!(tables, vec!["example_building", "example_realestate"]);
    }

    #[test]
    fn test_unknown_relation_is_reported() {
        let registry = registry();
        let err = registry
            .resolve_path(&EntityType::new("Apartment"), "building__owner")
            .unwrap_err();
        assert_eq!(
            err,
            OptimizerError::UnknownRelation {
                entity: EntityType::new("Building"),
                relation: "owner".to_string(),
            }
        );
    }

    #[test]
    fn test_malformed_path_is_rejected() {
        let registry = registry();
        assert!(matches!(
            registry.resolve_path(&EntityType::new("Apartment"), "building____real_estate"),
            Err(OptimizerError::InvalidPath(_))
        ));
        assert!(matches!(
            registry.resolve_path(&EntityType::new("Apartment"), ""),
            Err(OptimizerError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_unknown_entity_is_reported() {
        let registry = registry();
        assert_eq!(
            registry.entity(&EntityType::new("Owner")).unwrap_err(),
            OptimizerError::UnknownEntity(EntityType::new("Owner"))
        );
        assert_eq!(registry.len(), 3);
    }
}

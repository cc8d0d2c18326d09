//! Housing company model shared by the integration tests

use std::sync::Arc;

use elif_graph_optimizer::{EntityMeta, Expression, ModelRegistry, RelationMeta};

pub fn housing_registry() -> Arc<ModelRegistry> {
    let registry = ModelRegistry::new()
        .with_entity(
            EntityMeta::new("HousingCompany", "example_housingcompany")
                .with_relation(
                    RelationMeta::belongs_to("postal_code", "PostalCode", "postal_code_id")
                        .with_local_key("code"),
                )
                .with_relation(RelationMeta::belongs_to(
                    "property_manager",
                    "PropertyManager",
                    "property_manager_id",
                ))
                .with_relation(RelationMeta::has_one(
                    "shareholder_register",
                    "ShareholderRegister",
                    "housing_company_id",
                ))
                .with_relation(RelationMeta::has_many(
                    "developers",
                    "Developer",
                    "housing_company_id",
                ))
                .with_relation(RelationMeta::has_many(
                    "real_estates",
                    "RealEstate",
                    "housing_company_id",
                ))
                .with_computed("developer_count", Expression::count("developers")),
        )
        .and_then(|registry| {
            registry.with_entity(
                EntityMeta::new("PostalCode", "example_postalcode").with_primary_key("code"),
            )
        })
        .and_then(|registry| {
            registry.with_entity(EntityMeta::new(
                "ShareholderRegister",
                "example_shareholderregister",
            ))
        })
        .and_then(|registry| {
            registry.with_entity(
                EntityMeta::new("PropertyManager", "example_propertymanager").with_computed(
                    "contact",
                    Expression::function(
                        "CONCAT",
                        vec![
                            Expression::column("name"),
                            Expression::literal(" <"),
                            Expression::column("email"),
                            Expression::literal(">"),
                        ],
                    ),
                ),
            )
        })
        .and_then(|registry| {
            registry.with_entity(EntityMeta::new("Developer", "example_developer"))
        })
        .and_then(|registry| {
            registry.with_entity(
                EntityMeta::new("RealEstate", "example_realestate")
                    .with_relation(RelationMeta::belongs_to(
                        "housing_company",
                        "HousingCompany",
                        "housing_company_id",
                    ))
                    .with_relation(RelationMeta::has_many(
                        "buildings",
                        "Building",
                        "real_estate_id",
                    )),
            )
        })
        .and_then(|registry| {
            registry.with_entity(
                EntityMeta::new("Building", "example_building")
                    .with_relation(RelationMeta::belongs_to(
                        "real_estate",
                        "RealEstate",
                        "real_estate_id",
                    ))
                    .with_relation(RelationMeta::has_many(
                        "apartments",
                        "Apartment",
                        "building_id",
                    )),
            )
        })
        .and_then(|registry| {
            registry.with_entity(
                EntityMeta::new("Apartment", "example_apartment")
                    .with_relation(RelationMeta::belongs_to(
                        "building",
                        "Building",
                        "building_id",
                    ))
                    .with_relation(RelationMeta::has_many("sales", "Sale", "apartment_id")),
            )
        })
        .and_then(|registry| {
            registry.with_entity(
                EntityMeta::new("Sale", "example_sale").with_relation(RelationMeta::belongs_to(
                    "apartment",
                    "Apartment",
                    "apartment_id",
                )),
            )
        })
        .expect("housing model is valid");

    Arc::new(registry)
}

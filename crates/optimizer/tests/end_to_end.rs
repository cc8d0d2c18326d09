//! Integration tests for the walk -> compile -> SQL flow
//!
//! Selections are walked against the housing company model, compiled with
//! the SQL store and rendered, validating the statements a request costs.

mod common;

use elif_graph_optimizer::{
    EntityType, FilterTable, OptimizationNode, OptimizerConfig, OptimizerError, PlanCompiler,
    QueryHandle, QueryStore, RequestContext, SelectQuery, Selection, SelectionWalker, SqlStore,
};
use serde_json::json;

use common::housing_registry;

fn walk(
    store: &SqlStore,
    config: &OptimizerConfig,
    entity: &str,
    context: &RequestContext,
    selections: &[Selection],
) -> OptimizationNode {
    SelectionWalker::new(store.registry(), config)
        .walk(&EntityType::new(entity), context, selections)
        .unwrap()
}

fn optimize(
    store: &SqlStore,
    filters: &FilterTable<SelectQuery>,
    config: &OptimizerConfig,
    node: &OptimizationNode,
    primary_key: Option<serde_json::Value>,
) -> SelectQuery {
    let query = store.query_for(node.entity()).unwrap();
    PlanCompiler::new(store, filters, config)
        .optimize_query(node, query, primary_key.as_ref())
        .unwrap()
}

#[test]
fn test_paginated_request_costs_two_statements() {
    let store = SqlStore::new(housing_registry());
    let config = OptimizerConfig::default();
    let node = walk(
        &store,
        &config,
        "HousingCompany",
        &RequestContext::new(),
        &[
            Selection::field("name"),
            Selection::field("postal_code").with_fields(&["code"]),
            Selection::field("real_estates")
                .with_argument("first", 2)
                .with_selection(Selection::field("totalCount"))
                .with_selection(
                    Selection::field("edges")
                        .with_selection(Selection::field("node").with_fields(&["name"])),
                ),
        ],
    );

    let query = optimize(&store, &FilterTable::new(), &config, &node, None);
    assert_eq!(query.round_trips(), 2);

    let statements = query.statements();
    assert_eq!(statements.len(), 2);
    assert_eq!(
        statements[0].sql,
        "SELECT \"example_housingcompany\".\"name\", \
         \"postal_code\".\"code\" AS \"postal_code__code\", \
         \"example_housingcompany\".\"postal_code_id\", \
         \"example_housingcompany\".\"id\" \
         FROM \"example_housingcompany\" \
         LEFT JOIN \"example_postalcode\" AS \"postal_code\" \
         ON \"example_housingcompany\".\"postal_code_id\" = \"postal_code\".\"code\""
    );

    assert_eq!(statements[1].path, "real_estates");
    let follow_up = &statements[1].sql;
    assert!(follow_up.contains(
        "ROW_NUMBER() OVER (PARTITION BY \"example_realestate\".\"housing_company_id\" \
         ORDER BY \"example_realestate\".\"id\" ASC)"
    ));
    assert!(follow_up.contains(
        "COUNT(*) OVER (PARTITION BY \"example_realestate\".\"housing_company_id\") \
         AS \"_total_count\""
    ));
    assert!(follow_up.ends_with(
        "WHERE \"_windowed\".\"_row_number\" > 0 AND \"_windowed\".\"_row_number\" <= 3 \
         ORDER BY \"_windowed\".\"housing_company_id\", \"_windowed\".\"_row_number\""
    ));
}

fn real_estate_connection(alias: &str, first: u64) -> Selection {
    Selection::field("real_estates")
        .with_alias(alias)
        .with_argument("first", first)
        .with_selection(
            Selection::field("edges")
                .with_selection(Selection::field("node").with_fields(&["name"])),
        )
}

#[test]
fn test_aliased_connections_fetch_the_larger_page() {
    let store = SqlStore::new(housing_registry());
    let config = OptimizerConfig::default();
    let node = walk(
        &store,
        &config,
        "HousingCompany",
        &RequestContext::new(),
        &[
            real_estate_connection("big", 10),
            real_estate_connection("small", 2),
        ],
    );

    let query = optimize(&store, &FilterTable::new(), &config, &node, None);
    assert_eq!(query.round_trips(), 2);
    assert!(query.statements()[1]
        .sql
        .contains("\"_windowed\".\"_row_number\" > 0 AND \"_windowed\".\"_row_number\" <= 11"));
}

#[test]
fn test_huge_page_size_does_not_overflow() {
    let store = SqlStore::new(housing_registry());
    let config = OptimizerConfig::default();
    let node = walk(
        &store,
        &config,
        "HousingCompany",
        &RequestContext::new(),
        &[real_estate_connection("all", u64::MAX).with_argument("offset", u64::MAX)],
    );

    let query = optimize(&store, &FilterTable::new(), &config, &node, None);
    let statements = query.statements();
    assert!(statements[1].sql.contains(&format!(
        "\"_windowed\".\"_row_number\" <= {} ORDER BY",
        usize::MAX
    )));
}

#[test]
fn test_has_one_relation_is_joined_on_parent_key() {
    let store = SqlStore::new(housing_registry());
    let config = OptimizerConfig::default();
    let node = walk(
        &store,
        &config,
        "HousingCompany",
        &RequestContext::new(),
        &[
            Selection::field("name"),
            Selection::field("shareholder_register").with_fields(&["updated_at"]),
        ],
    );

    let query = optimize(&store, &FilterTable::new(), &config, &node, None);
    assert_eq!(query.round_trips(), 1);
    assert_eq!(
        query.to_sql(),
        "SELECT \"example_housingcompany\".\"name\", \
         \"shareholder_register\".\"updated_at\" AS \"shareholder_register__updated_at\", \
         \"shareholder_register\".\"housing_company_id\" \
         AS \"shareholder_register__housing_company_id\", \
         \"example_housingcompany\".\"id\" \
         FROM \"example_housingcompany\" \
         LEFT JOIN \"example_shareholderregister\" AS \"shareholder_register\" \
         ON \"example_housingcompany\".\"id\" = \"shareholder_register\".\"housing_company_id\""
    );
}

#[test]
fn test_filter_hook_ordering_numbers_the_window() {
    let store = SqlStore::new(housing_registry());
    let config = OptimizerConfig::default();
    let filters = FilterTable::new().with_hook("RealEstate", |query: SelectQuery, _context| {
        Ok(query.where_null("demolished_at").order_by("name"))
    });
    let node = walk(
        &store,
        &config,
        "HousingCompany",
        &RequestContext::new(),
        &[real_estate_connection("estates", 5)],
    );

    let query = optimize(&store, &filters, &config, &node, None);
    let statements = query.statements();
    let follow_up = &statements[1].sql;
    assert!(follow_up.contains(
        "ROW_NUMBER() OVER (PARTITION BY \"example_realestate\".\"housing_company_id\" \
         ORDER BY \"example_realestate\".\"name\" ASC)"
    ));
    assert!(follow_up.contains("WHERE \"example_realestate\".\"demolished_at\" IS NULL)"));
}

#[test]
fn test_nested_follow_ups_are_addressed_from_root() {
    let store = SqlStore::new(housing_registry());
    let config = OptimizerConfig::default();
    let node = walk(
        &store,
        &config,
        "HousingCompany",
        &RequestContext::new(),
        &[Selection::field("real_estates").with_selection(
            Selection::field("buildings")
                .with_fields(&["street_address"])
                .with_selection(Selection::field("apartments").with_fields(&["apartment_number"])),
        )],
    );

    let query = optimize(&store, &FilterTable::new(), &config, &node, None);
    let paths: Vec<String> = query
        .statements()
        .into_iter()
        .map(|statement| statement.path)
        .collect();
    assert_eq!(
        paths,
        vec![
            "",
            "real_estates",
            "real_estates__buildings",
            "real_estates__buildings__apartments",
        ]
    );
}

#[test]
fn test_to_one_chain_is_a_single_statement() {
    let store = SqlStore::new(housing_registry());
    let config = OptimizerConfig::default();
    let node = walk(
        &store,
        &config,
        "Sale",
        &RequestContext::new(),
        &[
            Selection::field("purchase_price"),
            Selection::field("apartment").with_selection(
                Selection::field("building").with_selection(
                    Selection::field("real_estate").with_selection(
                        Selection::field("housing_company").with_fields(&["name"]),
                    ),
                ),
            ),
        ],
    );

    let query = optimize(&store, &FilterTable::new(), &config, &node, None);
    assert_eq!(query.round_trips(), 1);
    assert_eq!(query.joins().len(), 4);

    let sql = query.to_sql();
    assert!(sql.contains(
        "\"apartment__building__real_estate__housing_company\".\"name\" \
         AS \"apartment__building__real_estate__housing_company__name\""
    ));
    assert!(sql.contains(
        "LEFT JOIN \"example_housingcompany\" \
         AS \"apartment__building__real_estate__housing_company\" \
         ON \"apartment__building__real_estate\".\"housing_company_id\" = \
         \"apartment__building__real_estate__housing_company\".\"id\""
    ));
}

#[test]
fn test_computed_to_one_is_fetched_separately() {
    let store = SqlStore::new(housing_registry());
    let config = OptimizerConfig::default();
    let node = walk(
        &store,
        &config,
        "HousingCompany",
        &RequestContext::new(),
        &[
            Selection::field("name"),
            Selection::field("property_manager").with_fields(&["name", "contact"]),
        ],
    );

    let query = optimize(&store, &FilterTable::new(), &config, &node, None);
    assert!(query.joins().is_empty());
    assert_eq!(query.round_trips(), 2);

    let statements = query.statements();
    assert_eq!(statements[1].path, "property_manager");
    assert!(statements[1].sql.contains(
        "CONCAT(\"example_propertymanager\".\"name\", ' <', \
         \"example_propertymanager\".\"email\", '>') AS \"contact\""
    ));
}

#[test]
fn test_count_annotation_renders_subquery() {
    let store = SqlStore::new(housing_registry());
    let config = OptimizerConfig::default();
    let node = walk(
        &store,
        &config,
        "HousingCompany",
        &RequestContext::new(),
        &[Selection::field("name"), Selection::field("developer_count")],
    );

    let query = optimize(&store, &FilterTable::new(), &config, &node, Some(json!(1)));
    assert_eq!(
        query.to_sql(),
        "SELECT \"example_housingcompany\".\"id\", \"example_housingcompany\".\"name\", \
         (SELECT COUNT(*) FROM \"example_developer\" AS \"_related\" \
         WHERE \"_related\".\"housing_company_id\" = \"example_housingcompany\".\"id\") \
         AS \"developer_count\" \
         FROM \"example_housingcompany\" WHERE \"example_housingcompany\".\"id\" = 1"
    );
}

#[test]
fn test_filter_hook_sees_request_context() {
    let store = SqlStore::new(housing_registry());
    let config = OptimizerConfig::default();
    let filters = FilterTable::new().with_hook("Apartment", |query: SelectQuery, context| {
        Ok(match context.variable("owner") {
            Some(owner) => query.where_eq("owner_id", owner.clone()),
            None => query,
        })
    });
    let context = RequestContext::new().with_variable("owner", "a1b2");
    let node = walk(
        &store,
        &config,
        "Building",
        &context,
        &[Selection::field("apartments").with_fields(&["apartment_number"])],
    );

    let query = optimize(&store, &filters, &config, &node, None);
    let statements = query.statements();
    assert!(statements[1]
        .sql
        .ends_with("WHERE \"example_apartment\".\"owner_id\" = 'a1b2'"));
}

#[test]
fn test_disabled_column_restriction_selects_everything() {
    let store = SqlStore::new(housing_registry());
    let config = OptimizerConfig {
        disable_column_restriction: true,
        ..OptimizerConfig::default()
    };
    let node = walk(
        &store,
        &config,
        "HousingCompany",
        &RequestContext::new(),
        &[
            Selection::field("name"),
            Selection::field("postal_code").with_fields(&["code"]),
        ],
    );

    let query = optimize(&store, &FilterTable::new(), &config, &node, None);
    assert!(query.to_sql().starts_with(
        "SELECT \"example_housingcompany\".* FROM \"example_housingcompany\" LEFT JOIN"
    ));
    assert!(query.is_optimized());
}

#[test]
fn test_optimizing_twice_keeps_the_first_plan() {
    let store = SqlStore::new(housing_registry());
    let config = OptimizerConfig::default();
    let filters = FilterTable::new();
    let node = walk(
        &store,
        &config,
        "HousingCompany",
        &RequestContext::new(),
        &[Selection::field("developers").with_fields(&["name"])],
    );

    let query = optimize(&store, &filters, &config, &node, None);
    let again = PlanCompiler::new(&store, &filters, &config)
        .optimize_query(&node, query.clone(), None)
        .unwrap();
    assert_eq!(again.round_trips(), query.round_trips());
    assert_eq!(again.to_sql(), query.to_sql());
}

#[test]
fn test_complex_request_is_rejected() {
    let store = SqlStore::new(housing_registry());
    let config = OptimizerConfig {
        max_complexity: 2,
        ..OptimizerConfig::default()
    };
    let err = SelectionWalker::new(store.registry(), &config)
        .walk(
            &EntityType::new("HousingCompany"),
            &RequestContext::new(),
            &[Selection::field("real_estates").with_selection(
                Selection::field("buildings")
                    .with_selection(Selection::field("apartments").with_fields(&["id"])),
            )],
        )
        .unwrap_err();
    assert_eq!(
        err,
        OptimizerError::ComplexityExceeded {
            complexity: 3,
            max: 2
        }
    );
}

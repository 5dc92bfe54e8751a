use serde_json::{json, Value};

use crate::{
    response::graphql_error::{
        display_path, GraphQLError, GraphQLErrorPathSegment, DOWNSTREAM_SERVICE_ERROR,
        SUBGRAPH_REQUEST_FAILURE,
    },
    tests::testkit::{
        calls_to, executor_map, init_logger, read_fused_schema, CallLog, MockSubgraph, TestRun,
        PRODUCTS_FIXTURE,
    },
};

fn error_paths(errors: &[GraphQLError]) -> Vec<String> {
    errors
        .iter()
        .map(|error| error.path.as_deref().map(display_path).unwrap_or_default())
        .collect()
}

fn entity_error(message: &str, index: usize, field: &str) -> GraphQLError {
    GraphQLError::from(message).with_path(vec![
        GraphQLErrorPathSegment::from("_entities"),
        GraphQLErrorPathSegment::from(index),
        GraphQLErrorPathSegment::from(field),
    ])
}

#[tokio::test]
async fn partial_subgraph_outage_keeps_other_data() {
    init_logger();
    let schema = read_fused_schema(PRODUCTS_FIXTURE);
    let calls = CallLog::default();
    let executors = executor_map(vec![
        MockSubgraph::new("products", &calls).with_root(json!({
            "topProducts": [
                { "name": "Table", "__typename": "Product", "id": "1" },
                { "name": "Couch", "__typename": "Product", "id": "2" }
            ]
        })),
        MockSubgraph::new("inventory", &calls).failing(),
    ]);

    let response = TestRun::new(&schema, &executors)
        .execute("{ topProducts { name inStock } }", Value::Null)
        .await;

    assert_eq!(
        response.data,
        Some(json!({
            "topProducts": [
                { "name": "Table", "inStock": null },
                { "name": "Couch", "inStock": null }
            ]
        }))
    );
    assert_eq!(
        error_paths(&response.errors),
        vec!["topProducts.0.inStock", "topProducts.1.inStock"]
    );
    assert!(response
        .errors
        .iter()
        .all(|error| error.code() == Some(SUBGRAPH_REQUEST_FAILURE)));

    insta::assert_snapshot!(serde_json::to_string_pretty(&response.errors[0]).unwrap(), @r#"
    {
      "message": "Failed to fetch from subgraph \"inventory\": Failed to send request to subgraph \"inventory\": connection refused",
      "path": [
        "topProducts",
        0,
        "inStock"
      ],
      "extensions": {
        "code": "SUBGRAPH_REQUEST_FAILURE",
        "serviceName": "inventory"
      }
    }
    "#);
}


#[tokio::test]
async fn outage_in_one_of_three_subgraphs() {
    init_logger();
    let schema = read_fused_schema(PRODUCTS_FIXTURE);
    let calls = CallLog::default();
    let executors = executor_map(vec![
        MockSubgraph::new("products", &calls).with_root(json!({
            "topProducts": [
                { "name": "Table", "__typename": "Product", "id": "1" },
                { "name": "Couch", "__typename": "Product", "id": "2" }
            ]
        })),
        MockSubgraph::new("reviews", &calls).failing(),
        MockSubgraph::new("inventory", &calls)
            .with_entity("1", json!({ "inStock": true }))
            .with_entity("2", json!({ "inStock": false })),
    ]);

    let response = TestRun::new(&schema, &executors)
        .execute(
            "{ topProducts { name reviews { body } inStock } }",
            Value::Null,
        )
        .await;

    assert_eq!(
        response.data,
        Some(json!({
            "topProducts": [
                { "name": "Table", "reviews": null, "inStock": true },
                { "name": "Couch", "reviews": null, "inStock": false }
            ]
        }))
    );
    assert_eq!(
        error_paths(&response.errors),
        vec!["topProducts.0.reviews", "topProducts.1.reviews"]
    );
    assert!(response.errors.iter().all(|error| {
        error.code() == Some(SUBGRAPH_REQUEST_FAILURE)
            && error
                .extensions
                .as_ref()
                .and_then(|extensions| extensions.get("serviceName"))
                == Some(&json!("reviews"))
    }));
    assert_eq!(calls_to(&calls, "inventory").len(), 1);
}

#[tokio::test]
async fn transport_failure_skips_excluded_fields() {
    init_logger();
    let schema = read_fused_schema(PRODUCTS_FIXTURE);
    let calls = CallLog::default();
    let executors = executor_map(vec![MockSubgraph::new("products", &calls).failing()]);

    let response = TestRun::new(&schema, &executors)
        .execute(
            r#"
            query ($x: Boolean!) {
              productById(id: "1") {
                price
              }
              node(id: "1") @include(if: $x) {
                id
              }
            }
            "#,
            json!({ "x": false }),
        )
        .await;

    assert_eq!(calls_to(&calls, "products").len(), 1);
    assert_eq!(response.data, Some(json!({ "productById": null })));
    assert_eq!(error_paths(&response.errors), vec!["productById"]);
}
#[tokio::test]
async fn entity_errors_are_moved_to_client_positions() {
    init_logger();
    let schema = read_fused_schema(PRODUCTS_FIXTURE);
    let calls = CallLog::default();
    let executors = executor_map(vec![
        MockSubgraph::new("products", &calls).with_root(json!({
            "topProducts": [
                { "name": "Table", "__typename": "Product", "id": "1" },
                { "name": "Couch", "__typename": "Product", "id": "2" }
            ]
        })),
        MockSubgraph::new("reviews", &calls)
            .with_entity("1", json!({ "reviews": [{ "body": "Sturdy" }] }))
            .with_entity("2", json!({ "reviews": null }))
            .with_error(entity_error("Reviews are unavailable", 1, "reviews")),
    ]);

    let response = TestRun::new(&schema, &executors)
        .execute("{ topProducts { name reviews { body } } }", Value::Null)
        .await;

    assert_eq!(
        response.data,
        Some(json!({
            "topProducts": [
                { "name": "Table", "reviews": [{ "body": "Sturdy" }] },
                { "name": "Couch", "reviews": null }
            ]
        }))
    );
    assert_eq!(response.errors.len(), 1);
    let error = &response.errors[0];
    assert_eq!(error.message, "Reviews are unavailable");
    assert_eq!(
        error.path.as_deref().map(display_path).as_deref(),
        Some("topProducts.1.reviews")
    );
    assert_eq!(error.code(), Some(DOWNSTREAM_SERVICE_ERROR));
    assert_eq!(
        error
            .extensions
            .as_ref()
            .and_then(|extensions| extensions.get("serviceName")),
        Some(&json!("reviews"))
    );
}

#[tokio::test]
async fn deduplicated_entity_errors_reach_every_position() {
    init_logger();
    let schema = read_fused_schema(PRODUCTS_FIXTURE);
    let calls = CallLog::default();
    let executors = executor_map(vec![
        MockSubgraph::new("products", &calls).with_root(json!({
            "a": [{ "__typename": "Product", "id": "1" }],
            "b": [{ "__typename": "Product", "id": "1" }]
        })),
        MockSubgraph::new("inventory", &calls)
            .with_entity("1", json!({ "inStock": null }))
            .with_error(entity_error("Stock unknown", 0, "inStock")),
    ]);

    let response = TestRun::new(&schema, &executors)
        .execute(
            "{ a: topProducts { inStock } b: topProducts(first: 1) { inStock } }",
            Value::Null,
        )
        .await;

    assert_eq!(calls_to(&calls, "inventory").len(), 1);
    assert_eq!(
        error_paths(&response.errors),
        vec!["a.0.inStock", "b.0.inStock"]
    );
    assert_eq!(
        response.data,
        Some(json!({ "a": [{ "inStock": null }], "b": [{ "inStock": null }] }))
    );
}

#[tokio::test]
async fn missing_data_nulls_the_fetch_coverage() {
    init_logger();
    let schema = read_fused_schema(PRODUCTS_FIXTURE);
    let calls = CallLog::default();
    let executors = executor_map(vec![MockSubgraph::new("products", &calls)
        .with_error(GraphQLError::from("Internal server error"))]);

    let response = TestRun::new(&schema, &executors)
        .execute(r#"{ productById(id: "1") { id } }"#, Value::Null)
        .await;

    assert_eq!(response.data, Some(json!({ "productById": null })));
    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].path, None);
    assert_eq!(response.errors[0].code(), Some(DOWNSTREAM_SERVICE_ERROR));
}

#[tokio::test]
async fn subgraph_error_codes_are_kept() {
    init_logger();
    let schema = read_fused_schema(PRODUCTS_FIXTURE);
    let calls = CallLog::default();
    let executors = executor_map(vec![MockSubgraph::new("products", &calls)
        .with_root(json!({ "productById": null }))
        .with_error(
            GraphQLError::from("Not allowed")
                .with_path(vec![GraphQLErrorPathSegment::from("productById")])
                .with_code("FORBIDDEN"),
        )]);

    let response = TestRun::new(&schema, &executors)
        .execute(r#"{ productById(id: "1") { id } }"#, Value::Null)
        .await;

    assert_eq!(response.data, Some(json!({ "productById": null })));
    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].code(), Some("FORBIDDEN"));
    assert_eq!(
        response.errors[0]
            .extensions
            .as_ref()
            .and_then(|extensions| extensions.get("serviceName")),
        Some(&json!("products"))
    );
}

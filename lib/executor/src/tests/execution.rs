use std::sync::Arc;

use serde_json::{json, Value};

use crate::{
    execution::options::{ErrorFilter, ExecutionOptions},
    response::graphql_error::GraphQLError,
    tests::testkit::{
        calls_to, executor_map, init_logger, read_fused_schema, CallLog, MockSubgraph, TestRun,
        PRODUCTS_FIXTURE,
    },
};

fn products_root() -> Value {
    json!({
        "topProducts": [
            { "name": "Table", "__typename": "Product", "id": "1", "price": 10.5, "weight": 2.0 },
            { "name": "Couch", "__typename": "Product", "id": "2", "price": 99.0, "weight": 40.0 }
        ]
    })
}

#[tokio::test]
async fn entity_fields_are_merged_across_subgraphs() {
    init_logger();
    let schema = read_fused_schema(PRODUCTS_FIXTURE);
    let calls = CallLog::default();
    let executors = executor_map(vec![
        MockSubgraph::new("products", &calls).with_root(products_root()),
        MockSubgraph::new("reviews", &calls)
            .with_entity("1", json!({ "reviews": [{ "body": "Sturdy" }] }))
            .with_entity("2", json!({ "reviews": [] })),
        MockSubgraph::new("inventory", &calls)
            .with_entity("1", json!({ "inStock": true }))
            .with_entity("2", json!({ "inStock": false })),
    ]);

    let response = TestRun::new(&schema, &executors)
        .execute(
            r#"
            query {
              topProducts {
                name
                reviews {
                  body
                }
                inStock
              }
            }
            "#,
            Value::Null,
        )
        .await;

    assert!(response.errors.is_empty(), "{:?}", response.errors);
    assert_eq!(
        response.data,
        Some(json!({
            "topProducts": [
                { "name": "Table", "reviews": [{ "body": "Sturdy" }], "inStock": true },
                { "name": "Couch", "reviews": [], "inStock": false }
            ]
        }))
    );

    let reviews_calls = calls_to(&calls, "reviews");
    assert_eq!(reviews_calls.len(), 1);
    assert_eq!(
        reviews_calls[0].variables.as_ref().and_then(|v| v.get("representations")),
        Some(&json!([
            { "__typename": "Product", "id": "1" },
            { "__typename": "Product", "id": "2" }
        ]))
    );
}

#[tokio::test]
async fn required_fields_are_sent_with_representations() {
    init_logger();
    let schema = read_fused_schema(PRODUCTS_FIXTURE);
    let calls = CallLog::default();
    let executors = executor_map(vec![
        MockSubgraph::new("products", &calls).with_root(products_root()),
        MockSubgraph::new("inventory", &calls)
            .with_entity("1", json!({ "shippingEstimate": 3 }))
            .with_entity("2", json!({ "shippingEstimate": 7 })),
    ]);

    let response = TestRun::new(&schema, &executors)
        .execute("{ topProducts { shippingEstimate } }", Value::Null)
        .await;

    assert_eq!(
        response.data,
        Some(json!({
            "topProducts": [{ "shippingEstimate": 3 }, { "shippingEstimate": 7 }]
        }))
    );

    let order: Vec<String> = calls.lock().iter().map(|(name, _)| name.clone()).collect();
    assert_eq!(order, vec!["products", "inventory"]);

    let inventory_calls = calls_to(&calls, "inventory");
    assert_eq!(
        inventory_calls[0].variables.as_ref().and_then(|v| v.get("representations")),
        Some(&json!([
            { "__typename": "Product", "id": "1", "price": 10.5, "weight": 2.0 },
            { "__typename": "Product", "id": "2", "price": 99.0, "weight": 40.0 }
        ]))
    );
}

#[tokio::test]
async fn native_names_are_sent_to_subgraphs() {
    init_logger();
    let schema = read_fused_schema(PRODUCTS_FIXTURE);
    let calls = CallLog::default();
    let executors = executor_map(vec![
        MockSubgraph::new("products", &calls).with_root(products_root()),
        MockSubgraph::new("reviews", &calls)
            .with_entity("1", json!({ "reviews": [{ "body": "Sturdy" }] }))
            .with_entity("2", json!({ "reviews": [{ "body": "Comfy" }] })),
    ]);

    let response = TestRun::new(&schema, &executors)
        .execute(
            "{ topProducts(first: 2) { name reviews(first: 1) { body } } }",
            Value::Null,
        )
        .await;

    assert_eq!(
        response.data,
        Some(json!({
            "topProducts": [
                { "name": "Table", "reviews": [{ "body": "Sturdy" }] },
                { "name": "Couch", "reviews": [{ "body": "Comfy" }] }
            ]
        }))
    );
    assert!(calls_to(&calls, "products")[0]
        .query
        .contains("topProducts(first:2){name:title"));
    assert!(calls_to(&calls, "reviews")[0]
        .query
        .contains("reviews(limit:1){body}"));
}

#[tokio::test]
async fn false_fetch_condition_skips_the_subgraph_call() {
    init_logger();
    let schema = read_fused_schema(PRODUCTS_FIXTURE);
    let calls = CallLog::default();
    let executors = executor_map(vec![
        MockSubgraph::new("products", &calls).with_root(products_root()),
        MockSubgraph::new("inventory", &calls).with_entity("1", json!({ "inStock": true })),
    ]);

    let response = TestRun::new(&schema, &executors)
        .execute(
            r#"
            query ($withStock: Boolean!) {
              topProducts {
                name
                inStock @include(if: $withStock)
              }
            }
            "#,
            json!({ "withStock": false }),
        )
        .await;

    assert!(calls_to(&calls, "inventory").is_empty());
    assert_eq!(
        response.data,
        Some(json!({ "topProducts": [{ "name": "Table" }, { "name": "Couch" }] }))
    );
}

const SKIPPABLE_PRODUCT: &str = r#"
  query ($skip: Boolean!) {
    productById(id: "1") @skip(if: $skip) {
      name
      price
    }
  }
"#;

#[tokio::test]
async fn skipped_root_field_makes_no_call() {
    init_logger();
    let schema = read_fused_schema(PRODUCTS_FIXTURE);
    let calls = CallLog::default();
    let executors = executor_map(vec![MockSubgraph::new("products", &calls).with_root(
        json!({ "productById": { "name": "Table", "price": 10.5 } }),
    )]);

    let response = TestRun::new(&schema, &executors)
        .execute(SKIPPABLE_PRODUCT, json!({ "skip": true }))
        .await;

    assert!(calls_to(&calls, "products").is_empty());
    assert!(response.errors.is_empty(), "{:?}", response.errors);
    assert_eq!(response.data, Some(json!({})));
}

#[tokio::test]
async fn unskipped_root_field_is_fetched() {
    init_logger();
    let schema = read_fused_schema(PRODUCTS_FIXTURE);
    let calls = CallLog::default();
    let executors = executor_map(vec![MockSubgraph::new("products", &calls).with_root(
        json!({ "productById": { "name": "Table", "price": 10.5 } }),
    )]);

    let response = TestRun::new(&schema, &executors)
        .execute(SKIPPABLE_PRODUCT, json!({ "skip": false }))
        .await;

    assert_eq!(calls_to(&calls, "products").len(), 1);
    assert!(response.errors.is_empty(), "{:?}", response.errors);
    assert_eq!(
        response.data,
        Some(json!({ "productById": { "name": "Table", "price": 10.5 } }))
    );
}

#[tokio::test]
async fn aliased_lists_share_one_entity_batch() {
    init_logger();
    let schema = read_fused_schema(PRODUCTS_FIXTURE);
    let calls = CallLog::default();
    let executors = executor_map(vec![
        MockSubgraph::new("products", &calls).with_root(json!({
            "a": [
                { "__typename": "Product", "id": "1" },
                { "__typename": "Product", "id": "2" }
            ],
            "b": [{ "__typename": "Product", "id": "1" }]
        })),
        MockSubgraph::new("inventory", &calls)
            .with_entity("1", json!({ "inStock": true }))
            .with_entity("2", json!({ "inStock": false })),
    ]);

    let response = TestRun::new(&schema, &executors)
        .execute(
            "{ a: topProducts { inStock } b: topProducts(first: 1) { inStock } }",
            Value::Null,
        )
        .await;

    let inventory_calls = calls_to(&calls, "inventory");
    assert_eq!(inventory_calls.len(), 1);
    assert_eq!(
        inventory_calls[0].variables.as_ref().and_then(|v| v.get("representations")),
        Some(&json!([
            { "__typename": "Product", "id": "1" },
            { "__typename": "Product", "id": "2" }
        ]))
    );
    assert_eq!(
        response.data,
        Some(json!({
            "a": [{ "inStock": true }, { "inStock": false }],
            "b": [{ "inStock": true }]
        }))
    );
}

#[tokio::test]
async fn mutation_fields_run_in_order() {
    init_logger();
    let schema = read_fused_schema(PRODUCTS_FIXTURE);
    let calls = CallLog::default();
    let executors = executor_map(vec![
        MockSubgraph::new("reviews", &calls)
            .with_root(json!({ "addReview": { "id": "r1", "body": "Solid" } })),
        MockSubgraph::new("inventory", &calls)
            .with_root(json!({ "restock": { "id": "1", "inStock": true } })),
    ]);

    let response = TestRun::new(&schema, &executors)
        .execute(
            r#"
            mutation {
              addReview(productId: "1", body: "Solid") { id body }
              restock(productId: "1", quantity: 5) { id inStock }
            }
            "#,
            Value::Null,
        )
        .await;

    let order: Vec<String> = calls.lock().iter().map(|(name, _)| name.clone()).collect();
    assert_eq!(order, vec!["reviews", "inventory"]);
    assert_eq!(
        response.data,
        Some(json!({
            "addReview": { "id": "r1", "body": "Solid" },
            "restock": { "id": "1", "inStock": true }
        }))
    );
}

#[tokio::test]
async fn cancelled_request_makes_no_calls() {
    init_logger();
    let schema = read_fused_schema(PRODUCTS_FIXTURE);
    let calls = CallLog::default();
    let executors = executor_map(vec![
        MockSubgraph::new("products", &calls).with_root(products_root())
    ]);

    let run = TestRun::new(&schema, &executors);
    run.cancellation_token.cancel();
    let response = run.execute("{ topProducts { name } }", Value::Null).await;

    assert!(calls.lock().is_empty());
    assert_eq!(response.data, Some(Value::Null));
    assert_eq!(
        response.errors[0].message,
        "Cannot return null for non-nullable field Query.topProducts."
    );
}

#[tokio::test]
async fn error_filter_and_exposed_query_plan() {
    init_logger();
    let schema = read_fused_schema(PRODUCTS_FIXTURE);
    let calls = CallLog::default();
    let executors = executor_map(vec![MockSubgraph::new("products", &calls)
        .with_root(json!({ "productById": { "id": "1", "name": null } }))]);

    let error_filter: Arc<dyn ErrorFilter> = Arc::new(|error: GraphQLError| {
        Some(GraphQLError {
            message: "Something went wrong".to_string(),
            ..error
        })
    });
    let mut run = TestRun::new(&schema, &executors);
    run.options = ExecutionOptions {
        expose_query_plan: true,
        error_filter: Some(error_filter),
    };

    let response = run
        .execute(r#"{ productById(id: "1") { id name } }"#, Value::Null)
        .await;

    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].message, "Something went wrong");
    let query_plan = response
        .extensions
        .as_ref()
        .and_then(|extensions| extensions.get("queryPlan"))
        .expect("query plan extension");
    assert_eq!(query_plan.get("operationKind"), Some(&json!("query")));
}

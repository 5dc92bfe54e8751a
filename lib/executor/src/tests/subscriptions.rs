use std::{collections::HashMap, sync::Arc};

use futures::StreamExt;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::{
    execution::{
        options::ExecutionOptions,
        subscription::{execute_subscription, SubscriptionExecution},
    },
    response::graphql_error::SUBGRAPH_REQUEST_FAILURE,
    tests::testkit::{
        calls_to, executor_map, init_logger, plan_operation, read_fused_schema, CallLog,
        MockSubgraph, PRODUCTS_FIXTURE,
    },
    SubgraphExecutorMap,
};

const REVIEW_ADDED: &str = r#"
  subscription {
    reviewAdded {
      body
      product {
        name
      }
    }
  }
"#;

fn subscription_execution(executors: SubgraphExecutorMap) -> SubscriptionExecution {
    subscription_with_variables(executors, REVIEW_ADDED, HashMap::new())
}

fn subscription_with_variables(
    executors: SubgraphExecutorMap,
    query: &str,
    variables: HashMap<String, Value>,
) -> SubscriptionExecution {
    let schema = read_fused_schema(PRODUCTS_FIXTURE);
    let (operation, query_plan) = plan_operation(&schema, query);

    SubscriptionExecution {
        schema: Arc::new(schema),
        operation: Arc::new(operation),
        query_plan: Arc::new(query_plan),
        variables: Arc::new(variables),
        executors: Arc::new(executors),
        options: ExecutionOptions::default(),
        cancellation_token: CancellationToken::new(),
    }
}

#[tokio::test]
async fn every_event_runs_the_event_plan() {
    init_logger();
    let calls = CallLog::default();
    let executors = executor_map(vec![
        MockSubgraph::new("reviews", &calls).with_events(vec![
            json!({ "reviewAdded": { "body": "Great", "product": { "__typename": "Product", "id": "1" } } }),
            json!({ "reviewAdded": { "body": "Meh", "product": { "__typename": "Product", "id": "2" } } }),
        ]),
        MockSubgraph::new("products", &calls)
            .with_entity("1", json!({ "name": "Table" }))
            .with_entity("2", json!({ "name": "Couch" })),
    ]);

    let responses: Vec<_> = execute_subscription(subscription_execution(executors))
        .await
        .collect()
        .await;

    let data: Vec<Option<Value>> = responses.into_iter().map(|r| r.data).collect();
    assert_eq!(
        data,
        vec![
            Some(json!({ "reviewAdded": { "body": "Great", "product": { "name": "Table" } } })),
            Some(json!({ "reviewAdded": { "body": "Meh", "product": { "name": "Couch" } } })),
        ]
    );

    assert_eq!(calls_to(&calls, "reviews").len(), 1);
    assert_eq!(calls_to(&calls, "products").len(), 2);
}

#[tokio::test]
async fn cancelled_subscription_ends_the_stream() {
    init_logger();
    let calls = CallLog::default();
    let executors = executor_map(vec![
        MockSubgraph::new("reviews", &calls).with_events(vec![json!({
            "reviewAdded": { "body": "Great", "product": { "__typename": "Product", "id": "1" } }
        })]),
        MockSubgraph::new("products", &calls).with_entity("1", json!({ "name": "Table" })),
    ]);

    let execution = subscription_execution(executors);
    execution.cancellation_token.cancel();
    let responses: Vec<_> = execute_subscription(execution).await.collect().await;

    assert!(responses.is_empty());
    assert!(calls_to(&calls, "products").is_empty());
}

#[tokio::test]
async fn failing_source_yields_one_error_response() {
    init_logger();
    let executors = SubgraphExecutorMap::new();

    let responses: Vec<_> = execute_subscription(subscription_execution(executors))
        .await
        .collect()
        .await;

    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].data, None);
    assert_eq!(responses[0].errors[0].code(), Some(SUBGRAPH_REQUEST_FAILURE));
}

const SKIPPABLE_REVIEW_ADDED: &str = r#"
  subscription ($s: Boolean!) {
    reviewAdded @skip(if: $s) {
      body
    }
  }
"#;

#[tokio::test]
async fn skipped_source_does_not_subscribe() {
    init_logger();
    let calls = CallLog::default();
    let executors = executor_map(vec![MockSubgraph::new("reviews", &calls)
        .with_events(vec![json!({ "reviewAdded": { "body": "Great" } })])]);

    let execution = subscription_with_variables(
        executors,
        SKIPPABLE_REVIEW_ADDED,
        HashMap::from([("s".to_string(), json!(true))]),
    );
    let responses: Vec<_> = execute_subscription(execution).await.collect().await;

    assert!(calls_to(&calls, "reviews").is_empty());
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].data, Some(json!({})));
    assert!(responses[0].errors.is_empty());
}

#[tokio::test]
async fn included_source_subscribes() {
    init_logger();
    let calls = CallLog::default();
    let executors = executor_map(vec![MockSubgraph::new("reviews", &calls)
        .with_events(vec![json!({ "reviewAdded": { "body": "Great" } })])]);

    let execution = subscription_with_variables(
        executors,
        SKIPPABLE_REVIEW_ADDED,
        HashMap::from([("s".to_string(), json!(false))]),
    );
    let responses: Vec<_> = execute_subscription(execution).await.collect().await;

    assert_eq!(calls_to(&calls, "reviews").len(), 1);
    let data: Vec<Option<Value>> = responses.into_iter().map(|r| r.data).collect();
    assert_eq!(data, vec![Some(json!({ "reviewAdded": { "body": "Great" } }))]);
}

use std::{collections::HashMap, sync::Arc};

use futures::{
    future,
    stream::{self, BoxStream, StreamExt},
};
use query_planner::{
    ast::operation::NormalizedOperation,
    planner::plan_nodes::{FetchNode, QueryPlan},
    schema::FusedSchema,
};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::{
    context::ExecutionContext,
    execution::{
        options::ExecutionOptions,
        plan::{apply_root_response, build_subgraph_request, finalize_response, Executor},
    },
    executors::map::SubgraphExecutorMap,
    response::{
        graphql_error::{GraphQLError, SUBGRAPH_REQUEST_FAILURE},
        response::ExecutionResponse,
        subgraph_response::SubgraphResponse,
    },
};

/// Owned counterpart of [`crate::execution::plan::QueryPlanExecution`],
/// since the event stream outlives the call that opened it.
#[derive(Clone)]
pub struct SubscriptionExecution {
    pub schema: Arc<FusedSchema>,
    pub operation: Arc<NormalizedOperation>,
    pub query_plan: Arc<QueryPlan>,
    pub variables: Arc<HashMap<String, Value>>,
    pub executors: Arc<SubgraphExecutorMap>,
    pub options: ExecutionOptions,
    pub cancellation_token: CancellationToken,
}

/// Opens the source stream and runs the per-event plan for every event.
///
/// The stream ends with the source or when the token is cancelled. Failing to
/// open the source yields a single error response, and a source whose
/// condition is false yields a single response with empty data.
#[instrument(level = "debug", skip_all)]
pub async fn execute_subscription(
    execution: SubscriptionExecution,
) -> BoxStream<'static, ExecutionResponse> {
    let Some(source) = execution.query_plan.subscription.clone() else {
        return single_response(ExecutionResponse::plan_failure(
            "Query plan has no subscription source",
        ));
    };

    if let Some(condition) = &source.condition {
        if !condition.evaluate(&execution.variables) {
            debug!(%condition, "subscription condition is false, not subscribing");
            return single_response(finalize_response(
                &execution.schema,
                &execution.operation,
                &execution.query_plan,
                &execution.variables,
                &execution.options,
                ExecutionContext::new(),
            ));
        }
    }

    let request = build_subgraph_request(&source, &execution.variables);
    let opened = match execution.executors.get(&source.subgraph) {
        Ok(executor) => executor.subscribe(request).await,
        Err(err) => Err(err),
    };

    let events = match opened {
        Ok(events) => events,
        Err(err) => {
            warn!(subgraph = %source.subgraph, error = %err, "failed to open subscription");
            return single_response(ExecutionResponse::from_error(
                GraphQLError::from(format!(
                    "Failed to subscribe to subgraph \"{}\": {}",
                    source.subgraph, err
                ))
                .with_code(SUBGRAPH_REQUEST_FAILURE)
                .with_extension("serviceName", Value::String(source.subgraph.clone())),
            ));
        }
    };

    let cancelled = execution.cancellation_token.clone().cancelled_owned();
    let execution = Arc::new(execution);
    let source = Arc::new(source);

    events
        .then(move |event| {
            let execution = execution.clone();
            let source = source.clone();
            async move { execute_event(&execution, &source, event).await }
        })
        .take_until(cancelled)
        .boxed()
}

async fn execute_event(
    execution: &SubscriptionExecution,
    source: &FetchNode,
    event: SubgraphResponse,
) -> ExecutionResponse {
    debug!(subgraph = %source.subgraph, "subscription event received");
    let context = ExecutionContext::new();
    apply_root_response(&context, source, &execution.variables, event);

    // Cancelling one event's fetches leaves the stream open.
    let event_token = execution.cancellation_token.child_token();
    if let Some(node) = &execution.query_plan.node {
        let executor = Executor::new(
            &execution.schema,
            &execution.variables,
            &execution.executors,
            &event_token,
        );
        executor.execute(&context, node).await;
    }

    finalize_response(
        &execution.schema,
        &execution.operation,
        &execution.query_plan,
        &execution.variables,
        &execution.options,
        context,
    )
}

fn single_response(response: ExecutionResponse) -> BoxStream<'static, ExecutionResponse> {
    stream::once(future::ready(response)).boxed()
}

use std::collections::HashMap;

use futures::{
    future::BoxFuture,
    stream::{FuturesUnordered, StreamExt},
};
use query_planner::{
    ast::operation::NormalizedOperation,
    planner::plan_nodes::{FetchNode, PlanNode, QueryPlan},
    schema::FusedSchema,
};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace, warn};

use crate::{
    context::ExecutionContext,
    execution::{
        options::ExecutionOptions,
        representations::{collect_representations, EntityBatch},
    },
    executors::{
        common::SubgraphExecutionRequest, error::SubgraphExecutorError, map::SubgraphExecutorMap,
    },
    projection::response::project_response,
    response::{
        graphql_error::{
            GraphQLError, GraphQLErrorPathSegment, DOWNSTREAM_SERVICE_ERROR,
            SUBGRAPH_REQUEST_FAILURE,
        },
        merge::deep_merge,
        response::ExecutionResponse,
        subgraph_response::SubgraphResponse,
    },
    utils::traverse::{value_at_mut, Position},
};

const REPRESENTATIONS_VARIABLE: &str = "representations";
const ENTITIES_FIELD_NAME: &str = "_entities";
const TYPENAME_FIELD_NAME: &str = "__typename";

/// Everything one query or mutation execution reads.
pub struct QueryPlanExecution<'a> {
    pub schema: &'a FusedSchema,
    pub operation: &'a NormalizedOperation,
    pub query_plan: &'a QueryPlan,
    /// Coerced variables, see [`crate::variables::coerce_variables`].
    pub variables: &'a HashMap<String, Value>,
    pub executors: &'a SubgraphExecutorMap,
    pub options: &'a ExecutionOptions,
    pub cancellation_token: &'a CancellationToken,
}

#[instrument(level = "debug", skip_all, fields(kind = %execution.operation.kind))]
pub async fn execute_query_plan(execution: QueryPlanExecution<'_>) -> ExecutionResponse {
    let context = ExecutionContext::new();

    if let Some(node) = &execution.query_plan.node {
        let executor = Executor::new(
            execution.schema,
            execution.variables,
            execution.executors,
            execution.cancellation_token,
        );
        executor.execute(&context, node).await;
    }

    finalize_response(
        execution.schema,
        execution.operation,
        execution.query_plan,
        execution.variables,
        execution.options,
        context,
    )
}

/// Projects the assembled tree onto the operation and builds the client response.
pub(crate) fn finalize_response(
    schema: &FusedSchema,
    operation: &NormalizedOperation,
    query_plan: &QueryPlan,
    variables: &HashMap<String, Value>,
    options: &ExecutionOptions,
    context: ExecutionContext,
) -> ExecutionResponse {
    let (data, mut errors) = context.into_parts();
    let data = project_response(schema, operation, variables, &data, &mut errors);

    let mut response = ExecutionResponse {
        data: Some(data),
        errors: options.apply_error_filter(errors),
        extensions: None,
    };

    if options.expose_query_plan {
        match serde_json::to_value(query_plan) {
            Ok(plan) => response.add_extension("queryPlan", plan),
            Err(err) => warn!(error = %err, "failed to serialize the query plan"),
        }
    }

    response
}

struct ConcurrencyScope<'exec, T> {
    jobs: FuturesUnordered<BoxFuture<'exec, T>>,
}

impl<'exec, T> ConcurrencyScope<'exec, T> {
    fn new() -> Self {
        Self {
            jobs: FuturesUnordered::new(),
        }
    }

    fn spawn(&mut self, future: BoxFuture<'exec, T>) {
        self.jobs.push(future);
    }

    async fn join_all(mut self) -> Vec<T> {
        let mut results = Vec::with_capacity(self.jobs.len());
        while let Some(result) = self.jobs.next().await {
            results.push(result);
        }
        results
    }
}

/// Where the result of a fetch lands in the response tree.
enum FetchTargets {
    Root,
    Entities(EntityBatch),
}

impl FetchTargets {
    fn positions(&self) -> Vec<Position> {
        match self {
            FetchTargets::Root => vec![Vec::new()],
            FetchTargets::Entities(batch) => batch.positions(),
        }
    }
}

pub struct Executor<'a> {
    schema: &'a FusedSchema,
    variables: &'a HashMap<String, Value>,
    executors: &'a SubgraphExecutorMap,
    cancellation_token: &'a CancellationToken,
}

impl<'a> Executor<'a> {
    pub fn new(
        schema: &'a FusedSchema,
        variables: &'a HashMap<String, Value>,
        executors: &'a SubgraphExecutorMap,
        cancellation_token: &'a CancellationToken,
    ) -> Self {
        Executor {
            schema,
            variables,
            executors,
            cancellation_token,
        }
    }

    pub fn execute<'exec>(
        &'exec self,
        context: &'exec ExecutionContext,
        node: &'exec PlanNode,
    ) -> BoxFuture<'exec, ()> {
        Box::pin(async move {
            match node {
                PlanNode::Fetch(fetch) => self.execute_fetch(context, fetch).await,
                PlanNode::Sequence(sequence) => {
                    for child in &sequence.nodes {
                        self.execute(context, child).await;
                    }
                }
                PlanNode::Parallel(parallel) => {
                    let mut scope = ConcurrencyScope::new();
                    for child in &parallel.nodes {
                        scope.spawn(self.execute(context, child));
                    }
                    scope.join_all().await;
                }
                PlanNode::Composite(composite) => self.execute(context, &composite.node).await,
            }
        })
    }

    #[instrument(level = "debug", skip_all, fields(id = fetch.id, subgraph = %fetch.subgraph))]
    async fn execute_fetch(&self, context: &ExecutionContext, fetch: &FetchNode) {
        if let Some(condition) = &fetch.condition {
            if !condition.evaluate(self.variables) {
                debug!(%condition, "fetch condition is false, skipping");
                return;
            }
        }

        if self.cancellation_token.is_cancelled() {
            debug!("request was cancelled, skipping fetch");
            return;
        }

        let mut request = self.build_request(fetch);
        let targets = match fetch.representations() {
            Some(requires) => {
                let batch = context
                    .read(|data| collect_representations(self.schema, fetch, requires, data));
                if batch.is_empty() {
                    debug!("no representations to resolve, skipping");
                    return;
                }
                trace!(
                    representations = batch.representations.len(),
                    positions = batch.targets.len(),
                    "collected representations"
                );
                request.add_variable(
                    REPRESENTATIONS_VARIABLE,
                    Value::Array(batch.representations.clone()),
                );
                FetchTargets::Entities(batch)
            }
            None => FetchTargets::Root,
        };

        let result = tokio::select! {
            biased;
            _ = self.cancellation_token.cancelled() => None,
            result = self.send(fetch, request) => Some(result),
        };

        let Some(result) = result.filter(|_| !self.cancellation_token.is_cancelled()) else {
            debug!("request was cancelled, dropping fetch result");
            return;
        };

        match (result, targets) {
            (Ok(response), FetchTargets::Root) => {
                apply_root_response(context, fetch, self.variables, response)
            }
            (Ok(response), FetchTargets::Entities(batch)) => {
                apply_entity_response(context, fetch, self.variables, &batch, response)
            }
            (Err(err), targets) => apply_transport_failure(
                context,
                fetch,
                self.variables,
                &targets.positions(),
                &err,
            ),
        }
    }

    async fn send(
        &self,
        fetch: &FetchNode,
        request: SubgraphExecutionRequest,
    ) -> Result<SubgraphResponse, SubgraphExecutorError> {
        self.executors
            .get(&fetch.subgraph)?
            .execute(request)
            .await
    }

    fn build_request(&self, fetch: &FetchNode) -> SubgraphExecutionRequest {
        build_subgraph_request(fetch, self.variables)
    }
}

/// The fetch document with the client variables it forwards.
/// Variables the client left out are omitted so the subgraph applies its defaults.
pub(crate) fn build_subgraph_request(
    fetch: &FetchNode,
    variables: &HashMap<String, Value>,
) -> SubgraphExecutionRequest {
    let mut request = SubgraphExecutionRequest::new(fetch.document.clone());
    for name in fetch.forwarded_variables() {
        if let Some(value) = variables.get(name) {
            request.add_variable(name, value.clone());
        }
    }
    request
}

pub(crate) fn tag_subgraph_error(error: GraphQLError, subgraph: &str) -> GraphQLError {
    let has_code = error.code().is_some();
    let mut error = if has_code {
        error
    } else {
        error.with_code(DOWNSTREAM_SERVICE_ERROR)
    };
    // Locations point into the subgraph document, not the client's.
    error.locations = None;
    error.with_extension("serviceName", Value::String(subgraph.to_string()))
}

/// Sets every included covered key that was not written yet to null.
fn null_coverage(
    data: &mut Value,
    fetch: &FetchNode,
    variables: &HashMap<String, Value>,
    positions: &[Position],
) {
    for position in positions {
        if let Some(Value::Object(target)) = value_at_mut(data, position) {
            for key in fetch.covered_keys(variables) {
                target.entry(key.to_string()).or_insert(Value::Null);
            }
        }
    }
}

pub(crate) fn apply_root_response(
    context: &ExecutionContext,
    fetch: &FetchNode,
    variables: &HashMap<String, Value>,
    response: SubgraphResponse,
) {
    let SubgraphResponse { data, errors, .. } = response;
    context.write(|tree, tree_errors| {
        match data {
            Some(data) => deep_merge(tree, data),
            None => null_coverage(tree, fetch, variables, &[Vec::new()]),
        }
        tree_errors.extend(
            errors
                .into_iter()
                .flatten()
                .map(|error| tag_subgraph_error(error, &fetch.subgraph)),
        );
    });
}

fn apply_entity_response(
    context: &ExecutionContext,
    fetch: &FetchNode,
    variables: &HashMap<String, Value>,
    batch: &EntityBatch,
    response: SubgraphResponse,
) {
    let SubgraphResponse { data, errors, .. } = response;
    let entities = data.and_then(|mut data| match data.get_mut(ENTITIES_FIELD_NAME) {
        Some(Value::Array(entities)) => Some(std::mem::take(entities)),
        _ => None,
    });

    let errors: Vec<GraphQLError> = errors
        .into_iter()
        .flatten()
        .flat_map(|error| remap_entity_error(error, batch))
        .map(|error| tag_subgraph_error(error, &fetch.subgraph))
        .collect();

    context.write(|tree, tree_errors| {
        match &entities {
            Some(entities) => {
                for (position, index) in &batch.targets {
                    // Null or missing entities were not found.
                    let Some(entity @ Value::Object(_)) = entities.get(*index) else {
                        continue;
                    };
                    if let Some(target) = value_at_mut(tree, position) {
                        deep_merge(target, entity.clone());
                    }
                }
            }
            None => null_coverage(tree, fetch, variables, &batch.positions()),
        }
        tree_errors.extend(errors);
    });
}

/// Moves an error raised at `_entities[i]` to every client position that
/// sent representation `i`. Other paths mean nothing to the client and are dropped.
fn remap_entity_error(error: GraphQLError, batch: &EntityBatch) -> Vec<GraphQLError> {
    let remapped = match error.path.as_deref() {
        Some(
            [GraphQLErrorPathSegment::String(root), GraphQLErrorPathSegment::Index(index), rest @ ..],
        ) if root == ENTITIES_FIELD_NAME => Some((*index, rest.to_vec())),
        _ => None,
    };

    let Some((index, rest)) = remapped else {
        return vec![GraphQLError {
            path: None,
            ..error
        }];
    };

    let errors: Vec<GraphQLError> = batch
        .positions_of(index)
        .map(|position| {
            let mut path = position.clone();
            path.extend(rest.iter().cloned());
            error.clone().with_path(path)
        })
        .collect();

    if errors.is_empty() {
        return vec![GraphQLError {
            path: None,
            ..error
        }];
    }

    errors
}

fn apply_transport_failure(
    context: &ExecutionContext,
    fetch: &FetchNode,
    variables: &HashMap<String, Value>,
    positions: &[Position],
    err: &SubgraphExecutorError,
) {
    warn!(subgraph = %fetch.subgraph, error = %err, "subgraph request failed");
    let message = format!("Failed to fetch from subgraph \"{}\": {}", fetch.subgraph, err);

    context.write(|tree, tree_errors| {
        for position in positions {
            let Some(Value::Object(target)) = value_at_mut(tree, position) else {
                continue;
            };
            for key in fetch
                .covered_keys(variables)
                .filter(|k| *k != TYPENAME_FIELD_NAME)
            {
                target.entry(key.to_string()).or_insert(Value::Null);

                let mut path = position.clone();
                path.push(key.into());
                tree_errors.push(
                    GraphQLError::from(message.clone())
                        .with_path(path)
                        .with_code(SUBGRAPH_REQUEST_FAILURE)
                        .with_extension("serviceName", Value::String(fetch.subgraph.clone())),
                );
            }
        }
    });
}

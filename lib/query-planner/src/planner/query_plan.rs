use std::collections::HashMap;

use petgraph::{
    stable_graph::{NodeIndex, StableDiGraph},
    Direction,
};
use tracing::{debug, instrument};

use crate::{
    ast::{
        condition::Condition,
        operation::{NormalizedOperation, OperationKind},
        response_path::ResponsePath,
    },
    schema::FusedSchema,
    utils::cancellation::CancellationToken,
};

use super::{
    dedupe::deduplicate_fetch_steps,
    document::{lower_group, SubgraphDocument},
    error::{PlanCompilationError, PlannerError},
    plan_nodes::{
        CompositeNode, CoveredField, FetchNode, KeyBatch, LookupClass, ParallelNode, PlanNode,
        QueryPlan, SequenceNode, VariableBinding,
    },
    requirements::{build_requirement_graph, find_cycle, DependencyKind, RequirementGraph},
    PlannerOptions,
};

/// A lowered requirement group that is not yet placed in the plan.
#[derive(Debug, Clone)]
pub struct FetchStep {
    pub subgraph: String,
    pub operation_kind: OperationKind,
    pub document: String,
    pub variable_bindings: Vec<VariableBinding>,
    pub response_paths: Vec<ResponsePath>,
    pub key_batch: Option<KeyBatch>,
    pub condition: Option<Condition>,
    pub coverage: Vec<CoveredField>,
}

pub type FetchGraph = StableDiGraph<FetchStep, DependencyKind>;

impl FetchStep {
    /// Two entity steps that would send the same request shape to the same subgraph.
    pub fn is_mergeable_with(&self, other: &FetchStep) -> bool {
        self.key_batch.is_some()
            && self.subgraph == other.subgraph
            && self.document == other.document
            && self.variable_bindings == other.variable_bindings
            && self.key_batch == other.key_batch
            && self.condition == other.condition
    }

    fn into_plan_node(self, id: usize) -> PlanNode {
        let batched = matches!(
            &self.key_batch,
            Some(KeyBatch {
                class: LookupClass::ResolveByKey,
                ..
            })
        );
        let fetch = PlanNode::Fetch(self.into_fetch_node(id));

        if batched {
            PlanNode::Composite(CompositeNode {
                node: Box::new(fetch),
            })
        } else {
            fetch
        }
    }

    fn into_fetch_node(self, id: usize) -> FetchNode {
        FetchNode {
            id,
            subgraph: self.subgraph,
            operation_kind: self.operation_kind,
            document: self.document,
            variable_bindings: self.variable_bindings,
            response_paths: self.response_paths,
            key_batch: self.key_batch,
            condition: self.condition,
            coverage: self.coverage,
        }
    }
}

/// Distinct parents of a step, in ascending order.
pub fn parents_of(graph: &FetchGraph, index: NodeIndex) -> Vec<NodeIndex> {
    let mut parents: Vec<NodeIndex> = graph
        .neighbors_directed(index, Direction::Incoming)
        .collect();
    parents.sort();
    parents.dedup();
    parents
}

fn children_of(graph: &FetchGraph, index: NodeIndex) -> Vec<NodeIndex> {
    let mut children: Vec<NodeIndex> = graph
        .neighbors_directed(index, Direction::Outgoing)
        .collect();
    children.sort();
    children.dedup();
    children
}

/// Tracks how many parents of each step are not planned yet.
/// A step is fulfilled, and can be placed in the next wave, once that count is zero.
struct InDegree {
    state: HashMap<NodeIndex, usize>,
}

impl InDegree {
    fn new(graph: &FetchGraph) -> Self {
        let state = graph
            .node_indices()
            .map(|index| (index, parents_of(graph, index).len()))
            .collect();

        Self { state }
    }

    fn is_fulfilled(&self, index: NodeIndex) -> bool {
        self.state.get(&index) == Some(&0)
    }

    /// Marks a step as planned and returns the children it fulfilled.
    fn mark_as_processed(
        &mut self,
        graph: &FetchGraph,
        index: NodeIndex,
    ) -> Result<Vec<NodeIndex>, PlanCompilationError> {
        let mut fulfilled = Vec::new();
        for child in children_of(graph, index) {
            let in_degree = self.state.get_mut(&child).ok_or_else(|| {
                PlanCompilationError::Internal(format!(
                    "in-degree record of step {} is missing",
                    child.index()
                ))
            })?;
            *in_degree = in_degree.checked_sub(1).ok_or_else(|| {
                PlanCompilationError::Internal(format!(
                    "in-degree of step {} dropped below zero",
                    child.index()
                ))
            })?;
            if *in_degree == 0 {
                fulfilled.push(child);
            }
        }

        Ok(fulfilled)
    }
}

fn cycle_error(requirement_graph: &RequirementGraph, cycle: Vec<NodeIndex>) -> PlanCompilationError {
    PlanCompilationError::CyclicRequirements {
        cycle: cycle
            .into_iter()
            .map(|index| requirement_graph.group(index).label())
            .collect(),
    }
}

fn lower_requirement_graph(
    schema: &FusedSchema,
    operation: &NormalizedOperation,
    requirement_graph: &RequirementGraph,
) -> Result<FetchGraph, PlanCompilationError> {
    let mut steps = HashMap::new();

    for index in requirement_graph.graph.node_indices() {
        let group = requirement_graph.group(index);
        let SubgraphDocument {
            document,
            variable_bindings,
        } = lower_group(schema, operation, group)?;

        let operation_kind = match group.entity {
            Some(_) => OperationKind::Query,
            None => operation.kind,
        };

        steps.insert(
            index,
            FetchStep {
                subgraph: group.subgraph.clone(),
                operation_kind,
                document,
                variable_bindings,
                response_paths: vec![group.response_path.clone()],
                key_batch: group.entity.as_ref().map(|entity| KeyBatch {
                    type_name: group.type_name.clone(),
                    class: entity.class,
                }),
                condition: group.selection.top_level_condition(),
                coverage: group
                    .selection
                    .response_keys()
                    .into_iter()
                    .map(|(response_key, condition)| CoveredField {
                        response_key,
                        condition,
                    })
                    .collect(),
            },
        );
    }

    Ok(requirement_graph
        .graph
        .filter_map(|index, _| steps.remove(&index), |_, kind| Some(*kind)))
}

/// Kahn layering: every wave holds the steps whose parents are all in earlier waves.
fn compute_waves(graph: &FetchGraph) -> Result<Vec<Vec<NodeIndex>>, PlanCompilationError> {
    let mut in_degrees = InDegree::new(graph);
    let mut wave: Vec<NodeIndex> = graph
        .node_indices()
        .filter(|index| in_degrees.is_fulfilled(*index))
        .collect();
    let mut waves = Vec::new();
    let mut planned = 0;

    while !wave.is_empty() {
        wave.sort();
        let mut next_wave = Vec::new();
        for index in &wave {
            next_wave.extend(in_degrees.mark_as_processed(graph, *index)?);
        }
        planned += wave.len();
        waves.push(wave);
        wave = next_wave;
    }

    if planned != graph.node_count() {
        return Err(PlanCompilationError::Internal(format!(
            "planned {} of {} fetch steps",
            planned,
            graph.node_count()
        )));
    }

    Ok(waves)
}

fn plan_waves(
    mut graph: FetchGraph,
    next_id: &mut usize,
) -> Result<Option<PlanNode>, PlanCompilationError> {
    let waves = compute_waves(&graph)?;
    let mut sequence = Vec::with_capacity(waves.len());

    for wave in waves {
        let mut nodes = Vec::with_capacity(wave.len());
        for index in wave {
            let step = graph.remove_node(index).ok_or_else(|| {
                PlanCompilationError::Internal(format!("step {} was planned twice", index.index()))
            })?;
            nodes.push(step.into_plan_node(*next_id));
            *next_id += 1;
        }

        match nodes.len() {
            1 => sequence.extend(nodes),
            _ => sequence.push(PlanNode::Parallel(ParallelNode { nodes })),
        }
    }

    Ok(match sequence.len() {
        0 => None,
        1 => sequence.pop(),
        _ => Some(PlanNode::Sequence(SequenceNode { nodes: sequence })),
    })
}

#[instrument(level = "debug", skip_all, fields(kind = %operation.kind, name = ?operation.name))]
pub fn build_query_plan(
    schema: &FusedSchema,
    operation: &NormalizedOperation,
    options: PlannerOptions,
    cancellation: &CancellationToken,
) -> Result<QueryPlan, PlannerError> {
    let requirement_graph = build_requirement_graph(schema, operation, cancellation)?;
    debug!("requirement graph:\n{}", requirement_graph);

    if let Some(cycle) = find_cycle(&requirement_graph.graph) {
        return Err(cycle_error(&requirement_graph, cycle).into());
    }
    cancellation.bail_if_cancelled()?;

    let mut fetch_graph = lower_requirement_graph(schema, operation, &requirement_graph)?;
    if options.deduplicate_fetches {
        deduplicate_fetch_steps(&mut fetch_graph);
    }

    let mut next_id = 0;
    let subscription = match operation.kind {
        OperationKind::Subscription => {
            let source = fetch_graph
                .node_indices()
                .find(|index| fetch_graph[*index].key_batch.is_none());
            match source.and_then(|index| fetch_graph.remove_node(index)) {
                Some(step) => {
                    next_id += 1;
                    Some(step.into_fetch_node(0))
                }
                None => None,
            }
        }
        OperationKind::Query | OperationKind::Mutation => None,
    };

    let node = plan_waves(fetch_graph, &mut next_id)?;
    debug!(fetches = next_id, "query plan built");

    Ok(QueryPlan {
        operation_kind: operation.kind,
        node,
        subscription,
    })
}

use petgraph::{stable_graph::NodeIndex, visit::EdgeRef, Direction};
use tracing::trace;

use super::query_plan::{parents_of, FetchGraph};

/// Merges entity steps that send the same request after the same parents,
/// until no such pair is left. The kept step fans out to every response path.
pub fn deduplicate_fetch_steps(graph: &mut FetchGraph) {
    while let Some((keep, duplicate)) = find_duplicate(graph) {
        trace!(
            keep = keep.index(),
            duplicate = duplicate.index(),
            "merging duplicated fetch steps"
        );
        merge_into(graph, keep, duplicate);
    }
}

fn find_duplicate(graph: &FetchGraph) -> Option<(NodeIndex, NodeIndex)> {
    let indices: Vec<NodeIndex> = graph.node_indices().collect();

    for (i, left) in indices.iter().enumerate() {
        if graph[*left].key_batch.is_none() {
            continue;
        }
        let left_parents = parents_of(graph, *left);

        for right in &indices[i + 1..] {
            if graph[*left].is_mergeable_with(&graph[*right])
                && parents_of(graph, *right) == left_parents
            {
                return Some((*left, *right));
            }
        }
    }

    None
}

fn merge_into(graph: &mut FetchGraph, keep: NodeIndex, duplicate: NodeIndex) {
    let children: Vec<_> = graph
        .edges_directed(duplicate, Direction::Outgoing)
        .map(|edge| (edge.target(), *edge.weight()))
        .collect();

    let Some(step) = graph.remove_node(duplicate) else {
        return;
    };

    for (child, kind) in children {
        if child != keep && !graph.contains_edge(keep, child) {
            graph.add_edge(keep, child, kind);
        }
    }

    let target = &mut graph[keep];
    for path in step.response_paths {
        if !target.response_paths.contains(&path) {
            target.response_paths.push(path);
        }
    }
}

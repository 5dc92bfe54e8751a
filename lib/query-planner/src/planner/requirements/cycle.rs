use std::collections::HashMap;

use petgraph::{
    stable_graph::{NodeIndex, StableDiGraph},
    Direction,
};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

fn sorted_successors<N, E>(graph: &StableDiGraph<N, E>, node: NodeIndex) -> Vec<NodeIndex> {
    let mut successors: Vec<NodeIndex> = graph
        .neighbors_directed(node, Direction::Outgoing)
        .collect();
    successors.sort();
    successors.dedup();
    successors
}

/// Iterative depth-first search with three-color marking.
///
/// Returns the first cycle found, starting from the lowest node index, as
/// the list of nodes on it with the first node repeated at the end.
pub fn find_cycle<N, E>(graph: &StableDiGraph<N, E>) -> Option<Vec<NodeIndex>> {
    let mut colors: HashMap<NodeIndex, Color> =
        graph.node_indices().map(|n| (n, Color::White)).collect();

    for start in graph.node_indices() {
        if colors[&start] != Color::White {
            continue;
        }

        // (node, its successors, next successor to visit)
        let mut stack: Vec<(NodeIndex, Vec<NodeIndex>, usize)> =
            vec![(start, sorted_successors(graph, start), 0)];
        colors.insert(start, Color::Gray);

        while let Some((node, successors, cursor)) = stack.last_mut() {
            let Some(&next) = successors.get(*cursor) else {
                colors.insert(*node, Color::Black);
                stack.pop();
                continue;
            };
            *cursor += 1;

            match colors[&next] {
                Color::White => {
                    colors.insert(next, Color::Gray);
                    stack.push((next, sorted_successors(graph, next), 0));
                }
                Color::Gray => {
                    let position = stack.iter().position(|(n, _, _)| *n == next)?;
                    let mut cycle: Vec<NodeIndex> =
                        stack[position..].iter().map(|(n, _, _)| *n).collect();
                    cycle.push(next);
                    return Some(cycle);
                }
                Color::Black => {}
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use petgraph::stable_graph::StableDiGraph;

    use super::find_cycle;

    #[test]
    fn finds_no_cycle_in_a_dag() {
        let mut graph: StableDiGraph<&str, ()> = StableDiGraph::new();
        let a = graph.add_node("a");
        let b = graph.add_node("b");
        let c = graph.add_node("c");
        graph.add_edge(a, b, ());
        graph.add_edge(a, c, ());
        graph.add_edge(b, c, ());

        assert_eq!(find_cycle(&graph), None);
    }

    #[test]
    fn reports_the_nodes_on_a_cycle() {
        let mut graph: StableDiGraph<&str, ()> = StableDiGraph::new();
        let root = graph.add_node("root");
        let score = graph.add_node("score");
        let rank = graph.add_node("rank");
        graph.add_edge(root, score, ());
        graph.add_edge(root, rank, ());
        graph.add_edge(score, rank, ());
        graph.add_edge(rank, score, ());

        let cycle = find_cycle(&graph).expect("cycle");
        let names: Vec<&str> = cycle.iter().map(|n| graph[*n]).collect();
        assert_eq!(names, vec!["score", "rank", "score"]);
    }

    #[test]
    fn reports_self_loops() {
        let mut graph: StableDiGraph<&str, ()> = StableDiGraph::new();
        let a = graph.add_node("a");
        graph.add_edge(a, a, ());

        assert_eq!(find_cycle(&graph), Some(vec![a, a]));
    }
}

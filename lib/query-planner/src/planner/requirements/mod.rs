mod builder;
mod cycle;

use std::fmt::{self, Display, Formatter};

use petgraph::{
    stable_graph::{NodeIndex, StableDiGraph},
    Direction,
};

use crate::ast::{response_path::ResponsePath, selection_set::SelectionSet};

use super::plan_nodes::LookupClass;

pub use builder::build_requirement_graph;
pub use cycle::find_cycle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupOrigin {
    Root,
    Entity,
    /// Exists to resolve a field with `@requires`, e.g. `Product.shippingEstimate`.
    Requires { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    EntityBoundary,
    Requires,
    MutationOrder,
}

#[derive(Debug, Clone)]
pub struct EntityLookup {
    pub class: LookupClass,
    /// `... on Type { __typename <key> <requires> }`, in fused names.
    pub requirements: SelectionSet,
}

/// A subtree of the operation that one subgraph serves in a single request.
#[derive(Debug, Clone)]
pub struct RequirementGroup {
    pub subgraph: String,
    pub type_name: String,
    pub origin: GroupOrigin,
    pub response_path: ResponsePath,
    pub selection: SelectionSet,
    pub entity: Option<EntityLookup>,
}

impl RequirementGroup {
    /// Human readable label, used in cycle reports.
    pub fn label(&self) -> String {
        match &self.origin {
            GroupOrigin::Requires { field } => format!("{} via {}", field, self.subgraph),
            GroupOrigin::Root | GroupOrigin::Entity => {
                format!("{} via {}", self.type_name, self.subgraph)
            }
        }
    }
}

/// Groups in an index-stable arena; an edge `a -> b` means `b` consumes data `a` produces.
#[derive(Debug, Default)]
pub struct RequirementGraph {
    pub graph: StableDiGraph<RequirementGroup, DependencyKind>,
}

impl RequirementGraph {
    pub fn group(&self, index: NodeIndex) -> &RequirementGroup {
        &self.graph[index]
    }

    /// Distinct producers of `index`, in ascending order.
    pub fn dependencies_of(&self, index: NodeIndex) -> Vec<NodeIndex> {
        let mut parents: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(index, Direction::Incoming)
            .collect();
        parents.sort();
        parents.dedup();
        parents
    }
}

impl Display for RequirementGraph {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for index in self.graph.node_indices() {
            let group = &self.graph[index];
            write!(
                f,
                "[{}] {} at \"{}\": {}",
                index.index(),
                group.label(),
                group.response_path,
                group.selection
            )?;
            let dependencies = self.dependencies_of(index);
            if !dependencies.is_empty() {
                let ids: Vec<String> = dependencies.iter().map(|i| i.index().to_string()).collect();
                write!(f, " <- [{}]", ids.join(", "))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

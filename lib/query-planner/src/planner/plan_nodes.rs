use std::{
    collections::HashMap,
    fmt::{self, Display, Formatter},
};

use serde::{Deserialize, Serialize};

use crate::{
    ast::{
        condition::Condition, operation::OperationKind, response_path::ResponsePath,
        selection_set::SelectionSet,
    },
    utils::pretty_display::{get_indent, PrettyDisplay},
};

/// How an entity fetch resolves its representations, fixed at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LookupClass {
    /// The entity position is not under a list: at most one representation per path.
    Resolve,
    /// The entity position is under a list: representations are batched.
    ResolveByKey,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyBatch {
    pub type_name: String,
    pub class: LookupClass,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum VariableBinding {
    /// Forwarded from the client's variables.
    Operation { name: String },
    /// `$representations`, projected from the response tree through `requires`.
    Representations { requires: SelectionSet },
}

/// A top-level response key a fetch writes, with its own inclusion condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoveredField {
    pub response_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
}

impl CoveredField {
    pub fn is_included(&self, variables: &HashMap<String, serde_json::Value>) -> bool {
        self.condition
            .as_ref()
            .map_or(true, |condition| condition.evaluate(variables))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchNode {
    pub id: usize,
    pub subgraph: String,
    pub operation_kind: OperationKind,
    pub document: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variable_bindings: Vec<VariableBinding>,
    pub response_paths: Vec<ResponsePath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_batch: Option<KeyBatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    /// Top-level response keys this fetch writes at each target position.
    pub coverage: Vec<CoveredField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceNode {
    pub nodes: Vec<PlanNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelNode {
    pub nodes: Vec<PlanNode>,
}

/// Wraps a fetch whose results are scattered over many list positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeNode {
    pub node: Box<PlanNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum PlanNode {
    Fetch(FetchNode),
    Sequence(SequenceNode),
    Parallel(ParallelNode),
    Composite(CompositeNode),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPlan {
    pub operation_kind: OperationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<PlanNode>,
    /// Source of a subscription; `node` then runs once per event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<FetchNode>,
}

impl FetchNode {
    pub fn representations(&self) -> Option<&SelectionSet> {
        self.variable_bindings.iter().find_map(|binding| match binding {
            VariableBinding::Representations { requires } => Some(requires),
            VariableBinding::Operation { .. } => None,
        })
    }

    /// Covered response keys whose conditions hold for `variables`.
    pub fn covered_keys<'a>(
        &'a self,
        variables: &'a HashMap<String, serde_json::Value>,
    ) -> impl Iterator<Item = &'a str> {
        self.coverage
            .iter()
            .filter(move |field| field.is_included(variables))
            .map(|field| field.response_key.as_str())
    }

    pub fn forwarded_variables(&self) -> impl Iterator<Item = &str> {
        self.variable_bindings
            .iter()
            .filter_map(|binding| match binding {
                VariableBinding::Operation { name } => Some(name.as_str()),
                VariableBinding::Representations { .. } => None,
            })
    }
}

impl PlanNode {
    /// All fetch nodes, in plan order.
    pub fn fetch_nodes(&self) -> Vec<&FetchNode> {
        let mut fetches = Vec::new();
        self.collect_fetch_nodes(&mut fetches);
        fetches
    }

    fn collect_fetch_nodes<'a>(&'a self, fetches: &mut Vec<&'a FetchNode>) {
        match self {
            PlanNode::Fetch(fetch) => fetches.push(fetch),
            PlanNode::Sequence(SequenceNode { nodes }) | PlanNode::Parallel(ParallelNode { nodes }) => {
                nodes.iter().for_each(|n| n.collect_fetch_nodes(fetches))
            }
            PlanNode::Composite(CompositeNode { node }) => node.collect_fetch_nodes(fetches),
        }
    }
}

impl QueryPlan {
    pub fn fetch_nodes(&self) -> Vec<&FetchNode> {
        let mut fetches: Vec<&FetchNode> = self.subscription.iter().collect();
        if let Some(node) = &self.node {
            fetches.extend(node.fetch_nodes());
        }
        fetches
    }
}

impl PrettyDisplay for FetchNode {
    fn pretty_fmt(&self, f: &mut Formatter<'_>, depth: usize) -> fmt::Result {
        let indent = get_indent(depth);
        write!(f, "{indent}Fetch(subgraph: \"{}\"", self.subgraph)?;
        if self.response_paths.iter().any(|p| !p.is_root()) {
            let paths: Vec<String> = self
                .response_paths
                .iter()
                .map(|p| format!("\"{}\"", p))
                .collect();
            write!(f, ", paths: [{}]", paths.join(", "))?;
        }
        if let Some(batch) = &self.key_batch {
            write!(f, ", lookup: {:?}({})", batch.class, batch.type_name)?;
        }
        if let Some(condition) = &self.condition {
            write!(f, ", condition: \"{}\"", condition)?;
        }
        writeln!(f, ") {{")?;
        if let Some(requires) = self.representations() {
            writeln!(f, "{indent}  {} =>", requires)?;
        }
        writeln!(f, "{indent}  {}", self.document)?;
        writeln!(f, "{indent}}},")
    }
}

impl PrettyDisplay for PlanNode {
    fn pretty_fmt(&self, f: &mut Formatter<'_>, depth: usize) -> fmt::Result {
        let indent = get_indent(depth);
        let (label, children): (&str, &[PlanNode]) = match self {
            PlanNode::Fetch(fetch) => return fetch.pretty_fmt(f, depth),
            PlanNode::Sequence(node) => ("Sequence", node.nodes.as_slice()),
            PlanNode::Parallel(node) => ("Parallel", node.nodes.as_slice()),
            PlanNode::Composite(node) => ("Composite", std::slice::from_ref(node.node.as_ref())),
        };

        writeln!(f, "{indent}{label} {{")?;
        for child in children {
            child.pretty_fmt(f, depth + 1)?;
        }
        writeln!(f, "{indent}}},")
    }
}

impl Display for PlanNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.pretty_fmt(f, 0)
    }
}

impl Display for QueryPlan {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "QueryPlan {{")?;
        if let Some(source) = &self.subscription {
            writeln!(f, "{}Subscription {{", get_indent(1))?;
            source.pretty_fmt(f, 2)?;
            writeln!(f, "{}}},", get_indent(1))?;
            if let Some(node) = &self.node {
                writeln!(f, "{}Event {{", get_indent(1))?;
                node.pretty_fmt(f, 2)?;
                writeln!(f, "{}}},", get_indent(1))?;
            }
        } else if let Some(node) = &self.node {
            node.pretty_fmt(f, 1)?;
        }
        write!(f, "}},")
    }
}

use crate::{
    ast::{normalization::error::NormalizationError, selection_set::SelectionConflict},
    utils::cancellation::CancellationError,
};

#[derive(Debug, Clone, thiserror::Error)]
pub enum PlanCompilationError {
    #[error("Cyclic requirements detected: {}", .cycle.join(" -> "))]
    CyclicRequirements { cycle: Vec<String> },
    #[error("Field \"{type_name}.{field_name}\" cannot be resolved by any subgraph")]
    UnsatisfiableField {
        type_name: String,
        field_name: String,
    },
    #[error("Field \"{field_name}\" is not defined on type \"{type_name}\"")]
    UnknownField {
        type_name: String,
        field_name: String,
    },
    #[error("Type \"{0}\" is not defined")]
    UnknownType(String),
    #[error("Type \"{type_name}\" has no key in subgraph \"{subgraph}\"")]
    MissingEntityKey { type_name: String, subgraph: String },
    #[error("Key field \"{type_name}.{field_name}\" cannot be resolved by subgraph \"{subgraph}\"")]
    KeyFieldNotServed {
        type_name: String,
        field_name: String,
        subgraph: String,
    },
    #[error("Conflicting requirement: {0}")]
    ConflictingRequirement(#[from] SelectionConflict),
    #[error("Subscription root fields must be resolved by a single subgraph, found: {}", .0.join(", "))]
    SubscriptionSpansSubgraphs(Vec<String>),
    #[error("Variable \"${0}\" is used but not defined by the operation")]
    UndefinedVariable(String),
    #[error("Internal planner error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum PlannerError {
    #[error("failed to parse operation: {0}")]
    ParseError(String),
    #[error("failed to normalize operation: {0}")]
    Normalization(#[from] NormalizationError),
    #[error("failed to build query plan: {0}")]
    Compilation(#[from] PlanCompilationError),
    #[error("query planning was {0}")]
    Cancelled(#[from] CancellationError),
}

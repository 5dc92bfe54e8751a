#[derive(Debug, Clone, thiserror::Error)]
pub enum SchemaError {
    #[error("failed to parse fused schema: {0}")]
    ParseError(String),
    #[error("fused schema does not define a query type")]
    MissingQueryType,
    #[error("root type \"{0}\" is not defined")]
    RootTypeNotFound(String),
    #[error("invalid @{directive} on {location}: {reason}")]
    InvalidDirective {
        directive: &'static str,
        location: String,
        reason: String,
    },
    #[error("subgraph \"{subgraph}\" referenced on {location} has no @transport declaration")]
    UnknownSubgraph { subgraph: String, location: String },
    #[error("invalid field set \"{fields}\" on type \"{type_name}\": {reason}")]
    InvalidFieldSet {
        type_name: String,
        fields: String,
        reason: String,
    },
}

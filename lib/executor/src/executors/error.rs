use std::time::Duration;

#[derive(thiserror::Error, Debug, Clone)]
pub enum SubgraphExecutorError {
    #[error("Failed to parse endpoint \"{0}\" as URI: {1}")]
    EndpointParseFailure(String, String),
    #[error("Failed to build request to subgraph \"{0}\": {1}")]
    RequestBuildFailure(String, String),
    #[error("Failed to send request to subgraph \"{0}\": {1}")]
    RequestFailure(String, String),
    #[error("Subgraph \"{0}\" responded with status {1} and no GraphQL body")]
    UnexpectedStatus(String, u16),
    #[error("Failed to parse response of subgraph \"{0}\": {1}")]
    ResponseParseFailure(String, String),
    #[error("Request timed out after {0:?}")]
    RequestTimeout(Duration),
    #[error("No executor is registered for subgraph \"{0}\"")]
    ExecutorNotFound(String),
    #[error("Subscriptions are not supported by this transport")]
    SubscriptionsNotSupported,
}

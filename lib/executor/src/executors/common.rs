use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::{
    executors::error::SubgraphExecutorError, response::subgraph_response::SubgraphResponse,
};

/// Transport to one subgraph. `Err` always means the request itself failed;
/// GraphQL errors travel inside the `SubgraphResponse`.
#[async_trait]
pub trait SubgraphExecutor: Send + Sync {
    async fn execute(
        &self,
        execution_request: SubgraphExecutionRequest,
    ) -> Result<SubgraphResponse, SubgraphExecutorError>;

    /// Opens an event stream for a subscription source fetch.
    async fn subscribe(
        &self,
        _execution_request: SubgraphExecutionRequest,
    ) -> Result<BoxStream<'static, SubgraphResponse>, SubgraphExecutorError> {
        Err(SubgraphExecutorError::SubscriptionsNotSupported)
    }

    fn to_boxed_arc<'a>(self) -> Arc<Box<dyn SubgraphExecutor + Send + Sync + 'a>>
    where
        Self: Sized + Send + Sync + 'a,
    {
        Arc::new(Box::new(self))
    }
}

pub type SubgraphExecutorType = dyn crate::executors::common::SubgraphExecutor + Send + Sync;

pub type SubgraphExecutorBoxedArc = Arc<Box<SubgraphExecutorType>>;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubgraphExecutionRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<Map<String, Value>>,
}

impl SubgraphExecutionRequest {
    pub fn new(query: impl Into<String>) -> Self {
        SubgraphExecutionRequest {
            query: query.into(),
            operation_name: None,
            variables: None,
        }
    }

    pub fn add_variable(&mut self, name: impl Into<String>, value: Value) {
        self.variables
            .get_or_insert_with(Map::new)
            .insert(name.into(), value);
    }
}

use std::sync::Arc;

use crate::response::graphql_error::GraphQLError;

/// Rewrites or drops errors before they reach the client.
pub trait ErrorFilter: Send + Sync {
    fn filter(&self, error: GraphQLError) -> Option<GraphQLError>;
}

impl<F> ErrorFilter for F
where
    F: Fn(GraphQLError) -> Option<GraphQLError> + Send + Sync,
{
    fn filter(&self, error: GraphQLError) -> Option<GraphQLError> {
        self(error)
    }
}

#[derive(Clone, Default)]
pub struct ExecutionOptions {
    /// Attach the plan as `extensions.queryPlan`.
    pub expose_query_plan: bool,
    pub error_filter: Option<Arc<dyn ErrorFilter>>,
}

impl ExecutionOptions {
    pub fn apply_error_filter(&self, errors: Vec<GraphQLError>) -> Vec<GraphQLError> {
        match &self.error_filter {
            Some(error_filter) => errors
                .into_iter()
                .filter_map(|error| error_filter.filter(error))
                .collect(),
            None => errors,
        }
    }
}

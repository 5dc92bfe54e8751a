use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::response::graphql_error::{GraphQLError, QUERY_PLAN_BUILD_FAILED};

/// The client-facing `{ data, errors, extensions }` envelope.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct ExecutionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphQLError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Map<String, Value>>,
}

impl ExecutionResponse {
    /// Response for an operation that could not be planned: no `data`, one error.
    pub fn plan_failure(message: impl Into<String>) -> Self {
        ExecutionResponse {
            data: None,
            errors: vec![GraphQLError::from(message.into()).with_code(QUERY_PLAN_BUILD_FAILED)],
            extensions: None,
        }
    }

    pub fn from_error(error: GraphQLError) -> Self {
        ExecutionResponse {
            data: None,
            errors: vec![error],
            extensions: None,
        }
    }

    pub fn add_extension(&mut self, key: &str, value: Value) {
        self.extensions
            .get_or_insert_with(Map::new)
            .insert(key.to_string(), value);
    }
}

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::response::graphql_error::GraphQLError;

/// A subgraph's GraphQL response. A `null` or missing `data` is `None`.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct SubgraphResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<GraphQLError>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl SubgraphResponse {
    pub fn from_data(data: Value) -> Self {
        SubgraphResponse {
            data: Some(data),
            ..Default::default()
        }
    }

    pub fn from_errors(errors: Vec<GraphQLError>) -> Self {
        SubgraphResponse {
            errors: Some(errors),
            ..Default::default()
        }
    }

    /// Whether the body looked like a GraphQL response at all.
    pub fn is_graphql_body(&self) -> bool {
        self.data.is_some() || self.errors.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::SubgraphResponse;
    use crate::response::graphql_error::GraphQLErrorPathSegment;

    #[test]
    fn null_data_is_absent() {
        let response: SubgraphResponse = serde_json::from_str(
            r#"{"data":null,"errors":[{"message":"boom","path":["_entities",1,"inStock"]}]}"#,
        )
        .unwrap();

        assert!(response.data.is_none());
        let errors = response.errors.unwrap();
        assert_eq!(
            errors[0].path,
            Some(vec![
                GraphQLErrorPathSegment::String("_entities".to_string()),
                GraphQLErrorPathSegment::Index(1),
                GraphQLErrorPathSegment::String("inStock".to_string()),
            ])
        );
    }
}

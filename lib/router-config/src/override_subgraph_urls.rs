use std::collections::HashMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Replaces the `@transport` locations declared in the fused schema.
///
/// ```yaml
/// override_subgraph_urls:
///   subgraphs:
///     products:
///       url: "http://localhost:4001/graphql"
/// ```
#[derive(Debug, Default, Deserialize, Serialize, JsonSchema, Clone)]
#[serde(deny_unknown_fields)]
pub struct OverrideSubgraphUrlsConfig {
    /// Keys are subgraph names as declared in the fused schema.
    #[serde(default)]
    pub subgraphs: HashMap<String, OverrideSubgraphUrlConfig>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone)]
#[serde(deny_unknown_fields)]
pub struct OverrideSubgraphUrlConfig {
    /// Absolute URL, including the scheme.
    pub url: String,
}

impl OverrideSubgraphUrlsConfig {
    pub fn url_map(&self) -> HashMap<String, String> {
        self.subgraphs
            .iter()
            .map(|(name, entry)| (name.clone(), entry.url.clone()))
            .collect()
    }
}

use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone)]
#[serde(deny_unknown_fields)]
pub struct QueryPlannerConfig {
    /// Adds the compiled query plan to the response `extensions` under `queryPlan`.
    #[serde(default)]
    pub allow_expose: bool,

    /// The maximum time the planner may spend on a single operation. Planning is cancelled once it elapses.
    ///
    /// Default: 10s.
    #[serde(default = "default_query_planning_timeout", with = "humantime_serde")]
    #[schemars(with = "String")]
    pub timeout: Duration,

    /// How many compiled plans are kept, keyed by operation text and name.
    #[serde(default = "default_cache_size")]
    pub cache_size: u64,

    /// Merges fetches that request the same selection from the same subgraph at the same path.
    #[serde(default = "default_deduplicate_fetches")]
    pub deduplicate_fetches: bool,
}

impl Default for QueryPlannerConfig {
    fn default() -> Self {
        Self {
            allow_expose: false,
            timeout: default_query_planning_timeout(),
            cache_size: default_cache_size(),
            deduplicate_fetches: default_deduplicate_fetches(),
        }
    }
}

fn default_query_planning_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_cache_size() -> u64 {
    1000
}

fn default_deduplicate_fetches() -> bool {
    true
}

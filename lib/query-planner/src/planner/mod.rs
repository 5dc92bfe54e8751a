use std::sync::Arc;

use graphql_parser::query::Document;
use moka::sync::Cache;
use tracing::{debug, instrument};
use xxhash_rust::xxh3::Xxh3;

use crate::{
    ast::{normalization::normalize_operation, operation::NormalizedOperation},
    schema::FusedSchema,
    utils::{cancellation::CancellationToken, parsing::safe_parse_operation},
};

use error::PlannerError;
use plan_nodes::QueryPlan;

mod dedupe;
mod document;
pub mod error;
pub mod plan_nodes;
pub mod query_plan;
pub mod requirements;

pub use query_plan::build_query_plan;

const DEFAULT_CACHE_SIZE: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlannerOptions {
    /// Merge entity fetches that send the same request shape.
    pub deduplicate_fetches: bool,
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self {
            deduplicate_fetches: true,
        }
    }
}

/// Normalizes and plans operations against one fused schema, caching plans
/// per normalized operation shape.
pub struct Planner {
    schema: Arc<FusedSchema>,
    options: PlannerOptions,
    cache: Cache<u64, Arc<QueryPlan>>,
}

impl Planner {
    pub fn new(schema: Arc<FusedSchema>, options: PlannerOptions) -> Self {
        Self::with_cache_size(schema, options, DEFAULT_CACHE_SIZE)
    }

    pub fn with_cache_size(schema: Arc<FusedSchema>, options: PlannerOptions, cache_size: u64) -> Self {
        Self {
            schema,
            options,
            cache: Cache::new(cache_size),
        }
    }

    pub fn schema(&self) -> &Arc<FusedSchema> {
        &self.schema
    }

    pub fn options(&self) -> PlannerOptions {
        self.options
    }

    pub fn normalize(
        &self,
        document: &Document<'static, String>,
        operation_name: Option<&str>,
    ) -> Result<NormalizedOperation, PlannerError> {
        Ok(normalize_operation(&self.schema, document, operation_name)?)
    }

    /// Parses and normalizes `source`, then plans it.
    pub fn plan_source(
        &self,
        source: &str,
        operation_name: Option<&str>,
        cancellation: &CancellationToken,
    ) -> Result<(NormalizedOperation, Arc<QueryPlan>), PlannerError> {
        let document =
            safe_parse_operation(source).map_err(|e| PlannerError::ParseError(e.to_string()))?;
        let operation = self.normalize(&document, operation_name)?;
        let plan = self.plan(&operation, cancellation)?;

        Ok((operation, plan))
    }

    #[instrument(level = "debug", skip_all)]
    pub fn plan(
        &self,
        operation: &NormalizedOperation,
        cancellation: &CancellationToken,
    ) -> Result<Arc<QueryPlan>, PlannerError> {
        let cache_key = self.cache_key(operation);

        if let Some(plan) = self.cache.get(&cache_key) {
            debug!(cache_key, "query plan cache hit");
            return Ok(plan);
        }

        debug!(cache_key, "query plan cache miss");
        cancellation.bail_if_cancelled()?;
        let plan = Arc::new(build_query_plan(
            &self.schema,
            operation,
            self.options,
            cancellation,
        )?);
        self.cache.insert(cache_key, plan.clone());

        Ok(plan)
    }

    fn cache_key(&self, operation: &NormalizedOperation) -> u64 {
        let mut hasher = Xxh3::new();
        hasher.update(&operation.hash().to_le_bytes());
        hasher.update(&[self.options.deduplicate_fetches as u8]);
        hasher.digest()
    }
}

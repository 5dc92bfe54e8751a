use std::{collections::HashMap, sync::Arc, time::Duration};

use hyper_util::{
    client::legacy::Client,
    rt::{TokioExecutor, TokioTimer},
};
use tokio::sync::Semaphore;
use tracing::debug;

use crate::executors::{
    common::{SubgraphExecutor, SubgraphExecutorBoxedArc},
    error::SubgraphExecutorError,
    http::HTTPSubgraphExecutor,
};

/// Knobs for the shared HTTP client behind every subgraph executor.
#[derive(Debug, Clone)]
pub struct HttpExecutorOptions {
    pub max_connections_per_host: usize,
    pub pool_idle_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for HttpExecutorOptions {
    fn default() -> Self {
        Self {
            max_connections_per_host: 100,
            pool_idle_timeout: Duration::from_secs(50),
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Default)]
pub struct SubgraphExecutorMap {
    inner: HashMap<String, SubgraphExecutorBoxedArc>,
}

impl SubgraphExecutorMap {
    pub fn new() -> Self {
        SubgraphExecutorMap {
            inner: HashMap::new(),
        }
    }

    pub fn get(&self, subgraph_name: &str) -> Result<&SubgraphExecutorBoxedArc, SubgraphExecutorError> {
        self.inner
            .get(subgraph_name)
            .ok_or_else(|| SubgraphExecutorError::ExecutorNotFound(subgraph_name.to_string()))
    }

    pub fn insert_boxed_arc(&mut self, subgraph_name: String, boxed_arc: SubgraphExecutorBoxedArc) {
        self.inner.insert(subgraph_name, boxed_arc);
    }

    pub fn contains(&self, subgraph_name: &str) -> bool {
        self.inner.contains_key(subgraph_name)
    }

    /// One HTTP executor per subgraph, all sharing a pooled client.
    /// `overrides` replace endpoints declared in the schema.
    pub fn from_http_endpoint_map(
        subgraph_endpoint_map: HashMap<String, String>,
        overrides: &HashMap<String, String>,
        options: &HttpExecutorOptions,
    ) -> Result<Self, SubgraphExecutorError> {
        let mut builder = Client::builder(TokioExecutor::new());
        let builder_mut = builder
            .pool_timer(TokioTimer::new())
            .pool_idle_timeout(options.pool_idle_timeout)
            .pool_max_idle_per_host(options.max_connections_per_host);
        let http_client = builder_mut.build_http();
        let http_client_arc = Arc::new(http_client);

        let mut endpoints = subgraph_endpoint_map;
        for (subgraph_name, endpoint) in overrides {
            endpoints.insert(subgraph_name.clone(), endpoint.clone());
        }

        let mut inner = HashMap::with_capacity(endpoints.len());
        for (subgraph_name, endpoint) in endpoints {
            let uri: http::Uri = endpoint.parse().map_err(|e: http::uri::InvalidUri| {
                SubgraphExecutorError::EndpointParseFailure(endpoint.clone(), e.to_string())
            })?;
            debug!(subgraph = %subgraph_name, endpoint = %uri, "registering subgraph executor");

            let executor = HTTPSubgraphExecutor::new(
                subgraph_name.clone(),
                uri,
                http_client_arc.clone(),
                Arc::new(Semaphore::new(options.max_connections_per_host.max(1))),
                options.request_timeout,
            )
            .to_boxed_arc();
            inner.insert(subgraph_name, executor);
        }

        Ok(SubgraphExecutorMap { inner })
    }
}

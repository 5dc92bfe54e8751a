use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use http::HeaderMap;
use http::HeaderValue;
use http_body_util::BodyExt;
use http_body_util::Full;
use hyper::{body::Bytes, Version};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use tokio::sync::Semaphore;
use tracing::{debug, instrument};

use crate::executors::common::{SubgraphExecutionRequest, SubgraphExecutor};
use crate::executors::error::SubgraphExecutorError;
use crate::response::subgraph_response::SubgraphResponse;

pub type HttpClient = Client<HttpConnector, Full<Bytes>>;

#[derive(Debug)]
pub struct HTTPSubgraphExecutor {
    pub subgraph_name: String,
    pub endpoint: http::Uri,
    pub http_client: Arc<HttpClient>,
    pub header_map: HeaderMap,
    pub semaphore: Arc<Semaphore>,
    pub timeout: Duration,
}

impl HTTPSubgraphExecutor {
    pub fn new(
        subgraph_name: String,
        endpoint: http::Uri,
        http_client: Arc<HttpClient>,
        semaphore: Arc<Semaphore>,
        timeout: Duration,
    ) -> Self {
        let mut header_map = HeaderMap::new();
        header_map.insert(
            "Content-Type",
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        header_map.insert(
            http::header::CONNECTION,
            HeaderValue::from_static("keep-alive"),
        );
        Self {
            subgraph_name,
            endpoint,
            http_client,
            header_map,
            semaphore,
            timeout,
        }
    }

    async fn send(&self, body: Vec<u8>) -> Result<(http::StatusCode, Bytes), SubgraphExecutorError> {
        let mut req = hyper::Request::builder()
            .method(http::Method::POST)
            .uri(&self.endpoint)
            .version(Version::HTTP_11)
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| {
                SubgraphExecutorError::RequestBuildFailure(self.subgraph_name.clone(), e.to_string())
            })?;

        *req.headers_mut() = self.header_map.clone();

        let res = self.http_client.request(req).await.map_err(|e| {
            SubgraphExecutorError::RequestFailure(self.subgraph_name.clone(), e.to_string())
        })?;
        let status = res.status();

        let bytes = res
            .into_body()
            .collect()
            .await
            .map_err(|e| {
                SubgraphExecutorError::RequestFailure(self.subgraph_name.clone(), e.to_string())
            })?
            .to_bytes();

        Ok((status, bytes))
    }
}

#[async_trait]
impl SubgraphExecutor for HTTPSubgraphExecutor {
    #[instrument(level = "debug", skip_all, fields(subgraph = %self.subgraph_name))]
    async fn execute(
        &self,
        execution_request: SubgraphExecutionRequest,
    ) -> Result<SubgraphResponse, SubgraphExecutorError> {
        let body = serde_json::to_vec(&execution_request).map_err(|e| {
            SubgraphExecutorError::RequestBuildFailure(self.subgraph_name.clone(), e.to_string())
        })?;

        // The semaphore is owned by this executor and never closed.
        let _permit = self.semaphore.acquire().await.map_err(|e| {
            SubgraphExecutorError::RequestFailure(self.subgraph_name.clone(), e.to_string())
        })?;

        let (status, bytes) = tokio::time::timeout(self.timeout, self.send(body))
            .await
            .map_err(|_| SubgraphExecutorError::RequestTimeout(self.timeout))??;

        debug!(status = status.as_u16(), bytes = bytes.len(), "subgraph responded");

        match serde_json::from_slice::<SubgraphResponse>(&bytes) {
            Ok(response) if status.is_success() || response.is_graphql_body() => Ok(response),
            Ok(_) => Err(SubgraphExecutorError::UnexpectedStatus(
                self.subgraph_name.clone(),
                status.as_u16(),
            )),
            Err(_) if !status.is_success() => Err(SubgraphExecutorError::UnexpectedStatus(
                self.subgraph_name.clone(),
                status.as_u16(),
            )),
            Err(e) => Err(SubgraphExecutorError::ResponseParseFailure(
                self.subgraph_name.clone(),
                e.to_string(),
            )),
        }
    }
}

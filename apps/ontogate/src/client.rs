//! # SPARQL Endpoint Client
//!
//! Sends compiled queries to the configured SPARQL endpoint and parses
//! the results-JSON body into a [`ResultTable`]. Responses are memoized
//! by exact query text: the compiled text is deterministic, so equal
//! text means an equal result for the cache's lifetime.

use ontogate_core::{OntoError, ResultTable};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Upper bound on memoized responses; past it, new responses are served
/// but not retained.
const CACHE_CAPACITY: usize = 256;

/// HTTP client for the SPARQL endpoint with query-text memoization.
#[derive(Debug, Clone)]
pub struct SparqlClient {
    http: reqwest::Client,
    endpoint: String,
    cache: Arc<RwLock<BTreeMap<String, String>>>,
}

impl SparqlClient {
    /// Create a client for the given endpoint URL.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            cache: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// The configured endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Execute a query, returning the parsed result table.
    ///
    /// Failures (unreachable endpoint, non-success status, malformed
    /// body) surface as `TransportFailure`.
    pub async fn execute(&self, query: &str) -> Result<ResultTable, OntoError> {
        if let Some(body) = self.cache.read().await.get(query) {
            tracing::debug!("cache hit for query ({} bytes)", body.len());
            return ResultTable::from_sparql_json(body);
        }

        let response = self
            .http
            .post(&self.endpoint)
            .header("Accept", "application/sparql-results+json")
            .form(&[("query", query)])
            .send()
            .await
            .map_err(|e| {
                OntoError::TransportFailure(format!("cannot reach {}: {e}", self.endpoint))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(OntoError::TransportFailure(format!(
                "endpoint returned {status}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| OntoError::TransportFailure(format!("cannot read body: {e}")))?;
        let table = ResultTable::from_sparql_json(&body)?;

        let mut cache = self.cache.write().await;
        if cache.len() < CACHE_CAPACITY {
            cache.insert(query.to_string(), body);
        }
        tracing::info!("query sent to {}", self.endpoint);
        Ok(table)
    }

    /// Seed the memoization cache with a response body. Used by tests
    /// and warm-up tooling; the cache is otherwise filled by
    /// [`execute`](Self::execute).
    pub async fn prime(&self, query: impl Into<String>, body: impl Into<String>) {
        let mut cache = self.cache.write().await;
        if cache.len() < CACHE_CAPACITY {
            cache.insert(query.into(), body.into());
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

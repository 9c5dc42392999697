//! OpenSearch sink implementation.

use async_trait::async_trait;
use opensearch::{
    cluster::ClusterHealthParts,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{IndicesCreateParts, IndicesExistsParts},
    BulkParts, OpenSearch,
};
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::errors::SearchError;
use crate::interfaces::IndexSink;
use crate::search::bulk::{build_bulk_body, parse_bulk_response};
use crate::search::index_config::{get_index_settings, IndexConfig};
use crate::types::BulkUpsertSummary;
use catalog_indexer_shared::Document;

/// OpenSearch client implementation.
///
/// # Example
///
/// ```ignore
/// let sink = OpenSearchSink::new("http://localhost:9200", IndexConfig::default())?;
/// sink.ensure_index_exists().await?;
/// let summary = sink.bulk_upsert(&documents).await?;
/// ```
pub struct OpenSearchSink {
    client: OpenSearch,
    index_config: IndexConfig,
}

impl OpenSearchSink {
    /// Create a new sink connected to the specified URL.
    ///
    /// # Arguments
    ///
    /// * `url` - The OpenSearch server URL (e.g., "http://localhost:9200")
    /// * `index_config` - The index name and batch limit
    pub fn new(url: &str, index_config: IndexConfig) -> Result<Self, SearchError> {
        let parsed_url = Url::parse(url).map_err(|e| SearchError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .build()
            .map_err(|e| SearchError::connection(e.to_string()))?;

        let client = OpenSearch::new(transport);

        info!(url = %url, index = %index_config.name, "Created OpenSearch client");

        Ok(Self {
            client,
            index_config,
        })
    }

    /// Split `documents` into slices no larger than the configured limit.
    fn request_batches<'a>(&self, documents: &'a [Document]) -> std::slice::Chunks<'a, Document> {
        let limit = self
            .index_config
            .max_batch_size
            .unwrap_or(documents.len())
            .max(1);
        documents.chunks(limit)
    }

    async fn send_bulk(&self, documents: &[Document]) -> Result<BulkUpsertSummary, SearchError> {
        let body = build_bulk_body(&self.index_config.name, documents)?;

        let response = self
            .client
            .bulk(BulkParts::Index(&self.index_config.name))
            .body(body)
            .send()
            .await
            .map_err(|e| SearchError::connection(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Bulk request failed");
            return Err(Self::status_error(status.as_u16(), error_body, "Bulk request"));
        }

        let response_body: Value = response
            .json()
            .await
            .map_err(|e| SearchError::ParseError(e.to_string()))?;

        Ok(parse_bulk_response(&response_body, documents.len()))
    }

    /// Map a non-success status to an error, separating throttling and
    /// server faults (worth retrying) from client errors.
    fn status_error(status: u16, body: String, context: &str) -> SearchError {
        let msg = format!("{} failed with status {}: {}", context, status, body);
        if status == 429 || status >= 500 {
            SearchError::unavailable(msg)
        } else {
            SearchError::bulk_index(msg)
        }
    }
}

#[async_trait]
impl IndexSink for OpenSearchSink {
    /// Upsert `documents`, sending one bulk request per `max_batch_size`
    /// documents and merging the summaries.
    #[instrument(skip(self, documents), fields(count = documents.len()))]
    async fn bulk_upsert(&self, documents: &[Document]) -> Result<BulkUpsertSummary, SearchError> {
        let mut summary = BulkUpsertSummary::default();
        for request in self.request_batches(documents) {
            summary.absorb(self.send_bulk(request).await?);
        }

        if summary.has_failures() {
            warn!(
                succeeded = summary.succeeded,
                failed = summary.failed.len(),
                "Bulk upsert partially failed"
            );
        } else if summary.total > 0 {
            debug!(succeeded = summary.succeeded, "Bulk upsert succeeded");
        }
        Ok(summary)
    }

    async fn ensure_index_exists(&self) -> Result<(), SearchError> {
        let exists = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[self.index_config.name.as_str()]))
            .send()
            .await
            .map_err(|e| SearchError::connection(e.to_string()))?;

        if exists.status_code().is_success() {
            debug!(index = %self.index_config.name, "Index already exists");
            return Ok(());
        }

        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(&self.index_config.name))
            .body(get_index_settings())
            .send()
            .await
            .map_err(|e| SearchError::connection(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            // Another instance may have created it between the two calls
            if error_body.contains("resource_already_exists_exception") {
                return Ok(());
            }
            return Err(SearchError::index_creation(format!(
                "Create index failed with status {}: {}",
                status, error_body
            )));
        }

        info!(index = %self.index_config.name, "Created search index");
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, SearchError> {
        let response = self
            .client
            .cluster()
            .health(ClusterHealthParts::None)
            .send()
            .await
            .map_err(|e| SearchError::connection(e.to_string()))?;

        let health: Value = response.json().await.unwrap_or(json!({}));
        let status = health
            .get("status")
            .and_then(|s| s.as_str())
            .unwrap_or("unknown");

        info!(status = %status, "OpenSearch cluster status");
        Ok(status == "green" || status == "yellow")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_classification() {
        assert!(OpenSearchSink::status_error(429, String::new(), "Bulk").is_transient());
        assert!(OpenSearchSink::status_error(503, String::new(), "Bulk").is_transient());
        assert!(!OpenSearchSink::status_error(400, "bad".into(), "Bulk").is_transient());
    }

    fn docs(count: u128) -> Vec<Document> {
        (1..=count)
            .map(|n| Document::new(uuid::Uuid::from_u128(n), format!("film {}", n), None, None))
            .collect()
    }

    #[test]
    fn test_large_upserts_are_split_at_the_batch_limit() {
        let sink = OpenSearchSink::new("http://localhost:9200", IndexConfig::default()).unwrap();
        let documents = docs(2500);

        let sizes: Vec<usize> = sink.request_batches(&documents).map(<[Document]>::len).collect();
        assert_eq!(sizes, vec![1000, 1000, 500]);

        let ids: Vec<_> = sink.request_batches(&documents).flatten().map(|d| d.id).collect();
        assert_eq!(ids, documents.iter().map(|d| d.id).collect::<Vec<_>>());
    }

    #[test]
    fn test_unlimited_config_sends_one_request() {
        let config = IndexConfig {
            max_batch_size: None,
            ..IndexConfig::default()
        };
        let sink = OpenSearchSink::new("http://localhost:9200", config).unwrap();

        assert_eq!(sink.request_batches(&docs(1500)).count(), 1);
        assert_eq!(sink.request_batches(&[]).count(), 0);
    }

    #[test]
    fn test_new_rejects_invalid_url() {
        let result = OpenSearchSink::new("not a url", IndexConfig::default());
        assert!(matches!(result, Err(SearchError::ConnectionError(_))));
    }
}

//! Dependency initialization and wiring for the catalog indexer.

use std::sync::Arc;
use tracing::info;

use super::AppConfig;
use crate::IndexingError;
use catalog_indexer_pipeline::Orchestrator;
use catalog_indexer_repository::{
    redis_store, IndexConfig, IndexSink, OpenSearchSink, PgCatalog, RedisDocumentQueue,
    RedisWatermarkStorage,
};

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The configured orchestrator ready to run.
    pub orchestrator: Orchestrator,
}

impl Dependencies {
    /// Connect to PostgreSQL, Redis and OpenSearch and build the
    /// orchestrator.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(IndexingError)` - If a backend cannot be reached or the search
    ///   cluster reports itself unhealthy
    pub async fn new(config: &AppConfig) -> Result<Self, IndexingError> {
        info!(
            opensearch_url = %config.opensearch_url,
            index = %config.index_name,
            queue = %config.queue_name,
            sources = config.sources.len(),
            "Initializing dependencies"
        );

        // Initialize the catalog connection pool
        let catalog = PgCatalog::connect(&config.database_url, config.database_max_connections)
            .await
            .map_err(|e| IndexingError::config(format!("Failed to connect to PostgreSQL: {}", e)))?;

        info!("PostgreSQL pool created");

        // Initialize Redis for watermarks and the document queue
        let redis = redis_store::connect(&config.redis_url)
            .await
            .map_err(|e| IndexingError::config(format!("Failed to connect to Redis: {}", e)))?;
        let mut watermarks = RedisWatermarkStorage::new(redis.clone());
        if let Some(prefix) = &config.watermark_prefix {
            watermarks = watermarks.with_prefix(prefix.clone());
        }
        let queue = RedisDocumentQueue::new(redis.clone(), config.queue_name.clone());

        // Initialize OpenSearch sink
        let sink = OpenSearchSink::new(&config.opensearch_url, IndexConfig::new(&config.index_name))
            .map_err(|e| IndexingError::config(format!("Failed to create OpenSearch client: {}", e)))?;

        // Verify OpenSearch is reachable
        let healthy = sink
            .health_check()
            .await
            .map_err(|e| IndexingError::config(format!("OpenSearch health check failed: {}", e)))?;

        if !healthy {
            return Err(IndexingError::config("OpenSearch cluster is unhealthy"));
        }

        info!("OpenSearch connection verified");

        let mut orchestrator = Orchestrator::with_config(
            Arc::new(catalog),
            Arc::new(watermarks),
            Arc::new(queue),
            Arc::new(sink),
            config.sources.clone(),
            config.orchestrator_config(),
        );

        if let Some(dead_letter) = &config.dead_letter_queue {
            info!(queue = %dead_letter, "Rejected documents go to the dead-letter queue");
            orchestrator =
                orchestrator.with_dead_letter(Arc::new(RedisDocumentQueue::new(redis, dead_letter.clone())));
        }

        Ok(Self { orchestrator })
    }
}

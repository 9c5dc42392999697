//! Hand-off of documents between the producer and the index sink through a
//! durable queue.
//!
//! Entries are read with [`QueueBridge::drain`] and only removed with
//! [`QueueBridge::commit`] once the sink has accepted them, so a crash in
//! between delivers the same batch again. That is safe because the sink
//! upserts by document id.

use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::backoff::RetryPolicy;
use crate::errors::PipelineError;
use catalog_indexer_repository::{DocumentQueue, IndexSink};
use catalog_indexer_shared::Document;

/// Outcome of a [`QueueBridge::deliver`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Bulk requests sent to the sink.
    pub batches: usize,
    /// Documents the sink accepted.
    pub delivered: usize,
    /// Documents the sink rejected.
    pub failed: Vec<Uuid>,
    /// Entries moved to the dead-letter queue, rejected or undecodable.
    pub dead_lettered: usize,
}

#[derive(Clone)]
pub struct QueueBridge {
    queue: Arc<dyn DocumentQueue>,
    dead_letter: Option<Arc<dyn DocumentQueue>>,
    retry: RetryPolicy,
}

impl QueueBridge {
    pub fn new(queue: Arc<dyn DocumentQueue>, retry: RetryPolicy) -> Self {
        Self {
            queue,
            dead_letter: None,
            retry,
        }
    }

    /// Send rejected and undecodable entries to `queue` instead of
    /// dropping them.
    pub fn with_dead_letter(mut self, queue: Arc<dyn DocumentQueue>) -> Self {
        self.dead_letter = Some(queue);
        self
    }

    pub async fn push(&self, document: &Document) -> Result<(), PipelineError> {
        self.push_all(std::slice::from_ref(document)).await
    }

    /// Append `documents` in order with a single queue write.
    #[instrument(skip(self, documents), fields(count = documents.len()))]
    pub async fn push_all(&self, documents: &[Document]) -> Result<(), PipelineError> {
        if documents.is_empty() {
            return Ok(());
        }
        let entries = documents
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?;
        self.push_entries(&self.queue, &entries).await?;
        debug!("Enqueued documents");
        Ok(())
    }

    /// Up to `max` documents from the front of the queue, not yet removed.
    pub async fn drain(&self, max: usize) -> Result<Vec<Document>, PipelineError> {
        self.peek(max)
            .await?
            .iter()
            .map(|entry| {
                serde_json::from_str(entry)
                    .map_err(|e| PipelineError::data(format!("undecodable queue entry: {}", e)))
            })
            .collect()
    }

    /// Remove the first `count` entries.
    pub async fn commit(&self, count: usize) -> Result<(), PipelineError> {
        if count == 0 {
            return Ok(());
        }
        self.retry
            .retry("queue_commit", PipelineError::is_transient, || async move {
                self.queue.trim_front(count).await.map_err(PipelineError::from)
            })
            .await
    }

    pub async fn len(&self) -> Result<usize, PipelineError> {
        self.retry
            .retry("queue_len", PipelineError::is_transient, || async move {
                self.queue.len().await.map_err(PipelineError::from)
            })
            .await
    }

    /// Move everything queued into `sink`, `batch_size` documents at a time.
    ///
    /// A batch is committed once the sink call returns, even if the sink
    /// rejected some of its documents. Those are logged and, with a
    /// dead-letter queue configured, copied there first. A sink call that
    /// fails as a whole moves the entire batch to the dead-letter queue, or
    /// without one stops delivery and leaves the batch queued.
    #[instrument(skip(self, sink))]
    pub async fn deliver(
        &self,
        sink: &dyn IndexSink,
        batch_size: usize,
    ) -> Result<DeliveryReport, PipelineError> {
        if batch_size == 0 {
            return Err(PipelineError::data("delivery batch size must be greater than zero"));
        }
        let mut report = DeliveryReport::default();

        loop {
            let entries = self.peek(batch_size).await?;
            if entries.is_empty() {
                break;
            }

            let mut documents = Vec::with_capacity(entries.len());
            let mut undecodable = Vec::new();
            for entry in &entries {
                match serde_json::from_str::<Document>(entry) {
                    Ok(document) => documents.push(document),
                    Err(e) => {
                        error!(error = %e, "Skipping undecodable queue entry");
                        undecodable.push(entry.clone());
                    }
                }
            }

            if !documents.is_empty() {
                let batch = documents.as_slice();
                let upserted = self
                    .retry
                    .retry("bulk_upsert", PipelineError::is_transient, || async move {
                        sink.bulk_upsert(batch).await.map_err(PipelineError::from)
                    })
                    .await;

                let summary = match upserted {
                    Ok(summary) => summary,
                    Err(e) if !e.is_transient() && self.dead_letter.is_some() => {
                        error!(error = %e, count = entries.len(), "Search index rejected the batch");
                        report.dead_lettered += self.send_to_dead_letter(&entries).await?;
                        report.failed.extend(documents.iter().map(|d| d.id));
                        self.commit(entries.len()).await?;
                        continue;
                    }
                    Err(e) => return Err(e),
                };

                report.batches += 1;
                report.delivered += summary.succeeded;

                if summary.has_failures() {
                    error!(
                        failed = summary.failed.len(),
                        ids = ?summary.failed,
                        "Search index rejected documents"
                    );
                    let rejected: Vec<String> = documents
                        .iter()
                        .filter(|d| summary.failed.contains(&d.id))
                        .map(serde_json::to_string)
                        .collect::<Result<_, _>>()?;
                    report.dead_lettered += self.send_to_dead_letter(&rejected).await?;
                    report.failed.extend(summary.failed);
                }
            }
            report.dead_lettered += self.send_to_dead_letter(&undecodable).await?;

            self.commit(entries.len()).await?;
            debug!(count = entries.len(), "Committed queue entries");
        }

        if report.batches > 0 {
            info!(
                batches = report.batches,
                delivered = report.delivered,
                failed = report.failed.len(),
                "Delivered queued documents"
            );
        }
        Ok(report)
    }

    async fn send_to_dead_letter(&self, entries: &[String]) -> Result<usize, PipelineError> {
        if entries.is_empty() {
            return Ok(0);
        }
        match &self.dead_letter {
            Some(queue) => {
                self.push_entries(queue, entries).await?;
                warn!(count = entries.len(), "Moved entries to the dead-letter queue");
                Ok(entries.len())
            }
            None => Ok(0),
        }
    }

    async fn peek(&self, max: usize) -> Result<Vec<String>, PipelineError> {
        self.retry
            .retry("queue_peek", PipelineError::is_transient, || async move {
                self.queue.peek(max).await.map_err(PipelineError::from)
            })
            .await
    }

    async fn push_entries(
        &self,
        queue: &Arc<dyn DocumentQueue>,
        entries: &[String],
    ) -> Result<(), PipelineError> {
        self.retry
            .retry("queue_push", PipelineError::is_transient, || async move {
                queue.push_many(entries).await.map_err(PipelineError::from)
            })
            .await
    }
}

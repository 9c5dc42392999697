//! Durable per-source watermarks.
//!
//! A watermark is stored as a JSON object under the source's key:
//! `{"last_updated_at": "<ISO-8601>", "last_id": "<UUID>"}`. Other keys in
//! the object are left alone on write.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::backoff::RetryPolicy;
use crate::errors::PipelineError;
use catalog_indexer_repository::WatermarkStorage;
use catalog_indexer_shared::Watermark;

const LAST_UPDATED_AT: &str = "last_updated_at";
const LAST_ID: &str = "last_id";

/// Reads and writes watermarks through a [`WatermarkStorage`], retrying
/// transient storage failures.
#[derive(Clone)]
pub struct WatermarkStore {
    storage: Arc<dyn WatermarkStorage>,
    retry: RetryPolicy,
}

impl WatermarkStore {
    pub fn new(storage: Arc<dyn WatermarkStorage>, retry: RetryPolicy) -> Self {
        Self { storage, retry }
    }

    /// The stored watermark for `key`, or the default when there is none.
    ///
    /// A blob that cannot be decoded is treated as absent.
    #[instrument(skip(self))]
    pub async fn get(&self, key: &str) -> Result<Watermark, PipelineError> {
        let Some(blob) = self.retrieve(key).await? else {
            debug!(key, "No stored watermark, starting from the beginning");
            return Ok(Watermark::default());
        };

        match decode_watermark(&blob) {
            Ok(watermark) => Ok(watermark),
            Err(reason) => {
                warn!(key, reason = %reason, "Discarding undecodable watermark");
                Ok(Watermark::default())
            }
        }
    }

    /// Durably store `watermark` under `key`.
    #[instrument(skip(self, watermark), fields(watermark = %watermark))]
    pub async fn set(&self, key: &str, watermark: &Watermark) -> Result<(), PipelineError> {
        let mut state = self
            .retrieve(key)
            .await?
            .and_then(|blob| match serde_json::from_str::<Value>(&blob) {
                Ok(Value::Object(map)) => Some(map),
                _ => None,
            })
            .unwrap_or_default();

        if let Value::Object(fields) = serde_json::to_value(watermark)? {
            state.extend(fields);
        }
        let blob = Value::Object(state).to_string();
        let blob = blob.as_str();

        self.retry
            .retry("watermark_save", PipelineError::is_transient, || async move {
                self.storage
                    .save(key, blob)
                    .await
                    .map_err(PipelineError::from)
            })
            .await
    }

    async fn retrieve(&self, key: &str) -> Result<Option<String>, PipelineError> {
        self.retry
            .retry("watermark_retrieve", PipelineError::is_transient, || async move {
                self.storage.retrieve(key).await.map_err(PipelineError::from)
            })
            .await
    }
}

fn decode_watermark(blob: &str) -> Result<Watermark, String> {
    let value: Value = serde_json::from_str(blob).map_err(|e| e.to_string())?;
    let Value::Object(fields) = value else {
        return Err("watermark is not a JSON object".to_string());
    };
    let default = Watermark::default();

    let last_updated_at = match text_field(&fields, LAST_UPDATED_AT)? {
        Some(text) => parse_timestamp(text)?,
        None => default.last_updated_at,
    };
    let last_id = match text_field(&fields, LAST_ID)? {
        Some(text) => Uuid::parse_str(text).map_err(|e| format!("{}: {}", LAST_ID, e))?,
        None => default.last_id,
    };

    Ok(Watermark::new(last_updated_at, last_id))
}

fn text_field<'a>(fields: &'a Map<String, Value>, name: &str) -> Result<Option<&'a str>, String> {
    match fields.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text)),
        Some(other) => Err(format!("{} is not a string: {}", name, other)),
    }
}

/// Accepts RFC 3339 as well as the space-separated form PostgreSQL prints.
fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(text)
        .or_else(|_| DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%:z"))
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| format!("{} '{}': {}", LAST_UPDATED_AT, text, e))
}

/// The in-memory watermark of one source for the duration of a pass.
///
/// Loaded once, then written through on every advance so that the stored
/// value never lags behind what has been enqueued.
#[derive(Debug, Clone)]
pub struct WatermarkState {
    key: String,
    current: Watermark,
}

impl WatermarkState {
    pub async fn load(store: &WatermarkStore, key: &str) -> Result<Self, PipelineError> {
        let current = store.get(key).await?;
        Ok(Self {
            key: key.to_string(),
            current,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn current(&self) -> Watermark {
        self.current
    }

    /// Persist `next` and make it current.
    ///
    /// Fails with a data error if `next` is lower than the current
    /// watermark; the stored value is not touched in that case.
    pub async fn advance(
        &mut self,
        store: &WatermarkStore,
        next: Watermark,
    ) -> Result<(), PipelineError> {
        if next < self.current {
            return Err(PipelineError::data(format!(
                "watermark for '{}' would move backwards from {} to {}",
                self.key, self.current, next
            )));
        }
        store.set(&self.key, &next).await?;
        self.current = next;
        Ok(())
    }
}

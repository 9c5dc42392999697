//! Bulk request bodies and response parsing.

use opensearch::http::request::JsonBody;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::errors::SearchError;
use crate::types::BulkUpsertSummary;
use catalog_indexer_shared::Document;

/// Build the NDJSON body: one `index` action line and one source line per
/// document. The document id doubles as the index `_id`, which makes the
/// write an upsert.
pub(crate) fn build_bulk_body(
    index_name: &str,
    documents: &[Document],
) -> Result<Vec<JsonBody<Value>>, SearchError> {
    let mut body: Vec<JsonBody<Value>> = Vec::with_capacity(documents.len() * 2);

    for doc in documents {
        body.push(json!({"index": {"_index": index_name, "_id": doc.id.to_string()}}).into());
        let source = serde_json::to_value(doc)
            .map_err(|e| SearchError::SerializationError(e.to_string()))?;
        body.push(source.into());
    }

    Ok(body)
}

/// Read per-item outcomes out of a bulk response.
///
/// Items without an `error` object count as written. Items whose `_id` is
/// not a UUID cannot be reported back and are counted as neither.
pub(crate) fn parse_bulk_response(response: &Value, total: usize) -> BulkUpsertSummary {
    let has_errors = response
        .get("errors")
        .and_then(|e| e.as_bool())
        .unwrap_or(false);

    if !has_errors {
        return BulkUpsertSummary::all_succeeded(total);
    }

    let empty_vec = Vec::<Value>::new();
    let items = response
        .get("items")
        .and_then(|i| i.as_array())
        .unwrap_or(&empty_vec);

    let mut failed = Vec::new();
    let mut succeeded = 0;

    for item in items {
        let action = match item.get("index") {
            Some(action) => action,
            None => continue,
        };

        if action.get("error").is_some() {
            if let Some(id) = action
                .get("_id")
                .and_then(|id| id.as_str())
                .and_then(|id| Uuid::parse_str(id).ok())
            {
                failed.push(id);
            }
        } else {
            succeeded += 1;
        }
    }

    BulkUpsertSummary {
        total,
        succeeded,
        failed,
    }
}

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::RepositoryError;
use crate::interfaces::WatermarkStorage;
use crate::memory::FailureInjector;

/// Watermark storage held in a map.
#[derive(Debug, Default)]
pub struct MemoryWatermarkStorage {
    blobs: Mutex<HashMap<String, String>>,
    failures: FailureInjector,
    rejected_saves: FailureInjector,
    saves: Mutex<Vec<String>>,
}

impl MemoryWatermarkStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` calls fail with a connection error.
    pub fn fail_next(&self, count: usize) {
        self.failures.arm(count);
    }

    /// Make the next `count` saves fail with a non-transient query error.
    pub fn reject_next_saves(&self, count: usize) {
        self.rejected_saves.arm(count);
    }

    /// Store a raw blob, bypassing the failure injector.
    pub fn insert_raw(&self, key: &str, blob: &str) {
        if let Ok(mut blobs) = self.blobs.lock() {
            blobs.insert(key.to_string(), blob.to_string());
        }
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.blobs.lock().ok().and_then(|b| b.get(key).cloned())
    }

    /// Keys in the order they were saved, one entry per save.
    pub fn save_log(&self) -> Vec<String> {
        self.saves.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn check(&self) -> Result<(), RepositoryError> {
        if self.failures.should_fail() {
            return Err(RepositoryError::connection("watermark storage unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl WatermarkStorage for MemoryWatermarkStorage {
    async fn retrieve(&self, key: &str) -> Result<Option<String>, RepositoryError> {
        self.check()?;
        let blobs = self
            .blobs
            .lock()
            .map_err(|e| RepositoryError::query(e.to_string()))?;
        Ok(blobs.get(key).cloned())
    }

    async fn save(&self, key: &str, blob: &str) -> Result<(), RepositoryError> {
        self.check()?;
        if self.rejected_saves.should_fail() {
            return Err(RepositoryError::query("save rejected"));
        }
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|e| RepositoryError::query(e.to_string()))?;
        blobs.insert(key.to_string(), blob.to_string());
        if let Ok(mut saves) = self.saves.lock() {
            saves.push(key.to_string());
        }
        Ok(())
    }
}

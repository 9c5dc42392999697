//! Watermarks stored as JSON strings under plain Redis keys.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::errors::RepositoryError;
use crate::interfaces::WatermarkStorage;

/// Watermark storage backed by Redis `GET`/`SET`.
#[derive(Clone)]
pub struct RedisWatermarkStorage {
    manager: ConnectionManager,
    prefix: Option<String>,
}

impl RedisWatermarkStorage {
    pub fn new(manager: ConnectionManager) -> Self {
        Self {
            manager,
            prefix: None,
        }
    }

    /// Namespace every key as `{prefix}:{key}`.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    fn scoped_key(prefix: Option<&str>, key: &str) -> String {
        match prefix {
            Some(p) if !p.trim().is_empty() => format!("{}:{}", p.trim(), key),
            _ => key.to_string(),
        }
    }
}

#[async_trait]
impl WatermarkStorage for RedisWatermarkStorage {
    async fn retrieve(&self, key: &str) -> Result<Option<String>, RepositoryError> {
        let mut conn = self.manager.clone();
        let blob: Option<String> = conn
            .get(Self::scoped_key(self.prefix.as_deref(), key))
            .await?;
        Ok(blob)
    }

    async fn save(&self, key: &str, blob: &str) -> Result<(), RepositoryError> {
        let mut conn = self.manager.clone();
        conn.set::<_, _, ()>(Self::scoped_key(self.prefix.as_deref(), key), blob)
            .await?;
        Ok(())
    }
}

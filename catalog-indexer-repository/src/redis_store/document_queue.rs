//! Document queue backed by a Redis list.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::debug;

use crate::errors::RepositoryError;
use crate::interfaces::DocumentQueue;

/// FIFO queue on a Redis list: `RPUSH` to append, `LRANGE` to peek and
/// `LTRIM` to remove from the front.
#[derive(Clone)]
pub struct RedisDocumentQueue {
    manager: ConnectionManager,
    key: String,
}

impl RedisDocumentQueue {
    pub fn new(manager: ConnectionManager, key: impl Into<String>) -> Self {
        Self {
            manager,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    fn last_index(max: usize) -> isize {
        isize::try_from(max).unwrap_or(isize::MAX) - 1
    }
}

#[async_trait]
impl DocumentQueue for RedisDocumentQueue {
    async fn push_many(&self, entries: &[String]) -> Result<(), RepositoryError> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut conn = self.manager.clone();
        conn.rpush::<_, _, ()>(&self.key, entries.to_vec()).await?;

        debug!(queue = %self.key, count = entries.len(), "Pushed entries");
        Ok(())
    }

    async fn peek(&self, max: usize) -> Result<Vec<String>, RepositoryError> {
        if max == 0 {
            return Ok(Vec::new());
        }

        let mut conn = self.manager.clone();
        let entries: Vec<String> = conn.lrange(&self.key, 0, Self::last_index(max)).await?;
        Ok(entries)
    }

    async fn trim_front(&self, count: usize) -> Result<(), RepositoryError> {
        if count == 0 {
            return Ok(());
        }

        let start = isize::try_from(count).unwrap_or(isize::MAX);
        let mut conn = self.manager.clone();
        conn.ltrim::<_, ()>(&self.key, start, -1).await?;

        debug!(queue = %self.key, count = count, "Trimmed entries");
        Ok(())
    }

    async fn len(&self) -> Result<usize, RepositoryError> {
        let mut conn = self.manager.clone();
        let len: usize = conn.llen(&self.key).await?;
        Ok(len)
    }
}

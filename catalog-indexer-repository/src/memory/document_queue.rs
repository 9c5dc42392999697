use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::RepositoryError;
use crate::interfaces::DocumentQueue;
use crate::memory::FailureInjector;

/// FIFO queue held in a `VecDeque`.
#[derive(Debug, Default)]
pub struct MemoryDocumentQueue {
    entries: Mutex<VecDeque<String>>,
    failures: FailureInjector,
    fail_pushes: FailureInjector,
}

impl MemoryDocumentQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` calls of any kind fail with a connection error.
    pub fn fail_next(&self, count: usize) {
        self.failures.arm(count);
    }

    /// Make the next `count` pushes fail with a non-transient query error.
    pub fn reject_next_pushes(&self, count: usize) {
        self.fail_pushes.arm(count);
    }

    /// A copy of the queued entries, front first.
    pub fn snapshot(&self) -> Vec<String> {
        self.entries
            .lock()
            .map(|e| e.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn check(&self) -> Result<(), RepositoryError> {
        if self.failures.should_fail() {
            return Err(RepositoryError::connection("queue unavailable"));
        }
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, VecDeque<String>>, RepositoryError> {
        self.entries
            .lock()
            .map_err(|e| RepositoryError::query(e.to_string()))
    }
}

#[async_trait]
impl DocumentQueue for MemoryDocumentQueue {
    async fn push_many(&self, entries: &[String]) -> Result<(), RepositoryError> {
        self.check()?;
        if self.fail_pushes.should_fail() {
            return Err(RepositoryError::query("push rejected"));
        }
        self.lock()?.extend(entries.iter().cloned());
        Ok(())
    }

    async fn peek(&self, max: usize) -> Result<Vec<String>, RepositoryError> {
        self.check()?;
        Ok(self.lock()?.iter().take(max).cloned().collect())
    }

    async fn trim_front(&self, count: usize) -> Result<(), RepositoryError> {
        self.check()?;
        let mut entries = self.lock()?;
        let count = count.min(entries.len());
        entries.drain(..count);
        Ok(())
    }

    async fn len(&self) -> Result<usize, RepositoryError> {
        self.check()?;
        Ok(self.lock()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_peek_does_not_remove() {
        let queue = MemoryDocumentQueue::new();
        queue
            .push_many(&["a".to_string(), "b".to_string(), "c".to_string()])
            .await
            .unwrap();

        assert_eq!(queue.peek(2).await.unwrap(), vec!["a", "b"]);
        assert_eq!(queue.len().await.unwrap(), 3);

        queue.trim_front(2).await.unwrap();
        assert_eq!(queue.peek(10).await.unwrap(), vec!["c"]);

        queue.trim_front(10).await.unwrap();
        assert_eq!(queue.len().await.unwrap(), 0);
    }
}

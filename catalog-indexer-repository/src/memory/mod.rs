//! In-memory implementations of every repository trait.
//!
//! They honour the same ordering and keying contracts as the real backends
//! and can be told to fail a number of upcoming calls, which is how the
//! pipeline's retry and replay behaviour is tested.

mod catalog;
mod document_queue;
mod index_sink;
mod watermark_storage;

pub use catalog::MemoryCatalog;
pub use document_queue::MemoryDocumentQueue;
pub use index_sink::MemorySink;
pub use watermark_storage::MemoryWatermarkStorage;

use std::sync::atomic::{AtomicUsize, Ordering};

/// Counts down injected failures.
#[derive(Debug, Default)]
pub(crate) struct FailureInjector {
    remaining: AtomicUsize,
}

impl FailureInjector {
    pub(crate) fn arm(&self, count: usize) {
        self.remaining.store(count, Ordering::SeqCst);
    }

    /// Returns true (and consumes one failure) if the next call must fail.
    pub(crate) fn should_fail(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

//! Bounded worker pool.
//!
//! The pool is an explicit value: build it once (per process or per
//! request) and hand it to the aggregator. Clones share the same permits,
//! so one pool bounds every pass that uses it.

use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Runs tasks on the tokio runtime with at most `size` running at once.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    /// Create a pool with the given bound.
    #[must_use]
    pub fn new(size: NonZeroUsize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(size.get())),
            size: size.get(),
        }
    }

    /// Configured bound.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Permits not currently held by a running task.
    #[must_use]
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Stop accepting work. Queued tasks resolve to `None`.
    pub fn close(&self) {
        self.permits.close();
    }

    /// Spawn a task that starts once a permit is free.
    ///
    /// The future is not polled before the permit is acquired, so any
    /// deadline it sets up starts counting only when it actually runs.
    /// Resolves to `None` if the pool was closed first.
    pub fn spawn<F>(&self, task: F) -> JoinHandle<Option<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        tokio::spawn(async move {
            let _permit = permits.acquire_owned().await.ok()?;
            Some(task.await)
        })
    }
}

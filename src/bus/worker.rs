//! Bounded pool for blocking work.

use crate::types::{Error, Result};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::Instrument;

/// Runs blocking closures on tokio's blocking threads, at most `size` at a
/// time. The caller's span is carried onto the worker thread so the
/// correlation id stays attached to whatever the job logs.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Run `job` on the pool and wait for its result. A panicking job
    /// surfaces as an internal error.
    pub async fn run<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let span = tracing::Span::current();
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .instrument(span.clone())
            .await
            .map_err(|_| Error::internal("worker pool closed"))?;

        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let _entered = span.enter();
            job()
        });

        handle.await.map_err(|e| {
            tracing::error!("Worker job failed: {}", e);
            Error::internal(format!("worker job failed: {e}"))
        })?
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Free slots right now.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_run_returns_result() {
        let pool = WorkerPool::new(2);
        let value = pool.run(|| Ok(21 * 2)).await.unwrap();
        assert_eq!(value, 42);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn test_job_error_propagates() {
        let pool = WorkerPool::new(1);
        let err = pool
            .run(|| -> Result<()> { Err(Error::not_found("row 7")) })
            .await
            .unwrap_err();
        assert_eq!(err.code(), 404);
    }

    #[tokio::test]
    async fn test_panicking_job_is_internal_error() {
        let pool = WorkerPool::new(1);
        let err = pool
            .run(|| -> Result<()> { panic!("boom") })
            .await
            .unwrap_err();
        assert_eq!(err.code(), 500);
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_bounded_by_size() {
        let pool = WorkerPool::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let jobs = (0..6).map(|_| {
            let pool = pool.clone();
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            async move {
                pool.run(move || {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(20));
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                })
                .await
            }
        });
        for result in futures::future::join_all(jobs).await {
            result.unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }
}

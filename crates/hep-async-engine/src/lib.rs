//! `AsyncEngine`: a pool of cooperative worker tasks (§4.3 C7). Task
//! submission is lock-free from the caller's perspective -- `spawn` never
//! blocks and never raises synchronously (§7); errors accumulate and are
//! only visible after `wait()`.
//!
//! `async.threads == 0` (§6.2) means "inline": tasks are spawned onto the
//! ambient Tokio runtime the caller is already running on, rather than a
//! dedicated pool. A nonzero thread count spins up a dedicated
//! multi-threaded runtime so CPU-bound or blocking work doesn't compete
//! with the caller's own tasks.

use std::future::Future;

use parking_lot::Mutex;
use tokio::task::JoinSet;

#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error("task panicked: {0}")]
    Panicked(String),
    #[error("{0}")]
    Failed(String),
}

impl EngineError {
    pub fn from_display(e: impl std::fmt::Display) -> Self {
        EngineError::Failed(e.to_string())
    }
}

enum Runtime {
    /// Spawn onto whichever Tokio runtime is driving the calling task.
    Ambient,
    /// A dedicated multi-threaded runtime, owned by this engine.
    Dedicated(tokio::runtime::Runtime),
}

/// A pool of cooperative worker tasks. Cloning an `AsyncEngine` is cheap
/// and shares the same pool and error list; construct one per client and
/// hand out clones to `WriteBatch`, `Prefetcher`, etc.
#[derive(Clone)]
pub struct AsyncEngine {
    inner: std::sync::Arc<Inner>,
}

struct Inner {
    runtime: Runtime,
    tasks: Mutex<JoinSet<Result<(), EngineError>>>,
    errors: Mutex<Vec<EngineError>>,
}

impl AsyncEngine {
    /// `threads == 0` runs inline on the ambient runtime; otherwise spins
    /// up a dedicated runtime with that many worker threads.
    pub fn new(threads: usize) -> std::io::Result<Self> {
        let runtime = if threads == 0 {
            Runtime::Ambient
        } else {
            Runtime::Dedicated(
                tokio::runtime::Builder::new_multi_thread()
                    .worker_threads(threads)
                    .thread_name("hep-async-engine")
                    .enable_all()
                    .build()?,
            )
        };
        Ok(Self {
            inner: std::sync::Arc::new(Inner {
                runtime,
                tasks: Mutex::new(JoinSet::new()),
                errors: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Submits `fut` for execution. Never blocks; never observes the
    /// task's outcome directly. Call `wait()` to drain and observe errors.
    pub fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = Result<(), EngineError>> + Send + 'static,
    {
        let mut tasks = self.inner.tasks.lock();
        match &self.inner.runtime {
            Runtime::Ambient => {
                tasks.spawn(fut);
            }
            Runtime::Dedicated(rt) => {
                tasks.spawn_on(fut, rt.handle());
            }
        }
    }

    /// Awaits completion of every task spawned so far (including ones
    /// spawned by other tasks while waiting), accumulating their errors.
    /// Returns the first error observed, if any; the full list remains
    /// available via [`Self::errors`].
    pub async fn wait(&self) -> Result<(), EngineError> {
        loop {
            let mut tasks = {
                let mut guard = self.inner.tasks.lock();
                std::mem::replace(&mut *guard, JoinSet::new())
            };
            if tasks.is_empty() {
                break;
            }
            while let Some(result) = tasks.join_next().await {
                let outcome = match result {
                    Ok(Ok(())) => None,
                    Ok(Err(e)) => Some(e),
                    Err(join_err) if join_err.is_panic() => {
                        Some(EngineError::Panicked(join_err.to_string()))
                    }
                    Err(join_err) => Some(EngineError::Panicked(join_err.to_string())),
                };
                if let Some(e) = outcome {
                    tracing::error!(error = %e, "async engine task failed");
                    self.inner.errors.lock().push(e);
                }
            }
            // New tasks may have been spawned by the ones we just joined
            // (e.g. the prefetcher's loader re-arms itself); loop until a
            // drain finds nothing new.
            if self.inner.tasks.lock().is_empty() {
                break;
            }
        }
        self.inner.errors.lock().first().cloned().map_or(Ok(()), Err)
    }

    /// All errors accumulated since the last call to [`Self::clear_errors`].
    pub fn errors(&self) -> Vec<EngineError> {
        self.inner.errors.lock().clone()
    }

    pub fn clear_errors(&self) {
        self.inner.errors.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn inline_engine_runs_tasks_and_collects_errors() {
        let engine = AsyncEngine::new(0).unwrap();
        let count = Arc::new(AtomicUsize::new(0));

        for i in 0..5 {
            let count = count.clone();
            engine.spawn(async move {
                count.fetch_add(1, Ordering::SeqCst);
                if i == 2 {
                    Err(EngineError::Failed("boom".into()))
                } else {
                    Ok(())
                }
            });
        }

        let result = engine.wait().await;
        assert_eq!(count.load(Ordering::SeqCst), 5);
        assert!(result.is_err());
        assert_eq!(engine.errors().len(), 1);
    }

    #[tokio::test]
    async fn dedicated_engine_runs_on_its_own_pool() {
        let engine = AsyncEngine::new(2).unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();
        engine.spawn(async move {
            tx.send(()).ok();
            Ok(())
        });
        engine.wait().await.unwrap();
        rx.await.unwrap();
    }
}

//! Pool watcher contract.
//!
//! The pool itself lives outside this crate; what it needs from the core is
//! a queue of ready workers with exclusive checkout. `take`/`release` is
//! the exclusion token that guarantees one call at a time per worker: a
//! worker handed out by `take` is not visible to any other caller until
//! `release` puts it back.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::worker::SyncWorker;

/// Constructs a fresh, handshook worker for the watcher.
pub type Allocator =
    Arc<dyn Fn() -> Pin<Box<dyn Future<Output = Result<SyncWorker>> + Send>> + Send + Sync>;

/// Lifecycle container for a set of sync workers.
pub trait Watcher: Send + Sync {
    /// Add workers to the container.
    fn watch(&self, workers: Vec<SyncWorker>) -> impl Future<Output = Result<()>> + Send;

    /// Check out the first free worker, waiting up to `timeout`.
    fn take(&self, timeout: Duration) -> impl Future<Output = Result<SyncWorker>> + Send;

    /// Return a worker to the queue, making it visible to `take` again.
    fn release(&self, worker: SyncWorker);

    /// Allocate one new worker into the container.
    fn allocate(&self) -> impl Future<Output = Result<()>> + Send;

    /// All workers currently known to the container.
    fn list(&self) -> Vec<SyncWorker>;

    /// Remove a worker from the container without stopping it.
    fn remove(&self, worker: &SyncWorker);

    /// Stop every worker and drop the container.
    fn destroy(&self, timeout: Duration) -> impl Future<Output = ()> + Send;
}

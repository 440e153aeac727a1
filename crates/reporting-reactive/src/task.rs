//! Task ownership and cooperative cancellation.
//!
//! A [`TaskRegistry`] is the lifecycle scope of an owner: background work
//! spawned through it is cancelled when the owner shuts it down or drops it.
//! Work that has to notice cancellation between two steps holds a
//! [`CancellationToken`] obtained from the same registry.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinSet;

/// Cooperative cancellation token.
#[async_trait]
pub trait CancellationToken: Send + Sync {
    /// Resolves when cancellation is requested.
    async fn cancelled(&self);

    /// Non-blocking cancellation check.
    fn is_cancelled(&self) -> bool;
}

/// Resolves once `true` is published or the sender is gone.
async fn shutdown_requested(mut shutdown_rx: watch::Receiver<bool>) {
    while !*shutdown_rx.borrow_and_update() {
        if shutdown_rx.changed().await.is_err() {
            return;
        }
    }
}

/// Background tasks bound to one owner's lifetime.
///
/// Dropping the registry closes the shutdown channel, which fires every
/// token, and aborts the tasks still in its join set.
#[derive(Debug)]
pub struct TaskRegistry {
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<JoinSet<()>>,
}

impl TaskRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            shutdown_tx: watch::Sender::new(false),
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    /// Spawn a task that is dropped as soon as shutdown is requested.
    ///
    /// Must be called from within a Tokio runtime. After shutdown the future
    /// is dropped without being spawned.
    pub fn spawn_cancellable<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_shut_down() {
            tracing::debug!("task registry already shut down, dropping task");
            return;
        }
        let shutdown = shutdown_requested(self.shutdown_tx.subscribe());
        let mut tasks = self.tasks.lock();
        // Reap finished tasks so the set only holds live work.
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            tokio::select! {
                biased;
                () = shutdown => {}
                () = fut => {}
            }
        });
    }

    /// Request cancellation of every registered task. Idempotent.
    pub fn shutdown(&self) {
        if self.shutdown_tx.send_replace(true) {
            return;
        }
        let mut tasks = self.tasks.lock();
        tracing::debug!(tasks = tasks.len(), "task registry shutting down");
        tasks.abort_all();
    }

    /// Check if shutdown has been requested.
    pub fn is_shut_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Token that fires when this registry shuts down or is dropped.
    pub fn cancellation_token(&self) -> Arc<dyn CancellationToken> {
        Arc::new(ShutdownToken {
            shutdown_rx: self.shutdown_tx.subscribe(),
        })
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct ShutdownToken {
    shutdown_rx: watch::Receiver<bool>,
}

#[async_trait]
impl CancellationToken for ShutdownToken {
    async fn cancelled(&self) {
        shutdown_requested(self.shutdown_rx.clone()).await;
    }

    fn is_cancelled(&self) -> bool {
        *self.shutdown_rx.borrow() || self.shutdown_rx.has_changed().is_err()
    }
}

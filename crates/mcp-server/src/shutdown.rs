//! Process-wide shutdown sequencing.
//!
//! Steps register in the order they were brought up; shutdown runs them
//! LIFO (strategies stop first, then index managers release locks, then
//! vector stores close, then dirty state persists) so nothing is torn down
//! out from under something that still depends on it. A second shutdown
//! signal that arrives while the sequence is already running is logged and
//! otherwise ignored — the in-flight sequence runs to completion.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

type CleanupStep = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

pub struct ShutdownRegistry {
    steps: Mutex<Vec<CleanupStep>>,
    running: AtomicBool,
}

impl ShutdownRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            steps: Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
        }
    }

    /// Register a cleanup step. Steps run in LIFO order: the most recently
    /// registered step runs first.
    pub async fn register<F, Fut>(&self, step: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut steps = self.steps.lock().await;
        steps.push(Box::new(move || Box::pin(step())));
    }

    /// Run every registered step LIFO, draining the registry. If shutdown
    /// is already in progress, logs and returns immediately without
    /// interrupting the in-flight run.
    pub async fn shutdown(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            log::warn!("shutdown already in progress, ignoring duplicate signal");
            return;
        }
        let mut steps = self.steps.lock().await;
        while let Some(step) = steps.pop() {
            step().await;
        }
    }
}

impl Default for ShutdownRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::Mutex as TokioMutex;

    #[tokio::test]
    async fn runs_steps_in_lifo_order() {
        let order = Arc::new(TokioMutex::new(Vec::new()));
        let registry = ShutdownRegistry::new();

        let o1 = order.clone();
        registry.register(move || async move { o1.lock().await.push(1) }).await;
        let o2 = order.clone();
        registry.register(move || async move { o2.lock().await.push(2) }).await;
        let o3 = order.clone();
        registry.register(move || async move { o3.lock().await.push(3) }).await;

        registry.shutdown().await;
        assert_eq!(*order.lock().await, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn duplicate_shutdown_does_not_rerun_steps() {
        let count = Arc::new(TokioMutex::new(0));
        let registry = ShutdownRegistry::new();
        let c = count.clone();
        registry.register(move || async move { *c.lock().await += 1 }).await;

        registry.shutdown().await;
        registry.shutdown().await;
        assert_eq!(*count.lock().await, 1);
    }
}

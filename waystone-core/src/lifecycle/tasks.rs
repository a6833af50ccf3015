//! Supervised background work
//!
//! Revalidation fetches, cache writes and eviction run detached from the
//! response path. They are spawned through [`BackgroundTasks`] so the host
//! can [`drain`](BackgroundTasks::drain) them before shutting down instead of
//! dropping half-finished writes.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::oneshot;
use tokio::task::JoinSet;

/// Registry of detached tasks with a drain-on-shutdown contract
#[derive(Clone, Default)]
pub struct BackgroundTasks {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    set: Mutex<JoinSet<()>>,
    spawned: AtomicU64,
}

/// Result of a registered task, for callers that do want to wait on it
pub struct TaskHandle<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> TaskHandle<T> {
    /// Wait for the task's output; `None` if it panicked
    pub async fn join(self) -> Option<T> {
        self.rx.await.ok()
    }
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a registered task. Dropping the returned handle does not cancel it.
    pub fn spawn<F, T>(&self, future: F) -> TaskHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let mut set = self.inner.set.lock().unwrap_or_else(PoisonError::into_inner);

        // Reap finished tasks so a long-running registry does not accumulate them.
        while let Some(result) = set.try_join_next() {
            log_join_error(result);
        }

        set.spawn(async move {
            let _ = tx.send(future.await);
        });
        self.inner.spawned.fetch_add(1, Ordering::Relaxed);

        TaskHandle { rx }
    }

    /// Tasks registered and not yet reaped
    pub fn pending(&self) -> usize {
        self.inner.set.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Total tasks ever spawned
    pub fn spawned(&self) -> u64 {
        self.inner.spawned.load(Ordering::Relaxed)
    }

    /// Wait until every registered task has finished, including tasks
    /// registered while draining.
    pub async fn drain(&self) {
        loop {
            let mut set = {
                let mut guard = self.inner.set.lock().unwrap_or_else(PoisonError::into_inner);
                std::mem::take(&mut *guard)
            };
            if set.is_empty() {
                return;
            }
            while let Some(result) = set.join_next().await {
                log_join_error(result);
            }
        }
    }
}

fn log_join_error(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        log::error!("Background task failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn test_drain_waits_for_detached_tasks() {
        let tasks = BackgroundTasks::new();
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let done = done.clone();
            tasks.spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                done.fetch_add(1, Ordering::SeqCst);
            });
        }

        tasks.drain().await;
        assert_eq!(done.load(Ordering::SeqCst), 5);
        assert_eq!(tasks.pending(), 0);
        assert_eq!(tasks.spawned(), 5);
    }

    #[tokio::test]
    async fn test_drain_covers_tasks_spawned_while_draining() {
        let tasks = BackgroundTasks::new();
        let done = Arc::new(AtomicUsize::new(0));

        let inner_tasks = tasks.clone();
        let inner_done = done.clone();
        tasks.spawn(async move {
            let done = inner_done.clone();
            inner_tasks.spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                done.fetch_add(1, Ordering::SeqCst);
            });
            inner_done.fetch_add(1, Ordering::SeqCst);
        });

        tasks.drain().await;
        assert_eq!(done.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_handle_join_returns_output() {
        let tasks = BackgroundTasks::new();
        let handle = tasks.spawn(async { 42 });
        assert_eq!(handle.join().await, Some(42));
    }

    #[tokio::test]
    async fn test_panicking_task_does_not_break_drain() {
        let tasks = BackgroundTasks::new();
        let handle = tasks.spawn(async {
            panic!("boom");
        });
        tasks.drain().await;
        assert_eq!(handle.join().await, None::<()>);
    }
}

use crate::error::{FsutilError, Result};
use std::sync::Mutex as StdMutex;
use std::time::Duration;
use tokio::sync::{Mutex as TokioMutex, MutexGuard};

/// A FIFO-fair async mutex. Thin wrapper over `tokio::sync::Mutex` exposing
/// the two acquisition modes the indexing lock needs: non-blocking
/// `try_acquire` and a bounded-wait `acquire(timeout)`.
pub struct AsyncMutex {
    inner: TokioMutex<()>,
}

impl Default for AsyncMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl AsyncMutex {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: TokioMutex::const_new(()),
        }
    }

    /// Acquire without waiting. Returns `None` if already held.
    pub fn try_acquire(&self) -> Option<AsyncMutexGuard<'_>> {
        self.inner
            .try_lock()
            .ok()
            .map(|guard| AsyncMutexGuard { _guard: guard })
    }

    /// Acquire, waiting up to `timeout`. Fails with `LockTimeout` if the
    /// deadline passes first.
    pub async fn acquire(&self, timeout: Duration) -> Result<AsyncMutexGuard<'_>> {
        tokio::time::timeout(timeout, self.inner.lock())
            .await
            .map(|guard| AsyncMutexGuard { _guard: guard })
            .map_err(|_| FsutilError::LockTimeout)
    }
}

pub struct AsyncMutexGuard<'a> {
    _guard: MutexGuard<'a, ()>,
}

/// Process-wide at-most-one lock guarding write-heavy indexing operations
/// for one project at a time (spec §4.3 / §5). Acquisition is a single
/// atomic check-and-set: `try_acquire` either wins the underlying mutex and
/// records the project path in the same call, or fails outright. A
/// check-then-acquire pattern (check `current_project`, then separately lock)
/// would race two callers between the check and the lock; this type never
/// exposes that window.
pub struct IndexingLock {
    mutex: AsyncMutex,
    current_project: StdMutex<Option<String>>,
}

impl Default for IndexingLock {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexingLock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            mutex: AsyncMutex::new(),
            current_project: StdMutex::new(None),
        }
    }

    /// Attempt to acquire the lock for `project_path`. Fails immediately
    /// (never queues) if indexing is already in progress for any project.
    pub fn try_acquire(&self, project_path: &str) -> Option<IndexingLockGuard<'_>> {
        let guard = self.mutex.try_acquire()?;
        *self
            .current_project
            .lock()
            .expect("indexing lock poisoned") = Some(project_path.to_string());
        Some(IndexingLockGuard {
            _inner: guard,
            lock: self,
        })
    }

    /// The project currently holding the lock, if any.
    pub fn current_project(&self) -> Option<String> {
        self.current_project
            .lock()
            .expect("indexing lock poisoned")
            .clone()
    }
}

pub struct IndexingLockGuard<'a> {
    _inner: AsyncMutexGuard<'a>,
    lock: &'a IndexingLock,
}

impl Drop for IndexingLockGuard<'_> {
    fn drop(&mut self) {
        *self
            .lock
            .current_project
            .lock()
            .expect("indexing lock poisoned") = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_acquire_succeeds_when_uncontended() {
        let lock = IndexingLock::new();
        let guard = lock.try_acquire("/proj");
        assert!(guard.is_some());
        assert_eq!(lock.current_project().as_deref(), Some("/proj"));
    }

    #[test]
    fn try_acquire_fails_when_already_held() {
        let lock = IndexingLock::new();
        let _first = lock.try_acquire("/proj").unwrap();
        assert!(lock.try_acquire("/other").is_none());
        assert_eq!(lock.current_project().as_deref(), Some("/proj"));
    }

    #[test]
    fn releasing_clears_current_project() {
        let lock = IndexingLock::new();
        {
            let _guard = lock.try_acquire("/proj").unwrap();
        }
        assert_eq!(lock.current_project(), None);
        assert!(lock.try_acquire("/proj").is_some());
    }

    #[tokio::test]
    async fn acquire_times_out_while_held() {
        let lock = AsyncMutex::new();
        let _held = lock.try_acquire().unwrap();
        let result = lock.acquire(Duration::from_millis(20)).await;
        assert!(matches!(result, Err(FsutilError::LockTimeout)));
    }

    #[tokio::test]
    async fn acquire_succeeds_once_released() {
        let lock = AsyncMutex::new();
        {
            let _held = lock.try_acquire().unwrap();
        }
        let result = lock.acquire(Duration::from_millis(20)).await;
        assert!(result.is_ok());
    }
}

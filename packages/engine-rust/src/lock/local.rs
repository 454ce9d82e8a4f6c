//! In-process keyed lock backed by per-key async mutexes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use super::{KeyedLock, LockError, LockLease};

type LockTable = DashMap<String, Arc<Mutex<()>>>;

/// Keyed lock for a single engine instance.
///
/// Each key maps to a `tokio::sync::Mutex<()>`; waiters queue fairly on it.
/// The entry for a key is removed once no lease holds it and no task waits on
/// it, so the table only grows with the number of concurrently contended keys.
#[derive(Debug, Clone, Default)]
pub struct LocalKeyedLock {
    locks: Arc<LockTable>,
}

impl LocalKeyedLock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held or waited on.
    #[must_use]
    pub fn active_keys(&self) -> usize {
        self.locks.len()
    }

    /// Returns `true` if a lease for `key` is currently held.
    #[must_use]
    pub fn is_locked(&self, key: &str) -> bool {
        self.locks
            .get(key)
            .is_some_and(|entry| entry.value().try_lock().is_err())
    }
}

/// Drops an entry that nobody references besides the table itself.
fn prune(locks: &LockTable, key: &str) {
    locks.remove_if(key, |_, mutex| Arc::strong_count(mutex) == 1);
}

#[async_trait]
impl KeyedLock for LocalKeyedLock {
    async fn acquire(&self, key: &str, timeout: Duration) -> Result<LockLease, LockError> {
        let mutex = Arc::clone(&self.locks.entry(key.to_string()).or_default());

        let acquired = tokio::time::timeout(timeout, mutex.lock_owned()).await;
        match acquired {
            Ok(guard) => {
                debug!(key, "lock acquired");
                Ok(LockLease::new(
                    key,
                    LocalRelease {
                        key: key.to_string(),
                        guard: Some(guard),
                        locks: Arc::clone(&self.locks),
                    },
                ))
            }
            Err(_elapsed) => {
                prune(&self.locks, key);
                Err(LockError::timeout(key, timeout))
            }
        }
    }
}

/// Release handle stored inside the `LockLease`.
struct LocalRelease {
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<LockTable>,
}

impl Drop for LocalRelease {
    fn drop(&mut self) {
        // Unlock first so the guard's reference no longer counts against pruning.
        drop(self.guard.take());
        prune(&self.locks, &self.key);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test]
    async fn acquire_and_release_cleans_up_entry() {
        let lock = LocalKeyedLock::new();
        let lease = lock.acquire("X", Duration::from_secs(1)).await.unwrap();
        assert_eq!(lease.key(), "X");
        assert!(lock.is_locked("X"));
        assert_eq!(lock.active_keys(), 1);

        drop(lease);
        assert!(!lock.is_locked("X"));
        assert_eq!(lock.active_keys(), 0);
    }

    #[tokio::test]
    async fn second_acquire_on_same_key_times_out() {
        let lock = LocalKeyedLock::new();
        let _held = lock.acquire("X", Duration::from_secs(1)).await.unwrap();

        let err = lock
            .acquire("X", Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LockError::Timeout { ref key, timeout_ms: 20 } if key == "X"
        ));
        // The holder's entry survives the failed attempt.
        assert!(lock.is_locked("X"));
        assert_eq!(lock.active_keys(), 1);
    }

    #[tokio::test]
    async fn different_keys_do_not_contend() {
        let lock = LocalKeyedLock::new();
        let _x = lock.acquire("X", Duration::from_secs(1)).await.unwrap();
        let y = lock.acquire("Y", Duration::from_millis(10)).await;
        assert!(y.is_ok());
        assert_eq!(lock.active_keys(), 2);
    }

    #[tokio::test]
    async fn waiter_acquires_after_release() {
        let lock = LocalKeyedLock::new();
        let held = lock.acquire("X", Duration::from_secs(1)).await.unwrap();

        let waiter = tokio::spawn({
            let lock = lock.clone();
            async move { lock.acquire("X", Duration::from_secs(5)).await.map(|_| ()) }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        drop(held);

        waiter.await.unwrap().unwrap();
        assert_eq!(lock.active_keys(), 0);
    }

    #[tokio::test]
    async fn same_key_critical_sections_never_overlap() {
        let lock = LocalKeyedLock::new();
        let inside = Arc::new(AtomicU32::new(0));
        let max_inside = Arc::new(AtomicU32::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let lock = lock.clone();
            let inside = inside.clone();
            let max_inside = max_inside.clone();
            tasks.push(tokio::spawn(async move {
                let _lease = lock.acquire("X", Duration::from_secs(5)).await.unwrap();
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert_eq!(lock.active_keys(), 0);
    }
}

//! Keyed execution lock: serializes dispatches that share a lock key.
//!
//! - [`KeyedLock`]: acquisition contract; implementations may be backed by a
//!   shared store so the lock holds across engine instances
//! - [`LockLease`]: RAII handle, the lock is released when it is dropped
//! - [`local`]: in-process implementation for single-instance deployments

pub mod local;

use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bizflow_core::FlowError;
use tracing::debug;

pub use local::LocalKeyedLock;

// ---------------------------------------------------------------------------
// KeyedLock trait
// ---------------------------------------------------------------------------

/// Mutual exclusion scoped to a string key.
#[async_trait]
pub trait KeyedLock: Send + Sync {
    /// Waits up to `timeout` for exclusive ownership of `key`.
    ///
    /// # Errors
    ///
    /// - `LockError::Timeout` if the key stays held for the whole window.
    /// - `LockError::Backend` if the lock store fails.
    async fn acquire(&self, key: &str, timeout: Duration) -> Result<LockLease, LockError>;
}

// ---------------------------------------------------------------------------
// LockLease
// ---------------------------------------------------------------------------

/// Ownership of one lock key.
///
/// Dropping the lease releases the key on every exit path, including early
/// returns and unwinding.
pub struct LockLease {
    key: String,
    acquired_at: Instant,
    _release: Box<dyn Send + Sync>,
}

impl LockLease {
    /// Wraps a backend-specific release handle. `release` must give up the
    /// key when dropped.
    #[must_use]
    pub fn new(key: impl Into<String>, release: impl Send + Sync + 'static) -> Self {
        Self {
            key: key.into(),
            acquired_at: Instant::now(),
            _release: Box::new(release),
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn held_for(&self) -> Duration {
        self.acquired_at.elapsed()
    }
}

impl Drop for LockLease {
    fn drop(&mut self) {
        #[allow(clippy::cast_possible_truncation)]
        let held_ms = self.held_for().as_millis() as u64;
        debug!(key = %self.key, held_ms, "lock released");
    }
}

impl fmt::Debug for LockLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockLease")
            .field("key", &self.key)
            .field("acquired_at", &self.acquired_at)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// LockError
// ---------------------------------------------------------------------------

/// Errors returned by `KeyedLock::acquire`.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("lock [{key}] not acquired within {timeout_ms}ms")]
    Timeout { key: String, timeout_ms: u64 },
    #[error("lock backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

impl LockError {
    #[must_use]
    pub fn timeout(key: &str, timeout: Duration) -> Self {
        Self::Timeout {
            key: key.to_string(),
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl From<LockError> for FlowError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::Timeout { key, timeout_ms } => FlowError::LockTimeout { key, timeout_ms },
            LockError::Backend(inner) => FlowError::Lock(inner),
        }
    }
}

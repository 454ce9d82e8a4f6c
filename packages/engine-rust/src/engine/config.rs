use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What the definition registry does when two definitions share a business type.
///
/// Both policies report the duplicate at `error` level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// The later definition replaces the earlier one.
    #[default]
    Replace,
    /// Registry construction fails with `ConfigurationError::DuplicateDefinition`.
    Reject,
}

/// Engine-level configuration.
///
/// Controls lock acquisition, duplicate handling, and load shedding for the
/// tower pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Identifier of this engine instance, recorded on dispatch spans.
    pub node_id: String,
    /// Lock acquisition timeout in milliseconds when a `LockPolicy` sets none.
    pub default_lock_timeout_ms: u64,
    pub duplicate_policy: DuplicatePolicy,
    /// Maximum number of in-flight dispatches before the pipeline sheds load.
    pub max_concurrent_dispatches: u32,
}

impl EngineConfig {
    #[must_use]
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.default_lock_timeout_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            node_id: String::new(),
            default_lock_timeout_ms: 3_000,
            duplicate_policy: DuplicatePolicy::Replace,
            max_concurrent_dispatches: 1000,
        }
    }
}

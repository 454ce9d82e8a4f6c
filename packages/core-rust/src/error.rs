use crate::types::{Action, BusinessType, InterceptorId, PayloadTypes};

/// Errors raised by `BusinessEngine::process` and the components it drives.
///
/// Nothing is recovered internally: every variant reaches the caller.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    /// Dispatch could not be resolved against the registered configuration.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// A guard returned `false`. No interceptor or handler code ran.
    #[error("def [{business_type}] action [{action}] not allowed by guard [{guard}]")]
    GuardRejected {
        business_type: BusinessType,
        action: Action,
        guard: String,
    },

    /// The keyed execution lock was not acquired in time.
    #[error("lock [{key}] not acquired within {timeout_ms}ms")]
    LockTimeout { key: String, timeout_ms: u64 },

    /// The lock backend failed for a reason other than timing out.
    #[error("lock backend error: {0}")]
    Lock(anyhow::Error),

    /// Rejected by load shedding before reaching the engine.
    #[error("engine overloaded, try again later")]
    Overloaded,

    /// A caller-built context already carries an output. Nothing ran.
    #[error("context for biz id [{biz_id}] already carries an output")]
    AlreadyCompleted { biz_id: String },

    /// A guard, interceptor, or handler returned an error. The inner error is
    /// the original one, untouched.
    #[error(transparent)]
    Execution(anyhow::Error),
}

impl FlowError {
    /// Returns `true` for lookup and registration failures.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Returns `true` if retrying the same dispatch later may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LockTimeout { .. } | Self::Overloaded)
    }

    /// Short label for the variant, used as the `outcome` field on spans.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::GuardRejected { .. } => "guard_rejected",
            Self::LockTimeout { .. } => "lock_timeout",
            Self::Lock(_) => "lock",
            Self::Overloaded => "overloaded",
            Self::AlreadyCompleted { .. } => "already_completed",
            Self::Execution(_) => "execution",
        }
    }
}

/// Missing or inconsistent registrations, detected at lookup time.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("no lifecycle definition registered for business type [{business_type}]")]
    DefinitionNotFound { business_type: BusinessType },

    #[error("action [{action}] has no handler in definition [{business_type}]")]
    HandlerNotFound {
        business_type: BusinessType,
        action: Action,
    },

    #[error("interceptor [{id}] is not registered")]
    InterceptorNotFound { id: InterceptorId },

    #[error("{subject} is registered for payload types {registered}, requested {requested}")]
    PayloadTypeMismatch {
        subject: String,
        registered: PayloadTypes,
        requested: PayloadTypes,
    },

    #[error("business type [{business_type}] defined more than once")]
    DuplicateDefinition { business_type: BusinessType },
}

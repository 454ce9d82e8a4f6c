use std::any::Any;
use std::fmt;
use std::sync::Arc;

use bizflow_core::{ConfigurationError, Interceptor, InterceptorId, PayloadTypes};
use dashmap::DashMap;

// ---------------------------------------------------------------------------
// ErasedInterceptor
// ---------------------------------------------------------------------------

/// An interceptor instance with its payload types erased behind a runtime tag.
#[derive(Clone)]
pub struct ErasedInterceptor {
    id: InterceptorId,
    payload: PayloadTypes,
    /// Holds an `Arc<dyn Interceptor<T, R>>` for the tagged `(T, R)`.
    inner: Arc<dyn Any + Send + Sync>,
}

impl ErasedInterceptor {
    #[must_use]
    pub fn new<T, R>(id: InterceptorId, interceptor: Arc<dyn Interceptor<T, R>>) -> Self
    where
        T: Send + Sync + 'static,
        R: Send + Sync + 'static,
    {
        Self {
            id,
            payload: PayloadTypes::of::<T, R>(),
            inner: Arc::new(interceptor),
        }
    }

    #[must_use]
    pub fn id(&self) -> &InterceptorId {
        &self.id
    }

    #[must_use]
    pub fn payload_types(&self) -> PayloadTypes {
        self.payload
    }

    /// Recovers the typed interceptor.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::PayloadTypeMismatch` if the interceptor was
    /// registered for payload types other than `(T, R)`.
    pub fn downcast<T, R>(&self) -> Result<Arc<dyn Interceptor<T, R>>, ConfigurationError>
    where
        T: Send + Sync + 'static,
        R: Send + Sync + 'static,
    {
        let mismatch = || ConfigurationError::PayloadTypeMismatch {
            subject: format!("interceptor [{}]", self.id),
            registered: self.payload,
            requested: PayloadTypes::of::<T, R>(),
        };
        if !self.payload.matches::<T, R>() {
            return Err(mismatch());
        }
        self.inner
            .downcast_ref::<Arc<dyn Interceptor<T, R>>>()
            .cloned()
            .ok_or_else(mismatch)
    }
}

impl fmt::Debug for ErasedInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErasedInterceptor")
            .field("id", &self.id)
            .field("payload", &self.payload)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// InterceptorResolver
// ---------------------------------------------------------------------------

/// Capability handed to the engine for turning the interceptor identifiers
/// declared on an action binding into instances.
pub trait InterceptorResolver: Send + Sync {
    fn resolve(&self, id: &InterceptorId) -> Option<ErasedInterceptor>;
}

// ---------------------------------------------------------------------------
// InterceptorRegistry
// ---------------------------------------------------------------------------

/// Identifier -> interceptor instance registry; the default resolver.
///
/// Instances are shared across every dispatch that declares them, so they must
/// be safe to call concurrently.
#[derive(Debug, Default)]
pub struct InterceptorRegistry {
    by_id: DashMap<InterceptorId, ErasedInterceptor>,
}

impl InterceptorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an interceptor under `id`, replacing any previous registration.
    pub fn register<T, R>(&self, id: impl Into<InterceptorId>, interceptor: Arc<dyn Interceptor<T, R>>)
    where
        T: Send + Sync + 'static,
        R: Send + Sync + 'static,
    {
        let id = id.into();
        self.by_id
            .insert(id.clone(), ErasedInterceptor::new(id, interceptor));
    }

    #[must_use]
    pub fn contains(&self, id: &InterceptorId) -> bool {
        self.by_id.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl InterceptorResolver for InterceptorRegistry {
    fn resolve(&self, id: &InterceptorId) -> Option<ErasedInterceptor> {
        self.by_id.get(id).map(|entry| entry.value().clone())
    }
}

/// Resolves the interceptors declared for an action and sorts them ascending
/// by `order()`. The sort is stable: equal orders keep declaration order.
///
/// # Errors
///
/// - `ConfigurationError::InterceptorNotFound` for an unknown identifier.
/// - `ConfigurationError::PayloadTypeMismatch` for an interceptor registered
///   with other payload types.
pub fn resolve_sorted<T, R>(
    resolver: &dyn InterceptorResolver,
    ids: &[InterceptorId],
) -> Result<Vec<Arc<dyn Interceptor<T, R>>>, ConfigurationError>
where
    T: Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    let mut interceptors = ids
        .iter()
        .map(|id| {
            resolver
                .resolve(id)
                .ok_or_else(|| ConfigurationError::InterceptorNotFound { id: id.clone() })?
                .downcast::<T, R>()
        })
        .collect::<Result<Vec<_>, _>>()?;
    interceptors.sort_by_key(|interceptor| interceptor.order());
    Ok(interceptors)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

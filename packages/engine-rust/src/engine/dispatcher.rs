//! The business engine: the single entry point for dispatching an action.

use std::sync::Arc;

use bizflow_core::{
    Action, BusinessContext, BusinessType, ConfigurationError, ErasedDefinition, FlowError,
};
use tracing::{info, info_span, warn, Instrument};

use super::chain::HandlerChain;
use super::config::EngineConfig;
use super::guard::evaluate_guards;
use super::interceptors::{resolve_sorted, InterceptorResolver};
use super::registry::DefinitionRegistry;
use crate::lock::{KeyedLock, LocalKeyedLock};

// ---------------------------------------------------------------------------
// BusinessEngine
// ---------------------------------------------------------------------------

/// Routes `(business_type, action)` to its handler, guarded and intercepted,
/// serialized per lock key.
///
/// Dispatch steps:
/// 1. Look up the definition for the business type and the binding for the action
/// 2. Acquire the keyed lock for the binding's lock key
/// 3. Evaluate the action's guards
/// 4. Resolve and sort the binding's interceptors
/// 5. Run the handler chain and record the result on the context
///
/// Steps 3-5 run while the lease from step 2 is held; the lease is dropped on
/// every exit path.
pub struct BusinessEngine {
    registry: Arc<DefinitionRegistry>,
    resolver: Arc<dyn InterceptorResolver>,
    lock: Arc<dyn KeyedLock>,
    config: Arc<EngineConfig>,
}

impl BusinessEngine {
    #[must_use]
    pub fn new(
        registry: DefinitionRegistry,
        resolver: Arc<dyn InterceptorResolver>,
        lock: Arc<dyn KeyedLock>,
        config: EngineConfig,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            resolver,
            lock,
            config: Arc::new(config),
        }
    }

    /// Builds the registry from `defs` using `config.duplicate_policy` and
    /// serializes dispatches with an in-process [`LocalKeyedLock`].
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::DuplicateDefinition` if the policy rejects
    /// duplicate business types and `defs` contains one.
    pub fn local(
        defs: impl IntoIterator<Item = ErasedDefinition>,
        resolver: Arc<dyn InterceptorResolver>,
        config: EngineConfig,
    ) -> Result<Self, ConfigurationError> {
        let registry = DefinitionRegistry::build(defs, config.duplicate_policy)?;
        Ok(Self::new(
            registry,
            resolver,
            Arc::new(LocalKeyedLock::new()),
            config,
        ))
    }

    #[must_use]
    pub fn registry(&self) -> &DefinitionRegistry {
        &self.registry
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Dispatches `action` for `business_type` with `input` and returns the
    /// handler's result.
    ///
    /// # Errors
    ///
    /// - `FlowError::Configuration` if the business type, action, or a declared
    ///   interceptor is not registered, or payload types do not match.
    /// - `FlowError::LockTimeout` / `FlowError::Lock` if the lock key cannot be
    ///   acquired. No guard, interceptor, or handler code has run.
    /// - `FlowError::GuardRejected` if a guard returns `false`. No interceptor or
    ///   handler code has run.
    /// - `FlowError::Execution` with the original error of a failing guard,
    ///   interceptor, or handler.
    pub async fn process<T, R>(
        &self,
        biz_id: impl Into<String>,
        business_type: BusinessType,
        action: Action,
        input: T,
    ) -> Result<R, FlowError>
    where
        T: Send + Sync + 'static,
        R: Send + Sync + 'static,
    {
        self.process_context(BusinessContext::new(biz_id, business_type, action, input))
            .await
    }

    /// Dispatches a caller-built context. Same contract as [`Self::process`].
    ///
    /// # Errors
    ///
    /// See [`Self::process`]. In addition, `FlowError::AlreadyCompleted` if
    /// `ctx` already carries an output; nothing is looked up or locked.
    pub async fn process_context<T, R>(&self, ctx: BusinessContext<T, R>) -> Result<R, FlowError>
    where
        T: Send + Sync + 'static,
        R: Send + Sync + 'static,
    {
        let span = info_span!(
            "dispatch",
            node_id = %self.config.node_id,
            biz_id = ctx.biz_id(),
            business_type = %ctx.business_type(),
            action = %ctx.action(),
        );
        self.dispatch(ctx).instrument(span).await
    }

    async fn dispatch<T, R>(&self, mut ctx: BusinessContext<T, R>) -> Result<R, FlowError>
    where
        T: Send + Sync + 'static,
        R: Send + Sync + 'static,
    {
        if ctx.output().is_some() {
            warn!("context already carries an output, refusing to dispatch");
            return Err(FlowError::AlreadyCompleted {
                biz_id: ctx.biz_id().to_string(),
            });
        }

        let def = self.registry.get_definition::<T, R>(ctx.business_type())?;
        let binding =
            def.binding(ctx.action())
                .ok_or_else(|| ConfigurationError::HandlerNotFound {
                    business_type: ctx.business_type().clone(),
                    action: ctx.action().clone(),
                })?;

        let policy = binding.lock_policy();
        let key = policy.render_key(&ctx);
        let timeout = policy.timeout.unwrap_or_else(|| self.config.lock_timeout());
        let lease = self.lock.acquire(&key, timeout).await?;

        evaluate_guards(binding.guards(), &ctx)?;

        let interceptors = resolve_sorted::<T, R>(self.resolver.as_ref(), binding.interceptors())?;
        let chain = HandlerChain::new(Arc::clone(binding.handler()), interceptors);
        info!(
            lock_key = lease.key(),
            interceptors = chain.interceptor_count(),
            "dispatch started"
        );

        let output = chain.execute(&ctx).await?;
        // Checked empty on entry; only this dispatch writes it.
        if ctx.set_output(output).is_err() {
            return Err(FlowError::AlreadyCompleted {
                biz_id: ctx.biz_id().to_string(),
            });
        }

        #[allow(clippy::cast_possible_truncation)]
        let held_ms = lease.held_for().as_millis() as u64;
        info!(held_ms, "dispatch complete");
        drop(lease);

        ctx.into_output().ok_or_else(|| {
            FlowError::Execution(anyhow::anyhow!("dispatch finished without a recorded output"))
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

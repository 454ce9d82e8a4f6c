//! Handler chain: runs a handler wrapped by its ordered interceptors.

use std::sync::Arc;

use bizflow_core::{BusinessContext, BusinessHandler, FlowError, Interceptor};
use tracing::{debug, warn};

/// A handler plus the interceptors wrapped around it, sorted by `order()`.
///
/// Execution protocol:
/// 1. `before_transition` on each interceptor in order; each one that returns
///    `Ok` is pushed onto a completed stack
/// 2. `handler.on_enter(ctx, None)`
/// 3. `handler.execute(ctx)` produces the result
/// 4. `handler.on_completed(ctx, &result)`
/// 5. `after_transition` for each completed interceptor, popped LIFO
///
/// The first error ends the chain and is returned as is. Interceptors whose
/// `before_transition` already ran receive no compensating `after_transition`
/// when a later step fails.
pub struct HandlerChain<T, R>
where
    T: Send + Sync,
    R: Send + Sync,
{
    handler: Arc<dyn BusinessHandler<T, R>>,
    interceptors: Vec<Arc<dyn Interceptor<T, R>>>,
}

impl<T, R> HandlerChain<T, R>
where
    T: Send + Sync,
    R: Send + Sync,
{
    /// Wraps `handler` with `interceptors`, which must already be sorted.
    #[must_use]
    pub fn new(
        handler: Arc<dyn BusinessHandler<T, R>>,
        interceptors: Vec<Arc<dyn Interceptor<T, R>>>,
    ) -> Self {
        Self {
            handler,
            interceptors,
        }
    }

    #[must_use]
    pub fn interceptor_count(&self) -> usize {
        self.interceptors.len()
    }

    /// Runs the chain and returns the handler's result.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Execution` with the first error raised by an
    /// interceptor or the handler.
    pub async fn execute(&self, ctx: &BusinessContext<T, R>) -> Result<R, FlowError> {
        self.run(ctx).await.map_err(|err| {
            warn!(
                biz_id = ctx.biz_id(),
                business_type = %ctx.business_type(),
                action = %ctx.action(),
                error = %err,
                "handler chain failed"
            );
            FlowError::Execution(err)
        })
    }

    async fn run(&self, ctx: &BusinessContext<T, R>) -> anyhow::Result<R> {
        let mut completed: Vec<&Arc<dyn Interceptor<T, R>>> =
            Vec::with_capacity(self.interceptors.len());
        for interceptor in &self.interceptors {
            interceptor.before_transition(ctx).await?;
            completed.push(interceptor);
        }
        debug!(before = completed.len(), "before phase complete");

        self.handler.on_enter(ctx, None).await?;
        let result = self.handler.execute(ctx).await?;
        self.handler.on_completed(ctx, &result).await?;

        while let Some(interceptor) = completed.pop() {
            interceptor.after_transition(ctx, &result).await?;
        }
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

use async_trait::async_trait;

use crate::context::BusinessContext;

/// Opaque processing unit implementing one action's business logic.
///
/// Only `execute` is mandatory. `on_enter` runs immediately before `execute`
/// (the result is always `None` at that point) and `on_completed` immediately
/// after it succeeds. Both hooks default to no-ops.
#[async_trait]
pub trait BusinessHandler<T, R>: Send + Sync
where
    T: Send + Sync,
    R: Send + Sync,
{
    /// Runs the action. The only step allowed to produce the dispatch result.
    async fn execute(&self, ctx: &BusinessContext<T, R>) -> anyhow::Result<R>;

    /// Entry hook, called before `execute`.
    async fn on_enter(
        &self,
        _ctx: &BusinessContext<T, R>,
        _result: Option<&R>,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Completion hook, called with the result after `execute` succeeds.
    async fn on_completed(&self, _ctx: &BusinessContext<T, R>, _result: &R) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Precondition gating whether a handler may run for a given context.
///
/// Guards are expected to be fast, non-blocking, and free of side effects.
/// Returning `Ok(false)` rejects the dispatch; returning `Err` fails it.
pub trait Guard<T, R>: Send + Sync {
    fn can_proceed(&self, ctx: &BusinessContext<T, R>) -> anyhow::Result<bool>;

    /// Name reported when this guard rejects a dispatch.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Adapts a plain predicate closure into a named [`Guard`].
pub struct FnGuard<F> {
    name: &'static str,
    predicate: F,
}

impl<F> FnGuard<F> {
    #[must_use]
    pub fn new(name: &'static str, predicate: F) -> Self {
        Self { name, predicate }
    }
}

impl<T, R, F> Guard<T, R> for FnGuard<F>
where
    F: Fn(&BusinessContext<T, R>) -> bool + Send + Sync,
{
    fn can_proceed(&self, ctx: &BusinessContext<T, R>) -> anyhow::Result<bool> {
        Ok((self.predicate)(ctx))
    }

    fn name(&self) -> &str {
        self.name
    }
}

/// Cross-cutting hook wrapped around handler execution.
///
/// `before_transition` runs in ascending `order()`; `after_transition` runs in
/// the reverse of the order in which `before_transition` completed. A single
/// instance may be invoked concurrently by unrelated dispatches.
#[async_trait]
pub trait Interceptor<T, R>: Send + Sync
where
    T: Send + Sync,
    R: Send + Sync,
{
    async fn before_transition(&self, ctx: &BusinessContext<T, R>) -> anyhow::Result<()>;

    async fn after_transition(&self, ctx: &BusinessContext<T, R>, result: &R)
        -> anyhow::Result<()>;

    /// Sort key for the before-phase; smaller runs first.
    fn order(&self) -> i32 {
        -1
    }
}

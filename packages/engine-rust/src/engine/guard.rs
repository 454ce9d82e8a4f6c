//! Sequential precondition evaluation.

use std::sync::Arc;

use bizflow_core::{BusinessContext, FlowError, Guard};
use tracing::warn;

/// Evaluates `guards` in order against `ctx`.
///
/// Stops at the first guard that returns `false` or fails; guards after it are
/// never called. An empty list allows the dispatch unconditionally.
///
/// # Errors
///
/// - `FlowError::GuardRejected` naming the business type, action, and guard
///   when a guard returns `false`.
/// - `FlowError::Execution` carrying the guard's own error when it fails.
pub fn evaluate_guards<T, R>(
    guards: &[Arc<dyn Guard<T, R>>],
    ctx: &BusinessContext<T, R>,
) -> Result<(), FlowError>
where
    T: Send + Sync,
    R: Send + Sync,
{
    for guard in guards {
        match guard.can_proceed(ctx) {
            Ok(true) => {}
            Ok(false) => {
                warn!(
                    biz_id = ctx.biz_id(),
                    business_type = %ctx.business_type(),
                    action = %ctx.action(),
                    guard = guard.name(),
                    "dispatch rejected by guard"
                );
                return Err(FlowError::GuardRejected {
                    business_type: ctx.business_type().clone(),
                    action: ctx.action().clone(),
                    guard: guard.name().to_string(),
                });
            }
            Err(err) => {
                warn!(
                    biz_id = ctx.biz_id(),
                    business_type = %ctx.business_type(),
                    action = %ctx.action(),
                    guard = guard.name(),
                    error = %err,
                    "guard evaluation failed"
                );
                return Err(FlowError::Execution(err));
            }
        }
    }
    Ok(())
}

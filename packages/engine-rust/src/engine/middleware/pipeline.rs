//! Pipeline composition: stacks the middleware layers over a `DispatchService`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bizflow_core::FlowError;
use tower::ServiceBuilder;

use super::load_shed::LoadShedLayer;
use super::trace::TraceLayer;
use crate::engine::config::EngineConfig;
use crate::engine::dispatcher::BusinessEngine;
use crate::engine::service::{DispatchRequest, DispatchService};

/// Build the dispatch pipeline for payload types `(T, R)` over `engine`.
///
/// Layer order (outermost to innermost):
/// 1. `LoadShedLayer` -- reject when `max_concurrent_dispatches` are in flight
/// 2. `TraceLayer` -- record duration and outcome of admitted dispatches
///
/// Several pipelines with different payload types may share one engine; each
/// pipeline has its own load-shed budget.
#[must_use]
pub fn build_dispatch_pipeline<T, R>(
    engine: Arc<BusinessEngine>,
    config: &EngineConfig,
) -> impl tower::Service<
    DispatchRequest<T>,
    Response = R,
    Error = FlowError,
    Future = Pin<Box<dyn Future<Output = Result<R, FlowError>> + Send>>,
> + Clone
+ Send
where
    T: Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    ServiceBuilder::new()
        .layer(LoadShedLayer::new(config.max_concurrent_dispatches))
        .layer(TraceLayer)
        .service(DispatchService::<T, R>::new(engine))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

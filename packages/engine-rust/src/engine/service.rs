//! `tower::Service` adapter over `BusinessEngine`.

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bizflow_core::{Action, BusinessType, FlowError};
use tower::Service;

use super::dispatcher::BusinessEngine;

/// One dispatch request: the arguments of `BusinessEngine::process` as a value.
#[derive(Debug, Clone)]
pub struct DispatchRequest<T> {
    pub biz_id: String,
    pub business_type: BusinessType,
    pub action: Action,
    pub input: T,
}

impl<T> DispatchRequest<T> {
    #[must_use]
    pub fn new(
        biz_id: impl Into<String>,
        business_type: BusinessType,
        action: Action,
        input: T,
    ) -> Self {
        Self {
            biz_id: biz_id.into(),
            business_type,
            action,
            input,
        }
    }
}

/// Service that forwards each `DispatchRequest<T>` to a shared engine and
/// answers with the handler's `R`.
///
/// The engine is always ready; backpressure comes from the middleware stacked
/// on top (see `build_dispatch_pipeline`).
pub struct DispatchService<T, R> {
    engine: Arc<BusinessEngine>,
    _payload: PhantomData<fn(T) -> R>,
}

impl<T, R> DispatchService<T, R> {
    #[must_use]
    pub fn new(engine: Arc<BusinessEngine>) -> Self {
        Self {
            engine,
            _payload: PhantomData,
        }
    }
}

impl<T, R> Clone for DispatchService<T, R> {
    fn clone(&self) -> Self {
        Self::new(Arc::clone(&self.engine))
    }
}

impl<T, R> fmt::Debug for DispatchService<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchService")
            .field("node_id", &self.engine.config().node_id)
            .finish_non_exhaustive()
    }
}

impl<T, R> Service<DispatchRequest<T>> for DispatchService<T, R>
where
    T: Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    type Response = R;
    type Error = FlowError;
    type Future = Pin<Box<dyn Future<Output = Result<R, FlowError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: DispatchRequest<T>) -> Self::Future {
        let engine = Arc::clone(&self.engine);
        Box::pin(async move {
            engine
                .process(req.biz_id, req.business_type, req.action, req.input)
                .await
        })
    }
}

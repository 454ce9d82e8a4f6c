//! Load-shedding middleware for dispatches.
//!
//! Rejects a dispatch with `FlowError::Overloaded` when the number of
//! in-flight dispatches already equals `max_concurrent_dispatches`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bizflow_core::FlowError;
use tokio::sync::Semaphore;
use tower::{Layer, Service};
use tracing::warn;

use crate::engine::service::DispatchRequest;

// ---------------------------------------------------------------------------
// LoadShedLayer
// ---------------------------------------------------------------------------

/// Tower layer that bounds concurrent dispatches with a semaphore.
///
/// Excess dispatches fail immediately instead of queueing; callers can check
/// `FlowError::is_retryable`.
#[derive(Debug, Clone)]
pub struct LoadShedLayer {
    semaphore: Arc<Semaphore>,
}

impl LoadShedLayer {
    #[must_use]
    pub fn new(max_concurrent: u32) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent as usize)),
        }
    }
}

impl<S> Layer<S> for LoadShedLayer {
    type Service = LoadShedService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LoadShedService {
            inner,
            semaphore: Arc::clone(&self.semaphore),
        }
    }
}

// ---------------------------------------------------------------------------
// LoadShedService
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoadShedService<S> {
    inner: S,
    semaphore: Arc<Semaphore>,
}

impl<S, T> Service<DispatchRequest<T>> for LoadShedService<S>
where
    S: Service<DispatchRequest<T>, Error = FlowError> + Send,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = FlowError;
    type Future = Pin<Box<dyn Future<Output = Result<S::Response, FlowError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: DispatchRequest<T>) -> Self::Future {
        let Ok(permit) = Arc::clone(&self.semaphore).try_acquire_owned() else {
            warn!(biz_id = %req.biz_id, "dispatch shed, engine at capacity");
            return Box::pin(async { Err(FlowError::Overloaded) });
        };

        let fut = self.inner.call(req);
        Box::pin(async move {
            let result = fut.await;
            drop(permit);
            result
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

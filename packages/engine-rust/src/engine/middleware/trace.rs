//! Tracing middleware for dispatches.
//!
//! Wraps each dispatch in a `dispatch_request` span and records its duration
//! and outcome once it finishes.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use bizflow_core::FlowError;
use tower::{Layer, Service};
use tracing::{info, info_span, Instrument};

use crate::engine::service::DispatchRequest;

// ---------------------------------------------------------------------------
// TraceLayer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TraceLayer;

impl<S> Layer<S> for TraceLayer {
    type Service = TraceService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TraceService { inner }
    }
}

// ---------------------------------------------------------------------------
// TraceService
// ---------------------------------------------------------------------------

/// Service wrapper that records dispatch duration and outcome on a span.
#[derive(Debug, Clone)]
pub struct TraceService<S> {
    inner: S,
}

impl<S, T> Service<DispatchRequest<T>> for TraceService<S>
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
        let span = info_span!(
            "dispatch_request",
            biz_id = %req.biz_id,
            business_type = %req.business_type,
            action = %req.action,
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        let fut = self.inner.call(req);

        Box::pin(
            async move {
                let start = Instant::now();
                let result = fut.await;

                #[allow(clippy::cast_possible_truncation)]
                let duration_ms = start.elapsed().as_millis() as u64;
                let outcome = match &result {
                    Ok(_) => "ok",
                    Err(err) => err.kind(),
                };

                let span = tracing::Span::current();
                span.record("duration_ms", duration_ms);
                span.record("outcome", outcome);
                info!(duration_ms, outcome, "dispatch request finished");

                result
            }
            .instrument(span),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

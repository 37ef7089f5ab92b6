//! Distributed-tracing context propagation.
//!
//! Every outbound request carries the caller's trace context as W3C
//! `traceparent`/`tracestate` headers when one is in scope, and emits
//! nothing otherwise.
//!
//! Rather than pull in a full OpenTelemetry stack the rest of the crate has
//! no other use for, the context is carried through a `tokio::task_local!`
//! set by [`with_trace_context`] and read back by the transport layer. This
//! keeps the propagation mechanism self-contained and testable without a
//! collector.

use std::future::Future;

tokio::task_local! {
    static CURRENT: TraceContext;
}

/// A W3C Trace Context, as carried in the `traceparent` header:
/// `{version}-{trace_id}-{parent_id}-{flags}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    /// 32 lowercase hex characters.
    pub trace_id: String,
    /// 16 lowercase hex characters identifying the current span.
    pub span_id: String,
    /// `tracestate` header value, vendor-specific key/value pairs.
    pub tracestate: Option<String>,
}

impl TraceContext {
    pub fn new(trace_id: impl Into<String>, span_id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            span_id: span_id.into(),
            tracestate: None,
        }
    }

    pub fn with_tracestate(mut self, tracestate: impl Into<String>) -> Self {
        self.tracestate = Some(tracestate.into());
        self
    }

    /// Render the `traceparent` header value. Flags are always `01` (sampled).
    pub fn traceparent(&self) -> String {
        format!("00-{}-{}-01", self.trace_id, self.span_id)
    }
}

/// Run `fut` with `ctx` installed as the current trace context. Requests
/// issued by the client from within `fut` carry `ctx` as W3C trace headers.
pub async fn with_trace_context<F: Future>(ctx: TraceContext, fut: F) -> F::Output {
    CURRENT.scope(ctx, fut).await
}

/// Returns the trace context installed by the innermost enclosing
/// [`with_trace_context`] call, or `None` if there isn't one.
pub fn current() -> Option<TraceContext> {
    CURRENT.try_with(|ctx| ctx.clone()).ok()
}

//! Span creation and trace-context propagation
//!
//! The core only needs to open a span around each network call and copy its
//! context into the outgoing headers. [`NoopTracer`] does neither;
//! [`W3cTracer`] emits a `traceparent` header.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use uuid::Uuid;

/// Header carrying W3C trace context.
pub const TRACEPARENT: HeaderName = HeaderName::from_static("traceparent");

/// Identifiers of an active span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanContext {
    /// 32 lowercase hex digits
    pub trace_id: String,
    /// 16 lowercase hex digits
    pub span_id: String,
}

/// An open span. Closed on drop.
#[derive(Debug)]
pub struct Span {
    name: &'static str,
    context: Option<SpanContext>,
    _entered: tracing::span::EnteredSpan,
}

impl Span {
    pub fn new(name: &'static str, context: Option<SpanContext>) -> Self {
        let span = match &context {
            Some(ctx) => tracing::info_span!("span", op = name, trace_id = %ctx.trace_id),
            None => tracing::info_span!("span", op = name),
        };
        Self {
            name,
            context,
            _entered: span.entered(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn context(&self) -> Option<&SpanContext> {
        self.context.as_ref()
    }
}

/// Starts spans and injects their context into request headers.
pub trait Tracer {
    fn start_span(&self, name: &'static str) -> Span;

    fn inject(&self, span: &Span, headers: &mut HeaderMap);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl Tracer for NoopTracer {
    fn start_span(&self, name: &'static str) -> Span {
        Span::new(name, None)
    }

    fn inject(&self, _span: &Span, _headers: &mut HeaderMap) {}
}

/// One trace per process; every span gets a fresh span id.
#[derive(Debug, Clone)]
pub struct W3cTracer {
    trace_id: String,
}

impl W3cTracer {
    pub fn new() -> Self {
        Self {
            trace_id: Uuid::new_v4().simple().to_string(),
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }
}

impl Default for W3cTracer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tracer for W3cTracer {
    fn start_span(&self, name: &'static str) -> Span {
        let mut span_id = Uuid::new_v4().simple().to_string();
        span_id.truncate(16);
        Span::new(
            name,
            Some(SpanContext {
                trace_id: self.trace_id.clone(),
                span_id,
            }),
        )
    }

    fn inject(&self, span: &Span, headers: &mut HeaderMap) {
        let Some(ctx) = span.context() else {
            return;
        };
        match HeaderValue::from_str(&format!("00-{}-{}-01", ctx.trace_id, ctx.span_id)) {
            Ok(value) => {
                headers.insert(TRACEPARENT, value);
            }
            Err(err) => tracing::warn!(error = %err, "failed to inject span context"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_hex(s: &str, len: usize) -> bool {
        s.len() == len && s.chars().all(|c| c.is_ascii_hexdigit() && !c.is_uppercase())
    }

    #[test]
    fn noop_tracer_injects_nothing() {
        let tracer = NoopTracer;
        let span = tracer.start_span("cli-run");
        let mut headers = HeaderMap::new();
        tracer.inject(&span, &mut headers);

        assert_eq!(span.name(), "cli-run");
        assert!(span.context().is_none());
        assert!(headers.is_empty());
    }

    #[test]
    fn w3c_tracer_injects_traceparent() {
        let tracer = W3cTracer::new();
        let span = tracer.start_span("swagger");
        let mut headers = HeaderMap::new();
        tracer.inject(&span, &mut headers);

        let value = headers.get(TRACEPARENT).unwrap().to_str().unwrap();
        let parts: Vec<&str> = value.split('-').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "00");
        assert_eq!(parts[1], tracer.trace_id());
        assert!(is_hex(parts[1], 32));
        assert!(is_hex(parts[2], 16));
        assert_eq!(parts[3], "01");
    }

    #[test]
    fn w3c_tracer_shares_trace_id_across_spans() {
        let tracer = W3cTracer::new();
        let first = tracer.start_span("health");
        let second = tracer.start_span("swagger");

        let (a, b) = (first.context().unwrap(), second.context().unwrap());
        assert_eq!(a.trace_id, b.trace_id);
        assert_ne!(a.span_id, b.span_id);
    }
}

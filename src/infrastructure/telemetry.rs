//! OpenTelemetry tracer provider setup.
//!
//! Spans are sampled per trace (`ParentBased(TraceIdRatioBased)`) and, when
//! an OTLP endpoint is configured, exported through the SDK batch processor.
//! A full batch queue drops spans inside the SDK; the request path never
//! waits on export.

use anyhow::Result;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use opentelemetry::propagation::{Extractor, Injector, TextMapPropagator};
use opentelemetry::{Context, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{
    BatchConfigBuilder, BatchSpanProcessor, Sampler, SdkTracerProvider, TracerProviderBuilder,
};

/// Instrumentation scope name for every span created by the gateway.
pub const TRACER_NAME: &str = "telehealth-gateway";

/// Samples new traces with probability `ratio`; children follow their parent.
pub fn sampler(ratio: f64) -> Sampler {
    Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(ratio.clamp(0.0, 1.0))))
}

/// Provider builder with the gateway resource and sampler, without processors.
pub fn provider_builder(sample_ratio: f64) -> TracerProviderBuilder {
    let resource = Resource::builder()
        .with_attribute(KeyValue::new("service.name", TRACER_NAME))
        .with_attribute(KeyValue::new("service.version", env!("CARGO_PKG_VERSION")))
        .build();

    SdkTracerProvider::builder()
        .with_resource(resource)
        .with_sampler(sampler(sample_ratio))
}

/// Builds the process tracer provider.
///
/// With `otlp_endpoint` set, spans go to an OTLP/gRPC collector through a
/// batch processor holding at most `queue_capacity` spans. Without it, spans
/// are still created and propagated but not exported.
///
/// # Errors
///
/// Returns an error if the OTLP exporter cannot be built.
pub fn init_tracer_provider(
    otlp_endpoint: Option<&str>,
    sample_ratio: f64,
    queue_capacity: usize,
) -> Result<SdkTracerProvider> {
    let builder = provider_builder(sample_ratio);

    let Some(endpoint) = otlp_endpoint else {
        tracing::info!("OTLP endpoint not set, spans are not exported");
        return Ok(builder.build());
    };

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let processor = BatchSpanProcessor::builder(exporter)
        .with_batch_config(
            BatchConfigBuilder::default()
                .with_max_queue_size(queue_capacity)
                .build(),
        )
        .build();

    tracing::info!(endpoint, queue_capacity, "Exporting spans over OTLP");
    Ok(builder.with_span_processor(processor).build())
}

struct HeaderExtractor<'a>(&'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|value| value.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|key| key.as_str()).collect()
    }
}

struct HeaderInjector<'a>(&'a mut HeaderMap);

impl Injector for HeaderInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            self.0.insert(name, value);
        }
    }
}

/// Reads W3C `traceparent` / `tracestate` headers into a parent context.
///
/// Missing or malformed headers yield a context without a remote span.
pub fn extract_context(headers: &HeaderMap) -> Context {
    TraceContextPropagator::new().extract(&HeaderExtractor(headers))
}

/// Writes the span of `cx` as W3C trace context headers.
pub fn inject_context(cx: &Context, headers: &mut HeaderMap) {
    TraceContextPropagator::new().inject_context(cx, &mut HeaderInjector(headers));
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::trace::{Span as _, Tracer as _, TracerProvider as _};
    use opentelemetry_sdk::trace::InMemorySpanExporter;

    fn export_one(ratio: f64) -> usize {
        let exporter = InMemorySpanExporter::default();
        let provider = provider_builder(ratio)
            .with_simple_exporter(exporter.clone())
            .build();

        let mut span = provider.tracer(TRACER_NAME).start("refill");
        span.end();

        exporter.get_finished_spans().unwrap().len()
    }

    #[test]
    fn test_full_ratio_records_every_trace() {
        assert_eq!(export_one(1.0), 1);
    }

    #[test]
    fn test_zero_ratio_records_nothing() {
        assert_eq!(export_one(0.0), 0);
    }

    #[test]
    fn test_extract_and_inject_traceparent() {
        use opentelemetry::trace::TraceContextExt as _;

        let mut inbound = HeaderMap::new();
        inbound.insert(
            "traceparent",
            HeaderValue::from_static("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01"),
        );

        let cx = extract_context(&inbound);
        let remote = cx.span().span_context().clone();
        assert!(remote.is_remote());
        assert_eq!(remote.trace_id().to_string(), "4bf92f3577b34da6a3ce929d0e0e4736");

        let mut outbound = HeaderMap::new();
        inject_context(&cx, &mut outbound);
        assert_eq!(
            outbound["traceparent"],
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01"
        );
    }

    #[test]
    fn test_malformed_traceparent_is_ignored() {
        use opentelemetry::trace::TraceContextExt as _;

        let mut inbound = HeaderMap::new();
        inbound.insert("traceparent", HeaderValue::from_static("00-zz-not-hex"));

        assert!(!extract_context(&inbound).has_active_span());
    }

    #[test]
    fn test_provider_without_endpoint() {
        assert!(init_tracer_provider(None, 1.0, 16).is_ok());
    }
}

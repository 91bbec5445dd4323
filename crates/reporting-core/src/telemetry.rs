use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{KeyValue, global};
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::{
    Resource,
    propagation::TraceContextPropagator,
    runtime,
    trace::{RandomIdGenerator, Sampler, TracerProvider},
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{ExposeSecret, ObservabilityConfig};

/// Keeps the span exporter alive; pending spans are flushed on drop.
pub struct TelemetryGuard {
    provider: Option<TracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        let Some(provider) = self.provider.take() else {
            return;
        };
        if let Err(e) = provider.shutdown() {
            eprintln!("Span export shutdown failed: {e}");
        }
    }
}

/// Installs the global subscriber: console output always, OTLP export when
/// `config.otlp_endpoint` is set.
///
/// `RUST_LOG` overrides `config.log_filter`.
///
/// # Errors
///
/// Fails when the filter does not parse or the exporter cannot be built.
/// Installing twice is also an error.
pub fn init_tracing(
    config: &ObservabilityConfig,
    service_name: &str,
) -> anyhow::Result<TelemetryGuard> {
    let filter = EnvFilter::try_from_default_env()
        .map_or_else(|_| EnvFilter::try_new(&config.log_filter), Ok)?;

    let console = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true);

    let provider = config
        .otlp_endpoint
        .as_ref()
        .map(|endpoint| span_exporter(endpoint.expose_secret(), config.sample_ratio, service_name))
        .transpose()?;

    let export = provider.as_ref().map(|provider| {
        tracing_opentelemetry::layer().with_tracer(provider.tracer(service_name.to_string()))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(export)
        .try_init()?;

    Ok(TelemetryGuard { provider })
}

fn span_exporter(
    endpoint: &str,
    sample_ratio: f64,
    service_name: &str,
) -> anyhow::Result<TracerProvider> {
    // Deliveries carry W3C trace context from the publishing services.
    global::set_text_map_propagator(TraceContextPropagator::new());

    let exporter = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let sampler = Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(
        sample_ratio.clamp(0.0, 1.0),
    )));

    Ok(TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_sampler(sampler)
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(Resource::new([
            KeyValue::new("service.name", service_name.to_string()),
            KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        ]))
        .build())
}
